//! Structured settings tree persisted as YAML.
//!
//! A [`SettingsTree`] is an ordered mapping of string keys to scalars, arrays
//! or nested trees. Codecs read it through typed getters that report the
//! offending key on failure, so malformed files surface with a precise
//! location instead of a generic parse error.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::error::SettingsError;

type Entry<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsTree {
    entries: Mapping,
}

impl SettingsTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Entry<Self> {
        match value {
            Value::Mapping(entries) => Ok(SettingsTree { entries }),
            Value::Null => Ok(SettingsTree::new()),
            _ => Err(SettingsError::invalid("<root>", "a mapping")),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Mapping(self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries
            .keys()
            .filter_map(|key| key.as_str().map(str::to_string))
            .collect()
    }

    pub fn get_value(&self, key: &str) -> Entry<&Value> {
        self.entries
            .get(key)
            .ok_or_else(|| SettingsError::missing(key))
    }

    pub fn get_string(&self, key: &str) -> Entry<String> {
        self.get_value(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SettingsError::invalid(key, "a string"))
    }

    /// Returns `None` when the entry is absent or explicitly null.
    pub fn get_optional_string(&self, key: &str) -> Entry<Option<String>> {
        match self.entries.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(SettingsError::invalid(key, "a string or null")),
        }
    }

    pub fn get_bool(&self, key: &str) -> Entry<bool> {
        self.get_value(key)?
            .as_bool()
            .ok_or_else(|| SettingsError::invalid(key, "a boolean"))
    }

    pub fn get_usize(&self, key: &str) -> Entry<usize> {
        value_as_usize(self.get_value(key)?)
            .ok_or_else(|| SettingsError::invalid(key, "an unsigned integer"))
    }

    pub fn get_child(&self, key: &str) -> Entry<SettingsTree> {
        match self.get_value(key)? {
            Value::Mapping(entries) => Ok(SettingsTree {
                entries: entries.clone(),
            }),
            _ => Err(SettingsError::invalid(key, "a nested settings tree")),
        }
    }

    pub fn get_optional_child(&self, key: &str) -> Entry<Option<SettingsTree>> {
        match self.entries.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get_child(key).map(Some),
        }
    }

    /// Returns the nested trees of a child mapping in stored order.
    pub fn get_children(&self, key: &str) -> Entry<Vec<(String, SettingsTree)>> {
        let child = self.get_child(key)?;
        child
            .entries
            .iter()
            .map(|(name, value)| {
                let name = name
                    .as_str()
                    .ok_or_else(|| SettingsError::invalid(key, "string keys"))?;
                let tree = SettingsTree::from_value(value.clone()).map_err(|_| {
                    SettingsError::invalid(&format!("{key}.{name}"), "a nested settings tree")
                })?;
                Ok((name.to_string(), tree))
            })
            .collect()
    }

    pub fn get_child_array(&self, key: &str) -> Entry<Vec<SettingsTree>> {
        self.get_sequence(key)?
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                SettingsTree::from_value(value.clone()).map_err(|_| {
                    SettingsError::invalid(&format!("{key}[{idx}]"), "a nested settings tree")
                })
            })
            .collect()
    }

    pub fn get_string_array(&self, key: &str) -> Entry<Vec<String>> {
        self.get_sequence(key)?
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                value
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SettingsError::invalid(&format!("{key}[{idx}]"), "a string"))
            })
            .collect()
    }

    pub fn get_bool_array(&self, key: &str) -> Entry<Vec<bool>> {
        self.get_sequence(key)?
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                value
                    .as_bool()
                    .ok_or_else(|| SettingsError::invalid(&format!("{key}[{idx}]"), "a boolean"))
            })
            .collect()
    }

    pub fn get_usize_array(&self, key: &str) -> Entry<Vec<usize>> {
        self.get_sequence(key)?
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                value_as_usize(value).ok_or_else(|| {
                    SettingsError::invalid(&format!("{key}[{idx}]"), "an unsigned integer")
                })
            })
            .collect()
    }

    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Entry<T> {
        let value = self.get_value(key)?;
        serde_yaml::from_value(value.clone())
            .map_err(|err| SettingsError::new(key, err.to_string()))
    }

    fn get_sequence(&self, key: &str) -> Entry<&Vec<Value>> {
        self.get_value(key)?
            .as_sequence()
            .ok_or_else(|| SettingsError::invalid(key, "a sequence"))
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.insert(key, Value::String(value.into()));
    }

    pub fn set_optional_string(&mut self, key: &str, value: Option<&str>) {
        let value = value.map_or(Value::Null, |value| Value::String(value.to_string()));
        self.insert(key, value);
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.insert(key, Value::Bool(value));
    }

    pub fn set_usize(&mut self, key: &str, value: usize) {
        self.insert(key, Value::from(value as u64));
    }

    pub fn set_child(&mut self, key: &str, child: SettingsTree) {
        self.insert(key, child.into_value());
    }

    /// Stores `children` as a mapping keyed by their names, preserving order.
    pub fn set_children(&mut self, key: &str, children: Vec<(String, SettingsTree)>) {
        let mut mapping = Mapping::new();
        for (name, child) in children {
            mapping.insert(Value::String(name), child.into_value());
        }
        self.insert(key, Value::Mapping(mapping));
    }

    pub fn set_child_array(&mut self, key: &str, children: Vec<SettingsTree>) {
        let values = children.into_iter().map(SettingsTree::into_value).collect();
        self.insert(key, Value::Sequence(values));
    }

    pub fn set_string_array(&mut self, key: &str, values: &[String]) {
        let values = values.iter().cloned().map(Value::String).collect();
        self.insert(key, Value::Sequence(values));
    }

    pub fn set_bool_array(&mut self, key: &str, values: &[bool]) {
        let values = values.iter().copied().map(Value::Bool).collect();
        self.insert(key, Value::Sequence(values));
    }

    pub fn set_usize_array(&mut self, key: &str, values: &[usize]) {
        let values = values.iter().map(|value| Value::from(*value as u64)).collect();
        self.insert(key, Value::Sequence(values));
    }

    pub fn set_typed<T: Serialize>(&mut self, key: &str, value: &T) -> Entry<()> {
        let value =
            serde_yaml::to_value(value).map_err(|err| SettingsError::new(key, err.to_string()))?;
        self.insert(key, value);
        Ok(())
    }

    fn insert(&mut self, key: &str, value: Value) {
        self.entries.insert(Value::String(key.to_string()), value);
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(input).context("Parsing settings YAML")?;
        Ok(SettingsTree::from_value(value)?)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(&self.entries).context("Serializing settings to YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path).with_context(|| format!("Opening settings file {path:?}"))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)
            .with_context(|| format!("Reading settings file {path:?}"))?;
        Self::from_yaml_str(&buf).with_context(|| format!("Loading settings from {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = self.to_yaml_string()?;
        let mut file =
            File::create(path).with_context(|| format!("Creating settings file {path:?}"))?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

fn value_as_usize(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|value| usize::try_from(value).ok())
}
