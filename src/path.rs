//! Conversion paths from external (source) types to output column types.

use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
};

use log::{debug, warn};

use crate::spec::ExternalType;

/// A named conversion from a source type to a target column type.
///
/// Two paths are interchangeable only when their ids are equal; equality and
/// hashing therefore look at the id alone.
#[derive(Debug, Clone)]
pub struct ConversionPath<T> {
    id: String,
    source_type: T,
    target: String,
}

impl<T> ConversionPath<T> {
    pub fn new(id: impl Into<String>, source_type: T, target: impl Into<String>) -> Self {
        ConversionPath {
            id: id.into(),
            source_type,
            target: target.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_type(&self) -> &T {
        &self.source_type
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl<T: ExternalType> ConversionPath<T> {
    /// Pass-through path used when a registry knows nothing about a type.
    pub fn identity(source_type: T) -> Self {
        let id = format!("{source_type}->{source_type}");
        let target = source_type.to_string();
        ConversionPath::new(id, source_type, target)
    }
}

impl<T> PartialEq for ConversionPath<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ConversionPath<T> {}

impl<T> Hash for ConversionPath<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: fmt::Display> fmt::Display for ConversionPath<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source_type, self.target)
    }
}

pub trait ConversionPathRegistry<T> {
    /// The path applied to a column of `source_type` unless the user picks another.
    fn default_path(&self, source_type: &T) -> ConversionPath<T>;

    fn available_paths(&self, source_type: &T) -> Vec<ConversionPath<T>>;

    fn resolve(&self, id: &str) -> Option<ConversionPath<T>>;

    /// Source type assumed for columns whose type was never recorded.
    fn fallback_type(&self) -> T;
}

/// In-memory registry populated in a fixed order.
///
/// Ids are expected to be unique. A repeated id keeps the first registration
/// and logs a warning.
#[derive(Debug, Clone)]
pub struct PathRegistry<T> {
    paths: Vec<ConversionPath<T>>,
    defaults: HashMap<T, usize>,
    fallback: T,
}

impl<T: ExternalType> PathRegistry<T> {
    pub fn new(fallback: T) -> Self {
        PathRegistry {
            paths: Vec::new(),
            defaults: HashMap::new(),
            fallback,
        }
    }

    /// Returns `false` when the id was already taken and the path was ignored.
    pub fn register(&mut self, path: ConversionPath<T>) -> bool {
        self.insert(path).is_some()
    }

    /// Registers `path` and makes it the default for its source type unless
    /// another default was registered first.
    pub fn register_default(&mut self, path: ConversionPath<T>) -> bool {
        let source_type = path.source_type().clone();
        match self.insert(path) {
            Some(index) => {
                self.defaults.entry(source_type).or_insert(index);
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, path: ConversionPath<T>) -> Option<usize> {
        if let Some(existing) = self.paths.iter().find(|existing| existing.id == path.id) {
            warn!(
                "Conversion path id '{}' is already registered for {}; ignoring the registration for {}",
                path.id, existing.source_type, path.source_type
            );
            return None;
        }
        self.paths.push(path);
        Some(self.paths.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<T: ExternalType> ConversionPathRegistry<T> for PathRegistry<T> {
    fn default_path(&self, source_type: &T) -> ConversionPath<T> {
        if let Some(index) = self.defaults.get(source_type) {
            return self.paths[*index].clone();
        }
        if let Some(path) = self.paths.iter().find(|path| &path.source_type == source_type) {
            return path.clone();
        }
        debug!("No conversion path registered for {source_type}; passing values through");
        ConversionPath::identity(source_type.clone())
    }

    fn available_paths(&self, source_type: &T) -> Vec<ConversionPath<T>> {
        self.paths
            .iter()
            .filter(|path| &path.source_type == source_type)
            .cloned()
            .collect()
    }

    fn resolve(&self, id: &str) -> Option<ConversionPath<T>> {
        self.paths.iter().find(|path| path.id == id).cloned()
    }

    fn fallback_type(&self) -> T {
        self.fallback.clone()
    }
}
