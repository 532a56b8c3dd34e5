//! Column types observed in CSV sources and the conversion paths between them.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::path::{ConversionPath, PathRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    Guid,
}

impl ColumnType {
    pub const ALL: [ColumnType; 8] = [
        ColumnType::String,
        ColumnType::Integer,
        ColumnType::Float,
        ColumnType::Boolean,
        ColumnType::Date,
        ColumnType::DateTime,
        ColumnType::Time,
        ColumnType::Guid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Time => "time",
            ColumnType::Guid => "guid",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ColumnType::String => "String",
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::Boolean => "Boolean",
            ColumnType::Date => "Date",
            ColumnType::DateTime => "DateTime",
            ColumnType::Time => "Time",
            ColumnType::Guid => "Guid",
        }
    }

    pub fn variants() -> Vec<&'static str> {
        ColumnType::ALL.iter().map(ColumnType::as_str).collect()
    }

    /// Types this one can be converted to besides itself and string.
    fn widenings(&self) -> &'static [ColumnType] {
        match self {
            ColumnType::Integer => &[ColumnType::Float],
            ColumnType::Boolean => &[ColumnType::Integer],
            ColumnType::Date => &[ColumnType::DateTime],
            ColumnType::DateTime => &[ColumnType::Date, ColumnType::Time],
            ColumnType::String => &[
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::Boolean,
                ColumnType::Date,
                ColumnType::DateTime,
                ColumnType::Time,
                ColumnType::Guid,
            ],
            ColumnType::Float | ColumnType::Time | ColumnType::Guid => &[],
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" => Ok(ColumnType::String),
            "integer" | "int" => Ok(ColumnType::Integer),
            "float" | "double" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "datetime" | "date-time" | "timestamp" => Ok(ColumnType::DateTime),
            "time" => Ok(ColumnType::Time),
            "guid" | "uuid" => Ok(ColumnType::Guid),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

pub fn path_id(source: ColumnType, target: ColumnType) -> String {
    format!("{}->{}", source.as_str(), target.as_str())
}

/// Registry of the conversions the CSV reader supports.
///
/// Every type converts to itself (the default), to string, and along the
/// widenings listed above. String is the fallback for columns whose type was
/// never recorded.
pub fn csv_registry() -> PathRegistry<ColumnType> {
    let mut registry = PathRegistry::new(ColumnType::String);
    for source in ColumnType::ALL {
        registry.register_default(ConversionPath::new(
            path_id(source, source),
            source,
            source.as_str(),
        ));
        if source != ColumnType::String {
            registry.register(ConversionPath::new(
                path_id(source, ColumnType::String),
                source,
                ColumnType::String.as_str(),
            ));
        }
        for target in source.widenings() {
            registry.register(ConversionPath::new(
                path_id(source, *target),
                source,
                target.as_str(),
            ));
        }
    }
    registry
}
