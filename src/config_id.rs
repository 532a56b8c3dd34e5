//! Identity of the reader configuration that produced a raw spec.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::{error::SettingsError, settings::SettingsTree};

/// Reader settings that influence which columns a scan reports.
///
/// An empty identity is the placeholder used for settings saved before
/// identities were tracked; it is compatible with every identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigId {
    entries: BTreeMap<String, String>,
}

impl ConfigId {
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entries.insert(key.into(), value.to_string());
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Two identities are compatible when every setting they both record has
    /// the same value. Not transitive.
    pub fn is_compatible(&self, other: &ConfigId) -> bool {
        self.entries
            .iter()
            .all(|(key, value)| other.entries.get(key).is_none_or(|other| other == value))
    }

    /// Short stable digest for log output.
    pub fn fingerprint(&self) -> String {
        if self.is_placeholder() {
            return "placeholder".to_string();
        }
        let mut hasher = Sha256::new();
        for (key, value) in &self.entries {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        let digest = format!("{:x}", hasher.finalize());
        digest[..12].to_string()
    }

    pub fn save(&self, settings: &mut SettingsTree) {
        for (key, value) in &self.entries {
            settings.set_string(key, value.clone());
        }
    }

    pub fn load(settings: &SettingsTree) -> Result<Self, SettingsError> {
        let mut id = ConfigId::placeholder();
        for key in settings.keys() {
            let value = settings.get_string(&key)?;
            id.entries.insert(key, value);
        }
        Ok(id)
    }
}
