//! Key scheme shared by the data and metadata namespaces.
//!
//! Metadata keys look like `fp.topics.0.18`: the `fp` prefix, the database
//! name, and a two-part version. Data keys drop the version: `fp.topics`.

use crate::error::HearthError;
use std::fmt;

pub const KEY_PREFIX: &str = "fp";
pub const KEY_SEPARATOR: char = '.';

/// A metadata key, e.g. `fp.topics.0.18`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaDataKey(String);

/// A data namespace key, e.g. `fp.topics`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataKey(String);

fn strip_prefix(key: &str) -> Option<&str> {
    key.strip_prefix(KEY_PREFIX)?.strip_prefix(KEY_SEPARATOR)
}

fn separator_count(key: &str) -> usize {
    key.matches(KEY_SEPARATOR).count()
}

/// Splits `<name>.<major>.<minor>` (prefix already removed) from the right.
fn split_name_version(rest: &str) -> Option<(&str, &str)> {
    let (head, _minor) = rest.rsplit_once(KEY_SEPARATOR)?;
    let (name, _major) = head.rsplit_once(KEY_SEPARATOR)?;
    if name.is_empty() {
        return None;
    }
    Some((name, &rest[name.len() + 1..]))
}

impl MetaDataKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_database_version(db: &str, version: &str) -> Self {
        Self(format!("{KEY_PREFIX}{KEY_SEPARATOR}{db}{KEY_SEPARATOR}{version}"))
    }

    /// At least three separators: prefix/name, name/version, and the one
    /// inside the version itself.
    pub fn is_valid(&self) -> bool {
        self.parts().is_some()
    }

    /// Database name segment, empty for invalid keys.
    pub fn name(&self) -> &str {
        self.parts().map(|(name, _)| name).unwrap_or("")
    }

    /// Trailing two-part version, empty for invalid keys.
    pub fn version(&self) -> &str {
        self.parts().map(|(_, version)| version).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse into `(name, version)`, failing for keys outside the grammar.
    pub fn parse(key: &str) -> Result<(String, String), HearthError> {
        let mdk = MetaDataKey::new(key);
        match mdk.parts() {
            Some((name, version)) => Ok((name.to_string(), version.to_string())),
            None => Err(HearthError::MalformedKey {
                key: key.to_string(),
                reason: format!(
                    "expected '{KEY_PREFIX}{KEY_SEPARATOR}<name>{KEY_SEPARATOR}<major>{KEY_SEPARATOR}<minor>'"
                ),
            }),
        }
    }

    fn parts(&self) -> Option<(&str, &str)> {
        if separator_count(&self.0) < 3 {
            return None;
        }
        split_name_version(strip_prefix(&self.0)?)
    }
}

impl DataKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_database(db: &str) -> Self {
        Self(format!("{KEY_PREFIX}{KEY_SEPARATOR}{db}"))
    }

    /// Prefix plus at least one separator.
    pub fn is_valid(&self) -> bool {
        strip_prefix(&self.0).is_some()
    }

    /// Everything after the prefix, empty for invalid keys.
    pub fn name(&self) -> &str {
        strip_prefix(&self.0).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(key: &str) -> Result<String, HearthError> {
        let dk = DataKey::new(key);
        if dk.is_valid() {
            Ok(dk.name().to_string())
        } else {
            Err(HearthError::MalformedKey {
                key: key.to_string(),
                reason: format!("expected '{KEY_PREFIX}{KEY_SEPARATOR}<name>'"),
            })
        }
    }
}

impl fmt::Display for MetaDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
