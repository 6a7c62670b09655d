use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

/// A named set of backend credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

impl Profile {
    #[must_use]
    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials.get(key).map(String::as_str)
    }
}

/// Where profiles come from (a file, a secrets store, a fixed list in tests).
pub trait ProfileSource {
    fn load_all(&self) -> Result<Vec<Profile>>;
}

/// Profiles of one backend kind, indexed by name.
#[derive(Debug, Clone, Default)]
pub struct ProfileTable {
    kind: String,
    by_name: AHashMap<String, Arc<Profile>>,
}

impl ProfileTable {
    /// Keeps only profiles whose kind matches `kind` (ASCII case-insensitive).
    #[must_use]
    pub fn from_profiles(kind: &str, profiles: impl IntoIterator<Item = Profile>) -> Self {
        let by_name = profiles
            .into_iter()
            .filter(|p| p.kind.eq_ignore_ascii_case(kind))
            .map(|p| (p.name.clone(), Arc::new(p)))
            .collect();
        Self {
            kind: kind.to_string(),
            by_name,
        }
    }

    pub fn load(kind: &str, source: &dyn ProfileSource) -> Result<Self> {
        Ok(Self::from_profiles(kind, source.load_all()?))
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Profile>> {
        self.by_name.get(name).cloned()
    }

    /// Round-robin profile name for a user: `names[user_number % names.len()]`.
    #[must_use]
    pub fn assign(user_number: u64, names: &[String]) -> Option<&str> {
        if names.is_empty() {
            return None;
        }
        let idx = usize::try_from(user_number % names.len() as u64).ok()?;
        names.get(idx).map(String::as_str)
    }

    pub fn profile_for(&self, user_number: u64, names: &[String]) -> Result<Arc<Profile>> {
        let name = Self::assign(user_number, names).ok_or(Error::NoProfiles)?;
        self.get(name).ok_or_else(|| Error::ProfileNotFound {
            user_number,
            name: name.to_string(),
            kind: self.kind.clone(),
        })
    }
}
