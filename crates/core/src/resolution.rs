use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

/// Outcome of a best-effort lookup over many addresses.
///
/// An address in neither set was looked up successfully and is unknown to the
/// provider. An address in `failed` could not be looked up at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution<V> {
    pub resolved: HashMap<String, V>,
    pub failed: BTreeSet<String>,
}

impl<V> Default for Resolution<V> {
    fn default() -> Self {
        Self {
            resolved: HashMap::new(),
            failed: BTreeSet::new(),
        }
    }
}

impl<V> Resolution<V> {
    /// Lookup by already-normalized address.
    pub fn get(&self, address: &str) -> Option<&V> {
        self.resolved.get(address)
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn into_resolved(self) -> HashMap<String, V> {
        self.resolved
    }
}
