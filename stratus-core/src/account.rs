//! Account and region scoped state management

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Key for account and region scoped state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountRegionKey {
    pub account_id: String,
    pub region: String,
}

impl AccountRegionKey {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
        }
    }
}

/// Thread-safe state store with account/region scoping
pub struct StateStore<T> {
    data: DashMap<AccountRegionKey, T>,
}

impl<T> Default for StateStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StateStore<T> {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Build a store from previously captured entries
    pub fn from_entries(entries: impl IntoIterator<Item = (AccountRegionKey, T)>) -> Self {
        Self {
            data: entries.into_iter().collect(),
        }
    }

    /// Get or create state for an account/region
    pub fn get_or_create(
        &self,
        account_id: &str,
        region: &str,
    ) -> dashmap::mapref::one::RefMut<'_, AccountRegionKey, T>
    where
        T: Default,
    {
        let key = AccountRegionKey::new(account_id, region);
        self.data.entry(key).or_default()
    }

    /// Copy every entry out of the store, ordered by key
    pub fn snapshot(&self) -> Vec<(AccountRegionKey, T)>
    where
        T: Clone,
    {
        let mut entries: Vec<_> = self
            .data
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
