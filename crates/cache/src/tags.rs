//! Tag index: caller-defined labels mapped to the members carrying them

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Plain tag table, `tag -> set of members`
///
/// Members are raw keys in the memory backend and identifiers in the durable
/// ones. The table is serializable so the file backend can persist it inside
/// its index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagTable(BTreeMap<String, BTreeSet<String>>);

impl TagTable {
    /// Register `member` under each tag; repeated registration is a no-op
    pub fn add(&mut self, member: &str, tags: &[&str]) {
        for tag in tags {
            self.0
                .entry((*tag).to_string())
                .or_default()
                .insert(member.to_string());
        }
    }

    /// Remove the given tags and return the union of their members
    pub fn take(&mut self, tags: &[&str]) -> Vec<String> {
        let mut members = BTreeSet::new();
        for tag in tags {
            if let Some(set) = self.0.remove(*tag) {
                members.extend(set);
            }
        }
        members.into_iter().collect()
    }

    /// Members currently registered under `tag`
    pub fn members(&self, tag: &str) -> Vec<String> {
        self.0
            .get(tag)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop `gone` from every tag, and tags left without members
    pub fn prune(&mut self, gone: &[String]) {
        if gone.is_empty() {
            return;
        }
        self.0.retain(|_, set| {
            for member in gone {
                set.remove(member);
            }
            !set.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lock-guarded [`TagTable`], independent of the record lock it sits beside
#[derive(Debug, Default)]
pub struct TagIndex {
    table: RwLock<TagTable>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: TagTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    pub fn tag(&self, member: &str, tags: &[&str]) {
        self.table.write().add(member, tags);
    }

    pub fn take(&self, tags: &[&str]) -> Vec<String> {
        self.table.write().take(tags)
    }

    pub fn members(&self, tag: &str) -> Vec<String> {
        self.table.read().members(tag)
    }

    pub fn prune(&self, gone: &[String]) {
        self.table.write().prune(gone);
    }

    pub fn snapshot(&self) -> TagTable {
        self.table.read().clone()
    }
}
