use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// Remote resources the agent creates and is responsible for deleting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Assistant,
    Thread,
    File,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Thread => "thread",
            Self::File => "file",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub id: String,
    pub acquired_at: DateTime<Utc>,
}

/// Owned remote handles keyed by identifier, remembering acquisition order.
#[derive(Debug, Default)]
pub struct ResourceTable {
    entries: HashMap<String, ResourceHandle>,
    order: Vec<String>,
}

impl ResourceTable {
    /// Returns `false` when `id` is already tracked.
    pub fn insert(&mut self, kind: ResourceKind, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return false;
        }
        self.order.push(id.clone());
        self.entries.insert(id.clone(), ResourceHandle { kind, id, acquired_at: Utc::now() });
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<ResourceHandle> {
        let handle = self.entries.remove(id)?;
        self.order.retain(|tracked| tracked != id);
        Some(handle)
    }

    pub fn get(&self, id: &str) -> Option<&ResourceHandle> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.entries.values().filter(|handle| handle.kind == kind).count()
    }

    /// Identifiers of `kind` in acquisition order.
    pub fn ids(&self, kind: ResourceKind) -> Vec<String> {
        self.iter().filter(|handle| handle.kind == kind).map(|handle| handle.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Assistant first, then threads, then files; acquisition order within a kind.
    pub fn cleanup_order(&self) -> Vec<ResourceHandle> {
        let mut handles: Vec<ResourceHandle> = self.iter().cloned().collect();
        handles.sort_by_key(|handle| handle.kind);
        handles
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: Vec<ResourceHandle>,
    pub failed: Vec<(ResourceHandle, String)>,
}

impl CleanupReport {
    pub fn deleted_count(&self, kind: ResourceKind) -> usize {
        self.deleted.iter().filter(|handle| handle.kind == kind).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
