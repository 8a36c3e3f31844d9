//! Target resolution.
//!
//! The queue stores only a `(kind, id)` pair and an action name. At
//! processing time a [`TargetResolver`] maps the kind tag to a
//! [`TargetKind`], which either loads the live object or builds a
//! placeholder that carries nothing but the id. The object then receives
//! the action name through [`Target::perform`]; the queue never knows which
//! actions exist.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{ActionError, QueueError};

/// An object actions can be performed on.
#[async_trait]
pub trait Target: Send + Sync {
    /// Identifier within its kind.
    fn target_id(&self) -> i64;

    /// Perform the named action. Unknown names should return an error.
    async fn perform(&self, action: &str) -> Result<(), ActionError>;
}

/// A registered domain type.
#[async_trait]
pub trait TargetKind: Send + Sync {
    /// Kind tag stored in queue entries.
    fn name(&self) -> &str;

    /// Load the live object, or `Ok(None)` if it no longer exists.
    async fn load(&self, id: i64) -> Result<Option<Box<dyn Target>>, ActionError>;

    /// Build a placeholder carrying only `id`.
    fn placeholder(&self, id: i64) -> Box<dyn Target>;
}

/// Maps kind tags to target kinds.
pub trait TargetResolver: Send + Sync {
    /// Look up a kind by tag.
    fn resolve_kind(&self, kind: &str) -> Option<Arc<dyn TargetKind>>;
}

/// Registry of target kinds, built at startup.
pub struct TargetRegistry {
    kinds: DashMap<String, Arc<dyn TargetKind>>,
}

impl TargetRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            kinds: DashMap::new(),
        }
    }

    /// Register a kind.
    ///
    /// Returns an error if a kind with the same name is already registered.
    pub fn register(&self, kind: Arc<dyn TargetKind>) -> Result<(), QueueError> {
        let name = kind.name().to_string();

        if self.kinds.contains_key(&name) {
            return Err(QueueError::KindAlreadyRegistered(name));
        }

        self.kinds.insert(name, kind);
        Ok(())
    }

    /// Check if a kind is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// List registered kind names, sorted.
    pub fn list_kinds(&self) -> Vec<String> {
        let mut names: Vec<String> = self.kinds.iter().map(|k| k.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetResolver for TargetRegistry {
    fn resolve_kind(&self, kind: &str) -> Option<Arc<dyn TargetKind>> {
        self.kinds.get(kind).map(|k| k.value().clone())
    }
}
