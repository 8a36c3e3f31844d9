//! Fixtures for the command handler tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use deferq_queue::{ActionError, DeferredQueue, QueueConfig, Target, TargetKind, TargetRegistry};
use deferq_store_sqlite::SqliteEntryStore;

type Log = Arc<Mutex<Vec<(i64, String)>>>;

/// `explode` fails, every other action succeeds.
struct Note {
    id: i64,
    log: Log,
}

#[async_trait]
impl Target for Note {
    fn target_id(&self) -> i64 {
        self.id
    }

    async fn perform(&self, action: &str) -> Result<(), ActionError> {
        self.log.lock().push((self.id, action.to_string()));
        if action == "explode" {
            return Err(ActionError::new(format!("note #{} exploded", self.id)));
        }
        Ok(())
    }
}

/// Kind `note`: every id exists.
#[derive(Default)]
pub(crate) struct NoteKind {
    log: Log,
}

impl NoteKind {
    pub(crate) fn performed(&self) -> Vec<(i64, String)> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl TargetKind for NoteKind {
    fn name(&self) -> &str {
        "note"
    }

    async fn load(&self, id: i64) -> Result<Option<Box<dyn Target>>, ActionError> {
        Ok(Some(self.placeholder(id)))
    }

    fn placeholder(&self, id: i64) -> Box<dyn Target> {
        Box::new(Note {
            id,
            log: self.log.clone(),
        })
    }
}

pub(crate) fn registry() -> TargetRegistry {
    let registry = TargetRegistry::new();
    registry.register(Arc::new(NoteKind::default())).unwrap();
    registry
}

/// Queue over an in-memory SQLite store with the `note` kind registered.
pub(crate) async fn queue_with(config: QueueConfig) -> (DeferredQueue, Arc<NoteKind>) {
    let kind = Arc::new(NoteKind::default());
    let registry = TargetRegistry::new();
    registry.register(kind.clone()).unwrap();

    let store = SqliteEntryStore::in_memory().await.unwrap();
    let queue = DeferredQueue::new(config, Arc::new(store), Arc::new(registry));
    (queue, kind)
}
