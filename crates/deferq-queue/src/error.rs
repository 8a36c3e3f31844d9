//! Queue errors.

use std::panic::Location;

use thiserror::Error;

/// Queue error types.
///
/// Everything here is fatal to the current enqueue, drain or cleanup call.
/// Per-entry action failures never surface as a `QueueError`.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Entry not found.
    #[error("Queue entry not found: {0}")]
    EntryNotFound(i64),

    /// Enqueue was called without any targets.
    #[error("Nothing to enqueue: at least one target is required")]
    EmptyEnqueue,

    /// A target kind was registered twice.
    #[error("Target kind already registered: {0}")]
    KindAlreadyRegistered(String),

    /// Target resolution failed and the resolve-failure policy is `abort`.
    #[error("Resolution failed for queue entry #{entry_id}: {source}")]
    Resolve {
        entry_id: i64,
        #[source]
        source: ResolveError,
    },

    /// Invalid argument (out-of-range times, zero polling interval, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Generic error.
    #[error("{0}")]
    Custom(String),
}

/// Failure to turn a `(kind, id)` pair into an invocable target.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No target kind is registered under this tag.
    #[error("Unknown target kind: {0}")]
    UnknownKind(String),

    /// The kind's loader itself failed.
    #[error("Failed to load {kind} #{id}: {source}")]
    Lookup {
        kind: String,
        id: i64,
        #[source]
        source: ActionError,
    },
}

impl ResolveError {
    /// Source location of the underlying failure, if one was captured.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            ResolveError::UnknownKind(_) => None,
            ResolveError::Lookup { source, .. } => source.location(),
        }
    }
}

/// Error raised by a target while loading or performing an action.
///
/// Constructors are `#[track_caller]`, so the location where the error was
/// created is kept and shows up in the queue's error log.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ActionError {
    message: String,
    location: Option<&'static Location<'static>>,
}

impl ActionError {
    /// Create an error at the caller's location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: Some(Location::caller()),
        }
    }

    /// Wrap another error, recording the caller's location.
    #[track_caller]
    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        Self::new(err.to_string())
    }

    /// Error for an action name the target does not understand.
    #[track_caller]
    pub fn unknown_action(kind: &str, action: &str) -> Self {
        Self::new(format!("{} has no action '{}'", kind, action))
    }

    /// Error built from a caught panic; no location is available.
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            message: format!("panicked: {}", message.into()),
            location: None,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Where the error was created, if known.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_error_captures_location() {
        let err = ActionError::new("boom");
        let location = err.location().unwrap();
        assert!(location.file().ends_with("error.rs"));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_panicked_has_no_location() {
        let err = ActionError::panicked("index out of bounds");
        assert!(err.location().is_none());
        assert!(err.message().contains("index out of bounds"));
    }

    #[test]
    fn test_unknown_action_message() {
        let err = ActionError::unknown_action("article", "explode");
        assert!(err.to_string().contains("article"));
        assert!(err.to_string().contains("explode"));
    }

    #[test]
    fn test_resolve_error_display() {
        let err = ResolveError::Lookup {
            kind: "article".to_string(),
            id: 7,
            source: ActionError::new("connection reset"),
        };
        let msg = err.to_string();
        assert!(msg.contains("article #7"));
        assert!(msg.contains("connection reset"));
        assert!(err.location().is_some());

        let unknown = ResolveError::UnknownKind("ghost".to_string());
        assert!(unknown.location().is_none());
    }

    #[test]
    fn test_queue_error_wraps_resolve() {
        let err = QueueError::Resolve {
            entry_id: 3,
            source: ResolveError::UnknownKind("ghost".to_string()),
        };
        assert!(err.to_string().contains("#3"));
        assert!(err.to_string().contains("ghost"));
    }
}
