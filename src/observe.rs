use std::sync::{Arc, Mutex};

use crate::{error::AuthError, roles::Role};

/// Event
///
/// Something the core wants an operator to know about. The core emits these
/// through an `Observer` and never touches a concrete logger itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    TokenIssued { subject_id: i64, role: Role },
    CredentialRejected { reason: AuthError },
    LoginFailed { username: String },
    EntityCreated { kind: &'static str, id: i64 },
    EntityUpdated { kind: &'static str, id: i64 },
    EntitySoftDeleted { kind: &'static str, id: i64 },
    InternalFailure { context: &'static str, detail: String },
}

pub trait Observer: Send + Sync {
    fn observe(&self, event: &Event);
}

pub type ObserverState = Arc<dyn Observer>;

/// Forwards events to `tracing`, which main.rs wires to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, event: &Event) {
        match event {
            Event::TokenIssued { subject_id, role } => {
                tracing::info!(subject_id, %role, "access token issued");
            }
            Event::CredentialRejected { reason } => {
                tracing::debug!(%reason, "credential rejected");
            }
            Event::LoginFailed { username } => {
                tracing::info!(%username, "login failed");
            }
            Event::EntityCreated { kind, id } => {
                tracing::info!(kind, id, "entity created");
            }
            Event::EntityUpdated { kind, id } => {
                tracing::info!(kind, id, "entity updated");
            }
            Event::EntitySoftDeleted { kind, id } => {
                tracing::info!(kind, id, "entity soft-deleted");
            }
            Event::InternalFailure { context, detail } => {
                tracing::error!(context, %detail, "internal failure");
            }
        }
    }
}

/// Keeps every observed event in memory. Test helper.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Observer for RecordingObserver {
    fn observe(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
