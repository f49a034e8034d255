//! Audit events emitted at specific points of a grant exchange.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::BackendError;

/// What an [`Event`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Login,
    SuspiciousRequest,
}

impl EventAction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::SuspiciousRequest => "suspicious_request",
        }
    }
}

/// Structured audit record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub action: EventAction,
    pub created: DateTime<Utc>,
    pub user_pk: Option<Uuid>,
    pub client_ip: Option<String>,
    pub context: Map<String, Value>,
}

impl Event {
    #[must_use]
    pub fn new(action: EventAction) -> Self {
        Self {
            action,
            created: Utc::now(),
            user_pk: None,
            client_ip: None,
            context: Map::new(),
        }
    }

    #[must_use]
    pub const fn with_user(mut self, user_pk: Uuid) -> Self {
        self.user_pk = Some(user_pk);
        self
    }

    #[must_use]
    pub fn with_client_ip(mut self, client_ip: Option<String>) -> Self {
        self.client_ip = client_ip;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Receives audit events. Called inline, in order.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Records `event`. A failure aborts the request that raised it.
    async fn emit(&self, event: Event) -> Result<(), BackendError>;
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) -> Result<(), BackendError> {
        let context = Value::Object(event.context);
        match event.action {
            EventAction::SuspiciousRequest => warn!(
                action = event.action.as_str(),
                client_ip = event.client_ip.as_deref().unwrap_or("-"),
                context = %context,
                "Security event"
            ),
            EventAction::Login => info!(
                action = event.action.as_str(),
                user_pk = ?event.user_pk,
                client_ip = event.client_ip.as_deref().unwrap_or("-"),
                context = %context,
                "Audit event"
            ),
        }
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    pub async fn with_action(&self, action: EventAction) -> Vec<Event> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn emit(&self, event: Event) -> Result<(), BackendError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_records_in_order() {
        let sink = MemoryEventSink::new();
        sink.emit(Event::new(EventAction::Login)).await.unwrap();
        sink.emit(
            Event::new(EventAction::SuspiciousRequest).with_context("token", "fp"),
        )
        .await
        .unwrap();

        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, EventAction::Login);
        assert_eq!(events[1].context["token"], "fp");
        assert_eq!(sink.with_action(EventAction::Login).await.len(), 1);
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        let sink = TracingEventSink;
        assert!(sink.emit(Event::new(EventAction::Login)).await.is_ok());
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_value(EventAction::SuspiciousRequest).unwrap();
        assert_eq!(json, "suspicious_request");
    }
}
