//! # Audit Trail
//!
//! Every financial operation emits an [`AuditEvent`] describing what
//! happened, to which document, and for how much.
//!
//! ## Fire-and-Forget
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Engine Operation                                                       │
//! │       │                                                                 │
//! │       ├──► document transaction (commit decides success)               │
//! │       │                                                                 │
//! │       └──► audit sink (AFTER commit, never inside the transaction)     │
//! │                                                                         │
//! │  A sink failure must never roll back a committed invoice, so events    │
//! │  are recorded best-effort after the fact.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The default sink writes structured `tracing` records; embedders can
//! plug their own sink (database table, message queue) via
//! [`crate::DocumentEngine::with_audit`].

use serde::Serialize;
use std::sync::Mutex;
use tracing::info;

use atelier_core::money::Money;
use atelier_core::types::DocumentType;

/// One audit trail entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// What happened ("create", "convert", "status_change").
    pub action: &'static str,
    /// Entity kind, always "Document" today.
    pub entity: &'static str,
    pub entity_id: String,
    /// Human-readable description for the trail UI.
    pub description: String,
    pub document_number: String,
    pub document_type: DocumentType,
    /// The amount the operation moved or created.
    pub document_amount: Money,
    /// Trail category ("financial", "lifecycle").
    pub category: &'static str,
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: structured tracing records.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            action = event.action,
            entity = event.entity,
            entity_id = %event.entity_id,
            document = %event.document_number,
            doc_type = %event.document_type,
            amount = %event.document_amount,
            category = event.category,
            "{}",
            event.description
        );
    }
}

/// In-memory sink for tests: collects every event for assertions.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_events() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditEvent {
            action: "create",
            entity: "Document",
            entity_id: "doc-1".to_string(),
            description: "Devis créé".to_string(),
            document_number: "D-2025-000001".to_string(),
            document_type: DocumentType::Devis,
            document_amount: Money::from_centimes(240_000),
            category: "financial",
        });

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "create");
        assert_eq!(events[0].document_number, "D-2025-000001");
    }
}
