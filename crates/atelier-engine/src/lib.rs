//! # atelier-engine: Document Lifecycle Orchestration
//!
//! The layer callers embed. It ties the pure business logic of
//! `atelier-core` to the persistence of `atelier-db` and owns every
//! multi-step operation and the transaction it runs in.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Atelier CRM Engine Surface                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                atelier-engine (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   create_quote ─────────► DEVIS                                 │   │
//! │  │   convert_document ─────► BC / BL / PV / FACTURE / AVOIR        │   │
//! │  │   create_deposit_invoice► FACTURE_ACOMPTE (from DEVIS)          │   │
//! │  │   create_final_invoice ─► FACTURE with deposits deducted        │   │
//! │  │   verify_document ──────► recompute vs stored totals            │   │
//! │  │                                                                 │   │
//! │  │   Every write operation:                                        │   │
//! │  │   1. validate request            (atelier-core::validation)     │   │
//! │  │   2. check business rules        (atelier-core::transition)     │   │
//! │  │   3. compute totals              (atelier-core::calc)           │   │
//! │  │   4. allocate number + persist   (one atelier-db transaction)   │   │
//! │  │   5. emit audit event            (after commit)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use atelier_db::{Database, DbConfig};
//! use atelier_engine::{ConvertRequest, DocumentEngine};
//! use atelier_core::types::DocumentType;
//!
//! let db = Database::new(DbConfig::new("./atelier.db")).await?;
//! let engine = DocumentEngine::new(db);
//!
//! let quote = engine.create_quote(request).await?;
//! engine.set_status(&quote.id, DocumentStatus::Accepted).await?;
//! let order = engine
//!     .convert_document(&quote.id, ConvertRequest::to(DocumentType::BonCommande))
//!     .await?;
//! ```

use std::sync::Arc;

use atelier_core::types::{Document, DocumentItem, DocumentStatus};
use atelier_db::Database;

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod convert;
pub mod deposit;
pub mod error;
pub mod quote;
pub mod verify;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use convert::{ConvertRequest, ItemOverride};
pub use deposit::{CreateDepositRequest, CreateFinalInvoiceRequest, DepositSpec};
pub use error::{EngineError, EngineResult};
pub use quote::{CreateQuoteRequest, QuoteLine};

// =============================================================================
// Engine
// =============================================================================

/// The document lifecycle engine.
///
/// Cheap to clone-by-construction: holds the database handle and an audit
/// sink behind an `Arc`. One instance serves all callers.
pub struct DocumentEngine {
    db: Database,
    audit: Arc<dyn AuditSink>,
}

impl DocumentEngine {
    /// Creates an engine with the default tracing audit sink.
    pub fn new(db: Database) -> Self {
        DocumentEngine {
            db,
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Creates an engine with a custom audit sink.
    pub fn with_audit(db: Database, audit: Arc<dyn AuditSink>) -> Self {
        DocumentEngine { db, audit }
    }

    /// The underlying database handle.
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn audit(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }

    /// Loads a document with its line items.
    pub async fn get_document(&self, id: &str) -> EngineResult<(Document, Vec<DocumentItem>)> {
        let documents = self.db.documents();
        let doc = documents.get(id).await?;
        let items = documents.items(id).await?;
        Ok((doc, items))
    }

    /// Sets a document's lifecycle status.
    ///
    /// Status changes themselves are unconstrained (marking a quote
    /// ACCEPTED, an order CONFIRMED, a delivery DELIVERED is a human
    /// decision); the conversion gates enforce where a status is
    /// *required*.
    pub async fn set_status(&self, id: &str, status: DocumentStatus) -> EngineResult<Document> {
        let documents = self.db.documents();
        let doc = documents.get(id).await?;
        documents.update_status(id, status).await?;

        self.audit().record(AuditEvent {
            action: "status_change",
            entity: "Document",
            entity_id: doc.id.clone(),
            description: format!("{} {} passé de {} à {}", doc.doc_type, doc.number, doc.status, status),
            document_number: doc.number.clone(),
            document_type: doc.doc_type,
            document_amount: doc.total_ttc,
            category: "lifecycle",
        });

        Ok(documents.get(id).await?)
    }
}
