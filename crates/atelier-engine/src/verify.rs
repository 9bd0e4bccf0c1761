//! # Totals Verification
//!
//! Recomputes a stored document's totals and reports drift. Diagnostic
//! only: a discrepancy is logged and returned, never turned into an
//! error, because the stored document is the legal record.

use tracing::warn;

use atelier_core::calc::{verify_document_totals, VerificationReport};

use crate::error::EngineResult;
use crate::DocumentEngine;

impl DocumentEngine {
    /// Recomputes a document's totals from its stored lines and compares
    /// against the stored values, tolerating one centime of drift.
    ///
    /// ## When This Occurs
    /// - Health checks over documents written by older calculator versions
    /// - After manual corrections in the database
    ///
    /// Synthetic documents (deposit invoices, invoices with deduction
    /// lines) legitimately fail the line-level recomputation, since their
    /// lines are proportional slices rather than `quantity × price`;
    /// callers should treat their reports as informational.
    pub async fn verify_document(&self, id: &str) -> EngineResult<VerificationReport> {
        let (document, items) = self.get_document(id).await?;
        let report = verify_document_totals(&document, &items);

        if !report.is_valid {
            warn!(
                number = %document.number,
                discrepancies = report.discrepancies.len(),
                "Stored totals differ from recalculation"
            );
        }

        Ok(report)
    }
}
