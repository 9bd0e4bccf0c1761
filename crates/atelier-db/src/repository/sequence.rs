//! # Sequence Repository — Document Number Generator
//!
//! Allocates gap-tolerant, strictly increasing document numbers of the
//! form `{PREFIX}-{YEAR}-{NNNNNN}` (e.g. `F-2025-000042`), one counter
//! per (document type, year).
//!
//! ## Atomicity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two conversions allocate an F number at the same instant:             │
//! │                                                                         │
//! │  Conn A ──► INSERT .. ON CONFLICT DO UPDATE                            │
//! │             SET last_number = last_number + 1 RETURNING last_number    │
//! │  Conn B ──► (queues on SQLite's write lock, then runs the same)        │
//! │                                                                         │
//! │  One statement = read-modify-write under the write lock.               │
//! │  No SELECT-then-UPDATE window, so no duplicate numbers, ever.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Never Burn a Number
//! `allocate_in` runs inside the caller's document-creation transaction:
//! if the document insert fails, the rollback returns the number. Gaps
//! can still appear after a commit followed by a later failure elsewhere;
//! the sequence only promises uniqueness and increase, not density.

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use atelier_core::types::DocumentType;

use crate::error::DbResult;

/// Number of digits in the padded sequence part.
const SEQUENCE_DIGITS: usize = 6;

/// Formats a document number from its parts.
fn format_number(doc_type: DocumentType, year: i32, n: i64) -> String {
    format!(
        "{}-{}-{:0width$}",
        doc_type.prefix(),
        year,
        n,
        width = SEQUENCE_DIGITS
    )
}

/// Repository for document number sequences.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Allocates the next number for `(doc_type, year)` in its own
    /// transaction.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let number = db.sequences().allocate(DocumentType::Facture, 2025).await?;
    /// assert_eq!(number, "F-2025-000001");
    /// ```
    pub async fn allocate(&self, doc_type: DocumentType, year: i32) -> DbResult<String> {
        let mut tx = self.pool.begin().await?;
        let number = Self::allocate_in(&mut tx, doc_type, year).await?;
        tx.commit().await?;
        Ok(number)
    }

    /// Allocates the next number inside a caller-owned transaction.
    ///
    /// Used by the engine so the number and the document it identifies
    /// commit or roll back together.
    pub async fn allocate_in(
        tx: &mut Transaction<'_, Sqlite>,
        doc_type: DocumentType,
        year: i32,
    ) -> DbResult<String> {
        // Single-statement upsert-increment: atomic under SQLite's write
        // lock, no read-modify-write window.
        let n: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_sequences (doc_type, prefix, year, last_number)
            VALUES (?, ?, ?, 1)
            ON CONFLICT(doc_type, year)
            DO UPDATE SET last_number = last_number + 1
            RETURNING last_number
            "#,
        )
        .bind(doc_type.as_str())
        .bind(doc_type.prefix())
        .bind(year)
        .fetch_one(&mut **tx)
        .await?;

        let number = format_number(doc_type, year, n);
        debug!(number = %number, "Allocated document number");
        Ok(number)
    }

    /// Returns the last issued sequence value for `(doc_type, year)`,
    /// or 0 when none was issued yet.
    pub async fn current(&self, doc_type: DocumentType, year: i32) -> DbResult<i64> {
        let n: Option<i64> = sqlx::query_scalar(
            "SELECT last_number FROM document_sequences WHERE doc_type = ? AND year = ?",
        )
        .bind(doc_type.as_str())
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(n.unwrap_or(0))
    }

    /// Previews the next number WITHOUT consuming it.
    ///
    /// ## When This Occurs
    /// UI shows "this quote will be D-2025-000043" before the user saves.
    /// Another writer may take the previewed number first; only
    /// `allocate` reserves.
    pub async fn peek_next(&self, doc_type: DocumentType, year: i32) -> DbResult<String> {
        let current = self.current(doc_type, year).await?;
        Ok(format_number(doc_type, year, current + 1))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::collections::HashSet;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_allocation_is_sequential() {
        let db = test_db().await;
        let sequences = db.sequences();

        let first = sequences.allocate(DocumentType::Devis, 2025).await.unwrap();
        let second = sequences.allocate(DocumentType::Devis, 2025).await.unwrap();
        let third = sequences.allocate(DocumentType::Devis, 2025).await.unwrap();

        assert_eq!(first, "D-2025-000001");
        assert_eq!(second, "D-2025-000002");
        assert_eq!(third, "D-2025-000003");
    }

    #[tokio::test]
    async fn test_types_and_years_are_independent() {
        let db = test_db().await;
        let sequences = db.sequences();

        let devis = sequences.allocate(DocumentType::Devis, 2025).await.unwrap();
        let facture = sequences
            .allocate(DocumentType::Facture, 2025)
            .await
            .unwrap();
        let devis_next_year = sequences.allocate(DocumentType::Devis, 2026).await.unwrap();

        assert_eq!(devis, "D-2025-000001");
        assert_eq!(facture, "F-2025-000001");
        assert_eq!(devis_next_year, "D-2026-000001");
    }

    #[tokio::test]
    async fn test_deposit_prefix() {
        let db = test_db().await;
        let number = db
            .sequences()
            .allocate(DocumentType::FactureAcompte, 2025)
            .await
            .unwrap();
        assert_eq!(number, "FA-2025-000001");
    }

    #[tokio::test]
    async fn test_peek_does_not_consume() {
        let db = test_db().await;
        let sequences = db.sequences();

        assert_eq!(
            sequences
                .peek_next(DocumentType::BonCommande, 2025)
                .await
                .unwrap(),
            "BC-2025-000001"
        );
        assert_eq!(sequences.current(DocumentType::BonCommande, 2025).await.unwrap(), 0);

        let allocated = sequences
            .allocate(DocumentType::BonCommande, 2025)
            .await
            .unwrap();
        assert_eq!(allocated, "BC-2025-000001");
        assert_eq!(
            sequences
                .peek_next(DocumentType::BonCommande, 2025)
                .await
                .unwrap(),
            "BC-2025-000002"
        );
    }

    #[tokio::test]
    async fn test_rollback_returns_the_number() {
        let db = test_db().await;
        let sequences = db.sequences();

        let mut tx = db.begin().await.unwrap();
        let number = SequenceRepository::allocate_in(&mut tx, DocumentType::Facture, 2025)
            .await
            .unwrap();
        assert_eq!(number, "F-2025-000001");
        tx.rollback().await.unwrap();

        // The rolled-back allocation never happened.
        let next = sequences.allocate(DocumentType::Facture, 2025).await.unwrap();
        assert_eq!(next, "F-2025-000001");
    }

    /// 100 concurrent allocations must yield 100 distinct numbers.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_allocations_are_unique() {
        let db = test_db().await;

        let mut handles = Vec::new();
        for _ in 0..100 {
            let sequences = db.sequences();
            handles.push(tokio::spawn(async move {
                sequences.allocate(DocumentType::Facture, 2025).await
            }));
        }

        let mut numbers = HashSet::new();
        for handle in handles {
            let number = handle.await.unwrap().unwrap();
            assert!(numbers.insert(number.clone()), "duplicate number {number}");
        }

        assert_eq!(numbers.len(), 100);
        assert_eq!(db.sequences().current(DocumentType::Facture, 2025).await.unwrap(), 100);
    }
}
