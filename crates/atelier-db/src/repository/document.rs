//! # Document Repository
//!
//! Persistence for commercial documents and their line items.
//!
//! ## Responsibilities
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     DocumentRepository                                  │
//! │                                                                         │
//! │  Lookups        get / find / get_by_number / items                     │
//! │  Writes         insert_in, insert_item_in (transaction-scoped)         │
//! │  Lifecycle      update_status, record_payment                          │
//! │  Deposits       deposit_invoices_for_quote, link_deposit_to_invoice_in │
//! │  Deliveries     delivered_quantities_for_source (per-line cumulative)  │
//! │  Ancestry       resolve_source_quote (bounded parent walk)             │
//! │                                                                         │
//! │  All document/item writes happen inside an engine-owned transaction    │
//! │  so a document, its items, its number and its source's status update   │
//! │  commit or roll back together.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Column Mapping
//! Enums are stored as their SCREAMING_SNAKE names, `Money` as INTEGER
//! centimes, `Decimal` as TEXT, the VAT breakdown and applied-deposit ids
//! as JSON TEXT. Decoding failures surface as `DbError::Decode` with the
//! column name.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use atelier_core::money::Money;
use atelier_core::types::{
    ClientSnapshot, DiscountKind, Document, DocumentItem, DocumentStatus, DocumentType,
    GlobalDiscount, RefChain, TvaRate, VatLine,
};
use atelier_core::MAX_QUOTE_LOOKUP_DEPTH;

use crate::error::{DbError, DbResult};

// =============================================================================
// Row Mapping
// =============================================================================

fn parse_decimal(column: &'static str, raw: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw).map_err(|e| DbError::decode(column, e))
}

fn opt_decimal(column: &'static str, raw: Option<String>) -> DbResult<Option<Decimal>> {
    raw.map(|s| parse_decimal(column, &s)).transpose()
}

fn money(row: &SqliteRow, column: &str) -> DbResult<Money> {
    Ok(Money::from_centimes(row.try_get::<i64, _>(column)?))
}

fn map_document(row: &SqliteRow) -> DbResult<Document> {
    let doc_type: DocumentType = row
        .try_get::<String, _>("doc_type")?
        .parse()
        .map_err(|e| DbError::decode("doc_type", e))?;
    let status: DocumentStatus = row
        .try_get::<String, _>("status")?
        .parse()
        .map_err(|e| DbError::decode("status", e))?;

    let discount = match (
        row.try_get::<Option<String>, _>("discount_kind")?,
        row.try_get::<Option<String>, _>("discount_value")?,
    ) {
        (Some(kind), Some(value)) => Some(GlobalDiscount {
            kind: kind
                .parse::<DiscountKind>()
                .map_err(|e| DbError::decode("discount_kind", e))?,
            value: parse_decimal("discount_value", &value)?,
        }),
        _ => None,
    };

    let tva_details: Vec<VatLine> =
        serde_json::from_str(&row.try_get::<String, _>("tva_details")?)
            .map_err(|e| DbError::decode("tva_details", e))?;
    let applied_deposit_ids: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("applied_deposit_ids")?)
            .map_err(|e| DbError::decode("applied_deposit_ids", e))?;

    Ok(Document {
        id: row.try_get("id")?,
        doc_type,
        number: row.try_get("number")?,
        status,
        parent_id: row.try_get("parent_id")?,
        refs: RefChain {
            devis_ref: row.try_get("devis_ref")?,
            bc_ref: row.try_get("bc_ref")?,
            bl_ref: row.try_get("bl_ref")?,
            pv_ref: row.try_get("pv_ref")?,
            facture_ref: row.try_get("facture_ref")?,
        },
        client: ClientSnapshot {
            name: row.try_get("client_name")?,
            address: row.try_get("client_address")?,
            city: row.try_get("client_city")?,
            tax_id: row.try_get("client_tax_id")?,
            phone: row.try_get("client_phone")?,
            email: row.try_get("client_email")?,
        },
        date: row.try_get("date")?,
        due_date: row.try_get("due_date")?,
        delivery_date: row.try_get("delivery_date")?,
        delivery_address: row.try_get("delivery_address")?,
        delivery_city: row.try_get("delivery_city")?,
        delivery_notes: row.try_get("delivery_notes")?,
        net_ht: money(row, "net_ht")?,
        discount,
        discount_amount: money(row, "discount_amount")?,
        total_ht: money(row, "total_ht")?,
        tva_details,
        total_tva: money(row, "total_tva")?,
        total_ttc: money(row, "total_ttc")?,
        paid_amount: money(row, "paid_amount")?,
        balance: money(row, "balance")?,
        deposit_percent: opt_decimal(
            "deposit_percent",
            row.try_get::<Option<String>, _>("deposit_percent")?,
        )?,
        deposit_amount: row
            .try_get::<Option<i64>, _>("deposit_amount")?
            .map(Money::from_centimes),
        is_deposit_invoice: row.try_get("is_deposit_invoice")?,
        linked_devis_id: row.try_get("linked_devis_id")?,
        deposit_invoice_id: row.try_get("deposit_invoice_id")?,
        total_deposits_applied: money(row, "total_deposits_applied")?,
        applied_deposit_ids,
        amount_due: money(row, "amount_due")?,
        avoir_reason: row.try_get("avoir_reason")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_item(row: &SqliteRow) -> DbResult<DocumentItem> {
    Ok(DocumentItem {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        source_item_id: row.try_get("source_item_id")?,
        designation: row.try_get("designation")?,
        description: row.try_get("description")?,
        quantity: parse_decimal("quantity", &row.try_get::<String, _>("quantity")?)?,
        unit: row.try_get("unit")?,
        unit_price_ht: money(row, "unit_price_ht")?,
        discount_percent: parse_decimal(
            "discount_percent",
            &row.try_get::<String, _>("discount_percent")?,
        )?,
        discount_amount: money(row, "discount_amount")?,
        tva_rate: TvaRate::from_percent(parse_decimal(
            "tva_rate",
            &row.try_get::<String, _>("tva_rate")?,
        )?),
        total_ht: money(row, "total_ht")?,
        total_tva: money(row, "total_tva")?,
        total_ttc: money(row, "total_ttc")?,
        ordered_qty: opt_decimal("ordered_qty", row.try_get::<Option<String>, _>("ordered_qty")?)?,
        delivered_qty: opt_decimal(
            "delivered_qty",
            row.try_get::<Option<String>, _>("delivered_qty")?,
        )?,
        position: row.try_get("position")?,
    })
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for commercial documents.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Finds a document by id, returning None when absent.
    pub async fn find(&self, id: &str) -> DbResult<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_document).transpose()
    }

    /// Gets a document by id, failing with NotFound when absent.
    pub async fn get(&self, id: &str) -> DbResult<Document> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))
    }

    /// Finds a document by its unique number.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE number = ?")
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_document).transpose()
    }

    /// Loads a document's items in display order.
    pub async fn items(&self, document_id: &str) -> DbResult<Vec<DocumentItem>> {
        let rows =
            sqlx::query("SELECT * FROM document_items WHERE document_id = ? ORDER BY position")
                .bind(document_id)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(map_item).collect()
    }

    // =========================================================================
    // Writes (transaction-scoped)
    // =========================================================================

    /// Inserts a document inside a caller-owned transaction.
    pub async fn insert_in(tx: &mut Transaction<'_, Sqlite>, doc: &Document) -> DbResult<()> {
        let tva_details = serde_json::to_string(&doc.tva_details)
            .map_err(|e| DbError::Internal(e.to_string()))?;
        let applied_ids = serde_json::to_string(&doc.applied_deposit_ids)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO documents (
                id, doc_type, number, status, parent_id,
                devis_ref, bc_ref, bl_ref, pv_ref, facture_ref,
                client_name, client_address, client_city, client_tax_id,
                client_phone, client_email,
                date, due_date,
                delivery_date, delivery_address, delivery_city, delivery_notes,
                net_ht, discount_kind, discount_value, discount_amount,
                total_ht, tva_details, total_tva, total_ttc,
                paid_amount, balance,
                deposit_percent, deposit_amount, is_deposit_invoice,
                linked_devis_id, deposit_invoice_id,
                total_deposits_applied, applied_deposit_ids, amount_due,
                avoir_reason, notes, created_at, updated_at
            ) VALUES (
                ?, ?, ?, ?, ?,
                ?, ?, ?, ?, ?,
                ?, ?, ?, ?, ?, ?,
                ?, ?,
                ?, ?, ?, ?,
                ?, ?, ?, ?,
                ?, ?, ?, ?,
                ?, ?,
                ?, ?, ?, ?, ?,
                ?, ?, ?,
                ?, ?, ?, ?
            )
            "#,
        )
        .bind(&doc.id)
        .bind(doc.doc_type.as_str())
        .bind(&doc.number)
        .bind(doc.status.as_str())
        .bind(&doc.parent_id)
        .bind(&doc.refs.devis_ref)
        .bind(&doc.refs.bc_ref)
        .bind(&doc.refs.bl_ref)
        .bind(&doc.refs.pv_ref)
        .bind(&doc.refs.facture_ref)
        .bind(&doc.client.name)
        .bind(&doc.client.address)
        .bind(&doc.client.city)
        .bind(&doc.client.tax_id)
        .bind(&doc.client.phone)
        .bind(&doc.client.email)
        .bind(doc.date)
        .bind(doc.due_date)
        .bind(doc.delivery_date)
        .bind(&doc.delivery_address)
        .bind(&doc.delivery_city)
        .bind(&doc.delivery_notes)
        .bind(doc.net_ht.centimes())
        .bind(doc.discount.map(|d| d.kind.as_str()))
        .bind(doc.discount.map(|d| d.value.to_string()))
        .bind(doc.discount_amount.centimes())
        .bind(doc.total_ht.centimes())
        .bind(tva_details)
        .bind(doc.total_tva.centimes())
        .bind(doc.total_ttc.centimes())
        .bind(doc.paid_amount.centimes())
        .bind(doc.balance.centimes())
        .bind(doc.deposit_percent.map(|d| d.to_string()))
        .bind(doc.deposit_amount.map(|m| m.centimes()))
        .bind(doc.is_deposit_invoice)
        .bind(&doc.linked_devis_id)
        .bind(&doc.deposit_invoice_id)
        .bind(doc.total_deposits_applied.centimes())
        .bind(applied_ids)
        .bind(doc.amount_due.centimes())
        .bind(&doc.avoir_reason)
        .bind(&doc.notes)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&mut **tx)
        .await?;

        debug!(id = %doc.id, number = %doc.number, "Inserted document");
        Ok(())
    }

    /// Inserts a line item inside a caller-owned transaction.
    pub async fn insert_item_in(
        tx: &mut Transaction<'_, Sqlite>,
        item: &DocumentItem,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO document_items (
                id, document_id, source_item_id, designation, description,
                quantity, unit, unit_price_ht,
                discount_percent, discount_amount, tva_rate,
                total_ht, total_tva, total_ttc,
                ordered_qty, delivered_qty, position
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.document_id)
        .bind(&item.source_item_id)
        .bind(&item.designation)
        .bind(&item.description)
        .bind(item.quantity.to_string())
        .bind(&item.unit)
        .bind(item.unit_price_ht.centimes())
        .bind(item.discount_percent.to_string())
        .bind(item.discount_amount.centimes())
        .bind(item.tva_rate.percent().to_string())
        .bind(item.total_ht.centimes())
        .bind(item.total_tva.centimes())
        .bind(item.total_ttc.centimes())
        .bind(item.ordered_qty.map(|q| q.to_string()))
        .bind(item.delivered_qty.map(|q| q.to_string()))
        .bind(item.position)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Lifecycle Updates
    // =========================================================================

    /// Updates a document's status.
    pub async fn update_status(&self, id: &str, status: DocumentStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Document", id));
        }

        debug!(id = %id, status = %status, "Updated document status");
        Ok(())
    }

    /// Updates a document's status inside a caller-owned transaction.
    pub async fn update_status_in(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
        status: DocumentStatus,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Document", id));
        }
        Ok(())
    }

    /// Records a payment against a document.
    ///
    /// The payment collaborator's surface: adds to `paid_amount`,
    /// recomputes `balance`, and flips the status to PAID (settled) or
    /// PARTIAL (something still owed).
    pub async fn record_payment(&self, id: &str, amount: Money) -> DbResult<Document> {
        let doc = self.get(id).await?;

        let paid = doc.paid_amount + amount;
        let balance = (doc.total_ttc - paid).clamp_non_negative();
        let status = if balance.is_zero() {
            DocumentStatus::Paid
        } else {
            DocumentStatus::Partial
        };

        sqlx::query(
            "UPDATE documents SET paid_amount = ?, balance = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(paid.centimes())
        .bind(balance.centimes())
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        debug!(id = %id, paid = %paid, balance = %balance, "Recorded payment");
        self.get(id).await
    }

    // =========================================================================
    // Deposit Queries
    // =========================================================================

    /// All non-cancelled deposit invoices drawing on a quote, oldest first.
    ///
    /// Used for the deposit cap (issued-but-unpaid deposits still reserve
    /// their share) and for final-invoice deduction (filtered to PAID by
    /// the caller).
    pub async fn deposit_invoices_for_quote(&self, devis_id: &str) -> DbResult<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM documents
            WHERE is_deposit_invoice = 1
              AND linked_devis_id = ?
              AND status != 'CANCELLED'
            ORDER BY created_at
            "#,
        )
        .bind(devis_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_document).collect()
    }

    /// Transaction-scoped variant of [`Self::deposit_invoices_for_quote`].
    ///
    /// The deposit cap is check-then-act; running the read inside the
    /// deposit's creation transaction keeps two concurrent deposits on
    /// the same quote from both passing the cap.
    pub async fn deposit_invoices_for_quote_in(
        tx: &mut Transaction<'_, Sqlite>,
        devis_id: &str,
    ) -> DbResult<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM documents
            WHERE is_deposit_invoice = 1
              AND linked_devis_id = ?
              AND status != 'CANCELLED'
            ORDER BY created_at
            "#,
        )
        .bind(devis_id)
        .fetch_all(&mut **tx)
        .await?;
        rows.iter().map(map_document).collect()
    }

    /// Back-links a deposit invoice to the final invoice that consumed it,
    /// inside the final invoice's creation transaction.
    pub async fn link_deposit_to_invoice_in(
        tx: &mut Transaction<'_, Sqlite>,
        deposit_id: &str,
        final_invoice_id: &str,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE documents SET deposit_invoice_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(final_invoice_id)
        .bind(Utc::now())
        .bind(deposit_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Document", deposit_id));
        }
        Ok(())
    }

    // =========================================================================
    // Delivery Tracking
    // =========================================================================

    /// Cumulative delivered quantity per source line, summed over every
    /// non-cancelled delivery note created from `source_id`.
    ///
    /// ## Rules
    /// - Keyed by the SOURCE line's id (`source_item_id` on BL lines)
    /// - Lines never delivered are simply absent from the map
    /// - Cancelled delivery notes return their quantities to the pool
    pub async fn delivered_quantities_for_source(
        &self,
        source_id: &str,
    ) -> DbResult<HashMap<String, Decimal>> {
        let rows = sqlx::query(
            r#"
            SELECT i.source_item_id AS source_item_id,
                   i.delivered_qty AS delivered_qty
            FROM document_items i
            JOIN documents d ON d.id = i.document_id
            WHERE d.parent_id = ?
              AND d.doc_type = 'BON_LIVRAISON'
              AND d.status != 'CANCELLED'
              AND i.source_item_id IS NOT NULL
              AND i.delivered_qty IS NOT NULL
            "#,
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        let mut totals: HashMap<String, Decimal> = HashMap::new();
        for row in &rows {
            let source_item: String = row.try_get("source_item_id")?;
            let qty = parse_decimal(
                "delivered_qty",
                &row.try_get::<String, _>("delivered_qty")?,
            )?;
            *totals.entry(source_item).or_insert(Decimal::ZERO) += qty;
        }
        Ok(totals)
    }

    // =========================================================================
    // Ancestry
    // =========================================================================

    /// Resolves the quote behind a document.
    ///
    /// ## Rules
    /// 1. If the document carries `devis_ref`, look the quote up by number
    /// 2. Otherwise walk `parent_id` at most 3 hops (the longest chain is
    ///    DEVIS → BC → BL → PV)
    /// 3. `Ok(None)` when no quote exists — ad-hoc invoices have none
    pub async fn resolve_source_quote(&self, source: &Document) -> DbResult<Option<Document>> {
        if let Some(devis_ref) = &source.refs.devis_ref {
            if let Some(doc) = self.get_by_number(devis_ref).await? {
                if doc.doc_type == DocumentType::Devis {
                    return Ok(Some(doc));
                }
            }
        }

        let mut current_parent = source.parent_id.clone();
        for _ in 0..MAX_QUOTE_LOOKUP_DEPTH {
            let Some(parent_id) = current_parent else {
                return Ok(None);
            };
            let Some(parent) = self.find(&parent_id).await? else {
                return Ok(None);
            };
            if parent.doc_type == DocumentType::Devis {
                return Ok(Some(parent));
            }
            current_parent = parent.parent_id;
        }

        Ok(None)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use rust_decimal_macros::dec;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample_document(id: &str, number: &str, doc_type: DocumentType) -> Document {
        let now = Utc::now();
        Document {
            id: id.to_string(),
            doc_type,
            number: number.to_string(),
            status: DocumentStatus::Draft,
            parent_id: None,
            refs: RefChain::default(),
            client: ClientSnapshot {
                name: "Menuiserie Atlas".to_string(),
                address: Some("12 Rue des Artisans".to_string()),
                city: Some("Casablanca".to_string()),
                tax_id: Some("ICE0012345".to_string()),
                phone: None,
                email: None,
            },
            date: now,
            due_date: None,
            delivery_date: None,
            delivery_address: None,
            delivery_city: None,
            delivery_notes: None,
            net_ht: Money::from_centimes(200_000),
            discount: None,
            discount_amount: Money::zero(),
            total_ht: Money::from_centimes(200_000),
            tva_details: vec![VatLine {
                rate: TvaRate::from_percent(dec!(20)),
                base_ht: Money::from_centimes(200_000),
                amount: Money::from_centimes(40_000),
            }],
            total_tva: Money::from_centimes(40_000),
            total_ttc: Money::from_centimes(240_000),
            paid_amount: Money::zero(),
            balance: Money::from_centimes(240_000),
            deposit_percent: None,
            deposit_amount: None,
            is_deposit_invoice: false,
            linked_devis_id: None,
            deposit_invoice_id: None,
            total_deposits_applied: Money::zero(),
            applied_deposit_ids: Vec::new(),
            amount_due: Money::from_centimes(240_000),
            avoir_reason: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_item(id: &str, document_id: &str) -> DocumentItem {
        DocumentItem {
            id: id.to_string(),
            document_id: document_id.to_string(),
            source_item_id: None,
            designation: "Panneau chêne massif".to_string(),
            description: None,
            quantity: dec!(2),
            unit: Some("u".to_string()),
            unit_price_ht: Money::from_centimes(100_000),
            discount_percent: dec!(0),
            discount_amount: Money::zero(),
            tva_rate: TvaRate::from_percent(dec!(20)),
            total_ht: Money::from_centimes(200_000),
            total_tva: Money::from_centimes(40_000),
            total_ttc: Money::from_centimes(240_000),
            ordered_qty: None,
            delivered_qty: None,
            position: 0,
        }
    }

    async fn insert(db: &Database, doc: &Document) {
        let mut tx = db.begin().await.unwrap();
        DocumentRepository::insert_in(&mut tx, doc).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let db = test_db().await;
        let doc = sample_document("doc-1", "D-2025-000001", DocumentType::Devis);

        let mut tx = db.begin().await.unwrap();
        DocumentRepository::insert_in(&mut tx, &doc).await.unwrap();
        DocumentRepository::insert_item_in(&mut tx, &sample_item("item-1", "doc-1"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let loaded = db.documents().get("doc-1").await.unwrap();
        assert_eq!(loaded.number, "D-2025-000001");
        assert_eq!(loaded.doc_type, DocumentType::Devis);
        assert_eq!(loaded.total_ttc.centimes(), 240_000);
        assert_eq!(loaded.tva_details.len(), 1);
        assert_eq!(loaded.tva_details[0].amount.centimes(), 40_000);
        assert_eq!(loaded.client.name, "Menuiserie Atlas");

        let items = db.documents().items("doc-1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, dec!(2));
        assert_eq!(items[0].tva_rate.percent(), dec!(20));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let db = test_db().await;
        let err = db.documents().get("nope").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_number_rejected() {
        let db = test_db().await;
        insert(&db, &sample_document("doc-1", "D-2025-000001", DocumentType::Devis)).await;

        let mut tx = db.begin().await.unwrap();
        let err =
            DocumentRepository::insert_in(&mut tx, &sample_document("doc-2", "D-2025-000001", DocumentType::Devis))
                .await
                .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_status() {
        let db = test_db().await;
        insert(&db, &sample_document("doc-1", "D-2025-000001", DocumentType::Devis)).await;

        db.documents()
            .update_status("doc-1", DocumentStatus::Accepted)
            .await
            .unwrap();
        let loaded = db.documents().get("doc-1").await.unwrap();
        assert_eq!(loaded.status, DocumentStatus::Accepted);
    }

    #[tokio::test]
    async fn test_record_payment_partial_then_paid() {
        let db = test_db().await;
        insert(&db, &sample_document("f-1", "F-2025-000001", DocumentType::Facture)).await;

        let after_first = db
            .documents()
            .record_payment("f-1", Money::from_centimes(100_000))
            .await
            .unwrap();
        assert_eq!(after_first.status, DocumentStatus::Partial);
        assert_eq!(after_first.balance.centimes(), 140_000);

        let after_second = db
            .documents()
            .record_payment("f-1", Money::from_centimes(140_000))
            .await
            .unwrap();
        assert_eq!(after_second.status, DocumentStatus::Paid);
        assert!(after_second.balance.is_zero());
    }

    #[tokio::test]
    async fn test_resolve_source_quote_by_parent_walk() {
        let db = test_db().await;

        let devis = sample_document("devis-1", "D-2025-000001", DocumentType::Devis);
        let mut bc = sample_document("bc-1", "BC-2025-000001", DocumentType::BonCommande);
        bc.parent_id = Some("devis-1".to_string());
        let mut bl = sample_document("bl-1", "BL-2025-000001", DocumentType::BonLivraison);
        bl.parent_id = Some("bc-1".to_string());

        insert(&db, &devis).await;
        insert(&db, &bc).await;
        insert(&db, &bl).await;

        let found = db.documents().resolve_source_quote(&bl).await.unwrap();
        assert_eq!(found.unwrap().id, "devis-1");
    }

    #[tokio::test]
    async fn test_resolve_source_quote_prefers_devis_ref() {
        let db = test_db().await;
        let devis = sample_document("devis-1", "D-2025-000001", DocumentType::Devis);
        insert(&db, &devis).await;

        let mut orphan = sample_document("bc-9", "BC-2025-000009", DocumentType::BonCommande);
        orphan.refs.devis_ref = Some("D-2025-000001".to_string());
        insert(&db, &orphan).await;

        let found = db.documents().resolve_source_quote(&orphan).await.unwrap();
        assert_eq!(found.unwrap().id, "devis-1");
    }

    #[tokio::test]
    async fn test_resolve_source_quote_none_for_ad_hoc() {
        let db = test_db().await;
        let facture = sample_document("f-1", "F-2025-000001", DocumentType::Facture);
        insert(&db, &facture).await;

        let found = db.documents().resolve_source_quote(&facture).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_delivered_quantities_sum_across_delivery_notes() {
        let db = test_db().await;

        let bc = sample_document("bc-1", "BC-2025-000001", DocumentType::BonCommande);
        insert(&db, &bc).await;

        let mut bl1 = sample_document("bl-1", "BL-2025-000001", DocumentType::BonLivraison);
        bl1.parent_id = Some("bc-1".to_string());
        let mut bl2 = sample_document("bl-2", "BL-2025-000002", DocumentType::BonLivraison);
        bl2.parent_id = Some("bc-1".to_string());
        let mut cancelled = sample_document("bl-3", "BL-2025-000003", DocumentType::BonLivraison);
        cancelled.parent_id = Some("bc-1".to_string());
        cancelled.status = DocumentStatus::Cancelled;

        let mut tx = db.begin().await.unwrap();
        for bl in [&bl1, &bl2, &cancelled] {
            DocumentRepository::insert_in(&mut tx, bl).await.unwrap();
        }
        for (id, doc_id, delivered) in [
            ("i-1", "bl-1", dec!(6)),
            ("i-2", "bl-2", dec!(3)),
            ("i-3", "bl-3", dec!(1)),
        ] {
            let mut item = sample_item(id, doc_id);
            item.source_item_id = Some("bc-line-1".to_string());
            item.delivered_qty = Some(delivered);
            DocumentRepository::insert_item_in(&mut tx, &item).await.unwrap();
        }
        tx.commit().await.unwrap();

        let totals = db
            .documents()
            .delivered_quantities_for_source("bc-1")
            .await
            .unwrap();
        // 6 + 3; the cancelled note's 1 returns to the pool.
        assert_eq!(totals.get("bc-line-1").copied(), Some(dec!(9)));
        assert_eq!(totals.len(), 1);
    }

    #[tokio::test]
    async fn test_deposit_invoices_for_quote_excludes_cancelled() {
        let db = test_db().await;
        insert(&db, &sample_document("devis-1", "D-2025-000001", DocumentType::Devis)).await;

        let mut dep1 = sample_document("fa-1", "FA-2025-000001", DocumentType::FactureAcompte);
        dep1.is_deposit_invoice = true;
        dep1.linked_devis_id = Some("devis-1".to_string());
        let mut dep2 = sample_document("fa-2", "FA-2025-000002", DocumentType::FactureAcompte);
        dep2.is_deposit_invoice = true;
        dep2.linked_devis_id = Some("devis-1".to_string());
        dep2.status = DocumentStatus::Cancelled;

        insert(&db, &dep1).await;
        insert(&db, &dep2).await;

        let deposits = db
            .documents()
            .deposit_invoices_for_quote("devis-1")
            .await
            .unwrap();
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].id, "fa-1");
    }
}
