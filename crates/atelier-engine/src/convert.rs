//! # Document Conversion
//!
//! Walks the lifecycle graph: DEVIS → BC → BL → PV → FACTURE → AVOIR.
//!
//! ## Conversion Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Gate check       graph edge + source status (atelier-core)         │
//! │  2. Remainders       delivery notes: source quantity minus what        │
//! │                      earlier non-cancelled delivery notes already      │
//! │                      carried, per source line                          │
//! │  3. Item selection   no overrides → every line, remaining quantities   │
//! │                      overrides    → ONLY the overridden lines; each    │
//! │                                     quantity capped at the remainder   │
//! │  4. Recompute        totals from the selected lines, WITHOUT the       │
//! │                      source's global discount (it applied to the       │
//! │                      whole quote, not to a partial delivery)           │
//! │  5. One transaction  number + document + items + source status         │
//! │  6. Source status    every line fully covered → static per-type table │
//! │                      anything left behind     → PARTIAL                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Overrides only ever restrict: fewer lines, or smaller quantities. A
//! quantity above what the source line still has to give is rejected.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

use atelier_core::calc::calculate_document_totals;
use atelier_core::money::Money;
use atelier_core::transition::{status_after_full_conversion, validate_conversion};
use atelier_core::types::{
    Document, DocumentItem, DocumentStatus, DocumentType, LineInput,
};
use atelier_core::validation::validate_quantity;
use atelier_db::repository::{DocumentRepository, SequenceRepository};

use crate::audit::AuditEvent;
use crate::error::{EngineError, EngineResult};
use crate::DocumentEngine;

// =============================================================================
// Request Types
// =============================================================================

/// Quantity override for one source line.
#[derive(Debug, Clone)]
pub struct ItemOverride {
    /// Id of the source document's item.
    pub item_id: String,
    /// Quantity to carry into the new document.
    pub quantity: Decimal,
}

/// Request to convert a document.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub target: DocumentType,
    /// When non-empty, only these lines are converted. Lines not listed
    /// stay behind on the source.
    pub item_overrides: Vec<ItemOverride>,
    pub due_date: Option<chrono::DateTime<Utc>>,
    pub delivery_date: Option<chrono::DateTime<Utc>>,
    pub delivery_address: Option<String>,
    pub delivery_city: Option<String>,
    pub delivery_notes: Option<String>,
    /// Reason for the credit note (AVOIR target only).
    pub avoir_reason: Option<String>,
    pub notes: Option<String>,
}

impl ConvertRequest {
    /// A full conversion to `target` with no overrides.
    pub fn to(target: DocumentType) -> Self {
        ConvertRequest {
            target,
            item_overrides: Vec::new(),
            due_date: None,
            delivery_date: None,
            delivery_address: None,
            delivery_city: None,
            delivery_notes: None,
            avoir_reason: None,
            notes: None,
        }
    }
}

// =============================================================================
// Operation
// =============================================================================

/// One selected line: the source item and the quantity to carry.
struct SelectedLine<'a> {
    item: &'a DocumentItem,
    quantity: Decimal,
}

impl DocumentEngine {
    /// Converts a document into the next lifecycle stage.
    ///
    /// ## Edge Cases
    /// - An override naming an unknown item id, repeating an item id, or
    ///   asking for more than the line has left fails the whole request
    /// - Overriding every line at its full remainder is a full conversion
    /// - Converting a BL records `ordered_qty`/`delivered_qty` per line so
    ///   the delivery note shows what was ordered vs what moved; repeated
    ///   deliveries from the same order only ever carry what previous
    ///   non-cancelled delivery notes left behind
    pub async fn convert_document(
        &self,
        source_id: &str,
        request: ConvertRequest,
    ) -> EngineResult<Document> {
        let (source, source_items) = self.get_document(source_id).await?;

        validate_conversion(source.doc_type, source.status, &source.number, request.target)?;

        let is_delivery_note = request.target == DocumentType::BonLivraison;

        // What each source line still has to give. Only deliveries are
        // cumulative; other conversions draw on the full line.
        let mut remaining: HashMap<&str, Decimal> = source_items
            .iter()
            .map(|item| (item.id.as_str(), item.quantity))
            .collect();
        if is_delivery_note {
            let delivered = self
                .db()
                .documents()
                .delivered_quantities_for_source(&source.id)
                .await?;
            for item in &source_items {
                if let Some(done) = delivered.get(&item.id) {
                    remaining.insert(item.id.as_str(), item.quantity - done);
                }
            }
        }

        let selected = select_lines(&source_items, &request.item_overrides, &remaining)?;

        // Full conversion iff every source line ends fully covered.
        let fully_covered = source_items.iter().all(|item| {
            let left = remaining
                .get(item.id.as_str())
                .copied()
                .unwrap_or(Decimal::ZERO);
            let taken = selected
                .iter()
                .find(|s| s.item.id == item.id)
                .map(|s| s.quantity)
                .unwrap_or(Decimal::ZERO);
            left - taken <= Decimal::ZERO
        });

        // The source's global discount applied to the whole document; it
        // does not follow lines into the converted one.
        let inputs: Vec<LineInput> = selected
            .iter()
            .map(|s| LineInput {
                quantity: s.quantity,
                unit_price_ht: s.item.unit_price_ht.to_decimal(),
                discount_percent: s.item.discount_percent,
                tva_rate: s.item.tva_rate,
            })
            .collect();
        let totals = calculate_document_totals(&inputs, None);

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let mut tx = self.db().begin().await?;
        let number = SequenceRepository::allocate_in(&mut tx, request.target, now.year()).await?;

        let document = Document {
            id: id.clone(),
            doc_type: request.target,
            number: number.clone(),
            status: DocumentStatus::Draft,
            parent_id: Some(source.id.clone()),
            refs: source.refs.recording(source.doc_type, &source.number),
            client: source.client.clone(),
            date: now,
            due_date: request.due_date.or(source.due_date),
            delivery_date: request.delivery_date.or(source.delivery_date),
            delivery_address: request.delivery_address.or(source.delivery_address.clone()),
            delivery_city: request.delivery_city.or(source.delivery_city.clone()),
            delivery_notes: request.delivery_notes.or(source.delivery_notes.clone()),
            net_ht: totals.net_ht,
            discount: None,
            discount_amount: Money::zero(),
            total_ht: totals.total_ht,
            tva_details: totals.tva_details.clone(),
            total_tva: totals.total_tva,
            total_ttc: totals.total_ttc,
            paid_amount: Money::zero(),
            balance: totals.total_ttc,
            deposit_percent: None,
            deposit_amount: None,
            is_deposit_invoice: false,
            linked_devis_id: None,
            deposit_invoice_id: None,
            total_deposits_applied: Money::zero(),
            applied_deposit_ids: Vec::new(),
            amount_due: totals.total_ttc,
            avoir_reason: request.avoir_reason,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };
        DocumentRepository::insert_in(&mut tx, &document).await?;

        for (position, (line, computed)) in selected.iter().zip(&totals.lines).enumerate() {
            let item = DocumentItem {
                id: Uuid::new_v4().to_string(),
                document_id: id.clone(),
                source_item_id: Some(line.item.id.clone()),
                designation: line.item.designation.clone(),
                description: line.item.description.clone(),
                quantity: line.quantity,
                unit: line.item.unit.clone(),
                unit_price_ht: line.item.unit_price_ht,
                discount_percent: line.item.discount_percent,
                discount_amount: computed.discount_amount,
                tva_rate: line.item.tva_rate,
                total_ht: computed.total_ht,
                total_tva: computed.total_tva,
                total_ttc: computed.total_ttc,
                // A delivery note shows what was ordered next to what
                // actually moved; the ordered quantity is the SOURCE
                // line's, never the override.
                ordered_qty: is_delivery_note.then_some(line.item.quantity),
                delivered_qty: is_delivery_note.then_some(line.quantity),
                position: position as i64,
            };
            DocumentRepository::insert_item_in(&mut tx, &item).await?;
        }

        let new_source_status = if fully_covered {
            status_after_full_conversion(source.doc_type)
        } else {
            Some(DocumentStatus::Partial)
        };
        if let Some(status) = new_source_status {
            if status != source.status {
                DocumentRepository::update_status_in(&mut tx, &source.id, status).await?;
            }
        }

        tx.commit().await.map_err(atelier_db::DbError::from)?;

        info!(
            source = %source.number,
            target = %number,
            partial = !fully_covered,
            "Converted document"
        );
        self.audit().record(AuditEvent {
            action: "convert",
            entity: "Document",
            entity_id: document.id.clone(),
            description: format!(
                "{} {} créé depuis {} {}",
                request.target, number, source.doc_type, source.number
            ),
            document_number: number,
            document_type: request.target,
            document_amount: document.total_ttc,
            category: "financial",
        });

        Ok(document)
    }
}

/// Resolves the override list against the source items and what each
/// line still has to give.
fn select_lines<'a>(
    items: &'a [DocumentItem],
    overrides: &[ItemOverride],
    remaining: &HashMap<&str, Decimal>,
) -> EngineResult<Vec<SelectedLine<'a>>> {
    if overrides.is_empty() {
        let selected: Vec<SelectedLine<'a>> = items
            .iter()
            .filter_map(|item| {
                let quantity = remaining
                    .get(item.id.as_str())
                    .copied()
                    .unwrap_or(item.quantity);
                (quantity > Decimal::ZERO).then_some(SelectedLine { item, quantity })
            })
            .collect();
        if selected.is_empty() {
            return Err(EngineError::InvalidRequest(
                "nothing left to convert: every line is already covered".to_string(),
            ));
        }
        return Ok(selected);
    }

    let by_id: HashMap<&str, &DocumentItem> =
        items.iter().map(|i| (i.id.as_str(), i)).collect();

    let mut seen: HashSet<&str> = HashSet::with_capacity(overrides.len());
    let mut selected = Vec::with_capacity(overrides.len());
    for over in overrides {
        let item = by_id.get(over.item_id.as_str()).copied().ok_or_else(|| {
            EngineError::InvalidRequest(format!(
                "override references unknown item {}",
                over.item_id
            ))
        })?;
        if !seen.insert(over.item_id.as_str()) {
            return Err(EngineError::InvalidRequest(format!(
                "duplicate override for item {}",
                over.item_id
            )));
        }
        validate_quantity(over.quantity)?;

        // Overrides restrict; they never inflate a line.
        let available = remaining
            .get(over.item_id.as_str())
            .copied()
            .unwrap_or(item.quantity);
        if over.quantity > available {
            return Err(EngineError::InvalidRequest(format!(
                "quantity {} for item {} exceeds the remaining {}",
                over.quantity, over.item_id, available
            )));
        }

        selected.push(SelectedLine {
            item,
            quantity: over.quantity,
        });
    }

    // Keep the source's display order, not the override order.
    selected.sort_by_key(|s| s.item.position);
    Ok(selected)
}
