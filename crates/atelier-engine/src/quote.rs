//! # Quote Creation
//!
//! Entry point of the document lifecycle: everything else (orders,
//! deliveries, invoices, deposits) descends from a DEVIS created here.
//!
//! ## What Gets Frozen
//! The request carries the client snapshot and per-line pricing; both are
//! stored as-is on the document. Nothing is ever re-read from a client or
//! catalog record afterwards.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use atelier_core::calc::calculate_document_totals;
use atelier_core::money::{round_currency, Money};
use atelier_core::types::{
    ClientSnapshot, DiscountKind, Document, DocumentItem, DocumentStatus, DocumentType,
    GlobalDiscount, LineInput, RefChain, TvaRate,
};
use atelier_core::validation::{
    validate_client_name, validate_deposit_percent, validate_designation,
    validate_discount_percent, validate_quantity, validate_tva_rate, validate_unit_price,
};
use atelier_db::repository::DocumentRepository;
use atelier_db::repository::SequenceRepository;

use crate::audit::AuditEvent;
use crate::error::{EngineError, EngineResult};
use crate::DocumentEngine;

// =============================================================================
// Request Types
// =============================================================================

/// One line of a quote request.
#[derive(Debug, Clone)]
pub struct QuoteLine {
    pub designation: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    /// Unit of measure ("u", "m²", "ml", ...).
    pub unit: Option<String>,
    /// Unit price excluding VAT, in dirhams.
    pub unit_price_ht: Decimal,
    /// Line discount percentage (0-100).
    pub discount_percent: Decimal,
    /// VAT rate in percent.
    pub tva_rate: Decimal,
}

impl QuoteLine {
    fn as_line_input(&self) -> LineInput {
        LineInput {
            quantity: self.quantity,
            unit_price_ht: self.unit_price_ht,
            discount_percent: self.discount_percent,
            tva_rate: TvaRate::from_percent(self.tva_rate),
        }
    }
}

/// Request to create a quote.
#[derive(Debug, Clone)]
pub struct CreateQuoteRequest {
    pub client: ClientSnapshot,
    /// Document date; defaults to now. Also selects the numbering year.
    pub date: Option<chrono::DateTime<Utc>>,
    pub due_date: Option<chrono::DateTime<Utc>>,
    pub lines: Vec<QuoteLine>,
    pub discount: Option<GlobalDiscount>,
    /// Requested deposit percentage, stored on the quote as the default
    /// for later deposit invoices.
    pub deposit_percent: Option<u32>,
    pub notes: Option<String>,
}

// =============================================================================
// Operation
// =============================================================================

impl DocumentEngine {
    /// Creates a DEVIS from client data and priced lines.
    ///
    /// ## What This Does
    /// 1. Validates the client and every line
    /// 2. Computes totals through the calculator
    /// 3. Allocates a `D-{year}-{NNNNNN}` number and persists the
    ///    document with its items in one transaction
    /// 4. Emits an audit event
    pub async fn create_quote(&self, request: CreateQuoteRequest) -> EngineResult<Document> {
        validate_client_name(&request.client.name)?;

        if request.lines.is_empty() {
            return Err(EngineError::InvalidRequest(
                "a quote needs at least one line".to_string(),
            ));
        }
        for line in &request.lines {
            validate_designation(&line.designation)?;
            validate_quantity(line.quantity)?;
            validate_unit_price(line.unit_price_ht)?;
            validate_discount_percent(line.discount_percent)?;
            validate_tva_rate(line.tva_rate)?;
        }
        if let Some(discount) = &request.discount {
            match discount.kind {
                DiscountKind::Percentage => validate_discount_percent(discount.value)?,
                DiscountKind::Fixed => validate_unit_price(discount.value)?,
            }
        }
        if let Some(percent) = request.deposit_percent {
            validate_deposit_percent(percent)?;
        }

        let inputs: Vec<LineInput> = request.lines.iter().map(|l| l.as_line_input()).collect();
        let totals = calculate_document_totals(&inputs, request.discount);

        let now = Utc::now();
        let date = request.date.unwrap_or(now);
        let id = Uuid::new_v4().to_string();

        let deposit_amount = request.deposit_percent.map(|percent| {
            Money::from_decimal(round_currency(
                totals.total_ttc.to_decimal() * Decimal::from(percent) / Decimal::ONE_HUNDRED,
            ))
        });

        let mut tx = self.db().begin().await?;
        let number = SequenceRepository::allocate_in(&mut tx, DocumentType::Devis, date.year())
            .await?;

        let document = Document {
            id: id.clone(),
            doc_type: DocumentType::Devis,
            number: number.clone(),
            status: DocumentStatus::Draft,
            parent_id: None,
            refs: RefChain::default(),
            client: request.client,
            date,
            due_date: request.due_date,
            delivery_date: None,
            delivery_address: None,
            delivery_city: None,
            delivery_notes: None,
            net_ht: totals.net_ht,
            discount: request.discount,
            discount_amount: totals.global_discount_amount,
            total_ht: totals.total_ht,
            tva_details: totals.tva_details.clone(),
            total_tva: totals.total_tva,
            total_ttc: totals.total_ttc,
            paid_amount: Money::zero(),
            balance: totals.total_ttc,
            deposit_percent: request.deposit_percent.map(Decimal::from),
            deposit_amount,
            is_deposit_invoice: false,
            linked_devis_id: None,
            deposit_invoice_id: None,
            total_deposits_applied: Money::zero(),
            applied_deposit_ids: Vec::new(),
            amount_due: totals.total_ttc,
            avoir_reason: None,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };
        DocumentRepository::insert_in(&mut tx, &document).await?;

        for (position, (line, computed)) in
            request.lines.iter().zip(&totals.lines).enumerate()
        {
            let item = DocumentItem {
                id: Uuid::new_v4().to_string(),
                document_id: id.clone(),
                source_item_id: None,
                designation: line.designation.clone(),
                description: line.description.clone(),
                quantity: line.quantity,
                unit: line.unit.clone(),
                unit_price_ht: Money::from_decimal(line.unit_price_ht),
                discount_percent: line.discount_percent,
                discount_amount: computed.discount_amount,
                tva_rate: TvaRate::from_percent(line.tva_rate),
                total_ht: computed.total_ht,
                total_tva: computed.total_tva,
                total_ttc: computed.total_ttc,
                ordered_qty: None,
                delivered_qty: None,
                position: position as i64,
            };
            DocumentRepository::insert_item_in(&mut tx, &item).await?;
        }

        tx.commit().await.map_err(atelier_db::DbError::from)?;

        info!(number = %number, total_ttc = %document.total_ttc, "Created quote");
        self.audit().record(AuditEvent {
            action: "create",
            entity: "Document",
            entity_id: document.id.clone(),
            description: format!("Devis {number} créé"),
            document_number: number,
            document_type: DocumentType::Devis,
            document_amount: document.total_ttc,
            category: "financial",
        });

        Ok(document)
    }
}
