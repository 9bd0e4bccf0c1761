//! # Deposit Invoicing
//!
//! The acompte subsystem: deposit invoices drawn against an accepted
//! quote, and their deduction on the final invoice.
//!
//! ## Money Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DEVIS (ACCEPTED, 12 000 TTC)                                          │
//! │    │                                                                    │
//! │    ├──► FACTURE_ACOMPTE #1  (30% = 3 600)  ──► client pays ──► PAID    │
//! │    ├──► FACTURE_ACOMPTE #2  (20% = 2 400)  ──► client pays ──► PAID    │
//! │    │         (cap: all non-cancelled deposits ≤ quote TTC)             │
//! │    ▼                                                                    │
//! │  DEVIS → BC → ... → create_final_invoice                               │
//! │                        │                                                │
//! │                        ▼                                                │
//! │  FACTURE: full lines 12 000 TTC                                        │
//! │           − Déduction acompte FA-...-1   (−3 600)                      │
//! │           − Déduction acompte FA-...-2   (−2 400)                      │
//! │           paid_amount = 6 000, balance = 6 000                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A deposit is a slice of the quote's TTC, so its HT/TVA split is derived
//! proportionally from the quote's own VAT breakdown; the same goes for
//! each deduction line, which is derived from the deposit it cancels.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use atelier_core::calc::calculate_document_totals;
use atelier_core::error::CoreError;
use atelier_core::money::{round_currency, Money};
use atelier_core::types::{
    Document, DocumentItem, DocumentStatus, DocumentType, LineInput, RefChain, TvaRate, VatLine,
};
use atelier_core::validation::validate_deposit_percent;
use atelier_core::DEFAULT_DEPOSIT_PERCENT;
use atelier_db::repository::{DocumentRepository, SequenceRepository};

use crate::audit::AuditEvent;
use crate::error::{EngineError, EngineResult};
use crate::DocumentEngine;

// =============================================================================
// Request Types
// =============================================================================

/// How the deposit amount is expressed.
#[derive(Debug, Clone)]
pub enum DepositSpec {
    /// Percentage of the quote's TTC (1-100).
    Percent(u32),
    /// Fixed amount in dirhams.
    Fixed(Decimal),
    /// Use the quote's own `deposit_percent`, falling back to the
    /// workshop default of 30%.
    SourceDefault,
}

/// Request to create a deposit invoice against a quote.
#[derive(Debug, Clone)]
pub struct CreateDepositRequest {
    pub spec: DepositSpec,
    pub due_date: Option<chrono::DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Request to create a final invoice with deposit deduction.
#[derive(Debug, Clone)]
pub struct CreateFinalInvoiceRequest {
    /// Automatically deduct every PAID deposit of the underlying quote.
    pub apply_deposits: bool,
    /// When `apply_deposits` is false: deduct exactly these deposits
    /// (still filtered to PAID deposit invoices).
    pub specific_deposit_ids: Vec<String>,
    pub due_date: Option<chrono::DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Default for CreateFinalInvoiceRequest {
    fn default() -> Self {
        CreateFinalInvoiceRequest {
            apply_deposits: true,
            specific_deposit_ids: Vec::new(),
            due_date: None,
            notes: None,
        }
    }
}

// =============================================================================
// Deposit Invoice
// =============================================================================

impl DocumentEngine {
    /// Creates a FACTURE_ACOMPTE drawing on an ACCEPTED quote.
    ///
    /// ## Rules
    /// - Source must be a DEVIS in status ACCEPTED
    /// - All non-cancelled deposits together may never exceed the quote's
    ///   TTC; an issued-but-unpaid deposit still reserves its share
    /// - The deposit's HT/TVA split and VAT breakdown are the quote's,
    ///   scaled by `deposit / quote TTC`
    /// - The invoice carries a single forfait line
    pub async fn create_deposit_invoice(
        &self,
        devis_id: &str,
        request: CreateDepositRequest,
    ) -> EngineResult<Document> {
        let documents = self.db().documents();
        let quote = documents.get(devis_id).await?;

        if quote.doc_type != DocumentType::Devis {
            return Err(EngineError::InvalidRequest(format!(
                "deposit invoices are created from a DEVIS, not {}",
                quote.doc_type
            )));
        }
        if quote.status != DocumentStatus::Accepted {
            return Err(CoreError::StatusGate {
                doc_type: quote.doc_type.as_str().to_string(),
                number: quote.number.clone(),
                status: quote.status.as_str().to_string(),
                required: DocumentStatus::Accepted.as_str().to_string(),
            }
            .into());
        }
        if !quote.total_ttc.is_positive() {
            return Err(EngineError::InvalidRequest(
                "cannot take a deposit on a zero-amount quote".to_string(),
            ));
        }

        let quote_ttc = quote.total_ttc;
        let (amount, stored_percent) = match request.spec {
            DepositSpec::Percent(percent) => {
                validate_deposit_percent(percent)?;
                let amount = Money::from_decimal(round_currency(
                    quote_ttc.to_decimal() * Decimal::from(percent) / Decimal::ONE_HUNDRED,
                ));
                (amount, Some(Decimal::from(percent)))
            }
            DepositSpec::Fixed(value) => {
                if value <= Decimal::ZERO {
                    return Err(EngineError::InvalidRequest(
                        "deposit amount must be positive".to_string(),
                    ));
                }
                (Money::from_decimal(round_currency(value)), None)
            }
            DepositSpec::SourceDefault => {
                let percent = quote
                    .deposit_percent
                    .unwrap_or_else(|| Decimal::from(DEFAULT_DEPOSIT_PERCENT));
                let amount = Money::from_decimal(round_currency(
                    quote_ttc.to_decimal() * percent / Decimal::ONE_HUNDRED,
                ));
                (amount, Some(percent))
            }
        };

        // Split the deposit into HT/TVA proportionally to the quote.
        let ratio = amount.to_decimal() / quote_ttc.to_decimal();
        let deposit_tva =
            Money::from_decimal(round_currency(quote.total_tva.to_decimal() * ratio));
        let deposit_ht = amount - deposit_tva;
        let tva_details: Vec<VatLine> = quote
            .tva_details
            .iter()
            .map(|entry| VatLine {
                rate: entry.rate,
                base_ht: Money::from_decimal(round_currency(entry.base_ht.to_decimal() * ratio)),
                amount: Money::from_decimal(round_currency(entry.amount.to_decimal() * ratio)),
            })
            .collect();

        let percent_display = round_currency(ratio * Decimal::ONE_HUNDRED).round();
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let mut tx = self.db().begin().await?;

        // Cap check, inside the creation transaction so two concurrent
        // deposits on the same quote cannot both pass. Every deposit
        // already issued (whatever its payment state, cancelled ones
        // aside) reserves its slice of the quote.
        let existing: Money = DocumentRepository::deposit_invoices_for_quote_in(&mut tx, &quote.id)
            .await?
            .iter()
            .map(|d| d.total_ttc)
            .sum();
        if existing + amount > quote_ttc {
            return Err(CoreError::DepositExceedsQuote {
                requested: amount,
                quote_ttc,
                remaining: quote_ttc - existing,
            }
            .into());
        }

        let number =
            SequenceRepository::allocate_in(&mut tx, DocumentType::FactureAcompte, now.year())
                .await?;

        let document = Document {
            id: id.clone(),
            doc_type: DocumentType::FactureAcompte,
            number: number.clone(),
            status: DocumentStatus::Draft,
            parent_id: None,
            refs: RefChain::default().recording(DocumentType::Devis, &quote.number),
            client: quote.client.clone(),
            date: now,
            due_date: request.due_date,
            delivery_date: None,
            delivery_address: None,
            delivery_city: None,
            delivery_notes: None,
            net_ht: deposit_ht,
            discount: None,
            discount_amount: Money::zero(),
            total_ht: deposit_ht,
            tva_details,
            total_tva: deposit_tva,
            total_ttc: amount,
            paid_amount: Money::zero(),
            balance: amount,
            deposit_percent: stored_percent,
            deposit_amount: Some(amount),
            is_deposit_invoice: true,
            linked_devis_id: Some(quote.id.clone()),
            deposit_invoice_id: None,
            total_deposits_applied: Money::zero(),
            applied_deposit_ids: Vec::new(),
            amount_due: amount,
            avoir_reason: None,
            notes: Some(request.notes.unwrap_or_else(|| {
                format!("Acompte de {percent_display}% sur devis {}", quote.number)
            })),
            created_at: now,
            updated_at: now,
        };
        DocumentRepository::insert_in(&mut tx, &document).await?;

        let item = DocumentItem {
            id: Uuid::new_v4().to_string(),
            document_id: id.clone(),
            source_item_id: None,
            designation: format!("Acompte sur devis {}", quote.number),
            description: Some(format!(
                "Acompte de {percent_display}% sur le montant total TTC de {quote_ttc}"
            )),
            quantity: Decimal::ONE,
            unit: Some("forfait".to_string()),
            unit_price_ht: deposit_ht,
            discount_percent: Decimal::ZERO,
            discount_amount: Money::zero(),
            tva_rate: blended_rate(deposit_ht, deposit_tva),
            total_ht: deposit_ht,
            total_tva: deposit_tva,
            total_ttc: amount,
            ordered_qty: None,
            delivered_qty: None,
            position: 0,
        };
        DocumentRepository::insert_item_in(&mut tx, &item).await?;

        tx.commit().await.map_err(atelier_db::DbError::from)?;

        info!(number = %number, amount = %amount, devis = %quote.number, "Created deposit invoice");
        self.audit().record(AuditEvent {
            action: "create",
            entity: "Document",
            entity_id: document.id.clone(),
            description: format!("Facture d'acompte créée depuis devis {}", quote.number),
            document_number: number,
            document_type: DocumentType::FactureAcompte,
            document_amount: amount,
            category: "financial",
        });

        Ok(document)
    }
}

// =============================================================================
// Final Invoice
// =============================================================================

/// Statuses from which a final invoice may be created, per source type.
///
/// Broader than the conversion gates: a BC that already went through
/// delivery (DELIVERED) can still be invoiced directly.
fn final_invoice_gate(source: DocumentType) -> Option<&'static [DocumentStatus]> {
    match source {
        DocumentType::BonCommande => Some(&[
            DocumentStatus::Confirmed,
            DocumentStatus::Partial,
            DocumentStatus::Delivered,
        ]),
        DocumentType::BonLivraison => Some(&[DocumentStatus::Delivered]),
        DocumentType::PvReception => Some(&[DocumentStatus::Signed]),
        _ => None,
    }
}

impl DocumentEngine {
    /// Creates the final FACTURE from a BC, BL or PV, deducting paid
    /// deposits of the underlying quote.
    ///
    /// ## What This Does
    /// 1. Gate: BC must be CONFIRMED/PARTIAL/DELIVERED, BL DELIVERED,
    ///    PV SIGNED
    /// 2. Finds the quote (via `devis_ref`, else up the parent chain) and
    ///    collects its PAID deposit invoices
    /// 3. Recomputes the invoice totals from the source lines
    /// 4. Appends one negative deduction line per deposit, derived from
    ///    that deposit's own HT/TVA split
    /// 5. `paid_amount` = deposits applied, `balance` = what remains,
    ///    floored at zero
    /// 6. Back-links each deposit to this invoice
    pub async fn create_final_invoice(
        &self,
        source_id: &str,
        request: CreateFinalInvoiceRequest,
    ) -> EngineResult<Document> {
        let documents = self.db().documents();
        let (source, source_items) = self.get_document(source_id).await?;

        let Some(required) = final_invoice_gate(source.doc_type) else {
            return Err(EngineError::InvalidRequest(format!(
                "final invoices are created from a BC, BL or PV, not {}",
                source.doc_type
            )));
        };
        if !required.contains(&source.status) {
            return Err(CoreError::StatusGate {
                doc_type: source.doc_type.as_str().to_string(),
                number: source.number.clone(),
                status: source.status.as_str().to_string(),
                required: required
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
            .into());
        }

        // Collect the deposits to deduct.
        let deposits: Vec<Document> = if request.apply_deposits {
            match documents.resolve_source_quote(&source).await? {
                Some(quote) => documents
                    .deposit_invoices_for_quote(&quote.id)
                    .await?
                    .into_iter()
                    .filter(|d| d.status == DocumentStatus::Paid)
                    .collect(),
                None => Vec::new(),
            }
        } else {
            let mut picked = Vec::with_capacity(request.specific_deposit_ids.len());
            for deposit_id in &request.specific_deposit_ids {
                if let Some(doc) = documents.find(deposit_id).await? {
                    if doc.doc_type == DocumentType::FactureAcompte
                        && doc.status == DocumentStatus::Paid
                    {
                        picked.push(doc);
                    }
                }
            }
            picked
        };

        let inputs: Vec<LineInput> = source_items.iter().map(|i| i.as_line_input()).collect();
        let totals = calculate_document_totals(&inputs, None);

        let total_deposits_applied: Money = deposits.iter().map(|d| d.paid_amount).sum();
        let balance = (totals.total_ttc - total_deposits_applied).clamp_non_negative();
        let applied_deposit_ids: Vec<String> = deposits.iter().map(|d| d.id.clone()).collect();

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let mut tx = self.db().begin().await?;
        let number =
            SequenceRepository::allocate_in(&mut tx, DocumentType::Facture, now.year()).await?;

        let document = Document {
            id: id.clone(),
            doc_type: DocumentType::Facture,
            number: number.clone(),
            status: DocumentStatus::Draft,
            parent_id: Some(source.id.clone()),
            refs: source.refs.recording(source.doc_type, &source.number),
            client: source.client.clone(),
            date: now,
            due_date: request.due_date.or(source.due_date),
            delivery_date: source.delivery_date,
            delivery_address: source.delivery_address.clone(),
            delivery_city: source.delivery_city.clone(),
            delivery_notes: source.delivery_notes.clone(),
            net_ht: totals.net_ht,
            discount: None,
            discount_amount: Money::zero(),
            total_ht: totals.total_ht,
            tva_details: totals.tva_details.clone(),
            total_tva: totals.total_tva,
            total_ttc: totals.total_ttc,
            // Paid deposits count as payment received on this invoice.
            paid_amount: total_deposits_applied,
            balance,
            deposit_percent: None,
            deposit_amount: None,
            is_deposit_invoice: false,
            linked_devis_id: None,
            deposit_invoice_id: if deposits.len() == 1 {
                Some(deposits[0].id.clone())
            } else {
                None
            },
            total_deposits_applied,
            applied_deposit_ids,
            amount_due: balance,
            avoir_reason: None,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };
        DocumentRepository::insert_in(&mut tx, &document).await?;

        for (position, (item, computed)) in
            source_items.iter().zip(&totals.lines).enumerate()
        {
            let line = DocumentItem {
                id: Uuid::new_v4().to_string(),
                document_id: id.clone(),
                source_item_id: Some(item.id.clone()),
                designation: item.designation.clone(),
                description: item.description.clone(),
                quantity: item.quantity,
                unit: item.unit.clone(),
                unit_price_ht: item.unit_price_ht,
                discount_percent: item.discount_percent,
                discount_amount: computed.discount_amount,
                tva_rate: item.tva_rate,
                total_ht: computed.total_ht,
                total_tva: computed.total_tva,
                total_ttc: computed.total_ttc,
                ordered_qty: None,
                delivered_qty: None,
                position: position as i64,
            };
            DocumentRepository::insert_item_in(&mut tx, &line).await?;
        }

        for (index, deposit) in deposits.iter().enumerate() {
            let line = deduction_line(&id, deposit, (source_items.len() + index) as i64);
            DocumentRepository::insert_item_in(&mut tx, &line).await?;
            DocumentRepository::link_deposit_to_invoice_in(&mut tx, &deposit.id, &id).await?;
        }

        // Invoicing a confirmed order closes the delivery loop on it.
        if source.doc_type == DocumentType::BonCommande
            && source.status != DocumentStatus::Delivered
        {
            DocumentRepository::update_status_in(&mut tx, &source.id, DocumentStatus::Delivered)
                .await?;
        }

        tx.commit().await.map_err(atelier_db::DbError::from)?;

        info!(
            number = %number,
            source = %source.number,
            deposits = deposits.len(),
            deducted = %total_deposits_applied,
            balance = %balance,
            "Created final invoice"
        );
        self.audit().record(AuditEvent {
            action: "create",
            entity: "Document",
            entity_id: document.id.clone(),
            description: if total_deposits_applied.is_positive() {
                format!(
                    "Facture finale créée depuis {} {} avec déduction d'acomptes de {}",
                    source.doc_type, source.number, total_deposits_applied
                )
            } else {
                format!(
                    "Facture finale créée depuis {} {}",
                    source.doc_type, source.number
                )
            },
            document_number: number,
            document_type: DocumentType::Facture,
            document_amount: balance,
            category: "financial",
        });

        Ok(document)
    }
}

/// Builds the negative line cancelling one deposit on the final invoice.
///
/// The HT/TVA split comes from the deposit's OWN totals, scaled by how
/// much of it is applied (its paid amount), so a 10%-VAT deposit deducts
/// 10% VAT. TVA is taken as the remainder to keep `ht + tva == -applied`
/// exact.
fn deduction_line(document_id: &str, deposit: &Document, position: i64) -> DocumentItem {
    let applied = deposit.paid_amount;
    let ratio = if deposit.total_ttc.is_positive() {
        applied.to_decimal() / deposit.total_ttc.to_decimal()
    } else {
        Decimal::ONE
    };
    let ht = Money::from_decimal(round_currency(deposit.total_ht.to_decimal() * ratio));
    let tva = applied - ht;

    DocumentItem {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        source_item_id: None,
        designation: format!("Déduction acompte {}", deposit.number),
        description: Some(format!(
            "Acompte déjà facturé et payé - Facture {}",
            deposit.number
        )),
        quantity: Decimal::ONE,
        unit: Some("forfait".to_string()),
        unit_price_ht: -ht,
        discount_percent: Decimal::ZERO,
        discount_amount: Money::zero(),
        tva_rate: blended_rate(deposit.total_ht, deposit.total_tva),
        total_ht: -ht,
        total_tva: -tva,
        total_ttc: -applied,
        ordered_qty: None,
        delivered_qty: None,
        position,
    }
}

/// Effective VAT rate of an HT/TVA pair, for synthetic forfait lines.
///
/// ## Rules
/// - No VAT at all (zero-rate quote) stamps a 0% rate, matching the line's
///   zero `total_tva`
/// - VAT with a degenerate HT falls back to the standard rate
fn blended_rate(ht: Money, tva: Money) -> TvaRate {
    if !tva.is_positive() {
        TvaRate::from_percent(Decimal::ZERO)
    } else if ht.is_positive() {
        TvaRate::from_percent(round_currency(
            tva.to_decimal() / ht.to_decimal() * Decimal::ONE_HUNDRED,
        ))
    } else {
        TvaRate::standard()
    }
}
