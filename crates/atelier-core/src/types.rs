//! # Domain Types
//!
//! Core domain types for the commercial document engine.
//!
//! ## Document Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Commercial Document Chain                           │
//! │                                                                         │
//! │   DEVIS ──► BON_COMMANDE ──► BON_LIVRAISON ──► PV_RECEPTION            │
//! │  (quote)      (order)    │   (delivery note) │   (reception)           │
//! │     │            │       │         │         │        │                │
//! │     │            └───────┼─────────┴─────────┴────────┤                │
//! │     ▼                    ▼                            ▼                │
//! │  FACTURE_ACOMPTE      FACTURE ◄───────────────────────┘                │
//! │  (deposit invoice)   (invoice)                                         │
//! │                          │                                             │
//! │                          ▼                                             │
//! │                        AVOIR                                           │
//! │                     (credit note)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Documents freeze client data (`ClientSnapshot`) and item pricing at
//! creation time. A légal document must show what was agreed on its date,
//! not what the client record says today.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Document Type
// =============================================================================

/// The seven commercial document types.
///
/// Closed enum: the conversion graph in [`crate::transition`] is defined
/// over these variants and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// Quote (devis).
    Devis,
    /// Purchase order (bon de commande).
    BonCommande,
    /// Delivery note (bon de livraison).
    BonLivraison,
    /// Reception report (procès-verbal de réception).
    PvReception,
    /// Invoice.
    Facture,
    /// Deposit invoice (facture d'acompte).
    FactureAcompte,
    /// Credit note (avoir).
    Avoir,
}

impl DocumentType {
    /// All document types, in lifecycle order.
    pub const ALL: [DocumentType; 7] = [
        DocumentType::Devis,
        DocumentType::BonCommande,
        DocumentType::BonLivraison,
        DocumentType::PvReception,
        DocumentType::Facture,
        DocumentType::FactureAcompte,
        DocumentType::Avoir,
    ];

    /// The numbering prefix used in document numbers (`D-2025-000042`).
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentType::Devis => "D",
            DocumentType::BonCommande => "BC",
            DocumentType::BonLivraison => "BL",
            DocumentType::PvReception => "PV",
            DocumentType::Facture => "F",
            DocumentType::FactureAcompte => "FA",
            DocumentType::Avoir => "A",
        }
    }

    /// Canonical storage name (SCREAMING_SNAKE, as persisted in SQLite).
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Devis => "DEVIS",
            DocumentType::BonCommande => "BON_COMMANDE",
            DocumentType::BonLivraison => "BON_LIVRAISON",
            DocumentType::PvReception => "PV_RECEPTION",
            DocumentType::Facture => "FACTURE",
            DocumentType::FactureAcompte => "FACTURE_ACOMPTE",
            DocumentType::Avoir => "AVOIR",
        }
    }
}

impl FromStr for DocumentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEVIS" => Ok(DocumentType::Devis),
            "BON_COMMANDE" => Ok(DocumentType::BonCommande),
            "BON_LIVRAISON" => Ok(DocumentType::BonLivraison),
            "PV_RECEPTION" => Ok(DocumentType::PvReception),
            "FACTURE" => Ok(DocumentType::Facture),
            "FACTURE_ACOMPTE" => Ok(DocumentType::FactureAcompte),
            "AVOIR" => Ok(DocumentType::Avoir),
            other => Err(CoreError::UnknownDocumentType(other.to_string())),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Document Status
// =============================================================================

/// Lifecycle status of a document.
///
/// Which statuses are meaningful depends on the document type: a DEVIS
/// moves DRAFT → SENT → VIEWED → ACCEPTED/REJECTED, an invoice moves
/// DRAFT → SENT → PAID/PARTIAL/OVERDUE. The transition gates in
/// [`crate::transition`] encode which statuses allow conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Rejected,
    Confirmed,
    Partial,
    Delivered,
    Signed,
    Paid,
    Overdue,
    Cancelled,
}

impl DocumentStatus {
    /// Canonical storage name (SCREAMING_SNAKE, as persisted in SQLite).
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::Sent => "SENT",
            DocumentStatus::Viewed => "VIEWED",
            DocumentStatus::Accepted => "ACCEPTED",
            DocumentStatus::Rejected => "REJECTED",
            DocumentStatus::Confirmed => "CONFIRMED",
            DocumentStatus::Partial => "PARTIAL",
            DocumentStatus::Delivered => "DELIVERED",
            DocumentStatus::Signed => "SIGNED",
            DocumentStatus::Paid => "PAID",
            DocumentStatus::Overdue => "OVERDUE",
            DocumentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(DocumentStatus::Draft),
            "SENT" => Ok(DocumentStatus::Sent),
            "VIEWED" => Ok(DocumentStatus::Viewed),
            "ACCEPTED" => Ok(DocumentStatus::Accepted),
            "REJECTED" => Ok(DocumentStatus::Rejected),
            "CONFIRMED" => Ok(DocumentStatus::Confirmed),
            "PARTIAL" => Ok(DocumentStatus::Partial),
            "DELIVERED" => Ok(DocumentStatus::Delivered),
            "SIGNED" => Ok(DocumentStatus::Signed),
            "PAID" => Ok(DocumentStatus::Paid),
            "OVERDUE" => Ok(DocumentStatus::Overdue),
            "CANCELLED" => Ok(DocumentStatus::Cancelled),
            other => Err(CoreError::UnknownDocumentStatus(other.to_string())),
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// VAT Rate
// =============================================================================

/// A VAT rate expressed in percent (`20` = 20%).
///
/// ## Rules
/// - Any non-negative rate computes normally
/// - Morocco's recognized rates are {0, 7, 10, 14, 20}; `is_recognized`
///   lets callers flag anything else without blocking the calculation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TvaRate(Decimal);

/// Recognized Moroccan VAT rates, in percent.
pub const RECOGNIZED_TVA_RATES: [u32; 5] = [0, 7, 10, 14, 20];

impl TvaRate {
    /// Creates a rate from a percentage value (`dec!(20)` = 20%).
    pub fn from_percent(percent: Decimal) -> Self {
        TvaRate(percent.normalize())
    }

    /// The standard Moroccan rate (20%).
    pub fn standard() -> Self {
        TvaRate(Decimal::from(20))
    }

    /// The percentage value.
    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// Whether this is one of Morocco's recognized rates.
    pub fn is_recognized(&self) -> bool {
        RECOGNIZED_TVA_RATES
            .iter()
            .any(|r| Decimal::from(*r) == self.0)
    }
}

impl fmt::Display for TvaRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// =============================================================================
// Reference Chain
// =============================================================================

/// Denormalized ancestor numbers carried on every document.
///
/// ## Why Denormalized?
/// A printed invoice must show "Devis D-2025-000041 / BC-2025-000108"
/// without walking the parent chain at render time, and must keep showing
/// it even if an ancestor is later archived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefChain {
    pub devis_ref: Option<String>,
    pub bc_ref: Option<String>,
    pub bl_ref: Option<String>,
    pub pv_ref: Option<String>,
    pub facture_ref: Option<String>,
}

impl RefChain {
    /// Returns this chain extended with `number` recorded in the slot for
    /// `source_type`.
    ///
    /// Each conversion copies the source's chain and adds the source's own
    /// number, so references accumulate down the lifecycle. A FACTURE
    /// source (credit note creation) records only `facture_ref`; the
    /// invoice already carries the earlier references.
    pub fn recording(&self, source_type: DocumentType, number: &str) -> RefChain {
        let mut refs = self.clone();
        match source_type {
            DocumentType::Devis => refs.devis_ref = Some(number.to_string()),
            DocumentType::BonCommande => refs.bc_ref = Some(number.to_string()),
            DocumentType::BonLivraison => refs.bl_ref = Some(number.to_string()),
            DocumentType::PvReception => refs.pv_ref = Some(number.to_string()),
            DocumentType::Facture => refs.facture_ref = Some(number.to_string()),
            // Deposit invoices and credit notes are terminal; nothing is
            // ever converted from them.
            DocumentType::FactureAcompte | DocumentType::Avoir => {}
        }
        refs
    }
}

// =============================================================================
// Client Snapshot
// =============================================================================

/// Client identity frozen onto the document at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    /// Moroccan company tax identifier (ICE).
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

// =============================================================================
// Discounts & VAT Breakdown
// =============================================================================

/// How a document-level discount is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    /// Percentage of the net HT.
    Percentage,
    /// Fixed amount in dirhams.
    Fixed,
}

impl DiscountKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "PERCENTAGE",
            DiscountKind::Fixed => "FIXED",
        }
    }
}

impl FromStr for DiscountKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENTAGE" => Ok(DiscountKind::Percentage),
            "FIXED" => Ok(DiscountKind::Fixed),
            other => Err(CoreError::UnknownDiscountKind(other.to_string())),
        }
    }
}

/// A document-level (global) discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDiscount {
    pub kind: DiscountKind,
    /// Percentage (0-100) for [`DiscountKind::Percentage`], dirham amount
    /// for [`DiscountKind::Fixed`].
    pub value: Decimal,
}

/// One entry of the per-rate VAT breakdown (`tva_details`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatLine {
    pub rate: TvaRate,
    /// Taxable base for this rate, after discount proration.
    pub base_ht: Money,
    /// VAT amount for this rate.
    pub amount: Money,
}

// =============================================================================
// Calculator Inputs
// =============================================================================

/// The financial inputs of one line, as fed to the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub quantity: Decimal,
    /// Unit price excluding VAT, in dirhams.
    pub unit_price_ht: Decimal,
    /// Line discount percentage (0-100).
    pub discount_percent: Decimal,
    pub tva_rate: TvaRate,
}

// =============================================================================
// Document
// =============================================================================

/// A commercial document with frozen client data and computed totals.
///
/// ## Field Groups
/// ```text
/// identity     id, doc_type, number, status, parent_id, refs
/// client       client (snapshot), date, due_date
/// delivery     delivery_date / address / city / notes (BL and onward)
/// totals       net_ht, discount, discount_amount, total_ht,
///              tva_details, total_tva, total_ttc
/// payment      paid_amount, balance
/// deposits     deposit_percent, deposit_amount, is_deposit_invoice,
///              linked_devis_id, deposit_invoice_id,
///              total_deposits_applied, applied_deposit_ids, amount_due
/// misc         avoir_reason, notes, created_at, updated_at
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub doc_type: DocumentType,
    /// Unique, sequential, never reused. `{PREFIX}-{YEAR}-{NNNNNN}`.
    pub number: String,
    pub status: DocumentStatus,
    /// Direct source document, when created by conversion.
    pub parent_id: Option<String>,
    pub refs: RefChain,
    pub client: ClientSnapshot,
    pub date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,

    pub delivery_date: Option<DateTime<Utc>>,
    pub delivery_address: Option<String>,
    pub delivery_city: Option<String>,
    pub delivery_notes: Option<String>,

    /// Sum of line nets, before the global discount.
    pub net_ht: Money,
    pub discount: Option<GlobalDiscount>,
    /// The global discount amount actually applied.
    pub discount_amount: Money,
    /// Taxable base: `net_ht - discount_amount`.
    pub total_ht: Money,
    pub tva_details: Vec<VatLine>,
    pub total_tva: Money,
    pub total_ttc: Money,

    pub paid_amount: Money,
    /// Remaining amount owed on this document.
    pub balance: Money,

    /// Deposit request carried on a DEVIS (default for later deposits).
    pub deposit_percent: Option<Decimal>,
    pub deposit_amount: Option<Money>,
    /// FACTURE_ACOMPTE marker.
    pub is_deposit_invoice: bool,
    /// For a deposit invoice: the DEVIS it draws on.
    pub linked_devis_id: Option<String>,
    /// For a deposit invoice: the final FACTURE that consumed it.
    /// For a final invoice: set only when exactly one deposit applied.
    pub deposit_invoice_id: Option<String>,
    /// Final invoice: total of PAID deposits deducted.
    pub total_deposits_applied: Money,
    /// Final invoice: ids of every deposit deducted (authoritative).
    pub applied_deposit_ids: Vec<String>,
    /// Final invoice: `total_ttc - total_deposits_applied`, floored at 0.
    pub amount_due: Money,

    /// Reason for issuing a credit note (AVOIR only).
    pub avoir_reason: Option<String>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Document Item
// =============================================================================

/// One line of a document, with its computed totals.
///
/// Pricing is a snapshot: conversions copy the line and recompute totals,
/// they never re-read a catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentItem {
    pub id: String,
    pub document_id: String,
    /// The source document's line this one was converted from. Delivery
    /// tracking sums delivered quantities per source line across all
    /// delivery notes of an order.
    pub source_item_id: Option<String>,
    pub designation: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    /// Unit of measure ("u", "m²", "ml", ...).
    pub unit: Option<String>,
    pub unit_price_ht: Money,
    pub discount_percent: Decimal,
    pub discount_amount: Money,
    pub tva_rate: TvaRate,
    /// Line net after the line discount.
    pub total_ht: Money,
    pub total_tva: Money,
    pub total_ttc: Money,
    /// Delivery notes only: quantity on the source order.
    pub ordered_qty: Option<Decimal>,
    /// Delivery notes only: quantity actually delivered.
    pub delivered_qty: Option<Decimal>,
    /// Display order within the document.
    pub position: i64,
}

impl DocumentItem {
    /// The calculator inputs of this line.
    pub fn as_line_input(&self) -> LineInput {
        LineInput {
            quantity: self.quantity,
            unit_price_ht: self.unit_price_ht.to_decimal(),
            discount_percent: self.discount_percent,
            tva_rate: self.tva_rate,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_document_type_round_trip() {
        for doc_type in DocumentType::ALL {
            let parsed: DocumentType = doc_type.as_str().parse().unwrap();
            assert_eq!(parsed, doc_type);
        }
        assert!("QUITTANCE".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_document_type_prefixes() {
        assert_eq!(DocumentType::Devis.prefix(), "D");
        assert_eq!(DocumentType::BonCommande.prefix(), "BC");
        assert_eq!(DocumentType::BonLivraison.prefix(), "BL");
        assert_eq!(DocumentType::PvReception.prefix(), "PV");
        assert_eq!(DocumentType::Facture.prefix(), "F");
        assert_eq!(DocumentType::FactureAcompte.prefix(), "FA");
        assert_eq!(DocumentType::Avoir.prefix(), "A");
    }

    #[test]
    fn test_document_status_round_trip() {
        let all = [
            DocumentStatus::Draft,
            DocumentStatus::Sent,
            DocumentStatus::Viewed,
            DocumentStatus::Accepted,
            DocumentStatus::Rejected,
            DocumentStatus::Confirmed,
            DocumentStatus::Partial,
            DocumentStatus::Delivered,
            DocumentStatus::Signed,
            DocumentStatus::Paid,
            DocumentStatus::Overdue,
            DocumentStatus::Cancelled,
        ];
        for status in all {
            let parsed: DocumentStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_tva_rate_recognized() {
        assert!(TvaRate::from_percent(dec!(20)).is_recognized());
        assert!(TvaRate::from_percent(dec!(20.0)).is_recognized());
        assert!(TvaRate::from_percent(dec!(0)).is_recognized());
        assert!(!TvaRate::from_percent(dec!(19.6)).is_recognized());
        assert!(!TvaRate::from_percent(dec!(5)).is_recognized());
    }

    #[test]
    fn test_ref_chain_accumulates() {
        let devis_refs = RefChain::default().recording(DocumentType::Devis, "D-2025-000001");
        assert_eq!(devis_refs.devis_ref.as_deref(), Some("D-2025-000001"));

        let bc_refs = devis_refs.recording(DocumentType::BonCommande, "BC-2025-000001");
        assert_eq!(bc_refs.devis_ref.as_deref(), Some("D-2025-000001"));
        assert_eq!(bc_refs.bc_ref.as_deref(), Some("BC-2025-000001"));
        assert!(bc_refs.bl_ref.is_none());
    }

    #[test]
    fn test_ref_chain_terminal_types_record_nothing() {
        let refs = RefChain::default().recording(DocumentType::Avoir, "A-2025-000001");
        assert_eq!(refs, RefChain::default());
    }
}
