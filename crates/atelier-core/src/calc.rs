//! # VAT & Totals Calculator
//!
//! The single source of financial truth. Every document total in the
//! system, whether created directly or by conversion, comes out of the
//! functions in this module.
//!
//! ## Rounding Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ROUND AT EVERY STEP, NOT AT THE END                                    │
//! │                                                                         │
//! │  gross     = round(quantity × unit_price)                               │
//! │  discount  = round(gross × discount% / 100)                             │
//! │  net       = round(gross − discount)                                    │
//! │  tva       = round(net × rate / 100)                                    │
//! │  ttc       = round(net + tva)                                           │
//! │                                                                         │
//! │  Rounding only once at the end produces totals that differ from the    │
//! │  printed per-line amounts. A customer adding up the lines of an        │
//! │  invoice must land exactly on its total.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Multi-Rate Documents
//! Moroccan invoices must show a VAT breakdown per rate (0/7/10/14/20%).
//! A document-level discount is prorated across rates by each rate's share
//! of the net, so the breakdown still sums to the document VAT.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::money::{round_currency, Money};
use crate::types::{
    DiscountKind, Document, DocumentItem, GlobalDiscount, LineInput, TvaRate, VatLine,
};
use crate::TOTALS_TOLERANCE_CENTIMES;

// =============================================================================
// Line Calculation
// =============================================================================

/// Computed totals of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTotals {
    /// `quantity × unit_price`, before the line discount.
    pub gross_ht: Money,
    pub discount_amount: Money,
    /// Net after the line discount.
    pub total_ht: Money,
    pub total_tva: Money,
    pub total_ttc: Money,
}

/// Computes one line's totals, rounding at every step.
///
/// ## Example
/// ```rust
/// use atelier_core::calc::calculate_line;
/// use atelier_core::types::{LineInput, TvaRate};
/// use rust_decimal_macros::dec;
///
/// let line = calculate_line(&LineInput {
///     quantity: dec!(2.5),
///     unit_price_ht: dec!(100),
///     discount_percent: dec!(10),
///     tva_rate: TvaRate::from_percent(dec!(20)),
/// });
///
/// assert_eq!(line.gross_ht.centimes(), 25_000);       // 250.00
/// assert_eq!(line.discount_amount.centimes(), 2_500); //  25.00
/// assert_eq!(line.total_ht.centimes(), 22_500);       // 225.00
/// assert_eq!(line.total_tva.centimes(), 4_500);       //  45.00
/// assert_eq!(line.total_ttc.centimes(), 27_000);      // 270.00
/// ```
pub fn calculate_line(input: &LineInput) -> LineTotals {
    let hundred = Decimal::ONE_HUNDRED;

    let gross = round_currency(input.quantity * input.unit_price_ht);
    let discount = round_currency(gross * input.discount_percent / hundred);
    let net = round_currency(gross - discount);
    let tva = round_currency(net * input.tva_rate.percent() / hundred);
    let ttc = round_currency(net + tva);

    LineTotals {
        gross_ht: Money::from_decimal(gross),
        discount_amount: Money::from_decimal(discount),
        total_ht: Money::from_decimal(net),
        total_tva: Money::from_decimal(tva),
        total_ttc: Money::from_decimal(ttc),
    }
}

// =============================================================================
// Document Calculation
// =============================================================================

/// Computed totals of a whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTotals {
    /// Per-line results, in input order.
    pub lines: Vec<LineTotals>,
    /// Sum of gross line totals, before any discount.
    pub subtotal_ht: Money,
    /// Sum of line discounts.
    pub total_line_discounts: Money,
    /// `subtotal_ht - total_line_discounts`.
    pub net_ht: Money,
    /// The global discount actually applied.
    pub global_discount_amount: Money,
    /// Taxable base: `net_ht - global_discount_amount`.
    pub total_ht: Money,
    /// VAT breakdown per rate, ascending.
    pub tva_details: Vec<VatLine>,
    /// Sum of the breakdown amounts (NOT recomputed from the total base).
    pub total_tva: Money,
    /// `total_ht + total_tva`.
    pub total_ttc: Money,
}

/// Computes document totals with the per-rate VAT breakdown.
///
/// ## Rules
/// - Each line is computed by [`calculate_line`]
/// - A global discount reduces the taxable base; it is prorated across
///   VAT rates by `rate_net / net_ht` so each rate's base shrinks
///   proportionally
/// - `total_tva` is the sum of the per-rate amounts, never
///   `total_ht × blended_rate` — the two can differ by a centime and the
///   breakdown is what prints on the invoice
pub fn calculate_document_totals(
    items: &[LineInput],
    discount: Option<GlobalDiscount>,
) -> DocumentTotals {
    let hundred = Decimal::ONE_HUNDRED;

    let lines: Vec<LineTotals> = items.iter().map(calculate_line).collect();

    let subtotal_ht: Money = lines.iter().map(|l| l.gross_ht).sum();
    let total_line_discounts: Money = lines.iter().map(|l| l.discount_amount).sum();
    let net_ht = subtotal_ht - total_line_discounts;

    let global_discount_amount = match discount {
        Some(GlobalDiscount {
            kind: DiscountKind::Percentage,
            value,
        }) => Money::from_decimal(round_currency(net_ht.to_decimal() * value / hundred)),
        Some(GlobalDiscount {
            kind: DiscountKind::Fixed,
            value,
        }) => Money::from_decimal(round_currency(value)),
        None => Money::zero(),
    };

    let total_ht = net_ht - global_discount_amount;

    // Group line nets by rate. BTreeMap keeps rates ascending, which is
    // the order the breakdown prints in.
    let mut net_by_rate: BTreeMap<TvaRate, Money> = BTreeMap::new();
    for (input, line) in items.iter().zip(&lines) {
        *net_by_rate.entry(input.tva_rate).or_insert(Money::zero()) += line.total_ht;
    }

    let mut tva_details = Vec::with_capacity(net_by_rate.len());
    for (rate, rate_net) in net_by_rate {
        // Prorate the global discount by this rate's share of the net.
        // The share is kept at full precision; only the resulting base
        // is rounded.
        let base_ht = if global_discount_amount.is_positive() && net_ht.is_positive() {
            let share = rate_net.to_decimal() / net_ht.to_decimal();
            let discount_share = global_discount_amount.to_decimal() * share;
            Money::from_decimal(round_currency(rate_net.to_decimal() - discount_share))
        } else {
            rate_net
        };

        let amount = Money::from_decimal(round_currency(
            base_ht.to_decimal() * rate.percent() / hundred,
        ));

        tva_details.push(VatLine {
            rate,
            base_ht,
            amount,
        });
    }

    let total_tva: Money = tva_details.iter().map(|e| e.amount).sum();
    let total_ttc = total_ht + total_tva;

    DocumentTotals {
        lines,
        subtotal_ht,
        total_line_discounts,
        net_ht,
        global_discount_amount,
        total_ht,
        tva_details,
        total_tva,
        total_ttc,
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Result of recomputing a document's totals against what it stores.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub is_valid: bool,
    /// Human-readable discrepancy descriptions; empty when valid.
    pub discrepancies: Vec<String>,
    pub recalculated: DocumentTotals,
}

/// Recomputes a document's totals from its stored line inputs and reports
/// any stored value drifting more than one centime.
///
/// ## When This Occurs
/// - Rows written by an older calculator version
/// - Manual database edits
/// - Deposit and final invoices, whose synthetic lines are derived
///   proportionally rather than from `quantity × price`
///
/// Non-fatal by design: the report is diagnostic, never an error.
pub fn verify_document_totals(document: &Document, items: &[DocumentItem]) -> VerificationReport {
    let inputs: Vec<LineInput> = items.iter().map(|i| i.as_line_input()).collect();
    let recalculated = calculate_document_totals(&inputs, document.discount);

    let tolerance = Money::from_centimes(TOTALS_TOLERANCE_CENTIMES);
    let mut discrepancies = Vec::new();

    let mut check = |label: String, stored: Money, computed: Money| {
        if (stored - computed).abs() > tolerance {
            discrepancies.push(format!("{label}: stored {stored} != recalculated {computed}"));
        }
    };

    for (index, (item, line)) in items.iter().zip(&recalculated.lines).enumerate() {
        let n = index + 1;
        check(format!("line {n} HT"), item.total_ht, line.total_ht);
        check(format!("line {n} TVA"), item.total_tva, line.total_tva);
    }

    check(
        "total HT".to_string(),
        document.total_ht,
        recalculated.total_ht,
    );
    check(
        "total TVA".to_string(),
        document.total_tva,
        recalculated.total_tva,
    );
    check(
        "total TTC".to_string(),
        document.total_ttc,
        recalculated.total_ttc,
    );

    VerificationReport {
        is_valid: discrepancies.is_empty(),
        discrepancies,
        recalculated,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
