//! # Conversion Graph & Status Gates
//!
//! The document lifecycle as data: which type converts to which, and
//! which source statuses allow it. Every rule lives in a static table
//! here; nothing else in the workspace branches on type/target pairs.
//!
//! ## The Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   DEVIS ────────► BON_COMMANDE ──┬──► BON_LIVRAISON ──┬──► PV_RECEPTION│
//! │  (ACCEPTED)     (CONFIRMED or    │   (DELIVERED or    │     (SIGNED)   │
//! │                  PARTIAL)        │    PARTIAL)        │        │       │
//! │                                  │                    │        │       │
//! │                                  └───────► FACTURE ◄──┴────────┘       │
//! │                                       (PAID, PARTIAL or OVERDUE       │
//! │                                        to convert further)             │
//! │                                              │                         │
//! │                                              ▼                         │
//! │                                            AVOIR                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! FACTURE_ACOMPTE and AVOIR are terminal: they are created by their own
//! paths (deposit subsystem, conversion from FACTURE) and never convert
//! onward. FACTURE_ACOMPTE is likewise never a conversion *target*; it is
//! only issued against a DEVIS by the deposit subsystem.

use crate::error::{CoreError, CoreResult};
use crate::types::{DocumentStatus, DocumentType};

// =============================================================================
// Static Tables
// =============================================================================

/// Conversion targets allowed from each document type.
pub const fn allowed_targets(source: DocumentType) -> &'static [DocumentType] {
    match source {
        DocumentType::Devis => &[DocumentType::BonCommande],
        DocumentType::BonCommande => &[DocumentType::BonLivraison, DocumentType::Facture],
        DocumentType::BonLivraison => &[DocumentType::PvReception, DocumentType::Facture],
        DocumentType::PvReception => &[DocumentType::Facture],
        DocumentType::Facture => &[DocumentType::Avoir],
        DocumentType::FactureAcompte | DocumentType::Avoir => &[],
    }
}

/// Statuses a source must hold before it may convert at all.
///
/// ## Rules
/// - A quote converts only once the client ACCEPTED it
/// - An order converts once CONFIRMED (or already PARTIALly delivered)
/// - A delivery note converts once goods moved (DELIVERED or PARTIAL)
/// - A reception report converts once the client SIGNED it
/// - An invoice converts to a credit note only once money was involved
///   (PAID, PARTIAL or OVERDUE)
pub const fn required_source_statuses(source: DocumentType) -> &'static [DocumentStatus] {
    match source {
        DocumentType::Devis => &[DocumentStatus::Accepted],
        DocumentType::BonCommande => &[DocumentStatus::Confirmed, DocumentStatus::Partial],
        DocumentType::BonLivraison => &[DocumentStatus::Delivered, DocumentStatus::Partial],
        DocumentType::PvReception => &[DocumentStatus::Signed],
        DocumentType::Facture => &[
            DocumentStatus::Paid,
            DocumentStatus::Partial,
            DocumentStatus::Overdue,
        ],
        DocumentType::FactureAcompte | DocumentType::Avoir => &[],
    }
}

/// Status the source advances to after a *full* conversion.
///
/// `None` means the source keeps its status: a DEVIS stays ACCEPTED (its
/// terminal state), a PV stays SIGNED, an invoice's payment status is
/// owned by the payment collaborator. Partial conversions always set the
/// source to PARTIAL instead, regardless of this table.
pub const fn status_after_full_conversion(source: DocumentType) -> Option<DocumentStatus> {
    match source {
        DocumentType::BonCommande | DocumentType::BonLivraison => Some(DocumentStatus::Delivered),
        DocumentType::Devis
        | DocumentType::PvReception
        | DocumentType::Facture
        | DocumentType::FactureAcompte
        | DocumentType::Avoir => None,
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validates that `source` may convert to `target` given its status.
///
/// Checks the graph edge first, then the status gate, and reports the
/// full set of acceptable statuses on gate failure so the caller can show
/// an actionable message.
pub fn validate_conversion(
    source_type: DocumentType,
    source_status: DocumentStatus,
    source_number: &str,
    target: DocumentType,
) -> CoreResult<()> {
    if !allowed_targets(source_type).contains(&target) {
        return Err(CoreError::InvalidTransition {
            from: source_type.as_str().to_string(),
            to: target.as_str().to_string(),
        });
    }

    let required = required_source_statuses(source_type);
    if !required.contains(&source_status) {
        return Err(CoreError::StatusGate {
            doc_type: source_type.as_str().to_string(),
            number: source_number.to_string(),
            status: source_status.as_str().to_string(),
            required: required
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Every (source, target) pair outside the graph must be rejected,
    /// whatever the status.
    #[test]
    fn test_exhaustive_rejection_of_invalid_edges() {
        for source in DocumentType::ALL {
            for target in DocumentType::ALL {
                let allowed = allowed_targets(source).contains(&target);
                // Pick a status that passes the gate when one exists, so
                // only the edge is under test.
                let status = required_source_statuses(source)
                    .first()
                    .copied()
                    .unwrap_or(DocumentStatus::Draft);
                let result = validate_conversion(source, status, "X-2025-000001", target);
                if allowed {
                    assert!(result.is_ok(), "{source} -> {target} should be allowed");
                } else {
                    assert!(
                        matches!(result, Err(CoreError::InvalidTransition { .. })),
                        "{source} -> {target} should be rejected"
                    );
                }
            }
        }
    }

    #[test]
    fn test_devis_requires_accepted() {
        let err = validate_conversion(
            DocumentType::Devis,
            DocumentStatus::Draft,
            "D-2025-000001",
            DocumentType::BonCommande,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::StatusGate { .. }));
        assert!(err.to_string().contains("ACCEPTED"));

        assert!(validate_conversion(
            DocumentType::Devis,
            DocumentStatus::Accepted,
            "D-2025-000001",
            DocumentType::BonCommande,
        )
        .is_ok());
    }

    #[test]
    fn test_partial_sources_can_convert_again() {
        assert!(validate_conversion(
            DocumentType::BonCommande,
            DocumentStatus::Partial,
            "BC-2025-000001",
            DocumentType::BonLivraison,
        )
        .is_ok());
        assert!(validate_conversion(
            DocumentType::BonLivraison,
            DocumentStatus::Partial,
            "BL-2025-000001",
            DocumentType::Facture,
        )
        .is_ok());
    }

    #[test]
    fn test_facture_gate_for_avoir() {
        for status in [
            DocumentStatus::Paid,
            DocumentStatus::Partial,
            DocumentStatus::Overdue,
        ] {
            assert!(validate_conversion(
                DocumentType::Facture,
                status,
                "F-2025-000001",
                DocumentType::Avoir,
            )
            .is_ok());
        }
        assert!(validate_conversion(
            DocumentType::Facture,
            DocumentStatus::Draft,
            "F-2025-000001",
            DocumentType::Avoir,
        )
        .is_err());
    }

    #[test]
    fn test_terminal_types_have_no_targets() {
        assert!(allowed_targets(DocumentType::Avoir).is_empty());
        assert!(allowed_targets(DocumentType::FactureAcompte).is_empty());
    }

    #[test]
    fn test_status_after_full_conversion_table() {
        assert_eq!(status_after_full_conversion(DocumentType::Devis), None);
        assert_eq!(
            status_after_full_conversion(DocumentType::BonCommande),
            Some(DocumentStatus::Delivered)
        );
        assert_eq!(
            status_after_full_conversion(DocumentType::BonLivraison),
            Some(DocumentStatus::Delivered)
        );
        assert_eq!(status_after_full_conversion(DocumentType::PvReception), None);
        assert_eq!(status_after_full_conversion(DocumentType::Facture), None);
    }
}
