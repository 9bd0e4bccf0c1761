//! # atelier-core: Pure Business Logic for Atelier CRM
//!
//! This crate is the **heart** of the commercial document engine. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Atelier CRM Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  atelier-engine (Orchestration)                 │   │
//! │  │   create_quote ──► convert ──► deposit_invoice ──► final_invoice│   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ atelier-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐ │   │
//! │  │   │   types   │  │   money   │  │    calc    │  │transition │ │   │
//! │  │   │ Document  │  │   Money   │  │ VAT totals │  │  graph    │ │   │
//! │  │   │   Item    │  │  Decimal  │  │ discounts  │  │  gates    │ │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └───────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  atelier-db (Database Layer)                    │   │
//! │  │            SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Document, DocumentItem, DocumentType, ...)
//! - [`money`] - Money type in integer centimes (no floating point!)
//! - [`calc`] - The VAT/discount calculator, single source of financial truth
//! - [`transition`] - Document conversion graph and status gates
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All stored monetary values are centimes (i64);
//!    intermediate math uses exact `Decimal` and rounds at every step
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use atelier_core::calc::calculate_line;
//! use atelier_core::types::{LineInput, TvaRate};
//! use rust_decimal_macros::dec;
//!
//! // 2 panels at 1 000.00 DH, no line discount, 20% VAT
//! let line = calculate_line(&LineInput {
//!     quantity: dec!(2),
//!     unit_price_ht: dec!(1000),
//!     discount_percent: dec!(0),
//!     tva_rate: TvaRate::from_percent(dec!(20)),
//! });
//!
//! assert_eq!(line.total_ht.centimes(), 200_000);  // 2 000.00 DH
//! assert_eq!(line.total_tva.centimes(), 40_000);  //   400.00 DH
//! assert_eq!(line.total_ttc.centimes(), 240_000); // 2 400.00 DH
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calc;
pub mod error;
pub mod money;
pub mod transition;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use atelier_core::Money` instead of
// `use atelier_core::money::Money`

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default deposit percentage when neither the request nor the source quote
/// specifies one.
///
/// ## Business Reason
/// The workshop's standard terms ask 30% up front before materials are
/// ordered. Sales can override per quote or per deposit invoice.
pub const DEFAULT_DEPOSIT_PERCENT: u32 = 30;

/// Maximum parent hops when resolving the quote behind a document chain.
///
/// DEVIS → BC → BL → PV is the longest chain that can front a final
/// invoice, so three hops from the invoice source always reach the quote
/// when one exists.
pub const MAX_QUOTE_LOOKUP_DEPTH: usize = 3;

/// Tolerance (in centimes) when verifying stored totals against recomputed
/// totals. One centime absorbs the rounding drift the step-wise rounding
/// rules allow.
pub const TOTALS_TOLERANCE_CENTIMES: i64 = 1;
