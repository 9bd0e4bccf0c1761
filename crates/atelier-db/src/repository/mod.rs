//! # Repository Layer
//!
//! Data access repositories for the document engine.
//!
//! ## Repositories
//! - [`document::DocumentRepository`] — documents and line items
//! - [`sequence::SequenceRepository`] — atomic document number allocation

pub mod document;
pub mod sequence;

pub use document::DocumentRepository;
pub use sequence::SequenceRepository;
