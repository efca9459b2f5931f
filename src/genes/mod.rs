//! Gene identifier normalization and gene-level overlap scoring.

pub mod overlap;
pub mod xlink;
