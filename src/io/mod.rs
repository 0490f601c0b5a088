//! Input/output helpers.
//!
//! - portfolio CSV ingest + validation (`ingest`)
//! - fundamentals CSV loaders (`fundamentals`)
//! - scored CSV / diagnostics JSON exports (`export`)
//! - shared CSV plumbing (`table`)

pub mod export;
pub mod fundamentals;
pub mod ingest;
pub mod table;

pub use export::*;
pub use fundamentals::*;
pub use ingest::*;
pub use table::RowError;
