//! Reporting utilities: formatted terminal output for runs and issuer views.

pub mod format;

pub use format::*;
