//! `rv-signals` library crate.
//!
//! The binary (`rv`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the engine is reusable behind other front-ends (notebooks, services)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod issuer;
pub mod math;
pub mod models;
pub mod portfolio;
pub mod report;
