//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - input records (`BondRecord`, `Accounting`)
//! - fit outputs (`CurveFitResult`, `SectorDiagnostics`) and scored rows (`ScoredBond`)
//! - the engine configuration surface (`EngineConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
