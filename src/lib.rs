//! Portfolio projection engine for retirement planning.
//!
//! - `core`: regional rules, per-asset modelling, deterministic scenarios,
//!   Monte Carlo bands, what-if comparison and a goal solver
//! - `api`: JSON-over-HTTP adapter that calls straight into `core`

pub mod api;
pub mod core;
