mod assets;
mod engine;
mod error;
mod holdings;
mod regions;
mod solver;
mod stochastic;
mod types;

pub use assets::{
    AssetModel, CURRENCY_RISK_PREMIUM, ClassAssumption, FALLBACK_ASSUMPTION, ReturnAssumptions,
};
pub use engine::{
    DEFAULT_MONTHLY_CONTRIBUTION, DEFAULT_WHAT_IF_YEARS, MAX_HORIZON_YEARS, ProjectionEngine,
    ScenarioMultipliers,
};
pub use error::{ProjectionError, Result};
pub use regions::RegionalRuleTable;
pub use solver::{GoalSolveConfig, GoalSolveIteration, GoalSolveResult, solve_required_contribution};
pub use stochastic::{
    DEFAULT_ITERATIONS, DEFAULT_MAX_DRAWS, DEFAULT_SEED, SimulationSettings, StochasticProjector,
};
pub use types::{
    Asset, AssetClass, ContributionLimit, ContributionLimits, GainLoss, HoldingSummary,
    MonteCarloYearResult, PortfolioSummary, ProjectionYear, RegionalConfig, ScenarioBundle,
    TaxKind, TaxRates, WhatIfChanges, WhatIfComparison, validate_assets,
};
