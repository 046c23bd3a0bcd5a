use std::collections::BTreeMap;

use chrono::{Datelike, Local};
use log::debug;
use serde::{Deserialize, Serialize};

use super::assets::AssetModel;
use super::error::{Result, invalid};
use super::holdings::HoldingSet;
use super::regions::RegionalRuleTable;
use super::stochastic::{SimulationSettings, StochasticProjector};
use super::types::{
    Asset, AssetClass, HoldingSummary, PortfolioSummary, ProjectionYear, ScenarioBundle,
    WhatIfChanges, WhatIfComparison, validate_assets,
};

pub const DEFAULT_MONTHLY_CONTRIBUTION: f64 = 500.0;
pub const DEFAULT_WHAT_IF_YEARS: u32 = 30;
/// Longest horizon any projection accepts.
pub const MAX_HORIZON_YEARS: u32 = 150;

/// Scaling applied to every holding's expected return for the
/// deterministic legs. The Monte Carlo leg is never scaled.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioMultipliers {
    pub base: f64,
    pub optimistic: f64,
    pub pessimistic: f64,
}

impl Default for ScenarioMultipliers {
    fn default() -> Self {
        Self {
            base: 1.0,
            optimistic: 1.3,
            pessimistic: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectionEngine {
    model: AssetModel,
    multipliers: ScenarioMultipliers,
    settings: SimulationSettings,
    start_year: i32,
}

impl ProjectionEngine {
    pub fn new(rules: &RegionalRuleTable, region: &str) -> Result<Self> {
        let config = rules.get_config(region)?.clone();
        Ok(Self::from_model(AssetModel::new(config)))
    }

    pub fn from_model(model: AssetModel) -> Self {
        Self {
            model,
            multipliers: ScenarioMultipliers::default(),
            settings: SimulationSettings::default(),
            start_year: Local::now().year(),
        }
    }

    pub fn with_multipliers(mut self, multipliers: ScenarioMultipliers) -> Self {
        self.multipliers = multipliers;
        self
    }

    pub fn with_simulation_settings(mut self, settings: SimulationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_start_year(mut self, year: i32) -> Self {
        self.start_year = year;
        self
    }

    pub fn model(&self) -> &AssetModel {
        &self.model
    }

    pub fn simulation_settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn multipliers(&self) -> ScenarioMultipliers {
        self.multipliers
    }

    pub fn value(&self, assets: &[Asset]) -> f64 {
        assets.iter().map(|a| self.model.value(a)).sum()
    }

    /// Percent of total value per class; empty when there is no value.
    pub fn allocation(&self, assets: &[Asset]) -> BTreeMap<AssetClass, f64> {
        let total = self.value(assets);
        let mut allocation = BTreeMap::new();
        if total <= 0.0 {
            return allocation;
        }
        for asset in assets {
            *allocation.entry(asset.asset_class).or_insert(0.0) +=
                self.model.value(asset) / total * 100.0;
        }
        allocation
    }

    pub fn diversification_score(&self, assets: &[Asset]) -> u32 {
        self.model.diversification_score(assets)
    }

    pub fn risk_score(&self, assets: &[Asset]) -> u32 {
        self.model.risk_score(assets)
    }

    pub fn summarize(&self, assets: &[Asset]) -> Result<PortfolioSummary> {
        validate_assets(assets)?;
        let holdings = assets
            .iter()
            .map(|asset| HoldingSummary {
                id: asset.id.clone(),
                asset_class: asset.asset_class,
                value: self.model.value(asset),
                gain: self.model.gain(asset),
                expected_return: self.model.expected_return(asset),
                volatility: self.model.volatility(asset),
            })
            .collect();

        Ok(PortfolioSummary {
            total_value: self.value(assets),
            allocation: self.allocation(assets),
            diversification_score: self.diversification_score(assets),
            risk_score: self.risk_score(assets),
            holdings,
        })
    }

    /// Deterministic walk for a single scenario multiplier; `years + 1` rows.
    pub fn project_scenario(
        &self,
        assets: &[Asset],
        monthly_contribution: f64,
        years: u32,
        multiplier: f64,
    ) -> Result<Vec<ProjectionYear>> {
        validate_assets(assets)?;
        validate_plan(monthly_contribution, years)?;
        if !multiplier.is_finite() {
            return Err(invalid("scenario multiplier must be finite"));
        }
        let holdings = HoldingSet::from_assets(&self.model, assets);
        Ok(self.walk(&holdings, monthly_contribution, years, multiplier))
    }

    pub fn project_scenarios(
        &self,
        assets: &[Asset],
        monthly_contribution: f64,
        years: u32,
        goal: Option<f64>,
    ) -> Result<ScenarioBundle> {
        validate_assets(assets)?;
        validate_plan(monthly_contribution, years)?;

        let holdings = HoldingSet::from_assets(&self.model, assets);
        let m = self.multipliers;
        let monte_carlo = StochasticProjector::new(&self.model)
            .with_settings(self.settings.clone())
            .simulate_holdings(
                &holdings,
                monthly_contribution,
                years,
                self.settings.iterations,
                goal,
            )?;

        debug!(
            "projected {} holdings over {years} years in {}",
            assets.len(),
            self.model.config().region
        );

        Ok(ScenarioBundle {
            base_case: self.walk(&holdings, monthly_contribution, years, m.base),
            optimistic: self.walk(&holdings, monthly_contribution, years, m.optimistic),
            pessimistic: self.walk(&holdings, monthly_contribution, years, m.pessimistic),
            monte_carlo,
        })
    }

    /// Base-case comparison of the default plan against `changes`. A lump sum
    /// enters as a zero-volatility cash holding outside the contribution split.
    pub fn compare_what_if(
        &self,
        assets: &[Asset],
        changes: &WhatIfChanges,
        current_age: u32,
    ) -> Result<WhatIfComparison> {
        validate_assets(assets)?;

        let years = match changes.retirement_age {
            Some(age) if age > current_age => age - current_age,
            Some(age) => {
                return Err(invalid(format!(
                    "retirement age {age} must be greater than current age {current_age}"
                )));
            }
            None => DEFAULT_WHAT_IF_YEARS,
        };
        let monthly = changes
            .monthly_contribution
            .unwrap_or(DEFAULT_MONTHLY_CONTRIBUTION);
        validate_plan(monthly, years)?;

        let holdings = HoldingSet::from_assets(&self.model, assets);
        let mut changed = holdings.clone();
        if let Some(lump_sum) = changes.lump_sum {
            if !lump_sum.is_finite() || lump_sum < 0.0 {
                return Err(invalid("lump sum must be a finite value >= 0"));
            }
            if lump_sum > 0.0 {
                changed.push_lump_sum(&self.model, lump_sum);
            }
        }

        let base = self.multipliers.base;
        Ok(WhatIfComparison {
            current: self.walk(
                &holdings,
                DEFAULT_MONTHLY_CONTRIBUTION,
                DEFAULT_WHAT_IF_YEARS,
                base,
            ),
            what_if: self.walk(&changed, monthly, years, base),
        })
    }

    fn walk(
        &self,
        holdings: &HoldingSet,
        monthly_contribution: f64,
        years: u32,
        multiplier: f64,
    ) -> Vec<ProjectionYear> {
        let annual_contribution = monthly_contribution * 12.0;
        let inflation_rate = self.model.config().inflation_rate;
        let principal = holdings.total_value();
        let mut values = holdings.starting_values();

        let mut rows = Vec::with_capacity(years as usize + 1);
        rows.push(ProjectionYear {
            year: self.start_year,
            total_value: principal,
            by_class: by_class(holdings, &values),
            contributions: principal,
            growth: 0.0,
            inflation: 0.0,
            taxes: 0.0,
        });

        for year in 1..=years {
            let mut taxes = 0.0;
            for (value, holding) in values.iter_mut().zip(holdings.holdings()) {
                let growth = *value * holding.expected_return * multiplier;
                taxes += self.model.tax_on_gain(&holding.asset, growth);
                *value += growth;
            }
            for (value, holding) in values.iter_mut().zip(holdings.holdings()) {
                *value += annual_contribution * holding.contribution_weight;
            }

            let total_value: f64 = values.iter().sum();
            let contributions = principal + annual_contribution * year as f64;
            let erosion = 1.0 - (1.0 + inflation_rate).powi(-(year as i32));
            rows.push(ProjectionYear {
                year: self.start_year + year as i32,
                total_value,
                by_class: by_class(holdings, &values),
                contributions,
                growth: total_value - contributions,
                inflation: total_value * erosion,
                taxes,
            });
        }

        rows
    }
}

fn by_class(holdings: &HoldingSet, values: &[f64]) -> BTreeMap<AssetClass, f64> {
    let mut out = BTreeMap::new();
    for (holding, value) in holdings.holdings().iter().zip(values) {
        *out.entry(holding.asset.asset_class).or_insert(0.0) += value;
    }
    out
}

fn validate_plan(monthly_contribution: f64, years: u32) -> Result<()> {
    if years == 0 {
        return Err(invalid("years must be > 0"));
    }
    if years > MAX_HORIZON_YEARS {
        return Err(invalid(format!("years must be <= {MAX_HORIZON_YEARS}")));
    }
    if !monthly_contribution.is_finite() || monthly_contribution < 0.0 {
        return Err(invalid("monthly contribution must be a finite value >= 0"));
    }
    Ok(())
}
