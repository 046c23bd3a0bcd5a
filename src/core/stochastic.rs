use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use rayon::prelude::*;

use super::assets::AssetModel;
use super::engine::MAX_HORIZON_YEARS;
use super::error::{ProjectionError, Result, invalid};
use super::holdings::{Holding, HoldingSet};
use super::types::{Asset, MonteCarloYearResult, validate_assets};

pub const DEFAULT_ITERATIONS: u32 = 1_000;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_DRAWS: u64 = 500_000_000;

const MIN_SAMPLED_RETURN: f64 = -1.0;
const MAX_SAMPLED_RETURN: f64 = 2.5;

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub iterations: u32,
    pub seed: u64,
    /// Upper bound on `iterations * years * holdings` random draws per call.
    pub max_draws: u64,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            seed: DEFAULT_SEED,
            max_draws: DEFAULT_MAX_DRAWS,
            cancel: None,
        }
    }
}

/// Monte Carlo leg: repeated randomised growth walks summarised into
/// per-year percentile bands.
pub struct StochasticProjector<'a> {
    model: &'a AssetModel,
    settings: SimulationSettings,
}

impl<'a> StochasticProjector<'a> {
    pub fn new(model: &'a AssetModel) -> Self {
        Self {
            model,
            settings: SimulationSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SimulationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// One row per year `1..=years`. `iterations` falls back to the
    /// projector's settings when `None`.
    pub fn simulate(
        &self,
        assets: &[Asset],
        monthly_contribution: f64,
        years: u32,
        iterations: Option<u32>,
        goal: Option<f64>,
    ) -> Result<Vec<MonteCarloYearResult>> {
        validate_assets(assets)?;
        let holdings = HoldingSet::from_assets(self.model, assets);
        let iterations = iterations.unwrap_or(self.settings.iterations);
        self.simulate_holdings(&holdings, monthly_contribution, years, iterations, goal)
    }

    /// Advances every trial one year at a time and snapshots the
    /// distribution after each year, so a horizon of `years` costs
    /// `years * iterations * holdings` draws in total.
    pub(crate) fn simulate_holdings(
        &self,
        holdings: &HoldingSet,
        monthly_contribution: f64,
        years: u32,
        iterations: u32,
        goal: Option<f64>,
    ) -> Result<Vec<MonteCarloYearResult>> {
        validate_run(monthly_contribution, years, iterations, goal)?;

        let draws = iterations as u64 * years as u64 * holdings.len() as u64;
        if draws > self.settings.max_draws {
            return Err(invalid(format!(
                "simulation needs {draws} draws, above the limit of {}",
                self.settings.max_draws
            )));
        }

        let annual_contribution = monthly_contribution * 12.0;
        let deflator = 1.0 / (1.0 + self.model.config().inflation_rate);
        let starting_values = holdings.starting_values();
        let mut trials: Vec<Trial> = (0..iterations)
            .map(|id| Trial::new(starting_values.clone(), derive_seed(self.settings.seed, id)))
            .collect();

        debug!(
            "monte carlo: {iterations} trials x {years} years x {} holdings (seed {})",
            holdings.len(),
            self.settings.seed
        );

        let mut results = Vec::with_capacity(years as usize);
        for year in 1..=years {
            if self.is_cancelled() {
                return Err(ProjectionError::Cancelled {
                    completed_years: year - 1,
                    requested_years: years,
                });
            }

            trials.par_iter_mut().for_each(|trial| {
                trial.advance_year(holdings.holdings(), annual_contribution, deflator)
            });
            let mut outcomes: Vec<f64> = trials.par_iter().map(Trial::total).collect();
            results.push(summarize_year(year, &mut outcomes, goal));
        }

        Ok(results)
    }

    fn is_cancelled(&self) -> bool {
        self.settings
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

fn validate_run(
    monthly_contribution: f64,
    years: u32,
    iterations: u32,
    goal: Option<f64>,
) -> Result<()> {
    if years == 0 {
        return Err(invalid("years must be > 0"));
    }
    if years > MAX_HORIZON_YEARS {
        return Err(invalid(format!("years must be <= {MAX_HORIZON_YEARS}")));
    }
    if iterations == 0 {
        return Err(invalid("iterations must be > 0"));
    }
    if !monthly_contribution.is_finite() || monthly_contribution < 0.0 {
        return Err(invalid("monthly contribution must be a finite value >= 0"));
    }
    if goal.is_some_and(|g| !g.is_finite()) {
        return Err(invalid("goal must be finite"));
    }
    Ok(())
}

struct Trial {
    values: Vec<f64>,
    rng: Rng,
}

impl Trial {
    fn new(values: Vec<f64>, seed: u64) -> Self {
        Self {
            values,
            rng: Rng::new(seed),
        }
    }

    fn advance_year(&mut self, holdings: &[Holding], annual_contribution: f64, deflator: f64) {
        for (value, holding) in self.values.iter_mut().zip(holdings) {
            let sampled = holding.expected_return + holding.volatility * self.rng.standard_normal();
            *value *= 1.0 + sampled.clamp(MIN_SAMPLED_RETURN, MAX_SAMPLED_RETURN);
        }
        for (value, holding) in self.values.iter_mut().zip(holdings) {
            *value = (*value + annual_contribution * holding.contribution_weight) * deflator;
        }
    }

    fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

fn summarize_year(year: u32, outcomes: &mut [f64], goal: Option<f64>) -> MonteCarloYearResult {
    outcomes.sort_by(|a, b| a.total_cmp(b));

    let n = outcomes.len() as f64;
    let mean = outcomes.iter().sum::<f64>() / n;
    let std_dev = if outcomes.len() > 1 {
        let ss: f64 = outcomes.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    let probability_of_success = match goal {
        Some(goal) if goal > 0.0 => {
            outcomes.iter().filter(|v| **v >= goal).count() as f64 / n
        }
        _ => 1.0,
    };

    MonteCarloYearResult {
        year,
        percentile10: percentile(outcomes, 0.10),
        percentile25: percentile(outcomes, 0.25),
        percentile50: percentile(outcomes, 0.50),
        percentile75: percentile(outcomes, 0.75),
        percentile90: percentile(outcomes, 0.90),
        mean,
        std_dev,
        probability_of_success,
    }
}

/// Nearest-rank read on sorted values: index `floor(n * p)`.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn derive_seed(base_seed: u64, trial: u32) -> u64 {
    splitmix64(base_seed ^ ((trial as u64) << 20) ^ trial as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

struct Rng {
    state: u64,
    spare: Option<f64>,
}

impl Rng {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0xA5A5_A5A5_A5A5_A5A5 } else { seed },
            spare: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform in (0, 1).
    fn next_unit(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        ((self.next_u64() >> 11) as f64 + 0.5) / DENOM
    }

    /// Box-Muller; the second variate of each pair is kept for the next call.
    fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }

        let r = (-2.0 * self.next_unit().ln()).sqrt();
        let theta = 2.0 * PI * self.next_unit();
        self.spare = Some(r * theta.sin());
        r * theta.cos()
    }
}
