use log::debug;
use serde::{Deserialize, Serialize};

use super::engine::{MAX_HORIZON_YEARS, ProjectionEngine};
use super::error::{Result, invalid};
use super::holdings::HoldingSet;
use super::stochastic::StochasticProjector;
use super::types::{Asset, validate_assets};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GoalSolveConfig {
    pub target_probability: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub iterations_per_step: u32,
    pub final_iterations: u32,
}

impl Default for GoalSolveConfig {
    fn default() -> Self {
        Self {
            target_probability: 0.9,
            search_min: 0.0,
            search_max: 20_000.0,
            tolerance: 5.0,
            max_iterations: 24,
            iterations_per_step: 400,
            final_iterations: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_monthly: f64,
    pub probability: f64,
    pub probability_ci_half_width: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub goal: f64,
    pub years: u32,
    pub config: GoalSolveConfig,
    pub solved_monthly_contribution: Option<f64>,
    pub achieved_probability: Option<f64>,
    pub achieved_probability_ci_half_width: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Bisects the monthly contribution needed for the final-year probability
/// of reaching `goal` to hit `config.target_probability`. Every candidate
/// reuses the engine's seed, so probability is monotone in the contribution.
pub fn solve_required_contribution(
    engine: &ProjectionEngine,
    assets: &[Asset],
    years: u32,
    goal: f64,
    config: GoalSolveConfig,
) -> Result<GoalSolveResult> {
    validate_assets(assets)?;
    validate_config(years, goal, config)?;

    let holdings = HoldingSet::from_assets(engine.model(), assets);
    let projector = StochasticProjector::new(engine.model())
        .with_settings(engine.simulation_settings().clone());
    let evaluate = |monthly: f64, iterations: u32| -> Result<CandidateEval> {
        let rows = projector.simulate_holdings(&holdings, monthly, years, iterations, Some(goal))?;
        let probability = rows.last().map_or(0.0, |r| r.probability_of_success);
        Ok(CandidateEval {
            probability,
            ci_half_width: binomial_ci_half_width(probability, iterations),
        })
    };

    let target = config.target_probability;
    let low_eval = evaluate(config.search_min, config.iterations_per_step)?;
    let high_eval = evaluate(config.search_max, config.iterations_per_step)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let mut solved = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_eval.probability + 1e-12 >= target {
        solved = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Goal already met at the lower contribution bound.".to_string();
    } else if high_eval.probability + 1e-12 < target {
        feasible = false;
        message = "No contribution within the search bounds reaches the goal.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        for it in 1..=config.max_iterations {
            let mid = (lo + hi) * 0.5;
            let eval = evaluate(mid, config.iterations_per_step)?;
            iterations.push(GoalSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_monthly: mid,
                probability: eval.probability,
                probability_ci_half_width: eval.ci_half_width,
            });

            if eval.probability + 1e-12 >= target {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved = Some(hi);
        feasible = true;
        message = if converged {
            "Solved required monthly contribution.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }

    let mut achieved_probability = None;
    let mut achieved_probability_ci_half_width = None;
    if let Some(monthly) = solved {
        let eval = evaluate(monthly, config.final_iterations)?;
        achieved_probability = Some(eval.probability);
        achieved_probability_ci_half_width = Some(eval.ci_half_width);
    }

    debug!(
        "goal solve for {goal} over {years} years: {message} ({} bisection steps)",
        iterations.len()
    );

    Ok(GoalSolveResult {
        goal,
        years,
        config,
        solved_monthly_contribution: solved,
        achieved_probability,
        achieved_probability_ci_half_width,
        iterations,
        converged,
        feasible,
        message,
    })
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    probability: f64,
    ci_half_width: f64,
}

fn binomial_ci_half_width(p: f64, n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    1.96 * (p * (1.0 - p) / n as f64).sqrt()
}

fn validate_config(years: u32, goal: f64, config: GoalSolveConfig) -> Result<()> {
    if years == 0 {
        return Err(invalid("years must be > 0"));
    }
    if years > MAX_HORIZON_YEARS {
        return Err(invalid(format!("years must be <= {MAX_HORIZON_YEARS}")));
    }
    if !goal.is_finite() {
        return Err(invalid("goal must be finite"));
    }
    if !(0.0..=1.0).contains(&config.target_probability) {
        return Err(invalid("target probability must be between 0 and 1"));
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(invalid("search bounds must be finite"));
    }
    if config.search_min < 0.0 {
        return Err(invalid("search min must be >= 0"));
    }
    if config.search_max <= config.search_min {
        return Err(invalid("search max must be greater than search min"));
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(invalid("tolerance must be > 0"));
    }
    if config.max_iterations == 0 {
        return Err(invalid("max iterations must be > 0"));
    }
    if config.iterations_per_step == 0 || config.final_iterations == 0 {
        return Err(invalid("simulation iterations must be > 0"));
    }
    Ok(())
}
