use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{Result, invalid};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetClass {
    #[serde(alias = "stock", alias = "stocks")]
    Equity,
    #[serde(alias = "etf", alias = "mutual-fund")]
    Fund,
    Bond,
    #[serde(alias = "property", alias = "realEstate", alias = "real_estate")]
    RealEstate,
    #[serde(alias = "crypto", alias = "digitalAsset", alias = "digital_asset")]
    DigitalAsset,
    Cash,
    #[serde(alias = "retirementAccount", alias = "retirement_account", alias = "super")]
    RetirementAccount,
    #[serde(alias = "termDeposit", alias = "term_deposit", alias = "fixed-deposit")]
    TermDeposit,
    #[serde(
        alias = "taxAdvantagedSavings",
        alias = "tax_advantaged_savings",
        alias = "isa",
        alias = "ppf"
    )]
    TaxAdvantagedSavings,
    /// Any class this engine has no baseline for. Valued normally, modelled
    /// with the fallback return/volatility assumption.
    #[serde(other)]
    Other,
}

impl AssetClass {
    pub const ALL: [AssetClass; 10] = [
        AssetClass::Equity,
        AssetClass::Fund,
        AssetClass::Bond,
        AssetClass::RealEstate,
        AssetClass::DigitalAsset,
        AssetClass::Cash,
        AssetClass::RetirementAccount,
        AssetClass::TermDeposit,
        AssetClass::TaxAdvantagedSavings,
        AssetClass::Other,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub asset_class: AssetClass,
    pub quantity: f64,
    pub purchase_price: f64,
    pub current_price: f64,
    pub currency: String,
    pub region: String,
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Asset {
    pub fn value(&self) -> f64 {
        self.quantity * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.purchase_price
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(invalid("asset id must not be empty"));
        }
        for (label, v) in [
            ("quantity", self.quantity),
            ("purchasePrice", self.purchase_price),
            ("currentPrice", self.current_price),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(format!(
                    "asset `{}`: {label} must be a finite value >= 0, got {v}",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

pub fn validate_assets(assets: &[Asset]) -> Result<()> {
    assets.iter().try_for_each(Asset::validate)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaxKind {
    Income,
    Capital,
    #[serde(alias = "retirementAccount", alias = "retirement_account")]
    RetirementAccount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRates {
    /// Marginal rates applied to consecutive slices of `bracket_width`;
    /// the last rate covers everything above the final slice.
    pub income_brackets: Vec<f64>,
    pub bracket_width: f64,
    pub capital_gains: f64,
    pub retirement_account: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalConfig {
    pub region: String,
    pub currency: String,
    pub contribution_cap: Option<f64>,
    pub non_concessional_cap: Option<f64>,
    pub tax_rates: TaxRates,
    pub inflation_rate: f64,
    pub risk_free_rate: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "amount")]
pub enum ContributionLimit {
    Capped(f64),
    Unlimited,
}

impl ContributionLimit {
    pub fn from_cap(cap: Option<f64>) -> Self {
        cap.map_or(ContributionLimit::Unlimited, ContributionLimit::Capped)
    }

    pub fn allows(&self, amount: f64) -> bool {
        match self {
            ContributionLimit::Capped(cap) => amount <= *cap,
            ContributionLimit::Unlimited => true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionLimits {
    pub concessional: ContributionLimit,
    pub non_concessional: ContributionLimit,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GainLoss {
    pub gain: f64,
    pub gain_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionYear {
    pub year: i32,
    pub total_value: f64,
    pub by_class: BTreeMap<AssetClass, f64>,
    pub contributions: f64,
    pub growth: f64,
    pub inflation: f64,
    pub taxes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloYearResult {
    pub year: u32,
    pub percentile10: f64,
    pub percentile25: f64,
    pub percentile50: f64,
    pub percentile75: f64,
    pub percentile90: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub probability_of_success: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioBundle {
    pub base_case: Vec<ProjectionYear>,
    pub optimistic: Vec<ProjectionYear>,
    pub pessimistic: Vec<ProjectionYear>,
    pub monte_carlo: Vec<MonteCarloYearResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WhatIfChanges {
    pub monthly_contribution: Option<f64>,
    pub retirement_age: Option<u32>,
    pub lump_sum: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfComparison {
    pub current: Vec<ProjectionYear>,
    pub what_if: Vec<ProjectionYear>,
}

impl WhatIfComparison {
    pub fn final_value_delta(&self) -> f64 {
        let last = |rows: &[ProjectionYear]| rows.last().map_or(0.0, |r| r.total_value);
        last(&self.what_if) - last(&self.current)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingSummary {
    pub id: String,
    pub asset_class: AssetClass,
    pub value: f64,
    pub gain: GainLoss,
    pub expected_return: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub allocation: BTreeMap<AssetClass, f64>,
    pub diversification_score: u32,
    pub risk_score: u32,
    pub holdings: Vec<HoldingSummary>,
}
