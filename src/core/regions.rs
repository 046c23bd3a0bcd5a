use std::collections::BTreeMap;

use super::error::{ProjectionError, Result};
use super::types::{ContributionLimit, ContributionLimits, RegionalConfig, TaxKind, TaxRates};

/// Jurisdiction lookup table: tax rates, contribution caps, inflation and
/// risk-free assumptions keyed by upper-case region code.
#[derive(Debug, Clone)]
pub struct RegionalRuleTable {
    configs: BTreeMap<String, RegionalConfig>,
}

impl Default for RegionalRuleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RegionalRuleTable {
    pub fn empty() -> Self {
        Self {
            configs: BTreeMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut table = Self::empty();
        for config in [
            australia(),
            united_states(),
            united_kingdom(),
            india(),
        ] {
            table = table.with_config(config);
        }
        table
    }

    /// Inserts or replaces the config for `config.region`.
    pub fn with_config(mut self, mut config: RegionalConfig) -> Self {
        config.region = normalize_region(&config.region);
        self.configs.insert(config.region.clone(), config);
        self
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    pub fn get_config(&self, region: &str) -> Result<&RegionalConfig> {
        let key = normalize_region(region);
        self.configs
            .get(&key)
            .ok_or(ProjectionError::ConfigNotFound(key))
    }

    pub fn calculate_tax(&self, amount: f64, region: &str, kind: TaxKind) -> Result<f64> {
        let config = self.get_config(region)?;
        Ok(tax_for(&config.tax_rates, amount, kind))
    }

    pub fn get_contribution_limits(&self, region: &str) -> Result<ContributionLimits> {
        let config = self.get_config(region)?;
        Ok(ContributionLimits {
            concessional: ContributionLimit::from_cap(config.contribution_cap),
            non_concessional: ContributionLimit::from_cap(config.non_concessional_cap),
        })
    }
}

pub fn tax_for(rates: &TaxRates, amount: f64, kind: TaxKind) -> f64 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0.0;
    }

    let tax = match kind {
        TaxKind::Capital => amount * rates.capital_gains,
        TaxKind::RetirementAccount => {
            amount * rates.retirement_account.unwrap_or(rates.capital_gains)
        }
        TaxKind::Income => progressive_income_tax(rates, amount),
    };
    tax.max(0.0)
}

fn progressive_income_tax(rates: &TaxRates, amount: f64) -> f64 {
    let width = rates.bracket_width.max(0.0);
    let mut remaining = amount;
    let mut tax = 0.0;

    for (idx, rate) in rates.income_brackets.iter().enumerate() {
        if remaining <= 0.0 {
            break;
        }
        let is_last = idx + 1 == rates.income_brackets.len();
        let slice = if is_last { remaining } else { remaining.min(width) };
        tax += slice * rate;
        remaining -= slice;
    }

    tax
}

fn normalize_region(region: &str) -> String {
    region.trim().to_ascii_uppercase()
}

fn australia() -> RegionalConfig {
    RegionalConfig {
        region: "AU".to_string(),
        currency: "AUD".to_string(),
        contribution_cap: Some(30_000.0),
        non_concessional_cap: Some(120_000.0),
        tax_rates: TaxRates {
            income_brackets: vec![0.0, 0.16, 0.30, 0.37, 0.45],
            bracket_width: 45_000.0,
            capital_gains: 0.235,
            retirement_account: Some(0.15),
        },
        inflation_rate: 0.035,
        risk_free_rate: 0.0435,
    }
}

fn united_states() -> RegionalConfig {
    RegionalConfig {
        region: "US".to_string(),
        currency: "USD".to_string(),
        contribution_cap: Some(23_000.0),
        non_concessional_cap: None,
        tax_rates: TaxRates {
            income_brackets: vec![0.10, 0.12, 0.22, 0.24, 0.32, 0.35, 0.37],
            bracket_width: 50_000.0,
            capital_gains: 0.15,
            retirement_account: None,
        },
        inflation_rate: 0.03,
        risk_free_rate: 0.045,
    }
}

fn united_kingdom() -> RegionalConfig {
    RegionalConfig {
        region: "UK".to_string(),
        currency: "GBP".to_string(),
        contribution_cap: Some(60_000.0),
        non_concessional_cap: Some(20_000.0),
        tax_rates: TaxRates {
            income_brackets: vec![0.0, 0.20, 0.40, 0.45],
            bracket_width: 40_000.0,
            capital_gains: 0.20,
            retirement_account: Some(0.0),
        },
        inflation_rate: 0.027,
        risk_free_rate: 0.0425,
    }
}

fn india() -> RegionalConfig {
    RegionalConfig {
        region: "IN".to_string(),
        currency: "INR".to_string(),
        contribution_cap: Some(150_000.0),
        non_concessional_cap: None,
        tax_rates: TaxRates {
            income_brackets: vec![0.0, 0.05, 0.10, 0.15, 0.20, 0.30],
            bracket_width: 400_000.0,
            capital_gains: 0.125,
            retirement_account: Some(0.0),
        },
        inflation_rate: 0.05,
        risk_free_rate: 0.07,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn supported_regions_have_distinct_currency_and_inflation() {
        let table = RegionalRuleTable::standard();
        let au = table.get_config("AU").expect("AU config");
        let india = table.get_config("IN").expect("IN config");
        assert_ne!(au.currency, india.currency);
        assert!((au.inflation_rate - india.inflation_rate).abs() > EPS);
        assert_eq!(table.regions().count(), 4);
    }

    #[test]
    fn unsupported_region_is_config_not_found() {
        let table = RegionalRuleTable::standard();
        let err = table.get_config("zz").expect_err("ZZ is unsupported");
        assert_eq!(err, ProjectionError::ConfigNotFound("ZZ".to_string()));
        assert!(table.calculate_tax(100.0, "ZZ", TaxKind::Income).is_err());
        assert!(table.get_contribution_limits("ZZ").is_err());
    }

    #[test]
    fn region_lookup_ignores_case_and_whitespace() {
        let table = RegionalRuleTable::standard();
        assert_eq!(table.get_config(" au ").expect("AU").currency, "AUD");
    }

    #[test]
    fn capital_and_retirement_rates_are_flat() {
        let table = RegionalRuleTable::standard();
        assert_approx(
            table.calculate_tax(1_000.0, "AU", TaxKind::Capital).expect("AU"),
            235.0,
        );
        assert_approx(
            table
                .calculate_tax(1_000.0, "AU", TaxKind::RetirementAccount)
                .expect("AU"),
            150.0,
        );
        // No retirement rate in US: falls back to capital gains.
        assert_approx(
            table
                .calculate_tax(1_000.0, "US", TaxKind::RetirementAccount)
                .expect("US"),
            150.0,
        );
    }

    #[test]
    fn income_tax_walks_brackets_slice_by_slice() {
        let table = RegionalRuleTable::standard();
        // AU: 45k @ 0, 45k @ 16%, 10k @ 30%.
        assert_approx(
            table.calculate_tax(100_000.0, "AU", TaxKind::Income).expect("AU"),
            7_200.0 + 3_000.0,
        );
        // UK: final rate covers everything above the last slice.
        assert_approx(
            table.calculate_tax(200_000.0, "UK", TaxKind::Income).expect("UK"),
            8_000.0 + 16_000.0 + 80_000.0 * 0.45,
        );
    }

    #[test]
    fn contribution_limits_report_unlimited_sentinel() {
        let table = RegionalRuleTable::standard();
        let us = table.get_contribution_limits("US").expect("US");
        assert_eq!(us.concessional, ContributionLimit::Capped(23_000.0));
        assert_eq!(us.non_concessional, ContributionLimit::Unlimited);
        assert!(us.non_concessional.allows(f64::MAX));
        assert!(!us.concessional.allows(23_000.01));
    }

    #[test]
    fn with_config_replaces_existing_region() {
        let mut custom = RegionalRuleTable::standard()
            .get_config("US")
            .expect("US")
            .clone();
        custom.region = "us".to_string();
        custom.inflation_rate = 0.10;
        let table = RegionalRuleTable::standard().with_config(custom);
        assert_approx(table.get_config("US").expect("US").inflation_rate, 0.10);
        assert_eq!(table.regions().count(), 4);
    }

    proptest! {
        #[test]
        fn prop_tax_is_never_negative_and_monotone_in_amount(
            amount in -1.0e6f64..5.0e6,
            extra in 0.0f64..1.0e6,
        ) {
            let table = RegionalRuleTable::standard();
            for region in ["AU", "US", "UK", "IN"] {
                for kind in [TaxKind::Income, TaxKind::Capital, TaxKind::RetirementAccount] {
                    let low = table.calculate_tax(amount, region, kind).expect("known region");
                    let high = table.calculate_tax(amount + extra, region, kind).expect("known region");
                    prop_assert!(low >= 0.0);
                    prop_assert!(high + EPS >= low);
                }
            }
        }
    }
}
