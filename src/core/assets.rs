use std::collections::{BTreeMap, BTreeSet};

use super::regions::tax_for;
use super::types::{Asset, AssetClass, GainLoss, RegionalConfig, TaxKind};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClassAssumption {
    pub expected_return: f64,
    pub volatility: f64,
}

impl ClassAssumption {
    pub const fn new(expected_return: f64, volatility: f64) -> Self {
        Self {
            expected_return,
            volatility,
        }
    }
}

/// Unknown or unmodelled classes take this instead of failing.
pub const FALLBACK_ASSUMPTION: ClassAssumption = ClassAssumption::new(0.05, 0.15);
pub const CURRENCY_RISK_PREMIUM: f64 = 0.005;

const CLASS_WEIGHT: u32 = 15;
const CLASS_CAP: u32 = 60;
const REGION_WEIGHT: u32 = 10;
const REGION_CAP: u32 = 25;
const CURRENCY_WEIGHT: u32 = 5;
const CURRENCY_CAP: u32 = 15;

/// Baseline return/volatility per asset class plus the adjustments layered
/// on top of it. Every figure is a policy default and can be replaced.
#[derive(Debug, Clone)]
pub struct ReturnAssumptions {
    classes: BTreeMap<AssetClass, ClassAssumption>,
    fallback: ClassAssumption,
    currency_risk_premium: f64,
    regional_returns: BTreeMap<(String, AssetClass), f64>,
}

impl Default for ReturnAssumptions {
    fn default() -> Self {
        let classes = BTreeMap::from([
            (AssetClass::Equity, ClassAssumption::new(0.08, 0.18)),
            (AssetClass::Fund, ClassAssumption::new(0.075, 0.14)),
            (AssetClass::Bond, ClassAssumption::new(0.04, 0.06)),
            (AssetClass::RealEstate, ClassAssumption::new(0.06, 0.12)),
            (AssetClass::DigitalAsset, ClassAssumption::new(0.12, 0.60)),
            (AssetClass::Cash, ClassAssumption::new(0.025, 0.0)),
            (AssetClass::RetirementAccount, ClassAssumption::new(0.075, 0.12)),
            (AssetClass::TermDeposit, ClassAssumption::new(0.055, 0.01)),
            (AssetClass::TaxAdvantagedSavings, ClassAssumption::new(0.075, 0.10)),
        ]);
        let regional_returns = BTreeMap::from([
            (("IN".to_string(), AssetClass::TermDeposit), 0.07),
            (("IN".to_string(), AssetClass::TaxAdvantagedSavings), 0.071),
            (("AU".to_string(), AssetClass::TermDeposit), 0.05),
            (("UK".to_string(), AssetClass::TermDeposit), 0.045),
        ]);

        Self {
            classes,
            fallback: FALLBACK_ASSUMPTION,
            currency_risk_premium: CURRENCY_RISK_PREMIUM,
            regional_returns,
        }
    }
}

impl ReturnAssumptions {
    pub fn with_class(mut self, class: AssetClass, assumption: ClassAssumption) -> Self {
        self.classes.insert(class, assumption);
        self
    }

    pub fn with_fallback(mut self, assumption: ClassAssumption) -> Self {
        self.fallback = assumption;
        self
    }

    pub fn with_currency_risk_premium(mut self, premium: f64) -> Self {
        self.currency_risk_premium = premium;
        self
    }

    pub fn with_regional_return(mut self, region: &str, class: AssetClass, rate: f64) -> Self {
        self.regional_returns
            .insert((region.trim().to_ascii_uppercase(), class), rate);
        self
    }

    pub fn class(&self, class: AssetClass) -> ClassAssumption {
        self.classes.get(&class).copied().unwrap_or(self.fallback)
    }

    fn regional_return(&self, region: &str, class: AssetClass) -> Option<f64> {
        self.regional_returns
            .get(&(region.trim().to_ascii_uppercase(), class))
            .copied()
    }
}

/// Per-holding valuation and modelling in the context of one investor's
/// region (the asset itself may sit in a different region or currency).
#[derive(Debug, Clone)]
pub struct AssetModel {
    config: RegionalConfig,
    assumptions: ReturnAssumptions,
}

impl AssetModel {
    pub fn new(config: RegionalConfig) -> Self {
        Self::with_assumptions(config, ReturnAssumptions::default())
    }

    pub fn with_assumptions(config: RegionalConfig, assumptions: ReturnAssumptions) -> Self {
        Self {
            config,
            assumptions,
        }
    }

    pub fn config(&self) -> &RegionalConfig {
        &self.config
    }

    pub fn assumptions(&self) -> &ReturnAssumptions {
        &self.assumptions
    }

    pub fn value(&self, asset: &Asset) -> f64 {
        asset.value()
    }

    pub fn gain(&self, asset: &Asset) -> GainLoss {
        let basis = asset.cost_basis();
        let gain = asset.value() - basis;
        let gain_percent = if basis > 0.0 {
            gain / basis * 100.0
        } else {
            0.0
        };
        GainLoss { gain, gain_percent }
    }

    pub fn expected_return(&self, asset: &Asset) -> f64 {
        let base = self
            .assumptions
            .regional_return(&asset.region, asset.asset_class)
            .unwrap_or_else(|| self.assumptions.class(asset.asset_class).expected_return);

        if self.is_foreign_currency(asset) {
            base + self.assumptions.currency_risk_premium
        } else {
            base
        }
    }

    pub fn volatility(&self, asset: &Asset) -> f64 {
        self.assumptions.class(asset.asset_class).volatility
    }

    /// 0..=100: capped credit for distinct classes, regions and currencies.
    pub fn diversification_score(&self, assets: &[Asset]) -> u32 {
        if assets.is_empty() {
            return 0;
        }

        let classes: BTreeSet<AssetClass> = assets.iter().map(|a| a.asset_class).collect();
        let regions: BTreeSet<String> = assets
            .iter()
            .map(|a| a.region.trim().to_ascii_uppercase())
            .collect();
        let currencies: BTreeSet<String> = assets
            .iter()
            .map(|a| a.currency.trim().to_ascii_uppercase())
            .collect();

        let capped = |count: usize, weight: u32, cap: u32| (count as u32 * weight).min(cap);
        let score = capped(classes.len(), CLASS_WEIGHT, CLASS_CAP)
            + capped(regions.len(), REGION_WEIGHT, REGION_CAP)
            + capped(currencies.len(), CURRENCY_WEIGHT, CURRENCY_CAP);
        score.min(100)
    }

    /// Value-weighted average volatility, as a 0..=100 integer.
    pub fn risk_score(&self, assets: &[Asset]) -> u32 {
        let total: f64 = assets.iter().map(Asset::value).sum();
        if total <= 0.0 {
            return 0;
        }

        let weighted: f64 = assets
            .iter()
            .map(|a| a.value() / total * self.volatility(a))
            .sum();
        (weighted * 100.0).round().clamp(0.0, 100.0) as u32
    }

    pub fn tax_on_gain(&self, asset: &Asset, gain: f64) -> f64 {
        let kind = match asset.asset_class {
            AssetClass::RetirementAccount => TaxKind::RetirementAccount,
            _ => TaxKind::Capital,
        };
        tax_for(&self.config.tax_rates, gain, kind)
    }

    fn is_foreign_currency(&self, asset: &Asset) -> bool {
        !asset
            .currency
            .trim()
            .eq_ignore_ascii_case(self.config.currency.trim())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::regions::RegionalRuleTable;
    use chrono::NaiveDate;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    pub(crate) fn holding(
        id: &str,
        class: AssetClass,
        quantity: f64,
        purchase: f64,
        current: f64,
        currency: &str,
        region: &str,
    ) -> Asset {
        Asset {
            id: id.to_string(),
            name: id.to_uppercase(),
            asset_class: class,
            quantity,
            purchase_price: purchase,
            current_price: current,
            currency: currency.to_string(),
            region: region.to_string(),
            purchase_date: NaiveDate::from_ymd_opt(2020, 1, 15).expect("valid date"),
            metadata: Default::default(),
        }
    }

    pub(crate) fn au_model() -> AssetModel {
        let table = RegionalRuleTable::standard();
        AssetModel::new(table.get_config("AU").expect("AU").clone())
    }

    #[test]
    fn value_and_gain_follow_quantity_and_prices() {
        let model = au_model();
        let asset = holding("vas", AssetClass::Fund, 100.0, 80.0, 105.0, "AUD", "AU");
        assert_approx(model.value(&asset), 10_500.0);
        let gain = model.gain(&asset);
        assert_approx(gain.gain, 2_500.0);
        assert_approx(gain.gain_percent, 31.25);
    }

    #[test]
    fn gain_percent_is_zero_for_zero_cost_basis() {
        let model = au_model();
        let gifted = holding("gift", AssetClass::Equity, 10.0, 0.0, 50.0, "AUD", "AU");
        let gain = model.gain(&gifted);
        assert_approx(gain.gain, 500.0);
        assert_approx(gain.gain_percent, 0.0);
    }

    #[test]
    fn expected_return_applies_regional_override_and_currency_premium() {
        let model = au_model();
        let local_td = holding("td", AssetClass::TermDeposit, 1.0, 1.0, 1.0, "AUD", "AU");
        assert_approx(model.expected_return(&local_td), 0.05);

        let indian_ppf = holding(
            "ppf",
            AssetClass::TaxAdvantagedSavings,
            1.0,
            1.0,
            1.0,
            "INR",
            "IN",
        );
        assert_approx(model.expected_return(&indian_ppf), 0.071 + CURRENCY_RISK_PREMIUM);

        let us_equity = holding("spy", AssetClass::Equity, 1.0, 1.0, 1.0, "usd", "US");
        assert_approx(model.expected_return(&us_equity), 0.08 + CURRENCY_RISK_PREMIUM);
    }

    #[test]
    fn unknown_class_uses_fallback_assumption() {
        let model = au_model();
        let art = holding("art", AssetClass::Other, 1.0, 1.0, 1.0, "AUD", "AU");
        assert_approx(model.expected_return(&art), FALLBACK_ASSUMPTION.expected_return);
        assert_approx(model.volatility(&art), FALLBACK_ASSUMPTION.volatility);
    }

    #[test]
    fn volatility_orders_classes_sensibly() {
        let a = ReturnAssumptions::default();
        let vol = |c| a.class(c).volatility;
        assert!(vol(AssetClass::DigitalAsset) > vol(AssetClass::Equity));
        assert!(vol(AssetClass::Equity) > vol(AssetClass::Fund));
        assert!(vol(AssetClass::Equity) > vol(AssetClass::Bond));
        assert!(vol(AssetClass::Equity) > vol(AssetClass::RealEstate));
        assert!(vol(AssetClass::Cash) <= 0.01);
        assert!(vol(AssetClass::TermDeposit) <= 0.01);
    }

    #[test]
    fn diversification_rewards_spread() {
        let model = au_model();
        assert_eq!(model.diversification_score(&[]), 0);

        let single = vec![holding("a", AssetClass::Equity, 1.0, 1.0, 1.0, "AUD", "AU")];
        let four = vec![
            holding("a", AssetClass::Equity, 1.0, 1.0, 1.0, "AUD", "AU"),
            holding("b", AssetClass::Bond, 1.0, 1.0, 1.0, "AUD", "AU"),
            holding("c", AssetClass::RealEstate, 1.0, 1.0, 1.0, "AUD", "AU"),
            holding("d", AssetClass::Cash, 1.0, 1.0, 1.0, "AUD", "AU"),
        ];
        assert_eq!(model.diversification_score(&single), 30);
        assert_eq!(model.diversification_score(&four), 75);
        assert!(model.diversification_score(&single) < model.diversification_score(&four));
    }

    #[test]
    fn diversification_is_capped_at_one_hundred() {
        let model = au_model();
        let regions = ["AU", "US", "UK", "IN"];
        let currencies = ["AUD", "USD", "GBP", "INR"];
        let assets: Vec<Asset> = AssetClass::ALL
            .iter()
            .enumerate()
            .map(|(i, class)| {
                holding(
                    &format!("h{i}"),
                    *class,
                    1.0,
                    1.0,
                    1.0,
                    currencies[i % 4],
                    regions[i % 4],
                )
            })
            .collect();
        assert_eq!(model.diversification_score(&assets), 100);
    }

    #[test]
    fn risk_score_is_value_weighted() {
        let model = au_model();
        assert_eq!(model.risk_score(&[]), 0);

        let mix = vec![
            holding("eq", AssetClass::Equity, 1.0, 1.0, 80.0, "AUD", "AU"),
            holding("cash", AssetClass::Cash, 1.0, 1.0, 20.0, "AUD", "AU"),
        ];
        // 0.8 * 0.18 + 0.2 * 0.0 = 0.144
        assert_eq!(model.risk_score(&mix), 14);

        let worthless = vec![holding("x", AssetClass::Equity, 0.0, 1.0, 1.0, "AUD", "AU")];
        assert_eq!(model.risk_score(&worthless), 0);
    }

    #[test]
    fn risk_score_rises_with_uniformly_higher_volatility() {
        let config = au_model().config().clone();
        let with_vol = |vol: f64| {
            let mut assumptions =
                ReturnAssumptions::default().with_fallback(ClassAssumption::new(0.05, vol));
            for class in AssetClass::ALL {
                assumptions = assumptions.with_class(class, ClassAssumption::new(0.05, vol));
            }
            AssetModel::with_assumptions(config.clone(), assumptions)
        };
        let portfolio = vec![
            holding("eq", AssetClass::Equity, 10.0, 1.0, 30.0, "AUD", "AU"),
            holding("bd", AssetClass::Bond, 5.0, 1.0, 20.0, "AUD", "AU"),
            holding("btc", AssetClass::DigitalAsset, 0.1, 1.0, 500.0, "USD", "US"),
        ];
        assert!(with_vol(0.30).risk_score(&portfolio) > with_vol(0.10).risk_score(&portfolio));
    }

    #[test]
    fn tax_on_gain_uses_retirement_rate_only_for_retirement_accounts() {
        let model = au_model();
        let super_fund = holding(
            "super",
            AssetClass::RetirementAccount,
            1.0,
            1.0,
            1.0,
            "AUD",
            "AU",
        );
        let shares = holding("cba", AssetClass::Equity, 1.0, 1.0, 1.0, "AUD", "AU");
        assert_approx(model.tax_on_gain(&super_fund, 1_000.0), 150.0);
        assert_approx(model.tax_on_gain(&shares, 1_000.0), 235.0);
        assert_approx(model.tax_on_gain(&shares, -1_000.0), 0.0);

        let us = RegionalRuleTable::standard().get_config("US").expect("US").clone();
        let us_model = AssetModel::new(us);
        assert_approx(us_model.tax_on_gain(&super_fund, 1_000.0), 150.0);
    }

    proptest! {
        #[test]
        fn prop_adding_new_class_never_lowers_diversification(
            base_classes in proptest::collection::vec(0usize..9, 1..6),
            extra in 0usize..10,
        ) {
            let model = au_model();
            let mut assets: Vec<Asset> = base_classes
                .iter()
                .enumerate()
                .map(|(i, c)| holding(&format!("h{i}"), AssetClass::ALL[*c], 1.0, 1.0, 1.0, "AUD", "AU"))
                .collect();
            let before = model.diversification_score(&assets);
            assets.push(holding("extra", AssetClass::ALL[extra], 1.0, 1.0, 1.0, "USD", "US"));
            let after = model.diversification_score(&assets);
            prop_assert!(after >= before);
            prop_assert!(after <= 100);
        }

        #[test]
        fn prop_gain_matches_value_minus_basis(
            quantity in 0.0f64..1.0e4,
            purchase in 0.0f64..1.0e3,
            current in 0.0f64..1.0e3,
        ) {
            let model = au_model();
            let asset = holding("p", AssetClass::Equity, quantity, purchase, current, "AUD", "AU");
            let gain = model.gain(&asset);
            prop_assert!((gain.gain - (quantity * current - quantity * purchase)).abs() <= 1e-6);
            if quantity * purchase == 0.0 {
                prop_assert_eq!(gain.gain_percent, 0.0);
            }
        }
    }
}
