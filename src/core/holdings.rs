use chrono::Local;

use super::assets::AssetModel;
use super::types::{Asset, AssetClass};

const CONTRIBUTION_POOL_ID: &str = "contribution-pool";
const LUMP_SUM_ID: &str = "lump-sum";

/// One holding as both projection walks see it: the asset it came from,
/// its starting value, its return model and its share of new contributions.
#[derive(Debug, Clone)]
pub(crate) struct Holding {
    pub asset: Asset,
    pub value: f64,
    pub expected_return: f64,
    pub volatility: f64,
    pub contribution_weight: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct HoldingSet {
    holdings: Vec<Holding>,
}

impl HoldingSet {
    /// Contributions are split by starting value. A portfolio with no value
    /// routes them into a cash holding in the investor's currency instead.
    pub fn from_assets(model: &AssetModel, assets: &[Asset]) -> Self {
        let total: f64 = assets.iter().map(Asset::value).sum();
        let mut holdings: Vec<Holding> = assets
            .iter()
            .map(|asset| Holding {
                asset: asset.clone(),
                value: asset.value(),
                expected_return: model.expected_return(asset),
                volatility: model.volatility(asset),
                contribution_weight: if total > 0.0 {
                    asset.value() / total
                } else {
                    0.0
                },
            })
            .collect();

        if total <= 0.0 {
            let pool = investor_cash(model, CONTRIBUTION_POOL_ID, 0.0);
            holdings.push(Holding {
                expected_return: model.expected_return(&pool),
                volatility: model.volatility(&pool),
                asset: pool,
                value: 0.0,
                contribution_weight: 1.0,
            });
        }

        Self { holdings }
    }

    /// One-off cash injection: no volatility and no share of contributions.
    pub fn push_lump_sum(&mut self, model: &AssetModel, amount: f64) {
        let cash = investor_cash(model, LUMP_SUM_ID, amount);
        self.holdings.push(Holding {
            expected_return: model.expected_return(&cash),
            volatility: 0.0,
            value: cash.value(),
            asset: cash,
            contribution_weight: 0.0,
        });
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn starting_values(&self) -> Vec<f64> {
        self.holdings.iter().map(|h| h.value).collect()
    }

    pub fn total_value(&self) -> f64 {
        self.holdings.iter().map(|h| h.value).sum()
    }
}

fn investor_cash(model: &AssetModel, id: &str, amount: f64) -> Asset {
    let config = model.config();
    Asset {
        id: id.to_string(),
        name: id.to_string(),
        asset_class: AssetClass::Cash,
        quantity: 1.0,
        purchase_price: amount,
        current_price: amount,
        currency: config.currency.clone(),
        region: config.region.clone(),
        purchase_date: Local::now().date_naive(),
        metadata: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assets::tests::{au_model, holding};

    #[test]
    fn contribution_weights_follow_starting_value() {
        let model = au_model();
        let assets = vec![
            holding("eq", AssetClass::Equity, 3.0, 1.0, 100.0, "AUD", "AU"),
            holding("bd", AssetClass::Bond, 1.0, 1.0, 100.0, "AUD", "AU"),
        ];
        let set = HoldingSet::from_assets(&model, &assets);
        assert_eq!(set.len(), 2);
        let weights: Vec<f64> = set.holdings().iter().map(|h| h.contribution_weight).collect();
        assert!((weights[0] - 0.75).abs() < 1e-12);
        assert!((weights[1] - 0.25).abs() < 1e-12);
        assert!((set.total_value() - 400.0).abs() < 1e-12);
    }

    #[test]
    fn empty_portfolio_gets_contribution_pool() {
        let model = au_model();
        let set = HoldingSet::from_assets(&model, &[]);
        assert_eq!(set.len(), 1);
        let pool = &set.holdings()[0];
        assert_eq!(pool.asset.asset_class, AssetClass::Cash);
        assert_eq!(pool.asset.currency, "AUD");
        assert_eq!(pool.contribution_weight, 1.0);
        assert_eq!(set.total_value(), 0.0);
    }

    #[test]
    fn lump_sum_is_zero_volatility_and_takes_no_contributions() {
        let model = au_model();
        let assets = vec![holding("eq", AssetClass::Equity, 1.0, 1.0, 100.0, "AUD", "AU")];
        let mut set = HoldingSet::from_assets(&model, &assets);
        set.push_lump_sum(&model, 50.0);
        let lump = &set.holdings()[1];
        assert_eq!(lump.volatility, 0.0);
        assert_eq!(lump.contribution_weight, 0.0);
        assert_eq!(set.starting_values(), vec![100.0, 50.0]);
    }
}
