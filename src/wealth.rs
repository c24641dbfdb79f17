//! Personal holdings and their totals per kind.
//!
//! Holdings are entered by their owner and are only ever visible to them.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::auth::Identity;
use crate::error::{LedgerError, LedgerResult};
use crate::money::Money;
use crate::schemas::{HoldingId, UserId};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingKind {
    Stock,
    MutualFund,
    Bank,
    Fd,
}

impl HoldingKind {
    pub const ALL: [HoldingKind; 4] = [
        HoldingKind::Stock,
        HoldingKind::MutualFund,
        HoldingKind::Bank,
        HoldingKind::Fd,
    ];
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Holding {
    pub id: HoldingId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: HoldingKind,
    pub name: String,
    /// Units held; zero for deposits and bank balances.
    #[serde(default)]
    pub quantity: Decimal,
    /// Current value or balance.
    #[serde(default)]
    pub value: Money,
    #[serde(default)]
    pub meta: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewHolding {
    #[serde(rename = "type")]
    pub kind: HoldingKind,
    pub name: String,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub value: Money,
    #[serde(default)]
    pub meta: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct WealthSummary {
    pub totals: BTreeMap<HoldingKind, Money>,
    pub holdings: Vec<Holding>,
}

/// Every kind is present in `totals`, empty ones at zero.
pub fn summarize(holdings: Vec<Holding>) -> WealthSummary {
    let mut totals: BTreeMap<HoldingKind, Money> =
        HoldingKind::ALL.iter().map(|k| (*k, Money::ZERO)).collect();
    for holding in &holdings {
        *totals.entry(holding.kind).or_default() += holding.value;
    }
    for total in totals.values_mut() {
        *total = total.round2();
    }
    WealthSummary { totals, holdings }
}

pub struct Wealth {
    store: Arc<dyn Store>,
}

impl Wealth {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, identity, new), fields(user = %identity.user_id))]
    pub async fn add_holding(&self, identity: &Identity, new: NewHolding) -> LedgerResult<Holding> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(LedgerError::invalid("holding name must not be empty"));
        }
        if new.value.is_negative() || new.quantity < Decimal::ZERO {
            return Err(LedgerError::invalid("holding value and quantity must not be negative"));
        }
        let holding = Holding {
            id: HoldingId::new(),
            user_id: identity.user_id,
            kind: new.kind,
            name: name.to_string(),
            quantity: new.quantity,
            value: new.value,
            meta: new.meta,
        };
        self.store.insert_holding(&holding).await?;
        info!(holding = %holding.id, "holding added");
        Ok(holding)
    }

    pub async fn holdings(&self, identity: &Identity) -> LedgerResult<Vec<Holding>> {
        Ok(self.store.holdings(identity.user_id).await?)
    }

    pub async fn summary(&self, identity: &Identity) -> LedgerResult<WealthSummary> {
        Ok(summarize(self.holdings(identity).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::{identity, ALICE, BOB};
    use crate::store::InMemoryStore;
    use rust_decimal_macros::dec;

    fn new_holding(kind: HoldingKind, name: &str, value: Decimal) -> NewHolding {
        NewHolding {
            kind,
            name: name.to_string(),
            quantity: Decimal::ZERO,
            value: Money::new(value),
            meta: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn summary_totals_by_kind_per_user() {
        let wealth = Wealth::new(Arc::new(InMemoryStore::new()));
        let alice = identity(ALICE);
        for (kind, name, value) in [
            (HoldingKind::Stock, "INFY", dec!(17000)),
            (HoldingKind::Stock, "TCS", dec!(0.555)),
            (HoldingKind::Bank, "HDFC Savings", dec!(52000)),
        ] {
            wealth
                .add_holding(&alice, new_holding(kind, name, value))
                .await
                .unwrap();
        }
        wealth
            .add_holding(&identity(BOB), new_holding(HoldingKind::Fd, "SBI FD", dec!(100)))
            .await
            .unwrap();

        let summary = wealth.summary(&alice).await.unwrap();
        assert_eq!(summary.holdings.len(), 3);
        assert_eq!(summary.totals[&HoldingKind::Stock], Money::new(dec!(17000.56)));
        assert_eq!(summary.totals[&HoldingKind::Bank], Money::from(52000));
        assert!(summary.totals[&HoldingKind::MutualFund].is_zero());
        assert!(summary.totals[&HoldingKind::Fd].is_zero());
    }

    #[tokio::test]
    async fn rejects_nameless_or_negative_holdings() {
        let wealth = Wealth::new(Arc::new(InMemoryStore::new()));
        let alice = identity(ALICE);
        assert!(wealth
            .add_holding(&alice, new_holding(HoldingKind::Bank, "  ", dec!(1)))
            .await
            .is_err());
        assert!(wealth
            .add_holding(&alice, new_holding(HoldingKind::Bank, "HDFC", dec!(-1)))
            .await
            .is_err());
    }

    #[test]
    fn summary_serializes_kinds_as_snake_case() {
        let json = serde_json::to_value(summarize(vec![])).unwrap();
        assert_eq!(json["totals"]["mutual_fund"], "0.00");
        assert_eq!(json["totals"]["fd"], "0.00");
    }
}
