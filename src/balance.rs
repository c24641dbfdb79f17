use std::collections::HashMap;

use crate::auth::Identity;
use crate::error::LedgerResult;
use crate::ledger::Ledger;
use crate::money::Money;
use crate::schemas::{BalanceItem, GroupId, GroupLedger, UserId};

type Balance = HashMap<UserId, Money>;

/// Net position of every member of the group.
///
/// Each split moves its amount from the participant to the payer, and each
/// settlement moves its amount from `from_user` to `to_user`. Both are
/// zero-sum, so the nets add up to zero before rounding. Members are seeded
/// from the current member list and returned in join order.
pub fn compute_balance_from_group(group: &GroupLedger) -> Vec<BalanceItem> {
    let mut order: Vec<UserId> = group.members.iter().map(|m| m.user_id).collect();
    let mut balance: Balance = order.iter().map(|id| (*id, Money::ZERO)).collect();

    let mut adjust = |user: UserId, delta: Money| {
        *balance.entry(user).or_insert_with(|| {
            order.push(user);
            Money::ZERO
        }) += delta;
    };

    for expense in &group.expenses {
        for split in &expense.splits {
            adjust(split.user_id, -split.amount);
            adjust(expense.payer, split.amount);
        }
    }
    for settlement in &group.settlements {
        adjust(settlement.from_user, -settlement.amount);
        adjust(settlement.to_user, settlement.amount);
    }

    order
        .into_iter()
        .map(|user_id| BalanceItem {
            user_id,
            net: balance.get(&user_id).copied().unwrap_or_default().round2(),
        })
        .collect()
}

impl Ledger {
    pub async fn balances(
        &self,
        identity: &Identity,
        group: GroupId,
    ) -> LedgerResult<Vec<BalanceItem>> {
        let snapshot = self.snapshot(group, identity).await?;
        Ok(compute_balance_from_group(&snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::{expense, identity, settlement, trip, ALICE, BOB, CAROL, MALLORY};
    use crate::schemas::{Expense, ExpenseId, Member, Settlement, SettlementId, Split};
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn nets(items: &[BalanceItem]) -> Vec<(UserId, Money)> {
        items.iter().map(|b| (b.user_id, b.net)).collect()
    }

    #[tokio::test]
    async fn trip_scenario() {
        let (ledger, group) = trip().await;
        let alice = identity(ALICE);
        ledger
            .record_expense(
                &alice,
                group,
                expense(ALICE, 3000, &[(ALICE, 1000), (BOB, 1000), (CAROL, 1000)]),
            )
            .await
            .unwrap();
        assert_eq!(
            nets(&ledger.balances(&alice, group).await.unwrap()),
            vec![
                (ALICE, Money::from(2000)),
                (BOB, Money::from(-1000)),
                (CAROL, Money::from(-1000)),
            ]
        );

        ledger
            .record_expense(
                &identity(BOB),
                group,
                expense(BOB, 900, &[(ALICE, 300), (BOB, 300), (CAROL, 300)]),
            )
            .await
            .unwrap();
        let balances = ledger.balances(&identity(CAROL), group).await.unwrap();
        assert_eq!(
            nets(&balances),
            vec![
                (ALICE, Money::from(1700)),
                (BOB, Money::from(-400)),
                (CAROL, Money::from(-1300)),
            ]
        );
        assert!(balances.iter().map(|b| b.net).sum::<Money>().is_zero());
    }

    #[tokio::test]
    async fn settlement_moves_only_the_two_parties() {
        let (ledger, group) = trip().await;
        let alice = identity(ALICE);
        ledger
            .record_expense(
                &alice,
                group,
                expense(ALICE, 3000, &[(ALICE, 1000), (BOB, 1000), (CAROL, 1000)]),
            )
            .await
            .unwrap();
        let before = ledger.balances(&alice, group).await.unwrap();
        ledger
            .record_settlement(&alice, group, settlement(BOB, ALICE, 400))
            .await
            .unwrap();
        let after = ledger.balances(&alice, group).await.unwrap();

        let delta: Vec<(UserId, Money)> = before
            .iter()
            .zip(&after)
            .map(|(b, a)| (a.user_id, a.net - b.net))
            .collect();
        assert_eq!(
            delta,
            vec![
                (ALICE, Money::from(400)),
                (BOB, Money::from(-400)),
                (CAROL, Money::ZERO),
            ]
        );
    }

    #[tokio::test]
    async fn payer_is_credited_only_for_others_shares() {
        let (ledger, group) = trip().await;
        ledger
            .record_expense(
                &identity(CAROL),
                group,
                expense(CAROL, 100, &[(CAROL, 40), (ALICE, 60)]),
            )
            .await
            .unwrap();
        let balances = ledger.balances(&identity(CAROL), group).await.unwrap();
        assert_eq!(
            nets(&balances),
            vec![
                (ALICE, Money::from(-60)),
                (BOB, Money::ZERO),
                (CAROL, Money::from(60)),
            ]
        );
    }

    #[tokio::test]
    async fn late_joiners_start_at_zero() {
        let (ledger, group) = trip().await;
        let alice = identity(ALICE);
        ledger
            .record_expense(&alice, group, expense(ALICE, 90, &[(BOB, 45), (CAROL, 45)]))
            .await
            .unwrap();
        ledger.add_member(&alice, group, MALLORY).await.unwrap();
        let balances = ledger.balances(&identity(MALLORY), group).await.unwrap();
        assert_eq!(balances.len(), 4);
        assert_eq!(balances[3].user_id, MALLORY);
        assert!(balances[3].net.is_zero());
    }

    #[test]
    fn nets_are_rounded_to_cents() {
        let group = GroupId::new();
        let now = Utc::now();
        let third = Money::new(Decimal::new(3_333_333, 6));
        let ledger = GroupLedger {
            members: [ALICE, BOB]
                .into_iter()
                .map(|user_id| Member {
                    group_id: group,
                    user_id,
                    joined_at: now,
                })
                .collect(),
            expenses: vec![Expense {
                id: ExpenseId::new(),
                group_id: group,
                payer: ALICE,
                amount: third,
                description: String::new(),
                splits: vec![Split {
                    user_id: BOB,
                    amount: third,
                }],
                created_at: now,
            }],
            settlements: vec![],
        };
        let balances = compute_balance_from_group(&ledger);
        assert_eq!(balances[0].net.to_string(), "3.33");
        assert_eq!(balances[1].net.to_string(), "-3.33");
    }

    fn arbitrary_ledger() -> impl Strategy<Value = GroupLedger> {
        let users = 2i64..6;
        users.prop_flat_map(|count| {
            let user = (0..count).prop_map(UserId);
            let amount = (0i64..1_000_000).prop_map(Money::from_minor);
            let splits = prop::collection::vec((user.clone(), amount.clone()), 1..6);
            let expenses = prop::collection::vec((user.clone(), splits), 0..12);
            let settlements = prop::collection::vec(
                (user.clone(), user, (1i64..1_000_000).prop_map(Money::from_minor)),
                0..6,
            );
            (Just(count), expenses, settlements)
        })
        .prop_map(|(count, expenses, settlements)| {
            let group = GroupId::new();
            let now = Utc::now();
            GroupLedger {
                members: (0..count)
                    .map(|id| Member {
                        group_id: group,
                        user_id: UserId(id),
                        joined_at: now,
                    })
                    .collect(),
                expenses: expenses
                    .into_iter()
                    .map(|(payer, splits)| Expense {
                        id: ExpenseId::new(),
                        group_id: group,
                        payer,
                        amount: splits.iter().map(|(_, a)| *a).sum(),
                        description: String::new(),
                        splits: splits
                            .into_iter()
                            .map(|(user_id, amount)| Split { user_id, amount })
                            .collect(),
                        created_at: now,
                    })
                    .collect(),
                settlements: settlements
                    .into_iter()
                    .map(|(from_user, to_user, amount)| Settlement {
                        id: SettlementId::new(),
                        group_id: group,
                        from_user,
                        to_user,
                        amount,
                        note: String::new(),
                        created_at: now,
                    })
                    .collect(),
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever was recorded, the nets of a group sum to zero.
        #[test]
        fn nets_sum_to_zero(ledger in arbitrary_ledger()) {
            let balances = compute_balance_from_group(&ledger);
            prop_assert_eq!(balances.len(), ledger.members.len());
            let total: Money = balances.iter().map(|b| b.net).sum();
            prop_assert!(total.abs() <= Money::from_minor(1));
        }

        /// Property: a settlement of A from X to Y moves X by -A and Y by +A.
        #[test]
        fn settlement_is_symmetric(
            ledger in arbitrary_ledger(),
            amount in (1i64..1_000_000).prop_map(Money::from_minor),
        ) {
            let before = compute_balance_from_group(&ledger);
            let (from, to) = (ledger.members[0].user_id, ledger.members[1].user_id);
            let mut with_settlement = ledger.clone();
            with_settlement.settlements.push(Settlement {
                id: SettlementId::new(),
                group_id: GroupId::new(),
                from_user: from,
                to_user: to,
                amount,
                note: String::new(),
                created_at: Utc::now(),
            });
            let after = compute_balance_from_group(&with_settlement);
            for (b, a) in before.iter().zip(&after) {
                let expected = if a.user_id == from {
                    -amount
                } else if a.user_id == to {
                    amount
                } else {
                    Money::ZERO
                };
                prop_assert_eq!(a.net - b.net, expected);
            }
        }
    }
}
