use std::collections::HashMap;
use std::mem::swap;

use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::balance::compute_balance_from_group;
use crate::config::UpiConfig;
use crate::error::LedgerResult;
use crate::ledger::Ledger;
use crate::money::Money;
use crate::payments::{upi_link, UpiLinkRequest};
use crate::schemas::{GroupId, GroupLedger, UserId};

#[derive(Clone, Debug)]
struct PersonalBalance {
    id: UserId,
    balance: Money,
}

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
struct UserPair {
    user1: UserId,
    user2: UserId,
}

/// `payer` should pay `receiver` this amount.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub payer: UserId,
    pub receiver: UserId,
    pub amount: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuggestedPayment {
    #[serde(flatten)]
    pub exchange: Exchange,
    /// Present when the receiver has a UPI id on file.
    pub upi_link: Option<String>,
}

// The exchanges that will be made if no simplification happens
fn get_naive_exchanges(group: &GroupLedger) -> Vec<Exchange> {
    let mut balances_between_people: HashMap<UserPair, Money> = HashMap::new();

    // Positive: user2 owes user1.
    let mut owe = |debtor: UserId, creditor: UserId, amount: Money| {
        if debtor == creditor {
            return;
        }
        let mut pair = UserPair {
            user1: creditor,
            user2: debtor,
        };
        let mut amount = amount;
        // Keep every pair in one direction so opposite debts cancel out
        if pair.user1 > pair.user2 {
            swap(&mut pair.user1, &mut pair.user2);
            amount = -amount;
        }
        *balances_between_people.entry(pair).or_default() += amount;
    };

    for expense in &group.expenses {
        for split in &expense.splits {
            owe(split.user_id, expense.payer, split.amount);
        }
    }
    // A settlement lowers `from_user`'s net and raises `to_user`'s, which is
    // the same movement as `from_user` owing `to_user`.
    for settlement in &group.settlements {
        owe(settlement.from_user, settlement.to_user, settlement.amount);
    }

    let mut exchanges = Vec::new();
    for (people_pair, balance) in balances_between_people {
        let balance = balance.round2();
        if balance.is_zero() {
            continue;
        }
        let mut payer = people_pair.user2;
        let mut receiver = people_pair.user1;
        // If the balance is negative the debt runs the other way
        if balance.is_negative() {
            swap(&mut payer, &mut receiver);
        }
        exchanges.push(Exchange {
            payer,
            receiver,
            amount: balance.abs(),
        });
    }
    exchanges.sort_by_key(|e| (e.payer, e.receiver));
    exchanges
}

// Matches the largest debtor against the largest creditor until one side runs out
fn get_simplified_exchanges(
    mut payers: Vec<PersonalBalance>,
    mut receivers: Vec<PersonalBalance>,
) -> Vec<Exchange> {
    payers.sort_by_key(|p| (p.balance, p.id));
    receivers.sort_by_key(|r| (r.balance, r.id));

    let mut exchanges: Vec<Exchange> = Vec::new();

    while let (Some(payer), Some(receiver)) = (payers.last_mut(), receivers.last_mut()) {
        let amount = payer.balance.min(receiver.balance);
        exchanges.push(Exchange {
            payer: payer.id,
            receiver: receiver.id,
            amount,
        });
        payer.balance = (payer.balance - amount).round2();
        receiver.balance = (receiver.balance - amount).round2();
        if payer.balance.is_zero() {
            payers.pop();
        }
        if receiver.balance.is_zero() {
            receivers.pop();
        }
    }
    exchanges
}

/// Suggested payments that bring every net in the group back to zero.
///
/// Returns the greedy simplification when it needs fewer payments than
/// settling every pair directly, otherwise the pairwise list.
pub fn get_exchanges_from_group(group: &GroupLedger) -> Vec<Exchange> {
    let people_balances = compute_balance_from_group(group);

    // Divide people into payers and receivers
    let mut payers = Vec::new();
    let mut receivers = Vec::new();

    for item in people_balances {
        let person = PersonalBalance {
            id: item.user_id,
            balance: item.net.abs(),
        };
        if item.net.is_negative() {
            payers.push(person);
        } else if item.net.is_positive() {
            receivers.push(person);
        }
    }

    let naive_exchanges = get_naive_exchanges(group);
    let simplified_exchanges = get_simplified_exchanges(payers, receivers);

    // We ensure the simplification didn't accidentally end up being
    // more complicated than the naive exchanges
    if simplified_exchanges.len() < naive_exchanges.len() {
        simplified_exchanges
    } else {
        naive_exchanges
    }
}

impl Ledger {
    pub async fn settle_up(
        &self,
        identity: &Identity,
        group: GroupId,
        upi: &UpiConfig,
    ) -> LedgerResult<Vec<SuggestedPayment>> {
        let snapshot = self.snapshot(group, identity).await?;
        let mut suggestions = Vec::new();
        for exchange in get_exchanges_from_group(&snapshot) {
            let upi_link = match self.store.find_user(exchange.receiver).await? {
                Some(receiver) if !receiver.upi_id.is_empty() => Some(upi_link(
                    &UpiLinkRequest {
                        payee_vpa: receiver.upi_id,
                        payee_name: receiver.username,
                        amount: exchange.amount,
                        note: String::new(),
                    },
                    upi,
                )?),
                _ => None,
            };
            suggestions.push(SuggestedPayment { exchange, upi_link });
        }
        Ok(suggestions)
    }
}
