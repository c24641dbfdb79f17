//! Demo data: three friends, one trip, a few holdings.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use crate::money::Money;
use crate::schemas::{Expense, ExpenseId, Group, GroupId, HoldingId, Member, Split, User, UserId};
use crate::store::{Store, StoreResult};
use crate::wealth::{Holding, HoldingKind};

pub const ALICE: UserId = UserId(1001);
pub const BOB: UserId = UserId(1002);
pub const CAROL: UserId = UserId(1003);

fn equal_split(group: GroupId, payer: UserId, total: i64, description: &str) -> Expense {
    let share = total / 3;
    Expense {
        id: ExpenseId::new(),
        group_id: group,
        payer,
        amount: Money::from(total),
        description: description.to_string(),
        splits: [ALICE, BOB, CAROL]
            .into_iter()
            .map(|user_id| Split {
                user_id,
                amount: Money::from(share),
            })
            .collect(),
        created_at: Utc::now(),
    }
}

fn holding(kind: HoldingKind, name: &str, quantity: i64, value: i64) -> Holding {
    Holding {
        id: HoldingId::new(),
        user_id: ALICE,
        kind,
        name: name.to_string(),
        quantity: Decimal::from(quantity),
        value: Money::from(value),
        meta: serde_json::json!({}),
    }
}

/// Writes the demo users, the "Goa Trip" group with its two expenses and
/// Alice's holdings. Returns the group id, or `None` when the demo users are
/// already there and nothing was written.
pub async fn demo(store: &dyn Store) -> StoreResult<Option<GroupId>> {
    if store.find_user(ALICE).await?.is_some() {
        info!("demo data already present");
        return Ok(None);
    }
    for (id, name) in [(ALICE, "alice"), (BOB, "bob"), (CAROL, "carol")] {
        store
            .upsert_user(&User {
                id,
                username: name.to_string(),
                upi_id: format!("{name}@upi"),
            })
            .await?;
    }

    let now = Utc::now();
    let trip = Group {
        id: GroupId::new(),
        name: "Goa Trip".to_string(),
        created_by: ALICE,
        created_at: now,
    };
    let members = [ALICE, BOB, CAROL]
        .into_iter()
        .map(|user_id| Member {
            group_id: trip.id,
            user_id,
            joined_at: now,
        })
        .collect::<Vec<_>>();
    store.insert_group(&trip, &members).await?;
    store
        .insert_expense(&equal_split(trip.id, ALICE, 3000, "Hotel"))
        .await?;
    store
        .insert_expense(&equal_split(trip.id, BOB, 900, "Dinner"))
        .await?;

    for h in [
        holding(HoldingKind::Stock, "INFY", 10, 17_000),
        holding(HoldingKind::MutualFund, "Nifty Index Fund", 100, 25_000),
        holding(HoldingKind::Bank, "HDFC Savings", 0, 52_000),
        holding(HoldingKind::Fd, "SBI FD", 0, 100_000),
    ] {
        store.insert_holding(&h).await?;
    }

    info!(group = %trip.id, "seeded demo data");
    Ok(Some(trip.id))
}
