use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::money::Money;

/// Numeric user id as issued by the identity provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// Ids are encoded as their hyphenated string whatever the serializer, so
// stored documents and query filters always agree.
macro_rules! uuid_id {
    ($t:ident) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $t(Uuid);

        impl Serialize for $t {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }

        impl $t {
            /// Time-ordered (UUIDv7).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $t {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s).map(Self)
            }
        }
    };
}

uuid_id!(GroupId);
uuid_id!(ExpenseId);
uuid_id!(SettlementId);
uuid_id!(HoldingId);

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub upi_id: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Member {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
}

/// One participant's share of an expense.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Split {
    pub user_id: UserId,
    pub amount: Money,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub group_id: GroupId,
    pub payer: UserId,
    pub amount: Money,
    #[serde(default)]
    pub description: String,
    pub splits: Vec<Split>,
    pub created_at: DateTime<Utc>,
}

/// A direct payment `from_user` -> `to_user` outside the expense ledger.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub group_id: GroupId,
    pub from_user: UserId,
    pub to_user: UserId,
    pub amount: Money,
    #[serde(default)]
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the balance calculator needs, read in one go.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupLedger {
    pub members: Vec<Member>,
    pub expenses: Vec<Expense>,
    pub settlements: Vec<Settlement>,
}

// Request payloads.

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UserProfile {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub upi_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<UserId>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewMember {
    pub user_id: UserId,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewExpense {
    pub payer_id: UserId,
    pub amount: Money,
    #[serde(default)]
    pub description: String,
    pub splits: Vec<Split>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewSettlement {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Money,
    #[serde(default)]
    pub note: String,
}

// Responses.

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<Member>,
}

/// Positive `net`: the group owes this member. Negative: the member owes.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BalanceItem {
    pub user_id: UserId,
    pub net: Money,
}
