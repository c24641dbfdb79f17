//! Persistence seam of the ledger.
//!
//! A group is stored as one record holding its members, its expenses (with
//! their splits embedded) and its settlements. Every write touches exactly one
//! record, which is what makes an expense and its splits appear atomically.

mod memory;
mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schemas::{Expense, Group, GroupId, GroupLedger, Member, Settlement, User, UserId};
use crate::wealth::Holding;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("bson encoding error: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Result of trying to add a member to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberInsert {
    Added,
    AlreadyMember,
    MissingGroup,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_user(&self, user: &User) -> StoreResult<()>;

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Creates the group together with its initial members.
    async fn insert_group(&self, group: &Group, members: &[Member]) -> StoreResult<()>;

    async fn find_group(&self, id: GroupId) -> StoreResult<Option<Group>>;

    async fn groups_for_user(&self, user: UserId) -> StoreResult<Vec<Group>>;

    async fn is_member(&self, group: GroupId, user: UserId) -> StoreResult<bool>;

    /// Current members in join order. Empty when the group does not exist.
    async fn members(&self, group: GroupId) -> StoreResult<Vec<Member>>;

    async fn insert_member(&self, member: &Member) -> StoreResult<MemberInsert>;

    /// Stores the expense with all of its splits. Returns `false` when the
    /// group does not exist, in which case nothing was written.
    async fn insert_expense(&self, expense: &Expense) -> StoreResult<bool>;

    async fn insert_settlement(&self, settlement: &Settlement) -> StoreResult<bool>;

    /// Members, expenses and settlements of one group as of a single read.
    async fn group_ledger(&self, group: GroupId) -> StoreResult<Option<GroupLedger>>;

    async fn insert_holding(&self, holding: &Holding) -> StoreResult<()>;

    async fn holdings(&self, user: UserId) -> StoreResult<Vec<Holding>>;
}

/// Stored shape of a group.
///
/// The whole history lives in this one document, so a group is bounded by
/// MongoDB's 16 MB document limit (tens of thousands of expenses).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct GroupRecord {
    id: GroupId,
    name: String,
    created_by: UserId,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    expenses: Vec<Expense>,
    #[serde(default)]
    settlements: Vec<Settlement>,
}

impl GroupRecord {
    pub(crate) fn new(group: &Group, members: &[Member]) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
            created_by: group.created_by,
            created_at: group.created_at,
            members: members.to_vec(),
            expenses: vec![],
            settlements: vec![],
        }
    }

    pub(crate) fn group(&self) -> Group {
        Group {
            id: self.id,
            name: self.name.clone(),
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }

    pub(crate) fn has_member(&self, user: UserId) -> bool {
        self.members.iter().any(|m| m.user_id == user)
    }

    pub(crate) fn into_ledger(self) -> GroupLedger {
        GroupLedger {
            members: self.members,
            expenses: self.expenses,
            settlements: self.settlements,
        }
    }
}
