//! Error model of the ledger core.

use thiserror::Error;

use crate::money::Money;
use crate::schemas::{GroupId, UserId};
use crate::store::StoreError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// What a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Group(GroupId),
    User(UserId),
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Group(id) => write!(f, "group {id}"),
            Resource::User(id) => write!(f, "user {id}"),
        }
    }
}

/// Terminal failures of a ledger call. Nothing is retried and nothing is
/// partially written when one of these is returned.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Splits do not add up to the expense total after rounding.
    #[error("splits sum to {splits} but the expense total is {total}")]
    SplitMismatch { total: Money, splits: Money },

    /// The acting user is not a member of the group.
    #[error("user {user} is not a member of group {group}")]
    NotAMember { group: GroupId, user: UserId },

    #[error("{0} not found")]
    NotFound(Resource),

    #[error("user {user} is already a member of group {group}")]
    AlreadyMember { group: GroupId, user: UserId },

    /// A payer, split participant or settlement party outside the group.
    #[error("{role} {user} is not a member of group {group}")]
    NotInGroup {
        role: &'static str,
        group: GroupId,
        user: UserId,
    },

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::SplitMismatch { .. } => "split_mismatch",
            LedgerError::NotAMember { .. } => "not_a_member",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::AlreadyMember { .. } => "already_member",
            LedgerError::NotInGroup { .. } => "not_in_group",
            LedgerError::Invalid(_) => "invalid",
            LedgerError::Store(_) => "store",
        }
    }
}
