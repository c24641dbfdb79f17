//! Write side of a group: membership, expenses with their splits, settlements.
//!
//! Every group-scoped call starts with the membership gate. A caller who is
//! not a member gets [`LedgerError::NotAMember`] whether or not the group
//! exists.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::auth::Identity;
use crate::error::{LedgerError, LedgerResult, Resource};
use crate::money::Money;
use crate::payments;
use crate::schemas::{
    Expense, ExpenseId, Group, GroupDetails, GroupId, GroupLedger, Member, NewExpense, NewGroup,
    NewSettlement, Settlement, SettlementId, User, UserId, UserProfile,
};
use crate::store::{MemberInsert, Store};

pub struct Ledger {
    pub(crate) store: Arc<dyn Store>,
}

/// Checks a new expense against the group's current members.
///
/// Splits must add up to the total once both are rounded to two decimals.
pub fn validate_expense(
    group: GroupId,
    members: &HashSet<UserId>,
    expense: &NewExpense,
) -> LedgerResult<()> {
    if !members.contains(&expense.payer_id) {
        return Err(LedgerError::NotInGroup {
            role: "payer",
            group,
            user: expense.payer_id,
        });
    }
    if !expense.amount.is_positive() {
        return Err(LedgerError::invalid("expense amount must be greater than zero"));
    }
    if expense.splits.is_empty() {
        return Err(LedgerError::invalid("an expense needs at least one split"));
    }

    let mut seen = HashSet::with_capacity(expense.splits.len());
    for split in &expense.splits {
        if split.amount.is_negative() {
            return Err(LedgerError::invalid(format!(
                "split for user {} is negative",
                split.user_id
            )));
        }
        if !members.contains(&split.user_id) {
            return Err(LedgerError::NotInGroup {
                role: "participant",
                group,
                user: split.user_id,
            });
        }
        if !seen.insert(split.user_id) {
            return Err(LedgerError::invalid(format!(
                "user {} appears in more than one split",
                split.user_id
            )));
        }
    }

    let total = expense.amount.round2();
    let splits = expense.splits.iter().map(|s| s.amount).sum::<Money>().round2();
    if splits != total {
        return Err(LedgerError::SplitMismatch { total, splits });
    }
    Ok(())
}

pub fn validate_settlement(
    group: GroupId,
    members: &HashSet<UserId>,
    settlement: &NewSettlement,
) -> LedgerResult<()> {
    if !settlement.amount.is_positive() {
        return Err(LedgerError::invalid("settlement amount must be greater than zero"));
    }
    if settlement.from_user_id == settlement.to_user_id {
        return Err(LedgerError::invalid("a settlement needs two different users"));
    }
    for (role, user) in [
        ("payer", settlement.from_user_id),
        ("receiver", settlement.to_user_id),
    ] {
        if !members.contains(&user) {
            return Err(LedgerError::NotInGroup { role, group, user });
        }
    }
    Ok(())
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub(crate) async fn ensure_member(
        &self,
        group: GroupId,
        identity: &Identity,
    ) -> LedgerResult<()> {
        if self.store.is_member(group, identity.user_id).await? {
            Ok(())
        } else {
            warn!(%group, user = %identity.user_id, "rejected non-member");
            Err(LedgerError::NotAMember {
                group,
                user: identity.user_id,
            })
        }
    }

    /// Loads members, expenses and settlements in one read, after the gate.
    pub(crate) async fn snapshot(
        &self,
        group: GroupId,
        identity: &Identity,
    ) -> LedgerResult<GroupLedger> {
        self.ensure_member(group, identity).await?;
        self.store
            .group_ledger(group)
            .await?
            .ok_or(LedgerError::NotFound(Resource::Group(group)))
    }

    async fn member_ids(&self, group: GroupId) -> LedgerResult<HashSet<UserId>> {
        Ok(self
            .store
            .members(group)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect())
    }

    #[instrument(skip(self, identity, profile), fields(user = %identity.user_id))]
    pub async fn register_user(
        &self,
        identity: &Identity,
        profile: UserProfile,
    ) -> LedgerResult<User> {
        let upi_id = profile.upi_id.trim().to_string();
        if !upi_id.is_empty() && !payments::is_vpa(&upi_id) {
            return Err(LedgerError::invalid(format!("{upi_id:?} is not a UPI id")));
        }
        let user = User {
            id: identity.user_id,
            username: profile
                .username
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| identity.username.clone()),
            upi_id,
        };
        self.store.upsert_user(&user).await?;
        info!("profile saved");
        Ok(user)
    }

    pub async fn profile(&self, identity: &Identity) -> LedgerResult<User> {
        self.store
            .find_user(identity.user_id)
            .await?
            .ok_or(LedgerError::NotFound(Resource::User(identity.user_id)))
    }

    /// Creates a group. The creator is always its first member; listed users
    /// must already exist and are added once each.
    #[instrument(skip(self, identity, new), fields(user = %identity.user_id))]
    pub async fn create_group(
        &self,
        identity: &Identity,
        new: NewGroup,
    ) -> LedgerResult<GroupDetails> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(LedgerError::invalid("group name must not be empty"));
        }
        if self.store.find_user(identity.user_id).await?.is_none() {
            self.store
                .upsert_user(&User {
                    id: identity.user_id,
                    username: identity.username.clone(),
                    upi_id: String::new(),
                })
                .await?;
        }

        let mut member_ids = vec![identity.user_id];
        for user in new.member_ids {
            if member_ids.contains(&user) {
                continue;
            }
            if self.store.find_user(user).await?.is_none() {
                return Err(LedgerError::NotFound(Resource::User(user)));
            }
            member_ids.push(user);
        }

        let now = Utc::now();
        let group = Group {
            id: GroupId::new(),
            name: name.to_string(),
            created_by: identity.user_id,
            created_at: now,
        };
        let members = member_ids
            .into_iter()
            .map(|user_id| Member {
                group_id: group.id,
                user_id,
                joined_at: now,
            })
            .collect::<Vec<_>>();
        self.store.insert_group(&group, &members).await?;
        info!(group = %group.id, members = members.len(), "group created");
        Ok(GroupDetails { group, members })
    }

    pub async fn list_groups(&self, identity: &Identity) -> LedgerResult<Vec<Group>> {
        Ok(self.store.groups_for_user(identity.user_id).await?)
    }

    pub async fn get_group(
        &self,
        identity: &Identity,
        group: GroupId,
    ) -> LedgerResult<GroupDetails> {
        self.ensure_member(group, identity).await?;
        let details = self
            .store
            .find_group(group)
            .await?
            .ok_or(LedgerError::NotFound(Resource::Group(group)))?;
        let members = self.store.members(group).await?;
        Ok(GroupDetails {
            group: details,
            members,
        })
    }

    #[instrument(skip(self, identity), fields(actor = %identity.user_id))]
    pub async fn add_member(
        &self,
        identity: &Identity,
        group: GroupId,
        user: UserId,
    ) -> LedgerResult<Member> {
        self.ensure_member(group, identity).await?;
        if self.store.find_user(user).await?.is_none() {
            return Err(LedgerError::NotFound(Resource::User(user)));
        }
        let member = Member {
            group_id: group,
            user_id: user,
            joined_at: Utc::now(),
        };
        match self.store.insert_member(&member).await? {
            MemberInsert::Added => {
                info!("member added");
                Ok(member)
            }
            MemberInsert::AlreadyMember => Err(LedgerError::AlreadyMember { group, user }),
            MemberInsert::MissingGroup => Err(LedgerError::NotFound(Resource::Group(group))),
        }
    }

    /// Records an expense with its splits as one unit. Nothing is written
    /// when validation fails.
    #[instrument(
        skip(self, identity, new),
        fields(actor = %identity.user_id, amount = %new.amount)
    )]
    pub async fn record_expense(
        &self,
        identity: &Identity,
        group: GroupId,
        new: NewExpense,
    ) -> LedgerResult<Expense> {
        self.ensure_member(group, identity).await?;
        let members = self.member_ids(group).await?;
        if let Err(err) = validate_expense(group, &members, &new) {
            warn!(%err, "expense rejected");
            return Err(err);
        }

        let expense = Expense {
            id: ExpenseId::new(),
            group_id: group,
            payer: new.payer_id,
            amount: new.amount,
            description: new.description.trim().to_string(),
            splits: new.splits,
            created_at: Utc::now(),
        };
        if !self.store.insert_expense(&expense).await? {
            return Err(LedgerError::NotFound(Resource::Group(group)));
        }
        info!(expense = %expense.id, splits = expense.splits.len(), "expense recorded");
        Ok(expense)
    }

    #[instrument(
        skip(self, identity, new),
        fields(actor = %identity.user_id, amount = %new.amount)
    )]
    pub async fn record_settlement(
        &self,
        identity: &Identity,
        group: GroupId,
        new: NewSettlement,
    ) -> LedgerResult<Settlement> {
        self.ensure_member(group, identity).await?;
        let members = self.member_ids(group).await?;
        if let Err(err) = validate_settlement(group, &members, &new) {
            warn!(%err, "settlement rejected");
            return Err(err);
        }

        let settlement = Settlement {
            id: SettlementId::new(),
            group_id: group,
            from_user: new.from_user_id,
            to_user: new.to_user_id,
            amount: new.amount,
            note: new.note.trim().to_string(),
            created_at: Utc::now(),
        };
        if !self.store.insert_settlement(&settlement).await? {
            return Err(LedgerError::NotFound(Resource::Group(group)));
        }
        info!(settlement = %settlement.id, "settlement recorded");
        Ok(settlement)
    }

    pub async fn expenses(
        &self,
        identity: &Identity,
        group: GroupId,
    ) -> LedgerResult<Vec<Expense>> {
        Ok(self.snapshot(group, identity).await?.expenses)
    }

    pub async fn settlements(
        &self,
        identity: &Identity,
        group: GroupId,
    ) -> LedgerResult<Vec<Settlement>> {
        Ok(self.snapshot(group, identity).await?.settlements)
    }
}
