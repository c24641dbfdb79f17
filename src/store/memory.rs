use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{GroupRecord, MemberInsert, Store, StoreError, StoreResult};
use crate::schemas::{Expense, Group, GroupId, GroupLedger, Member, Settlement, User, UserId};
use crate::wealth::Holding;

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    groups: HashMap<GroupId, GroupRecord>,
    holdings: Vec<Holding>,
}

/// In-memory store.
///
/// Used by tests and when no database is configured. A single lock guards all
/// records, so every write is observed whole.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> StoreResult<T> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&state))
    }

    fn write<T>(&self, f: impl FnOnce(&mut State) -> T) -> StoreResult<T> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&mut state))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        self.write(|s| {
            s.users.insert(user.id, user.clone());
        })
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        self.read(|s| s.users.get(&id).cloned())
    }

    async fn insert_group(&self, group: &Group, members: &[Member]) -> StoreResult<()> {
        self.write(|s| {
            s.groups.insert(group.id, GroupRecord::new(group, members));
        })
    }

    async fn find_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        self.read(|s| s.groups.get(&id).map(GroupRecord::group))
    }

    async fn groups_for_user(&self, user: UserId) -> StoreResult<Vec<Group>> {
        self.read(|s| {
            let mut groups = s
                .groups
                .values()
                .filter(|g| g.has_member(user))
                .map(GroupRecord::group)
                .collect::<Vec<_>>();
            groups.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
            groups
        })
    }

    async fn is_member(&self, group: GroupId, user: UserId) -> StoreResult<bool> {
        self.read(|s| s.groups.get(&group).is_some_and(|g| g.has_member(user)))
    }

    async fn members(&self, group: GroupId) -> StoreResult<Vec<Member>> {
        self.read(|s| {
            s.groups
                .get(&group)
                .map(|g| g.members.clone())
                .unwrap_or_default()
        })
    }

    async fn insert_member(&self, member: &Member) -> StoreResult<MemberInsert> {
        self.write(|s| match s.groups.get_mut(&member.group_id) {
            None => MemberInsert::MissingGroup,
            Some(g) if g.has_member(member.user_id) => MemberInsert::AlreadyMember,
            Some(g) => {
                g.members.push(member.clone());
                MemberInsert::Added
            }
        })
    }

    async fn insert_expense(&self, expense: &Expense) -> StoreResult<bool> {
        self.write(|s| match s.groups.get_mut(&expense.group_id) {
            Some(g) => {
                g.expenses.push(expense.clone());
                true
            }
            None => false,
        })
    }

    async fn insert_settlement(&self, settlement: &Settlement) -> StoreResult<bool> {
        self.write(|s| match s.groups.get_mut(&settlement.group_id) {
            Some(g) => {
                g.settlements.push(settlement.clone());
                true
            }
            None => false,
        })
    }

    async fn group_ledger(&self, group: GroupId) -> StoreResult<Option<GroupLedger>> {
        self.read(|s| s.groups.get(&group).cloned().map(GroupRecord::into_ledger))
    }

    async fn insert_holding(&self, holding: &Holding) -> StoreResult<()> {
        self.write(|s| s.holdings.push(holding.clone()))
    }

    async fn holdings(&self, user: UserId) -> StoreResult<Vec<Holding>> {
        self.read(|s| {
            s.holdings
                .iter()
                .filter(|h| h.user_id == user)
                .cloned()
                .collect()
        })
    }
}
