use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    options::{FindOneOptions, FindOptions, IndexOptions, UpdateOptions},
    Client, Collection, IndexModel,
};
use serde::Serialize;
use tracing::{debug, instrument};

use super::{GroupRecord, MemberInsert, Store, StoreResult};
use crate::schemas::{Expense, Group, GroupId, GroupLedger, Member, Settlement, User, UserId};
use crate::wealth::Holding;

const GROUPS: &str = "Groups";
const USERS: &str = "Users";
const HOLDINGS: &str = "Holdings";

/// MongoDB-backed store. One document per group, see [`GroupRecord`].
#[derive(Clone, Debug)]
pub struct MongoStore {
    groups: Collection<GroupRecord>,
    users: Collection<User>,
    holdings: Collection<Holding>,
}

// Filter values and `$push` payloads. Must encode exactly like `insert_one`.
fn key<T: Serialize>(value: &T) -> StoreResult<Bson> {
    Ok(bson::to_bson(value)?)
}

// Group lookups that only need the header and member list.
fn without_history() -> Document {
    doc! { "expenses": 0, "settlements": 0 }
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        let store = Self {
            groups: db.collection(GROUPS),
            users: db.collection(USERS),
            holdings: db.collection(HOLDINGS),
        };
        store.ensure_indexes().await?;
        debug!(database, "connected to mongodb");
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();
        self.groups
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "id": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.groups
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "members.user_id": 1 })
                    .build(),
                None,
            )
            .await?;
        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "id": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.holdings
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).build(), None)
            .await?;
        Ok(())
    }

    async fn find_record(
        &self,
        id: GroupId,
        projection: Option<Document>,
    ) -> StoreResult<Option<GroupRecord>> {
        let options = projection.map(|p| FindOneOptions::builder().projection(p).build());
        Ok(self
            .groups
            .find_one(doc! { "id": key(&id)? }, options)
            .await?)
    }

    async fn push(&self, group: GroupId, field: &str, value: Bson) -> StoreResult<bool> {
        let mut pushed = Document::new();
        pushed.insert(field, value);
        let result = self
            .groups
            .update_one(doc! { "id": key(&group)? }, doc! { "$push": pushed }, None)
            .await?;
        Ok(result.matched_count == 1)
    }
}

#[async_trait]
impl Store for MongoStore {
    #[instrument(skip(self, user), fields(user = %user.id))]
    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        let options = UpdateOptions::builder().upsert(true).build();
        self.users
            .update_one(
                doc! { "id": key(&user.id)? },
                doc! { "$set": bson::to_document(user)? },
                options,
            )
            .await?;
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.find_one(doc! { "id": key(&id)? }, None).await?)
    }

    #[instrument(skip(self, group, members), fields(group = %group.id))]
    async fn insert_group(&self, group: &Group, members: &[Member]) -> StoreResult<()> {
        self.groups
            .insert_one(GroupRecord::new(group, members), None)
            .await?;
        Ok(())
    }

    async fn find_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        Ok(self
            .find_record(id, Some(without_history()))
            .await?
            .map(|record| record.group()))
    }

    async fn groups_for_user(&self, user: UserId) -> StoreResult<Vec<Group>> {
        let options = FindOptions::builder()
            .projection(without_history())
            .sort(doc! { "created_at": 1, "id": 1 })
            .build();
        let records: Vec<GroupRecord> = self
            .groups
            .find(doc! { "members.user_id": key(&user)? }, options)
            .await?
            .try_collect()
            .await?;
        Ok(records.iter().map(GroupRecord::group).collect())
    }

    async fn is_member(&self, group: GroupId, user: UserId) -> StoreResult<bool> {
        let count = self
            .groups
            .count_documents(
                doc! { "id": key(&group)?, "members.user_id": key(&user)? },
                None,
            )
            .await?;
        Ok(count > 0)
    }

    async fn members(&self, group: GroupId) -> StoreResult<Vec<Member>> {
        Ok(self
            .find_record(group, Some(without_history()))
            .await?
            .map(|record| record.members)
            .unwrap_or_default())
    }

    #[instrument(skip(self, member), fields(group = %member.group_id, user = %member.user_id))]
    async fn insert_member(&self, member: &Member) -> StoreResult<MemberInsert> {
        // The filter only matches while the user is absent, so two racing
        // joins cannot both succeed.
        let result = self
            .groups
            .update_one(
                doc! {
                    "id": key(&member.group_id)?,
                    "members.user_id": { "$ne": key(&member.user_id)? },
                },
                doc! { "$push": { "members": key(member)? } },
                None,
            )
            .await?;
        if result.matched_count == 1 {
            return Ok(MemberInsert::Added);
        }
        match self.find_group(member.group_id).await? {
            Some(_) => Ok(MemberInsert::AlreadyMember),
            None => Ok(MemberInsert::MissingGroup),
        }
    }

    #[instrument(skip(self, expense), fields(group = %expense.group_id, expense = %expense.id))]
    async fn insert_expense(&self, expense: &Expense) -> StoreResult<bool> {
        self.push(expense.group_id, "expenses", key(expense)?).await
    }

    #[instrument(skip(self, settlement), fields(group = %settlement.group_id))]
    async fn insert_settlement(&self, settlement: &Settlement) -> StoreResult<bool> {
        self.push(settlement.group_id, "settlements", key(settlement)?)
            .await
    }

    async fn group_ledger(&self, group: GroupId) -> StoreResult<Option<GroupLedger>> {
        Ok(self
            .find_record(group, None)
            .await?
            .map(GroupRecord::into_ledger))
    }

    async fn insert_holding(&self, holding: &Holding) -> StoreResult<()> {
        self.holdings.insert_one(holding, None).await?;
        Ok(())
    }

    async fn holdings(&self, user: UserId) -> StoreResult<Vec<Holding>> {
        Ok(self
            .holdings
            .find(doc! { "user_id": key(&user)? }, None)
            .await?
            .try_collect()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::money::Money;
    use crate::schemas::{ExpenseId, Split};

    fn group_with_alice() -> (Group, Member) {
        let group = Group {
            id: GroupId::new(),
            name: "Trip".to_string(),
            created_by: UserId(1),
            created_at: Utc::now(),
        };
        let member = Member {
            group_id: group.id,
            user_id: UserId(1),
            joined_at: Utc::now(),
        };
        (group, member)
    }

    // `insert_one` writes through the raw, non human readable serializer.
    fn as_inserted(record: &GroupRecord) -> Document {
        bson::to_raw_document_buf(record)
            .unwrap()
            .to_document()
            .unwrap()
    }

    #[test]
    fn inserted_ids_match_filter_keys() {
        let (group, member) = group_with_alice();
        let stored = as_inserted(&GroupRecord::new(&group, &[member.clone()]));

        assert_eq!(stored.get("id"), Some(&key(&group.id).unwrap()));
        let members = stored.get_array("members").unwrap();
        let first = members[0].as_document().unwrap();
        assert_eq!(first.get("user_id"), Some(&key(&member.user_id).unwrap()));
        assert_eq!(first.get("group_id"), Some(&key(&group.id).unwrap()));
    }

    #[test]
    fn pushed_expense_reads_back_with_the_record() {
        let (group, member) = group_with_alice();
        let expense = Expense {
            id: ExpenseId::new(),
            group_id: group.id,
            payer: member.user_id,
            amount: Money::from(30),
            description: "Taxi".to_string(),
            splits: vec![Split {
                user_id: member.user_id,
                amount: Money::from(30),
            }],
            created_at: Utc::now(),
        };
        let mut stored = as_inserted(&GroupRecord::new(&group, &[member.clone()]));
        stored.insert("expenses", vec![key(&expense).unwrap()]);

        let mut bytes = Vec::new();
        stored.to_writer(&mut bytes).unwrap();
        let record: GroupRecord = bson::from_slice(&bytes).unwrap();
        assert!(record.has_member(member.user_id));
        assert_eq!(record.group().id, group.id);
        assert_eq!(record.into_ledger().expenses, vec![expense]);
    }
}
