use std::collections::HashMap;

use async_trait::async_trait;
use error_stack::Report;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

use super::{OrganisationStore, StoreError, UserStore};
use crate::{
    auth::api_key::ApiKeyData,
    models::{
        organisation::{Organisation, OrganisationId, OrganisationPopulated, OrganisationUpdate},
        user::{OwnerSummary, User, UserId},
    },
};

struct StoredApiKey {
    user_id: UserId,
    hash: Vec<u8>,
}

#[derive(Default)]
struct Data {
    organisations: HashMap<OrganisationId, Organisation>,
    users: HashMap<UserId, User>,
    api_keys: HashMap<Uuid, StoredApiKey>,
}

impl Data {
    fn owner_summary(&self, owner: Option<UserId>) -> Option<OwnerSummary> {
        owner
            .and_then(|id| self.users.get(&id))
            .map(User::summary)
    }

    fn populate(&self, organisation: &Organisation) -> OrganisationPopulated {
        organisation
            .clone()
            .populate(self.owner_summary(organisation.owner))
    }
}

/// A store that keeps everything in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Data>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

#[async_trait]
impl OrganisationStore for MemoryStore {
    #[instrument(skip(self, organisation), fields(id = %organisation.id))]
    async fn insert(&self, organisation: &Organisation) -> Result<(), Report<StoreError>> {
        let mut data = self.data.write().await;
        if data.organisations.contains_key(&organisation.id) {
            return Err(Report::new(StoreError::Duplicate));
        }

        data.organisations
            .insert(organisation.id, organisation.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_all_populated(&self) -> Result<Vec<OrganisationPopulated>, Report<StoreError>> {
        let data = self.data.read().await;
        let mut results = data
            .organisations
            .values()
            .map(|o| data.populate(o))
            .collect::<Vec<_>>();

        results.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(results)
    }

    #[instrument(skip(self))]
    async fn find_by_id_populated(
        &self,
        id: OrganisationId,
    ) -> Result<Option<OrganisationPopulated>, Report<StoreError>> {
        let data = self.data.read().await;
        Ok(data.organisations.get(&id).map(|o| data.populate(o)))
    }

    #[instrument(skip(self, update))]
    async fn save(
        &self,
        id: OrganisationId,
        update: &OrganisationUpdate,
    ) -> Result<bool, Report<StoreError>> {
        let mut data = self.data.write().await;
        let Some(organisation) = data.organisations.get_mut(&id) else {
            return Ok(false);
        };

        organisation.title = update.title.clone();
        organisation.content = update.content.clone();
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: OrganisationId) -> Result<bool, Report<StoreError>> {
        let mut data = self.data.write().await;
        Ok(data.organisations.remove(&id).is_some())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    #[instrument(skip(self, user), fields(id = %user.id))]
    async fn insert_user(&self, user: &User) -> Result<(), Report<StoreError>> {
        let mut data = self.data.write().await;
        if data.users.contains_key(&user.id) {
            return Err(Report::new(StoreError::Duplicate));
        }

        data.users.insert(user.id, user.clone());
        Ok(())
    }

    #[instrument(skip(self, key))]
    async fn add_api_key(
        &self,
        user_id: UserId,
        key: &ApiKeyData,
    ) -> Result<(), Report<StoreError>> {
        let mut data = self.data.write().await;
        if !data.users.contains_key(&user_id) {
            return Err(Report::new(StoreError::Validation(
                "API key owner does not exist".to_string(),
            )));
        }

        data.api_keys.insert(
            key.api_key_id,
            StoredApiKey {
                user_id,
                hash: key.hash.clone(),
            },
        );
        Ok(())
    }

    #[instrument(skip(self, hash))]
    async fn get_user_by_api_key(
        &self,
        api_key_id: Uuid,
        hash: &[u8],
    ) -> Result<Option<User>, Report<StoreError>> {
        let data = self.data.read().await;
        let user = data
            .api_keys
            .get(&api_key_id)
            .filter(|key| key.hash == hash)
            .and_then(|key| data.users.get(&key.user_id))
            .cloned();
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn remove_user(&self, id: UserId) -> Result<bool, Report<StoreError>> {
        let mut data = self.data.write().await;
        data.api_keys.retain(|_, key| key.user_id != id);
        Ok(data.users.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn organisation(owner: Option<UserId>, minutes_ago: i64, title: &str) -> Organisation {
        Organisation {
            id: OrganisationId::new(),
            title: title.to_string(),
            content: String::new(),
            owner,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryStore::new();
        for (minutes_ago, title) in [(10, "middle"), (1, "newest"), (100, "oldest")] {
            store
                .insert(&organisation(None, minutes_ago, title))
                .await
                .unwrap();
        }

        let titles = store
            .find_all_populated()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn owner_is_resolved_until_removed() {
        let store = MemoryStore::new();
        let user = User::new("Owner Name", vec![]);
        store.insert_user(&user).await.unwrap();

        let org = organisation(Some(user.id), 0, "Owned");
        store.insert(&org).await.unwrap();

        let found = store.find_by_id_populated(org.id).await.unwrap().unwrap();
        assert_eq!(found.user, Some(user.summary()));

        assert!(store.remove_user(user.id).await.unwrap());
        let found = store.find_by_id_populated(org.id).await.unwrap().unwrap();
        assert_eq!(found.user, None);
        assert_eq!(found.title, "Owned");
    }

    #[tokio::test]
    async fn save_and_remove_missing_records() {
        let store = MemoryStore::new();
        let update = OrganisationUpdate {
            title: "t".into(),
            content: "c".into(),
        };
        assert!(!store.save(OrganisationId::new(), &update).await.unwrap());
        assert!(!store.remove(OrganisationId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn save_only_touches_writable_fields() {
        let store = MemoryStore::new();
        let owner = UserId::new();
        let org = organisation(Some(owner), 5, "Before");
        store.insert(&org).await.unwrap();

        let update = OrganisationUpdate {
            title: "After".into(),
            content: "New content".into(),
        };
        assert!(store.save(org.id, &update).await.unwrap());

        let data = store.data.read().await;
        let saved = &data.organisations[&org.id];
        assert_eq!(saved.title, "After");
        assert_eq!(saved.content, "New content");
        assert_eq!(saved.owner, Some(owner));
        assert_eq!(saved.created_at, org.created_at);
    }

    #[tokio::test]
    async fn api_key_lookup() {
        let store = MemoryStore::new();
        let user = User::new("Key Holder", vec!["admin".into()]);
        store.insert_user(&user).await.unwrap();
        let key = ApiKeyData::new();
        store.add_api_key(user.id, &key).await.unwrap();

        let found = store
            .get_user_by_api_key(key.api_key_id, &key.hash)
            .await
            .unwrap();
        assert_eq!(found, Some(user.clone()));

        let wrong_hash = store
            .get_user_by_api_key(key.api_key_id, b"not the hash")
            .await
            .unwrap();
        assert_eq!(wrong_hash, None);

        store.remove_user(user.id).await.unwrap();
        let removed = store
            .get_user_by_api_key(key.api_key_id, &key.hash)
            .await
            .unwrap();
        assert_eq!(removed, None);
    }
}
