use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error_stack::Report;
use sqlx::PgPool;
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

const TITLE_CONSTRAINT: &str = "organisations_title_not_blank";

/// Translate a database error into a [StoreError], pulling out the parts a client can act on.
fn store_error(err: sqlx::Error) -> Report<StoreError> {
    let context = match &err {
        sqlx::Error::Database(db_err) if db_err.constraint() == Some(TITLE_CONSTRAINT) => {
            StoreError::Validation(
                crate::models::organisation::TITLE_REQUIRED_MESSAGE.to_string(),
            )
        }
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Duplicate,
        sqlx::Error::Database(db_err) => StoreError::Backend(db_err.message().to_string()),
        other => StoreError::Backend(other.to_string()),
    };

    Report::new(err).change_context(context)
}

#[derive(sqlx::FromRow)]
struct OrganisationRow {
    id: OrganisationId,
    title: String,
    content: String,
    owner_id: Option<UserId>,
    owner_display_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<OrganisationRow> for OrganisationPopulated {
    fn from(row: OrganisationRow) -> Self {
        // owner_id is not a foreign key, so a removed owner leaves the joined columns null.
        let user = row
            .owner_id
            .zip(row.owner_display_name)
            .map(|(id, display_name)| OwnerSummary { id, display_name });

        Organisation {
            id: row.id,
            title: row.title,
            content: row.content,
            owner: row.owner_id,
            created_at: row.created_at,
        }
        .populate(user)
    }
}

const SELECT_POPULATED: &str = r##"
    SELECT o.id, o.title, o.content, o.created_at,
        u.id AS owner_id,
        u.display_name AS owner_display_name
    FROM organisations o
    LEFT JOIN users u ON u.id = o.owner_id
"##;

/// A store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> PgStore {
        PgStore { pool }
    }
}

#[async_trait]
impl OrganisationStore for PgStore {
    #[instrument(skip(self, organisation), fields(id = %organisation.id))]
    async fn insert(&self, organisation: &Organisation) -> Result<(), Report<StoreError>> {
        sqlx::query(
            "INSERT INTO organisations (id, title, content, owner_id, created_at)
            VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(organisation.id)
        .bind(&organisation.title)
        .bind(&organisation.content)
        .bind(organisation.owner)
        .bind(organisation.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_all_populated(&self) -> Result<Vec<OrganisationPopulated>, Report<StoreError>> {
        let query = format!("{SELECT_POPULATED} ORDER BY o.created_at DESC, o.id DESC");
        let rows = sqlx::query_as::<_, OrganisationRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(rows.into_iter().map(OrganisationPopulated::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_id_populated(
        &self,
        id: OrganisationId,
    ) -> Result<Option<OrganisationPopulated>, Report<StoreError>> {
        let query = format!("{SELECT_POPULATED} WHERE o.id = $1");
        let row = sqlx::query_as::<_, OrganisationRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(row.map(OrganisationPopulated::from))
    }

    #[instrument(skip(self, update))]
    async fn save(
        &self,
        id: OrganisationId,
        update: &OrganisationUpdate,
    ) -> Result<bool, Report<StoreError>> {
        let result = sqlx::query("UPDATE organisations SET title = $2, content = $3 WHERE id = $1")
            .bind(id)
            .bind(&update.title)
            .bind(&update.content)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: OrganisationId) -> Result<bool, Report<StoreError>> {
        let result = sqlx::query("DELETE FROM organisations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for PgStore {
    #[instrument(skip(self, user), fields(id = %user.id))]
    async fn insert_user(&self, user: &User) -> Result<(), Report<StoreError>> {
        sqlx::query("INSERT INTO users (id, display_name, roles) VALUES ($1, $2, $3)")
            .bind(user.id)
            .bind(&user.display_name)
            .bind(&user.roles)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    #[instrument(skip(self, key))]
    async fn add_api_key(
        &self,
        user_id: UserId,
        key: &ApiKeyData,
    ) -> Result<(), Report<StoreError>> {
        sqlx::query("INSERT INTO api_keys (api_key_id, user_id, hash) VALUES ($1, $2, $3)")
            .bind(key.api_key_id)
            .bind(user_id)
            .bind(&key.hash)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    #[instrument(skip(self, hash))]
    async fn get_user_by_api_key(
        &self,
        api_key_id: Uuid,
        hash: &[u8],
    ) -> Result<Option<User>, Report<StoreError>> {
        sqlx::query_as::<_, User>(
            "SELECT u.id, u.display_name, u.roles
            FROM api_keys k
            JOIN users u ON u.id = k.user_id
            WHERE k.api_key_id = $1 AND k.hash = $2",
        )
        .bind(api_key_id)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)
    }

    #[instrument(skip(self))]
    async fn remove_user(&self, id: UserId) -> Result<bool, Report<StoreError>> {
        // API keys go with the user through ON DELETE CASCADE. Owned organisations are left alone.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }
}
