use clap::{Args, Subcommand};
use error_stack::{Report, ResultExt};
use tracing::{event, Level};

use crate::{
    auth::{api_key::ApiKeyData, ADMIN_ROLE},
    models::user::User,
    store::{PgStore, StoreError, UserStore},
    Error,
};

/// Insert a user and give them a new API key.
pub async fn create_user(
    users: &dyn UserStore,
    display_name: &str,
    roles: Vec<String>,
) -> Result<(User, ApiKeyData), Report<StoreError>> {
    let user = User::new(display_name, roles);
    users.insert_user(&user).await?;

    let key = ApiKeyData::new();
    users.add_api_key(user.id, &key).await?;

    event!(Level::INFO, user_id = %user.id, api_key_id = %key.api_key_id, "Created user");
    Ok((user, key))
}

#[derive(Args, Debug)]
pub struct UtilCommand {
    /// The PostgreSQL database to connect to
    #[clap(long = "db", env = "DATABASE_URL")]
    database_url: String,

    #[clap(subcommand)]
    pub command: UtilSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum UtilSubcommand {
    /// Create a user and print an API key for them
    CreateUser(CreateUserCommand),
}

#[derive(Args, Debug)]
pub struct CreateUserCommand {
    /// The name shown as the owner of the user's organisations
    #[clap(long)]
    name: String,

    /// Give the user the admin role
    #[clap(long)]
    admin: bool,
}

impl UtilCommand {
    pub async fn handle(self) -> Result<(), Report<Error>> {
        let pg_pool = crate::db::connect(&self.database_url).await?;
        let store = PgStore::new(pg_pool);

        match self.command {
            UtilSubcommand::CreateUser(cmd) => {
                let roles = if cmd.admin {
                    vec![ADMIN_ROLE.to_string()]
                } else {
                    vec![]
                };

                let (user, key) = create_user(&store, &cmd.name, roles)
                    .await
                    .change_context(Error::Db)?;

                println!("User ID: {}", user.id);
                println!("API key: {}", key.key);
            }
        }

        Ok(())
    }
}
