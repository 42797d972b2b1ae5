use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use error_stack::{Report, ResultExt};
use organisations::{
    auth::ADMIN_ROLE,
    db::{self, DbCommand},
    server,
    store::{MemoryStore, OrganisationStore, PgStore, UserStore},
    tracing_config::configure_tracing,
    util_cmd::{self, UtilCommand},
    Error,
};
use tracing::{event, Level};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the API server
    Serve(ServeCommand),
    /// Database management
    Db(DbCommand),
    /// Utility commands
    Util(UtilCommand),
}

#[derive(Args, Debug)]
struct ServeCommand {
    /// The PostgreSQL database to connect to. Without one, data is kept in memory.
    #[clap(long = "db", env = "DATABASE_URL")]
    database_url: Option<String>,

    /// The IP host to bind to
    #[clap(long, env = "HOST", default_value_t = String::from("127.0.0.1"))]
    host: String,

    /// The TCP port to listen on
    #[clap(long, env = "PORT", default_value_t = 7823)]
    port: u16,

    /// The environment in which this server is running
    #[clap(long = "env", env = "ENV", default_value_t = String::from("development"))]
    env: String,

    /// Request timeout, in seconds
    #[clap(long, env = "REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,
}

type Stores = (Arc<dyn OrganisationStore>, Arc<dyn UserStore>);

async fn create_stores(database_url: Option<&str>) -> Result<Stores, Report<Error>> {
    match database_url {
        Some(url) => {
            let pg_pool = db::connect(url).await?;
            db::run_migrations(&pg_pool).await?;
            let store = Arc::new(PgStore::new(pg_pool));
            let organisations: Arc<dyn OrganisationStore> = store.clone();
            let users: Arc<dyn UserStore> = store;
            Ok((organisations, users))
        }
        None => {
            let store = Arc::new(MemoryStore::new());
            let (user, key) =
                util_cmd::create_user(store.as_ref(), "Admin", vec![ADMIN_ROLE.to_string()])
                    .await
                    .change_context(Error::ServerStart)?;
            event!(
                Level::WARN,
                user_id = %user.id,
                api_key = %key.key,
                "No database configured. Data is kept in memory and lost on exit. Created an admin user"
            );

            let organisations: Arc<dyn OrganisationStore> = store.clone();
            let users: Arc<dyn UserStore> = store;
            Ok((organisations, users))
        }
    }
}

async fn serve(cmd: ServeCommand) -> Result<(), Report<Error>> {
    configure_tracing(
        "",
        tracing_subscriber::fmt::time::ChronoUtc::rfc_3339(),
        std::io::stdout,
    )?;

    let (organisations, users) = create_stores(cmd.database_url.as_deref()).await?;

    let server = server::create_server(server::Config {
        env: cmd.env,
        host: cmd.host,
        port: cmd.port,
        request_timeout: std::time::Duration::from_secs(cmd.request_timeout),
        organisations,
        users,
    })
    .await?;

    server.run().await?;

    event!(Level::INFO, "Shut down complete");
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
pub async fn main() -> Result<(), Report<Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(cmd) => serve(cmd).await,
        Command::Db(cmd) => cmd.handle().await,
        Command::Util(cmd) => cmd.handle().await,
    }
}
