pub mod organisation;
pub mod user;

use crate::server::ServerState;

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new().merge(organisation::endpoints::create_routes())
}
