pub mod auth;
pub mod client;
pub mod db;
pub mod error;
pub mod errors;
pub mod extract;
pub mod models;
pub mod object_id;
pub mod server;
pub mod store;
pub mod tracing_config;
pub mod util_cmd;

#[cfg(test)]
mod tests;

pub use error::Error;
