pub mod endpoints;
pub mod loader;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use types::*;

crate::make_object_id!(OrganisationId, org);
