pub mod types;

pub use types::*;

crate::make_object_id!(UserId, usr);
