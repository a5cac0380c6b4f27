mod admin;
mod tokens;
mod users;

pub use admin::health;
pub use tokens::{introspect_token, issue_token, revoke_token};
pub use users::create_user;
