//! Database schema, models and queries

pub mod assignments;
pub mod init;
pub mod models;
pub mod projects;
pub mod roles;
pub mod seed;
pub mod staff;

pub use assignments::*;
pub use init::*;
pub use models::*;
pub use projects::*;
pub use roles::*;
pub use seed::*;
pub use staff::*;
