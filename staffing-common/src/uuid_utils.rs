//! UUID utilities

use uuid::Uuid;

/// Generate a new record id (UUIDv4, hyphenated)
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}
