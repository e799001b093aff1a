//! Identifier generation.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a new UUID v4 rendered as a string.
#[must_use]
pub fn generate_id() -> String {
    generate_uuid().to_string()
}
