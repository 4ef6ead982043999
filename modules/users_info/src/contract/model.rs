use chrono::{DateTime, Utc};

/// Pure user model for inter-module communication (no serde)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for creating a new user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
}

/// Update data for a user. Email is fixed at creation and cannot be patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPatch {
    pub display_name: String,
}

/// Whole collection as of one read: the id counter and all users ordered by id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsersSnapshot {
    pub increment: u64,
    pub users: Vec<User>,
}
