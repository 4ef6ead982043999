use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::model::{NewUser, User, UserPatch, UsersSnapshot};
use crate::infra::storage::user_key;

/// REST DTO for user representation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: u64,
    pub display_name: String,
    pub email: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// REST DTO for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserReq {
    pub display_name: String,
    pub email: String,
}

/// REST DTO for updating a user. `email` is accepted for compatibility and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserReq {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// REST DTO for the whole collection, same shape as the stored document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListDto {
    pub increment: u64,
    pub list: BTreeMap<String, UserDto>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            email: user.email,
            created: user.created_at,
            updated: user.updated_at,
        }
    }
}

impl From<UsersSnapshot> for UserListDto {
    fn from(snapshot: UsersSnapshot) -> Self {
        Self {
            increment: snapshot.increment,
            list: snapshot
                .users
                .into_iter()
                .map(|u| (user_key(u.id), UserDto::from(u)))
                .collect(),
        }
    }
}

impl From<CreateUserReq> for NewUser {
    fn from(req: CreateUserReq) -> Self {
        Self {
            email: req.email,
            display_name: req.display_name,
        }
    }
}

impl From<UpdateUserReq> for UserPatch {
    fn from(req: UpdateUserReq) -> Self {
        Self {
            display_name: req.display_name,
        }
    }
}
