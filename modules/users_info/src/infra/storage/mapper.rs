use crate::contract::model::{User, UsersSnapshot};
use crate::infra::storage::document::{UserDocument, UserRecord};

/// Convert a stored record to a contract model
pub fn record_to_contract(record: UserRecord) -> User {
    User {
        id: record.id,
        email: record.email,
        display_name: record.display_name,
        created_at: record.created,
        updated_at: record.updated,
    }
}

/// Convert the stored document to a contract snapshot, users ordered by id
pub fn document_to_snapshot(doc: UserDocument) -> UsersSnapshot {
    let mut users: Vec<User> = doc.list.into_values().map(record_to_contract).collect();
    users.sort_by_key(|u| u.id);
    UsersSnapshot {
        increment: doc.increment,
        users,
    }
}
