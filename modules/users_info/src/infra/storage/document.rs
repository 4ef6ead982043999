use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// On-disk shape of the users collection: the id counter plus every record
/// keyed by the decimal string form of its id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(default)]
    pub increment: u64,
    #[serde(default)]
    pub list: BTreeMap<String, UserRecord>,
}

/// One persisted user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: u64,
    pub display_name: String,
    pub email: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Canonical `list` key for an id.
pub fn user_key(id: u64) -> String {
    id.to_string()
}

impl UserDocument {
    /// Bump the counter and insert a fresh record under the new id.
    ///
    /// `None` once the counter is at `u64::MAX`; the document is left as is.
    pub fn insert_new(
        &mut self,
        display_name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Option<UserRecord> {
        let id = self.increment.checked_add(1)?;
        self.increment = id;
        let record = UserRecord {
            id,
            display_name: display_name.to_owned(),
            email: email.to_owned(),
            created: now,
            updated: now,
        };
        self.list.insert(user_key(record.id), record.clone());
        Some(record)
    }

    pub fn get(&self, id: u64) -> Option<&UserRecord> {
        self.list.get(&user_key(id))
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut UserRecord> {
        self.list.get_mut(&user_key(id))
    }

    pub fn remove(&mut self, id: u64) -> Option<UserRecord> {
        self.list.remove(&user_key(id))
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl UserRecord {
    /// Mark the record as modified at `now`.
    ///
    /// `updated` always moves strictly forward, even if the clock did not.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated = if now > self.updated {
            now
        } else {
            self.updated + Duration::microseconds(1)
        };
    }
}
