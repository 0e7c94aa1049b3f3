//! Session identifiers kept in the key/value store.

use serde::Serialize;

use super::{KeyValueStore, StoreError, ACCESS_TOKEN_KEY, CASE_ID_KEY, USER_ID_KEY};

/// Snapshot of the session identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub case_id: Option<String>,
    pub user_id: Option<String>,
}

impl Session {
    /// Read the current identifiers from the store
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        Ok(Self {
            access_token: non_blank(store.get(ACCESS_TOKEN_KEY)?),
            case_id: non_blank(store.get(CASE_ID_KEY)?),
            user_id: non_blank(store.get(USER_ID_KEY)?),
        })
    }

    /// A session is authenticated when it carries a non-blank access token
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Store a new sign-in. Missing optional ids are left untouched.
    pub fn login(
        store: &dyn KeyValueStore,
        access_token: &str,
        user_id: Option<&str>,
        case_id: Option<&str>,
    ) -> Result<(), StoreError> {
        store.set(ACCESS_TOKEN_KEY, access_token)?;
        if let Some(user_id) = user_id {
            store.set(USER_ID_KEY, user_id)?;
        }
        if let Some(case_id) = case_id {
            store.set(CASE_ID_KEY, case_id)?;
        }
        Ok(())
    }

    /// Drop every session identifier
    pub fn logout(store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.remove(ACCESS_TOKEN_KEY)?;
        store.remove(USER_ID_KEY)?;
        store.remove(CASE_ID_KEY)
    }

    /// Remember which case the user is working on
    pub fn set_case_id(store: &dyn KeyValueStore, case_id: &str) -> Result<(), StoreError> {
        store.set(CASE_ID_KEY, case_id)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
