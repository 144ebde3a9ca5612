use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::repository::Document;
use crate::database::store::Collection;

/// Stored user. `password_hash` is a bcrypt hash and never leaves the server;
/// responses go through `UserView`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Lower-cased, unique
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub apartment: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

impl Document for User {
    const COLLECTION: Collection = Collection::Users;
    const LABEL: &'static str = "user";

    fn id(&self) -> Uuid {
        self.id
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
