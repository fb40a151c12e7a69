use bson::oid::ObjectId;
use bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::database::{Entity, SchemaOptions};

/// Account stored in the `users` collection of both databases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub password: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl User {
    /// New user (without generated fields)
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            id: None,
            username: username.into(),
            password: password.into(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Entity for User {
    const SCHEMA: SchemaOptions = SchemaOptions { timestamps: true };

    fn validate(&self) -> Result<(), String> {
        if self.username.is_empty() {
            return Err("Path `username` is required.".to_string());
        }
        if self.password.is_empty() {
            return Err("Path `password` is required.".to_string());
        }
        Ok(())
    }
}
