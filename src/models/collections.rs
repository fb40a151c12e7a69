//! Collection sets of the named databases

use super::User;
use crate::config::ConfigResult;
use crate::database::{Collection, DatabaseFactory};

/// Collection holding [`User`] documents
pub const USER_COLLECTION: &str = "users";

/// Collections of the app database
#[derive(Debug, Clone)]
pub struct AppCollections {
    pub users: Collection<User>,
}

impl AppCollections {
    /// Requires an open connection
    pub fn new(factory: &DatabaseFactory) -> ConfigResult<Self> {
        Ok(Self {
            users: factory.create_collection(USER_COLLECTION)?,
        })
    }
}

/// Collections of the cms database; administrators share the user schema
#[derive(Debug, Clone)]
pub struct CmsCollections {
    pub admins: Collection<User>,
}

impl CmsCollections {
    pub fn new(factory: &DatabaseFactory) -> ConfigResult<Self> {
        Ok(Self {
            admins: factory.create_collection(USER_COLLECTION)?,
        })
    }
}
