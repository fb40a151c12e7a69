//! # Persistence Defaults
//!
//! Operational defaults shared by the document-store façade, the connection
//! factory and the cache-aside layer. Every value here is the one applied when
//! a caller does not override it explicitly.

use std::time::Duration;

/// Document-store query defaults
pub mod query {
    use super::Duration;

    /// Server-side time limit applied to point reads and writes
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

    /// Server-side time limit applied to aggregations
    pub const AGGREGATE_TIMEOUT_MS: u64 = 60_000;

    /// Documents per network round-trip for cursor-mode reads
    pub const CURSOR_BATCH_SIZE: u32 = 250;

    pub fn default_timeout() -> Duration {
        Duration::from_millis(DEFAULT_TIMEOUT_MS)
    }

    pub fn aggregate_timeout() -> Duration {
        Duration::from_millis(AGGREGATE_TIMEOUT_MS)
    }
}

/// Connection establishment defaults
pub mod connection {
    pub const RETRY_WRITES: bool = true;
    pub const SOCKET_TIMEOUT_MS: u64 = 60_000;
    pub const CONNECT_TIMEOUT_MS: u64 = 45_000;
}

/// Cache defaults
pub mod cache {
    /// JSONPath addressing the whole document
    pub const ROOT_PATH: &str = "$";

    pub const DEFAULT_PORT: u16 = 6379;
}

/// Schema field names maintained by the façade
pub mod fields {
    pub const ID: &str = "_id";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// How long the binary waits for handles to close before exiting
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);
