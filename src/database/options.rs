//! Caller-facing query options and their resolution
//!
//! Every façade operation accepts an options value where each field is
//! optional. Resolution overlays the caller's choices on the operational
//! defaults:
//!
//! | Setting | Default |
//! |---|---|
//! | read routing | secondary preferred |
//! | server time limit | connection default (5 s), 60 s for aggregations |
//! | result shape | lean with getters, hydrated in cursor mode |
//! | cursor batch size | 250 |
//! | aggregation disk use | allowed |
//! | find-one-and-update | return the updated document, defaults on insert |
//! | updates of timestamped entities | `updatedAt` refreshed |
//!
//! A refreshed `updatedAt` counts as a modification. Pass
//! `timestamps(false)` when a write that changes nothing else must report
//! `false`.

use crate::constants;
use bson::Document;
use std::time::Duration;

/// Member a read is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadRouting {
    Primary,
    #[default]
    SecondaryPreferred,
}

impl ReadRouting {
    fn from_flag(read_secondary: Option<bool>) -> Self {
        if read_secondary.unwrap_or(true) {
            Self::SecondaryPreferred
        } else {
            Self::Primary
        }
    }
}

/// Plain-data result shaping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeanMode {
    /// Apply the entity's computed getters to each document
    pub getters: bool,
}

/// Which version of the document `find_one_and_update` returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnDocument {
    Before,
    #[default]
    After,
}

/// Options for `find`, `find_one`, `find_by_id` and their variants
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub cursor: bool,
    pub read_secondary: Option<bool>,
    pub max_time: Option<Duration>,
    pub lean: Option<bool>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub batch_size: Option<u32>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream results in batches instead of materializing them
    pub fn cursor(mut self) -> Self {
        self.cursor = true;
        self
    }

    pub fn read_secondary(mut self, read_secondary: bool) -> Self {
        self.read_secondary = Some(read_secondary);
        self
    }

    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// `false` returns hydrated documents without getters applied
    pub fn lean(mut self, lean: bool) -> Self {
        self.lean = Some(lean);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Overlay these options on the defaults
    pub fn resolve(&self, default_timeout: Duration) -> QueryOptions {
        let lean = self.lean.unwrap_or(!self.cursor);
        QueryOptions {
            max_time: self.max_time.unwrap_or(default_timeout),
            read_routing: ReadRouting::from_flag(self.read_secondary),
            lean: lean.then_some(LeanMode { getters: true }),
            projection: self.projection.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
            batch_size: if self.cursor {
                Some(self.batch_size.unwrap_or(constants::query::CURSOR_BATCH_SIZE))
            } else {
                self.batch_size
            },
        }
    }
}

/// Effective options of a read
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub max_time: Duration,
    pub read_routing: ReadRouting,
    pub lean: Option<LeanMode>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub batch_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    pub allow_disk_use: Option<bool>,
    pub read_secondary: Option<bool>,
    pub max_time: Option<Duration>,
    pub batch_size: Option<u32>,
}

impl AggregateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_disk_use(mut self, allow: bool) -> Self {
        self.allow_disk_use = Some(allow);
        self
    }

    pub fn read_secondary(mut self, read_secondary: bool) -> Self {
        self.read_secondary = Some(read_secondary);
        self
    }

    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Aggregations default to the long time limit, not the connection default
    pub fn resolve(&self) -> AggregateSettings {
        AggregateSettings {
            allow_disk_use: self.allow_disk_use.unwrap_or(true),
            read_routing: ReadRouting::from_flag(self.read_secondary),
            max_time: self
                .max_time
                .unwrap_or_else(constants::query::aggregate_timeout),
            batch_size: self.batch_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSettings {
    pub allow_disk_use: bool,
    pub read_routing: ReadRouting,
    pub max_time: Duration,
    pub batch_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountOptions {
    pub read_secondary: Option<bool>,
    pub max_time: Option<Duration>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl CountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_secondary(mut self, read_secondary: bool) -> Self {
        self.read_secondary = Some(read_secondary);
        self
    }

    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn resolve(&self, default_timeout: Duration) -> CountSettings {
        CountSettings {
            max_time: self.max_time.unwrap_or(default_timeout),
            read_routing: ReadRouting::from_flag(self.read_secondary),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountSettings {
    pub max_time: Duration,
    pub read_routing: ReadRouting,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// Options for `update_one` / `update_many`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub upsert: bool,
    pub max_time: Option<Duration>,
    pub array_filters: Option<Vec<Document>>,
    pub set_defaults_on_insert: Option<bool>,
    /// Refresh `updatedAt` on timestamped entities (default `true`)
    pub timestamps: Option<bool>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn array_filters(mut self, filters: Vec<Document>) -> Self {
        self.array_filters = Some(filters);
        self
    }

    pub fn set_defaults_on_insert(mut self, enabled: bool) -> Self {
        self.set_defaults_on_insert = Some(enabled);
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = Some(enabled);
        self
    }
}

/// Options for `delete_one` / `delete_many`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub max_time: Option<Duration>,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndUpdateOptions {
    /// Return the document as it is after the update (default `true`)
    pub return_new: Option<bool>,
    pub upsert: bool,
    pub set_defaults_on_insert: Option<bool>,
    pub max_time: Option<Duration>,
    pub lean: Option<bool>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub array_filters: Option<Vec<Document>>,
    pub timestamps: Option<bool>,
}

impl FindOneAndUpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn return_new(mut self, return_new: bool) -> Self {
        self.return_new = Some(return_new);
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn set_defaults_on_insert(mut self, enabled: bool) -> Self {
        self.set_defaults_on_insert = Some(enabled);
        self
    }

    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn lean(mut self, lean: bool) -> Self {
        self.lean = Some(lean);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn array_filters(mut self, filters: Vec<Document>) -> Self {
        self.array_filters = Some(filters);
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = Some(enabled);
        self
    }

    pub fn resolve(&self, default_timeout: Duration) -> FindOneAndUpdateSettings {
        FindOneAndUpdateSettings {
            return_document: if self.return_new.unwrap_or(true) {
                ReturnDocument::After
            } else {
                ReturnDocument::Before
            },
            upsert: self.upsert,
            set_defaults_on_insert: self.set_defaults_on_insert.unwrap_or(true),
            max_time: self.max_time.unwrap_or(default_timeout),
            lean: self
                .lean
                .unwrap_or(true)
                .then_some(LeanMode { getters: true }),
            projection: self.projection.clone(),
            sort: self.sort.clone(),
            array_filters: self.array_filters.clone(),
            timestamps: self.timestamps.unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindOneAndUpdateSettings {
    pub return_document: ReturnDocument,
    pub upsert: bool,
    pub set_defaults_on_insert: bool,
    pub max_time: Duration,
    pub lean: Option<LeanMode>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub array_filters: Option<Vec<Document>>,
    pub timestamps: bool,
}
