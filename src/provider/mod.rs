pub use self::{
    cache_store::{CacheStore, MokaStore, StagedCache},
    database::DatabasePool,
    source::{
        PgSnapshot, SnapshotSource, Source, SourceQuery, SourceTransaction,
    },
};

mod cache_store;
mod database;
mod source;
