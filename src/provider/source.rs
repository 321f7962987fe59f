//! Read only access to the upstream analytical database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    dao::{postgre::series, DataBase},
    error::Error,
    model::{SeriesPoint, Table},
};

/// Table, columns and equality filters describing one series in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub table: String,
    pub ts_column: String,
    pub columns: Vec<String>,
    pub filters: Vec<(String, String)>,
}

#[async_trait]
pub trait Source: Send + Sync {
    async fn max_timestamp(
        &self,
        query: &SourceQuery,
    ) -> Result<Option<DateTime<Utc>>, Error>;

    /// Rows newer than `since` (or at `since` when inclusive), ascending.
    async fn rows_after(
        &self,
        query: &SourceQuery,
        since: DateTime<Utc>,
        inclusive: bool,
    ) -> Result<Vec<SeriesPoint>, Error>;
}

/// A source able to pin a consistent snapshot for a sequence of reads.
#[async_trait]
pub trait SnapshotSource: Source {
    fn as_source(&self) -> &dyn Source;

    async fn begin(&self) -> Result<Box<dyn SourceTransaction>, Error>;
}

#[async_trait]
pub trait SourceTransaction: Source {
    fn as_source(&self) -> &dyn Source;

    async fn commit(self: Box<Self>) -> Result<(), Error>;

    async fn rollback(self: Box<Self>) -> Result<(), Error>;
}

#[async_trait]
impl Source for Table<SeriesPoint> {
    async fn max_timestamp(
        &self,
        query: &SourceQuery,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.get_max_timestamp(query).await?)
    }

    async fn rows_after(
        &self,
        query: &SourceQuery,
        since: DateTime<Utc>,
        inclusive: bool,
    ) -> Result<Vec<SeriesPoint>, Error> {
        Ok(self.get_rows_after(query, since, inclusive).await?)
    }
}

#[async_trait]
impl SnapshotSource for Table<SeriesPoint> {
    fn as_source(&self) -> &dyn Source {
        self
    }

    async fn begin(&self) -> Result<Box<dyn SourceTransaction>, Error> {
        let transaction = self.begin_snapshot().await?;
        Ok(Box::new(PgSnapshot {
            transaction: Mutex::new(Some(transaction)),
        }))
    }
}

pub struct PgSnapshot {
    transaction: Mutex<Option<sqlx::Transaction<'static, DataBase>>>,
}

fn finished() -> Error {
    Error::ServerError(String::from("source snapshot already finished"))
}

#[async_trait]
impl Source for PgSnapshot {
    async fn max_timestamp(
        &self,
        query: &SourceQuery,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        let mut guard = self.transaction.lock().await;
        let transaction = guard.as_mut().ok_or_else(finished)?;
        Ok(series::max_timestamp(&mut **transaction, query).await?)
    }

    async fn rows_after(
        &self,
        query: &SourceQuery,
        since: DateTime<Utc>,
        inclusive: bool,
    ) -> Result<Vec<SeriesPoint>, Error> {
        let mut guard = self.transaction.lock().await;
        let transaction = guard.as_mut().ok_or_else(finished)?;
        Ok(series::rows_after(&mut **transaction, query, since, inclusive)
            .await?)
    }
}

#[async_trait]
impl SourceTransaction for PgSnapshot {
    fn as_source(&self) -> &dyn Source {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        if let Some(transaction) = self.transaction.into_inner() {
            transaction.commit().await?;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        if let Some(transaction) = self.transaction.into_inner() {
            transaction.rollback().await?;
        }
        Ok(())
    }
}
