use bigdecimal::ToPrimitive;
use chrono::{DateTime, Utc};
use sqlx::{types::BigDecimal, Error, QueryBuilder, Row, Transaction};

use crate::{
    model::{SeriesPoint, Table},
    provider::SourceQuery,
};

use super::{DBConnection, DBRow, DataBase};

/// Quotes a column name, or every part of a `schema.table` path.
fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!(r#""{}""#, part.replace('"', r#""""#)))
        .collect::<Vec<String>>()
        .join(".")
}

fn push_filters<'a>(
    builder: &mut QueryBuilder<'a, DataBase>,
    filters: &'a [(String, String)],
) {
    for (column, value) in filters {
        builder
            .push(" AND ")
            .push(quote_ident(column))
            .push(" = ")
            .push_bind(value);
    }
}

fn decode_point(
    row: &DBRow,
    columns: &[String],
) -> Result<SeriesPoint, Error> {
    let ts: DateTime<Utc> = row.try_get("ts")?;
    let mut point = SeriesPoint::new(ts);

    for column in columns {
        let value: Option<BigDecimal> = row.try_get(column.as_str())?;
        if let Some(value) = value.and_then(|v| v.to_f64()) {
            point.set(column, value);
        }
    }

    Ok(point)
}

pub async fn max_timestamp(
    connection: &mut DBConnection,
    query: &SourceQuery,
) -> Result<Option<DateTime<Utc>>, Error> {
    let ts = quote_ident(&query.ts_column);
    let mut builder: QueryBuilder<DataBase> = QueryBuilder::new("SELECT MAX(");
    builder
        .push(&ts)
        .push(")::timestamptz FROM ")
        .push(quote_ident(&query.table))
        .push(" WHERE ")
        .push(&ts)
        .push(" IS NOT NULL");
    push_filters(&mut builder, &query.filters);

    let value: Option<DateTime<Utc>> = builder
        .build_query_scalar()
        .persistent(false)
        .fetch_one(connection)
        .await?;

    Ok(value)
}

pub async fn rows_after(
    connection: &mut DBConnection,
    query: &SourceQuery,
    since: DateTime<Utc>,
    inclusive: bool,
) -> Result<Vec<SeriesPoint>, Error> {
    let ts = quote_ident(&query.ts_column);
    let mut builder: QueryBuilder<DataBase> = QueryBuilder::new("SELECT ");
    builder.push(&ts).push(r#"::timestamptz AS "ts""#);
    for column in &query.columns {
        let column = quote_ident(column);
        builder
            .push(", ")
            .push(&column)
            .push("::numeric AS ")
            .push(&column);
    }
    builder
        .push(" FROM ")
        .push(quote_ident(&query.table))
        .push(" WHERE ")
        .push(&ts)
        .push(if inclusive { " >= " } else { " > " })
        .push_bind(since);
    push_filters(&mut builder, &query.filters);
    builder.push(" ORDER BY ").push(&ts).push(" ASC");

    let rows = builder
        .build()
        .persistent(false)
        .fetch_all(connection)
        .await?;

    rows.iter()
        .map(|row| decode_point(row, &query.columns))
        .collect()
}

impl Table<SeriesPoint> {
    pub async fn get_max_timestamp(
        &self,
        query: &SourceQuery,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        let mut connection = self.pool.acquire().await?;
        max_timestamp(&mut connection, query).await
    }

    pub async fn get_rows_after(
        &self,
        query: &SourceQuery,
        since: DateTime<Utc>,
        inclusive: bool,
    ) -> Result<Vec<SeriesPoint>, Error> {
        let mut connection = self.pool.acquire().await?;
        rows_after(&mut connection, query, since, inclusive).await
    }

    /// Opens a read only snapshot, every query inside it sees the same data.
    pub async fn begin_snapshot(
        &self,
    ) -> Result<Transaction<'static, DataBase>, Error> {
        let mut transaction = self.pool.begin().await?;
        sqlx::query(
            r#"
            SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY
            "#,
        )
        .execute(&mut *transaction)
        .await?;

        Ok(transaction)
    }
}
