use sqlx::{
    postgres::{PgConnection, PgPoolOptions, PgRow},
    PgPool, Postgres,
};

pub type PoolType = PgPool;
pub type PoolOption = PgPoolOptions;
pub type DBRow = PgRow;
pub type DataBase = Postgres;
pub type DBConnection = PgConnection;
