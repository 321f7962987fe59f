use crate::{
    configuration::Config,
    dao::PoolOption,
    error::Error,
    model::{SeriesPoint, Table},
};

#[derive(Debug)]
pub struct DatabasePool {
    pub series: Table<SeriesPoint>,
}

impl DatabasePool {
    pub async fn new(config: &Config) -> Result<DatabasePool, Error> {
        let pool = PoolOption::new()
            .max_connections(config.database_max_connections)
            .connect(config.database_url.as_str())
            .await?;

        Ok(DatabasePool {
            series: Table::new(pool),
        })
    }
}
