pub use self::types::{DBConnection, DBRow, DataBase, PoolOption, PoolType};

pub mod series;
mod types;
