pub mod postgre;

pub use postgre::{DBConnection, DBRow, DataBase, PoolOption, PoolType};
