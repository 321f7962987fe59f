//! API Controller modules

pub mod domains;
pub mod series;
pub mod version;
