pub mod cache_refresher;
pub mod fan_out;
pub mod refresh_orchestrator;
