pub mod aggregate;
pub mod app;
pub mod client;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;
pub mod ui;

pub use aggregate::aggregate;
pub use app::router;
pub use client::{ClientConfig, HttpStatsApi, StatsApi};
pub use errors::{ApiError, StatsError};
pub use models::{Bucket, Granularity, NewStat, Record, StatChanges};
pub use state::AppState;
pub use storage::{load_data, resolve_data_path};
pub use store::{MutationState, MutationTarget, StatsStore};
