//! TweetHarvest HTTP server: exposes hashtag and user queries over HTTP.

pub mod config;
pub mod error;
pub mod http;

pub use config::{HarvestArgs, ServiceConfig};
pub use error::ApiError;
pub use http::{router, AppState};
