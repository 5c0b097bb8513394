//! Blocker detection and task timeline prediction for project planning tools.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;

pub use config::Config;
pub use error::{AppError, Result};
