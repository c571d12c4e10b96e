pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod store;

pub use config::Config;
pub use engine::{Engine, EngineError};
