pub mod types;
pub mod rest;
pub mod auth;

pub use rest::OpenSprinklerClient;
pub use types::{JsonAll, parse_log_entry};
