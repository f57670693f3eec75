pub mod config;
pub mod error;
pub mod sync;
pub mod types;

pub use config::HelpdeskConfig;
pub use error::{HelpdeskError, Result};
pub use sync::KeyedLocks;
pub use types::*;
