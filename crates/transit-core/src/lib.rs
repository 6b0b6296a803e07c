pub mod config_manager;
pub mod error;
pub mod metrics;
pub mod telemetry;
pub mod traits;

pub use config_manager::*;
pub use error::*;
pub use metrics::*;
pub use traits::*;
