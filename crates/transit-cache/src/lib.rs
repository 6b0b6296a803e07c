pub mod cache;
pub mod status;
pub mod template;

pub use cache::{CacheEntry, CacheStats};
pub use status::*;
pub use template::*;
