pub mod classifier;
pub mod feedback;
pub mod ladder;
pub mod resolver;
pub mod text;

pub use classifier::*;
pub use feedback::*;
pub use ladder::*;
pub use resolver::*;
