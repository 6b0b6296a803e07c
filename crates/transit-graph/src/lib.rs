pub mod edge;
pub mod graph;
pub mod loader;
pub mod pathfinder;
pub mod traversal;

pub use edge::*;
pub use graph::*;
pub use loader::*;
pub use pathfinder::*;
pub use traversal::*;
