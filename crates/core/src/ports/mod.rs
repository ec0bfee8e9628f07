mod node;
mod repository;
mod transform;

pub use node::*;
pub use repository::*;
pub use transform::*;
