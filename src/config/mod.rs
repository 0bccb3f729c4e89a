pub mod loader;
pub mod plan;
pub use loader::*;
pub use plan::*;
