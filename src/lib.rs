pub mod backend;
pub mod config;
pub mod fault;
pub mod listener;
pub mod transport;

pub use backend::*;
pub use config::*;
pub use fault::*;
pub use listener::*;
pub use transport::*;
