pub mod gate;
pub mod parser;

pub use gate::*;
pub use parser::*;

use std::fmt;

/// One independently gated aspect of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDimension {
    Status,
    ConnectDelay,
    InterByteDelay,
    Reset,
}

impl fmt::Display for FaultDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultDimension::Status => "status",
            FaultDimension::ConnectDelay => "connect_delay",
            FaultDimension::InterByteDelay => "inter_byte_delay",
            FaultDimension::Reset => "reset",
        };
        f.write_str(name)
    }
}
