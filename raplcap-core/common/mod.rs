pub mod msr;
pub mod topology;

pub use msr::MsrHandle;
pub use topology::{StaticTopology, SysfsTopology, TopologyProvider};
