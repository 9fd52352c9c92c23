// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod error;
pub mod rapl;
pub mod zone;

pub use common::{StaticTopology, SysfsTopology, TopologyProvider};
pub use config::Config;
pub use error::{RaplcapError, Result};
pub use rapl::{default_instance, with_context, RaplCap, RaplLimit};
pub use zone::Zone;
