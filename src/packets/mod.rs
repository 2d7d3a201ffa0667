pub mod browser;
pub mod core;
pub mod flow;
pub mod util;

use anyhow::Result;

use crate::kernel::packet_catalog::RegistryBuilder;

/// Registers every built-in action. Called once before the engine starts.
pub fn register_all(b: &mut RegistryBuilder) -> Result<()> {
    flow::register(b)?;
    core::register(b)?;
    browser::register(b)
}
