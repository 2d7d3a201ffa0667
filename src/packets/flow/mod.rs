pub mod conditionals;
pub mod iframe;
pub mod include;

use anyhow::Result;

use crate::kernel::packet_catalog::RegistryBuilder;

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    conditionals::register(b)?;
    iframe::register(b)?;
    include::register(b)
}
