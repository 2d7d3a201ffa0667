pub mod analyse;
pub mod error;
pub mod ignore;
pub mod print;
pub mod var;
pub mod wait;

use anyhow::Result;

use crate::kernel::packet_catalog::RegistryBuilder;

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    var::register(b)?;
    print::register(b)?;
    error::register(b)?;
    ignore::register(b)?;
    wait::register(b)?;
    analyse::register(b)
}
