pub mod cookie;
pub mod frame;
pub mod interact;
pub mod navigation;
pub mod script;
pub mod window;

use anyhow::Result;

use crate::kernel::packet_catalog::RegistryBuilder;

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    navigation::register(b)?;
    interact::register(b)?;
    window::register(b)?;
    script::register(b)?;
    cookie::register(b)?;
    frame::register(b)
}
