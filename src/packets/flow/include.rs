use anyhow::Result;
use tracing::warn;

use crate::driver::Browser;
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};

// Includes are spliced in by the parser; an `@include` only reaches the engine
// when an action list was built by hand.
fn handle(_cfg: &Config, _browser: &mut dyn Browser, action: &Action) -> Result<Reply> {
    warn!("{action} reached the engine unresolved and was skipped");
    Ok(Reply::Nothing)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["include"],
        handler: Handler::Simple(handle),
        syntax: "@include: <file>",
        summary: "Insert the actions of another script file, resolved next to the including file.",
        example: "@include: parts/login.txt",
    })?;
    Ok(())
}
