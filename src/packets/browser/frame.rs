use anyhow::Result;

use crate::driver::Browser;
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::util::param;

fn frame(_cfg: &Config, browser: &mut dyn Browser, action: &Action) -> Result<Reply> {
    match param(action).map(|p| p.trim_matches('"')) {
        None | Some("top") | Some("") => browser.switch_frame(None)?,
        Some(selector) => browser.switch_frame(Some(selector))?,
    }
    Ok(Reply::Nothing)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["frame"],
        handler: Handler::Simple(frame),
        syntax: "@frame[: <selector> | top]",
        summary: "Switch into the iframe matched by the selector, or back to the top document.",
        example: "@frame: #payment\n@click: #pay\n@frame",
    })?;
    Ok(())
}
