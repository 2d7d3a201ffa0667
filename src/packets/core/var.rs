use anyhow::{Result, anyhow, bail};
use tracing::debug;

use crate::driver::Browser;
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::kernel::values::parse_literal;
use crate::packets::util::require_param;

const USAGE: &str = "<name>=<value>";

fn assign(action: &Action, ctx: &mut Context, overwrite: bool) -> Result<Reply> {
    let param = require_param(action, USAGE)?;
    let (name, raw) = param
        .split_once('=')
        .ok_or_else(|| anyhow!("@{} expects {USAGE}, got '{param}'", action.name()))?;
    let name = name.trim();
    let value = parse_literal(&ctx.resolve_vars(raw.trim()));

    if name.is_empty() || name.split('.').any(str::is_empty) {
        bail!("invalid variable name '{name}'");
    }
    if ctx.set_nested(name, value.clone(), overwrite) {
        debug!("set {name} = {value}");
    } else {
        debug!("{name} already set, default {value} ignored");
    }
    Ok(Reply::Nothing)
}

// @var: name=value
pub fn handle_var(_cfg: &Config, _browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    assign(action, ctx, true)
}

// @var_default: name=value, only when `name` is not set yet
pub fn handle_default(_cfg: &Config, _browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    assign(action, ctx, false)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["var"],
        handler: Handler::Contextual(handle_var),
        syntax: "@var: <name>=<value>",
        summary: "Set a script variable. Dotted names create nested values; JSON literals keep their type.",
        example: "@var: user.name=\"Alice\"\n@var: retries=3",
    })?
    .register(ActionSpec {
        names: &["var_default"],
        handler: Handler::Contextual(handle_default),
        syntax: "@var_default: <name>=<value>",
        summary: "Set a script variable only if it does not exist yet.",
        example: "@var_default: base=\"/app\"",
    })?;
    Ok(())
}
