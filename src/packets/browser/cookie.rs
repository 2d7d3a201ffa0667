use anyhow::{Result, anyhow};
use serde_json::json;
use tracing::debug;

use crate::driver::Browser;
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::util::{json_object, require_param, split_key_value};

fn cookie(_cfg: &Config, browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let param = require_param(action, "<name>=<value> | {\"name\": ..., \"value\": ...}")?;
    let cookie = match json_object(action) {
        Some(obj) => obj,
        None => {
            let (name, value) = split_key_value(param)
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| anyhow!("invalid cookie '{param}', use <name>=<value>"))?;
            json!({ "name": name, "value": ctx.resolve_vars(value.trim_matches('"')) })
        }
    };
    debug!("setting cookie {cookie}");
    browser.add_cookie(&cookie)?;
    Ok(Reply::Nothing)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["cookie"],
        handler: Handler::Contextual(cookie),
        syntax: "@cookie: <name>=<value> | {\"name\": \"<name>\", \"value\": \"<value>\"}",
        summary: "Set a cookie for the current site.",
        example: "@cookie: consent=yes\n@cookie: {\"name\": \"session\", \"value\": \"abc\", \"path\": \"/\"}",
    })?;
    Ok(())
}
