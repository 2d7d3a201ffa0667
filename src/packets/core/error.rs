use anyhow::Result;
use serde_json::json;
use tracing::{debug, info};

use crate::driver::Browser;
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::util::{require_param, split_key_value, strip_wrapping};

const DEFAULT_MESSAGE: &str = "An error action was executed, but no message was provided.";

/// `(selector, message)`. Block params and messages starting with a quote or
/// brace never carry a selector.
fn split(action: &Action, param: &str) -> (Option<String>, String) {
    let is_block = action.params().is_some_and(|p| p.is_block());
    if is_block || param.starts_with('"') || param.starts_with('{') {
        return (None, param.to_string());
    }
    match split_key_value(param) {
        Some((sel, msg)) if !sel.is_empty() => (Some(sel.to_string()), msg.to_string()),
        _ => (None, param.to_string()),
    }
}

pub fn handle(_cfg: &Config, browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let param = require_param(action, "[<selector>|!<selector>=]<message>")?;
    let (selector, message) = split(action, param);

    if let Some(sel) = &selector {
        let (wanted, sel) = match sel.strip_prefix('!') {
            Some(rest) => (false, rest.trim()),
            None => (true, sel.as_str()),
        };
        let present = browser.count_elements(sel)? > 0;
        if present != wanted {
            debug!("error condition on '{sel}' not met");
            return Ok(Reply::Nothing);
        }
        info!("error condition on '{sel}' met, reporting");
    }

    let mut message = strip_wrapping(&message).trim().to_string();
    if message.is_empty() {
        message = DEFAULT_MESSAGE.to_string();
    }
    let message = ctx.resolve_vars(&message);
    Ok(Reply::Record(json!({
        "url": browser.current_url()?,
        "title": format!("Manual Error: {}", browser.title()?),
        "type": "error",
        "failed": true,
        "error": message,
    })))
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["error"],
        handler: Handler::Contextual(handle),
        syntax: "@error: [<selector>=|!<selector>=]<message>",
        summary: "Add an error to the results, always or only when the selector is present (or absent with '!').",
        example: "@error: #should_be_there = \"found it\"\n@error: !#should_not_be_missing = \"gone\"\n@error: {\n    multi-line message\n}",
    })?;
    Ok(())
}
