use std::path::Path;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info};

use crate::driver::Browser;
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::util::{require_param, split_key_value};

const SPECIAL_KEYS: &[(&str, &str)] = &[("<CR>", "\r"), ("<LF>", "\n"), ("<TAB>", "\t")];

pub fn expand_keys(text: &str) -> String {
    SPECIAL_KEYS
        .iter()
        .fold(text.to_string(), |acc, (placeholder, key)| acc.replace(placeholder, key))
}

fn click(cfg: &Config, browser: &mut dyn Browser, action: &Action) -> Result<Reply> {
    let selector = require_param(action, "<selector>")?;
    info!("clicking '{selector}'");
    browser.click(selector)?;
    browser.wait_loaded(Duration::from_secs(cfg.wait_timeout_secs))?;
    Ok(Reply::Nothing)
}

fn input(cfg: &Config, browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let param = require_param(action, "<selector>=<text>")?;
    let (selector, text) =
        split_key_value(param).ok_or_else(|| anyhow!("@input expects <selector>=<text>, got '{param}'"))?;
    let text = expand_keys(&ctx.resolve_vars(text));
    info!("typing into '{selector}'");
    browser.send_keys(selector, &text)?;
    browser.wait_loaded(Duration::from_secs(cfg.wait_timeout_secs))?;
    Ok(Reply::Nothing)
}

fn upload(_cfg: &Config, browser: &mut dyn Browser, action: &Action) -> Result<Reply> {
    let param = require_param(action, "<selector>=<file>")?;
    let (selector, file) =
        split_key_value(param).ok_or_else(|| anyhow!("@upload expects <selector>=<file>, got '{param}'"))?;
    if selector.is_empty() || file.is_empty() {
        bail!("@upload expects <selector>=<file>, got '{param}'");
    }
    if browser.attribute(selector, "type")?.as_deref() != Some("file") {
        bail!("'{selector}' is not a file input");
    }
    let absolute = std::path::absolute(Path::new(file.trim_matches('"')))?;
    debug!("uploading '{}' to '{selector}'", absolute.display());
    browser.send_keys(selector, &absolute.to_string_lossy())?;
    Ok(Reply::Nothing)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["click"],
        handler: Handler::Simple(click),
        syntax: "@click: <selector>",
        summary: "Click an element and wait for the page to settle.",
        example: "@click: #submit",
    })?
    .register(ActionSpec {
        names: &["input"],
        handler: Handler::Contextual(input),
        syntax: "@input: <selector>=<text>",
        summary: "Type text into a field. <CR>, <LF> and <TAB> send those keys.",
        example: "@input: #username=admin\n@input: #search=accessibility<CR>",
    })?
    .register(ActionSpec {
        names: &["upload"],
        handler: Handler::Simple(upload),
        syntax: "@upload: <selector>=<file>",
        summary: "Attach a file to a file input; relative paths resolve against the working directory.",
        example: "@upload: #attachment=docs/report.pdf",
    })?;
    Ok(())
}
