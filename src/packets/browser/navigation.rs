use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::driver::{self, Browser};
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::util::{param, require_param};

fn navigate(cfg: &Config, browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let target = require_param(action, "<url>")?;
    let target = ctx.resolve_vars(target.trim_matches('"'));
    driver::open(browser, &target, Duration::from_secs(cfg.wait_timeout_secs))?;
    Ok(Reply::Nothing)
}

fn back(_cfg: &Config, browser: &mut dyn Browser, _action: &Action) -> Result<Reply> {
    browser.back()?;
    Ok(Reply::Nothing)
}

fn refresh(_cfg: &Config, browser: &mut dyn Browser, _action: &Action) -> Result<Reply> {
    browser.refresh()?;
    Ok(Reply::Nothing)
}

fn scroll(_cfg: &Config, browser: &mut dyn Browser, action: &Action) -> Result<Reply> {
    let target = require_param(action, "top | bottom | left | right | <selector>")?;
    let script = match target {
        "top" => "window.scrollTo(0, 0);",
        "bottom" => "window.scrollTo(0, document.body.scrollHeight);",
        "left" => "window.scrollBy(-window.innerWidth, 0);",
        "right" => "window.scrollBy(window.innerWidth, 0);",
        selector => {
            browser.scroll_to(selector)?;
            return Ok(Reply::Nothing);
        }
    };
    browser.execute_script(script, vec![])?;
    Ok(Reply::Nothing)
}

fn hover(_cfg: &Config, browser: &mut dyn Browser, action: &Action) -> Result<Reply> {
    match param(action) {
        Some(selector) => browser.hover(selector)?,
        None => warn!("@hover without a selector"),
    }
    Ok(Reply::Nothing)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["navigate"],
        handler: Handler::Contextual(navigate),
        syntax: "@navigate: <url>",
        summary: "Open a URL. Paths without a scheme stay on the current site.",
        example: "@navigate: https://example.com\n@navigate: /servlet/BrowseUser",
    })?
    .register(ActionSpec {
        names: &["back"],
        handler: Handler::Simple(back),
        syntax: "@back",
        summary: "Go back one page in the browser history.",
        example: "@back",
    })?
    .register(ActionSpec {
        names: &["refresh"],
        handler: Handler::Simple(refresh),
        syntax: "@refresh",
        summary: "Reload the current page.",
        example: "@refresh",
    })?
    .register(ActionSpec {
        names: &["scroll"],
        handler: Handler::Simple(scroll),
        syntax: "@scroll: top | bottom | left | right | <selector>",
        summary: "Scroll the page in a direction or bring an element into view.",
        example: "@scroll: bottom\n@scroll: #footer",
    })?
    .register(ActionSpec {
        names: &["hover"],
        handler: Handler::Simple(hover),
        syntax: "@hover: <selector>",
        summary: "Move the pointer over an element.",
        example: "@hover: #menu-item",
    })?;
    Ok(())
}
