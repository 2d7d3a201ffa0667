use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::driver::Browser;
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::util::require_param;

#[derive(Debug, PartialEq, Eq)]
enum WaitFor {
    Sleep(Duration),
    Loaded,
    Selector(String),
}

fn parse(param: &str) -> WaitFor {
    let p = param.trim();
    if p == "loaded" {
        return WaitFor::Loaded;
    }
    let secs = if let Some(n) = p.strip_suffix('m') {
        n.trim().parse::<u64>().ok().map(|m| m * 60)
    } else if let Some(n) = p.strip_suffix('s') {
        n.trim().parse::<u64>().ok()
    } else {
        p.parse::<u64>().ok()
    };
    match secs {
        Some(s) => WaitFor::Sleep(Duration::from_secs(s)),
        None => WaitFor::Selector(p.trim_matches('"').to_string()),
    }
}

pub fn handle(cfg: &Config, browser: &mut dyn Browser, action: &Action) -> Result<Reply> {
    let param = require_param(action, "<N> | <N>s | <N>m | loaded | <selector>")?;
    let timeout = Duration::from_secs(cfg.wait_timeout_secs);
    match parse(param) {
        WaitFor::Sleep(d) => {
            if !d.is_zero() {
                info!("waiting for {} seconds", d.as_secs());
                thread::sleep(d);
            }
        }
        WaitFor::Loaded => {
            info!("waiting for page to load");
            browser.wait_loaded(timeout)?;
        }
        WaitFor::Selector(sel) => {
            info!("waiting for '{sel}' to exist (timeout: {}s)", timeout.as_secs());
            browser.wait_for(&sel, timeout)?;
        }
    }
    Ok(Reply::Nothing)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["wait"],
        handler: Handler::Simple(handle),
        syntax: "@wait: <N> | <N>s | <N>m | loaded | <selector>",
        summary: "Sleep, wait for the page to finish loading, or wait until a selector matches.",
        example: "@wait: 2\n@wait: loaded\n@wait: #results",
    })?;
    Ok(())
}
