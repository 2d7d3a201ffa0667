use anyhow::{Result, bail};

use crate::driver::Browser;
use crate::kernel::ast::{Action, Params};
use crate::kernel::config::Config;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};

/// Wraps the block in a frame switch and a switch back to the top document.
pub fn handle(_cfg: &Config, _browser: &mut dyn Browser, action: &Action) -> Result<Reply> {
    let Action::Container { target, actions, .. } = action else {
        bail!("@iframe handler called with {}", action);
    };
    let selector = target.trim().trim_matches('"');
    if selector.is_empty() {
        bail!("@iframe needs a selector for the frame");
    }

    let mut out = Vec::with_capacity(actions.len() + 2);
    out.push(Action::simple("frame", Some(Params::Line(selector.to_string()))));
    out.extend(actions.iter().cloned());
    out.push(Action::simple("frame", None));
    Ok(Reply::Actions(out))
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["iframe"],
        handler: Handler::Simple(handle),
        syntax: "@iframe <selector> { ... }",
        summary: "Run the block inside the iframe matched by the selector, then return to the page.",
        example: "@iframe #my_iframe {\n    @analyse\n}",
    })?;
    Ok(())
}
