use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::driver::Browser;
use crate::kernel::ast::{Action, Params};
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::util::strip_wrapping;

/// Context key holding the violation ids to drop from analysis results.
pub const IGNORE_KEY: &str = "ignore";

pub fn ignored_ids(ctx: &Context) -> Vec<String> {
    match ctx.get(IGNORE_KEY) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn add_ignored<'a>(ctx: &mut Context, ids: impl IntoIterator<Item = &'a str>) {
    let mut list = ignored_ids(ctx);
    for id in ids {
        let id = id.trim();
        if !id.is_empty() && !list.iter().any(|known| known == id) {
            debug!("ignoring violation '{id}'");
            list.push(id.to_string());
        }
    }
    ctx.set(IGNORE_KEY, Value::from(list));
}

pub fn handle(_cfg: &Config, _browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let text = match action.params() {
        Some(Params::Block(s)) => s.as_str(),
        Some(Params::Line(s)) => strip_wrapping(s),
        None => {
            tracing::warn!("@ignore without a violation id");
            return Ok(Reply::Nothing);
        }
    };
    add_ignored(ctx, text.lines());
    Ok(Reply::Nothing)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["ignore"],
        handler: Handler::Contextual(handle),
        syntax: "@ignore: <violation_id> | { one id per line }",
        summary: "Drop violations with these ids from later analysis results.",
        example: "@ignore: image-alt\n@ignore: {\n    label\n    html-has-lang\n}",
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RecordingBrowser;

    #[test]
    fn collects_unique_ids_line_by_line() -> Result<()> {
        let mut ctx = Context::new();
        let mut b = RecordingBrowser::new();
        let cfg = Config::default();
        handle(&cfg, &mut b, &Action::simple("ignore", Some(Params::Line("image-alt".into()))), &mut ctx)?;
        handle(
            &cfg,
            &mut b,
            &Action::simple("ignore", Some(Params::Block("label\n\n  image-alt\n  html-has-lang".into()))),
            &mut ctx,
        )?;
        assert_eq!(ignored_ids(&ctx), vec!["image-alt", "label", "html-has-lang"]);
        Ok(())
    }
}
