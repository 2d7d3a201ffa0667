use anyhow::Result;

use crate::driver::Browser;
use crate::kernel::ast::{Action, Params};
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::util::strip_wrapping;

/// Text of `@print`, with one layer of quotes or braces removed and variables
/// substituted.
pub fn render(action: &Action, ctx: &Context) -> Option<String> {
    let text = match action.params()? {
        Params::Block(s) => s.as_str(),
        Params::Line(s) => strip_wrapping(s),
    };
    Some(ctx.resolve_vars(text))
}

pub fn handle(_cfg: &Config, _browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    match render(action, ctx) {
        Some(text) => println!("{text}"),
        None => tracing::warn!("@print without a message"),
    }
    Ok(Reply::Nothing)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["print"],
        handler: Handler::Contextual(handle),
        syntax: "@print: <message>",
        summary: "Write a message to stdout. `${name}` is replaced by the variable's value.",
        example: "@print: \"checked ${pages} pages\"",
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_one_layer_and_substitutes() -> Result<()> {
        let ctx = Context::from_json(json!({ "n": 3 }))?;
        let quoted = Action::simple("print", Some(Params::Line("\"n is ${n}\"".into())));
        assert_eq!(render(&quoted, &ctx).as_deref(), Some("n is 3"));
        let braced = Action::simple("print", Some(Params::Line("{\"inner\"}".into())));
        assert_eq!(render(&braced, &ctx).as_deref(), Some("\"inner\""));
        let block = Action::simple("print", Some(Params::Block("line one\nline ${n}".into())));
        assert_eq!(render(&block, &ctx).as_deref(), Some("line one\nline 3"));
        assert_eq!(render(&Action::simple("print", None), &ctx), None);
        Ok(())
    }
}
