use anyhow::Result;
use serde_json::{Value, json};
use tracing::debug;

use crate::driver::Browser;
use crate::kernel::ast::{Action, Params};
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::util::{require_param, strip_wrapping};

const LOG_SCRIPT: &str = "console.log(arguments[0]);";

fn is_var_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !s.ends_with('.')
}

/// `name=return ...` or `name={ ... }` stores the result; anything else is
/// plain code, so `document.title = "x"` is not mistaken for an assignment.
fn split_target(param: &str) -> (Option<&str>, &str) {
    if let Some((name, code)) = param.split_once('=') {
        let (name, code) = (name.trim(), code.trim_start());
        let stores = code.starts_with("return") || (code.starts_with('{') && code.trim_end().ends_with('}'));
        if is_var_name(name) && !code.starts_with('=') && stores {
            return (Some(name), strip_wrapping(code));
        }
    }
    (None, param)
}

fn script(_cfg: &Config, browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let param = require_param(action, "[<var>=]<code>")?;
    let (target, code) = match action.params() {
        Some(Params::Block(_)) => (None, param),
        _ => split_target(param),
    };
    debug!("executing script: {}", code.lines().next().unwrap_or_default());
    let result = browser.execute_script(code, vec![])?;
    if let Some(name) = target
        && !result.is_null()
    {
        debug!("script result stored in {name}");
        ctx.set(name, result);
    }
    Ok(Reply::Nothing)
}

fn log(_cfg: &Config, browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let param = require_param(action, "\"<message>\" | <expression>")?;
    let param = ctx.resolve_vars(param);
    if param.len() >= 2 && param.starts_with('"') && param.ends_with('"') {
        browser.execute_script(LOG_SCRIPT, vec![json!(param[1..param.len() - 1])])?;
    } else {
        browser.execute_script(&LOG_SCRIPT.replace("arguments[0]", &param), Vec::<Value>::new())?;
    }
    Ok(Reply::Nothing)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["script"],
        handler: Handler::Contextual(script),
        syntax: "@script: [<var>=]<code>",
        summary: "Run JavaScript in the page; `var=return ...` stores the result in a variable.",
        example: "@script: console.log(\"hi\");\n@script: title=return document.title\n@script: {\n    document.title = \"New\";\n}",
    })?
    .register(ActionSpec {
        names: &["log"],
        handler: Handler::Contextual(log),
        syntax: "@log: \"<message>\" | <expression>",
        summary: "Write to the browser console. Quoted text is logged as is, anything else is evaluated.",
        example: "@log: \"value is ${my_variable}\"\n@log: document.title",
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RecordingBrowser;

    #[test]
    fn assignment_forms() {
        assert_eq!(split_target("t=return document.title"), (Some("t"), "return document.title"));
        assert_eq!(split_target("a.b = { return 1; }"), (Some("a.b"), " return 1; "));
        assert_eq!(split_target("document.title = \"x\""), (None, "document.title = \"x\""));
        assert_eq!(split_target("x == return"), (None, "x == return"));
        assert_eq!(split_target("console.log(1)"), (None, "console.log(1)"));
    }

    #[test]
    fn results_are_stored_in_the_context() -> Result<()> {
        let mut b = RecordingBrowser::new().with_script_result("document.title", json!("Home"));
        let mut ctx = Context::new();
        let action = Action::simple("script", Some(Params::Line("page.title=return document.title".into())));
        script(&Config::default(), &mut b, &action, &mut ctx)?;
        assert_eq!(ctx.get_nested("page.title"), Some(&json!("Home")));
        Ok(())
    }

    #[test]
    fn log_quotes_messages_and_evaluates_expressions() -> Result<()> {
        let mut b = RecordingBrowser::new();
        let mut ctx = Context::from_json(json!({ "n": 2 }))?;
        let cfg = Config::default();
        log(&cfg, &mut b, &Action::simple("log", Some(Params::Line("\"n=${n}\"".into()))), &mut ctx)?;
        log(&cfg, &mut b, &Action::simple("log", Some(Params::Line("document.title".into()))), &mut ctx)?;
        assert_eq!(
            b.calls(),
            &[
                "script console.log(arguments[0]); [\"n=2\"]".to_string(),
                "script console.log(document.title);".to_string(),
            ]
        );
        Ok(())
    }
}
