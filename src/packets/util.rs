use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::kernel::ast::Action;

pub fn param<'a>(action: &'a Action) -> Option<&'a str> {
    action.param_text().map(str::trim)
}

pub fn require_param<'a>(action: &'a Action, usage: &str) -> Result<&'a str> {
    param(action).ok_or_else(|| anyhow!("@{} needs a parameter: {usage}", action.name()))
}

/// Splits `key=value` at the first `=` that is not inside `[...]` or quotes,
/// so attribute selectors like `input[name=q]=text` keep their `=`.
pub fn split_key_value(s: &str) -> Option<(&str, &str)> {
    let mut brackets = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => brackets += 1,
            (None, ']') => brackets = brackets.saturating_sub(1),
            (None, '=') if brackets == 0 => return Some((s[..i].trim(), s[i + 1..].trim())),
            _ => {}
        }
    }
    None
}

/// Drops one layer of surrounding `"..."` or `{...}`.
pub fn strip_wrapping(s: &str) -> &str {
    let t = s.trim();
    let wrapped = t.len() >= 2
        && ((t.starts_with('"') && t.ends_with('"')) || (t.starts_with('{') && t.ends_with('}')));
    if wrapped { &t[1..t.len() - 1] } else { t }
}

pub fn is_quoted(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 2
        && ((t.starts_with('"') && t.ends_with('"')) || (t.starts_with('\'') && t.ends_with('\'')))
}

/// JSON object given either as a `{...}` block or inline.
pub fn json_object(action: &Action) -> Option<Value> {
    let raw = action.params()?.raw();
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::ast::Params;

    #[test]
    fn key_value_respects_selectors_and_quotes() {
        assert_eq!(split_key_value("#q=hello"), Some(("#q", "hello")));
        assert_eq!(
            split_key_value("input[name=q] = a=b"),
            Some(("input[name=q]", "a=b"))
        );
        assert_eq!(split_key_value("\"a=b\""), None);
        assert_eq!(split_key_value("plain"), None);
    }

    #[test]
    fn wrapping_is_removed_once() {
        assert_eq!(strip_wrapping("\"hi\""), "hi");
        assert_eq!(strip_wrapping("{ {x} }"), " {x} ");
        assert_eq!(strip_wrapping("\""), "\"");
        assert_eq!(strip_wrapping("plain"), "plain");
    }

    #[test]
    fn json_object_reads_blocks_back_with_braces() {
        let a = Action::simple("cookie", Some(Params::Block("\"name\": \"a\", \"value\": \"1\"".into())));
        assert_eq!(json_object(&a), Some(serde_json::json!({"name": "a", "value": "1"})));
        let b = Action::simple("cookie", Some(Params::Line("a=1".into())));
        assert_eq!(json_object(&b), None);
    }
}
