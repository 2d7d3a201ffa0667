use std::collections::HashSet;

use anyhow::{Result, bail};
use serde_json::{Map, Value};

use crate::kernel::values::pretty;

/// Run-wide variable store. Keys address nested mappings with `.`:
/// `user.profile.name` is `ctx["user"]["profile"]["name"]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    root: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a context from a JSON object; anything else is rejected.
    pub fn from_json(v: Value) -> Result<Self> {
        match v {
            Value::Object(root) => Ok(Self { root }),
            other => bail!(
                "context seed must be a mapping, got {}",
                crate::kernel::values::type_name(&other)
            ),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.root)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn get_nested(&self, path: &str) -> Option<&Value> {
        let mut segs = path.split('.');
        let first = segs.next().filter(|s| !s.is_empty())?;
        let mut cur = self.root.get(first)?;
        for seg in segs {
            cur = cur.as_object()?.get(seg)?;
        }
        Some(cur)
    }

    /// True iff every segment of `path` exists. Never fails.
    pub fn contains_path(&self, path: &str) -> bool {
        self.get_nested(path).is_some()
    }

    /// Writes `value` at `path`, creating intermediate mappings and replacing
    /// any non-mapping found on the way. With `overwrite == false` an existing
    /// leaf is left alone. Returns whether the value was written.
    pub fn set_nested(&mut self, path: &str, value: Value, overwrite: bool) -> bool {
        let segs: Vec<&str> = path.split('.').collect();
        if segs.iter().any(|s| s.is_empty()) {
            return false;
        }
        let (leaf, parents) = match segs.split_last() {
            Some(split) => split,
            None => return false,
        };

        let mut cur = &mut self.root;
        for seg in parents {
            let slot = cur
                .entry(seg.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(m) = slot else {
                return false;
            };
            cur = m;
        }

        if !overwrite && cur.contains_key(*leaf) {
            return false;
        }
        cur.insert(leaf.to_string(), value);
        true
    }

    pub fn set(&mut self, path: &str, value: Value) {
        self.set_nested(path, value, true);
    }

    pub fn set_default(&mut self, path: &str, value: Value) -> bool {
        self.set_nested(path, value, false)
    }

    /// Replaces `${path}` tokens. A value pulled in by substitution is expanded
    /// too, but never with a path that is already being expanded, so values
    /// that refer back to themselves cannot loop. Unknown paths become "".
    pub fn resolve_vars(&self, text: &str) -> String {
        let mut active = HashSet::new();
        self.expand(text, &mut active)
    }

    fn expand(&self, text: &str, active: &mut HashSet<String>) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            let Some(close) = rest[start + 2..].find('}') else {
                break;
            };
            let end = start + 2 + close;
            let path = rest[start + 2..end].trim();
            out.push_str(&rest[..start]);

            if active.contains(path) {
                out.push_str(&rest[start..=end]);
            } else {
                let value = self.get_nested(path).map(pretty).unwrap_or_default();
                active.insert(path.to_string());
                out.push_str(&self.expand(&value, active));
                active.remove(path);
            }
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Context {
        Context::from_json(json!({
            "user": {"name": "Alice", "details": {"age": 30}},
            "project": "Demo"
        }))
        .unwrap()
    }

    #[test]
    fn nested_lookup() {
        let ctx = sample();
        assert_eq!(ctx.get_nested("user.details.age"), Some(&json!(30)));
        assert_eq!(ctx.get_nested("user.missing"), None);
        assert_eq!(ctx.get_nested("project.name"), None);
        assert_eq!(ctx.get_nested(""), None);
    }

    #[test]
    fn set_creates_and_replaces_intermediates() {
        let mut ctx = sample();
        ctx.set("a.b.c", json!(1));
        assert_eq!(ctx.get_nested("a.b.c"), Some(&json!(1)));
        // "project" is a string, writing below it turns it into a mapping
        ctx.set("project.id", json!(7));
        assert_eq!(ctx.get_nested("project"), Some(&json!({"id": 7})));
    }

    #[test]
    fn default_does_not_overwrite() {
        let mut ctx = Context::new();
        ctx.set("a.b", json!(1));
        assert!(!ctx.set_default("a.b", json!(2)));
        assert_eq!(ctx.get_nested("a.b"), Some(&json!(1)));
        assert!(ctx.set_default("a.c", json!(3)));
        assert_eq!(ctx.get_nested("a.c"), Some(&json!(3)));
    }

    #[test]
    fn rejects_empty_segments() {
        let mut ctx = Context::new();
        assert!(!ctx.set_nested("a..b", json!(1), true));
        assert!(ctx.as_map().is_empty());
    }

    #[test]
    fn resolves_nested_variables() {
        let ctx = sample();
        let text = "Hello ${user.name}, your age is ${user.details.age}. Welcome to ${project}!";
        assert_eq!(
            ctx.resolve_vars(text),
            "Hello Alice, your age is 30. Welcome to Demo!"
        );
    }

    #[test]
    fn missing_variables_become_empty() {
        let ctx = sample();
        assert_eq!(ctx.resolve_vars("to ${project} and ${missing}!"), "to Demo and !");
        assert_eq!(Context::new().resolve_vars("Hi ${user.name}"), "Hi ");
    }

    #[test]
    fn self_referencing_values_terminate() {
        let mut ctx = Context::new();
        ctx.set("a", json!("<${b}>"));
        ctx.set("b", json!("[${a}]"));
        assert_eq!(ctx.resolve_vars("${a}"), "<[${a}]>");
    }

    #[test]
    fn repeated_tokens_all_resolve() {
        let mut ctx = Context::new();
        ctx.set("x", json!("1"));
        assert_eq!(ctx.resolve_vars("${x}-${x}"), "1-1");
    }

    #[test]
    fn substituted_values_expand_once_more() {
        let mut ctx = Context::new();
        ctx.set("greeting", json!("hi ${name}"));
        ctx.set("name", json!("Bob"));
        assert_eq!(ctx.resolve_vars("${greeting}!"), "hi Bob!");
    }

    #[test]
    fn unterminated_token_is_left_alone() {
        let ctx = sample();
        assert_eq!(ctx.resolve_vars("${project} ${user.name"), "Demo ${user.name");
    }
}
