use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::{Result, bail};
use serde_json::Value;

use crate::driver::Browser;
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::context::Context;

/// What a handler hands back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nothing,
    /// A finding for the result trace.
    Record(Value),
    /// Actions to run in place of this one.
    Actions(Vec<Action>),
}

pub type SimpleFn = fn(&Config, &mut dyn Browser, &Action) -> Result<Reply>;
pub type ContextualFn = fn(&Config, &mut dyn Browser, &Action, &mut Context) -> Result<Reply>;

#[derive(Clone, Copy)]
pub enum Handler {
    Simple(SimpleFn),
    /// Needs the run-wide variable store.
    Contextual(ContextualFn),
}

impl Handler {
    pub fn call(
        &self,
        cfg: &Config,
        browser: &mut dyn Browser,
        action: &Action,
        ctx: &mut Context,
    ) -> Result<Reply> {
        match self {
            Handler::Simple(f) => f(cfg, browser, action),
            Handler::Contextual(f) => f(cfg, browser, action, ctx),
        }
    }
}

pub struct ActionSpec {
    pub names: &'static [&'static str],
    pub handler: Handler,
    pub syntax: &'static str,
    pub summary: &'static str,
    pub example: &'static str,
}

/// Collects handlers once at startup; [`build`](Self::build) freezes them.
#[derive(Default)]
pub struct RegistryBuilder {
    specs: Vec<ActionSpec>,
    index: BTreeMap<&'static str, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ActionSpec) -> Result<&mut Self> {
        if spec.names.is_empty() {
            bail!("action spec without a name");
        }
        for name in spec.names {
            if self.index.contains_key(name) {
                bail!("action '@{name}' registered twice");
            }
        }
        let slot = self.specs.len();
        for name in spec.names {
            self.index.insert(name, slot);
        }
        self.specs.push(spec);
        Ok(self)
    }

    pub fn build(self) -> ActionRegistry {
        ActionRegistry {
            specs: self.specs,
            index: self.index,
        }
    }
}

/// Immutable name to handler table handed to the engine.
pub struct ActionRegistry {
    specs: Vec<ActionSpec>,
    index: BTreeMap<&'static str, usize>,
}

impl ActionRegistry {
    /// Every built-in action.
    pub fn standard() -> Result<Self> {
        let mut builder = RegistryBuilder::new();
        crate::packets::register_all(&mut builder)?;
        Ok(builder.build())
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    pub fn handler(&self, name: &str) -> Option<Handler> {
        self.get(name).map(|spec| spec.handler)
    }

    /// All registered names including aliases, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.index.keys().copied()
    }

    pub fn suggest(&self, name: &str) -> Option<&'static str> {
        let norm = name.to_ascii_lowercase();
        let mut best: Option<&'static str> = None;
        let mut best_score = usize::MAX;

        for candidate in self.names() {
            let score = edit_distance(&norm, candidate);
            if score < best_score {
                best_score = score;
                best = Some(candidate);
            }
        }

        if best_score <= 2 { best } else { None }
    }

    pub fn render_list(&self) -> String {
        let mut out = String::new();
        out.push_str("Available actions:\n");
        for spec in &self.sorted_specs() {
            let _ = writeln!(&mut out, "  @{:<18} {}", spec.names[0], spec.summary);
        }
        out
    }

    pub fn render_entry(&self, name: &str) -> Option<String> {
        let spec = self.get(name.trim().trim_start_matches('@'))?;
        let mut out = String::new();
        let aliases: Vec<&str> = spec.names.iter().skip(1).copied().collect();

        let _ = writeln!(&mut out, "Action: @{}", spec.names[0]);
        if !aliases.is_empty() {
            let _ = writeln!(&mut out, "Aliases: {}", aliases.join(", "));
        }
        let _ = writeln!(&mut out, "Syntax: {}", spec.syntax);
        let _ = writeln!(&mut out, "\n{}", spec.summary);
        if !spec.example.is_empty() {
            let _ = writeln!(&mut out, "\nExample:");
            for line in spec.example.lines() {
                let _ = writeln!(&mut out, "  {line}");
            }
        }
        Some(out)
    }

    fn sorted_specs(&self) -> Vec<&ActionSpec> {
        let mut specs: Vec<&ActionSpec> = self.specs.iter().collect();
        specs.sort_unstable_by_key(|s| s.names[0]);
        specs
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut cur = vec![0usize; b_chars.len() + 1];

    for i in 1..=a_chars.len() {
        cur[0] = i;
        for j in 1..=b_chars.len() {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[b_chars.len()]
}
