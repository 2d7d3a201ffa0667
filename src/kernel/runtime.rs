use std::time::Duration;

use anyhow::Result;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::driver::{self, Browser};
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionRegistry, Reply};

/// Name of the handler run after navigating to a bare URL line.
pub const DEFAULT_ANALYSIS: &str = "analyse";

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    Finding(Value),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub action: String,
    /// The action executed just before this one.
    pub last_action: Option<String>,
    pub outcome: Outcome,
}

impl TraceEntry {
    /// Findings and failures end up in the results file; plain completions do not.
    pub fn is_reportable(&self) -> bool {
        !matches!(self.outcome, Outcome::Done)
    }

    pub fn to_json(&self) -> Value {
        let mut out = match &self.outcome {
            Outcome::Done => json!({ "status": "ok" }),
            Outcome::Finding(Value::Object(map)) => Value::Object(map.clone()),
            Outcome::Finding(other) => json!({ "result": other }),
            Outcome::Failed(msg) => json!({ "failed": true, "error": msg }),
        };
        if let Value::Object(map) = &mut out {
            map.entry("action").or_insert_with(|| json!(self.action));
            map.entry("last_action")
                .or_insert_with(|| json!(self.last_action));
        }
        out
    }
}

/// Walks a parsed program against one browser session.
pub struct Runtime<'a> {
    registry: &'a ActionRegistry,
    config: &'a Config,
    browser: &'a mut dyn Browser,
    last_action: Option<String>,
}

impl<'a> Runtime<'a> {
    pub fn new(registry: &'a ActionRegistry, config: &'a Config, browser: &'a mut dyn Browser) -> Self {
        Self {
            registry,
            config,
            browser,
            last_action: None,
        }
    }

    /// Executes `actions` in order. A failing action is recorded and the run
    /// goes on, unless `config.debug` is set, in which case the error is
    /// returned and the run stops there.
    pub fn run(&mut self, actions: &[Action], ctx: &mut Context) -> Result<Vec<TraceEntry>> {
        let mut trace = Vec::new();
        self.run_into(actions, ctx, &mut trace)?;
        Ok(trace)
    }

    fn run_into(&mut self, actions: &[Action], ctx: &mut Context, trace: &mut Vec<TraceEntry>) -> Result<()> {
        for action in actions {
            if let Err(e) = self.step(action, ctx, trace) {
                if self.config.debug {
                    return Err(e.context(format!("'{}' failed", describe(action))));
                }
                let message = format!("{e:#}");
                let message = message.lines().next().unwrap_or_default().to_string();
                error!("'{}' failed: {message}", describe(action));
                let described = describe(action);
                let last = self.last_action.replace(described.clone());
                trace.push(TraceEntry {
                    action: described,
                    last_action: last,
                    outcome: Outcome::Failed(message),
                });
            }
        }
        Ok(())
    }

    fn step(&mut self, action: &Action, ctx: &mut Context, trace: &mut Vec<TraceEntry>) -> Result<()> {
        if let Action::Url { target } = action {
            let timeout = Duration::from_secs(self.config.wait_timeout_secs);
            driver::open(&mut *self.browser, target, timeout)?;
            let reply = match self.registry.handler(DEFAULT_ANALYSIS) {
                Some(h) => h.call(
                    self.config,
                    &mut *self.browser,
                    &Action::simple(DEFAULT_ANALYSIS, None),
                    ctx,
                )?,
                None => {
                    warn!("no '{DEFAULT_ANALYSIS}' action registered; '{target}' only navigated");
                    Reply::Nothing
                }
            };
            return self.absorb(action, reply, ctx, trace);
        }

        let name = action.name();
        let Some(handler) = self.registry.handler(name) else {
            match self.registry.suggest(name) {
                Some(s) => warn!("unknown action '@{name}', did you mean '@{s}'?"),
                None => warn!("unknown action '@{name}', skipped"),
            }
            return Ok(());
        };
        debug!("running {}", describe(action));
        let reply = handler.call(self.config, &mut *self.browser, action, ctx)?;
        self.absorb(action, reply, ctx, trace)
    }

    fn absorb(
        &mut self,
        action: &Action,
        reply: Reply,
        ctx: &mut Context,
        trace: &mut Vec<TraceEntry>,
    ) -> Result<()> {
        let described = describe(action);
        let last = self.last_action.replace(described.clone());
        match reply {
            Reply::Nothing => trace.push(TraceEntry {
                action: described,
                last_action: last,
                outcome: Outcome::Done,
            }),
            Reply::Record(v) => trace.push(TraceEntry {
                action: described,
                last_action: last,
                outcome: Outcome::Finding(v),
            }),
            Reply::Actions(list) => {
                debug!("{described} expands to {} action(s)", list.len());
                self.run_into(&list, ctx, trace)?;
            }
        }
        Ok(())
    }
}

fn describe(action: &Action) -> String {
    match action {
        Action::Url { target } => format!("direct url analyse for: {target}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RecordingBrowser;
    use crate::router::parse_str;
    use serde_json::json;

    fn run_script(
        src: &str,
        cfg: &Config,
        browser: &mut RecordingBrowser,
        ctx: &mut Context,
    ) -> Result<Vec<TraceEntry>> {
        let registry = ActionRegistry::standard()?;
        let actions = parse_str(src)?;
        let mut rt = Runtime::new(&registry, cfg, browser);
        rt.run(&actions, ctx)
    }

    /// Browser calls without the page-load waits that follow clicks.
    fn interactions(browser: &RecordingBrowser) -> Vec<&str> {
        browser
            .calls()
            .iter()
            .map(String::as_str)
            .filter(|c| *c != "wait_loaded")
            .collect()
    }

    #[test]
    fn end_to_end_branch_runs_once() -> Result<()> {
        let src = "@var: count=5\n@if: count > 3 {\n@log: \"big\"\n}\n@else: {\n@log: \"small\"\n}";
        let mut browser = RecordingBrowser::new();
        let mut ctx = Context::new();
        let trace = run_script(src, &Config::default(), &mut browser, &mut ctx)?;

        assert_eq!(ctx.get("count"), Some(&json!(5)));
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].action, "@var: count=5");
        assert_eq!(trace[1].action, "@log: \"big\"");
        assert_eq!(trace[1].last_action.as_deref().map(|s| s.starts_with("@if")), Some(true));
        assert_eq!(browser.calls(), &["script console.log(arguments[0]); [\"big\"]".to_string()]);
        Ok(())
    }

    #[test]
    fn only_the_selected_branch_executes() -> Result<()> {
        let src = "@if: x == 1 {\n@click: #a\n}\n@elif: x == 2 {\n@click: #b\n@click: #b2\n}\n@else: {\n@click: #c\n}\n";
        let mut browser = RecordingBrowser::new();
        let mut ctx = Context::from_json(json!({ "x": 2 }))?;
        let trace = run_script(src, &Config::default(), &mut browser, &mut ctx)?;
        assert_eq!(interactions(&browser), ["click #b", "click #b2"]);
        assert_eq!(trace.len(), 2);
        Ok(())
    }

    #[test]
    fn var_default_keeps_existing_values() -> Result<()> {
        let mut ctx = Context::new();
        run_script(
            "@var: a.b=1\n@var_default: a.b=2\n@var_default: a.c=3\n",
            &Config::default(),
            &mut RecordingBrowser::new(),
            &mut ctx,
        )?;
        assert_eq!(ctx.get_nested("a.b"), Some(&json!(1)));
        assert_eq!(ctx.get_nested("a.c"), Some(&json!(3)));
        Ok(())
    }

    #[test]
    fn failures_are_recorded_and_the_run_continues() -> Result<()> {
        let mut browser = RecordingBrowser::new().strict().with_elements("#ok", 1);
        let trace = run_script(
            "@click: #missing\n@if: nope {\n@back\n}\n@click: #ok\n",
            &Config::default(),
            &mut browser,
            &mut Context::new(),
        )?;
        assert_eq!(trace.len(), 3);
        assert!(matches!(&trace[0].outcome, Outcome::Failed(m) if m.contains("#missing")));
        assert!(matches!(&trace[1].outcome, Outcome::Failed(m) if m.contains("nope")));
        assert_eq!(trace[2].outcome, Outcome::Done);
        assert_eq!(interactions(&browser), ["click #ok"]);
        Ok(())
    }

    #[test]
    fn debug_mode_aborts_on_first_failure() -> Result<()> {
        let cfg = Config {
            debug: true,
            ..Config::default()
        };
        let mut browser = RecordingBrowser::new().strict();
        let result = run_script(
            "@if: true {\n@click: #missing\n}\n@back\n",
            &cfg,
            &mut browser,
            &mut Context::new(),
        );
        assert!(result.is_err());
        assert!(browser.calls().is_empty());
        Ok(())
    }

    #[test]
    fn unknown_actions_are_skipped() -> Result<()> {
        let mut browser = RecordingBrowser::new();
        let trace = run_script(
            "@navgate: /x\n@back\n",
            &Config::default(),
            &mut browser,
            &mut Context::new(),
        )?;
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].action, "@back");
        assert_eq!(trace[0].last_action, None);
        Ok(())
    }

    #[test]
    fn url_lines_navigate_then_analyse() -> Result<()> {
        let mut browser = RecordingBrowser::new()
            .with_url("https://site.test/")
            .with_title("https://site.test/about", "About us");
        let trace = run_script(
            "/about\n",
            &Config::default(),
            &mut browser,
            &mut Context::new(),
        )?;
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].action, "direct url analyse for: /about");
        match &trace[0].outcome {
            Outcome::Finding(v) => {
                assert_eq!(v["url"], "https://site.test/about");
                assert_eq!(v["title"], "About us");
            }
            other => panic!("expected a finding, got {other:?}"),
        }
        assert_eq!(browser.calls()[0], "navigate https://site.test/about");
        Ok(())
    }

    #[test]
    fn findings_carry_the_previous_action() -> Result<()> {
        let mut browser = RecordingBrowser::new().with_url("https://site.test/");
        let trace = run_script(
            "@navigate: /form\n@error: \"form is broken\"\n",
            &Config::default(),
            &mut browser,
            &mut Context::new(),
        )?;
        let finding = trace[1].to_json();
        assert_eq!(finding["error"], "form is broken");
        assert_eq!(finding["last_action"], "@navigate: /form");
        assert!(trace[1].is_reportable());
        assert!(!trace[0].is_reportable());
        Ok(())
    }

    #[test]
    fn iframe_blocks_switch_in_and_out() -> Result<()> {
        let mut browser = RecordingBrowser::new();
        run_script(
            "@iframe #frame {\n@click: #inside\n}\n@click: #outside\n",
            &Config::default(),
            &mut browser,
            &mut Context::new(),
        )?;
        assert_eq!(
            interactions(&browser),
            ["frame #frame", "click #inside", "frame top", "click #outside"]
        );
        Ok(())
    }
}
