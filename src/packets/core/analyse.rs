use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::driver::{self, Browser};
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::core::ignore::ignored_ids;
use crate::packets::util::{is_quoted, json_object, param};

// Shared by the page scripts below: a short CSS path for an element.
const DESCRIBE_FN: &str = r#"
const describe = el => {
    if (el.id) return '#' + el.id;
    let s = el.tagName.toLowerCase();
    if (typeof el.className === 'string' && el.className.trim()) {
        s += '.' + el.className.trim().split(/\s+/).join('.');
    }
    return s;
};
"#;

// Built-in page scan: returns [{id, selector, description}].
const SCAN_BODY: &str = r#"
const out = [];
document.querySelectorAll('img:not([alt])').forEach(el =>
    out.push({ id: 'image-alt', selector: describe(el), description: 'Image has no alt attribute' }));
document.querySelectorAll('input:not([type=hidden]):not([type=submit]):not([type=button]):not([type=image]), select, textarea')
    .forEach(el => {
        const labelled = el.getAttribute('aria-label') || el.getAttribute('aria-labelledby') || el.title
            || (el.id && document.querySelector('label[for="' + el.id + '"]')) || el.closest('label');
        if (!labelled) out.push({ id: 'label', selector: describe(el), description: 'Form control has no label' });
    });
if (!document.documentElement.getAttribute('lang'))
    out.push({ id: 'html-has-lang', selector: 'html', description: 'Document has no lang attribute' });
if (!document.title.trim())
    out.push({ id: 'document-title', selector: 'title', description: 'Document has no title' });
return out;
"#;

// arguments: context selector or null, axe options, callback.
// Answers {violations: [{id, impact, description, help, nodes}]} or {error}.
const AXE_SCRIPT: &str = r#"
const [context, options] = arguments;
const done = arguments[arguments.length - 1];
if (!window.axe) {
    done({ error: 'axe-core is not loaded on this page' });
    return;
}
axe.run(context || document, options || {})
    .then(r => done({ violations: r.violations.map(v => ({
        id: v.id,
        impact: v.impact,
        description: v.description,
        help: v.helpUrl,
        nodes: v.nodes.map(n => [].concat(n.target).join(' ')),
    })) }))
    .catch(e => done({ error: String(e) }));
"#;

// arguments: selector, minimum ratio. WCAG 2 relative luminance of the
// computed text colour against the first opaque ancestor background.
const CONTRAST_BODY: &str = r#"
const [selector, threshold] = arguments;
const parse = c => {
    const m = /rgba?\(([^)]+)\)/.exec(c || '');
    if (!m) return null;
    const p = m[1].split(/[\s,\/]+/).filter(Boolean).map(parseFloat);
    return { r: p[0], g: p[1], b: p[2], a: p.length > 3 ? p[3] : 1 };
};
const channel = v => {
    v /= 255;
    return v <= 0.03928 ? v / 12.92 : Math.pow((v + 0.055) / 1.055, 2.4);
};
const luminance = c => 0.2126 * channel(c.r) + 0.7152 * channel(c.g) + 0.0722 * channel(c.b);
const background = el => {
    for (let n = el; n; n = n.parentElement) {
        const c = parse(getComputedStyle(n).backgroundColor);
        if (c && c.a > 0) return c;
    }
    return { r: 255, g: 255, b: 255, a: 1 };
};
const out = [];
document.querySelectorAll(selector).forEach(el => {
    if (!el.offsetWidth && !el.offsetHeight) return;
    const fg = parse(getComputedStyle(el).color);
    if (!fg) return;
    const [hi, lo] = [luminance(fg), luminance(background(el))].sort((a, b) => b - a);
    const ratio = (hi + 0.05) / (lo + 0.05);
    if (ratio < threshold) {
        out.push({
            id: 'color-contrast',
            selector: describe(el),
            ratio: Math.round(ratio * 100) / 100,
            description: 'Contrast ratio ' + ratio.toFixed(2) + ' is below ' + threshold,
        });
    }
});
return out;
"#;

const DEFAULT_CONTRAST_SELECTOR: &str = "a, button:not([disabled])";
const DEFAULT_CONTRAST_THRESHOLD: f64 = 4.5;

fn violation_id(v: &Value) -> Option<&str> {
    v.get("id").and_then(Value::as_str)
}

fn drop_ignored(found: Vec<Value>, ctx: &Context) -> Vec<Value> {
    let ignored = ignored_ids(ctx);
    let total = found.len();
    let kept: Vec<Value> = found
        .into_iter()
        .filter(|v| !violation_id(v).is_some_and(|id| ignored.iter().any(|i| i == id)))
        .collect();
    debug!("{} violation(s), {} ignored", kept.len(), total - kept.len());
    kept
}

fn as_list(v: Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

/// Runs the page scan and drops violations listed in the context ignore list.
pub fn scan(browser: &mut dyn Browser, ctx: &Context) -> Result<Vec<Value>> {
    let found = browser.execute_script(&format!("{DESCRIBE_FN}{SCAN_BODY}"), vec![])?;
    Ok(drop_ignored(as_list(found), ctx))
}

fn report(browser: &mut dyn Browser, checker: &str, title: Option<String>, violations: Vec<Value>) -> Result<Reply> {
    let url = browser.current_url()?;
    let title = match title {
        Some(t) => t,
        None => browser.title()?,
    };
    info!("{checker}: {} violation(s) on '{url}'", violations.len());
    Ok(Reply::Record(json!({
        "type": "analysis",
        "checker": checker,
        "url": url,
        "title": title,
        "failed": !violations.is_empty(),
        "violations": violations,
    })))
}

/// JSON options of `@analyse_axe` / `@analyse_contrast`; no param means
/// defaults, anything but an object is an error.
fn options(action: &Action, example: &str) -> Result<Map<String, Value>> {
    if param(action).is_none() {
        return Ok(Map::new());
    }
    match json_object(action) {
        Some(Value::Object(map)) => Ok(map),
        _ => bail!("@{} expects a JSON object, e.g. {example}", action.name()),
    }
}

/// Maps `@analyse_axe` settings onto `(context, axe.run options)`.
pub fn axe_run_options(settings: &Map<String, Value>) -> Result<(Value, Value)> {
    let context = match settings.get("context") {
        None | Some(Value::Null) => Value::Null,
        Some(Value::String(sel)) => json!(sel),
        Some(other) => bail!("'context' must be a selector string, got {other}"),
    };
    let mut run = json!({ "resultTypes": ["violations", "incomplete"] });
    let tags: Vec<String> = match settings.get("axe_rules") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(list)) => list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|t| match t {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(anyhow!("'axe_rules' entries must be strings, got {other}")),
            })
            .collect::<Result<_>>()?,
        Some(other) => bail!("'axe_rules' must be a list or a comma separated string, got {other}"),
    };
    if !tags.is_empty() {
        run["runOnly"] = json!({ "type": "tag", "values": tags });
    }
    match settings.get("options") {
        None | Some(Value::Null) => {}
        Some(Value::Object(extra)) => {
            for (k, v) in extra {
                run[k.as_str()] = v.clone();
            }
        }
        Some(other) => bail!("'options' must be an object, got {other}"),
    }
    Ok((context, run))
}

pub fn handle(cfg: &Config, browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let mut title = None;
    match param(action) {
        Some(p) if is_quoted(p) => title = Some(p[1..p.len() - 1].to_string()),
        Some(target) => {
            let (w, h) = cfg.resolution;
            browser.set_window_size(w, h)?;
            driver::open(browser, &ctx.resolve_vars(target), Duration::from_secs(cfg.wait_timeout_secs))?;
            browser.fit_window_to_content()?;
        }
        None => {}
    }
    let violations = scan(browser, ctx)?;
    report(browser, "scan", title, violations)
}

pub fn handle_axe(_cfg: &Config, browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let settings = options(action, "{\"axe_rules\": [\"wcag2aa\"]}")?;
    let (context, run) = axe_run_options(&settings)?;
    debug!("axe.run options: {run}");
    let answer = browser.execute_async_script(AXE_SCRIPT, vec![context, run])?;
    if let Some(err) = answer.get("error") {
        bail!("axe check failed: {}", err.as_str().unwrap_or("unknown error"));
    }
    let Some(found) = answer.get("violations").cloned() else {
        bail!("axe check returned no result");
    };
    let violations = drop_ignored(as_list(found), ctx);
    report(browser, "axe", None, violations)
}

pub fn handle_contrast(_cfg: &Config, browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let settings = options(action, "{\"contrast_threshold\": 4.5}")?;
    let selector = match settings.get("selector") {
        None | Some(Value::Null) => DEFAULT_CONTRAST_SELECTOR.to_string(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(other) => bail!("'selector' must be a non-empty string, got {other}"),
    };
    let threshold = match settings.get("contrast_threshold") {
        None | Some(Value::Null) => DEFAULT_CONTRAST_THRESHOLD,
        Some(v) => match v.as_f64() {
            Some(t) if t > 0.0 => t,
            _ => bail!("'contrast_threshold' must be a positive number, got {v}"),
        },
    };
    let found = browser.execute_script(
        &format!("{DESCRIBE_FN}{CONTRAST_BODY}"),
        vec![json!(selector), json!(threshold)],
    )?;
    let violations = drop_ignored(as_list(found), ctx);
    report(browser, "contrast", None, violations)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["analyse", "analyze"],
        handler: Handler::Contextual(handle),
        syntax: "@analyse [\"<report title>\" | <url>]",
        summary: "Check the current page (or first open <url>) for missing alt text, unlabeled controls, language and title.",
        example: "@analyse\n@analyse: \"Login page\"\n@analyse: /settings",
    })?;
    b.register(ActionSpec {
        names: &["analyse_axe", "analyze_axe"],
        handler: Handler::Contextual(handle_axe),
        syntax: "@analyse_axe[: {<options>}]",
        summary: "Run axe-core on the current page. Options: axe_rules (tags), context (selector), options (passed to axe.run).",
        example: "@analyse_axe\n@analyse_axe: {\"axe_rules\": [\"wcag2aa\", \"wcag21aa\"]}\n@analyse_axe: {\"context\": \"#main\"}",
    })?;
    b.register(ActionSpec {
        names: &["analyse_contrast", "analyze_contrast"],
        handler: Handler::Contextual(handle_contrast),
        syntax: "@analyse_contrast[: {<options>}]",
        summary: "Check text contrast of matching elements. Options: selector, contrast_threshold (default 4.5).",
        example: "@analyse_contrast\n@analyse_contrast: {\"contrast_threshold\": 7, \"selector\": \"a, button:not([disabled])\"}",
    })?;
    Ok(())
}
