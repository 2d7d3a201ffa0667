use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::debug;

use crate::driver::Browser;
use crate::kernel::ast::Action;
use crate::kernel::config::{Config, parse_resolution};
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};
use crate::packets::util::{param, require_param, split_key_value};

pub const PRESETS: &[(&str, (u32, u32))] = &[
    ("mobile", (375, 667)),
    ("mobile_landscape", (667, 375)),
    ("tablet", (768, 1024)),
    ("tablet_landscape", (1024, 768)),
    ("desktop", (1920, 1080)),
];

fn resize(_cfg: &Config, browser: &mut dyn Browser, action: &Action) -> Result<Reply> {
    let size = match param(action) {
        None | Some("full") => {
            browser.fit_window_to_content()?;
            return Ok(Reply::Nothing);
        }
        Some(p) => PRESETS
            .iter()
            .find(|(name, _)| *name == p)
            .map(|(_, size)| *size)
            .or_else(|| parse_resolution(p))
            .ok_or_else(|| anyhow!("invalid size '{p}', expected <width>x<height>, a preset or 'full'"))?,
    };
    let (w, h) = size;
    debug!("resizing window to {w}x{h}");
    browser.set_window_size(w, h)?;
    Ok(Reply::Nothing)
}

/// `<output>/screenshots/<file>.png`
pub fn screenshot_path(cfg: &Config, file: &str) -> PathBuf {
    let mut name = file.trim().trim_matches('"').to_string();
    if !name.to_ascii_lowercase().ends_with(".png") {
        name.push_str(".png");
    }
    cfg.output.join("screenshots").join(name)
}

fn screenshot(cfg: &Config, browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let param = ctx.resolve_vars(require_param(action, "<file>[=<selector>]")?);
    let (file, selector) = match split_key_value(&param) {
        Some((file, sel)) if !sel.is_empty() => (file.to_string(), Some(sel.to_string())),
        Some((file, _)) => (file.to_string(), None),
        None => (param.clone(), None),
    };
    let path = screenshot_path(cfg, &file);
    debug!(
        "screenshot of '{}' to {}",
        selector.as_deref().unwrap_or("page"),
        path.display()
    );
    browser.screenshot(&path, selector.as_deref())?;
    Ok(Reply::Nothing)
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["resize"],
        handler: Handler::Simple(resize),
        syntax: "@resize: <width>x<height> | mobile | mobile_landscape | tablet | tablet_landscape | desktop | full",
        summary: "Resize the browser window; 'full' grows it to fit the whole page.",
        example: "@resize: 1024x768\n@resize: mobile\n@resize: full",
    })?
    .register(ActionSpec {
        names: &["screenshot"],
        handler: Handler::Contextual(screenshot),
        syntax: "@screenshot: <file>[=<selector>]",
        summary: "Save a PNG of the page or of one element under <output>/screenshots.",
        example: "@screenshot: start\n@screenshot: header.png=#header",
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RecordingBrowser;
    use crate::kernel::ast::Params;

    fn line(name: &str, p: &str) -> Action {
        Action::simple(name, Some(Params::Line(p.into())))
    }

    #[test]
    fn presets_sizes_and_full() -> Result<()> {
        let mut b = RecordingBrowser::new();
        let cfg = Config::default();
        resize(&cfg, &mut b, &line("resize", "tablet_landscape"))?;
        assert_eq!(b.window(), (1024, 768));
        resize(&cfg, &mut b, &line("resize", "800x600"))?;
        assert_eq!(b.window(), (800, 600));
        resize(&cfg, &mut b, &line("resize", "full"))?;
        assert_eq!(b.calls().last().map(String::as_str), Some("fit_window"));
        assert!(resize(&cfg, &mut b, &line("resize", "huge")).is_err());
        Ok(())
    }

    #[test]
    fn screenshots_land_in_the_output_folder() -> Result<()> {
        let mut b = RecordingBrowser::new();
        let cfg = Config {
            output: PathBuf::from("out"),
            ..Config::default()
        };
        let mut ctx = Context::new();
        screenshot(&cfg, &mut b, &line("screenshot", "start"), &mut ctx)?;
        screenshot(&cfg, &mut b, &line("screenshot", "head.png=#header"), &mut ctx)?;
        let expected_page = format!("screenshot {}", PathBuf::from("out/screenshots/start.png").display());
        let expected_el = format!(
            "screenshot {}=#header",
            PathBuf::from("out/screenshots/head.png").display()
        );
        assert_eq!(b.calls(), &[expected_page, expected_el]);
        Ok(())
    }
}
