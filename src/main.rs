use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use a11ycheck::driver::{Browser, RecordingBrowser, WebDriver};
use a11ycheck::error_style::render_parse_error;
use a11ycheck::interpreter;
use a11ycheck::kernel::ast::render_tree;
use a11ycheck::kernel::config::{self, BrowserKind, Config};
use a11ycheck::kernel::{ActionRegistry, Context};
use a11ycheck::packets::core::ignore::add_ignored;
use a11ycheck::router::{self, ParseError};

#[derive(Parser)]
#[command(name = "a11ycheck")]
#[command(about = "Scripted accessibility checks against a live browser")]
#[command(version)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run URLs and `config:<file>` scripts
    Run(RunArgs),
    /// Parse a script and print its action tree
    Check {
        file: PathBuf,
        #[arg(long)]
        max_include_depth: Option<usize>,
    },
    /// List the available actions, or show one in detail
    Actions { name: Option<String> },
}

#[derive(clap::Args)]
struct RunArgs {
    /// URLs, or script files written as `config:<path>`
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Stop at the first failing action
    #[arg(short, long)]
    debug: bool,

    #[arg(long)]
    max_include_depth: Option<usize>,

    /// Seed variables from a JSON, YAML or TOML file
    #[arg(long)]
    vars: Option<PathBuf>,

    /// Violation ids to ignore, one per line
    #[arg(long)]
    ignore_file: Option<PathBuf>,

    /// Record browser calls instead of driving a real browser
    #[arg(long)]
    dry_run: bool,

    /// WebDriver endpoint
    #[arg(long)]
    webdriver: Option<String>,

    /// chrome, edge or firefox
    #[arg(long)]
    browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Output directory for results and screenshots
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// URL visited before the inputs
    #[arg(long)]
    login: Option<String>,

    /// Skip writing the results file
    #[arg(long)]
    no_json: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Command::Run(args) => run(args),
        Command::Check {
            file,
            max_include_depth,
        } => check(file, max_include_depth),
        Command::Actions { name } => actions(name.as_deref()),
    }
}

fn apply_flags(cfg: &mut Config, args: &RunArgs) -> Result<()> {
    if args.debug {
        cfg.debug = true;
    }
    if let Some(n) = args.max_include_depth {
        cfg.max_include_depth = n;
    }
    if let Some(url) = &args.webdriver {
        cfg.webdriver_url = url.clone();
    }
    if let Some(name) = &args.browser {
        let Some(kind) = BrowserKind::parse(name) else {
            bail!("unknown browser '{name}' (use chrome, edge or firefox)");
        };
        cfg.browser = kind;
    }
    if args.headed {
        cfg.headless = false;
    }
    if let Some(dir) = &args.output {
        cfg.output = dir.clone();
    }
    if let Some(url) = &args.login {
        cfg.login = Some(url.clone());
    }
    if args.no_json {
        cfg.json = false;
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<ExitCode> {
    let root = interpreter::config_root(&args.inputs).or_else(|| std::env::current_dir().ok());
    let mut cfg = config::load(root.as_deref());
    apply_flags(&mut cfg, &args)?;

    let mut ctx = match &args.vars {
        Some(path) => interpreter::load_vars(path)?,
        None => Context::new(),
    };
    if let Some(path) = &args.ignore_file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read '{}'", path.display()))?;
        add_ignored(&mut ctx, text.lines());
    }

    let actions = interpreter::parse_inputs(&args.inputs, cfg.max_include_depth);
    if actions.is_empty() {
        warn!("nothing to run");
        return Ok(ExitCode::SUCCESS);
    }
    let registry = ActionRegistry::standard()?;

    let mut browser: Box<dyn Browser> = if args.dry_run {
        info!("dry run: browser calls are recorded, not performed");
        Box::new(RecordingBrowser::new())
    } else {
        Box::new(WebDriver::connect(&cfg)?)
    };

    let result = interpreter::check_run(&cfg, &registry, browser.as_mut(), &actions, &mut ctx);
    if let Err(e) = browser.quit() {
        warn!("closing the browser: {e:#}");
    }
    let report = result?;

    let findings = report.trace.iter().filter(|e| e.is_reportable()).count();
    info!(
        "{} action(s) run, {findings} result(s), {} failure(s)",
        report.trace.len(),
        report.failures()
    );
    Ok(ExitCode::SUCCESS)
}

fn check(file: PathBuf, max_include_depth: Option<usize>) -> Result<ExitCode> {
    let root = file.parent().map(PathBuf::from);
    let cfg = config::load(root.as_deref());
    let depth = max_include_depth.unwrap_or(cfg.max_include_depth);
    match router::parse_script_file_strict(&file, depth) {
        Ok(actions) => {
            print!("{}", render_tree(&actions));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => match e.downcast_ref::<ParseError>() {
            Some(parse) => {
                eprintln!("{}", render_parse_error(parse, std::io::stderr().is_terminal()));
                Ok(ExitCode::FAILURE)
            }
            None => Err(e),
        },
    }
}

fn actions(name: Option<&str>) -> Result<ExitCode> {
    let registry = ActionRegistry::standard()?;
    match name {
        None => {
            print!("{}", registry.render_list());
            Ok(ExitCode::SUCCESS)
        }
        Some(name) => match registry.render_entry(name.trim_start_matches('@')) {
            Some(entry) => {
                println!("{entry}");
                Ok(ExitCode::SUCCESS)
            }
            None => {
                match registry.suggest(name) {
                    Some(s) => eprintln!("unknown action '@{name}', did you mean '@{s}'?"),
                    None => eprintln!("unknown action '@{name}'"),
                }
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
