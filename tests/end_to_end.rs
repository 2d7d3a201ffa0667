use std::fs;

use anyhow::Result;
use serde_json::{Value, json};

use a11ycheck::driver::RecordingBrowser;
use a11ycheck::interpreter::{self, RESULTS_FILE};
use a11ycheck::kernel::{ActionRegistry, Config, Context, Outcome, Runtime};
use a11ycheck::router;

fn interactions(browser: &RecordingBrowser) -> Vec<&str> {
    browser
        .calls()
        .iter()
        .map(String::as_str)
        .filter(|c| *c != "wait_loaded")
        .collect()
}

#[test]
fn included_files_run_in_place() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::create_dir(dir.path().join("parts"))?;
    fs::write(dir.path().join("parts/login.txt"), "@input: #user=${user}\n@click: #submit\n")?;
    fs::write(
        dir.path().join("main.txt"),
        "@var: user=\"alice\"\n@include: parts/login.txt\n@click: #logout\n",
    )?;

    let actions = router::parse_script_file(&dir.path().join("main.txt"), 20);
    let registry = ActionRegistry::standard()?;
    let cfg = Config::default();
    let mut browser = RecordingBrowser::new();
    let mut ctx = Context::new();
    Runtime::new(&registry, &cfg, &mut browser).run(&actions, &mut ctx)?;

    assert_eq!(
        interactions(&browser),
        ["send_keys #user=alice", "click #submit", "click #logout"]
    );
    Ok(())
}

#[test]
fn variables_set_in_a_branch_stay_visible() -> Result<()> {
    let src = "\
@var: mode=\"full\"
@if: mode == \"full\" and not present skip {
    @var: scanned.pages=2
}
@elif: mode contains \"quick\" {
    @var: scanned.pages=1
}
@if: scanned.pages >= 2 {
    @print: \"pages: ${scanned.pages}\"
    @var_default: scanned.pages=99
}
";
    let actions = router::parse_str(src)?;
    let registry = ActionRegistry::standard()?;
    let cfg = Config::default();
    let mut browser = RecordingBrowser::new();
    let mut ctx = Context::new();
    let trace = Runtime::new(&registry, &cfg, &mut browser).run(&actions, &mut ctx)?;

    assert_eq!(ctx.get_nested("scanned.pages"), Some(&json!(2)));
    assert!(trace.iter().all(|e| e.outcome == Outcome::Done));
    assert_eq!(trace.len(), 4);
    Ok(())
}

#[test]
fn condition_errors_do_not_stop_the_run() -> Result<()> {
    let src = "@if: count > \"x\" {\n@click: #a\n}\n@if: name matches /^al/ {\n@click: #b\n}\n";
    let actions = router::parse_str(src)?;
    let registry = ActionRegistry::standard()?;
    let cfg = Config::default();
    let mut browser = RecordingBrowser::new();
    let mut ctx = Context::from_json(json!({ "count": 3, "name": "alice" }))?;
    let trace = Runtime::new(&registry, &cfg, &mut browser).run(&actions, &mut ctx)?;

    assert!(matches!(trace[0].outcome, Outcome::Failed(_)));
    assert_eq!(interactions(&browser), ["click #b"]);
    Ok(())
}

#[test]
fn a_full_run_writes_the_results_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let script = dir.path().join("flow.txt");
    fs::write(
        &script,
        "\
@ignore: {
    image-alt
}
/about
@error: !#footer = \"footer missing\"
@click: #nowhere
",
    )?;
    let inputs = vec![
        "https://shop.test/".to_string(),
        format!("config:{}", script.display()),
    ];
    let cfg = Config {
        output: dir.path().join("out"),
        ..Config::default()
    };
    let actions = interpreter::parse_inputs(&inputs, cfg.max_include_depth);
    assert_eq!(actions.len(), 5);

    let registry = ActionRegistry::standard()?;
    let mut browser = RecordingBrowser::new().strict().with_title("https://shop.test/about", "About");
    let report = interpreter::check_run(&cfg, &registry, &mut browser, &actions, &mut Context::new())?;

    assert_eq!(report.base_url, "about:blank");
    assert_eq!(report.failures(), 1);

    let written: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("out").join(RESULTS_FILE))?)?;
    let inputs = written["inputs"].as_array().cloned().unwrap_or_default();
    assert_eq!(written["total_inputs"], inputs.len());
    assert_eq!(inputs.len(), 4);
    assert_eq!(inputs[0]["action"], "direct url analyse for: https://shop.test/");
    assert_eq!(inputs[1]["title"], "About");
    assert_eq!(inputs[2]["error"], "footer missing");
    assert_eq!(inputs[2]["last_action"], "direct url analyse for: /about");
    assert_eq!(inputs[3]["failed"], true);
    Ok(())
}
