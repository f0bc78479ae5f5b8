use super::check_cmd::{check_file, format_tokens, FileCheck};
use super::run_cmd::{execute, prepare};
use super::*;
use crate::interpreter::MockConsole;
use crate::parser::tokenize;
use clap::Parser as _;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_parse_run_arguments() {
    let cli = Cli::try_parse_from(["omnia", "run", "app.omn", "--entry", "start", "-v"]).unwrap();
    assert!(cli.verbose);
    match cli.command {
        Command::Run { file, entry } => {
            assert_eq!(file, Some(PathBuf::from("app.omn")));
            assert_eq!(entry.as_deref(), Some("start"));
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_run_file_is_optional() {
    let cli = Cli::try_parse_from(["omnia", "run"]).unwrap();
    assert!(matches!(cli.command, Command::Run { file: None, entry: None }));
}

#[test]
fn test_check_defaults_to_current_directory() {
    let cli = Cli::try_parse_from(["omnia", "-q", "check", "--json"]).unwrap();
    assert!(cli.quiet);
    match cli.command {
        Command::Check { paths, json, ast } => {
            assert_eq!(paths, vec![PathBuf::from(".")]);
            assert!(json);
            assert!(!ast);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["omnia", "fmt"]).is_err());
}

#[test]
fn test_format_tokens() {
    let tokens = tokenize("let x = 1\nprint(x)", Path::new("t.omn")).unwrap();
    let text = format_tokens(&tokens);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 8);
    assert!(lines[0].starts_with("   1:1"));
    assert!(lines[0].ends_with("`let`"));
    assert!(lines[4].starts_with("   2:1"));
}

#[test]
fn test_collect_sources_filters_and_sorts() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "b.omn", "");
    write(dir.path(), "a.omn", "");
    write(dir.path(), "notes.txt", "");
    write(dir.path(), "nested/c.omn", "");
    write(dir.path(), ".hidden/d.omn", "");

    let found = collect_sources(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(
        found,
        vec![
            dir.path().join("a.omn"),
            dir.path().join("b.omn"),
            dir.path().join("nested/c.omn"),
        ]
    );
}

#[test]
fn test_collect_sources_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.omn");
    assert!(matches!(
        collect_sources(&[missing]),
        Err(CliError::Io { .. })
    ));
}

#[test]
fn test_check_file_reports_syntax_error() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "good.omn", "let x = 1\n");
    let bad = write(dir.path(), "bad.omn", "let = 1\n");

    assert!(matches!(check_file(&good).unwrap(), FileCheck::Ok(_)));
    match check_file(&bad).unwrap() {
        FileCheck::Failed { source, error } => {
            let rendered = render_syntax_error(&error, &source);
            assert!(rendered.contains(&error.diagnostic().code));
            assert!(rendered.contains("let = 1"));
        }
        FileCheck::Ok(_) => panic!("expected a syntax error"),
    }
}

#[test]
fn test_prepare_uses_manifest() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "omnia.toml",
        "[package]\nmain = \"app.omn\"\n[modules]\nsearch_paths = [\"lib\"]\n[runtime]\nentry = \"start\"\n",
    );
    write(dir.path(), "app.omn", "fun start(): print(\"hi\")\n");

    let plan = prepare(None, None, dir.path()).unwrap();
    assert_eq!(plan.file, dir.path().join("app.omn"));
    assert_eq!(plan.entry, "start");
    assert_eq!(
        plan.search_paths,
        vec![dir.path().to_path_buf(), dir.path().join("lib")]
    );

    let overridden = prepare(None, Some("other"), dir.path()).unwrap();
    assert_eq!(overridden.entry, "other");
}

#[test]
fn test_prepare_without_file_or_manifest() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        prepare(None, None, dir.path()),
        Err(CliError::Usage(_))
    ));
}

#[test]
fn test_prepare_renders_syntax_errors() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "broken.omn", "fun (:\n");
    let err = prepare(Some(&file), None, dir.path()).unwrap_err();
    assert!(err.is_rendered());
    assert!(err.to_string().contains("broken.omn"));
}

#[test]
fn test_execute_imports_sibling_modules() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "helpers.omn", "fun twice(x): return x * 2\n");
    let file = write(
        dir.path(),
        "main.omn",
        "import helpers\nfun main():\n    print(helpers.twice(21))\n",
    );

    let console = Arc::new(MockConsole::new());
    let plan = prepare(Some(&file), None, dir.path()).unwrap();
    execute(plan, console.clone()).unwrap();
    assert_eq!(console.lines(), vec!["42"]);
}

#[test]
fn test_execute_reports_uncaught_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "fail.omn", "print(\"before\")\nthrow \"boom\"\n");

    let console = Arc::new(MockConsole::new());
    let plan = prepare(Some(&file), None, dir.path()).unwrap();
    let err = execute(plan, console.clone()).unwrap_err();
    assert_eq!(console.lines(), vec!["before"]);
    match err {
        CliError::Runtime(report) => {
            assert!(report.starts_with("Error: boom"), "{}", report);
            assert!(report.contains("fail.omn:2"), "{}", report);
        }
        other => panic!("unexpected error {:?}", other),
    }
}
