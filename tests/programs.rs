//! End-to-end tests running the programs under `demos/`
//!
//! Each program is parsed from disk and run against a capturing console,
//! the same way `omnia run` drives the interpreter.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use omnia::interpreter::concurrency::SPAWN_STACK_SIZE;
use omnia::interpreter::{FileModuleLoader, Interpreter, MockConsole, RuntimeError};
use omnia::manifest::Project;
use omnia::parser::{parse_file, parse_source};
use pretty_assertions::assert_eq;

fn demos_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos")
}

/// Run a program file on a large stack, returning its output lines
fn run_file(path: &Path, entry: &str) -> (Result<(), RuntimeError>, Vec<String>) {
    let (_, program) = parse_file(path).unwrap();
    let search_paths = vec![path.parent().unwrap().to_path_buf()];
    let entry = entry.to_string();
    let console = Arc::new(MockConsole::new());
    let shared = console.clone();

    let result = std::thread::Builder::new()
        .stack_size(SPAWN_STACK_SIZE)
        .spawn(move || {
            let mut interpreter = Interpreter::new()
                .with_console(shared)
                .with_loader(Arc::new(FileModuleLoader::new(search_paths)))
                .with_entry(entry);
            interpreter.run_program(&program).map(|_| ())
        })
        .unwrap()
        .join()
        .unwrap();

    (result, console.lines())
}

#[test]
fn showcase_program_output() {
    let (result, lines) = run_file(&demos_dir().join("showcase.omn"), "main");
    result.unwrap();

    let expected = vec![
        "=== Test Variables et Opérations ===",
        "x = 10, y = 20",
        "Somme (x+y): 30",
        "Produit via lambda (x * y): 200",
        "Variadic sum (1,2,3): 6",
        "=== Test Fonctions utilitaires ===",
        "Doubled: [2, 4, 6, 8, 10]",
        "Evens: [2, 4]",
        "Total: 15",
        "=== Test Comprehensions ===",
        "Squares: [4, 16, 36, 64]",
        "Mapping: {6: 6, 7: 7, 8: 8, 9: 9}",
        "=== Test Expression conditionnelle ===",
        "Status: x est inférieur ou égal",
        "=== Boucle while (count_to) ===",
        "i = 0",
        "i = 1",
        "i = 2",
        "i = 3",
        "i = 4",
        "=== Test Try/Catch/Finally ===",
        "Opération de division terminée",
        "Division (10/2): 5.0",
        "Erreur: division by zero",
        "Opération de division terminée",
        "Division (10/0): 0",
        "=== Test Acteurs (Concurrence) ===",
        "Message reçu: Message 2",
        "Message reçu: Message 1",
        "=== Test Threads ===",
        "Thread 1: Tâche 1 terminée",
        "Thread 2: Tâche 2 terminée",
        "=== Test Programmation Orientée Objet ===",
        "Le chien Rex aboie: Woof!",
        "Norme du point: 5.0",
        "=== Test Expression Lambda (fonction anonyme) ===",
        "adder(5,7): 12",
        "=== Test Modules ===",
        "math.sqrt(16) = 4.0",
        "u.shout: OMNIA!",
        "u.clamp(15, 0, 10) = 10",
    ];
    assert_eq!(lines, expected);
}

#[test]
fn showcase_runs_identically_twice() {
    let path = demos_dir().join("showcase.omn");
    let (_, first) = run_file(&path, "main");
    let (_, second) = run_file(&path, "main");
    assert_eq!(first, second);
}

#[test]
fn demos_manifest_points_at_showcase() {
    let project = Project::discover(None, &demos_dir()).unwrap().unwrap();
    assert_eq!(project.manifest.package.name.as_deref(), Some("showcase"));
    assert_eq!(project.main_file(), Some(demos_dir().join("showcase.omn")));
    assert_eq!(project.manifest.entry(), "main");
}

#[test]
fn every_demo_parses() {
    for entry in std::fs::read_dir(demos_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|ext| ext == "omn") {
            let source = std::fs::read_to_string(&path).unwrap();
            if let Err(err) = parse_source(&source, &path) {
                panic!("{} failed to parse: {}", path.display(), err);
            }
        }
    }
}

#[test]
fn uncaught_error_reports_kind_and_location() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crash.omn");
    std::fs::write(
        &path,
        "fun main():\n{\n    print(\"start\")\n    let items = [1, 2]\n    print(items[5])\n}\n",
    )
    .unwrap();

    let (result, lines) = run_file(&path, "main");
    assert_eq!(lines, vec!["start"]);
    let err = result.unwrap_err();
    assert_eq!(err.kind.name(), "TypeError");
    assert!(err.message.contains("out of bounds"), "{}", err.message);
    assert!(err.report().contains("crash.omn:5"), "{}", err.report());
}
