//! Handler for the `omnia run` subcommand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::interpreter::concurrency::SPAWN_STACK_SIZE;
use crate::interpreter::{Console, FileModuleLoader, Interpreter, StdoutConsole, Value};
use crate::manifest::Project;
use crate::parser::{parse_source, Program};

use super::{render_syntax_error, CliError};

/// Everything needed to start a program, resolved from arguments and omnia.toml
#[derive(Debug)]
pub(crate) struct RunPlan {
    pub(crate) file: PathBuf,
    pub(crate) program: Program,
    pub(crate) search_paths: Vec<PathBuf>,
    pub(crate) entry: String,
}

pub(crate) fn run_program(file: Option<&Path>, entry: Option<&str>) -> Result<(), CliError> {
    let cwd = std::env::current_dir().map_err(|e| CliError::io(Path::new("."), e))?;
    let plan = prepare(file, entry, &cwd)?;
    execute(plan, Arc::new(StdoutConsole)).map(|_| ())
}

/// Resolve the program file, parse it and work out module paths and entry.
///
/// An explicit file wins over `package.main`; an explicit entry wins over
/// `runtime.entry`.
pub(crate) fn prepare(
    file: Option<&Path>,
    entry: Option<&str>,
    cwd: &Path,
) -> Result<RunPlan, CliError> {
    let project = Project::discover(file, cwd)?;

    let file = match (file, &project) {
        (Some(file), _) => file.to_path_buf(),
        (None, Some(project)) => project.main_file().ok_or_else(|| {
            CliError::Usage(
                "no FILE given and omnia.toml does not set package.main".to_string(),
            )
        })?,
        (None, None) => {
            return Err(CliError::Usage(
                "no FILE given and no omnia.toml found".to_string(),
            ))
        }
    };

    let source = std::fs::read_to_string(&file).map_err(|e| CliError::io(&file, e))?;
    let program = parse_source(&source, &file).map_err(|e| CliError::Syntax {
        rendered: render_syntax_error(&e, &source),
    })?;

    let mut loader = FileModuleLoader::default();
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => loader.add_search_path(dir),
        _ => loader.add_search_path(cwd),
    }
    for path in project.iter().flat_map(Project::search_paths) {
        loader.add_search_path(path);
    }

    let entry = entry
        .map(str::to_string)
        .or_else(|| project.as_ref().map(|p| p.manifest.entry().to_string()))
        .unwrap_or_else(|| crate::interpreter::DEFAULT_ENTRY.to_string());

    Ok(RunPlan {
        file,
        program,
        search_paths: loader.search_paths().to_vec(),
        entry,
    })
}

/// Run a prepared program on a thread with a large stack
pub(crate) fn execute(plan: RunPlan, console: Arc<dyn Console>) -> Result<Value, CliError> {
    tracing::debug!(
        file = %plan.file.display(),
        entry = %plan.entry,
        search_paths = plan.search_paths.len(),
        "running program"
    );

    let RunPlan {
        program,
        search_paths,
        entry,
        ..
    } = plan;

    let handle = std::thread::Builder::new()
        .name("omnia-main".to_string())
        .stack_size(SPAWN_STACK_SIZE)
        .spawn(move || {
            let mut interpreter = Interpreter::new()
                .with_console(console)
                .with_loader(Arc::new(FileModuleLoader::new(search_paths)))
                .with_entry(entry);
            interpreter.run_program(&program)
        })
        .map_err(|e| CliError::Runtime(format!("could not start interpreter: {}", e)))?;

    let outcome = handle
        .join()
        .map_err(|_| CliError::Runtime("interpreter thread panicked".to_string()))?;

    outcome.map_err(|err| CliError::Runtime(err.report()))
}
