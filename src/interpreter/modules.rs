//! Module loading and resolution for the Omnia interpreter.
//!
//! `import name` asks a [`ModuleLoader`] for the module's source. Native
//! modules arrive as ready export tables; source modules are parsed and run
//! once in a fresh top-level scope whose bindings become the exports.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::builtins::math_exports;
use super::environment::Environment;
use super::error::RuntimeError;
use super::value::Value;
use super::Interpreter;

/// What a loader found for a module name
#[derive(Debug, Clone)]
pub enum ModuleSource {
    Native(Vec<(String, Value)>),
    Source { path: PathBuf, text: String },
}

/// Resolves `import` names; shared by every thread of a program
pub trait ModuleLoader: Send + Sync {
    fn resolve_module(&self, name: &str) -> Option<ModuleSource>;
}

/// Native `math` plus `<name>.omn` files found in the search paths.
/// Dotted names map to nested directories: `a.b` is `a/b.omn`.
#[derive(Debug, Clone, Default)]
pub struct FileModuleLoader {
    search_paths: Vec<PathBuf>,
}

impl FileModuleLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn find_file(&self, name: &str) -> Option<PathBuf> {
        let relative = name.split('.').collect::<Vec<_>>().join("/") + ".omn";
        self.search_paths
            .iter()
            .map(|dir| dir.join(&relative))
            .chain(std::iter::once(PathBuf::from(&relative)))
            .find(|candidate| candidate.is_file())
    }
}

impl ModuleLoader for FileModuleLoader {
    fn resolve_module(&self, name: &str) -> Option<ModuleSource> {
        if name == "math" {
            return Some(ModuleSource::Native(math_exports()));
        }
        let path = self.find_file(name)?;
        let text = std::fs::read_to_string(&path).ok()?;
        Some(ModuleSource::Source { path, text })
    }
}

/// The value bound by `import`
#[derive(Debug)]
pub struct ModuleValue {
    pub name: String,
    pub exports: HashMap<String, Value>,
}

impl ModuleValue {
    pub fn get(&self, member: &str) -> Result<Value, RuntimeError> {
        self.exports.get(member).cloned().ok_or_else(|| {
            RuntimeError::import(format!(
                "module `{}` has no member `{}`",
                self.name, member
            ))
        })
    }
}

static NEXT_UNIT: AtomicUsize = AtomicUsize::new(1);

/// Fresh id for an execution unit (the main interpreter or a spawned thread)
pub(super) fn next_unit_id() -> usize {
    NEXT_UNIT.fetch_add(1, Ordering::Relaxed)
}

/// Modules shared by every thread of a program.
///
/// A module is evaluated by one execution unit; other units importing it
/// meanwhile wait on `ready` until it is loaded.
#[derive(Debug, Default)]
pub struct ModuleCache {
    state: Mutex<CacheState>,
    ready: Condvar,
}

#[derive(Debug, Default)]
struct CacheState {
    loaded: HashMap<String, Arc<ModuleValue>>,
    /// Module name to the unit evaluating it
    in_flight: HashMap<String, usize>,
    /// Unit to the module it is waiting for
    waiting: HashMap<usize, String>,
}

impl CacheState {
    /// Whether `unit` waiting on a module owned by `owner` would close a
    /// loop of units waiting on each other
    fn closes_loop(&self, owner: usize, unit: usize) -> bool {
        let mut current = owner;
        for _ in 0..=self.waiting.len() {
            if current == unit {
                return true;
            }
            match self
                .waiting
                .get(&current)
                .and_then(|module| self.in_flight.get(module))
            {
                Some(&next) => current = next,
                None => return false,
            }
        }
        false
    }
}

/// `chain` is this thread's import stack from the first load of `name`;
/// it is empty when the loop runs through other threads
fn cyclic(name: &str, chain: &[String]) -> RuntimeError {
    if chain.is_empty() {
        return RuntimeError::import(format!(
            "cyclic import of module `{}` across threads",
            name
        ));
    }
    let mut path = chain.to_vec();
    path.push(name.to_string());
    RuntimeError::import(format!(
        "cyclic import of module `{}` ({})",
        name,
        path.join(" -> ")
    ))
}

impl Interpreter {
    /// Import a module by name, evaluating it at most once per program
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn import_module(&mut self, name: &str) -> Result<Arc<ModuleValue>, RuntimeError> {
        if let Some(start) = self.importing.iter().position(|m| m == name) {
            return Err(cyclic(name, &self.importing[start..]));
        }

        {
            let mut state = self.modules.state.lock();
            loop {
                if let Some(module) = state.loaded.get(name) {
                    return Ok(Arc::clone(module));
                }
                let owner = match state.in_flight.get(name).copied() {
                    Some(owner) => owner,
                    None => {
                        state.in_flight.insert(name.to_string(), self.unit);
                        break;
                    }
                };
                if state.closes_loop(owner, self.unit) {
                    return Err(cyclic(name, &[]));
                }
                tracing::debug!(module = name, owner, "waiting for module");
                state.waiting.insert(self.unit, name.to_string());
                self.modules.ready.wait(&mut state);
                state.waiting.remove(&self.unit);
            }
        }

        self.importing.push(name.to_string());
        let result = self.load_module(name);
        self.importing.pop();

        let mut state = self.modules.state.lock();
        state.in_flight.remove(name);
        let outcome = result.map(|module| {
            let module = Arc::new(module);
            state.loaded.insert(name.to_string(), Arc::clone(&module));
            tracing::debug!(module = name, exports = module.exports.len(), "module loaded");
            module
        });
        drop(state);
        self.modules.ready.notify_all();
        outcome
    }

    fn load_module(&mut self, name: &str) -> Result<ModuleValue, RuntimeError> {
        let source = self
            .loader
            .resolve_module(name)
            .ok_or_else(|| RuntimeError::import(format!("module `{}` not found", name)))?;

        let exports = match source {
            ModuleSource::Native(exports) => exports.into_iter().collect(),
            ModuleSource::Source { path, text } => self.eval_module_source(name, &path, &text)?,
        };

        Ok(ModuleValue {
            name: name.to_string(),
            exports,
        })
    }

    fn eval_module_source(
        &mut self,
        name: &str,
        path: &Path,
        text: &str,
    ) -> Result<HashMap<String, Value>, RuntimeError> {
        let program = crate::parser::parse_source(text, path).map_err(|e| {
            let diag = e.diagnostic();
            RuntimeError::import(format!(
                "module `{}` failed to parse: {} at {}",
                name,
                diag.message,
                diag.span.location()
            ))
        })?;

        let scope = Environment::child(&self.prelude);
        let saved_owner = self.current_owner.take();
        let result = self.exec_block(&program.stmts, &scope);
        self.current_owner = saved_owner;
        result.map_err(|unwind| unwind.into_error())?;

        Ok(scope.local_bindings().into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_is_native() {
        let loader = FileModuleLoader::default();
        let Some(ModuleSource::Native(exports)) = loader.resolve_module("math") else {
            panic!("math should be native");
        };
        let names: Vec<&str> = exports.iter().map(|(n, _)| n.as_str()).collect();
        for expected in ["sqrt", "abs", "pow", "floor", "ceil", "pi", "e"] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_file_lookup_in_search_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("util.omn"), "let answer = 42").unwrap();
        std::fs::write(dir.path().join("pkg").join("inner.omn"), "let x = 1").unwrap();

        let mut loader = FileModuleLoader::default();
        loader.add_search_path(dir.path());
        loader.add_search_path(dir.path());
        assert_eq!(loader.search_paths().len(), 1);

        match loader.resolve_module("util") {
            Some(ModuleSource::Source { text, .. }) => assert_eq!(text, "let answer = 42"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            loader.resolve_module("pkg.inner"),
            Some(ModuleSource::Source { .. })
        ));
        assert!(loader.resolve_module("missing_module_xyz").is_none());
    }
}
