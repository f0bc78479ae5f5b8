//! Tree-walking interpreter for Omnia programs
//!
//! Statements and expressions evaluate to `EvalResult`, whose error side
//! carries both runtime errors and the `return`/`break`/`continue` signals.
//! Scopes, containers and the struct registry are shared behind `Arc`s so
//! `spawn` can hand a forked interpreter to another thread.

pub mod builtins;
pub mod concurrency;
pub mod console;
pub mod environment;
pub mod error;
mod methods;
pub mod modules;
pub mod objects;
pub mod value;


use std::sync::Arc;

use parking_lot::RwLock;

use crate::parser::ast::*;

pub use concurrency::ThreadHandle;
pub use console::{Console, MockConsole, StdoutConsole};
pub use environment::Environment;
pub use error::{ErrorKind, EvalResult, RuntimeError, Unwind};
pub use modules::{FileModuleLoader, ModuleLoader, ModuleSource};
pub use value::Value;

use modules::ModuleCache;
use objects::{Registry, StructId};
use value::{
    binary_op, container_id, format_value, iterate, map_get, map_insert, map_set, normalize_index,
    Function,
};

/// Nesting limit for function calls on one thread
pub const MAX_CALL_DEPTH: usize = 1024;

/// Entry function called after the top-level statements
pub const DEFAULT_ENTRY: &str = "main";

/// Interpreter state for one thread of a program
pub struct Interpreter {
    registry: Arc<RwLock<Registry>>,
    /// Built-in functions; parent of the global scope and of module scopes
    prelude: Arc<Environment>,
    globals: Arc<Environment>,
    console: Arc<dyn Console>,
    loader: Arc<dyn ModuleLoader>,
    modules: Arc<ModuleCache>,
    /// Identifies this thread of the program to the module cache
    unit: usize,
    /// Modules this thread is evaluating, outermost first
    importing: Vec<String>,
    entry: String,
    /// Struct whose method is executing, for visibility checks
    current_owner: Option<StructId>,
    call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create an interpreter printing to stdout and loading modules from the
    /// working directory
    pub fn new() -> Self {
        let prelude = Environment::new();
        builtins::install_globals(&prelude);
        let globals = Environment::child(&prelude);
        Self {
            registry: Arc::new(RwLock::new(Registry::new())),
            prelude,
            globals,
            console: Arc::new(StdoutConsole),
            loader: Arc::new(FileModuleLoader::default()),
            modules: Arc::new(ModuleCache::default()),
            unit: modules::next_unit_id(),
            importing: Vec::new(),
            entry: DEFAULT_ENTRY.to_string(),
            current_owner: None,
            call_depth: 0,
        }
    }

    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Name of the function called after the top-level statements
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    pub fn console(&self) -> &dyn Console {
        self.console.as_ref()
    }

    pub fn globals(&self) -> &Arc<Environment> {
        &self.globals
    }

    /// A second interpreter over the same program state, for another thread
    pub fn fork(&self) -> Interpreter {
        Interpreter {
            registry: Arc::clone(&self.registry),
            prelude: Arc::clone(&self.prelude),
            globals: Arc::clone(&self.globals),
            console: Arc::clone(&self.console),
            loader: Arc::clone(&self.loader),
            modules: Arc::clone(&self.modules),
            unit: modules::next_unit_id(),
            importing: Vec::new(),
            entry: self.entry.clone(),
            current_owner: self.current_owner,
            call_depth: 0,
        }
    }

    /// Run a program: top-level statements, then the entry function if the
    /// program defines one taking no arguments
    #[tracing::instrument(level = "debug", skip_all, fields(entry = %self.entry))]
    pub fn run_program(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let globals = Arc::clone(&self.globals);
        let value = self
            .exec_block(&program.stmts, &globals)
            .map_err(Unwind::into_error)?;

        match globals.get(&self.entry) {
            Some(Value::Function(func)) if func.decl.required_params() == 0 => {
                self.call_function(&func, Vec::new())
            }
            Some(_) => {
                tracing::debug!(entry = %self.entry, "entry binding is not a zero-argument function");
                Ok(value)
            }
            None => Ok(value),
        }
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    /// Execute statements in `env`; the value is the last statement's value
    pub fn exec_block(&mut self, stmts: &[Stmt], env: &Arc<Environment>) -> EvalResult {
        let mut last = Value::Unit;
        for stmt in stmts {
            last = self
                .exec_stmt(stmt, env)
                .map_err(|unwind| unwind.or_span(stmt.span()))?;
        }
        Ok(last)
    }

    fn exec_nested(&mut self, block: &Block, env: &Arc<Environment>) -> EvalResult {
        let scope = Environment::child(env);
        self.exec_block(&block.stmts, &scope)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Arc<Environment>) -> EvalResult {
        match stmt {
            Stmt::VarDecl {
                kind, name, value, ..
            } => {
                let value = self.eval_expr(value, env)?;
                env.define(name.as_str(), value, kind.is_mutable());
                Ok(Value::Unit)
            }

            Stmt::FunDecl { decl, .. } => {
                let func = self.make_function(decl, env);
                if let Some(name) = &decl.name {
                    env.define(name.as_str(), func, false);
                }
                Ok(Value::Unit)
            }

            Stmt::StructDef { decl, .. } => {
                let value = self.define_struct(decl, env)?;
                env.define(decl.name.as_str(), value, false);
                Ok(Value::Unit)
            }

            Stmt::TraitDef { decl, .. } => {
                let value = self.define_trait(decl)?;
                env.define(decl.name.as_str(), value, false);
                Ok(Value::Unit)
            }

            Stmt::Import { module, alias, .. } => {
                let loaded = self.import_module(module)?;
                let name = match alias {
                    Some(alias) => alias.as_str(),
                    None => module.rsplit('.').next().unwrap_or(module.as_str()),
                };
                env.define(name, Value::Module(loaded), false);
                Ok(Value::Unit)
            }

            Stmt::Assign {
                target, op, value, ..
            } => {
                self.exec_assign(target, *op, value, env)?;
                Ok(Value::Unit)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Unit,
                };
                Err(Unwind::Return(value))
            }

            Stmt::Break { .. } => Err(Unwind::Break),
            Stmt::Continue { .. } => Err(Unwind::Continue),

            Stmt::Throw { span, value } => {
                let error = match self.eval_expr(value, env)? {
                    Value::Str(message) => RuntimeError::thrown(message).with_span(span.clone()),
                    Value::Error(err) => *err,
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "can only throw a String or an Error, got {}",
                            other.type_name()
                        ))
                        .into())
                    }
                };
                Err(Unwind::Error(error))
            }

            Stmt::While { cond, body, .. } => {
                loop {
                    if !self.eval_condition(cond, env)? {
                        break;
                    }
                    match self.exec_nested(body, env) {
                        Ok(_) | Err(Unwind::Continue) => {}
                        Err(Unwind::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Unit)
            }

            Stmt::For {
                var,
                iterable,
                body,
                ..
            } => {
                let iterable = self.eval_expr(iterable, env)?;
                for item in iterate(&iterable)? {
                    let scope = Environment::child(env);
                    scope.define(var.as_str(), item, false);
                    match self.exec_block(&body.stmts, &scope) {
                        Ok(_) | Err(Unwind::Continue) => {}
                        Err(Unwind::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Unit)
            }

            Stmt::Try {
                body,
                catch,
                finally,
                ..
            } => {
                let outcome = match (self.exec_nested(body, env), catch) {
                    (Err(Unwind::Error(error)), Some(clause)) => {
                        tracing::trace!(kind = %error.kind, "caught");
                        let scope = Environment::child(env);
                        if let Some(name) = &clause.name {
                            scope.define(name.as_str(), Value::Error(Box::new(error)), false);
                        }
                        self.exec_block(&clause.body.stmts, &scope)
                    }
                    (outcome, _) => outcome,
                };

                // A signal raised by `finally` replaces the pending one.
                if let Some(finally) = finally {
                    self.exec_nested(finally, env)?;
                }
                outcome.map(|_| Value::Unit)
            }

            Stmt::Expr { expr, .. } => self.eval_expr(expr, env),
        }
    }

    fn exec_assign(
        &mut self,
        target: &Expr,
        op: AssignOp,
        value: &Expr,
        env: &Arc<Environment>,
    ) -> EvalResult<()> {
        match target {
            Expr::Identifier { name, .. } => {
                let new_value = match op.binary() {
                    Some(bop) => {
                        let current = env
                            .get(name)
                            .ok_or_else(|| RuntimeError::undefined_variable(name))?;
                        let rhs = self.eval_expr(value, env)?;
                        binary_op(bop, &current, &rhs)?
                    }
                    None => self.eval_expr(value, env)?,
                };
                env.assign(name, new_value)?;
                Ok(())
            }

            Expr::FieldAccess { object, field, .. } => {
                let object = self.eval_expr(object, env)?;
                let Value::Instance(inst) = &object else {
                    return Err(RuntimeError::type_error(format!(
                        "cannot assign field `{}` on {}",
                        field,
                        object.type_name()
                    ))
                    .into());
                };
                let rhs = self.eval_expr(value, env)?;
                let new_value = match op.binary() {
                    Some(bop) => {
                        let current = self.instance_member(&object, inst, field)?;
                        binary_op(bop, &current, &rhs)?
                    }
                    None => rhs,
                };
                self.set_instance_field(inst, field, new_value)?;
                Ok(())
            }

            Expr::Index { object, index, .. } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                let rhs = self.eval_expr(value, env)?;
                match &object {
                    Value::List(items) => {
                        let i = index
                            .as_int()
                            .ok_or_else(|| RuntimeError::type_mismatch("Int index", &index))?;
                        let new_value = match op.binary() {
                            Some(bop) => {
                                let current = index_value(&object, &index)?;
                                binary_op(bop, &current, &rhs)?
                            }
                            None => rhs,
                        };
                        let mut items = items.lock();
                        let at = normalize_index(i, items.len())?;
                        items[at] = new_value;
                    }
                    Value::Map(entries) => {
                        let new_value = match op.binary() {
                            Some(bop) => {
                                let current = index_value(&object, &index)?;
                                binary_op(bop, &current, &rhs)?
                            }
                            None => rhs,
                        };
                        map_set(entries, index, new_value);
                    }
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "{} does not support index assignment",
                            other.type_name()
                        ))
                        .into())
                    }
                }
                Ok(())
            }

            _ => Err(RuntimeError::type_error("invalid assignment target").into()),
        }
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    /// Evaluate an expression; errors without a location get this one
    pub fn eval_expr(&mut self, expr: &Expr, env: &Arc<Environment>) -> EvalResult {
        self.eval_expr_inner(expr, env)
            .map_err(|unwind| unwind.or_span(expr.span()))
    }

    fn eval_condition(&mut self, cond: &Expr, env: &Arc<Environment>) -> EvalResult<bool> {
        match self.eval_expr(cond, env)? {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeError::type_error(format!(
                "condition must be Bool, got {}",
                other.type_name()
            ))
            .into()),
        }
    }

    fn eval_args(&mut self, args: &[Expr], env: &Arc<Environment>) -> EvalResult<Vec<Value>> {
        args.iter().map(|arg| self.eval_expr(arg, env)).collect()
    }

    fn make_function(&self, decl: &Arc<FunctionDecl>, env: &Arc<Environment>) -> Value {
        Value::Function(Arc::new(Function {
            decl: Arc::clone(decl),
            env: Arc::clone(env),
            receiver: None,
            owner: self.current_owner,
        }))
    }

    fn eval_expr_inner(&mut self, expr: &Expr, env: &Arc<Environment>) -> EvalResult {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Unit => Value::Unit,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(n) => Value::Int(*n),
                Literal::Float(x) => Value::Float(*x),
                Literal::Str(s) => Value::Str(s.clone()),
            }),

            Expr::Identifier { name, .. } => env
                .get(name)
                .ok_or_else(|| RuntimeError::undefined_variable(name).into()),

            Expr::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
                ..
            } => {
                let left = self.eval_condition(left, env)?;
                let short_circuit = if *op == BinaryOp::And { !left } else { left };
                if short_circuit {
                    return Ok(Value::Bool(left));
                }
                Ok(Value::Bool(self.eval_condition(right, env)?))
            }

            Expr::Binary {
                op, left, right, ..
            } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                Ok(binary_op(*op, &left, &right)?)
            }

            Expr::Unary { op, expr, .. } => {
                let value = self.eval_expr(expr, env)?;
                match (op, value) {
                    (UnaryOp::Neg, Value::Int(n)) => n
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| RuntimeError::overflow("-").into()),
                    (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, other) => Err(RuntimeError::type_mismatch("number", &other).into()),
                    (UnaryOp::Not, other) => Err(RuntimeError::type_mismatch("Bool", &other).into()),
                }
            }

            Expr::Range { start, end, .. } => {
                let start = self.eval_expr(start, env)?;
                let end = self.eval_expr(end, env)?;
                match (&start, &end) {
                    (Value::Int(start), Value::Int(end)) => Ok(Value::Range {
                        start: *start,
                        end: *end,
                    }),
                    (Value::Int(_), other) | (other, _) => {
                        Err(RuntimeError::type_mismatch("Int range bound", other).into())
                    }
                }
            }

            Expr::Call { callee, args, .. } => {
                let callee = self.eval_expr(callee, env)?;
                let args = self.eval_args(args, env)?;
                Ok(self.call_value(&callee, args)?)
            }

            Expr::MethodCall {
                receiver,
                method,
                args,
                ..
            } => {
                let receiver = self.eval_expr(receiver, env)?;
                let args = self.eval_args(args, env)?;
                Ok(self.call_method(&receiver, method, args)?)
            }

            Expr::FieldAccess { object, field, .. } => {
                let object = self.eval_expr(object, env)?;
                Ok(self.get_member(&object, field)?)
            }

            Expr::Index { object, index, .. } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                Ok(index_value(&object, &index)?)
            }

            Expr::Lambda { decl, .. } => Ok(self.make_function(decl, env)),

            Expr::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                if self.eval_condition(cond, env)? {
                    self.exec_nested(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.exec_nested(else_branch, env)
                } else {
                    Ok(Value::Unit)
                }
            }

            Expr::List { elements, .. } => Ok(Value::list(self.eval_args(elements, env)?)),

            Expr::Map { entries, .. } => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval_expr(key, env)?;
                    let value = self.eval_expr(value, env)?;
                    map_insert(&mut out, key, value);
                }
                Ok(Value::map(out))
            }

            Expr::ListComprehension {
                element,
                var,
                iterable,
                filter,
                ..
            } => {
                let iterable = self.eval_expr(iterable, env)?;
                let mut out = Vec::new();
                for item in iterate(&iterable)? {
                    let scope = Environment::child(env);
                    scope.define(var.as_str(), item, false);
                    if let Some(filter) = filter {
                        if !self.eval_condition(filter, &scope)? {
                            continue;
                        }
                    }
                    out.push(self.eval_expr(element, &scope)?);
                }
                Ok(Value::list(out))
            }

            Expr::MapComprehension {
                key,
                value,
                var,
                iterable,
                filter,
                ..
            } => {
                let iterable = self.eval_expr(iterable, env)?;
                let mut out = Vec::new();
                for item in iterate(&iterable)? {
                    let scope = Environment::child(env);
                    scope.define(var.as_str(), item, false);
                    if let Some(filter) = filter {
                        if !self.eval_condition(filter, &scope)? {
                            continue;
                        }
                    }
                    let k = self.eval_expr(key, &scope)?;
                    let v = self.eval_expr(value, &scope)?;
                    map_insert(&mut out, k, v);
                }
                Ok(Value::map(out))
            }

            Expr::StructLiteral { name, fields, .. } => {
                let struct_id = match env.get(name) {
                    Some(Value::StructType { id, .. }) => id,
                    Some(other) => {
                        return Err(RuntimeError::type_error(format!(
                            "`{}` is a {}, not a struct",
                            name,
                            other.type_name()
                        ))
                        .into())
                    }
                    None => return Err(RuntimeError::undefined_variable(name).into()),
                };
                let mut supplied = Vec::with_capacity(fields.len());
                for (field, value) in fields {
                    supplied.push((field.clone(), self.eval_expr(value, env)?));
                }
                Ok(self.instantiate(struct_id, supplied)?)
            }

            Expr::Spawn { call, .. } => self.eval_spawn(call, env),
        }
    }

    /// `spawn call`: callee, receiver and arguments are evaluated here; the
    /// call itself runs on a new thread
    fn eval_spawn(&mut self, call: &Expr, env: &Arc<Environment>) -> EvalResult {
        type Task = Box<dyn FnOnce(&mut Interpreter) -> Result<Value, RuntimeError> + Send>;

        let task: Task = match call {
            Expr::Call { callee, args, .. } => {
                let callee = self.eval_expr(callee, env)?;
                if !callee.is_callable() {
                    return Err(RuntimeError::not_callable(&callee).into());
                }
                let args = self.eval_args(args, env)?;
                Box::new(move |interp| interp.call_value(&callee, args))
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                ..
            } => {
                let receiver = self.eval_expr(receiver, env)?;
                let args = self.eval_args(args, env)?;
                let method = method.clone();
                Box::new(move |interp| interp.call_method(&receiver, &method, args))
            }
            _ => return Err(RuntimeError::type_error("`spawn` expects a call").into()),
        };

        let mut forked = self.fork();
        let handle = ThreadHandle::spawn(move || task(&mut forked))?;
        Ok(Value::Thread(handle))
    }

    // ---------------------------------------------------------------------
    // Calls and members
    // ---------------------------------------------------------------------

    /// Call any callable value
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(func) => self.call_function(func, args),
            Value::Builtin(builtin) => (builtin.func)(self, args),
            other => Err(RuntimeError::not_callable(other)),
        }
    }

    /// Call a user function: bind arguments in a child of the captured scope
    /// and run the body
    #[tracing::instrument(level = "trace", skip_all, fields(name = %func.name(), argc = args.len()))]
    pub fn call_function(&mut self, func: &Function, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let decl = &func.decl;
        let argc = args.len();
        let required = decl.required_params();
        let positional = decl.positional_params();
        if argc < required || (!decl.is_variadic() && argc > positional) {
            let expected = if decl.is_variadic() {
                format!("at least {}", required)
            } else if required == positional {
                required.to_string()
            } else {
                format!("{} to {}", required, positional)
            };
            return Err(RuntimeError::arity_mismatch(func.name(), &expected, argc));
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::type_error(format!(
                "maximum call depth of {} exceeded in `{}`",
                MAX_CALL_DEPTH,
                func.name()
            )));
        }

        let env = Environment::child(&func.env);
        if let Some(receiver) = &func.receiver {
            env.define("self", receiver.clone(), false);
        }

        let saved_owner = std::mem::replace(&mut self.current_owner, func.owner);
        self.call_depth += 1;
        let result = self.bind_and_run(func, &env, args);
        self.call_depth -= 1;
        self.current_owner = saved_owner;
        result
    }

    fn bind_and_run(
        &mut self,
        func: &Function,
        env: &Arc<Environment>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let mut args = args.into_iter();
        for param in &func.decl.params {
            if param.variadic {
                env.define(param.name.as_str(), Value::list(args.by_ref().collect()), false);
                continue;
            }
            let value = match (args.next(), &param.default) {
                (Some(value), _) => value,
                // Defaults see the parameters bound before them.
                (None, Some(default)) => self.eval_expr(default, env).map_err(Unwind::into_error)?,
                (None, None) => {
                    return Err(RuntimeError::new(
                        ErrorKind::ArityError,
                        format!("`{}` is missing argument `{}`", func.name(), param.name),
                    ))
                }
            };
            env.define(param.name.as_str(), value, false);
        }

        match self.exec_block(&func.decl.body.stmts, env) {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(other) => Err(other.into_error()),
        }
    }

    /// `receiver.name(args)`
    pub fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match receiver {
            Value::Instance(inst)
                if name == "to_string" && self.resolve_method(inst.struct_id, name).is_none() =>
            {
                self.call_builtin_method(receiver, name, args)
            }
            Value::Instance(inst) => self.call_instance_method(receiver, inst, name, args),
            Value::StructType { id, name: struct_name } => {
                self.call_static_method(*id, struct_name, name, args)
            }
            Value::Module(module) => {
                let member = module.get(name)?;
                self.call_value(&member, args)
            }
            _ => self.call_builtin_method(receiver, name, args),
        }
    }

    /// `object.name`
    pub fn get_member(&mut self, object: &Value, name: &str) -> Result<Value, RuntimeError> {
        match object {
            Value::Instance(inst) => self.instance_member(object, inst, name),
            Value::StructType { id, name: struct_name } => self
                .static_member(*id, struct_name, name)
                .map(Value::Function),
            _ => self.builtin_field(object, name),
        }
    }

    /// String form used by `print` and `str`; instances use their
    /// `to_string(self)` method when they have one
    pub fn stringify(&mut self, value: &Value) -> Result<String, RuntimeError> {
        self.stringify_nested(value, &mut Vec::new())
    }

    /// `path` holds the containers being printed; meeting one again prints
    /// `[...]` or `{...}`
    fn stringify_nested(
        &mut self,
        value: &Value,
        path: &mut Vec<usize>,
    ) -> Result<String, RuntimeError> {
        match value {
            Value::Instance(inst) => match self.resolve_method(inst.struct_id, "to_string") {
                Some(method) if method.takes_self && method.accepts(0) => {
                    match self.call_instance_method(value, inst, "to_string", Vec::new())? {
                        Value::Str(s) => Ok(s),
                        other => self.stringify_nested(&other, path),
                    }
                }
                _ => Ok(format_value(value)),
            },
            Value::List(items) => {
                let id = container_id(items);
                if path.contains(&id) {
                    return Ok("[...]".to_string());
                }
                let snapshot = items.lock().clone();
                path.push(id);
                let mut parts = Vec::with_capacity(snapshot.len());
                for item in &snapshot {
                    match self.stringify_nested(item, path) {
                        Ok(part) => parts.push(part),
                        Err(err) => {
                            path.pop();
                            return Err(err);
                        }
                    }
                }
                path.pop();
                Ok(format!("[{}]", parts.join(", ")))
            }
            Value::Map(entries) => {
                let id = container_id(entries);
                if path.contains(&id) {
                    return Ok("{...}".to_string());
                }
                let snapshot = entries.lock().clone();
                path.push(id);
                let mut parts = Vec::with_capacity(snapshot.len());
                for (key, value) in &snapshot {
                    let entry = match self.stringify_nested(key, path) {
                        Ok(key) => self
                            .stringify_nested(value, path)
                            .map(|value| format!("{}: {}", key, value)),
                        Err(err) => Err(err),
                    };
                    match entry {
                        Ok(part) => parts.push(part),
                        Err(err) => {
                            path.pop();
                            return Err(err);
                        }
                    }
                }
                path.pop();
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            other => Ok(format_value(other)),
        }
    }
}

/// `object[index]` for lists, strings and maps
fn index_value(object: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match object {
        Value::List(items) => {
            let i = index
                .as_int()
                .ok_or_else(|| RuntimeError::type_mismatch("Int index", index))?;
            let items = items.lock();
            let at = normalize_index(i, items.len())?;
            Ok(items[at].clone())
        }
        Value::Str(s) => {
            let i = index
                .as_int()
                .ok_or_else(|| RuntimeError::type_mismatch("Int index", index))?;
            let chars: Vec<char> = s.chars().collect();
            let at = normalize_index(i, chars.len())?;
            Ok(Value::Str(chars[at].to_string()))
        }
        Value::Map(entries) => map_get(entries, index).ok_or_else(|| {
            RuntimeError::type_error(format!("key {} not found", format_value(index)))
        }),
        other => Err(RuntimeError::type_error(format!(
            "{} is not indexable",
            other.type_name()
        ))),
    }
}
