//! Built-in free functions and the native `math` module.

use std::fmt;

use super::environment::Environment;
use super::error::{check_arity, ErrorKind, RuntimeError};
use super::value::{compare_values, range_len, Value};
use super::Interpreter;

/// Signature shared by every native function
pub type BuiltinFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>;

/// A native function value
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

const GLOBALS: &[(&str, BuiltinFn)] = &[
    ("print", builtin_print),
    ("str", builtin_str),
    ("sqrt", builtin_sqrt),
    ("len", builtin_len),
    ("type_of", builtin_type_of),
    ("abs", builtin_abs),
    ("min", builtin_min),
    ("max", builtin_max),
    ("range", builtin_range),
    ("int", builtin_int),
    ("float", builtin_float),
    ("error", builtin_error),
    ("implements", builtin_implements),
];

/// Bind the global built-ins into `env`
pub fn install_globals(env: &Environment) {
    for &(name, func) in GLOBALS {
        env.define(name, Value::Builtin(Builtin { name, func }), false);
    }
}

/// Exports of the native `math` module
pub fn math_exports() -> Vec<(String, Value)> {
    let functions: &[(&'static str, BuiltinFn)] = &[
        ("sqrt", builtin_sqrt),
        ("abs", builtin_abs),
        ("pow", math_pow),
        ("floor", math_floor),
        ("ceil", math_ceil),
    ];
    let mut exports: Vec<(String, Value)> = functions
        .iter()
        .map(|&(name, func)| (name.to_string(), Value::Builtin(Builtin { name, func })))
        .collect();
    exports.push(("pi".to_string(), Value::Float(std::f64::consts::PI)));
    exports.push(("e".to_string(), Value::Float(std::f64::consts::E)));
    exports
}

fn expect_number(name: &str, value: &Value) -> Result<f64, RuntimeError> {
    value.as_number().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "`{}` expects a number, got {}",
            name,
            value.type_name()
        ))
    })
}

/// Convert a float to Int, rejecting NaN, infinities and out-of-range values
pub fn float_to_int(x: f64) -> Result<i64, RuntimeError> {
    if x.is_finite() && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Ok(x as i64)
    } else {
        Err(RuntimeError::type_error(format!(
            "cannot convert {} to Int",
            x
        )))
    }
}

fn builtin_print(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in &args {
        parts.push(interp.stringify(arg)?);
    }
    interp.console().println(&parts.join(" "));
    Ok(Value::Unit)
}

fn builtin_str(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("str", &args, 1)?;
    Ok(Value::Str(interp.stringify(&args[0])?))
}

fn builtin_sqrt(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("sqrt", &args, 1)?;
    let x = expect_number("sqrt", &args[0])?;
    if x < 0.0 {
        return Err(RuntimeError::type_error(format!(
            "square root of negative number {}",
            x
        )));
    }
    Ok(Value::Float(x.sqrt()))
}

fn builtin_len(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("len", &args, 1)?;
    let len = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.lock().len(),
        Value::Map(entries) => entries.lock().len(),
        Value::Range { start, end } => return Ok(Value::Int(range_len(*start, *end)?)),
        other => {
            return Err(RuntimeError::type_error(format!(
                "{} has no length",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(len as i64))
}

fn builtin_type_of(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("type_of", &args, 1)?;
    Ok(Value::Str(args[0].type_name()))
}

fn builtin_abs(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("abs", &args, 1)?;
    match &args[0] {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::overflow("abs")),
        Value::Float(x) => Ok(Value::Float(x.abs())),
        other => Err(RuntimeError::type_mismatch("number", other)),
    }
}

/// Candidates for `min`/`max`: the arguments, or the elements of a single list
fn extremum_candidates(name: &str, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
    let candidates = match args.as_slice() {
        [Value::List(items)] => items.lock().clone(),
        _ => args,
    };
    if candidates.is_empty() {
        return Err(RuntimeError::arity_mismatch(name, "at least 1", 0));
    }
    Ok(candidates)
}

fn builtin_min(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut best: Option<Value> = None;
    for value in extremum_candidates("min", args)? {
        best = match best {
            Some(current) if compare_values(&value, &current)?.is_lt() => Some(value),
            Some(current) => Some(current),
            None => Some(value),
        };
    }
    Ok(best.unwrap_or(Value::Unit))
}

fn builtin_max(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut best: Option<Value> = None;
    for value in extremum_candidates("max", args)? {
        best = match best {
            Some(current) if compare_values(&value, &current)?.is_gt() => Some(value),
            Some(current) => Some(current),
            None => Some(value),
        };
    }
    Ok(best.unwrap_or(Value::Unit))
}

fn builtin_range(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let bound = |v: &Value| v.as_int().ok_or_else(|| RuntimeError::type_mismatch("Int", v));
    match args.as_slice() {
        [end] => Ok(Value::Range {
            start: 0,
            end: bound(end)?,
        }),
        [start, end] => Ok(Value::Range {
            start: bound(start)?,
            end: bound(end)?,
        }),
        _ => Err(RuntimeError::arity_mismatch("range", "1 or 2", args.len())),
    }
}

fn builtin_int(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("int", &args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(x) => float_to_int(x.trunc()).map(Value::Int),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeError::type_error(format!("cannot convert {:?} to Int", s))
        }),
        other => Err(RuntimeError::type_mismatch("Int, Float, Bool or String", other)),
    }
}

fn builtin_float(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("float", &args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            RuntimeError::type_error(format!("cannot convert {:?} to Float", s))
        }),
        other => Err(RuntimeError::type_mismatch("Int, Float or String", other)),
    }
}

/// `error(message)` or `error(message, "KindName")`
fn builtin_error(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let (message, kind) = match args.as_slice() {
        [message] => (message, ErrorKind::Error),
        [message, Value::Str(kind)] => (
            message,
            ErrorKind::from_name(kind).ok_or_else(|| {
                RuntimeError::type_error(format!("unknown error kind `{}`", kind))
            })?,
        ),
        [_, other] => return Err(RuntimeError::type_mismatch("String", other)),
        _ => return Err(RuntimeError::arity_mismatch("error", "1 or 2", args.len())),
    };
    let message = interp.stringify(message)?;
    Ok(Value::error(kind, message))
}

fn builtin_implements(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("implements", &args, 2)?;
    match &args[1] {
        Value::TraitType { id, .. } => Ok(Value::Bool(interp.value_implements(&args[0], *id))),
        other => Err(RuntimeError::type_mismatch("a trait", other)),
    }
}

fn math_pow(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("pow", &args, 2)?;
    match (&args[0], &args[1]) {
        (Value::Int(base), Value::Int(exp)) if *exp >= 0 => u32::try_from(*exp)
            .ok()
            .and_then(|exp| base.checked_pow(exp))
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::overflow("pow")),
        (base, exp) => Ok(Value::Float(
            expect_number("pow", base)?.powf(expect_number("pow", exp)?),
        )),
    }
}

fn math_floor(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("floor", &args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        other => float_to_int(expect_number("floor", other)?.floor()).map(Value::Int),
    }
}

fn math_ceil(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity("ceil", &args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        other => float_to_int(expect_number("ceil", other)?.ceil()).map(Value::Int),
    }
}
