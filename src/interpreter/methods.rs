//! Built-in methods on lists, maps, strings, ranges, numbers, errors and
//! thread handles.
//!
//! Every list or map operation takes the container's lock once, and never
//! while another container's lock is needed. Element comparisons and
//! callbacks into user code (`map`, `filter`, ...) work on snapshots.

use std::cmp::Ordering;
use std::sync::Arc;

use super::builtins::float_to_int;
use super::concurrency::ThreadHandle;
use super::error::{check_arity, RuntimeError};
use super::value::{
    compare_values, ensure_buildable, map_get, map_remove, map_set, normalize_index, range_len,
    values_equal, Shared, Value,
};
use super::Interpreter;

fn no_method(receiver: &Value, method: &str) -> RuntimeError {
    RuntimeError::unknown_field(&receiver.type_name(), method)
}

fn int_arg(method: &str, value: &Value) -> Result<i64, RuntimeError> {
    value.as_int().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "`{}` expects an Int, got {}",
            method,
            value.type_name()
        ))
    })
}

fn str_arg<'a>(method: &str, value: &'a Value) -> Result<&'a str, RuntimeError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::type_error(format!(
            "`{}` expects a String, got {}",
            method,
            other.type_name()
        ))),
    }
}

fn sort_values(items: &mut [Value]) -> Result<(), RuntimeError> {
    let mut failure = None;
    items.sort_by(|a, b| {
        compare_values(a, b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        })
    });
    failure.map_or(Ok(()), Err)
}

impl Interpreter {
    /// Dispatch `receiver.method(args)` for every non-struct value
    pub(super) fn call_builtin_method(
        &mut self,
        receiver: &Value,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if method == "to_string" {
            check_arity("to_string", &args, 0)?;
            return Ok(Value::Str(self.stringify(receiver)?));
        }

        match receiver {
            Value::List(items) => self.list_method(receiver, items, method, args),
            Value::Map(entries) => self.map_method(receiver, entries, method, args),
            Value::Str(s) => string_method(receiver, s, method, args),
            Value::Range { start, end } => range_method(receiver, *start, *end, method, args),
            Value::Int(_) | Value::Float(_) => number_method(receiver, method, args),
            Value::Error(err) => {
                check_arity(method, &args, 0)?;
                match method {
                    "message" => Ok(Value::Str(err.message.clone())),
                    "kind" => Ok(Value::Str(err.kind.name().to_string())),
                    _ => Err(no_method(receiver, method)),
                }
            }
            Value::Thread(handle) => thread_method(receiver, handle, method, args),
            _ => Err(no_method(receiver, method)),
        }
    }

    /// `value.field` for built-in values
    pub(super) fn builtin_field(&self, object: &Value, field: &str) -> Result<Value, RuntimeError> {
        match (object, field) {
            (Value::Error(err), "message") => Ok(Value::Str(err.message.clone())),
            (Value::Error(err), "kind") => Ok(Value::Str(err.kind.name().to_string())),
            (Value::Range { start, .. }, "start") => Ok(Value::Int(*start)),
            (Value::Range { end, .. }, "end") => Ok(Value::Int(*end)),
            (Value::Module(module), member) => module.get(member),
            _ => Err(no_method(object, field)),
        }
    }

    fn list_method(
        &mut self,
        receiver: &Value,
        items: &Shared<Vec<Value>>,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match method {
            "push" | "append" => {
                check_arity(method, &args, 1)?;
                items.lock().extend(args);
                Ok(Value::Unit)
            }
            "extend" => {
                check_arity(method, &args, 1)?;
                let extra = match &args[0] {
                    Value::List(other) => other.lock().clone(),
                    other => return Err(RuntimeError::type_mismatch("List", other)),
                };
                items.lock().extend(extra);
                Ok(Value::Unit)
            }
            "pop" => {
                check_arity(method, &args, 0)?;
                items
                    .lock()
                    .pop()
                    .ok_or_else(|| RuntimeError::type_error("pop from empty list"))
            }
            "shift" => {
                check_arity(method, &args, 0)?;
                let mut guard = items.lock();
                if guard.is_empty() {
                    return Err(RuntimeError::type_error("shift from empty list"));
                }
                Ok(guard.remove(0))
            }
            "insert" => {
                check_arity(method, &args, 2)?;
                let index = int_arg(method, &args[0])?;
                let mut guard = items.lock();
                let len = guard.len();
                // inserting at `len` appends
                let at = if index == len as i64 {
                    len
                } else {
                    normalize_index(index, len)?
                };
                guard.insert(at, args[1].clone());
                Ok(Value::Unit)
            }
            "remove" => {
                check_arity(method, &args, 1)?;
                let index = int_arg(method, &args[0])?;
                let mut guard = items.lock();
                let at = normalize_index(index, guard.len())?;
                Ok(guard.remove(at))
            }
            "get" => {
                check_arity(method, &args, 1)?;
                let index = int_arg(method, &args[0])?;
                let guard = items.lock();
                let at = normalize_index(index, guard.len())?;
                Ok(guard[at].clone())
            }
            "len" | "size" => {
                check_arity(method, &args, 0)?;
                Ok(Value::Int(items.lock().len() as i64))
            }
            "is_empty" => {
                check_arity(method, &args, 0)?;
                Ok(Value::Bool(items.lock().is_empty()))
            }
            "first" | "last" => {
                check_arity(method, &args, 0)?;
                let guard = items.lock();
                let item = if method == "first" {
                    guard.first()
                } else {
                    guard.last()
                };
                Ok(item.cloned().unwrap_or(Value::Unit))
            }
            "contains" => {
                check_arity(method, &args, 1)?;
                let snapshot = items.lock().clone();
                let found = snapshot.iter().any(|v| values_equal(v, &args[0]));
                Ok(Value::Bool(found))
            }
            "index_of" => {
                check_arity(method, &args, 1)?;
                let snapshot = items.lock().clone();
                let position = snapshot.iter().position(|v| values_equal(v, &args[0]));
                Ok(Value::Int(position.map_or(-1, |p| p as i64)))
            }
            "clear" => {
                check_arity(method, &args, 0)?;
                items.lock().clear();
                Ok(Value::Unit)
            }
            "copy" => {
                check_arity(method, &args, 0)?;
                Ok(Value::list(items.lock().clone()))
            }
            "reverse" => {
                check_arity(method, &args, 0)?;
                items.lock().reverse();
                Ok(Value::Unit)
            }
            "sort" => {
                check_arity(method, &args, 0)?;
                let mut snapshot = items.lock().clone();
                sort_values(&mut snapshot)?;
                *items.lock() = snapshot;
                Ok(Value::Unit)
            }
            "sorted" => {
                check_arity(method, &args, 0)?;
                let mut snapshot = items.lock().clone();
                sort_values(&mut snapshot)?;
                Ok(Value::list(snapshot))
            }
            "slice" => {
                check_arity(method, &args, 2)?;
                let guard = items.lock();
                let len = guard.len() as i64;
                let clamp = |i: i64| if i < 0 { (i + len).max(0) } else { i.min(len) } as usize;
                let start = clamp(int_arg(method, &args[0])?);
                let end = clamp(int_arg(method, &args[1])?);
                let slice = if start < end {
                    guard[start..end].to_vec()
                } else {
                    Vec::new()
                };
                Ok(Value::list(slice))
            }
            "join" => {
                check_arity(method, &args, 1)?;
                let separator = str_arg(method, &args[0])?.to_string();
                let snapshot = items.lock().clone();
                let mut parts = Vec::with_capacity(snapshot.len());
                for item in &snapshot {
                    parts.push(self.stringify(item)?);
                }
                Ok(Value::Str(parts.join(&separator)))
            }
            "map" | "filter" | "each" | "any" | "all" | "find" | "reduce" => {
                let snapshot = items.lock().clone();
                self.higher_order(receiver, snapshot, method, args)
            }
            _ => Err(no_method(receiver, method)),
        }
    }

    /// List methods that call a user function per element
    fn higher_order(
        &mut self,
        receiver: &Value,
        snapshot: Vec<Value>,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if method == "reduce" {
            check_arity(method, &args, 2)?;
            let mut acc = args[1].clone();
            for item in snapshot {
                acc = self.call_value(&args[0], vec![acc, item])?;
            }
            return Ok(acc);
        }

        check_arity(method, &args, 1)?;
        let func = &args[0];
        if !func.is_callable() {
            return Err(RuntimeError::not_callable(func));
        }

        let truthy = |method: &str, v: Value| match v {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeError::type_error(format!(
                "`{}` callback must return Bool, got {}",
                method,
                other.type_name()
            ))),
        };

        match method {
            "map" => {
                let mut out = Vec::with_capacity(snapshot.len());
                for item in snapshot {
                    out.push(self.call_value(func, vec![item])?);
                }
                Ok(Value::list(out))
            }
            "filter" => {
                let mut out = Vec::new();
                for item in snapshot {
                    if truthy(method, self.call_value(func, vec![item.clone()])?)? {
                        out.push(item);
                    }
                }
                Ok(Value::list(out))
            }
            "each" => {
                for item in snapshot {
                    self.call_value(func, vec![item])?;
                }
                Ok(Value::Unit)
            }
            "any" => {
                for item in snapshot {
                    if truthy(method, self.call_value(func, vec![item])?)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            "all" => {
                for item in snapshot {
                    if !truthy(method, self.call_value(func, vec![item])?)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "find" => {
                for item in snapshot {
                    if truthy(method, self.call_value(func, vec![item.clone()])?)? {
                        return Ok(item);
                    }
                }
                Ok(Value::Unit)
            }
            _ => Err(no_method(receiver, method)),
        }
    }

    fn map_method(
        &mut self,
        receiver: &Value,
        entries: &Shared<Vec<(Value, Value)>>,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match method {
            "get" => match args.as_slice() {
                [key] => Ok(map_get(entries, key).unwrap_or(Value::Unit)),
                [key, default] => Ok(map_get(entries, key).unwrap_or_else(|| default.clone())),
                _ => Err(RuntimeError::arity_mismatch("get", "1 or 2", args.len())),
            },
            "set" => {
                check_arity(method, &args, 2)?;
                let mut args = args.into_iter();
                if let (Some(key), Some(value)) = (args.next(), args.next()) {
                    map_set(entries, key, value);
                }
                Ok(Value::Unit)
            }
            "has" | "contains" => {
                check_arity(method, &args, 1)?;
                Ok(Value::Bool(map_get(entries, &args[0]).is_some()))
            }
            "remove" => {
                check_arity(method, &args, 1)?;
                Ok(map_remove(entries, &args[0]).unwrap_or(Value::Unit))
            }
            "keys" | "values" | "items" => {
                check_arity(method, &args, 0)?;
                let snapshot = entries.lock().clone();
                let out = snapshot
                    .into_iter()
                    .map(|(k, v)| match method {
                        "keys" => k,
                        "values" => v,
                        _ => Value::list(vec![k, v]),
                    })
                    .collect();
                Ok(Value::list(out))
            }
            "len" | "size" => {
                check_arity(method, &args, 0)?;
                Ok(Value::Int(entries.lock().len() as i64))
            }
            "is_empty" => {
                check_arity(method, &args, 0)?;
                Ok(Value::Bool(entries.lock().is_empty()))
            }
            "clear" => {
                check_arity(method, &args, 0)?;
                entries.lock().clear();
                Ok(Value::Unit)
            }
            _ => Err(no_method(receiver, method)),
        }
    }
}

fn string_method(
    receiver: &Value,
    s: &str,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let text = |v: String| Ok(Value::Str(v));
    match method {
        "len" | "size" => {
            check_arity(method, &args, 0)?;
            Ok(Value::Int(s.chars().count() as i64))
        }
        "is_empty" => {
            check_arity(method, &args, 0)?;
            Ok(Value::Bool(s.is_empty()))
        }
        "upper" => {
            check_arity(method, &args, 0)?;
            text(s.to_uppercase())
        }
        "lower" => {
            check_arity(method, &args, 0)?;
            text(s.to_lowercase())
        }
        "trim" => {
            check_arity(method, &args, 0)?;
            text(s.trim().to_string())
        }
        "chars" => {
            check_arity(method, &args, 0)?;
            Ok(Value::list(
                s.chars().map(|c| Value::Str(c.to_string())).collect(),
            ))
        }
        "split" => {
            check_arity(method, &args, 1)?;
            let separator = str_arg(method, &args[0])?;
            if separator.is_empty() {
                return Err(RuntimeError::type_error("`split` separator must not be empty"));
            }
            Ok(Value::list(
                s.split(separator).map(|p| Value::Str(p.to_string())).collect(),
            ))
        }
        "contains" | "starts_with" | "ends_with" => {
            check_arity(method, &args, 1)?;
            let needle = str_arg(method, &args[0])?;
            Ok(Value::Bool(match method {
                "contains" => s.contains(needle),
                "starts_with" => s.starts_with(needle),
                _ => s.ends_with(needle),
            }))
        }
        "index_of" => {
            check_arity(method, &args, 1)?;
            let needle = str_arg(method, &args[0])?;
            let position = s
                .find(needle)
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Ok(Value::Int(position))
        }
        "replace" => {
            check_arity(method, &args, 2)?;
            text(s.replace(str_arg(method, &args[0])?, str_arg(method, &args[1])?))
        }
        "repeat" => {
            check_arity(method, &args, 1)?;
            let count = int_arg(method, &args[0])?;
            let count = usize::try_from(count)
                .map_err(|_| RuntimeError::type_error("`repeat` count must not be negative"))?;
            ensure_buildable("`repeat`", s.len().checked_mul(count))?;
            text(s.repeat(count))
        }
        _ => Err(no_method(receiver, method)),
    }
}

fn range_method(
    receiver: &Value,
    start: i64,
    end: i64,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    match method {
        "len" | "size" => {
            check_arity(method, &args, 0)?;
            Ok(Value::Int(range_len(start, end)?))
        }
        "to_list" => {
            check_arity(method, &args, 0)?;
            let len = usize::try_from(range_len(start, end)?).ok();
            ensure_buildable("`to_list`", len)?;
            Ok(Value::list((start..end).map(Value::Int).collect()))
        }
        "contains" => {
            check_arity(method, &args, 1)?;
            Ok(Value::Bool(
                args[0].as_int().is_some_and(|n| start <= n && n < end),
            ))
        }
        _ => Err(no_method(receiver, method)),
    }
}

fn number_method(receiver: &Value, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(method, &args, 0)?;
    match (receiver, method) {
        (Value::Int(n), "abs") => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::overflow("abs")),
        (Value::Float(x), "abs") => Ok(Value::Float(x.abs())),
        (Value::Int(n), "to_float") => Ok(Value::Float(*n as f64)),
        (Value::Float(x), "to_float") => Ok(Value::Float(*x)),
        (Value::Int(n), "to_int" | "floor" | "ceil" | "round") => Ok(Value::Int(*n)),
        (Value::Float(x), "to_int") => float_to_int(x.trunc()).map(Value::Int),
        (Value::Float(x), "floor") => float_to_int(x.floor()).map(Value::Int),
        (Value::Float(x), "ceil") => float_to_int(x.ceil()).map(Value::Int),
        (Value::Float(x), "round") => float_to_int(x.round()).map(Value::Int),
        _ => Err(no_method(receiver, method)),
    }
}

fn thread_method(
    receiver: &Value,
    handle: &Arc<ThreadHandle>,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_arity(method, &args, 0)?;
    match method {
        "join" => handle.join(),
        "done" => Ok(Value::Bool(handle.is_done())),
        "id" => Ok(Value::Int(handle.id() as i64)),
        _ => Err(no_method(receiver, method)),
    }
}
