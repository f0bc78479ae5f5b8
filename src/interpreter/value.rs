//! Runtime value types for the Omnia interpreter.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::parser::ast::{BinaryOp, FunctionDecl};

use super::builtins::Builtin;
use super::concurrency::ThreadHandle;
use super::environment::Environment;
use super::error::{ErrorKind, RuntimeError};
use super::modules::ModuleValue;
use super::objects::{StructId, TraitId};

/// Lock-guarded container shared by every value that references it
pub type Shared<T> = Arc<Mutex<T>>;

/// Largest list or string (in elements or bytes) a single built-in may build
pub const MAX_BUILT_LEN: usize = 1 << 28;

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Shared<Vec<Value>>),
    /// Insertion-ordered entries, looked up by value equality
    Map(Shared<Vec<(Value, Value)>>),
    Function(Arc<Function>),
    Builtin(Builtin),
    Instance(Arc<Instance>),
    Error(Box<RuntimeError>),
    /// `start..end`, end exclusive
    Range { start: i64, end: i64 },
    Thread(Arc<ThreadHandle>),
    Module(Arc<ModuleValue>),
    StructType { id: StructId, name: String },
    TraitType { id: TraitId, name: String },
}

/// A closure: declaration plus captured environment
pub struct Function {
    pub decl: Arc<FunctionDecl>,
    pub env: Arc<Environment>,
    /// Bound as `self` when the function is a method read off an instance
    pub receiver: Option<Value>,
    /// Struct whose body declared this function, for visibility checks
    pub owner: Option<StructId>,
}

impl Function {
    pub fn name(&self) -> &str {
        self.decl.name.as_deref().unwrap_or("<lambda>")
    }
}

// Environments and instances may reach themselves, so Debug stays shallow.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("bound", &self.receiver.is_some())
            .field("owner", &self.owner)
            .finish()
    }
}

/// A struct instance; fields are mutable through the lock
pub struct Instance {
    pub struct_id: StructId,
    pub struct_name: String,
    pub fields: Mutex<HashMap<String, Value>>,
}

impl Instance {
    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.lock().get(name).cloned()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("struct", &self.struct_name)
            .finish_non_exhaustive()
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(Mutex::new(items)))
    }

    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        Value::Map(Arc::new(Mutex::new(entries)))
    }

    pub fn str(text: impl Into<String>) -> Self {
        Value::Str(text.into())
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Value::Error(Box::new(RuntimeError::new(kind, message)))
    }

    /// Name reported by `type_of`
    pub fn type_name(&self) -> String {
        match self {
            Value::Unit => "Unit".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::Function(_) | Value::Builtin(_) => "Function".to_string(),
            Value::Instance(inst) => inst.struct_name.clone(),
            Value::Error(_) => "Error".to_string(),
            Value::Range { .. } => "Range".to_string(),
            Value::Thread(_) => "Thread".to_string(),
            Value::Module(_) => "Module".to_string(),
            Value::StructType { .. } => "Struct".to_string(),
            Value::TraitType { .. } => "Trait".to_string(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Builtin(_))
    }
}

/// Compare two values for equality; Int and Float compare numerically.
/// Containers are compared on snapshots, so no lock is held while recursing,
/// and a pair already under comparison counts as equal.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    equal_inner(left, right, &mut Vec::new())
}

fn equal_inner(left: &Value, right: &Value, active: &mut Vec<(usize, usize)>) -> bool {
    match (left, right) {
        (Value::Unit, Value::Unit) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            let pair = (container_id(a), container_id(b));
            if pair.0 == pair.1 || active.contains(&pair) {
                return true;
            }
            let a = a.lock().clone();
            let b = b.lock().clone();
            active.push(pair);
            let equal = a.len() == b.len()
                && a.iter().zip(b.iter()).all(|(x, y)| equal_inner(x, y, active));
            active.pop();
            equal
        }
        (Value::Map(a), Value::Map(b)) => {
            let pair = (container_id(a), container_id(b));
            if pair.0 == pair.1 || active.contains(&pair) {
                return true;
            }
            let a = a.lock().clone();
            let b = b.lock().clone();
            active.push(pair);
            let equal = a.len() == b.len()
                && a.iter().all(|(k, v)| {
                    b.iter()
                        .any(|(k2, v2)| equal_inner(k, k2, active) && equal_inner(v, v2, active))
                });
            active.pop();
            equal
        }
        (Value::Range { start: s1, end: e1 }, Value::Range { start: s2, end: e2 }) => {
            s1 == s2 && e1 == e2
        }
        (Value::Error(a), Value::Error(b)) => a.kind == b.kind && a.message == b.message,
        (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
        (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
        (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
        (Value::Thread(a), Value::Thread(b)) => Arc::ptr_eq(a, b),
        (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
        (Value::StructType { id: a, .. }, Value::StructType { id: b, .. }) => a == b,
        (Value::TraitType { id: a, .. }, Value::TraitType { id: b, .. }) => a == b,
        _ => false,
    }
}

/// Identity of a shared container, for cycle detection
pub(crate) fn container_id<T>(shared: &Shared<T>) -> usize {
    Arc::as_ptr(shared) as *const () as usize
}

/// Order numbers and strings; other operands are a TypeError
pub fn compare_values(a: &Value, b: &Value) -> Result<Ordering, RuntimeError> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(|| {
                RuntimeError::type_error("cannot order NaN")
            }),
            _ => Err(RuntimeError::type_error(format!(
                "cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

/// Apply an arithmetic or comparison operator. `&&` and `||` short-circuit in
/// the evaluator and only reach here with both operands evaluated.
pub fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::Ne => return Ok(Value::Bool(!values_equal(left, right))),
        BinaryOp::Lt => return Ok(Value::Bool(compare_values(left, right)?.is_lt())),
        BinaryOp::Le => return Ok(Value::Bool(compare_values(left, right)?.is_le())),
        BinaryOp::Gt => return Ok(Value::Bool(compare_values(left, right)?.is_gt())),
        BinaryOp::Ge => return Ok(Value::Bool(compare_values(left, right)?.is_ge())),
        BinaryOp::And | BinaryOp::Or => {
            return match (left, right) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == BinaryOp::And {
                    *a && *b
                } else {
                    *a || *b
                })),
                (Value::Bool(_), other) | (other, _) => Err(RuntimeError::type_mismatch("Bool", other)),
            };
        }
        _ => {}
    }

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            let mut items = a.lock().clone();
            items.extend(b.lock().iter().cloned());
            Ok(Value::list(items))
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => float_arith(op, a, b),
            _ => Err(RuntimeError::type_error(format!(
                "unsupported operand types for `{}`: {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value, RuntimeError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div | BinaryOp::Mod if b == 0 => return Err(RuntimeError::division_by_zero()),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Mod => a.checked_rem(b),
        _ => None,
    };
    result
        .map(Value::Int)
        .ok_or_else(|| RuntimeError::overflow(op.symbol()))
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> Result<Value, RuntimeError> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => return Err(RuntimeError::division_by_zero()),
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => {
            return Err(RuntimeError::type_error(format!(
                "unsupported float operator `{}`",
                op.symbol()
            )))
        }
    };
    Ok(Value::Float(result))
}

/// Number of integers in `start..end`
pub fn range_len(start: i64, end: i64) -> Result<i64, RuntimeError> {
    if end <= start {
        return Ok(0);
    }
    end.checked_sub(start)
        .ok_or_else(|| RuntimeError::type_error(format!("range {}..{} is too large", start, end)))
}

/// Reject results longer than [`MAX_BUILT_LEN`]
pub fn ensure_buildable(what: &str, len: Option<usize>) -> Result<usize, RuntimeError> {
    match len {
        Some(len) if len <= MAX_BUILT_LEN => Ok(len),
        _ => Err(RuntimeError::type_error(format!(
            "{} would exceed {} elements",
            what, MAX_BUILT_LEN
        ))),
    }
}

/// Format a float so it always shows a decimal point
pub fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 {
        format!("{:.1}", x)
    } else {
        x.to_string()
    }
}

/// Format a value for display. Instances fall back to `<Name>`; the
/// interpreter's `stringify` consults user `to_string` methods first.
/// A container reached again through itself prints as `[...]` or `{...}`.
pub fn format_value(value: &Value) -> String {
    format_inner(value, &mut Vec::new())
}

fn format_inner(value: &Value, path: &mut Vec<usize>) -> String {
    match value {
        Value::Unit => "()".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(x) => format_float(*x),
        Value::Str(s) => s.clone(),
        Value::List(items) => {
            let id = container_id(items);
            if path.contains(&id) {
                return "[...]".to_string();
            }
            let items = items.lock().clone();
            path.push(id);
            let strs: Vec<String> = items.iter().map(|item| format_inner(item, path)).collect();
            path.pop();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(entries) => {
            let id = container_id(entries);
            if path.contains(&id) {
                return "{...}".to_string();
            }
            let entries = entries.lock().clone();
            path.push(id);
            let strs: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", format_inner(k, path), format_inner(v, path)))
                .collect();
            path.pop();
            format!("{{{}}}", strs.join(", "))
        }
        Value::Function(func) => format!("<fun {}>", func.name()),
        Value::Builtin(builtin) => format!("<fun {}>", builtin.name),
        Value::Instance(inst) => format!("<{}>", inst.struct_name),
        Value::Error(err) => err.to_string(),
        Value::Range { start, end } => format!("{}..{}", start, end),
        Value::Thread(handle) => format!("<thread {}>", handle.id()),
        Value::Module(module) => format!("<module {}>", module.name),
        Value::StructType { name, .. } => format!("<struct {}>", name),
        Value::TraitType { name, .. } => format!("<trait {}>", name),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}

/// Iterator over the elements a `for` loop or comprehension visits
pub enum ValueIter {
    Range(std::ops::Range<i64>),
    Items(std::vec::IntoIter<Value>),
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Range(range) => range.next().map(Value::Int),
            ValueIter::Items(items) => items.next(),
        }
    }
}

/// Start iterating: ranges stay lazy, containers are snapshotted
pub fn iterate(value: &Value) -> Result<ValueIter, RuntimeError> {
    match value {
        Value::Range { start, end } => Ok(ValueIter::Range(*start..*end)),
        Value::List(items) => Ok(ValueIter::Items(items.lock().clone().into_iter())),
        Value::Map(entries) => {
            let keys: Vec<Value> = entries.lock().iter().map(|(k, _)| k.clone()).collect();
            Ok(ValueIter::Items(keys.into_iter()))
        }
        Value::Str(s) => {
            let chars: Vec<Value> = s.chars().map(|c| Value::Str(c.to_string())).collect();
            Ok(ValueIter::Items(chars.into_iter()))
        }
        other => Err(RuntimeError::type_error(format!(
            "{} is not iterable",
            other.type_name()
        ))),
    }
}

/// Resolve a possibly negative index against `len`
pub fn normalize_index(index: i64, len: usize) -> Result<usize, RuntimeError> {
    let resolved = if index < 0 {
        index.checked_add(len as i64)
    } else {
        Some(index)
    };
    match resolved {
        Some(i) if i >= 0 && (i as usize) < len => Ok(i as usize),
        _ => Err(RuntimeError::index_out_of_bounds(index, len)),
    }
}

/// Look up a shared map entry by value equality.
/// Keys are compared on a snapshot; the map is not locked meanwhile.
pub fn map_get(entries: &Shared<Vec<(Value, Value)>>, key: &Value) -> Option<Value> {
    let snapshot = entries.lock().clone();
    snapshot
        .into_iter()
        .find(|(k, _)| values_equal(k, key))
        .map(|(_, v)| v)
}

/// Insert or replace an entry in a map that is still being built
pub fn map_insert(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match entries.iter_mut().find(|(k, _)| values_equal(k, &key)) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

/// Insert or replace an entry in a shared map, keeping insertion order
pub fn map_set(entries: &Shared<Vec<(Value, Value)>>, key: Value, value: Value) {
    loop {
        let snapshot = entries.lock().clone();
        let position = snapshot.iter().position(|(k, _)| values_equal(k, &key));
        let mut guard = entries.lock();
        if !unchanged(&guard, &snapshot) {
            continue;
        }
        match position {
            Some(p) => guard[p].1 = value,
            None => guard.push((key, value)),
        }
        return;
    }
}

/// Remove an entry from a shared map, returning its value
pub fn map_remove(entries: &Shared<Vec<(Value, Value)>>, key: &Value) -> Option<Value> {
    loop {
        let snapshot = entries.lock().clone();
        let position = snapshot.iter().position(|(k, _)| values_equal(k, key))?;
        let mut guard = entries.lock();
        if unchanged(&guard, &snapshot) {
            return Some(guard.remove(position).1);
        }
    }
}

/// The keys of `current` are the same keys, in order, as in `snapshot`.
/// Compared without locking any container.
fn unchanged(current: &[(Value, Value)], snapshot: &[(Value, Value)]) -> bool {
    current.len() == snapshot.len()
        && current
            .iter()
            .zip(snapshot)
            .all(|((a, _), (b, _))| same_key(a, b))
}

fn same_key(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(x), Value::List(y)) => Arc::ptr_eq(x, y),
        (Value::Map(x), Value::Map(y)) => Arc::ptr_eq(x, y),
        (Value::List(_) | Value::Map(_), _) | (_, Value::List(_) | Value::Map(_)) => false,
        _ => values_equal(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_value(&Value::Float(5.0)), "5.0");
        assert_eq!(format_value(&Value::Float(2.5)), "2.5");
        assert_eq!(format_value(&Value::Float(f64::INFINITY)), "inf");
        assert_eq!(format_value(&Value::Float(-0.5)), "-0.5");
    }

    #[test]
    fn test_container_formatting() {
        let list = Value::list(vec![Value::Int(1), Value::str("a"), Value::Unit]);
        assert_eq!(format_value(&list), "[1, a, ()]");
        let map = Value::map(vec![(Value::str("k"), Value::Float(1.0))]);
        assert_eq!(format_value(&map), "{k: 1.0}");
        assert_eq!(format_value(&Value::map(Vec::new())), "{}");
    }

    #[test]
    fn test_error_formatting() {
        let err = Value::error(ErrorKind::TypeError, "division by zero");
        assert_eq!(format_value(&err), "TypeError: division by zero");
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert!(values_equal(&Value::Int(2), &Value::Float(2.0)));
        assert!(!values_equal(&Value::Int(2), &Value::str("2")));
        assert!(!values_equal(&Value::Unit, &Value::Bool(false)));
    }

    #[test]
    fn test_lists_compare_structurally() {
        let a = Value::list(vec![Value::Int(1), Value::list(vec![Value::Int(2)])]);
        let b = Value::list(vec![Value::Int(1), Value::list(vec![Value::Int(2)])]);
        assert!(values_equal(&a, &b));
        assert!(values_equal(&a, &a));
    }

    #[test]
    fn test_self_containing_list_formats_and_compares() {
        let xs = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &xs {
            items.lock().push(xs.clone());
        }
        assert_eq!(format_value(&xs), "[1, [...]]");

        let ys = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &ys {
            items.lock().push(ys.clone());
        }
        assert!(values_equal(&xs, &ys));
    }

    #[test]
    fn test_map_keyed_by_itself() {
        let map = Value::map(Vec::new());
        let Value::Map(entries) = &map else {
            unreachable!()
        };
        map_set(entries, Value::map(Vec::new()), Value::Int(1));
        map_set(entries, map.clone(), Value::Int(2));
        assert_eq!(entries.lock().len(), 2);
        assert!(matches!(map_get(entries, &map), Some(Value::Int(2))));
        assert_eq!(format_value(&map), "{{}: 1, {...}: 2}");
        assert!(matches!(map_remove(entries, &map), Some(Value::Int(2))));
        assert_eq!(entries.lock().len(), 1);
    }

    #[test]
    fn test_division_by_zero_is_type_error() {
        for (l, r) in [
            (Value::Int(1), Value::Int(0)),
            (Value::Float(1.0), Value::Float(0.0)),
            (Value::Int(1), Value::Float(0.0)),
        ] {
            let err = binary_op(BinaryOp::Div, &l, &r).unwrap_err();
            assert_eq!(err.kind, ErrorKind::TypeError);
            let err = binary_op(BinaryOp::Mod, &l, &r).unwrap_err();
            assert_eq!(err.kind, ErrorKind::TypeError);
        }
    }

    #[test]
    fn test_overflow_is_type_error() {
        let err = binary_op(BinaryOp::Add, &Value::Int(i64::MAX), &Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        let err = binary_op(BinaryOp::Div, &Value::Int(i64::MIN), &Value::Int(-1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_mixed_arithmetic_promotes() {
        let v = binary_op(BinaryOp::Add, &Value::Int(1), &Value::Float(0.5)).unwrap();
        assert!(matches!(v, Value::Float(x) if x == 1.5));
        let v = binary_op(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).unwrap();
        assert!(matches!(v, Value::Int(3)));
    }

    #[test]
    fn test_concatenation() {
        let v = binary_op(BinaryOp::Add, &Value::str("ab"), &Value::str("cd")).unwrap();
        assert_eq!(format_value(&v), "abcd");
        let a = Value::list(vec![Value::Int(1)]);
        let v = binary_op(BinaryOp::Add, &a, &Value::list(vec![Value::Int(2)])).unwrap();
        assert_eq!(format_value(&v), "[1, 2]");
        assert_eq!(format_value(&a), "[1]");
        assert!(binary_op(BinaryOp::Add, &Value::str("a"), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert!(compare_values(&Value::Int(1), &Value::Float(1.5)).unwrap().is_lt());
        assert!(compare_values(&Value::str("b"), &Value::str("a")).unwrap().is_gt());
        assert!(compare_values(&Value::str("b"), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_range_iteration_is_restartable() {
        let range = Value::Range { start: 1, end: 5 };
        let first: Vec<i64> = iterate(&range).unwrap().filter_map(|v| v.as_int()).collect();
        let second: Vec<i64> = iterate(&range).unwrap().filter_map(|v| v.as_int()).collect();
        assert_eq!(first, vec![1, 2, 3, 4]);
        assert_eq!(first, second);
        assert_eq!(iterate(&Value::Range { start: 5, end: 1 }).unwrap().count(), 0);
    }

    #[test]
    fn test_range_len_saturates_instead_of_overflowing() {
        assert_eq!(range_len(1, 5).unwrap(), 4);
        assert_eq!(range_len(5, 1).unwrap(), 0);
        assert!(range_len(i64::MIN, i64::MAX).is_err());
        assert_eq!(range_len(i64::MAX, i64::MIN).unwrap(), 0);
    }

    #[test]
    fn test_normalize_index() {
        assert_eq!(normalize_index(-1, 3).unwrap(), 2);
        assert_eq!(normalize_index(0, 3).unwrap(), 0);
        assert!(normalize_index(3, 3).is_err());
        assert!(normalize_index(-4, 3).is_err());
    }

    proptest! {
        #[test]
        fn prop_int_addition_matches_checked(a in any::<i64>(), b in any::<i64>()) {
            let result = binary_op(BinaryOp::Add, &Value::Int(a), &Value::Int(b));
            match a.checked_add(b) {
                Some(sum) => prop_assert!(matches!(result, Ok(Value::Int(n)) if n == sum)),
                None => prop_assert!(result.is_err()),
            }
        }

        #[test]
        fn prop_range_len(start in -50i64..50, end in -50i64..50) {
            let count = iterate(&Value::Range { start, end }).unwrap().count() as i64;
            prop_assert_eq!(count, (end - start).max(0));
        }
    }
}
