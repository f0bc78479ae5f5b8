//! Struct and trait runtime: the type registry, instantiation, method
//! resolution and visibility.
//!
//! Struct definitions live in an arena indexed by [`StructId`]; a struct
//! refers to its parent by id and methods are resolved by walking the parent
//! chain at call time. Trait conformance is checked once, when the struct is
//! defined, and recorded as a set per struct.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::parser::ast::{Expr, FunctionDecl, MethodSig, StructDecl, TraitDecl, Visibility};

use super::environment::Environment;
use super::error::{ErrorKind, RuntimeError};
use super::value::{Function, Instance, Value};
use super::Interpreter;

pub type StructId = usize;
pub type TraitId = usize;

/// A field slot, including fields inherited from ancestors
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub visibility: Visibility,
    pub default: Option<Expr>,
    /// Struct that declared the field
    pub owner: StructId,
}

/// A method as declared by one struct
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub visibility: Visibility,
    pub is_override: bool,
    pub takes_self: bool,
    pub func: Arc<FunctionDecl>,
    pub owner: StructId,
    /// Scope the struct was defined in
    pub env: Arc<Environment>,
}

impl MethodDef {
    /// Whether a call with `argc` arguments (excluding `self`) can bind
    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.func.required_params()
            && (self.func.is_variadic() || argc <= self.func.positional_params())
    }
}

#[derive(Debug)]
pub struct StructDef {
    pub id: StructId,
    pub name: String,
    pub parent: Option<StructId>,
    /// Inherited fields first, then the struct's own, in declaration order
    pub fields: Vec<FieldDef>,
    /// Methods declared by this struct only
    pub methods: HashMap<String, MethodDef>,
    pub traits: Vec<TraitId>,
    pub env: Arc<Environment>,
}

#[derive(Debug, Clone)]
pub struct TraitDef {
    pub id: TraitId,
    pub name: String,
    pub methods: Vec<MethodSig>,
}

/// Every struct and trait defined so far, shared by all threads
#[derive(Debug, Default)]
pub struct Registry {
    structs: Vec<StructDef>,
    traits: Vec<TraitDef>,
    struct_names: HashMap<String, StructId>,
    trait_names: HashMap<String, TraitId>,
    conformance: HashMap<StructId, HashSet<TraitId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_struct(&self, name: &str) -> Option<StructId> {
        self.struct_names.get(name).copied()
    }

    pub fn lookup_trait(&self, name: &str) -> Option<TraitId> {
        self.trait_names.get(name).copied()
    }

    pub fn struct_def(&self, id: StructId) -> Option<&StructDef> {
        self.structs.get(id)
    }

    pub fn trait_def(&self, id: TraitId) -> Option<&TraitDef> {
        self.traits.get(id)
    }

    fn ensure_free_name(&self, name: &str) -> Result<(), RuntimeError> {
        if self.struct_names.contains_key(name) || self.trait_names.contains_key(name) {
            return Err(RuntimeError::definition(format!(
                "`{}` is already defined",
                name
            )));
        }
        Ok(())
    }

    /// Register a trait
    pub fn define_trait(&mut self, decl: &TraitDecl) -> Result<TraitId, RuntimeError> {
        self.ensure_free_name(&decl.name)?;

        let mut seen = HashSet::new();
        for sig in &decl.methods {
            if !seen.insert(sig.name.as_str()) {
                return Err(RuntimeError::definition(format!(
                    "trait `{}` declares `{}` twice",
                    decl.name, sig.name
                )));
            }
        }

        let id = self.traits.len();
        self.traits.push(TraitDef {
            id,
            name: decl.name.clone(),
            methods: decl.methods.clone(),
        });
        self.trait_names.insert(decl.name.clone(), id);
        Ok(id)
    }

    /// Validate and register a struct. Nothing is registered on failure.
    pub fn define_struct(
        &mut self,
        decl: &StructDecl,
        env: Arc<Environment>,
    ) -> Result<StructId, RuntimeError> {
        self.ensure_free_name(&decl.name)?;

        let mut parent = None;
        let mut traits = Vec::new();
        for name in &decl.inherits {
            if let Some(sid) = self.lookup_struct(name) {
                if parent.is_some() {
                    return Err(RuntimeError::definition(format!(
                        "`{}` may inherit from at most one struct",
                        decl.name
                    )));
                }
                parent = Some(sid);
            } else if let Some(tid) = self.lookup_trait(name) {
                if traits.contains(&tid) {
                    return Err(RuntimeError::definition(format!(
                        "`{}` lists trait `{}` twice",
                        decl.name, name
                    )));
                }
                traits.push(tid);
            } else {
                return Err(RuntimeError::definition(format!(
                    "`{}` inherits from unknown struct or trait `{}`",
                    decl.name, name
                )));
            }
        }

        let id = self.structs.len();

        let mut fields = parent
            .and_then(|p| self.struct_def(p))
            .map(|p| p.fields.clone())
            .unwrap_or_default();
        for field in &decl.fields {
            if fields.iter().any(|f| f.name == field.name) {
                return Err(RuntimeError::definition(format!(
                    "duplicate field `{}` in `{}`",
                    field.name, decl.name
                )));
            }
            fields.push(FieldDef {
                name: field.name.clone(),
                visibility: field.visibility,
                default: field.default.clone(),
                owner: id,
            });
        }

        let mut methods: HashMap<String, MethodDef> = HashMap::new();
        for method in &decl.methods {
            let name = method.name();
            if methods.contains_key(name) {
                return Err(RuntimeError::definition(format!(
                    "duplicate method `{}` in `{}`",
                    name, decl.name
                )));
            }
            let inherited = parent.and_then(|p| self.resolve_method(p, name));
            match (inherited, method.is_override) {
                (Some(base), false) => {
                    let base_name = self.struct_name(base.owner);
                    return Err(RuntimeError::definition(format!(
                        "method `{}` in `{}` redefines `{}.{}`; mark it `override`",
                        name, decl.name, base_name, name
                    )));
                }
                (None, true) => {
                    return Err(RuntimeError::definition(format!(
                        "method `{}` in `{}` is marked `override` but overrides nothing",
                        name, decl.name
                    )));
                }
                _ => {}
            }
            methods.insert(
                name.to_string(),
                MethodDef {
                    name: name.to_string(),
                    visibility: method.visibility,
                    is_override: method.is_override,
                    takes_self: method.takes_self,
                    func: Arc::clone(&method.func),
                    owner: id,
                    env: Arc::clone(&env),
                },
            );
        }

        let mut conforms: HashSet<TraitId> = parent
            .and_then(|p| self.conformance.get(&p).cloned())
            .unwrap_or_default();
        for &tid in &traits {
            let Some(trait_def) = self.trait_def(tid) else {
                continue;
            };
            for sig in &trait_def.methods {
                let found = methods
                    .get(&sig.name)
                    .or_else(|| parent.and_then(|p| self.resolve_method(p, &sig.name)));
                match found {
                    Some(m) if m.takes_self && m.accepts(sig.arity) => {}
                    Some(_) => {
                        return Err(RuntimeError::definition(format!(
                            "`{}.{}` does not match `{}.{}`, which takes self and {} arguments",
                            decl.name, sig.name, trait_def.name, sig.name, sig.arity
                        )))
                    }
                    None => {
                        return Err(RuntimeError::definition(format!(
                            "`{}` does not implement `{}.{}`",
                            decl.name, trait_def.name, sig.name
                        )))
                    }
                }
            }
            conforms.insert(tid);
        }

        self.structs.push(StructDef {
            id,
            name: decl.name.clone(),
            parent,
            fields,
            methods,
            traits,
            env,
        });
        self.struct_names.insert(decl.name.clone(), id);
        self.conformance.insert(id, conforms);
        Ok(id)
    }

    pub fn struct_name(&self, id: StructId) -> &str {
        self.struct_def(id).map(|s| s.name.as_str()).unwrap_or("?")
    }

    /// Find a method on `id` or its nearest ancestor that declares it
    pub fn resolve_method(&self, id: StructId, name: &str) -> Option<&MethodDef> {
        let mut current = Some(id);
        while let Some(sid) = current {
            let def = self.struct_def(sid)?;
            if let Some(method) = def.methods.get(name) {
                return Some(method);
            }
            current = def.parent;
        }
        None
    }

    pub fn field(&self, id: StructId, name: &str) -> Option<&FieldDef> {
        self.struct_def(id)?.fields.iter().find(|f| f.name == name)
    }

    /// `child` is `ancestor` or inherits from it
    pub fn is_subtype(&self, child: StructId, ancestor: StructId) -> bool {
        let mut current = Some(child);
        while let Some(sid) = current {
            if sid == ancestor {
                return true;
            }
            current = self.struct_def(sid).and_then(|s| s.parent);
        }
        false
    }

    pub fn implements(&self, id: StructId, trait_id: TraitId) -> bool {
        self.conformance
            .get(&id)
            .is_some_and(|traits| traits.contains(&trait_id))
    }

    /// Whether code running in a method of `context` may touch a member
    /// declared by `owner`
    pub fn can_access(
        &self,
        visibility: Visibility,
        owner: StructId,
        context: Option<StructId>,
    ) -> bool {
        match (visibility, context) {
            (Visibility::Public, _) => true,
            (Visibility::Private, Some(ctx)) => ctx == owner,
            (Visibility::Protected, Some(ctx)) => self.is_subtype(ctx, owner),
            (_, None) => false,
        }
    }
}

fn visibility_label(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "public member",
        Visibility::Protected => "protected member",
        Visibility::Private => "private member",
    }
}

impl Interpreter {
    pub(super) fn define_struct(
        &mut self,
        decl: &StructDecl,
        env: &Arc<Environment>,
    ) -> Result<Value, RuntimeError> {
        let id = self
            .registry
            .write()
            .define_struct(decl, Arc::clone(env))?;
        tracing::debug!(name = %decl.name, id, "defined struct");
        Ok(Value::StructType {
            id,
            name: decl.name.clone(),
        })
    }

    pub(super) fn define_trait(&mut self, decl: &TraitDecl) -> Result<Value, RuntimeError> {
        let id = self.registry.write().define_trait(decl)?;
        tracing::debug!(name = %decl.name, id, "defined trait");
        Ok(Value::TraitType {
            id,
            name: decl.name.clone(),
        })
    }

    /// Build an instance from explicitly supplied fields plus defaults.
    /// Defaults are evaluated in the struct's defining scope.
    pub fn instantiate(
        &mut self,
        struct_id: StructId,
        supplied: Vec<(String, Value)>,
    ) -> Result<Value, RuntimeError> {
        let (name, fields, env) = {
            let registry = self.registry.read();
            let def = registry.struct_def(struct_id).ok_or_else(|| {
                RuntimeError::type_error(format!("unknown struct id {}", struct_id))
            })?;
            (def.name.clone(), def.fields.clone(), Arc::clone(&def.env))
        };

        let mut values: HashMap<String, Value> = HashMap::new();
        for (field, value) in supplied {
            if !fields.iter().any(|f| f.name == field) {
                return Err(RuntimeError::unknown_field(&name, &field));
            }
            if values.insert(field.clone(), value).is_some() {
                return Err(RuntimeError::new(
                    ErrorKind::FieldError,
                    format!("field `{}` of `{}` is set twice", field, name),
                ));
            }
        }

        for field in &fields {
            if values.contains_key(&field.name) {
                continue;
            }
            let Some(default) = &field.default else {
                return Err(RuntimeError::new(
                    ErrorKind::FieldError,
                    format!("missing field `{}` in `{}`", field.name, name),
                ));
            };
            let scope = Environment::child(&env);
            let value = self
                .eval_expr(default, &scope)
                .map_err(|unwind| unwind.into_error())?;
            values.insert(field.name.clone(), value);
        }

        Ok(Value::Instance(Arc::new(Instance {
            struct_id,
            struct_name: name,
            fields: Mutex::new(values),
        })))
    }

    /// Method visible on an instance of `struct_id`, cloned out of the registry
    pub fn resolve_method(&self, struct_id: StructId, name: &str) -> Option<MethodDef> {
        self.registry.read().resolve_method(struct_id, name).cloned()
    }

    fn check_access(
        &self,
        visibility: Visibility,
        owner: StructId,
        member: &str,
    ) -> Result<(), RuntimeError> {
        let registry = self.registry.read();
        if registry.can_access(visibility, owner, self.current_owner) {
            Ok(())
        } else {
            Err(RuntimeError::not_visible(
                visibility_label(visibility),
                registry.struct_name(owner),
                member,
            ))
        }
    }

    fn method_function(method: &MethodDef, receiver: Option<Value>) -> Arc<Function> {
        Arc::new(Function {
            decl: Arc::clone(&method.func),
            env: Arc::clone(&method.env),
            receiver,
            owner: Some(method.owner),
        })
    }

    /// `obj.name` on an instance: a field, else a method bound to `obj`
    pub(super) fn instance_member(
        &mut self,
        receiver: &Value,
        inst: &Arc<Instance>,
        name: &str,
    ) -> Result<Value, RuntimeError> {
        let field = self
            .registry
            .read()
            .field(inst.struct_id, name)
            .map(|f| (f.visibility, f.owner));
        if let Some((visibility, owner)) = field {
            self.check_access(visibility, owner, name)?;
            return inst
                .get_field(name)
                .ok_or_else(|| RuntimeError::unknown_field(&inst.struct_name, name));
        }

        if let Some(method) = self.resolve_method(inst.struct_id, name) {
            self.check_access(method.visibility, method.owner, name)?;
            let bound = method.takes_self.then(|| receiver.clone());
            return Ok(Value::Function(Self::method_function(&method, bound)));
        }

        Err(RuntimeError::unknown_field(&inst.struct_name, name))
    }

    /// `obj.name = value` on an instance
    pub(super) fn set_instance_field(
        &mut self,
        inst: &Arc<Instance>,
        name: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let field = self
            .registry
            .read()
            .field(inst.struct_id, name)
            .map(|f| (f.visibility, f.owner));
        let Some((visibility, owner)) = field else {
            return Err(RuntimeError::unknown_field(&inst.struct_name, name));
        };
        self.check_access(visibility, owner, name)?;
        inst.fields.lock().insert(name.to_string(), value);
        Ok(())
    }

    /// `obj.name(args)`: a method, else a field holding a function
    pub(super) fn call_instance_method(
        &mut self,
        receiver: &Value,
        inst: &Arc<Instance>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if let Some(method) = self.resolve_method(inst.struct_id, name) {
            self.check_access(method.visibility, method.owner, name)?;
            let bound = method.takes_self.then(|| receiver.clone());
            let func = Self::method_function(&method, bound);
            return self.call_function(&func, args);
        }

        match self.instance_member(receiver, inst, name) {
            Ok(callee) if callee.is_callable() => self.call_value(&callee, args),
            Ok(other) => Err(RuntimeError::not_callable(&other)),
            Err(e) => Err(e),
        }
    }

    /// `Type.name(args)` for methods declared without `self`
    pub(super) fn call_static_method(
        &mut self,
        struct_id: StructId,
        struct_name: &str,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let func = self.static_member(struct_id, struct_name, name)?;
        self.call_function(&func, args)
    }

    pub(super) fn static_member(
        &self,
        struct_id: StructId,
        struct_name: &str,
        name: &str,
    ) -> Result<Arc<Function>, RuntimeError> {
        let method = self
            .resolve_method(struct_id, name)
            .ok_or_else(|| RuntimeError::unknown_field(struct_name, name))?;
        if method.takes_self {
            return Err(RuntimeError::type_error(format!(
                "`{}.{}` takes self and must be called on an instance",
                struct_name, name
            )));
        }
        self.check_access(method.visibility, method.owner, name)?;
        Ok(Self::method_function(&method, None))
    }

    /// `implements(value, Trait)`
    pub fn value_implements(&self, value: &Value, trait_id: TraitId) -> bool {
        let struct_id = match value {
            Value::Instance(inst) => inst.struct_id,
            Value::StructType { id, .. } => *id,
            _ => return false,
        };
        self.registry.read().implements(struct_id, trait_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::parser::ast::Stmt;
    use std::path::Path;

    fn declare(registry: &mut Registry, source: &str) -> Result<(), RuntimeError> {
        let program = parse_source(source, Path::new("objects.omn")).expect("parse");
        let env = Environment::new();
        for stmt in &program.stmts {
            match stmt {
                Stmt::StructDef { decl, .. } => {
                    registry.define_struct(decl, Arc::clone(&env))?;
                }
                Stmt::TraitDef { decl, .. } => {
                    registry.define_trait(decl)?;
                }
                other => panic!("unexpected statement {:?}", other),
            }
        }
        Ok(())
    }

    const ANIMALS: &str = r#"
trait Speakable { fun speak(self) -> String }
struct Animal {
    protected name: String
    fun speak(self): "..."
}
struct Dog inherits Animal, Speakable {
    private breed: String = "mutt"
    override fun speak(self): "Woof"
}
struct Puppy inherits Dog {}
"#;

    #[test]
    fn test_method_resolution_order() {
        let mut registry = Registry::new();
        declare(&mut registry, ANIMALS).unwrap();
        let animal = registry.lookup_struct("Animal").unwrap();
        let dog = registry.lookup_struct("Dog").unwrap();
        let puppy = registry.lookup_struct("Puppy").unwrap();

        assert_eq!(registry.resolve_method(puppy, "speak").unwrap().owner, dog);
        assert_eq!(registry.resolve_method(animal, "speak").unwrap().owner, animal);
        assert!(registry.resolve_method(animal, "fetch").is_none());
    }

    #[test]
    fn test_fields_are_inherited() {
        let mut registry = Registry::new();
        declare(&mut registry, ANIMALS).unwrap();
        let puppy = registry.lookup_struct("Puppy").unwrap();
        let names: Vec<&str> = registry
            .struct_def(puppy)
            .unwrap()
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["name", "breed"]);
    }

    #[test]
    fn test_conformance_is_inherited() {
        let mut registry = Registry::new();
        declare(&mut registry, ANIMALS).unwrap();
        let speakable = registry.lookup_trait("Speakable").unwrap();
        let animal = registry.lookup_struct("Animal").unwrap();
        let puppy = registry.lookup_struct("Puppy").unwrap();
        assert!(registry.implements(puppy, speakable));
        assert!(!registry.implements(animal, speakable));
    }

    #[test]
    fn test_visibility_rules() {
        let mut registry = Registry::new();
        declare(&mut registry, ANIMALS).unwrap();
        let animal = registry.lookup_struct("Animal").unwrap();
        let dog = registry.lookup_struct("Dog").unwrap();

        assert!(registry.can_access(Visibility::Protected, animal, Some(dog)));
        assert!(!registry.can_access(Visibility::Protected, dog, Some(animal)));
        assert!(!registry.can_access(Visibility::Private, dog, Some(animal)));
        assert!(registry.can_access(Visibility::Private, dog, Some(dog)));
        assert!(!registry.can_access(Visibility::Protected, animal, None));
        assert!(registry.can_access(Visibility::Public, animal, None));
    }

    fn definition_error(source: &str) -> String {
        let mut registry = Registry::new();
        let err = declare(&mut registry, source).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DefinitionError);
        err.message
    }

    #[test]
    fn test_override_rules() {
        let msg = definition_error("struct A { fun f(self): 1 }\nstruct B inherits A { fun f(self): 2 }");
        assert!(msg.contains("mark it `override`"), "{}", msg);
        let msg = definition_error("struct A {}\nstruct B inherits A { override fun g(self): 2 }");
        assert!(msg.contains("overrides nothing"), "{}", msg);
    }

    #[test]
    fn test_definition_errors() {
        definition_error("struct A {}\nstruct A {}");
        definition_error("struct A {}\nstruct B {}\nstruct C inherits A, B {}");
        definition_error("struct C inherits Missing {}");
        definition_error("struct A { x: Int }\nstruct B inherits A { x: Int }");
        definition_error("trait T { fun m(self) }\nstruct S inherits T {}");
        definition_error("trait T { fun m(self, a) }\nstruct S inherits T { fun m(self) {} }");
    }

    #[test]
    fn test_failed_definition_registers_nothing() {
        let mut registry = Registry::new();
        assert!(declare(&mut registry, "trait T { fun m(self) }\nstruct S inherits T {}").is_err());
        assert!(registry.lookup_struct("S").is_none());
        assert!(registry.lookup_trait("T").is_some());
    }
}
