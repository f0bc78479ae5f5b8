//! Abstract Syntax Tree definitions for Omnia
//!
//! Every node carries its source span. Function bodies and struct
//! declarations sit behind `Arc` so closures, struct definitions and spawned
//! threads share them without copying the tree.

use crate::diagnostics::Span;
use serde::Serialize;
use std::sync::Arc;

/// A parsed source file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

/// A brace-delimited (or single-statement) body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

/// Advisory type annotation; kept in the tree, never enforced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum TypeExpr {
    /// `Int`, `List<Int>`, `Map<String, Int>`
    Named { name: String, args: Vec<TypeExpr> },
    /// `fun(Int, Int) -> Int`
    Function {
        params: Vec<TypeExpr>,
        ret: Option<Box<TypeExpr>>,
    },
}

/// Member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// How a name is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindingKind {
    Let,
    Var,
    Const,
}

impl BindingKind {
    pub fn is_mutable(self) -> bool {
        matches!(self, BindingKind::Var)
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub span: Span,
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub default: Option<Expr>,
    /// `*args`: collects excess positional arguments into a List
    pub variadic: bool,
}

/// A named function, method or lambda
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDecl {
    pub span: Span,
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
}

impl FunctionDecl {
    /// Number of parameters that must be supplied by the caller
    pub fn required_params(&self) -> usize {
        self.params
            .iter()
            .filter(|p| !p.variadic && p.default.is_none())
            .count()
    }

    /// Number of non-variadic parameters
    pub fn positional_params(&self) -> usize {
        self.params.iter().filter(|p| !p.variadic).count()
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }
}

/// Field declaration inside a struct
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDecl {
    pub span: Span,
    pub name: String,
    pub visibility: Visibility,
    pub ty: Option<TypeExpr>,
    pub default: Option<Expr>,
}

/// Method declaration inside a struct
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDecl {
    pub span: Span,
    pub visibility: Visibility,
    pub is_override: bool,
    /// The declaration listed `self` first; it is stripped from `func.params`
    pub takes_self: bool,
    pub func: Arc<FunctionDecl>,
}

impl MethodDecl {
    pub fn name(&self) -> &str {
        self.func.name.as_deref().unwrap_or_default()
    }
}

/// `struct Name inherits Parent, Trait: { ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructDecl {
    pub span: Span,
    pub name: String,
    /// At most one struct plus any number of traits, in source order
    pub inherits: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
}

/// Required method in a trait
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSig {
    pub span: Span,
    pub name: String,
    /// Parameter count excluding `self`
    pub arity: usize,
}

/// `trait Name: { fun m(self) -> T }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitDecl {
    pub span: Span,
    pub name: String,
    pub methods: Vec<MethodSig>,
}

/// `catch e { ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatchClause {
    pub span: Span,
    pub name: Option<String>,
    pub body: Block,
}

/// Assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// Binary operator applied by a compound assignment
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stmt")]
pub enum Stmt {
    VarDecl {
        span: Span,
        kind: BindingKind,
        name: String,
        ty: Option<TypeExpr>,
        value: Expr,
    },
    FunDecl {
        span: Span,
        decl: Arc<FunctionDecl>,
    },
    StructDef {
        span: Span,
        decl: Arc<StructDecl>,
    },
    TraitDef {
        span: Span,
        decl: TraitDecl,
    },
    Import {
        span: Span,
        module: String,
        alias: Option<String>,
    },
    Assign {
        span: Span,
        target: Expr,
        op: AssignOp,
        value: Expr,
    },
    Return {
        span: Span,
        value: Option<Expr>,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Throw {
        span: Span,
        value: Expr,
    },
    While {
        span: Span,
        cond: Expr,
        body: Block,
    },
    For {
        span: Span,
        var: String,
        iterable: Expr,
        body: Block,
    },
    Try {
        span: Span,
        body: Block,
        catch: Option<CatchClause>,
        finally: Option<Block>,
    },
    Expr {
        span: Span,
        expr: Expr,
    },
}

impl Stmt {
    pub fn span(&self) -> &Span {
        match self {
            Stmt::VarDecl { span, .. }
            | Stmt::FunDecl { span, .. }
            | Stmt::StructDef { span, .. }
            | Stmt::TraitDef { span, .. }
            | Stmt::Import { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Throw { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Expr { span, .. } => span,
        }
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node")]
pub enum Expr {
    Literal {
        span: Span,
        value: Literal,
    },
    Identifier {
        span: Span,
        name: String,
    },
    Binary {
        span: Span,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        span: Span,
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// `start..end`, end exclusive
    Range {
        span: Span,
        start: Box<Expr>,
        end: Box<Expr>,
    },
    Call {
        span: Span,
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    MethodCall {
        span: Span,
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    FieldAccess {
        span: Span,
        object: Box<Expr>,
        field: String,
    },
    Index {
        span: Span,
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Lambda {
        span: Span,
        decl: Arc<FunctionDecl>,
    },
    /// `if cond: a else: b`; `else if` nests an `If` inside the else block
    If {
        span: Span,
        cond: Box<Expr>,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    List {
        span: Span,
        elements: Vec<Expr>,
    },
    Map {
        span: Span,
        entries: Vec<(Expr, Expr)>,
    },
    ListComprehension {
        span: Span,
        element: Box<Expr>,
        var: String,
        iterable: Box<Expr>,
        filter: Option<Box<Expr>>,
    },
    MapComprehension {
        span: Span,
        key: Box<Expr>,
        value: Box<Expr>,
        var: String,
        iterable: Box<Expr>,
        filter: Option<Box<Expr>>,
    },
    StructLiteral {
        span: Span,
        name: String,
        fields: Vec<(String, Expr)>,
    },
    /// `spawn f(args)`; the inner expression is always a call or method call
    Spawn {
        span: Span,
        call: Box<Expr>,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Range { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::FieldAccess { span, .. }
            | Expr::Index { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::If { span, .. }
            | Expr::List { span, .. }
            | Expr::Map { span, .. }
            | Expr::ListComprehension { span, .. }
            | Expr::MapComprehension { span, .. }
            | Expr::StructLiteral { span, .. }
            | Expr::Spawn { span, .. } => span,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,
    Not,
}
