//! Recursive descent parser for Omnia
//!
//! Binary operators use precedence climbing. There is no error recovery: the
//! first grammar violation aborts the parse.
#![allow(clippy::result_large_err)]

use std::collections::HashSet;
use std::sync::Arc;

use crate::diagnostics::{syntax, Diagnostic, Note, Span};
use crate::parser::ast::*;
use crate::parser::lexer::{Token, TokenKind};

type ParseResult<T> = Result<T, Diagnostic>;

/// Whether a body must be introduced by `:`
#[derive(Clone, Copy, PartialEq, Eq)]
enum Colon {
    Required,
    Optional,
}

/// Parser for Omnia token streams
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Enclosing loops in the current function body
    loop_depth: usize,
    /// Enclosing function bodies
    fn_depth: usize,
}

impl Parser {
    /// Create a parser over a token vector ending in `Eof`
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            loop_depth: 0,
            fn_depth: 0,
        }
    }

    /// Parse a complete program
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let start_span = self.current_span();
        let mut stmts = Vec::new();

        self.skip_separators();
        while !self.is_eof() {
            stmts.push(self.parse_stmt()?);
            self.skip_separators();
        }

        let end_span = self.current_span();
        Ok(Program {
            span: start_span.merge(&end_span),
            stmts,
        })
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let stmt = match self.peek().kind {
            TokenKind::Let | TokenKind::Var | TokenKind::Const => self.parse_var_decl()?,
            TokenKind::Fun if matches!(self.peek_at(1).kind, TokenKind::Ident(_)) => {
                self.parse_fun_decl()?
            }
            TokenKind::Struct => self.parse_struct_def()?,
            TokenKind::Trait => self.parse_trait_def()?,
            TokenKind::Import => self.parse_import()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::Break | TokenKind::Continue => self.parse_loop_jump()?,
            TokenKind::Throw => {
                let start_span = self.current_span();
                self.advance();
                let value = self.parse_expr()?;
                Stmt::Throw {
                    span: start_span.merge(value.span()),
                    value,
                }
            }
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Try => self.parse_try()?,
            _ => self.parse_expr_stmt()?,
        };
        if self.check(TokenKind::Semicolon) {
            self.advance();
        }
        Ok(stmt)
    }

    fn parse_var_decl(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        let kind = match self.advance().kind {
            TokenKind::Var => BindingKind::Var,
            TokenKind::Const => BindingKind::Const,
            _ => BindingKind::Let,
        };
        let name = self.expect_ident()?;
        let ty = if self.check(TokenKind::Colon) {
            self.advance();
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr()?;

        Ok(Stmt::VarDecl {
            span: start_span.merge(value.span()),
            kind,
            name,
            ty,
            value,
        })
    }

    fn parse_fun_decl(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(TokenKind::Fun)?;
        let name = self.expect_ident()?;
        let decl = self.parse_function(Some(name), start_span.clone())?;
        Ok(Stmt::FunDecl {
            span: decl.span.clone(),
            decl: Arc::new(decl),
        })
    }

    /// Parse `(params) -> Ret: body` after the `fun` keyword (and name)
    fn parse_function(&mut self, name: Option<String>, start_span: Span) -> ParseResult<FunctionDecl> {
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;

        let return_type = if self.check(TokenKind::Arrow) {
            self.advance();
            Some(self.parse_type_expr()?)
        } else {
            None
        };

        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.fn_depth += 1;
        let body = self.parse_body(Colon::Optional);
        self.fn_depth -= 1;
        self.loop_depth = saved_loops;
        let body = body?;

        Ok(FunctionDecl {
            span: start_span.merge(&body.span),
            name,
            params,
            return_type,
            body,
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        let mut seen = HashSet::new();

        while !self.check(TokenKind::RParen) {
            let start_span = self.current_span();
            let variadic = if self.check(TokenKind::Star) {
                self.advance();
                true
            } else {
                false
            };
            let name = self.expect_ident()?;
            let ty = if self.check(TokenKind::Colon) {
                self.advance();
                Some(self.parse_type_expr()?)
            } else {
                None
            };
            let default = if self.check(TokenKind::Eq) {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            let span = start_span.merge(&self.previous_span());

            if params.last().is_some_and(|p| p.variadic) {
                return Err(self.error_at(
                    syntax::INVALID_PARAMETERS,
                    "the variadic parameter must be the last parameter",
                    span,
                ));
            }
            if variadic && default.is_some() {
                return Err(self.error_at(
                    syntax::INVALID_PARAMETERS,
                    format!("variadic parameter `{}` cannot have a default value", name),
                    span,
                ));
            }
            if !seen.insert(name.clone()) {
                return Err(self.error_at(
                    syntax::INVALID_PARAMETERS,
                    format!("duplicate parameter `{}`", name),
                    span,
                ));
            }

            params.push(Param {
                span,
                name,
                ty,
                default,
                variadic,
            });

            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(params)
    }

    fn parse_struct_def(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(TokenKind::Struct)?;
        let name = self.expect_ident()?;

        let mut inherits = Vec::new();
        if self.check(TokenKind::Inherits) {
            self.advance();
            inherits.push(self.expect_ident()?);
            while self.check(TokenKind::Comma) {
                self.advance();
                inherits.push(self.expect_ident()?);
            }
        }

        if self.check(TokenKind::Colon) {
            self.advance();
        }
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        loop {
            while self.check(TokenKind::Semicolon) || self.check(TokenKind::Comma) {
                self.advance();
            }
            if self.check(TokenKind::RBrace) || self.is_eof() {
                break;
            }

            let member_span = self.current_span();
            let mut visibility = None;
            let mut is_override = false;
            loop {
                match self.peek().kind {
                    TokenKind::Override if !is_override => is_override = true,
                    TokenKind::Public if visibility.is_none() => {
                        visibility = Some(Visibility::Public)
                    }
                    TokenKind::Protected if visibility.is_none() => {
                        visibility = Some(Visibility::Protected)
                    }
                    TokenKind::Private if visibility.is_none() => {
                        visibility = Some(Visibility::Private)
                    }
                    _ => break,
                }
                self.advance();
            }
            let visibility = visibility.unwrap_or(Visibility::Public);

            if self.check(TokenKind::Fun) {
                methods.push(self.parse_method(member_span, visibility, is_override)?);
            } else {
                if is_override {
                    return Err(self.error_at(
                        syntax::UNEXPECTED_TOKEN,
                        "`override` applies to methods, not fields",
                        member_span,
                    ));
                }
                fields.push(self.parse_field_decl(member_span, visibility)?);
            }
        }

        self.expect(TokenKind::RBrace)?;
        let end_span = self.previous_span();
        let span = start_span.merge(&end_span);
        Ok(Stmt::StructDef {
            span: span.clone(),
            decl: Arc::new(StructDecl {
                span,
                name,
                inherits,
                fields,
                methods,
            }),
        })
    }

    fn parse_field_decl(&mut self, start_span: Span, visibility: Visibility) -> ParseResult<FieldDecl> {
        let name = self.expect_ident()?;
        let ty = if self.check(TokenKind::Colon) {
            self.advance();
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let default = if self.check(TokenKind::Eq) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        if ty.is_none() && default.is_none() {
            return Err(self.error_unexpected("`:` or `=` after field name"));
        }

        Ok(FieldDecl {
            span: start_span.merge(&self.previous_span()),
            name,
            visibility,
            ty,
            default,
        })
    }

    fn parse_method(
        &mut self,
        start_span: Span,
        visibility: Visibility,
        is_override: bool,
    ) -> ParseResult<MethodDecl> {
        self.expect(TokenKind::Fun)?;
        let name = self.expect_ident()?;
        let mut func = self.parse_function(Some(name), start_span.clone())?;

        let takes_self = func
            .params
            .first()
            .is_some_and(|p| p.name == "self" && !p.variadic);
        if takes_self {
            let receiver = func.params.remove(0);
            if receiver.default.is_some() {
                return Err(self.error_at(
                    syntax::INVALID_PARAMETERS,
                    "`self` cannot have a default value",
                    receiver.span,
                ));
            }
        }
        if let Some(param) = func.params.iter().find(|p| p.name == "self") {
            return Err(self.error_at(
                syntax::INVALID_PARAMETERS,
                "`self` must be the first parameter",
                param.span.clone(),
            ));
        }

        Ok(MethodDecl {
            span: func.span.clone(),
            visibility,
            is_override,
            takes_self,
            func: Arc::new(func),
        })
    }

    fn parse_trait_def(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(TokenKind::Trait)?;
        let name = self.expect_ident()?;
        if self.check(TokenKind::Colon) {
            self.advance();
        }
        self.expect(TokenKind::LBrace)?;

        let mut methods = Vec::new();
        loop {
            while self.check(TokenKind::Semicolon) || self.check(TokenKind::Comma) {
                self.advance();
            }
            if self.check(TokenKind::RBrace) || self.is_eof() {
                break;
            }
            let sig_span = self.current_span();
            self.expect(TokenKind::Fun)?;
            let method_name = self.expect_ident()?;
            self.expect(TokenKind::LParen)?;
            let params = self.parse_params()?;
            self.expect(TokenKind::RParen)?;
            if self.check(TokenKind::Arrow) {
                self.advance();
                self.parse_type_expr()?;
            }
            if self.check(TokenKind::Colon) || self.check(TokenKind::LBrace) {
                return Err(self.error_unexpected("end of trait method signature"));
            }
            let arity = params.iter().filter(|p| p.name != "self").count();
            methods.push(MethodSig {
                span: sig_span.merge(&self.previous_span()),
                name: method_name,
                arity,
            });
        }

        self.expect(TokenKind::RBrace)?;
        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::TraitDef {
            span: span.clone(),
            decl: TraitDecl {
                span,
                name,
                methods,
            },
        })
    }

    fn parse_import(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(TokenKind::Import)?;
        let mut module = self.expect_ident()?;
        while self.check(TokenKind::Dot) {
            self.advance();
            module.push('.');
            module.push_str(&self.expect_ident()?);
        }
        let alias = if self.check(TokenKind::As) {
            self.advance();
            Some(self.expect_ident()?)
        } else {
            None
        };
        Ok(Stmt::Import {
            span: start_span.merge(&self.previous_span()),
            module,
            alias,
        })
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(TokenKind::Return)?;
        if self.fn_depth == 0 {
            return Err(self.error_at(
                syntax::MISPLACED_CONTROL_FLOW,
                "`return` outside of a function",
                start_span,
            ));
        }

        let next = self.peek();
        let has_value = !next.newline_before
            && !matches!(
                next.kind,
                TokenKind::RBrace | TokenKind::Semicolon | TokenKind::Else | TokenKind::Eof
            );
        let value = if has_value {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(Stmt::Return {
            span: start_span.merge(&self.previous_span()),
            value,
        })
    }

    fn parse_loop_jump(&mut self) -> ParseResult<Stmt> {
        let token = self.advance();
        if self.loop_depth == 0 {
            return Err(self.error_at(
                syntax::MISPLACED_CONTROL_FLOW,
                format!("{} outside of a loop", token.kind),
                token.span,
            ));
        }
        Ok(match token.kind {
            TokenKind::Break => Stmt::Break { span: token.span },
            _ => Stmt::Continue { span: token.span },
        })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(TokenKind::While)?;
        let cond = self.parse_expr()?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::While {
            span: start_span.merge(&body.span),
            cond,
            body,
        })
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(TokenKind::For)?;
        let var = self.expect_ident()?;
        self.expect(TokenKind::In)?;
        let iterable = self.parse_expr()?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::For {
            span: start_span.merge(&body.span),
            var,
            iterable,
            body,
        })
    }

    fn parse_loop_body(&mut self) -> ParseResult<Block> {
        self.loop_depth += 1;
        let body = self.parse_body(Colon::Required);
        self.loop_depth -= 1;
        body
    }

    fn parse_try(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(TokenKind::Try)?;
        let body = self.parse_braced_body()?;

        let catch = if self.check(TokenKind::Catch) {
            let catch_span = self.current_span();
            self.advance();
            let name = match &self.peek().kind {
                TokenKind::Ident(name) => {
                    let name = name.clone();
                    self.advance();
                    Some(name)
                }
                _ => None,
            };
            let body = self.parse_braced_body()?;
            Some(CatchClause {
                span: catch_span.merge(&body.span),
                name,
                body,
            })
        } else {
            None
        };

        let finally = if self.check(TokenKind::Finally) {
            self.advance();
            Some(self.parse_braced_body()?)
        } else {
            None
        };

        if catch.is_none() && finally.is_none() {
            return Err(self.error_at(
                syntax::INCOMPLETE_TRY,
                "`try` needs a `catch` or a `finally` block",
                start_span,
            ));
        }

        Ok(Stmt::Try {
            span: start_span.merge(&self.previous_span()),
            body,
            catch,
            finally,
        })
    }

    /// `try`, `catch` and `finally` always take a `{ }` block, `:` optional
    fn parse_braced_body(&mut self) -> ParseResult<Block> {
        if self.check(TokenKind::Colon) {
            self.advance();
        }
        self.parse_block()
    }

    fn parse_expr_stmt(&mut self) -> ParseResult<Stmt> {
        let expr = self.parse_expr()?;

        let op = match self.peek().kind {
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::PlusEq => Some(AssignOp::Add),
            TokenKind::MinusEq => Some(AssignOp::Sub),
            TokenKind::StarEq => Some(AssignOp::Mul),
            TokenKind::SlashEq => Some(AssignOp::Div),
            _ => None,
        };

        let Some(op) = op else {
            return Ok(Stmt::Expr {
                span: expr.span().clone(),
                expr,
            });
        };

        if !matches!(
            expr,
            Expr::Identifier { .. } | Expr::FieldAccess { .. } | Expr::Index { .. }
        ) {
            return Err(self.error_at(
                syntax::INVALID_ASSIGNMENT_TARGET,
                "invalid assignment target",
                expr.span().clone(),
            ));
        }
        self.advance();
        let value = self.parse_expr()?;
        Ok(Stmt::Assign {
            span: expr.span().merge(value.span()),
            target: expr,
            op,
            value,
        })
    }

    /// A body after `:` is either `{ stmts }` or a single statement
    fn parse_body(&mut self, colon: Colon) -> ParseResult<Block> {
        let has_colon = self.check(TokenKind::Colon);
        if has_colon {
            self.advance();
        } else if colon == Colon::Required || !self.check(TokenKind::LBrace) {
            return Err(self.error_unexpected("`:`"));
        }

        if self.check(TokenKind::LBrace) {
            return self.parse_block();
        }

        let stmt = self.parse_stmt()?;
        Ok(Block {
            span: stmt.span().clone(),
            stmts: vec![stmt],
        })
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        let start_span = self.current_span();
        self.expect(TokenKind::LBrace)?;

        let mut stmts = Vec::new();
        self.skip_separators();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            stmts.push(self.parse_stmt()?);
            self.skip_separators();
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Block {
            span: start_span.merge(&self.previous_span()),
            stmts,
        })
    }

    fn parse_type_expr(&mut self) -> ParseResult<TypeExpr> {
        if self.check(TokenKind::Fun) {
            self.advance();
            self.expect(TokenKind::LParen)?;
            let mut params = Vec::new();
            while !self.check(TokenKind::RParen) {
                params.push(self.parse_type_expr()?);
                if !self.check(TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
            self.expect(TokenKind::RParen)?;
            let ret = if self.check(TokenKind::Arrow) {
                self.advance();
                Some(Box::new(self.parse_type_expr()?))
            } else {
                None
            };
            return Ok(TypeExpr::Function { params, ret });
        }

        let name = self.expect_ident()?;
        let mut args = Vec::new();
        if self.check(TokenKind::Lt) {
            self.advance();
            args.push(self.parse_type_expr()?);
            while self.check(TokenKind::Comma) {
                self.advance();
                args.push(self.parse_type_expr()?);
            }
            self.expect(TokenKind::Gt)?;
        }
        Ok(TypeExpr::Named { name, args })
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_binary_expr(0)
    }

    fn parse_binary_expr(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary_expr()?;

        loop {
            let token = self.peek();
            let (op, prec) = match token.kind {
                TokenKind::OrOr => (Some(BinaryOp::Or), 1),
                TokenKind::AndAnd => (Some(BinaryOp::And), 2),
                TokenKind::EqEq => (Some(BinaryOp::Eq), 3),
                TokenKind::BangEq => (Some(BinaryOp::Ne), 3),
                TokenKind::Lt => (Some(BinaryOp::Lt), 4),
                TokenKind::LtEq => (Some(BinaryOp::Le), 4),
                TokenKind::Gt => (Some(BinaryOp::Gt), 4),
                TokenKind::GtEq => (Some(BinaryOp::Ge), 4),
                TokenKind::DotDot => (None, 5),
                TokenKind::Plus => (Some(BinaryOp::Add), 6),
                // a `-` opening a new line starts a new statement
                TokenKind::Minus if !token.newline_before => (Some(BinaryOp::Sub), 6),
                TokenKind::Star => (Some(BinaryOp::Mul), 7),
                TokenKind::Slash => (Some(BinaryOp::Div), 7),
                TokenKind::Percent => (Some(BinaryOp::Mod), 7),
                _ => break,
            };

            if prec < min_prec {
                break;
            }

            self.advance();
            let right = self.parse_binary_expr(prec + 1)?;
            let span = left.span().merge(right.span());

            left = match op {
                Some(op) => Expr::Binary {
                    span,
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                None => Expr::Range {
                    span,
                    start: Box::new(left),
                    end: Box::new(right),
                },
            };
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> ParseResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix_expr(),
        };
        let start_span = self.current_span();
        self.advance();
        let expr = self.parse_unary_expr()?;
        Ok(Expr::Unary {
            span: start_span.merge(expr.span()),
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_postfix_expr(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary_expr()?;

        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::LParen if !token.newline_before => {
                    self.advance();
                    let args = self.parse_args(TokenKind::RParen)?;
                    expr = Expr::Call {
                        span: expr.span().merge(&self.previous_span()),
                        callee: Box::new(expr),
                        args,
                    };
                }
                TokenKind::LBracket if !token.newline_before => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index {
                        span: expr.span().merge(&self.previous_span()),
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    let next = self.peek();
                    if next.kind == TokenKind::LParen && !next.newline_before {
                        self.advance();
                        let args = self.parse_args(TokenKind::RParen)?;
                        expr = Expr::MethodCall {
                            span: expr.span().merge(&self.previous_span()),
                            receiver: Box::new(expr),
                            method: name,
                            args,
                        };
                    } else {
                        expr = Expr::FieldAccess {
                            span: expr.span().merge(&self.previous_span()),
                            object: Box::new(expr),
                            field: name,
                        };
                    }
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Comma-separated expressions up to and including `close`
    fn parse_args(&mut self, close: TokenKind) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.check(close.clone()) {
            args.push(self.parse_expr()?);
            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(close)?;
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();

        let literal = match &token.kind {
            TokenKind::IntLit(n) => Some(Literal::Int(*n)),
            TokenKind::FloatLit(x) => Some(Literal::Float(*x)),
            TokenKind::StrLit(s) => Some(Literal::Str(s.clone())),
            TokenKind::True => Some(Literal::Bool(true)),
            TokenKind::False => Some(Literal::Bool(false)),
            _ => None,
        };
        if let Some(value) = literal {
            self.advance();
            return Ok(Expr::Literal {
                span: token.span,
                value,
            });
        }

        match &token.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                if self.at_struct_literal() {
                    return self.parse_struct_literal(name, token.span);
                }
                self.advance();
                Ok(Expr::Identifier {
                    span: token.span,
                    name,
                })
            }
            TokenKind::LParen => {
                self.advance();
                if self.check(TokenKind::RParen) {
                    self.advance();
                    return Ok(Expr::Literal {
                        span: token.span.merge(&self.previous_span()),
                        value: Literal::Unit,
                    });
                }
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_list_expr(),
            TokenKind::LBrace => self.parse_map_expr(),
            TokenKind::Fun => {
                self.advance();
                let decl = self.parse_function(None, token.span)?;
                Ok(Expr::Lambda {
                    span: decl.span.clone(),
                    decl: Arc::new(decl),
                })
            }
            TokenKind::If => self.parse_if_expr(),
            TokenKind::Spawn => {
                self.advance();
                let call = self.parse_postfix_expr()?;
                if !matches!(call, Expr::Call { .. } | Expr::MethodCall { .. }) {
                    return Err(self.error_at(
                        syntax::INVALID_SPAWN,
                        "`spawn` expects a function or method call",
                        call.span().clone(),
                    ));
                }
                Ok(Expr::Spawn {
                    span: token.span.merge(call.span()),
                    call: Box::new(call),
                })
            }
            _ => Err(self.error_unexpected("expression")),
        }
    }

    /// `Name {` on one line, followed by `}` or `field:`
    fn at_struct_literal(&self) -> bool {
        let brace = self.peek_at(1);
        if brace.kind != TokenKind::LBrace || brace.newline_before {
            return false;
        }
        match self.peek_at(2).kind {
            TokenKind::RBrace => true,
            TokenKind::Ident(_) => self.peek_at(3).kind == TokenKind::Colon,
            _ => false,
        }
    }

    fn parse_struct_literal(&mut self, name: String, start_span: Span) -> ParseResult<Expr> {
        self.advance();
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let field = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            fields.push((field, value));
            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::StructLiteral {
            span: start_span.merge(&self.previous_span()),
            name,
            fields,
        })
    }

    fn parse_list_expr(&mut self) -> ParseResult<Expr> {
        let start_span = self.current_span();
        self.expect(TokenKind::LBracket)?;

        if self.check(TokenKind::RBracket) {
            self.advance();
            return Ok(Expr::List {
                span: start_span.merge(&self.previous_span()),
                elements: Vec::new(),
            });
        }

        let first = self.parse_expr()?;
        if self.check(TokenKind::For) {
            let (var, iterable, filter) = self.parse_comprehension_tail()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(Expr::ListComprehension {
                span: start_span.merge(&self.previous_span()),
                element: Box::new(first),
                var,
                iterable,
                filter,
            });
        }

        let mut elements = vec![first];
        while self.check(TokenKind::Comma) {
            self.advance();
            if self.check(TokenKind::RBracket) {
                break;
            }
            elements.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RBracket)?;

        Ok(Expr::List {
            span: start_span.merge(&self.previous_span()),
            elements,
        })
    }

    fn parse_map_expr(&mut self) -> ParseResult<Expr> {
        let start_span = self.current_span();
        self.expect(TokenKind::LBrace)?;

        if self.check(TokenKind::RBrace) {
            self.advance();
            return Ok(Expr::Map {
                span: start_span.merge(&self.previous_span()),
                entries: Vec::new(),
            });
        }

        let key = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let value = self.parse_expr()?;

        if self.check(TokenKind::For) {
            let (var, iterable, filter) = self.parse_comprehension_tail()?;
            self.expect(TokenKind::RBrace)?;
            return Ok(Expr::MapComprehension {
                span: start_span.merge(&self.previous_span()),
                key: Box::new(key),
                value: Box::new(value),
                var,
                iterable,
                filter,
            });
        }

        let mut entries = vec![(key, value)];
        while self.check(TokenKind::Comma) {
            self.advance();
            if self.check(TokenKind::RBrace) {
                break;
            }
            let key = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            entries.push((key, value));
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Expr::Map {
            span: start_span.merge(&self.previous_span()),
            entries,
        })
    }

    /// `for x in iterable (if cond)?` inside a comprehension
    #[allow(clippy::type_complexity)]
    fn parse_comprehension_tail(
        &mut self,
    ) -> ParseResult<(String, Box<Expr>, Option<Box<Expr>>)> {
        self.expect(TokenKind::For)?;
        let var = self.expect_ident()?;
        self.expect(TokenKind::In)?;
        let iterable = Box::new(self.parse_expr()?);
        let filter = if self.check(TokenKind::If) {
            self.advance();
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        Ok((var, iterable, filter))
    }

    fn parse_if_expr(&mut self) -> ParseResult<Expr> {
        let start_span = self.current_span();
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr()?;
        let then_branch = self.parse_body(Colon::Required)?;

        let else_branch = if self.check(TokenKind::Else) {
            self.advance();
            if self.check(TokenKind::If) {
                let nested = self.parse_if_expr()?;
                Some(Block {
                    span: nested.span().clone(),
                    stmts: vec![Stmt::Expr {
                        span: nested.span().clone(),
                        expr: nested,
                    }],
                })
            } else {
                Some(self.parse_body(Colon::Optional)?)
            }
        } else {
            None
        };

        let end_span = else_branch
            .as_ref()
            .map(|b| b.span.clone())
            .unwrap_or_else(|| then_branch.span.clone());
        Ok(Expr::If {
            span: start_span.merge(&end_span),
            cond: Box::new(cond),
            then_branch,
            else_branch,
        })
    }

    // Helper methods

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
        token
    }

    fn previous_span(&self) -> Span {
        let index = self.pos.saturating_sub(1);
        self.tokens[index.min(self.tokens.len().saturating_sub(1))]
            .span
            .clone()
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn current_span(&self) -> Span {
        self.peek().span.clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(&kind)
    }

    fn skip_separators(&mut self) {
        while self.check(TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            Err(self.error_unexpected(&kind.to_string()))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_unexpected("identifier")),
        }
    }

    fn error_unexpected(&self, expected: &str) -> Diagnostic {
        let token = self.peek();
        let code = if token.kind == TokenKind::Eof {
            syntax::UNEXPECTED_EOF
        } else {
            syntax::UNEXPECTED_TOKEN
        };
        let mut builder = Diagnostic::error(code)
            .message(format!("Expected {}, found {}", expected, token.kind))
            .span(token.span.clone());
        if expected == "`:`" {
            builder = builder.note(Note::new(
                "bodies are introduced with `:` followed by a statement or a `{ }` block",
            ));
        }
        builder.build()
    }

    fn error_at(&self, code: &str, message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic::error(code).message(message).span(span).build()
    }
}
