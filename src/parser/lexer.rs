//! Lexer for the Omnia programming language

use crate::diagnostics::{lexical, Diagnostic, Span};
use crate::parser::span::SourceFile;
use logos::Logos;
use std::fmt;

/// Why a slice of input could not be turned into a token
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexErrorKind {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
    InvalidEscape(char),
    InvalidNumber,
}

/// Token types for Omnia
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    // Keywords
    #[token("let")]
    Let,
    #[token("var")]
    Var,
    #[token("const")]
    Const,
    #[token("fun")]
    Fun,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("struct")]
    Struct,
    #[token("trait")]
    Trait,
    #[token("inherits")]
    Inherits,
    #[token("override")]
    Override,
    #[token("public")]
    Public,
    #[token("protected")]
    Protected,
    #[token("private")]
    Private,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("throw")]
    Throw,
    #[token("spawn")]
    Spawn,
    #[token("import")]
    Import,
    #[token("as")]
    As,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Literals
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().map_err(|_| LexErrorKind::InvalidNumber))]
    FloatLit(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().map_err(|_| LexErrorKind::InvalidNumber))]
    IntLit(i64),

    #[regex(r#""([^"\\]|\\.)*"?"#, |lex| unescape(lex.slice()))]
    StrLit(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,

    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Eq,
    #[token("->")]
    Arrow,
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,

    // End of file
    Eof,
}

/// Decode the body of a string literal, rejecting unterminated input
fn unescape(slice: &str) -> Result<String, LexErrorKind> {
    let mut out = String::with_capacity(slice.len());
    let mut chars = slice.chars().skip(1);
    while let Some(c) = chars.next() {
        match c {
            '"' => return Ok(out),
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => return Err(LexErrorKind::InvalidEscape(other)),
                None => return Err(LexErrorKind::UnterminatedString),
            },
            other => out.push(other),
        }
    }
    Err(LexErrorKind::UnterminatedString)
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::IntLit(n) => return write!(f, "integer `{}`", n),
            TokenKind::FloatLit(x) => return write!(f, "float `{}`", x),
            TokenKind::StrLit(s) => return write!(f, "string {:?}", s),
            TokenKind::Ident(name) => return write!(f, "identifier `{}`", name),
            TokenKind::Eof => return write!(f, "end of input"),
            TokenKind::Let => "let",
            TokenKind::Var => "var",
            TokenKind::Const => "const",
            TokenKind::Fun => "fun",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Struct => "struct",
            TokenKind::Trait => "trait",
            TokenKind::Inherits => "inherits",
            TokenKind::Override => "override",
            TokenKind::Public => "public",
            TokenKind::Protected => "protected",
            TokenKind::Private => "private",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Throw => "throw",
            TokenKind::Spawn => "spawn",
            TokenKind::Import => "import",
            TokenKind::As => "as",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Eq => "=",
            TokenKind::Arrow => "->",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
        };
        write!(f, "`{}`", text)
    }
}

/// A token with its span
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line break separates this token from the previous one
    pub newline_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, newline_before: bool) -> Self {
        Self {
            kind,
            span,
            newline_before,
        }
    }
}

/// Lexer for Omnia source code
pub struct Lexer<'a> {
    source: &'a SourceFile,
    logos_lexer: logos::Lexer<'a, TokenKind>,
    last_end: usize,
    at_eof: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source file
    pub fn new(source: &'a SourceFile) -> Self {
        Self {
            source,
            logos_lexer: TokenKind::lexer(source.content()),
            last_end: 0,
            at_eof: false,
        }
    }

    /// Get the next token; returns `Eof` forever once the input is exhausted
    pub fn next_token(&mut self) -> Result<Token, Diagnostic> {
        if self.at_eof {
            return Ok(self.eof_token());
        }

        match self.logos_lexer.next() {
            Some(Ok(kind)) => {
                let range = self.logos_lexer.span();
                let newline_before = self.gap_has_newline(range.start);
                self.last_end = range.end;
                Ok(Token::new(
                    kind,
                    self.source.span(range.start, range.end),
                    newline_before,
                ))
            }
            Some(Err(kind)) => {
                let range = self.logos_lexer.span();
                let span = self.source.span(range.start, range.end);
                let slice = self.logos_lexer.slice();
                let (code, message) = match kind {
                    LexErrorKind::UnexpectedCharacter => (
                        lexical::UNEXPECTED_CHARACTER,
                        format!(
                            "Unexpected character: {:?}",
                            slice.chars().next().unwrap_or(' ')
                        ),
                    ),
                    LexErrorKind::UnterminatedString => (
                        lexical::UNTERMINATED_STRING,
                        "Unterminated string literal".to_string(),
                    ),
                    LexErrorKind::InvalidEscape(c) => (
                        lexical::INVALID_ESCAPE,
                        format!("Invalid escape sequence: \\{}", c),
                    ),
                    LexErrorKind::InvalidNumber => (
                        lexical::INVALID_NUMBER,
                        format!("Invalid number literal: {}", slice),
                    ),
                };
                Err(Diagnostic::error(code).message(message).span(span).build())
            }
            None => {
                self.at_eof = true;
                Ok(self.eof_token())
            }
        }
    }

    /// Lex the whole input; the returned vector always ends with `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn eof_token(&self) -> Token {
        let len = self.source.content().len();
        Token::new(TokenKind::Eof, self.source.eof_span(), self.gap_has_newline(len))
    }

    fn gap_has_newline(&self, start: usize) -> bool {
        self.source
            .content()
            .get(self.last_end..start)
            .is_some_and(|gap| gap.contains('\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        let source_file = SourceFile::new("test.omn", source);
        Lexer::new(&source_file)
            .tokenize()
            .expect("lexing failed")
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| *k != TokenKind::Eof)
            .collect()
    }

    fn lex_err(source: &str) -> Diagnostic {
        let source_file = SourceFile::new("test.omn", source);
        Lexer::new(&source_file)
            .tokenize()
            .expect_err("expected a lex error")
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            lex("let var const fun struct inherits override spawn"),
            vec![
                TokenKind::Let,
                TokenKind::Var,
                TokenKind::Const,
                TokenKind::Fun,
                TokenKind::Struct,
                TokenKind::Inherits,
                TokenKind::Override,
                TokenKind::Spawn,
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            lex(r#"42 3.25 "hi\n" true"#),
            vec![
                TokenKind::IntLit(42),
                TokenKind::FloatLit(3.25),
                TokenKind::StrLit("hi\n".to_string()),
                TokenKind::True,
            ]
        );
    }

    #[test]
    fn test_range_is_not_a_float() {
        assert_eq!(
            lex("1..10"),
            vec![TokenKind::IntLit(1), TokenKind::DotDot, TokenKind::IntLit(10)]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("+= -= *= /= == != <= >= && || ! -> %"),
            vec![
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Arrow,
                TokenKind::Percent,
            ]
        );
    }

    #[test]
    fn test_variadic_marker() {
        assert_eq!(
            lex("*args"),
            vec![TokenKind::Star, TokenKind::Ident("args".to_string())]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            lex("let x = 1 // trailing\n// whole line\nx"),
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".to_string()),
                TokenKind::Eq,
                TokenKind::IntLit(1),
                TokenKind::Ident("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_newline_tracking() {
        let source_file = SourceFile::new("test.omn", "a b\n(c)");
        let tokens = Lexer::new(&source_file).tokenize().unwrap();
        let flags: Vec<bool> = tokens.iter().map(|t| t.newline_before).collect();
        assert_eq!(flags, vec![false, false, true, false, false, false]);
    }

    #[test]
    fn test_unicode_inside_strings() {
        assert_eq!(
            lex(r#""Tâche terminée""#),
            vec![TokenKind::StrLit("Tâche terminée".to_string())]
        );
    }

    #[test]
    fn test_unexpected_character_position() {
        let diag = lex_err("let x = 1\nlet y = @");
        assert_eq!(diag.code, lexical::UNEXPECTED_CHARACTER);
        assert_eq!((diag.span.start_line, diag.span.start_col), (2, 9));
    }

    #[test]
    fn test_unterminated_string() {
        let diag = lex_err("print(\"oops)");
        assert_eq!(diag.code, lexical::UNTERMINATED_STRING);
        assert_eq!(diag.span.start_col, 7);
    }

    #[test]
    fn test_invalid_escape() {
        let diag = lex_err(r#""bad \q""#);
        assert_eq!(diag.code, lexical::INVALID_ESCAPE);
    }

    #[test]
    fn test_integer_overflow_literal() {
        let diag = lex_err("99999999999999999999");
        assert_eq!(diag.code, lexical::INVALID_NUMBER);
    }

    proptest! {
        #[test]
        fn prop_integers_round_trip(n in 0i64..i64::MAX) {
            prop_assert_eq!(lex(&n.to_string()), vec![TokenKind::IntLit(n)]);
        }

        #[test]
        fn prop_identifiers_lex_as_single_token(name in "[a-z_][a-z0-9_]{0,12}") {
            let kinds = lex(&name);
            prop_assert_eq!(kinds.len(), 1);
        }
    }
}
