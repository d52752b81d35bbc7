//! Argspec type expressions: `int`, `one([int, dict])`, `[int, str]`,
//! `list[float]`, `cls(app.models.Dataset)`, ...
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cast::NativeType;
use crate::error::SchemaError;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?P<punct>[()\[\],])|(?P<ident>[A-Za-z_][A-Za-z0-9_.]*))")
        .expect("token pattern compiles")
});

/// Parsed form of a type expression. Whether `dict`/`list` are structured
/// is decided later from the presence of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Native(NativeType),
    ChoiceOfOne(Vec<TypeDescriptor>),
    StructList(Vec<TypeDescriptor>),
    Dict(Option<Box<TypeDescriptor>>),
    List(Option<Box<TypeDescriptor>>),
    Instance(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'s> {
    Open,
    Close,
    LBracket,
    RBracket,
    Comma,
    Ident(&'s str),
}

impl TypeDescriptor {
    pub fn parse(expr: &str) -> Result<Self, SchemaError> {
        let tokens = tokenize(expr)?;
        let mut p = Parser { expr, tokens: &tokens, pos: 0 };
        let ty = p.expr()?;
        if p.pos != tokens.len() {
            return Err(p.fail("trailing input"));
        }
        Ok(ty)
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token<'_>>, SchemaError> {
    let mut out = Vec::new();
    let mut rest = expr;
    while !rest.trim_start().is_empty() {
        let caps = TOKEN.captures(rest).ok_or_else(|| SchemaError::TypeExpr {
            expr: expr.to_string(),
            message: format!("unexpected input at `{}`", rest.trim_start()),
        })?;
        let tok = if let Some(p) = caps.name("punct") {
            match p.as_str() {
                "(" => Token::Open,
                ")" => Token::Close,
                "[" => Token::LBracket,
                "]" => Token::RBracket,
                _ => Token::Comma,
            }
        } else {
            // the pattern always captures one of the two groups
            Token::Ident(caps.name("ident").map_or("", |m| m.as_str()))
        };
        out.push(tok);
        rest = &rest[caps.get(0).map_or(rest.len(), |m| m.end())..];
    }
    Ok(out)
}

struct Parser<'s, 't> {
    expr: &'s str,
    tokens: &'t [Token<'s>],
    pos: usize,
}

impl<'s> Parser<'s, '_> {
    fn fail(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::TypeExpr { expr: self.expr.to_string(), message: message.into() }
    }

    fn next(&mut self) -> Option<Token<'s>> {
        let tok = self.tokens.get(self.pos).copied();
        self.pos += 1;
        tok
    }

    fn peek(&self) -> Option<Token<'s>> {
        self.tokens.get(self.pos).copied()
    }

    fn expect(&mut self, want: Token<'static>) -> Result<(), SchemaError> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(self.fail(format!("expected {want:?}, found {tok:?}"))),
            None => Err(self.fail(format!("expected {want:?}, found end of input"))),
        }
    }

    fn expr(&mut self) -> Result<TypeDescriptor, SchemaError> {
        match self.next() {
            Some(Token::LBracket) => Ok(TypeDescriptor::StructList(self.seq()?)),
            Some(Token::Ident("one")) => {
                self.expect(Token::Open)?;
                self.expect(Token::LBracket)?;
                let candidates = self.seq()?;
                self.expect(Token::Close)?;
                Ok(TypeDescriptor::ChoiceOfOne(candidates))
            }
            Some(Token::Ident("cls")) => {
                self.expect(Token::Open)?;
                let path = match self.next() {
                    Some(Token::Ident(path)) => path.to_string(),
                    _ => return Err(self.fail("cls() takes a dotted type path")),
                };
                self.expect(Token::Close)?;
                Ok(TypeDescriptor::Instance(path))
            }
            Some(Token::Ident("dict")) => Ok(TypeDescriptor::Dict(self.element()?)),
            Some(Token::Ident("list")) => Ok(TypeDescriptor::List(self.element()?)),
            Some(Token::Ident(name)) => name
                .parse::<NativeType>()
                .map(TypeDescriptor::Native)
                .map_err(|_| self.fail(format!("unknown type `{name}`"))),
            Some(tok) => Err(self.fail(format!("unexpected {tok:?}"))),
            None => Err(self.fail("empty type expression")),
        }
    }

    /// `[` already consumed; reads `e, e, ... ]`.
    fn seq(&mut self) -> Result<Vec<TypeDescriptor>, SchemaError> {
        let mut items = Vec::new();
        if self.peek() == Some(Token::RBracket) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => return Ok(items),
                _ => return Err(self.fail("expected ',' or ']'")),
            }
        }
    }

    fn element(&mut self) -> Result<Option<Box<TypeDescriptor>>, SchemaError> {
        if self.peek() != Some(Token::LBracket) {
            return Ok(None);
        }
        self.pos += 1;
        let el = self.expr()?;
        self.expect(Token::RBracket)?;
        Ok(Some(Box::new(el)))
    }
}

fn join(f: &mut fmt::Formatter<'_>, items: &[TypeDescriptor]) -> fmt::Result {
    for (i, t) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{t}")?;
    }
    Ok(())
}

/// The stringified type. Choice-of-one payloads are keyed by this.
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Native(t) => write!(f, "{t}"),
            TypeDescriptor::ChoiceOfOne(ts) => {
                f.write_str("one([")?;
                join(f, ts)?;
                f.write_str("])")
            }
            TypeDescriptor::StructList(ts) => {
                f.write_str("[")?;
                join(f, ts)?;
                f.write_str("]")
            }
            TypeDescriptor::Dict(None) => f.write_str("dict"),
            TypeDescriptor::Dict(Some(el)) => write!(f, "dict[{el}]"),
            TypeDescriptor::List(None) => f.write_str("list"),
            TypeDescriptor::List(Some(el)) => write!(f, "list[{el}]"),
            TypeDescriptor::Instance(path) => write!(f, "cls({path})"),
        }
    }
}
