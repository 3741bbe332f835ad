//! Hand-written expression evaluator for `test=`, `collection=`, `<bind>`
//! values, and the bodies of `#{…}`/`${…}` tokens.
//!
//! Grammar (see SPEC_FULL §4 for the rationale behind fixing this instead of
//! deriving it from the untested original source):
//!
//! ```text
//! expr       := or_expr
//! or_expr    := and_expr ( "||" and_expr )*
//! and_expr   := unary ( "&&" unary )*
//! unary      := "!" unary | comparison
//! comparison := primary ( ("==" | "!=" | "<=" | ">=" | "<" | ">") primary )?
//! primary    := "(" or_expr ")" | literal | path
//! path       := ident ( "." ident | "[" (int | string) "]" )*
//! literal    := "null" | "true" | "false" | number | 'string' | "string"
//! ```

use serde_json::Value;

use crate::binding::BindingContext;
use crate::error::{MapperError, MapperResult};

/// One segment of a resolved property path: `a.b[0]['k']`.
#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Field(String),
    Index(i64),
    Key(String),
}

/// A parsed expression, ready to evaluate repeatedly against different
/// binding contexts (spec §4.2: evaluation must be pure, so a parsed
/// expression is immutable and reusable).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Path(String, Vec<PathSegment>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse an expression string once.
    pub fn parse(source: &str) -> MapperResult<Expr> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(MapperError::evaluation(format!(
                "trailing tokens after expression '{source}'"
            )));
        }
        Ok(expr)
    }

    /// Evaluate to a [`Value`] (used by `${…}` substitution and `<bind>`).
    pub fn eval(&self, ctx: &BindingContext) -> MapperResult<Value> {
        match self {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Path(root_name, segments) => resolve_path(ctx, root_name, segments),
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval(ctx)?))),
            Expr::And(a, b) => {
                let left = truthy(&a.eval(ctx)?);
                if !left {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truthy(&b.eval(ctx)?)))
            }
            Expr::Or(a, b) => {
                let left = truthy(&a.eval(ctx)?);
                if left {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truthy(&b.eval(ctx)?)))
            }
            Expr::Eq(a, b) => Ok(Value::Bool(values_equal(&a.eval(ctx)?, &b.eval(ctx)?))),
            Expr::Ne(a, b) => Ok(Value::Bool(!values_equal(&a.eval(ctx)?, &b.eval(ctx)?))),
            Expr::Lt(a, b) => compare(ctx, a, b, |o| o == std::cmp::Ordering::Less),
            Expr::Le(a, b) => compare(ctx, a, b, |o| o != std::cmp::Ordering::Greater),
            Expr::Gt(a, b) => compare(ctx, a, b, |o| o == std::cmp::Ordering::Greater),
            Expr::Ge(a, b) => compare(ctx, a, b, |o| o != std::cmp::Ordering::Less),
        }
    }

    /// Evaluate as a `test=` truthiness check.
    pub fn eval_truthy(&self, ctx: &BindingContext) -> MapperResult<bool> {
        Ok(truthy(&self.eval(ctx)?))
    }
}

fn compare(
    ctx: &BindingContext,
    a: &Expr,
    b: &Expr,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> MapperResult<Value> {
    let left = a.eval(ctx)?;
    let right = b.eval(ctx)?;
    let (lf, rf) = match (as_f64(&left), as_f64(&right)) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            let ls = as_str(&left);
            let rs = as_str(&right);
            match (ls, rs) {
                (Some(l), Some(r)) => {
                    return Ok(Value::Bool(accept(l.cmp(&r))));
                }
                _ => {
                    return Err(MapperError::evaluation(format!(
                        "cannot compare {left:?} and {right:?}"
                    )));
                }
            }
        }
    };
    let ordering = lf
        .partial_cmp(&rf)
        .ok_or_else(|| MapperError::evaluation("NaN is not ordered"))?;
    Ok(Value::Bool(accept(ordering)))
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn as_str(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
        return a == b;
    }
    a == b
}

/// Truthiness per spec §4.2: null => false; bool => itself; numeric =>
/// non-zero; string => non-empty; array/object => non-empty; else true.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Render a value for `${…}` substitution: raw text, no quoting.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => v.to_string(),
    }
}

fn resolve_path(
    ctx: &BindingContext,
    root_name: &str,
    segments: &[PathSegment],
) -> MapperResult<Value> {
    if root_name == "null" {
        return Ok(Value::Null);
    }
    if root_name == "true" {
        return Ok(Value::Bool(true));
    }
    if root_name == "false" {
        return Ok(Value::Bool(false));
    }

    let mut current = ctx.resolve_name(root_name).unwrap_or(Value::Null);
    for seg in segments {
        current = match (seg, &current) {
            (PathSegment::Field(name), Value::Object(map)) => {
                map.get(name).cloned().unwrap_or(Value::Null)
            }
            (PathSegment::Key(name), Value::Object(map)) => {
                map.get(name).cloned().unwrap_or(Value::Null)
            }
            (PathSegment::Index(i), Value::Array(arr)) => {
                let idx = usize::try_from(*i).map_err(|_| {
                    MapperError::evaluation(format!("negative index {i} in path '{root_name}'"))
                })?;
                arr.get(idx).cloned().unwrap_or(Value::Null)
            }
            (_, Value::Null) => Value::Null,
            (seg, other) => {
                return Err(MapperError::evaluation(format!(
                    "cannot index {other:?} with {seg:?} while evaluating '{root_name}'"
                )));
            }
        };
    }
    Ok(current)
}

// ==================== Tokenizer ====================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Not,
    AndAnd,
    OrOr,
    EqEq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

fn tokenize(source: &str) -> MapperResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == quote {
                        closed = true;
                        i += 1;
                        break;
                    }
                    s.push(chars[i]);
                    i += 1;
                }
                if !closed {
                    return Err(MapperError::evaluation(format!(
                        "unterminated string literal in '{source}'"
                    )));
                }
                tokens.push(Token::Str(s));
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text
                    .parse()
                    .map_err(|_| MapperError::evaluation(format!("bad number literal '{text}'")))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(text));
            }
            other => {
                return Err(MapperError::evaluation(format!(
                    "unexpected character '{other}' in expression '{source}'"
                )));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> MapperResult<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::OrOr)) {
            self.bump();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> MapperResult<Expr> {
        let mut left = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::AndAnd)) {
            self.bump();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> MapperResult<Expr> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> MapperResult<Expr> {
        let left = self.parse_primary()?;
        let op = match self.peek() {
            Some(Token::EqEq) => Some(Expr::Eq as fn(_, _) -> _),
            Some(Token::Ne) => Some(Expr::Ne as fn(_, _) -> _),
            Some(Token::Lt) => Some(Expr::Lt as fn(_, _) -> _),
            Some(Token::Le) => Some(Expr::Le as fn(_, _) -> _),
            Some(Token::Gt) => Some(Expr::Gt as fn(_, _) -> _),
            Some(Token::Ge) => Some(Expr::Ge as fn(_, _) -> _),
            _ => None,
        };
        let Some(ctor) = op else {
            return Ok(left);
        };
        self.bump();
        let right = self.parse_primary()?;
        Ok(ctor(Box::new(left), Box::new(right)))
    }

    fn parse_primary(&mut self) -> MapperResult<Expr> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.bump();
            let inner = self.parse_or()?;
            match self.bump() {
                Some(Token::RParen) => {}
                other => {
                    return Err(MapperError::evaluation(format!(
                        "expected ')', found {other:?}"
                    )));
                }
            }
            return Ok(inner);
        }
        match self.bump() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(name)) => {
                if name == "null" {
                    return Ok(Expr::Null);
                }
                if name == "true" {
                    return Ok(Expr::Bool(true));
                }
                if name == "false" {
                    return Ok(Expr::Bool(false));
                }
                let mut segments = Vec::new();
                loop {
                    match self.peek() {
                        Some(Token::Dot) => {
                            self.bump();
                            match self.bump() {
                                Some(Token::Ident(field)) => {
                                    segments.push(PathSegment::Field(field))
                                }
                                other => {
                                    return Err(MapperError::evaluation(format!(
                                        "expected identifier after '.', found {other:?}"
                                    )));
                                }
                            }
                        }
                        Some(Token::LBracket) => {
                            self.bump();
                            match self.bump() {
                                Some(Token::Number(n)) => segments.push(PathSegment::Index(n as i64)),
                                Some(Token::Str(s)) => segments.push(PathSegment::Key(s)),
                                other => {
                                    return Err(MapperError::evaluation(format!(
                                        "expected index or key inside '[...]', found {other:?}"
                                    )));
                                }
                            }
                            match self.bump() {
                                Some(Token::RBracket) => {}
                                other => {
                                    return Err(MapperError::evaluation(format!(
                                        "expected ']', found {other:?}"
                                    )));
                                }
                            }
                        }
                        _ => break,
                    }
                }
                Ok(Expr::Path(name, segments))
            }
            other => Err(MapperError::evaluation(format!(
                "expected a literal or a property path, found {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingContext;

    fn truthy_of(expr: &str, root: &Value) -> bool {
        let ctx = BindingContext::new(root);
        Expr::parse(expr).unwrap().eval_truthy(&ctx).unwrap()
    }

    #[test]
    fn parenthesized_grouping_overrides_precedence() {
        let root = serde_json::json!({"a": false, "b": true, "c": false});
        assert!(truthy_of("a || b && c", &root));
        assert!(!truthy_of("(a || b) && c", &root));
    }

    #[test]
    fn nested_parens_and_negation() {
        let root = serde_json::json!({"a": true, "b": false});
        assert!(truthy_of("!(a && b)", &root));
        assert!(truthy_of("!((a) && (b))", &root));
    }

    #[test]
    fn unmatched_paren_is_an_evaluation_error() {
        let err = Expr::parse("(a && b").unwrap_err();
        assert!(matches!(err, MapperError::Evaluation(_)));
    }
}
