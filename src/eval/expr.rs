//! Expression language for automation fields.
//!
//! Authored automation stores conditions, DCs, bonuses and variable values
//! as short expressions (`lastAttackDidHit and not lastSaveDidPass`,
//! `spell + 2`). This module tokenizes and evaluates them.
//!
//! ## Grammar
//!
//! ```text
//! expr  := or
//! or    := and ("or" and)*
//! and   := not ("and" not)*
//! not   := "not" not | cmp
//! cmp   := sum (("==" | "!=" | "<" | "<=" | ">" | ">=") sum)?
//! sum   := term (("+" | "-") term)*
//! term  := unary (("*" | "/" | "//" | "%") unary)*
//! unary := ("-" | "+") unary | call
//! call  := NAME "(" args ")" | atom
//! atom  := INT | STRING | NAME | "True" | "False" | "None" | "(" expr ")"
//! ```
//!
//! Integer division floors; there are no floats.

use thiserror::Error;

use crate::core::Value;

/// Errors raised while parsing or evaluating an expression.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The expression text could not be parsed.
    #[error("invalid syntax in `{expr}`: {reason}")]
    Syntax { expr: String, reason: String },

    /// A name was not bound.
    #[error("name `{0}` is not defined")]
    UnknownName(String),

    /// An operator was applied to unsupported operand types.
    #[error("unsupported operand types for {op}: {left} and {right}")]
    Type {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Unknown function or wrong arguments.
    #[error("bad call to `{name}`: {reason}")]
    Call { name: String, reason: String },
}

/// Resolves names during evaluation.
pub trait NameLookup {
    /// Look up the value bound to `name`.
    fn lookup(&self, name: &str) -> Option<Value>;
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Int(i64),
    Str(String),
    Name(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<Token>, EvalError> {
    let syntax = |reason: String| EvalError::Syntax {
        expr: src.to_string(),
        reason,
    };
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| syntax(format!("integer `{text}` out of range")))?;
                tokens.push(Token::Int(value));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(syntax("unterminated string".to_string()));
                }
                tokens.push(Token::Str(chars[start..i].iter().collect()));
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
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            _ => {
                let next = chars.get(i + 1).copied();
                let (op, len): (&'static str, usize) = match (c, next) {
                    ('/', Some('/')) => ("//", 2),
                    ('=', Some('=')) => ("==", 2),
                    ('!', Some('=')) => ("!=", 2),
                    ('<', Some('=')) => ("<=", 2),
                    ('>', Some('=')) => (">=", 2),
                    ('<', _) => ("<", 1),
                    ('>', _) => (">", 1),
                    ('+', _) => ("+", 1),
                    ('-', _) => ("-", 1),
                    ('*', _) => ("*", 1),
                    ('/', _) => ("/", 1),
                    ('%', _) => ("%", 1),
                    _ => return Err(syntax(format!("unexpected character `{c}`"))),
                };
                tokens.push(Token::Op(op));
                i += len;
            }
        }
    }

    Ok(tokens)
}

/// Parsed expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    Unary(&'static str, Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> EvalError {
        EvalError::Syntax {
            expr: self.src.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(n)) if n == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if self.eat_keyword("not") {
            let inner = self.parse_not()?;
            return Ok(Expr::Unary("not", Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, EvalError> {
        let left = self.parse_sum()?;
        if let Some(op) = self.eat_op(&["==", "!=", "<", "<=", ">", ">="]) {
            let right = self.parse_sum()?;
            return Ok(Expr::Binary(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_sum(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "//", "%"]) {
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if let Some(op) = self.eat_op(&["-", "+"]) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(op, Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, EvalError> {
        match self.next() {
            Some(Token::Int(v)) => Ok(Expr::Literal(Value::Int(v))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Name(name)) => match name.as_str() {
                "True" => Ok(Expr::Literal(Value::Bool(true))),
                "False" => Ok(Expr::Literal(Value::Bool(false))),
                "None" => Ok(Expr::Literal(Value::None)),
                "and" | "or" | "not" => Err(self.error(format!("unexpected keyword `{name}`"))),
                _ if self.peek() == Some(&Token::LParen) => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.parse_or()?);
                            if self.peek() == Some(&Token::Comma) {
                                self.pos += 1;
                            } else {
                                break;
                            }
                        }
                    }
                    match self.next() {
                        Some(Token::RParen) => Ok(Expr::Call(name, args)),
                        _ => Err(self.error("expected `)` after arguments")),
                    }
                }
                _ => Ok(Expr::Name(name)),
            },
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("expected `)`")),
                }
            }
            Some(other) => Err(self.error(format!("unexpected token {other:?}"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

/// Parse an expression.
pub fn parse(src: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { src, tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

impl Expr {
    /// Evaluate against a set of bound names.
    pub fn eval(&self, names: &dyn NameLookup) -> Result<Value, EvalError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => names
                .lookup(name)
                .ok_or_else(|| EvalError::UnknownName(name.clone())),
            Expr::Unary(op, inner) => {
                let value = inner.eval(names)?;
                match (*op, &value) {
                    ("not", _) => Ok(Value::Bool(!value.is_truthy())),
                    ("-", _) => value.as_int().map(|v| Value::Int(v.wrapping_neg())).ok_or(EvalError::Type {
                        op: "unary -",
                        left: value.type_name(),
                        right: value.type_name(),
                    }),
                    _ => value.as_int().map(Value::Int).ok_or(EvalError::Type {
                        op: "unary +",
                        left: value.type_name(),
                        right: value.type_name(),
                    }),
                }
            }
            Expr::And(left, right) => {
                let l = left.eval(names)?;
                if l.is_truthy() {
                    right.eval(names)
                } else {
                    Ok(l)
                }
            }
            Expr::Or(left, right) => {
                let l = left.eval(names)?;
                if l.is_truthy() {
                    Ok(l)
                } else {
                    right.eval(names)
                }
            }
            Expr::Binary(op, left, right) => {
                let l = left.eval(names)?;
                let r = right.eval(names)?;
                binary(*op, l, r)
            }
            Expr::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval(names))
                    .collect::<Result<Vec<_>, _>>()?;
                call(name, &values)
            }
        }
    }
}

fn binary(op: &'static str, l: Value, r: Value) -> Result<Value, EvalError> {
    let type_err = |l: &Value, r: &Value| EvalError::Type {
        op,
        left: l.type_name(),
        right: r.type_name(),
    };

    match op {
        "==" => return Ok(Value::Bool(loose_eq(&l, &r))),
        "!=" => return Ok(Value::Bool(!loose_eq(&l, &r))),
        _ => {}
    }

    if let (Value::Str(a), Value::Str(b)) = (&l, &r) {
        return match op {
            "+" => Ok(Value::Str(format!("{a}{b}"))),
            "<" => Ok(Value::Bool(a < b)),
            "<=" => Ok(Value::Bool(a <= b)),
            ">" => Ok(Value::Bool(a > b)),
            ">=" => Ok(Value::Bool(a >= b)),
            _ => Err(type_err(&l, &r)),
        };
    }

    let (a, b) = match (l.as_int(), r.as_int()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(type_err(&l, &r)),
    };

    let value = match op {
        "+" => Value::Int(a.wrapping_add(b)),
        "-" => Value::Int(a.wrapping_sub(b)),
        "*" => Value::Int(a.wrapping_mul(b)),
        "/" | "//" => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Value::Int(a.wrapping_div_euclid(b) - i64::from(b < 0 && a.wrapping_rem_euclid(b) != 0))
        }
        "%" => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let m = a.wrapping_rem_euclid(b);
            Value::Int(if b < 0 && m != 0 { m + b } else { m })
        }
        "<" => Value::Bool(a < b),
        "<=" => Value::Bool(a <= b),
        ">" => Value::Bool(a > b),
        ">=" => Value::Bool(a >= b),
        _ => return Err(type_err(&l, &r)),
    };
    Ok(value)
}

fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l.as_int(), r.as_int()) {
        (Some(a), Some(b)) => a == b,
        _ => l == r,
    }
}

fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let bad = |reason: &str| EvalError::Call {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let ints = || {
        args.iter()
            .map(|v| v.as_int().ok_or_else(|| bad("expected integer arguments")))
            .collect::<Result<Vec<_>, _>>()
    };

    match name {
        "min" | "max" => {
            let values = ints()?;
            let picked = if name == "min" {
                values.iter().min()
            } else {
                values.iter().max()
            };
            picked.copied().map(Value::Int).ok_or_else(|| bad("expected at least one argument"))
        }
        "abs" => match ints()?.as_slice() {
            [v] => Ok(Value::Int(v.wrapping_abs())),
            _ => Err(bad("expected one argument")),
        },
        "int" => match args {
            [Value::Str(s)] => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| bad("string is not an integer")),
            [v] => v.as_int().map(Value::Int).ok_or_else(|| bad("cannot convert to int")),
            _ => Err(bad("expected one argument")),
        },
        "str" => match args {
            [v] => Ok(Value::Str(v.to_string())),
            _ => Err(bad("expected one argument")),
        },
        _ => Err(bad("unknown function")),
    }
}
