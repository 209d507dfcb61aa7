//! Recursive-descent parser producing the expression AST.
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, relations (`== != < <= > >= in`),
//! `+ -`, `* / %`, unary `! -`, member access / indexing / calls.
//!
//! Nesting (parentheses, prefix operators, operator and postfix chains) is
//! capped at [`MAX_DEPTH`]; deeper input is a syntax error.

use super::error::ExprError;
use super::lexer::{tokenize, Spanned, Token};
use super::value::Value;

/// Deepest expression tree the parser will build.
pub(crate) const MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Comprehension macros invoked as `range.macro(var, body)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Macro {
    Exists,
    All,
    ExistsOne,
    Filter,
    Map,
}

impl Macro {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "exists" => Some(Macro::Exists),
            "all" => Some(Macro::All),
            "exists_one" => Some(Macro::ExistsOne),
            "filter" => Some(Macro::Filter),
            "map" => Some(Macro::Map),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Ident(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Field {
        target: Box<Expr>,
        name: String,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
    Method {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Comprehension {
        kind: Macro,
        range: Box<Expr>,
        var: String,
        body: Box<Expr>,
    },
}

pub(crate) fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(parser.error(format!("unexpected {:?} after expression", other))),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.offset)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", expected, self.peek())))
        }
    }

    fn error(&self, message: String) -> ExprError {
        ExprError::Syntax {
            offset: self.offset(),
            message,
        }
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("expression nested deeper than {} levels", MAX_DEPTH)));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        let base = self.depth;
        self.descend()?;
        let expr = self.ternary()?;
        self.depth = base;
        Ok(expr)
    }

    fn ternary(&mut self) -> Result<Expr, ExprError> {
        let cond = self.or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.or()?;
        self.expect(Token::Colon)?;
        let otherwise = self.expression()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::and, |t| matches!(t, Token::Or).then_some(BinaryOp::Or))
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::relation, |t| matches!(t, Token::And).then_some(BinaryOp::And))
    }

    fn relation(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::additive, |t| match t {
            Token::Eq => Some(BinaryOp::Eq),
            Token::Ne => Some(BinaryOp::Ne),
            Token::Lt => Some(BinaryOp::Lt),
            Token::Le => Some(BinaryOp::Le),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Ge => Some(BinaryOp::Ge),
            Token::In => Some(BinaryOp::In),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::multiplicative, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::unary, |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    /// Left-associative run of `operand (op operand)*`. Each link deepens
    /// the tree by one.
    fn chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ExprError>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr, ExprError> {
        let base = self.depth;
        let mut lhs = operand(self)?;
        while let Some(op) = op_for(self.peek()) {
            self.advance();
            self.descend()?;
            let rhs = operand(self)?;
            lhs = binary(op, lhs, rhs);
        }
        self.depth = base;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Token::Not => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.member(),
        };
        self.advance();
        let base = self.depth;
        self.descend()?;
        let operand = self.unary()?;
        self.depth = base;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn member(&mut self) -> Result<Expr, ExprError> {
        let base = self.depth;
        let mut expr = self.primary()?;
        loop {
            if matches!(self.peek(), Token::Dot | Token::LBracket) {
                self.descend()?;
            }
            if self.eat(&Token::Dot) {
                let name = match self.advance() {
                    Token::Ident(name) => name,
                    other => return Err(self.error(format!("expected field or method name, found {:?}", other))),
                };
                if !self.eat(&Token::LParen) {
                    expr = Expr::Field {
                        target: Box::new(expr),
                        name,
                    };
                    continue;
                }
                expr = match Macro::from_name(&name) {
                    Some(kind) => self.comprehension(kind, expr)?,
                    None => Expr::Method {
                        target: Box::new(expr),
                        method: name,
                        args: self.arguments()?,
                    },
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                self.depth = base;
                return Ok(expr);
            }
        }
    }

    /// Parse `var, body)` after `range.macro(`.
    fn comprehension(&mut self, kind: Macro, range: Expr) -> Result<Expr, ExprError> {
        let var = match self.advance() {
            Token::Ident(var) => var,
            other => return Err(self.error(format!("macro expects an iteration variable, found {:?}", other))),
        };
        self.expect(Token::Comma)?;
        let body = self.expression()?;
        self.expect(Token::RParen)?;
        Ok(Expr::Comprehension {
            kind,
            range: Box::new(range),
            var,
            body: Box::new(body),
        })
    }

    /// Parse a comma-separated argument list; the opening `(` is already consumed.
    fn arguments(&mut self) -> Result<Vec<Expr>, ExprError> {
        self.sequence(Token::RParen)
    }

    fn sequence(&mut self, close: Token) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(&close) {
                return Ok(items);
            }
            self.expect(Token::Comma)?;
            // Trailing comma.
            if self.eat(&close) {
                return Ok(items);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        match self.advance() {
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::LBracket => Ok(Expr::List(self.sequence(Token::RBracket)?)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    Ok(Expr::Call {
                        function: name,
                        args: self.arguments()?,
                    })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(ExprError::Syntax {
                offset,
                message: format!("unexpected {:?}", other),
            }),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
