//! Dialect AST and recursive-descent parser.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! program    := (statement? NEWLINE)*
//! statement  := IDENT '=' expr | expr
//! expr       := or
//! or         := and ('or' and)*
//! and        := unary_not ('and' unary_not)*
//! unary_not  := 'not' unary_not | comparison
//! comparison := additive (('=='|'!='|'<'|'<='|'>'|'>=') additive)?
//! additive   := term (('+'|'-') term)*
//! term       := unary (('*'|'/'|'%') unary)*
//! unary      := '-' unary | postfix
//! postfix    := primary ('.' IDENT '(' args ')' | '[' expr ']')*
//! primary    := literal | IDENT | '(' expr ')' | '[' args ']'
//! ```
//!
//! Deliberately absent: bare calls, attribute access outside call position,
//! any binding form other than simple assignment, and any loop or import
//! construct. The parser cannot produce a node the workbench does not know
//! how to confine. Positions are kept on the nodes diagnostics point at —
//! name lookups and method calls.

use super::lexer::{tokenize, Pos, Spanned, Token};
use super::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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
    pub fn symbol(&self) -> &'static str {
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
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Expr>),
    Name(String, Pos),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    MethodCall {
        recv: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        pos: Pos,
    },
    Index {
        recv: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign { name: String, expr: Expr },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// Parses a full script.
pub fn parse(source: &str) -> Result<Program, ScriptError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).program()
}

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, index: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|s| &s.token)
    }

    fn peek_pos(&self) -> Pos {
        self.tokens
            .get(self.index)
            .map(|s| s.pos)
            .unwrap_or_else(|| self.end_pos())
    }

    fn end_pos(&self) -> Pos {
        self.tokens
            .last()
            .map(|s| s.pos)
            .unwrap_or(Pos { line: 1, column: 1 })
    }

    fn bump(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.index).cloned();
        if spanned.is_some() {
            self.index += 1;
        }
        spanned
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, context: &str) -> Result<(), ScriptError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(context))
        }
    }

    fn unexpected(&self, context: &str) -> ScriptError {
        let pos = self.peek_pos();
        let found = match self.peek() {
            Some(token) => token.describe(),
            None => "end of input".to_string(),
        };
        ScriptError::Syntax {
            line: pos.line,
            column: pos.column,
            message: format!("expected {context}, found {found}"),
        }
    }

    fn program(&mut self) -> Result<Program, ScriptError> {
        let mut statements = Vec::new();
        loop {
            while self.eat(&Token::Newline) {}
            if self.peek().is_none() {
                break;
            }
            statements.push(self.statement()?);
            // A statement ends at a separator or end of input
            if self.peek().is_some() && !self.eat(&Token::Newline) {
                return Err(self.unexpected("end of statement"));
            }
        }
        Ok(Program { statements })
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        // Assignment needs two tokens of lookahead: IDENT '='
        if let (Some(Token::Ident(_)), Some(Token::Assign)) = (
            self.peek(),
            self.tokens.get(self.index + 1).map(|s| &s.token),
        ) {
            let spanned = self.bump().expect("peeked ident");
            let name = match spanned.token {
                Token::Ident(name) => name,
                _ => unreachable!(),
            };
            self.bump(); // '='
            let expr = self.expr()?;
            return Ok(Stmt::Assign { name, expr });
        }
        Ok(Stmt::Expr(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.not_expr()?;
        while self.eat(&Token::And) {
            let rhs = self.not_expr()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Token::Not) {
            let operand = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.additive()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Token::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    let pos = self.peek_pos();
                    self.bump();
                    let method = match self.bump() {
                        Some(Spanned {
                            token: Token::Ident(name),
                            ..
                        }) => name,
                        _ => return Err(self.unexpected("method name after '.'")),
                    };
                    // Attribute access exists only in call position
                    self.expect(&Token::LParen, "'(' after method name")?;
                    let args = self.args(Token::RParen)?;
                    expr = Expr::MethodCall {
                        recv: Box::new(expr),
                        method,
                        args,
                        pos,
                    };
                }
                Some(Token::LBracket) => {
                    self.bump();
                    let index = self.expr()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Index {
                        recv: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn args(&mut self, close: Token) -> Result<Vec<Expr>, ScriptError> {
        let mut args = Vec::new();
        if self.eat(&close) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::Comma) {
                // Trailing comma allowed before the closer
                if self.eat(&close) {
                    return Ok(args);
                }
                continue;
            }
            self.expect(&close, "',' or closing delimiter")?;
            return Ok(args);
        }
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let pos = self.peek_pos();
        match self.peek() {
            Some(Token::Null) => {
                self.bump();
                Ok(Expr::Null)
            }
            Some(Token::True) => {
                self.bump();
                Ok(Expr::Bool(true))
            }
            Some(Token::False) => {
                self.bump();
                Ok(Expr::Bool(false))
            }
            Some(Token::Int(i)) => {
                let i = *i;
                self.bump();
                Ok(Expr::Int(i))
            }
            Some(Token::Float(f)) => {
                let f = *f;
                self.bump();
                Ok(Expr::Float(f))
            }
            Some(Token::Str(_)) => {
                let spanned = self.bump().expect("peeked");
                match spanned.token {
                    Token::Str(s) => Ok(Expr::Str(s)),
                    _ => unreachable!(),
                }
            }
            Some(Token::Ident(_)) => {
                let spanned = self.bump().expect("peeked");
                match spanned.token {
                    Token::Ident(name) => Ok(Expr::Name(name, pos)),
                    _ => unreachable!(),
                }
            }
            Some(Token::LParen) => {
                self.bump();
                let expr = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                self.bump();
                let items = self.args(Token::RBracket)?;
                Ok(Expr::List(items))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}
