//! Recursive-descent parser producing the expression AST
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons (incl. `in`),
//! `+ -`, `* / // %`, unary `+ -`, `**`, then subscripts and atoms.

use super::functions::Function;
use super::lexer::{tokenize, Token};
use crate::error::{EngineError, Result};
use serde_json::Value;

/// Maximum nesting of sub-expressions
///
/// Every bracket, unary operator, binary operator and subscript in a chain
/// counts one level, so the syntax tree never grows deeper than this.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

/// Expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    List(Vec<Expr>),
    Object(Vec<(Expr, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `a < b <= c` holds when every adjacent pair holds
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    Index(Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

/// Statement of a function-node script
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name = expr`
    Assign(String, Expr),
    /// `name[k1][k2] = expr`
    AssignIndex {
        name: String,
        keys: Vec<Expr>,
        value: Expr,
    },
    /// `name += expr` and friends
    AugAssign(String, BinaryOp, Expr),
    Expr(Expr),
}

/// Parse a single expression
pub fn parse_expression(source: &str) -> Result<Expr> {
    let mut parser = Parser::new(tokenize(source)?);
    parser.skip_separators();
    let expr = parser.expression()?;
    parser.skip_separators();
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a sequence of statements
pub fn parse_program(source: &str) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(tokenize(source)?);
    let mut statements = Vec::new();
    loop {
        parser.skip_separators();
        if parser.peek() == &Token::Eof {
            break;
        }
        statements.push(parser.statement()?);
        match parser.peek() {
            Token::Newline => {}
            Token::Eof => break,
            other => {
                return Err(EngineError::expression(format!(
                    "expected end of statement, found {:?}",
                    other
                )))
            }
        }
    }
    Ok(statements)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(EngineError::expression(format!(
                "expected {:?}, found {:?}",
                token,
                self.peek()
            )))
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(EngineError::expression(format!(
                "unexpected token {:?}",
                other
            ))),
        }
    }

    fn skip_separators(&mut self) {
        while self.eat(&Token::Newline) {}
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EngineError::expression(format!(
                "expression nested deeper than {} levels",
                MAX_DEPTH
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn statement(&mut self) -> Result<Stmt> {
        let target = self.expression()?;

        let aug = match self.peek() {
            Token::PlusAssign => Some(BinaryOp::Add),
            Token::MinusAssign => Some(BinaryOp::Sub),
            Token::StarAssign => Some(BinaryOp::Mul),
            _ => None,
        };
        if let Some(op) = aug {
            self.advance();
            let value = self.expression()?;
            return match target {
                Expr::Variable(name) => Ok(Stmt::AugAssign(name, op, value)),
                _ => Err(EngineError::expression(
                    "augmented assignment requires a variable name",
                )),
            };
        }

        if !self.eat(&Token::Assign) {
            return Ok(Stmt::Expr(target));
        }
        let value = self.expression()?;

        match target {
            Expr::Variable(name) => Ok(Stmt::Assign(name, value)),
            Expr::Index(..) => {
                let mut keys = Vec::new();
                let mut current = target;
                loop {
                    match current {
                        Expr::Index(base, key) => {
                            keys.push(*key);
                            current = *base;
                        }
                        Expr::Variable(name) => {
                            keys.reverse();
                            return Ok(Stmt::AssignIndex { name, keys, value });
                        }
                        _ => return Err(EngineError::expression("invalid assignment target")),
                    }
                }
            }
            _ => Err(EngineError::expression("invalid assignment target")),
        }
    }

    fn expression(&mut self) -> Result<Expr> {
        self.enter()?;
        let expr = self.or_expr();
        self.leave();
        expr
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            self.enter()?;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut left = self.not_expr()?;
        while self.eat(&Token::And) {
            self.enter()?;
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            self.enter()?;
            let operand = self.not_expr();
            self.leave();
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand?)));
        }
        self.comparison()
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek() {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            Token::In => CompareOp::In,
            Token::Not if self.peek_at(1) == &Token::In => {
                self.pos += 1;
                CompareOp::NotIn
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let first = self.additive()?;
        let mut rest = Vec::new();
        while let Some(op) = self.compare_op() {
            rest.push((op, self.additive()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn additive(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.enter()?;
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::DoubleSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            self.enter()?;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.advance();
        self.enter()?;
        let operand = self.unary();
        self.leave();
        Ok(Expr::Unary(op, Box::new(operand?)))
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.postfix()?;
        if self.eat(&Token::DoubleStar) {
            // Right-associative, and the exponent may carry a sign
            self.enter()?;
            let exponent = self.unary();
            self.leave();
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent?)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut expr = self.atom()?;
        loop {
            match self.peek() {
                Token::LBracket => {
                    self.advance();
                    self.enter()?;
                    let key = self.expression()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(key));
                }
                Token::LParen => {
                    return Err(EngineError::expression(
                        "only allow-listed functions can be called",
                    ));
                }
                _ => {
                    self.depth = depth;
                    return Ok(expr);
                }
            }
        }
    }

    fn atom(&mut self) -> Result<Expr> {
        match self.advance() {
            Token::Int(i) => Ok(Expr::Literal(Value::from(i))),
            Token::Float(f) => serde_json::Number::from_f64(f)
                .map(|n| Expr::Literal(Value::Number(n)))
                .ok_or_else(|| EngineError::expression("number literal is not finite")),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Ident(name) => {
                if self.peek() == &Token::LParen {
                    self.advance();
                    self.call(name)
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Token::LParen => {
                let expr = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => {
                let items = self.sequence(Token::RBracket, |p| p.expression())?;
                Ok(Expr::List(items))
            }
            Token::LBrace => {
                let entries = self.sequence(Token::RBrace, |p| {
                    let key = p.expression()?;
                    p.expect(Token::Colon)?;
                    let value = p.expression()?;
                    Ok((key, value))
                })?;
                Ok(Expr::Object(entries))
            }
            Token::Eof | Token::Newline => Err(EngineError::expression("unexpected end of expression")),
            other => Err(EngineError::expression(format!(
                "unexpected token {:?}",
                other
            ))),
        }
    }

    fn call(&mut self, name: String) -> Result<Expr> {
        let function = Function::lookup(&name).ok_or_else(|| {
            EngineError::expression(format!("function '{}' is not allowed", name))
        })?;
        let args = self.sequence(Token::RParen, |p| p.expression())?;
        function.check_arity(args.len())?;
        Ok(Expr::Call(function, args))
    }

    /// Comma-separated items up to `close`, trailing comma allowed
    fn sequence<T>(
        &mut self,
        close: Token,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(item(self)?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Literal(json!(1))),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Literal(json!(2))),
                    Box::new(Expr::Literal(json!(3))),
                )),
            )
        );
    }

    #[test]
    fn test_chained_comparison() {
        match parse_expression("0 < x <= 10").unwrap() {
            Expr::Compare { rest, .. } => {
                assert_eq!(rest.len(), 2);
                assert_eq!(rest[0].0, CompareOp::Lt);
                assert_eq!(rest[1].0, CompareOp::Le);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_in() {
        match parse_expression("'a' not in tags").unwrap() {
            Expr::Compare { rest, .. } => assert_eq!(rest[0].0, CompareOp::NotIn),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_function_rejected_at_parse() {
        let err = parse_expression("open('x')").unwrap_err();
        assert!(err.to_string().contains("not allowed"));
        assert!(parse_expression("getattr(x, 'y')").is_err());
    }

    #[test]
    fn test_arity_checked_at_parse() {
        assert!(parse_expression("len()").is_err());
        assert!(parse_expression("len(a, b)").is_err());
        assert!(parse_expression("round(x, 2)").is_ok());
    }

    #[test]
    fn test_calling_expression_rejected() {
        assert!(parse_expression("(len)(x)").is_err());
        assert!(parse_expression("x(1)").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        let err = parse_expression(&deep).unwrap_err();
        assert!(err.to_string().contains("nested"));
        let shallow = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert!(parse_expression(&shallow).is_ok());
    }

    #[test]
    fn test_operator_chains_count_toward_nesting_limit() {
        let sum = format!("x{}", " + x".repeat(200_000));
        let err = parse_expression(&sum).unwrap_err();
        assert_eq!(err.kind(), "expression_error");
        assert!(err.to_string().contains("nested"));

        let product = format!("x{}", " * x".repeat(150_000));
        assert!(parse_expression(&product).is_err());
        let conjunction = format!("x{}", " and x".repeat(150_000));
        assert!(parse_expression(&conjunction).is_err());
        let disjunction = format!("x{}", " or x".repeat(150_000));
        assert!(parse_expression(&disjunction).is_err());
        let subscripts = format!("x{}", "[0]".repeat(150_000));
        assert!(parse_expression(&subscripts).is_err());

        let short = format!("x{}", " + x".repeat(30));
        assert!(parse_expression(&short).is_ok());
        let mixed = format!("a[0][1] * 2 + b{}", " and c".repeat(20));
        assert!(parse_expression(&mixed).is_ok());
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse_expression("x > 1 y").is_err());
        assert!(parse_expression("x = 1").is_err());
    }

    #[test]
    fn test_program_statements() {
        let program = parse_program(
            "total = 0\ntotal += x * 2\nresult = {'a': [1, 2]}\nresult['b'] = total; output = result",
        )
        .unwrap();
        assert_eq!(program.len(), 5);
        assert!(matches!(program[1], Stmt::AugAssign(_, BinaryOp::Add, _)));
        match &program[3] {
            Stmt::AssignIndex { name, keys, .. } => {
                assert_eq!(name, "result");
                assert_eq!(keys.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(parse_program("1 = x").is_err());
        assert!(parse_program("len(x) = 2").is_err());
        assert!(parse_program("a[0] += 1").is_err());
    }

    #[test]
    fn test_power_is_right_associative_and_binds_tighter_than_unary() {
        let expr = parse_expression("-2 ** 2").unwrap();
        assert!(matches!(expr, Expr::Unary(UnaryOp::Neg, _)));
        let expr = parse_expression("2 ** 3 ** 2").unwrap();
        match expr {
            Expr::Binary(BinaryOp::Pow, _, exponent) => {
                assert!(matches!(*exponent, Expr::Binary(BinaryOp::Pow, _, _)))
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
