//! Recursive-descent parser. Precedence, lowest first: comparison,
//! additive, multiplicative, unary, power (right associative).

use super::FormulaError;
use super::lexer::{Spanned, Token, tokenize};

/// Limit on tree depth: parentheses, calls, unary chains and every binary
/// operator count towards it.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
    Column(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Visit this node and every descendant, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Unary(_, e) => e.walk(visit),
            Expr::Binary(_, l, r) => {
                l.walk(visit);
                r.walk(visit);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.walk(visit)),
            _ => {}
        }
    }
}

pub fn parse(input: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FormulaError::syntax(0, "empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        end: input.len(),
    };
    let expr = parser.comparison()?;
    match parser.peek() {
        None => Ok(expr),
        Some(t) => Err(FormulaError::syntax(
            t.pos,
            format!("unexpected {}", describe(&t.token)),
        )),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn peek_op(&self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Spanned {
                token: Token::Op(op),
                ..
            }) if ops.contains(op) => Some(*op),
            _ => None,
        }
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let pos = self.peek().map_or(self.end, |t| t.pos);
            return Err(FormulaError::syntax(pos, "expression nested too deeply"));
        }
        Ok(())
    }

    fn comparison(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.additive()?;
        let depth = self.depth;
        while let Some(op) = self.peek_op(&["==", "=", "!=", "<>", "<", "<=", ">", ">="]) {
            self.pos += 1;
            self.descend()?;
            let op = match op {
                "==" | "=" => BinaryOp::Eq,
                "!=" | "<>" => BinaryOp::NotEq,
                "<" => BinaryOp::Lt,
                "<=" => BinaryOp::LtEq,
                ">" => BinaryOp::Gt,
                _ => BinaryOp::GtEq,
            };
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.multiplicative()?;
        let depth = self.depth;
        while let Some(op) = self.peek_op(&["+", "-"]) {
            self.pos += 1;
            self.descend()?;
            let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        let depth = self.depth;
        while let Some(op) = self.peek_op(&["*", "/", "%"]) {
            self.pos += 1;
            self.descend()?;
            let op = match op {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Mod,
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        let Some(op) = self.peek_op(&["-", "!", "+"]) else {
            return self.power();
        };
        self.pos += 1;
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(match op {
            "-" => Expr::Unary(UnaryOp::Neg, Box::new(operand)),
            "!" => Expr::Unary(UnaryOp::Not, Box::new(operand)),
            _ => operand,
        })
    }

    fn power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.primary()?;
        if self.peek_op(&["^"]).is_some() {
            self.pos += 1;
            self.descend()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let Some(Spanned { token, pos }) = self.next() else {
            return Err(FormulaError::syntax(self.end, "unexpected end of expression"));
        };
        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Text(s)),
            Token::ColumnRef(name) => Ok(Expr::Column(name)),
            Token::LParen => {
                self.descend()?;
                let inner = self.comparison()?;
                self.depth -= 1;
                self.expect_rparen(pos)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if matches!(self.peek(), Some(Spanned { token: Token::LParen, .. })) {
                    self.pos += 1;
                    self.call(name, pos)
                } else {
                    Ok(match name.to_ascii_lowercase().as_str() {
                        "true" => Expr::Bool(true),
                        "false" => Expr::Bool(false),
                        "null" => Expr::Null,
                        _ => Expr::Column(name),
                    })
                }
            }
            other => Err(FormulaError::syntax(pos, format!("unexpected {}", describe(&other)))),
        }
    }

    fn call(&mut self, name: String, open: usize) -> Result<Expr, FormulaError> {
        self.descend()?;
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Spanned { token: Token::RParen, .. })) {
            self.pos += 1;
        } else {
            loop {
                args.push(self.comparison()?);
                match self.next() {
                    Some(Spanned { token: Token::Comma, .. }) => continue,
                    Some(Spanned { token: Token::RParen, .. }) => break,
                    Some(t) => {
                        return Err(FormulaError::syntax(
                            t.pos,
                            format!("expected ',' or ')', found {}", describe(&t.token)),
                        ));
                    }
                    None => {
                        return Err(FormulaError::syntax(
                            open,
                            format!("unclosed call to {name}"),
                        ));
                    }
                }
            }
        }
        self.depth -= 1;
        Ok(Expr::Call { name, args })
    }

    fn expect_rparen(&mut self, open: usize) -> Result<(), FormulaError> {
        match self.next() {
            Some(Spanned { token: Token::RParen, .. }) => Ok(()),
            Some(t) => Err(FormulaError::syntax(
                t.pos,
                format!("expected ')', found {}", describe(&t.token)),
            )),
            None => Err(FormulaError::syntax(open, "unclosed parenthesis")),
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {n}"),
        Token::Str(_) => "string".to_string(),
        Token::Ident(name) => format!("'{name}'"),
        Token::ColumnRef(name) => format!("{{{name}}}"),
        Token::Op(op) => format!("'{op}'"),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Comma => "','".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::Binary(
                BinaryOp::Add,
                num(1.0),
                Box::new(Expr::Binary(BinaryOp::Mul, num(2.0), num(3.0)))
            )
        );
    }

    #[test]
    fn power_is_right_associative_and_above_negation() {
        assert_eq!(
            parse("2 ^ 3 ^ 2").unwrap(),
            Expr::Binary(
                BinaryOp::Pow,
                num(2.0),
                Box::new(Expr::Binary(BinaryOp::Pow, num(3.0), num(2.0)))
            )
        );
        assert_eq!(
            parse("-2 ^ 2").unwrap(),
            Expr::Unary(
                UnaryOp::Neg,
                Box::new(Expr::Binary(BinaryOp::Pow, num(2.0), num(2.0)))
            )
        );
    }

    #[test]
    fn comparison_is_lowest() {
        let expr = parse("a + 1 > b").unwrap();
        assert!(matches!(expr, Expr::Binary(BinaryOp::Gt, _, _)));
    }

    #[test]
    fn calls_and_literals() {
        assert_eq!(
            parse("IF(TRUE, null, {my col})").unwrap(),
            Expr::Call {
                name: "IF".to_string(),
                args: vec![Expr::Bool(true), Expr::Null, Expr::Column("my col".to_string())],
            }
        );
        assert_eq!(
            parse("now()").unwrap(),
            Expr::Call {
                name: "now".to_string(),
                args: vec![],
            }
        );
    }

    #[test]
    fn malformed_input_is_rejected() {
        for bad in ["", "1 +", "(1 + 2", "sum(1, 2", "sum(1 2)", "1 2", ")", "a ,"] {
            assert!(parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        let err = parse(&deep).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));
        assert!(parse(&format!("{}1{}", "(".repeat(10), ")".repeat(10))).is_ok());
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        for op in ["+", "*", "<"] {
            let chain = format!("1{}", format!(" {op} 1").repeat(10_000));
            let err = parse(&chain).unwrap_err();
            assert!(err.to_string().contains("nested too deeply"), "{op}: {err}");
        }
        let sum = format!("1{}", " + 1".repeat(40));
        assert!(parse(&sum).is_ok());
        // Chains at different levels share the one budget.
        let mixed = format!("({}) * 2", format!("1{}", " + 1".repeat(30)));
        assert!(parse(&mixed).is_ok());
    }
}
