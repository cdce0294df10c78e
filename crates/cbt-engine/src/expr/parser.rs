//! Recursive-descent parser for directive expressions and statements

use super::{
    ast::{AssignOp, BinaryOp, Expr, Literal, Stmt, UnaryOp},
    lexer::{tokenize, Token},
};

/// Parse a single expression
pub fn parse_expression(source: &str) -> Result<Expr, String> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a `;`-separated statement list
pub fn parse_statements(source: &str) -> Result<Vec<Stmt>, String> {
    let mut parser = Parser::new(source)?;
    let mut stmts = Vec::new();

    loop {
        while parser.eat(";") {}
        if parser.at_end() {
            break;
        }
        parser.statement(&mut stmts)?;
        if !parser.eat(";") && !parser.at_end() {
            return Err(format!("expected `;`, found {}", parser.describe()));
        }
    }

    Ok(stmts)
}

/// Parse a comma-separated list of plain identifiers (sub-template parameters)
pub fn parse_params(source: &str) -> Result<Vec<String>, String> {
    let mut parser = Parser::new(source)?;
    let mut params = Vec::new();
    while !parser.at_end() {
        params.push(parser.ident()?);
        if !parser.eat(",") {
            break;
        }
    }
    parser.expect_end()?;
    Ok(params)
}

/// Parse a comma-separated list of expressions (call arguments)
pub fn parse_arguments(source: &str) -> Result<Vec<Expr>, String> {
    let mut parser = Parser::new(source)?;
    let mut args = Vec::new();
    while !parser.at_end() {
        args.push(parser.expression()?);
        if !parser.eat(",") {
            break;
        }
    }
    parser.expect_end()?;
    Ok(args)
}

/// Deepest allowed nesting of sub-expressions, counting each operand of a
/// conditional or unary operator and each bracketed group
pub const MAX_EXPRESSION_DEPTH: usize = 128;

static EOF: Token = Token::Eof;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, String> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            depth: 0,
        })
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, String>,
    ) -> Result<T, String> {
        if self.depth >= MAX_EXPRESSION_DEPTH {
            return Err(format!(
                "expression nested deeper than {} levels",
                MAX_EXPRESSION_DEPTH
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&EOF)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Token::Punct(p) if *p == punct)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), String> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(format!("expected `{}`, found {}", punct, self.describe()))
        }
    }

    fn expect_end(&self) -> Result<(), String> {
        if self.at_end() {
            Ok(())
        } else {
            Err(format!("unexpected {}", self.describe()))
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(format!("expected identifier, found {}", describe(&other))),
        }
    }

    fn describe(&self) -> String {
        describe(self.peek())
    }

    fn statement(&mut self, out: &mut Vec<Stmt>) -> Result<(), String> {
        if let Token::Ident(word) = self.peek() {
            if matches!(word.as_str(), "let" | "var" | "const") {
                self.advance();
                loop {
                    let name = self.ident()?;
                    let value = if self.eat("=") {
                        self.expression()?
                    } else {
                        Expr::Literal {
                            value: Literal::Undefined,
                        }
                    };
                    out.push(Stmt::Declare { name, value });
                    if !self.eat(",") {
                        return Ok(());
                    }
                }
            }
        }

        if let (Token::Ident(name), Token::Punct(op)) = (self.peek(), self.peek_at(1)) {
            let op = match *op {
                "=" => Some(AssignOp::Set),
                "+=" => Some(AssignOp::Add),
                "-=" => Some(AssignOp::Sub),
                _ => None,
            };
            if let Some(op) = op {
                let name = name.clone();
                self.pos += 2;
                let value = self.expression()?;
                out.push(Stmt::Assign { name, op, value });
                return Ok(());
            }
        }

        let expr = self.expression()?;
        out.push(Stmt::Expr { expr });
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, String> {
        self.conditional()
    }

    fn conditional(&mut self) -> Result<Expr, String> {
        self.nested(Self::conditional_operands)
    }

    fn conditional_operands(&mut self) -> Result<Expr, String> {
        let test = self.binary(0)?;
        if !self.eat("?") {
            return Ok(test);
        }
        let consequent = self.conditional()?;
        self.expect(":")?;
        let alternate = self.conditional()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// Precedence climbing over left-associative binary operators
    fn binary(&mut self, min_precedence: u8) -> Result<Expr, String> {
        let mut left = self.unary()?;

        while let Some((op, precedence)) = self.binary_op() {
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let right = self.binary(precedence + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn binary_op(&self) -> Option<(BinaryOp, u8)> {
        let Token::Punct(p) = self.peek() else {
            return None;
        };
        let op = match *p {
            "||" => (BinaryOp::Or, 1),
            "??" => (BinaryOp::Coalesce, 1),
            "&&" => (BinaryOp::And, 2),
            "==" => (BinaryOp::Eq, 3),
            "!=" => (BinaryOp::Ne, 3),
            "===" => (BinaryOp::StrictEq, 3),
            "!==" => (BinaryOp::StrictNe, 3),
            "<" => (BinaryOp::Lt, 4),
            "<=" => (BinaryOp::Le, 4),
            ">" => (BinaryOp::Gt, 4),
            ">=" => (BinaryOp::Ge, 4),
            "+" => (BinaryOp::Add, 5),
            "-" => (BinaryOp::Sub, 5),
            "*" => (BinaryOp::Mul, 6),
            "/" => (BinaryOp::Div, 6),
            "%" => (BinaryOp::Rem, 6),
            _ => return None,
        };
        Some(op)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        self.nested(Self::unary_operand)
    }

    fn unary_operand(&mut self) -> Result<Expr, String> {
        let op = if self.eat("!") {
            Some(UnaryOp::Not)
        } else if self.eat("-") {
            Some(UnaryOp::Neg)
        } else if self.eat("+") {
            Some(UnaryOp::Plus)
        } else if matches!(self.peek(), Token::Ident(w) if w == "typeof") {
            self.advance();
            Some(UnaryOp::TypeOf)
        } else {
            None
        };

        match op {
            Some(op) => Ok(Expr::Unary {
                op,
                operand: Box::new(self.unary()?),
            }),
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;

        loop {
            if self.eat(".") {
                let property = self.ident()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat("[") {
                let index = self.expression()?;
                self.expect("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat("(") {
                let args = self.list(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to `close`; trailing comma allowed
    fn list(&mut self, close: &str) -> Result<Vec<Expr>, String> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expression()?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal {
                value: Literal::Number(n),
            }),
            Token::Str(s) => Ok(Expr::Literal {
                value: Literal::String(s),
            }),
            Token::Ident(word) => Ok(match word.as_str() {
                "true" => Expr::Literal {
                    value: Literal::Bool(true),
                },
                "false" => Expr::Literal {
                    value: Literal::Bool(false),
                },
                "null" => Expr::Literal {
                    value: Literal::Null,
                },
                "undefined" => Expr::Literal {
                    value: Literal::Undefined,
                },
                _ => Expr::Ident { name: word },
            }),
            Token::Punct("(") => {
                let expr = self.expression()?;
                self.expect(")")?;
                Ok(expr)
            }
            Token::Punct("[") => Ok(Expr::Array {
                items: self.list("]")?,
            }),
            Token::Punct("{") => self.object(),
            other => Err(format!("unexpected {}", describe(&other))),
        }
    }

    fn object(&mut self) -> Result<Expr, String> {
        let mut entries = Vec::new();
        while !self.eat("}") {
            let key = match self.advance() {
                Token::Ident(name) | Token::Str(name) => name,
                Token::Number(n) => super::format_number(n),
                other => return Err(format!("invalid object key {}", describe(&other))),
            };
            self.expect(":")?;
            entries.push((key, self.expression()?));
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(Expr::Object { entries })
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number `{}`", n),
        Token::Str(s) => format!("string {:?}", s),
        Token::Ident(name) => format!("`{}`", name),
        Token::Punct(p) => format!("`{}`", p),
        Token::Eof => "end of expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident {
            name: name.to_string(),
        })
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a + b * c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                left: ident("a"),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: ident("b"),
                    right: ident("c"),
                }),
            }
        );
    }

    #[test]
    fn test_left_associativity() {
        let expr = parse_expression("a - b - c").unwrap();
        let Expr::Binary { left, right, .. } = expr else {
            panic!("expected binary");
        };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
        assert_eq!(right, ident("c"));
    }

    #[test]
    fn test_postfix_chain() {
        let expr = parse_expression("user.tags[0].toUpperCase()").unwrap();
        assert!(matches!(expr, Expr::Call { ref args, .. } if args.is_empty()));
    }

    #[test]
    fn test_statements() {
        let stmts = parse_statements("let a = 1, b; total += a; ; fn(a)").unwrap();
        assert_eq!(stmts.len(), 4);
        assert!(matches!(stmts[0], Stmt::Declare { ref name, .. } if name == "a"));
        assert!(matches!(stmts[1], Stmt::Declare { ref name, .. } if name == "b"));
        assert!(matches!(
            stmts[2],
            Stmt::Assign {
                op: AssignOp::Add,
                ..
            }
        ));
        assert!(matches!(stmts[3], Stmt::Expr { .. }));
    }

    #[test]
    fn test_equality_is_not_assignment() {
        let stmts = parse_statements("a == 1").unwrap();
        assert!(matches!(stmts[0], Stmt::Expr { .. }));
    }

    #[test]
    fn test_literals() {
        assert!(parse_expression("[1, 'a', {x: 1, 'y z': [],}]").is_ok());
        assert!(parse_expression("cond ? 'a' : 'b'").is_ok());
    }

    #[test]
    fn test_errors() {
        assert!(parse_expression("a +").is_err());
        assert!(parse_expression("(a").is_err());
        assert!(parse_expression("a b").is_err());
        assert!(parse_statements("let = 1").is_err());
    }

    #[test]
    fn test_nesting_depth_limit() {
        let parens = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_expression(&parens(30)).is_ok());

        let error = parse_expression(&parens(500)).unwrap_err();
        assert!(error.contains("nested deeper"), "{}", error);
        let error = parse_expression(&"!".repeat(500)).unwrap_err();
        assert!(error.contains("nested deeper"), "{}", error);
        assert!(parse_expression(&format!("{}0", "a ? b : ".repeat(500))).is_err());
    }

    #[test]
    fn test_params_and_arguments() {
        assert_eq!(parse_params("a, b").unwrap(), vec!["a", "b"]);
        assert!(parse_params("").unwrap().is_empty());
        assert_eq!(parse_arguments("x + 1, 'y'").unwrap().len(), 2);
    }
}
