use super::*;
use crate::ast::{Expr, ExprKind, OperationKind};
use dolls_value::{UserFn, Value};
use std::rc::Rc;

impl TokenKind {
    /// Returns the binary binding power or `None` if invalid binop token.
    /// Every binary operator is left associative. Assignment is parsed
    /// separately, below the lowest binding power.
    pub fn binop_bp(self) -> Option<(u8, u8)> {
        match self {
            /* Or */
            TokenKind::Bar => Some((2, 3)),
            /* And */
            TokenKind::And => Some((4, 5)),
            /* Equality */
            TokenKind::Eq | TokenKind::Ne => Some((6, 7)),
            /* Ordering */
            TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge => Some((8, 9)),
            /* Additive */
            TokenKind::Plus | TokenKind::Minus => Some((10, 11)),
            /* Multiplicative */
            TokenKind::Mul | TokenKind::Div | TokenKind::Mod => Some((12, 13)),
            _ => None,
        }
    }

    /// The operation a binary operator token stands for.
    pub fn binop(self) -> Option<OperationKind> {
        match self {
            TokenKind::Bar => Some(OperationKind::Or),
            TokenKind::And => Some(OperationKind::And),
            TokenKind::Eq => Some(OperationKind::Eq),
            TokenKind::Ne => Some(OperationKind::Ne),
            TokenKind::Lt => Some(OperationKind::Lt),
            TokenKind::Le => Some(OperationKind::Le),
            TokenKind::Gt => Some(OperationKind::Gt),
            TokenKind::Ge => Some(OperationKind::Ge),
            TokenKind::Plus => Some(OperationKind::Add),
            TokenKind::Minus => Some(OperationKind::Sub),
            TokenKind::Mul => Some(OperationKind::Mul),
            TokenKind::Div => Some(OperationKind::Div),
            TokenKind::Mod => Some(OperationKind::Mod),
            _ => None,
        }
    }

    /// For `=` returns `Some(None)`, for `op=` returns `Some(Some(op))`.
    fn assign_op(self) -> Option<Option<OperationKind>> {
        match self {
            TokenKind::Assign => Some(None),
            TokenKind::PlusAssign => Some(Some(OperationKind::Add)),
            TokenKind::MinusAssign => Some(Some(OperationKind::Sub)),
            TokenKind::MulAssign => Some(Some(OperationKind::Mul)),
            TokenKind::DivAssign => Some(Some(OperationKind::Div)),
            TokenKind::ModAssign => Some(Some(OperationKind::Mod)),
            _ => None,
        }
    }
}

/// What an assignment writes to.
enum AssignTarget {
    Variable { name: String, pos: Position },
    Element { array: Box<Expr>, index: Box<Expr> },
}

impl Parser {
    /* Expressions */
    /// Parses any expression.
    pub fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_assign_expr()
    }

    /// Parses a right associative assignment, or falls through to a binary expression.
    fn parse_assign_expr(&mut self) -> Result<Expr, SyntaxError> {
        let lhs = self.parse_expr_bp(0)?;

        let op = match self.peek().assign_op() {
            Some(op) => op,
            None => return Ok(lhs),
        };
        let assign_token = self.next_any();

        // only a variable or an array element can be assigned to
        let target = match lhs.kind {
            ExprKind::Variable { name } => AssignTarget::Variable { name, pos: lhs.pos },
            ExprKind::ReadArray { array, index } => AssignTarget::Element { array, index },
            _ => return Err(SyntaxError::new("Invalid assign", assign_token.pos)),
        };

        let value = Box::new(self.parse_assign_expr()?);
        let pos = assign_token.pos;

        let kind = match (target, op) {
            (AssignTarget::Variable { name, .. }, None) => ExprKind::Assign { name, value },
            // `x op= v` is sugar for `x = x op v`
            (AssignTarget::Variable { name, pos: var_pos }, Some(op)) => {
                let current = Expr::new(ExprKind::Variable { name: name.clone() }, var_pos);
                let value = Expr::new(
                    ExprKind::Operation {
                        op,
                        operands: vec![current, *value],
                    },
                    pos,
                );
                ExprKind::Assign {
                    name,
                    value: Box::new(value),
                }
            }
            (AssignTarget::Element { array, index }, None) => ExprKind::AssignArray {
                array,
                index,
                value,
            },
            (AssignTarget::Element { array, index }, Some(op)) => ExprKind::AssignOpArray {
                op,
                array,
                index,
                value,
            },
        };

        Ok(Expr::new(kind, pos))
    }

    /// Parses binary operators with a binding power of at least `min_bp`.
    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_unary_expr()?;

        loop {
            let (l_bp, r_bp) = match self.peek().binop_bp() {
                Some(bp) => bp,
                None => break, // not a valid binop, stop parsing
            };
            if l_bp < min_bp {
                break; // less than the min_bp, stop parsing
            }

            // self.current() is a valid binop
            let op_token = self.next_any();
            let op = match op_token.kind.binop() {
                Some(op) => op,
                None => return Err(SyntaxError::new("Unknown operator", op_token.pos)),
            };

            let rhs = self.parse_expr_bp(r_bp)?;

            lhs = Expr::new(
                ExprKind::Operation {
                    op,
                    operands: vec![lhs, rhs],
                },
                op_token.pos,
            );
        }

        Ok(lhs)
    }

    /// Parses prefix `+`, `-` and `!`. Unary plus is dropped.
    /// Every nested operand passes through here, so this is where nesting is counted.
    fn parse_unary_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(|parser| parser.parse_unary_operand())
    }

    fn parse_unary_operand(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek() {
            TokenKind::Plus => {
                self.next_any();
                return self.parse_unary_expr();
            }
            TokenKind::Minus => OperationKind::Negative,
            TokenKind::Not => OperationKind::Not,
            _ => return self.parse_postfixed_expr(),
        };
        let op_token = self.next_any();
        let operand = self.parse_unary_expr()?;
        Ok(Expr::new(
            ExprKind::Operation {
                op,
                operands: vec![operand],
            },
            op_token.pos,
        ))
    }

    /// Parses a factor followed by any number of calls and index reads.
    fn parse_postfixed_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_factor_expr()?;

        loop {
            match self.peek() {
                TokenKind::LParen => {
                    let lparen = self.next_any();
                    let args = self.parse_expr_list(TokenKind::RParen)?;
                    expr = Expr::new(
                        ExprKind::FunctionCall {
                            callee: Box::new(expr),
                            args,
                        },
                        lparen.pos,
                    );
                }
                TokenKind::LBracket => {
                    let lbracket = self.next_any();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::new(
                        ExprKind::ReadArray {
                            array: Box::new(expr),
                            index: Box::new(index),
                        },
                        lbracket.pos,
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Parses a comma separated (possibly empty) list closed by `close`.
    /// The opening token must already be consumed.
    fn parse_expr_list(&mut self, close: TokenKind) -> Result<Vec<Expr>, SyntaxError> {
        let mut exprs = Vec::new();

        if !self.eat(close) {
            loop {
                exprs.push(self.parse_expr()?);

                if self.eat(close) {
                    break;
                } else if !self.eat(TokenKind::Comma) {
                    return Err(self.unexpected(&format!("',' or {}", close.describe())));
                }
            }
        }

        Ok(exprs)
    }

    /// Parses a primary (atom) expression.
    fn parse_factor_expr(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek() {
            TokenKind::LParen => {
                self.next_any();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                let lbracket = self.next_any();
                let elements = self.parse_expr_list(TokenKind::RBracket)?;
                Ok(Expr::new(ExprKind::ConstructArray { elements }, lbracket.pos))
            }
            TokenKind::Bar => self.parse_function_expr(),
            TokenKind::Id => {
                let token = self.next_any();
                Ok(Expr::new(ExprKind::Variable { name: token.text }, token.pos))
            }
            TokenKind::Nil
            | TokenKind::False
            | TokenKind::True
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Str => self.parse_literal_expr(),
            _ => Err(self.unexpected("expression")),
        }
    }

    /* Expressions.Literals */
    /// Parses a literal expression. Numbers are converted here, so an
    /// out-of-range literal is a syntax error.
    fn parse_literal_expr(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.next_any();
        let value = match token.kind {
            TokenKind::Nil => Value::Nil,
            TokenKind::False => Value::Bool(false),
            TokenKind::True => Value::Bool(true),
            TokenKind::Int => match token.text.parse::<i32>() {
                Ok(val) => Value::Int(val),
                Err(_) => return Err(convert_failed(&token)),
            },
            TokenKind::Float => match token.text.parse::<f64>() {
                Ok(val) if val.is_finite() => Value::Float(val),
                _ => return Err(convert_failed(&token)),
            },
            TokenKind::Str => Value::String(unescape(&token.text)),
            _ => {
                return Err(SyntaxError::new(
                    format!("Expected literal, found '{}'", token.text),
                    token.pos,
                ))
            }
        };
        Ok(Expr::new(ExprKind::Constant { value }, token.pos))
    }

    /// Parses `|a, b| { ... }` into a function constant.
    fn parse_function_expr(&mut self) -> Result<Expr, SyntaxError> {
        let bar = self.expect(TokenKind::Bar)?;

        let mut params = Vec::new();
        if !self.eat(TokenKind::Bar) {
            loop {
                params.push(self.expect(TokenKind::Id)?.text);

                if self.eat(TokenKind::Bar) {
                    break;
                } else if !self.eat(TokenKind::Comma) {
                    return Err(self.unexpected("',' or '|'"));
                }
            }
        }

        let body = self.parse_block()?;
        let value = Value::UserFunction(Rc::new(UserFn::new(params, body)));
        Ok(Expr::new(ExprKind::Constant { value }, bar.pos))
    }
}

fn convert_failed(token: &Token) -> SyntaxError {
    SyntaxError::new(format!("Convert failed: {}", token.text), token.pos)
}

/// Strips the quotes of a string literal. A backslash makes the next
/// character literal.
fn unescape(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use insta::assert_snapshot;

    fn parse_expr(source: &str) -> Result<Expr, SyntaxError> {
        let mut parser = Parser::new(tokenize(source).unwrap());
        let expr = parser.parse_expr()?;
        assert_eq!(parser.peek(), TokenKind::Eof, "trailing tokens in {:?}", source);
        Ok(expr)
    }

    fn expr(source: &str) -> String {
        parse_expr(source).unwrap().print(0).trim_end().to_string()
    }

    #[test]
    fn test_literal() {
        assert_snapshot!(expr("true"), @"Constant bool true");
        assert_snapshot!(expr("false"), @"Constant bool false");
        assert_snapshot!(expr("nil"), @"Constant nil nil");
        assert_snapshot!(expr("1"), @"Constant int 1");
        assert_snapshot!(expr("2.0"), @"Constant float 2.0");
        assert_snapshot!(expr("2.5e2"), @"Constant float 250.0");
        assert_snapshot!(expr(r#""say \"hi\" \\ \q""#), @r###"Constant string "say \"hi\" \\ q""###);
    }

    #[test]
    fn test_precedence() {
        assert_snapshot!(expr("x = 5 + 3 * -2"), @r###"
        Assign x
          Operation Add
            Constant int 5
            Operation Mul
              Constant int 3
              Operation Negative
                Constant int 2
        "###);
    }

    #[test]
    fn test_binary_associativity() {
        // should be (2 - 2) - 2
        assert_snapshot!(expr("2 - 2 - 2"), @r###"
        Operation Sub
          Operation Sub
            Constant int 2
            Constant int 2
          Constant int 2
        "###);
        // should be a = (b = c)
        assert_snapshot!(expr("a = b = c"), @r###"
        Assign a
          Assign b
            Variable c
        "###);
    }

    #[test]
    fn test_logic_levels() {
        assert_snapshot!(expr("a | b & c == d < e"), @r###"
        Operation Or
          Variable a
          Operation And
            Variable b
            Operation Eq
              Variable c
              Operation Lt
                Variable d
                Variable e
        "###);
    }

    #[test]
    fn test_unary() {
        assert_snapshot!(expr("+-!x"), @r###"
        Operation Negative
          Operation Not
            Variable x
        "###);
        // postfix binds tighter than prefix
        assert_snapshot!(expr("-f(1)"), @r###"
        Operation Negative
          FunctionCall
            Variable f
            Constant int 1
        "###);
    }

    #[test]
    fn test_postfix_chain() {
        assert_snapshot!(expr("m[1][2](3)()"), @r###"
        FunctionCall
          FunctionCall
            ReadArray
              ReadArray
                Variable m
                Constant int 1
              Constant int 2
            Constant int 3
        "###);
    }

    #[test]
    fn test_array_literal() {
        assert_snapshot!(expr("[1, [], \"s\"]"), @r###"
        ConstructArray
          Constant int 1
          ConstructArray
          Constant string "s"
        "###);
    }

    #[test]
    fn test_function_literal() {
        assert_snapshot!(expr("|x, y| { x * y }"), @r###"
        Constant function |x, y|
          Operation Mul
            Variable x
            Variable y
        "###);
        assert_snapshot!(expr("|| { }"), @"Constant function ||");
    }

    #[test]
    fn test_array_assignment() {
        assert_snapshot!(expr("a[i] = 9"), @r###"
        AssignArray
          Variable a
          Variable i
          Constant int 9
        "###);
        assert_snapshot!(expr("a[0] *= 2"), @r###"
        AssignOpArray Mul
          Variable a
          Constant int 0
          Constant int 2
        "###);
    }

    #[test]
    fn test_compound_assignment_on_variable() {
        assert_snapshot!(expr("n -= 1"), @r###"
        Assign n
          Operation Sub
            Variable n
            Constant int 1
        "###);
    }

    #[test]
    fn test_invalid_assign() {
        let err = parse_expr("f() = 1").unwrap_err();
        assert_eq!(err.message, "Invalid assign");
        assert_eq!(err.position, Position::new(1, 5));
        assert_eq!(parse_expr("1 += 1").unwrap_err().message, "Invalid assign");
        assert_eq!(parse_expr("a + b = 1").unwrap_err().message, "Invalid assign");
    }

    #[test]
    fn test_literal_overflow() {
        let err = parse_expr("x = 2147483648").unwrap_err();
        assert_eq!(err.message, "Convert failed: 2147483648");
        assert_eq!(err.position, Position::new(1, 5));
        assert!(parse_expr("2147483647").is_ok());
        assert_eq!(parse_expr("1e999").unwrap_err().message, "Convert failed: 1e999");
    }

    #[test]
    fn test_node_positions() {
        let expr = parse_expr("a  +\n b").unwrap();
        assert_eq!(expr.pos, Position::new(1, 4));
        match expr.kind {
            ExprKind::Operation { operands, .. } => {
                assert_eq!(operands[0].pos, Position::new(1, 1));
                assert_eq!(operands[1].pos, Position::new(2, 2));
            }
            _ => panic!("expected an operation"),
        }
    }

    #[test]
    fn test_list_errors() {
        assert_eq!(
            parse_expr("f(1 2)").unwrap_err().message,
            "Expected ',' or ')', found '2'"
        );
        assert_eq!(
            parse_expr("|a b| { }").unwrap_err().message,
            "Expected ',' or '|', found 'b'"
        );
        assert_eq!(
            parse_expr("[1,").unwrap_err().message,
            "Expected expression, found end of input"
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#""a\"b""#), "a\"b");
        assert_eq!(unescape(r#""\\""#), "\\");
        assert_eq!(unescape(r#""\n""#), "n");
        assert_eq!(unescape(r#""""#), "");
    }
}
