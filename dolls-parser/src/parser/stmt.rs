use super::*;
use crate::ast::{Expr, IfArm, Stmt, StmtKind};

impl Parser {
    /// Parses a statement: `if`, `while` or an expression.
    pub fn parse_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        match self.peek() {
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            _ => Ok(self.parse_expr()?.into()),
        }
    }

    /// Parses `{ Statement* }`.
    pub fn parse_block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.nested(|parser| parser.parse_block_body())
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect(TokenKind::LBrace)?;

        let mut body = Vec::new();
        while !self.eat(TokenKind::RBrace) {
            if self.peek() == TokenKind::Eof {
                return Err(self.unexpected(TokenKind::RBrace.describe()));
            }
            body.push(self.parse_stmt()?);
        }

        Ok(body)
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let if_token = self.expect(TokenKind::If)?;

        let mut arms = vec![self.parse_cond_arm()?];
        while self.eat(TokenKind::Elif) {
            arms.push(self.parse_cond_arm()?);
        }
        if self.eat(TokenKind::Else) {
            arms.push(IfArm {
                cond: None,
                body: self.parse_block()?,
            });
        }

        Ok(Stmt::new(StmtKind::If { arms }, if_token.pos))
    }

    /// Parses `( Expression ) Block`.
    fn parse_cond_arm(&mut self) -> Result<IfArm, SyntaxError> {
        let cond = self.parse_condition()?;
        let body = self.parse_block()?;
        Ok(IfArm {
            cond: Some(cond),
            body,
        })
    }

    fn parse_condition(&mut self) -> Result<Expr, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        Ok(cond)
    }

    fn parse_while_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let while_token = self.expect(TokenKind::While)?;
        let cond = self.parse_condition()?;
        let body = self.parse_block()?;
        Ok(Stmt::new(StmtKind::While { cond, body }, while_token.pos))
    }
}
