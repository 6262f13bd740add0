//! Renders an AST back into source text that parses to the same tree.
//! Parentheses are only emitted where precedence requires them.

use crate::ast::{Expr, ExprKind, IfArm, OperationKind, Program, Stmt, StmtKind};
use dolls_value::Value;

/// Binding levels, loosest first.
const ASSIGN: u8 = 1;
const UNARY: u8 = 8;
const POSTFIX: u8 = 9;
const ATOM: u8 = 10;

/// Renders `program`, one top level statement per line.
pub fn to_source(program: &Program) -> String {
    let mut printer = Printer::default();
    for stmt in &program.statements {
        printer.stmt(stmt);
        printer.buf.push('\n');
    }
    printer.buf
}

/// Renders a single expression.
pub fn expr_to_source(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr, ASSIGN);
    printer.buf
}

fn binary_level(op: OperationKind) -> u8 {
    match op {
        OperationKind::Or => 2,
        OperationKind::And => 3,
        OperationKind::Eq | OperationKind::Ne => 4,
        OperationKind::Lt | OperationKind::Le | OperationKind::Gt | OperationKind::Ge => 5,
        OperationKind::Add | OperationKind::Sub => 6,
        OperationKind::Mul | OperationKind::Div | OperationKind::Mod => 7,
        OperationKind::Negative | OperationKind::Not => UNARY,
    }
}

fn level(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Assign { .. } | ExprKind::AssignArray { .. } | ExprKind::AssignOpArray { .. } => {
            ASSIGN
        }
        ExprKind::Operation { op, .. } => binary_level(*op),
        ExprKind::FunctionCall { .. } | ExprKind::ReadArray { .. } => POSTFIX,
        ExprKind::ConstructArray { .. } | ExprKind::Variable { .. } => ATOM,
        ExprKind::Constant { value } => match value {
            Value::Int(val) if *val < 0 => UNARY,
            Value::Float(val) if val.is_sign_negative() => UNARY,
            _ => ATOM,
        },
    }
}

#[derive(Default)]
struct Printer {
    buf: String,
    indent: usize,
}

impl Printer {
    fn newline(&mut self) {
        self.buf.push('\n');
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::If { arms } => self.if_stmt(arms),
            StmtKind::While { cond, body } => {
                self.buf.push_str("while (");
                self.expr(cond, ASSIGN);
                self.buf.push_str(") ");
                self.block(body);
            }
            StmtKind::Expr(expr) => self.expr(expr, ASSIGN),
        }
    }

    fn if_stmt(&mut self, arms: &[IfArm]) {
        for (i, arm) in arms.iter().enumerate() {
            match (&arm.cond, i) {
                (Some(cond), _) => {
                    self.buf.push_str(if i == 0 { "if (" } else { " elif (" });
                    self.expr(cond, ASSIGN);
                    self.buf.push_str(") ");
                }
                (None, 0) => {
                    // an unconditional first arm has no surface syntax
                    self.buf.push_str("if (true) ");
                }
                (None, _) => self.buf.push_str(" else "),
            }
            self.block(&arm.body);
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        if body.is_empty() {
            self.buf.push_str("{ }");
            return;
        }
        self.buf.push('{');
        self.indent += 1;
        for stmt in body {
            self.newline();
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.buf.push('}');
    }

    /// Writes `expr`, parenthesized if it binds looser than `min_level`.
    fn expr(&mut self, expr: &Expr, min_level: u8) {
        let parens = level(expr) < min_level;
        if parens {
            self.buf.push('(');
        }
        self.expr_inner(expr);
        if parens {
            self.buf.push(')');
        }
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Operation { op, operands } => match operands.as_slice() {
                [operand] => {
                    self.buf.push_str(op.symbol());
                    self.expr(operand, UNARY);
                }
                [lhs, rhs] => {
                    let level = binary_level(*op);
                    self.expr(lhs, level);
                    self.buf.push(' ');
                    self.buf.push_str(op.symbol());
                    self.buf.push(' ');
                    self.expr(rhs, level + 1);
                }
                // malformed operand count; keep whatever is there visible
                operands => {
                    self.buf.push_str(op.symbol());
                    self.buf.push('(');
                    self.list(operands);
                    self.buf.push(')');
                }
            },
            ExprKind::Assign { name, value } => {
                self.buf.push_str(name);
                self.buf.push_str(" = ");
                self.expr(value, ASSIGN);
            }
            ExprKind::AssignArray {
                array,
                index,
                value,
            } => {
                self.index(array, index);
                self.buf.push_str(" = ");
                self.expr(value, ASSIGN);
            }
            ExprKind::AssignOpArray {
                op,
                array,
                index,
                value,
            } => {
                self.index(array, index);
                self.buf.push(' ');
                self.buf.push_str(op.symbol());
                self.buf.push_str("= ");
                self.expr(value, ASSIGN);
            }
            ExprKind::ReadArray { array, index } => self.index(array, index),
            ExprKind::ConstructArray { elements } => {
                self.buf.push('[');
                self.list(elements);
                self.buf.push(']');
            }
            ExprKind::FunctionCall { callee, args } => {
                self.expr(callee, POSTFIX);
                self.buf.push('(');
                self.list(args);
                self.buf.push(')');
            }
            ExprKind::Variable { name } => self.buf.push_str(name),
            ExprKind::Constant { value } => self.constant(value),
        }
    }

    fn index(&mut self, array: &Expr, index: &Expr) {
        self.expr(array, POSTFIX);
        self.buf.push('[');
        self.expr(index, ASSIGN);
        self.buf.push(']');
    }

    fn list(&mut self, exprs: &[Expr]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.buf.push_str(", ");
            }
            self.expr(expr, ASSIGN);
        }
    }

    fn constant(&mut self, value: &Value) {
        match value {
            Value::String(val) => {
                self.buf.push('"');
                for c in val.chars() {
                    if c == '"' || c == '\\' {
                        self.buf.push('\\');
                    }
                    self.buf.push(c);
                }
                self.buf.push('"');
            }
            Value::Float(val) => self.buf.push_str(&format!("{:?}", val)),
            Value::UserFunction(func) => {
                self.buf.push('|');
                self.buf.push_str(&func.params.join(", "));
                self.buf.push_str("| ");
                self.block(&func.body);
            }
            // nil, bools, ints, and host values that only have a display form
            other => self.buf.push_str(&other.to_string()),
        }
    }
}
