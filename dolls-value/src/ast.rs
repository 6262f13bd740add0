//! Abstract syntax tree.
//!
//! Every node carries the position of the token that introduced it.

use std::fmt;

use dolls_source::Position;

use crate::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    // unary
    Negative,
    Not,
    // binary
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl OperationKind {
    pub fn is_unary(self) -> bool {
        matches!(self, OperationKind::Negative | OperationKind::Not)
    }

    /// Operator text as written in source.
    pub fn symbol(self) -> &'static str {
        match self {
            OperationKind::Negative => "-",
            OperationKind::Not => "!",
            OperationKind::Add => "+",
            OperationKind::Sub => "-",
            OperationKind::Mul => "*",
            OperationKind::Div => "/",
            OperationKind::Mod => "%",
            OperationKind::Lt => "<",
            OperationKind::Le => "<=",
            OperationKind::Gt => ">",
            OperationKind::Ge => ">=",
            OperationKind::Eq => "==",
            OperationKind::Ne => "!=",
            OperationKind::And => "&",
            OperationKind::Or => "|",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A unary (one operand) or binary (two operands) operation.
    Operation {
        op: OperationKind,
        operands: Vec<Expr>,
    },
    /// `name = value`
    Assign { name: String, value: Box<Expr> },
    /// `array[index] = value`
    AssignArray {
        array: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    /// `array[index] op= value`
    AssignOpArray {
        op: OperationKind,
        array: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    /// `array[index]`
    ReadArray { array: Box<Expr>, index: Box<Expr> },
    /// `[a, b, c]`
    ConstructArray { elements: Vec<Expr> },
    /// `callee(args...)`
    FunctionCall { callee: Box<Expr>, args: Vec<Expr> },
    Variable { name: String },
    /// A literal. Function literals are constants too.
    Constant { value: Value },
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Self { kind, pos }
    }
}

/// One `if`/`elif`/`else` arm. `cond` is `None` for `else`.
#[derive(Debug, Clone)]
pub struct IfArm {
    pub cond: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    If { arms: Vec<IfArm> },
    While { cond: Expr, body: Vec<Stmt> },
    Expr(Expr),
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Position) -> Self {
        Self { kind, pos }
    }
}

impl From<Expr> for Stmt {
    fn from(expr: Expr) -> Self {
        let pos = expr.pos;
        Stmt::new(StmtKind::Expr(expr), pos)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }

    /// Renders the tree one node per line, indented by `depth`.
    /// Positions are left out, so two parses of equivalent source print the same.
    pub fn print(&self, depth: usize) -> String {
        let mut buf = String::new();
        line(&mut buf, depth, "Program");
        for stmt in &self.statements {
            stmt.write_tree(&mut buf, depth + 1);
        }
        buf
    }
}

impl Stmt {
    pub fn print(&self, depth: usize) -> String {
        let mut buf = String::new();
        self.write_tree(&mut buf, depth);
        buf
    }

    fn write_tree(&self, buf: &mut String, depth: usize) {
        match &self.kind {
            StmtKind::If { arms } => {
                line(buf, depth, "If");
                for arm in arms {
                    match &arm.cond {
                        Some(cond) => {
                            line(buf, depth + 1, "Cond");
                            cond.write_tree(buf, depth + 2);
                            line(buf, depth + 1, "Then");
                        }
                        None => line(buf, depth + 1, "Else"),
                    }
                    for stmt in &arm.body {
                        stmt.write_tree(buf, depth + 2);
                    }
                }
            }
            StmtKind::While { cond, body } => {
                line(buf, depth, "While");
                line(buf, depth + 1, "Cond");
                cond.write_tree(buf, depth + 2);
                line(buf, depth + 1, "Do");
                for stmt in body {
                    stmt.write_tree(buf, depth + 2);
                }
            }
            StmtKind::Expr(expr) => expr.write_tree(buf, depth),
        }
    }
}

impl Expr {
    pub fn print(&self, depth: usize) -> String {
        let mut buf = String::new();
        self.write_tree(&mut buf, depth);
        buf
    }

    fn write_tree(&self, buf: &mut String, depth: usize) {
        match &self.kind {
            ExprKind::Operation { op, operands } => {
                line(buf, depth, &format!("Operation {}", op));
                for operand in operands {
                    operand.write_tree(buf, depth + 1);
                }
            }
            ExprKind::Assign { name, value } => {
                line(buf, depth, &format!("Assign {}", name));
                value.write_tree(buf, depth + 1);
            }
            ExprKind::AssignArray {
                array,
                index,
                value,
            } => {
                line(buf, depth, "AssignArray");
                array.write_tree(buf, depth + 1);
                index.write_tree(buf, depth + 1);
                value.write_tree(buf, depth + 1);
            }
            ExprKind::AssignOpArray {
                op,
                array,
                index,
                value,
            } => {
                line(buf, depth, &format!("AssignOpArray {}", op));
                array.write_tree(buf, depth + 1);
                index.write_tree(buf, depth + 1);
                value.write_tree(buf, depth + 1);
            }
            ExprKind::ReadArray { array, index } => {
                line(buf, depth, "ReadArray");
                array.write_tree(buf, depth + 1);
                index.write_tree(buf, depth + 1);
            }
            ExprKind::ConstructArray { elements } => {
                line(buf, depth, "ConstructArray");
                for elem in elements {
                    elem.write_tree(buf, depth + 1);
                }
            }
            ExprKind::FunctionCall { callee, args } => {
                line(buf, depth, "FunctionCall");
                callee.write_tree(buf, depth + 1);
                for arg in args {
                    arg.write_tree(buf, depth + 1);
                }
            }
            ExprKind::Variable { name } => line(buf, depth, &format!("Variable {}", name)),
            ExprKind::Constant { value } => match value {
                Value::UserFunction(func) => {
                    line(buf, depth, &format!("Constant function |{}|", func.params.join(", ")));
                    for stmt in func.body.iter() {
                        stmt.write_tree(buf, depth + 1);
                    }
                }
                Value::String(val) => line(buf, depth, &format!("Constant string {:?}", val)),
                Value::Float(val) => line(buf, depth, &format!("Constant float {:?}", val)),
                other => line(buf, depth, &format!("Constant {} {}", other.kind(), other)),
            },
        }
    }
}

fn line(buf: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        buf.push_str("  ");
    }
    buf.push_str(text);
    buf.push('\n');
}
