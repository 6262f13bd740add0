//! Operator semantics shared by plain and compound-assignment operations.

use dolls_source::RuntimeError;
use dolls_value::ast::OperationKind;
use dolls_value::Value;

/// Applies `Negative` or `Not` to `operand`.
pub fn unary(op: OperationKind, operand: &Value) -> Result<Value, RuntimeError> {
    match (op, operand) {
        (OperationKind::Not, operand) => Ok(Value::Bool(!operand.to_bool())),
        (OperationKind::Negative, Value::Int(val)) => Ok(Value::Int(val.wrapping_neg())),
        (OperationKind::Negative, Value::Float(val)) => Ok(Value::Float(-val)),
        (op, operand) => Err(RuntimeError::new(format!(
            "Cannot apply {} operator: {}",
            op.symbol(),
            operand.kind()
        ))),
    }
}

/// Applies an arithmetic or comparison operator.
///
/// `+` with a string on either side concatenates display strings. Otherwise
/// both operands are promoted to float if either is a float, else to int if
/// either is an int. Two non-numeric operands are a type error.
pub fn binary(op: OperationKind, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let is_string = |val: &Value| matches!(val, Value::String(_));
    let is_float = |val: &Value| matches!(val, Value::Float(_));
    let is_int = |val: &Value| matches!(val, Value::Int(_));

    if op == OperationKind::Add && (is_string(lhs) || is_string(rhs)) {
        Ok(Value::String(format!("{}{}", lhs, rhs)))
    } else if is_float(lhs) || is_float(rhs) {
        float_op(op, lhs.to_float()?, rhs.to_float()?)
    } else if is_int(lhs) || is_int(rhs) {
        int_op(op, lhs.to_int()?, rhs.to_int()?)
    } else {
        Err(RuntimeError::new(format!(
            "Cannot apply {} operator: {}, {}",
            op.symbol(),
            lhs.kind(),
            rhs.kind()
        )))
    }
}

fn float_op(op: OperationKind, lhs: f64, rhs: f64) -> Result<Value, RuntimeError> {
    let val = match op {
        OperationKind::Add => Value::Float(lhs + rhs),
        OperationKind::Sub => Value::Float(lhs - rhs),
        OperationKind::Mul => Value::Float(lhs * rhs),
        // IEEE: x / 0.0 is infinite or NaN
        OperationKind::Div => Value::Float(lhs / rhs),
        OperationKind::Mod => Value::Float(lhs % rhs),
        OperationKind::Lt => Value::Bool(lhs < rhs),
        OperationKind::Le => Value::Bool(lhs <= rhs),
        OperationKind::Gt => Value::Bool(lhs > rhs),
        OperationKind::Ge => Value::Bool(lhs >= rhs),
        OperationKind::Eq => Value::Bool(lhs == rhs),
        OperationKind::Ne => Value::Bool(lhs != rhs),
        _ => return Err(not_binary(op)),
    };
    Ok(val)
}

fn int_op(op: OperationKind, lhs: i32, rhs: i32) -> Result<Value, RuntimeError> {
    let val = match op {
        OperationKind::Add => Value::Int(lhs.wrapping_add(rhs)),
        OperationKind::Sub => Value::Int(lhs.wrapping_sub(rhs)),
        OperationKind::Mul => Value::Int(lhs.wrapping_mul(rhs)),
        OperationKind::Div | OperationKind::Mod if rhs == 0 => {
            return Err(RuntimeError::new("Divide by 0"))
        }
        OperationKind::Div => Value::Int(lhs.wrapping_div(rhs)),
        OperationKind::Mod => Value::Int(lhs.wrapping_rem(rhs)),
        OperationKind::Lt => Value::Bool(lhs < rhs),
        OperationKind::Le => Value::Bool(lhs <= rhs),
        OperationKind::Gt => Value::Bool(lhs > rhs),
        OperationKind::Ge => Value::Bool(lhs >= rhs),
        OperationKind::Eq => Value::Bool(lhs == rhs),
        OperationKind::Ne => Value::Bool(lhs != rhs),
        _ => return Err(not_binary(op)),
    };
    Ok(val)
}

/// `And`, `Or` and the unary operators never reach the numeric ladder.
fn not_binary(op: OperationKind) -> RuntimeError {
    RuntimeError::new(format!("Cannot apply {} operator to two numbers", op.symbol()))
}
