pub mod ast;
pub mod env;
pub mod object;

use std::fmt;
use std::rc::Rc;

use dolls_source::RuntimeError;

pub use env::Env;
pub use object::{Array, Caller, Function, NativeFn, UserFn};

/// A runtime value. Everything but [`Array`] is immutable; arrays are shared by
/// reference, so a write through one alias is visible through all of them.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i32),
    Float(f64),
    String(String),
    Array(Array),
    NativeFunction(Rc<NativeFn>),
    UserFunction(Rc<UserFn>),
}

/// The tag of a [`Value`], used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Nil,
    Bool,
    Int,
    Float,
    String,
    Array,
    NativeFunction,
    UserFunction,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Nil => "nil",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::NativeFunction => "native function",
            ValueKind::UserFunction => "function",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::NativeFunction(_) => ValueKind::NativeFunction,
            Value::UserFunction(_) => ValueKind::UserFunction,
        }
    }

    /// Truthiness. `nil` and `false` are false, every other value is true.
    pub fn to_bool(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Converts a numeric or numeric-string value to `i32`.
    /// Floats are truncated toward zero.
    pub fn to_int(&self) -> Result<i32, RuntimeError> {
        match self {
            Value::Int(val) => Ok(*val),
            Value::Float(val) => Ok(*val as i32),
            Value::String(val) => val
                .trim()
                .parse()
                .map_err(|_| RuntimeError::new(format!("Cannot convert to int: {}", val))),
            _ => Err(self.conversion_error("int")),
        }
    }

    /// Converts a numeric or numeric-string value to `f64`.
    pub fn to_float(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Int(val) => Ok(f64::from(*val)),
            Value::Float(val) => Ok(*val),
            Value::String(val) => val
                .trim()
                .parse()
                .map_err(|_| RuntimeError::new(format!("Cannot convert to float: {}", val))),
            _ => Err(self.conversion_error("float")),
        }
    }

    pub fn to_array(&self) -> Result<Array, RuntimeError> {
        match self {
            Value::Array(array) => Ok(array.clone()),
            _ => Err(self.conversion_error("array")),
        }
    }

    pub fn to_function(&self) -> Result<Function, RuntimeError> {
        match self {
            Value::NativeFunction(func) => Ok(Function::Native(Rc::clone(func))),
            Value::UserFunction(func) => Ok(Function::User(Rc::clone(func))),
            _ => Err(self.conversion_error("function")),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    fn conversion_error(&self, target: &str) -> RuntimeError {
        RuntimeError::new(format!("{} cannot be converted to {}", self.kind(), target))
    }

    fn write_display(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<*const ()>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(val) => write!(f, "{}", val),
            Value::Int(val) => write!(f, "{}", val),
            Value::Float(val) => write!(f, "{}", val),
            Value::String(val) => f.write_str(val),
            Value::Array(array) => {
                // an array that contains itself
                if open.contains(&array.as_ptr()) {
                    return f.write_str("[...]");
                }
                open.push(array.as_ptr());
                f.write_str("[")?;
                for (i, elem) in array.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    elem.write_display(f, open)?;
                }
                open.pop();
                f.write_str("]")
            }
            Value::NativeFunction(_) => f.write_str("<native fn>"),
            Value::UserFunction(_) => f.write_str("<fn>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_display(f, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("Nil"),
            Value::Bool(val) => write!(f, "Bool({})", val),
            Value::Int(val) => write!(f, "Int({})", val),
            Value::Float(val) => write!(f, "Float({:?})", val),
            Value::String(val) => write!(f, "String({:?})", val),
            Value::Array(_) => write!(f, "Array({})", self),
            Value::NativeFunction(func) => write!(f, "NativeFunction({})", func.ident),
            Value::UserFunction(func) => write!(f, "UserFunction({:?})", func.params),
        }
    }
}

/// Host-side equality: scalars by value, arrays element-wise, functions by identity.
/// The language's own `==` is numeric and lives in the runtime.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Int(l), Value::Int(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => l == r,
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Array(l), Value::Array(r)) => {
                l.ptr_eq(r) || *l.borrow() == *r.borrow()
            }
            (Value::NativeFunction(l), Value::NativeFunction(r)) => Rc::ptr_eq(l, r),
            (Value::UserFunction(l), Value::UserFunction(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Bool(val)
    }
}

impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Value::Int(val)
    }
}

impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Value::Float(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::String(val.to_string())
    }
}

impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::String(val)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(Array::from_vec(values))
    }
}
