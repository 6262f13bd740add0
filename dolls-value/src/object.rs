//! Heap-allocated runtime objects: arrays and functions.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use dolls_source::{Abort, RuntimeError};

use crate::ast::Stmt;
use crate::env::Env;
use crate::Value;

/// A mutable, shared, ordered sequence of values.
/// Cloning an `Array` creates an alias, not a copy.
#[derive(Debug, Clone, Default)]
pub struct Array(Rc<RefCell<Vec<Value>>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(values: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(values)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    /// Returns the element at `index`. Arrays and functions are returned as aliases.
    pub fn get(&self, index: i32) -> Result<Value, RuntimeError> {
        let values = self.0.borrow();
        let slot = self.checked_index(index, values.len())?;
        Ok(values[slot].clone())
    }

    /// Overwrites the element at `index`.
    pub fn set(&self, index: i32, value: Value) -> Result<(), RuntimeError> {
        let mut values = self.0.borrow_mut();
        let slot = self.checked_index(index, values.len())?;
        values[slot] = value;
        Ok(())
    }

    /// Borrows the backing sequence. Do not hold the borrow across a call
    /// back into the evaluator.
    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    fn checked_index(&self, index: i32, len: usize) -> Result<usize, RuntimeError> {
        match usize::try_from(index) {
            Ok(slot) if slot < len => Ok(slot),
            _ => Err(RuntimeError::new(format!(
                "Index out of range: {} (size {})",
                index, len
            ))),
        }
    }
}

/// Gives native functions a way back into the evaluator, e.g. to call a
/// function value passed as an argument.
pub trait Caller {
    fn call(&mut self, func: &Function, args: Vec<Value>) -> Result<Value, Abort>;
}

pub type NativeFnPtr = dyn Fn(&mut dyn Caller, &[Value]) -> Result<Value, Abort>;

/// A host callback exposed to scripts.
pub struct NativeFn {
    pub ident: String,
    pub func: Box<NativeFnPtr>,
}

impl NativeFn {
    /// A native function that may call back into the evaluator.
    pub fn new<F>(ident: impl ToString, func: F) -> Self
    where
        F: Fn(&mut dyn Caller, &[Value]) -> Result<Value, Abort> + 'static,
    {
        Self {
            ident: ident.to_string(),
            func: Box::new(func),
        }
    }

    /// A native function that only looks at its arguments.
    pub fn simple<F>(ident: impl ToString, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Self::new(ident, move |_caller: &mut dyn Caller, args: &[Value]| {
            func(args).map_err(Abort::from)
        })
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.ident)
    }
}

/// A function written in the script language.
pub struct UserFn {
    pub params: Vec<String>,
    pub body: Rc<[Stmt]>,
    /// Scope the function was created in. `None` for the literal the parser
    /// produced; the evaluator fills it in when the literal is evaluated.
    pub env: Option<Env>,
}

impl UserFn {
    pub fn new(params: Vec<String>, body: Vec<Stmt>) -> Self {
        Self {
            params,
            body: body.into(),
            env: None,
        }
    }

    /// A copy of this function closed over `env`.
    pub fn capture(&self, env: &Env) -> Self {
        Self {
            params: self.params.clone(),
            body: Rc::clone(&self.body),
            env: Some(env.clone()),
        }
    }
}

impl fmt::Debug for UserFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn |{}|>", self.params.join(", "))
    }
}

/// A callable value.
#[derive(Debug, Clone)]
pub enum Function {
    Native(Rc<NativeFn>),
    User(Rc<UserFn>),
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        match func {
            Function::Native(func) => Value::NativeFunction(func),
            Function::User(func) => Value::UserFunction(func),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_aliasing() {
        let a = Array::from_vec(vec![Value::Int(1), Value::Int(2)]);
        let b = a.clone();
        b.set(0, Value::Int(9)).unwrap();
        assert_eq!(a.get(0), Ok(Value::Int(9)));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Array::from_vec(vec![Value::Int(9), Value::Int(2)])));
    }

    #[test]
    fn test_array_bounds() {
        let a = Array::from_vec(vec![Value::Nil]);
        assert_eq!(
            a.get(1).unwrap_err().message,
            "Index out of range: 1 (size 1)"
        );
        assert_eq!(
            a.set(-1, Value::Nil).unwrap_err().message,
            "Index out of range: -1 (size 1)"
        );
        assert!(Array::new().is_empty());
    }

    #[test]
    fn test_simple_native_maps_errors() {
        struct NoCaller;
        impl Caller for NoCaller {
            fn call(&mut self, _func: &Function, _args: Vec<Value>) -> Result<Value, Abort> {
                unreachable!()
            }
        }

        let func = NativeFn::simple("fail", |_args| Err(RuntimeError::new("nope")));
        let result = (func.func)(&mut NoCaller, &[]);
        assert_eq!(result.unwrap_err(), Abort::Error(RuntimeError::new("nope")));
    }
}
