use std::rc::Rc;

use crate::ops;
use crate::{CancelToken, RuntimeConfig};
use dolls_source::{Abort, EvalError, Position, RuntimeError};
use dolls_value::ast::{Expr, ExprKind, IfArm, OperationKind, Program, Stmt, StmtKind};
use dolls_value::{Array, Caller, Env, Function, NativeFn, UserFn, Value};
use log::{debug, trace};

/// Remaining stack below which evaluation moves onto a freshly allocated segment.
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each segment allocated once the red zone is reached.
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Owns the global scope and walks programs against it.
///
/// Globals persist between [`Runtime::execute`] calls, so a host can feed a
/// program in piece by piece (e.g. a REPL).
pub struct Runtime {
    globals: Env,
    /// Innermost active scope. `globals` at top level, a call frame inside a user function.
    scope: Env,
    config: RuntimeConfig,
    cancel: CancelToken,
    /// Tripped by the embedder's own timeouts, cleared by the embedder after each run.
    timeout: CancelToken,
    /// Current number of nested calls.
    depth: usize,
    /// Current nesting of statements and expressions in the innermost call frame.
    nesting: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let globals = Env::global();
        Self {
            scope: globals.clone(),
            globals,
            config,
            cancel: CancelToken::new(),
            timeout: CancelToken::new(),
            depth: 0,
            nesting: 0,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// A handle that cancels any current or future execution until reset.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// A second cancellation signal for timeouts, so that clearing a timeout
    /// never clears a cancellation the host asked for.
    pub fn timeout_token(&self) -> CancelToken {
        self.timeout.clone()
    }

    /// Binds a native function that only looks at its arguments.
    /// Overwrites any existing global of the same name.
    pub fn register_native<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        debug!("registering native function `{}`", name);
        let native = NativeFn::simple(name, func);
        self.globals
            .define(name, Value::NativeFunction(Rc::new(native)));
    }

    /// Binds a native function that can call back into the runtime through [`Caller`].
    pub fn register_native_fn<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&mut dyn Caller, &[Value]) -> Result<Value, Abort> + 'static,
    {
        debug!("registering native function `{}`", name);
        let native = NativeFn::new(name, func);
        self.globals
            .define(name, Value::NativeFunction(Rc::new(native)));
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.define(name, value);
    }

    /// Reads a global. Unbound names read as `nil`.
    pub fn global(&self, name: &str) -> Value {
        self.globals.lookup(name)
    }

    /// Runs `program` to completion and returns the value of its last statement.
    pub fn execute(&mut self, program: &Program) -> Result<Value, EvalError> {
        debug!("executing {} statements", program.statements.len());
        self.reset_frames();
        let result = self.exec_block(&program.statements);
        // an aborted call leaves its frame behind
        self.reset_frames();

        match &result {
            Ok(value) => debug!("finished with {:?}", value),
            Err(abort) => debug!("aborted: {:?}", abort),
        }
        result.map_err(EvalError::from)
    }

    /// Calls a function value from the host, e.g. a callback a script stored in a global.
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, EvalError> {
        let func = callee.to_function()?;
        self.reset_frames();
        let result = self.call_function(&func, args);
        self.reset_frames();
        result.map_err(EvalError::from)
    }

    fn reset_frames(&mut self) {
        self.scope = self.globals.clone();
        self.depth = 0;
        self.nesting = 0;
    }
}

impl Caller for Runtime {
    fn call(&mut self, func: &Function, args: Vec<Value>) -> Result<Value, Abort> {
        self.call_function(func, args)
    }
}

/* Statements */
impl Runtime {
    fn check_cancelled(&self) -> Result<(), Abort> {
        if self.cancel.is_cancelled() || self.timeout.is_cancelled() {
            debug!("cancellation requested");
            Err(Abort::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Executes `stmts` in the current scope and returns the value of the last one.
    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Value, Abort> {
        if stmts.is_empty() {
            self.check_cancelled()?;
            return Ok(Value::Nil);
        }

        let mut last = Value::Nil;
        for stmt in stmts {
            self.check_cancelled()?;
            last = self.exec_stmt(stmt)?;
        }
        Ok(last)
    }

    /// Runs `f` one nesting level deeper, growing the native stack when it runs low.
    fn nested<T>(
        &mut self,
        pos: Position,
        f: impl FnOnce(&mut Self) -> Result<T, Abort>,
    ) -> Result<T, Abort> {
        if self.nesting >= self.config.max_nesting_depth {
            return Err(RuntimeError::new("Nesting too deep").at(pos).into());
        }
        self.nesting += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || f(self));
        self.nesting -= 1;
        result
    }

    /// `If` and `While` evaluate to `nil`; an expression statement to its value.
    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Value, Abort> {
        self.nested(stmt.pos, |runtime| runtime.exec_stmt_kind(&stmt.kind))
    }

    fn exec_stmt_kind(&mut self, kind: &StmtKind) -> Result<Value, Abort> {
        match kind {
            StmtKind::If { arms } => {
                self.exec_if(arms)?;
                Ok(Value::Nil)
            }
            StmtKind::While { cond, body } => {
                while self.eval_expr(cond)?.to_bool() {
                    self.exec_block(body)?;
                }
                Ok(Value::Nil)
            }
            StmtKind::Expr(expr) => self.eval_expr(expr),
        }
    }

    /// Runs the body of the first arm whose condition holds.
    fn exec_if(&mut self, arms: &[IfArm]) -> Result<(), Abort> {
        for arm in arms {
            let matched = match &arm.cond {
                Some(cond) => self.eval_expr(cond)?.to_bool(),
                None => true,
            };
            if matched {
                self.exec_block(&arm.body)?;
                break;
            }
        }
        Ok(())
    }
}

/* Expressions */
impl Runtime {
    /// Evaluates `expr`. Positionless errors get the position of `expr`.
    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, Abort> {
        self.nested(expr.pos, |runtime| runtime.eval_expr_kind(&expr.kind))
            .map_err(|abort| abort.at(expr.pos))
    }

    fn eval_expr_kind(&mut self, kind: &ExprKind) -> Result<Value, Abort> {
        match kind {
            ExprKind::Constant { value } => Ok(match value {
                // a function literal closes over the scope it is evaluated in
                Value::UserFunction(func) if func.env.is_none() => {
                    Value::UserFunction(Rc::new(func.capture(&self.scope)))
                }
                other => other.clone(),
            }),
            ExprKind::Variable { name } => Ok(self.scope.lookup(name)),
            ExprKind::Assign { name, value } => {
                let value = self.eval_expr(value)?;
                self.scope.define(name.as_str(), value.clone());
                Ok(value)
            }
            ExprKind::AssignArray {
                array,
                index,
                value,
            } => {
                let (array, index) = self.eval_element(array, index)?;
                let value = self.eval_expr(value)?;
                array.set(index, value.clone())?;
                Ok(value)
            }
            ExprKind::AssignOpArray {
                op,
                array,
                index,
                value,
            } => {
                let (array, index) = self.eval_element(array, index)?;
                let rhs = self.eval_expr(value)?;
                let current = array.get(index)?;
                let value = ops::binary(*op, &current, &rhs)?;
                array.set(index, value.clone())?;
                Ok(value)
            }
            ExprKind::ReadArray { array, index } => {
                let (array, index) = self.eval_element(array, index)?;
                Ok(array.get(index)?)
            }
            ExprKind::ConstructArray { elements } => {
                let values = self.eval_exprs(elements)?;
                Ok(Value::Array(Array::from_vec(values)))
            }
            ExprKind::FunctionCall { callee, args } => {
                let callee = self.eval_expr(callee)?;
                let func = match callee.to_function() {
                    Ok(func) => func,
                    Err(_) => {
                        return Err(RuntimeError::new(format!(
                            "Value is not callable: {}",
                            callee.kind()
                        ))
                        .into())
                    }
                };
                let args = self.eval_exprs(args)?;
                self.call_function(&func, args)
            }
            ExprKind::Operation { op, operands } => self.eval_operation(*op, operands),
        }
    }

    /// Evaluates expressions left to right.
    fn eval_exprs(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, Abort> {
        exprs.iter().map(|expr| self.eval_expr(expr)).collect()
    }

    /// Evaluates the array and index of an element access, in that order.
    fn eval_element(&mut self, array: &Expr, index: &Expr) -> Result<(Array, i32), Abort> {
        let array = self
            .eval_expr(array)?
            .to_array()
            .map_err(|err| err.at(array.pos))?;
        let index = self
            .eval_expr(index)?
            .to_int()
            .map_err(|err| err.at(index.pos))?;
        Ok((array, index))
    }

    fn eval_operation(&mut self, op: OperationKind, operands: &[Expr]) -> Result<Value, Abort> {
        match (op, operands) {
            // short circuit: the deciding operand is the result
            (OperationKind::And, [lhs, rhs]) => {
                let lhs = self.eval_expr(lhs)?;
                if !lhs.to_bool() {
                    return Ok(lhs);
                }
                self.eval_expr(rhs)
            }
            (OperationKind::Or, [lhs, rhs]) => {
                let lhs = self.eval_expr(lhs)?;
                if lhs.to_bool() {
                    return Ok(lhs);
                }
                self.eval_expr(rhs)
            }
            (op, [operand]) if op.is_unary() => {
                let operand = self.eval_expr(operand)?;
                Ok(ops::unary(op, &operand)?)
            }
            (op, [lhs, rhs]) if !op.is_unary() => {
                let lhs = self.eval_expr(lhs)?;
                let rhs = self.eval_expr(rhs)?;
                Ok(ops::binary(op, &lhs, &rhs)?)
            }
            (op, operands) => Err(Abort::Fatal(format!(
                "operator {} applied to {} operands",
                op.symbol(),
                operands.len()
            ))),
        }
    }
}

/* Calls */
impl Runtime {
    /// Every call, including one a native function makes through [`Caller`],
    /// observes cancellation.
    fn call_function(&mut self, func: &Function, args: Vec<Value>) -> Result<Value, Abort> {
        self.check_cancelled()?;
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::new("Stack overflow").into());
        }

        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || match func {
            Function::Native(native) => {
                trace!("calling native `{}` with {} args", native.ident, args.len());
                (native.func)(self, &args)
            }
            Function::User(user) => self.call_user(user, args),
        });
        self.depth -= 1;
        result
    }

    /// Runs `func` in a fresh scope whose parent is the captured scope.
    /// Missing arguments are `nil`; extra ones are dropped.
    fn call_user(&mut self, func: &UserFn, args: Vec<Value>) -> Result<Value, Abort> {
        trace!("calling {:?} with {} args at depth {}", func, args.len(), self.depth);

        let parent = func.env.as_ref().unwrap_or(&self.globals);
        let frame = parent.child();
        let mut args = args.into_iter();
        for param in &func.params {
            frame.define(param.as_str(), args.next().unwrap_or(Value::Nil));
        }

        let caller_scope = std::mem::replace(&mut self.scope, frame);
        let caller_nesting = std::mem::replace(&mut self.nesting, 0);
        let result = self.exec_block(&func.body);
        self.nesting = caller_nesting;
        self.scope = caller_scope;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dolls_parser::parse_source;
    use insta::assert_snapshot;
    use std::cell::{Cell, RefCell};

    fn run_in(runtime: &mut Runtime, source: &str) -> Result<Value, EvalError> {
        let program = parse_source(source).unwrap();
        runtime.execute(&program)
    }

    fn run(source: &str) -> Result<Value, EvalError> {
        run_in(&mut Runtime::new(), source)
    }

    fn runtime_error(source: &str) -> RuntimeError {
        match run(source) {
            Err(EvalError::Runtime(err)) => err,
            other => panic!("expected a runtime error, got {:?}", other),
        }
    }

    /// A runtime with `print` collecting its lines.
    fn with_print() -> (Runtime, Rc<RefCell<Vec<String>>>) {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let mut runtime = Runtime::new();
        let sink = Rc::clone(&lines);
        runtime.register_native("print", move |args| {
            let line: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
            sink.borrow_mut().push(line.join(" "));
            Ok(Value::Nil)
        });
        (runtime, lines)
    }

    /// A runtime with `bump()` counting its calls.
    fn with_counter() -> (Runtime, Rc<Cell<i32>>) {
        let count = Rc::new(Cell::new(0));
        let mut runtime = Runtime::new();
        let counter = Rc::clone(&count);
        runtime.register_native("bump", move |_args| {
            counter.set(counter.get() + 1);
            Ok(Value::Bool(true))
        });
        (runtime, count)
    }

    #[test]
    fn test_precedence_and_negation() {
        assert_eq!(run("x = 5 + 3 * -2"), Ok(Value::Int(-1)));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run(r#"s = "a" + 1"#), Ok(Value::from("a1")));
        assert_eq!(run(r#"1.5 + "b" + nil"#), Ok(Value::from("1.5bnil")));
    }

    #[test]
    fn test_program_value() {
        assert_eq!(run(""), Ok(Value::Nil));
        assert_eq!(run("1 2"), Ok(Value::Int(2)));
        assert_eq!(run("1 while (nil) { }"), Ok(Value::Nil));
        assert_eq!(run("1 if (true) { 2 }"), Ok(Value::Nil));
    }

    #[test]
    fn test_array_aliasing() {
        let (mut runtime, lines) = with_print();
        run_in(&mut runtime, "a = [1,2,3] b = a b[1] = 9 print(a)").unwrap();
        assert_eq!(*lines.borrow(), vec!["[1,9,3]"]);
    }

    #[test]
    fn test_array_access() {
        assert_eq!(run("a = [[1], 2] a[0][0]"), Ok(Value::Int(1)));
        assert_eq!(run("a = [1, 2] a[1] += 10"), Ok(Value::Int(12)));
        assert_eq!(run("a = [1, 2] a[0] *= 5 a[0]"), Ok(Value::Int(5)));
        assert_eq!(run(r#"a = [0] a["0"] = 7"#), Ok(Value::Int(7)));

        let err = runtime_error("a = [1]\na[3]");
        assert_eq!(err.message, "Index out of range: 3 (size 1)");
        assert_eq!(err.position, Position::new(2, 2));
        assert_eq!(runtime_error("x = 1 x[0]").message, "int cannot be converted to array");
    }

    #[test]
    fn test_implicit_return() {
        let (mut runtime, lines) = with_print();
        run_in(&mut runtime, "f = |x|{ x * x } print(f(4))").unwrap();
        assert_eq!(*lines.borrow(), vec!["16"]);
        // the value of a trailing `if` is nil
        assert_eq!(run("f = || { 1 if (true) { 2 } } f()"), Ok(Value::Nil));
        assert_eq!(run("f = || { } f()"), Ok(Value::Nil));
    }

    #[test]
    fn test_while_countdown() {
        let (mut runtime, lines) = with_print();
        run_in(&mut runtime, "i=3 while(i>0){ print(i) i=i-1 }").unwrap();
        assert_eq!(*lines.borrow(), vec!["3", "2", "1"]);
        assert_eq!(runtime.global("i"), Value::Int(0));
    }

    #[test]
    fn test_if_runs_first_matching_arm_only() {
        let (mut runtime, count) = with_counter();
        let value = run_in(
            &mut runtime,
            "r = 0 if (nil) { r = 1 } elif (2) { r = 2 } elif (bump()) { r = 3 } else { r = 4 } r",
        );
        assert_eq!(value, Ok(Value::Int(2)));
        assert_eq!(count.get(), 0);
        assert_eq!(run("r = 0 if (false) { r = 1 } else { r = 4 } r"), Ok(Value::Int(4)));
        assert_eq!(run("r = 0 if (false) { r = 1 } r"), Ok(Value::Int(0)));
    }

    #[test]
    fn test_short_circuit() {
        let (mut runtime, count) = with_counter();
        assert_eq!(run_in(&mut runtime, "false & bump()"), Ok(Value::Bool(false)));
        assert_eq!(run_in(&mut runtime, "nil & bump()"), Ok(Value::Nil));
        assert_eq!(run_in(&mut runtime, "7 | bump()"), Ok(Value::Int(7)));
        assert_eq!(count.get(), 0);

        // 0 is truthy
        assert_eq!(run_in(&mut runtime, "0 & bump()"), Ok(Value::Bool(true)));
        assert_eq!(run_in(&mut runtime, "nil | bump()"), Ok(Value::Bool(true)));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(run(r#"1 & "x""#), Ok(Value::from("x")));
        assert_eq!(run("nil | false"), Ok(Value::Bool(false)));
        assert_eq!(run("!nil"), Ok(Value::Bool(true)));
        assert_eq!(run("![]"), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_unbound_variable_is_nil() {
        assert_eq!(run("y"), Ok(Value::Nil));
        assert_eq!(run("a = b = 3 c = [a, b] c"), Ok(Value::from(vec![Value::Int(3), Value::Int(3)])));
    }

    #[test]
    fn test_argument_count() {
        assert_eq!(run("f = |a, b| { b } f(1)"), Ok(Value::Nil));
        assert_eq!(run("f = |a| { a } f(1, 2, 3)"), Ok(Value::Int(1)));
    }

    #[test]
    fn test_assignment_binds_innermost_scope() {
        assert_eq!(
            run("x = 1 f = || { x = 2 x } r = [f(), x] r"),
            Ok(Value::from(vec![Value::Int(2), Value::Int(1)]))
        );
        // parameters shadow globals
        assert_eq!(run("x = 1 f = |x| { x } r = [f(5), x] r"), Ok(Value::from(vec![Value::Int(5), Value::Int(1)])));
    }

    #[test]
    fn test_closures_capture_defining_scope() {
        assert_eq!(
            run("make = |n| { |x| { x + n } } add2 = make(2) add3 = make(3) r = [add2(5), add3(5)] r"),
            Ok(Value::from(vec![Value::Int(7), Value::Int(8)]))
        );
    }

    #[test]
    fn test_recursion() {
        assert_eq!(
            run("fib = |n| { r = n if (n > 1) { r = fib(n - 1) + fib(n - 2) } r } fib(15)"),
            Ok(Value::Int(610))
        );
    }

    #[test]
    fn test_stack_overflow() {
        let mut runtime = Runtime::with_config(RuntimeConfig {
            max_call_depth: 50,
            ..RuntimeConfig::default()
        });
        let err = run_in(&mut runtime, "f = || { f() }\nf()").unwrap_err();
        assert_eq!(err.to_string(), "Runtime Error at line 1, column 11: Stack overflow");
        // the runtime is usable again afterwards
        assert_eq!(run_in(&mut runtime, "f = |n| { n } f(1)"), Ok(Value::Int(1)));
    }

    #[test]
    fn test_runtime_error_positions() {
        let err = runtime_error("x = 1\ny = x / 0");
        assert_eq!(err.message, "Divide by 0");
        assert_eq!(err.position, Position::new(2, 7));

        let err = runtime_error("x = 1 x()");
        assert_eq!(err.message, "Value is not callable: int");
        assert_eq!(err.position, Position::new(1, 8));

        let err = runtime_error("f = |a| {\n  a - nil\n}\nf(1)");
        assert_eq!(err.message, "nil cannot be converted to int");
        assert_eq!(err.position, Position::new(2, 5));

        assert_snapshot!(
            run("-\"s\"").unwrap_err().to_string(),
            @"Runtime Error at line 1, column 1: Cannot apply - operator: string"
        );
    }

    #[test]
    fn test_native_error_gets_call_position() {
        let mut runtime = Runtime::new();
        runtime.register_native("fail", |_args| Err(RuntimeError::new("boom")));
        let err = run_in(&mut runtime, "x = 1\n  fail()").unwrap_err();
        assert_eq!(err.position(), Some(Position::new(2, 7)));
    }

    #[test]
    fn test_native_calls_back() {
        let mut runtime = Runtime::new();
        runtime.register_native_fn("twice", |caller, args| {
            let func = args[0].to_function()?;
            let once = caller.call(&func, vec![args[1].clone()])?;
            caller.call(&func, vec![once])
        });
        assert_eq!(run_in(&mut runtime, "twice(|x| { x * 3 }, 2)"), Ok(Value::Int(18)));
    }

    #[test]
    fn test_register_native_overwrites() {
        let mut runtime = Runtime::new();
        runtime.register_native("v", |_args| Ok(Value::Int(1)));
        runtime.register_native("v", |_args| Ok(Value::Int(2)));
        assert_eq!(run_in(&mut runtime, "v()"), Ok(Value::Int(2)));
    }

    #[test]
    fn test_globals_persist() {
        let mut runtime = Runtime::new();
        run_in(&mut runtime, "x = 1").unwrap();
        assert_eq!(run_in(&mut runtime, "x + 1"), Ok(Value::Int(2)));

        runtime.set_global("y", Value::Float(0.5));
        assert_eq!(run_in(&mut runtime, "y * 4"), Ok(Value::Float(2.0)));
        assert_eq!(runtime.global("missing"), Value::Nil);
    }

    #[test]
    fn test_call_value_from_host() {
        let mut runtime = Runtime::new();
        run_in(&mut runtime, "k = 10 add = |a, b| { a + b + k }").unwrap();
        let add = runtime.global("add");
        assert_eq!(
            runtime.call_value(&add, vec![Value::Int(1), Value::Int(2)]),
            Ok(Value::Int(13))
        );
        assert!(runtime.call_value(&Value::Nil, Vec::new()).is_err());
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut runtime = Runtime::new();
        let token = runtime.cancel_token();
        token.cancel();
        assert_eq!(run_in(&mut runtime, "x = 1"), Err(EvalError::Cancelled));
        // an empty program still observes the request
        assert_eq!(run_in(&mut runtime, ""), Err(EvalError::Cancelled));
        assert_eq!(runtime.global("x"), Value::Nil);

        token.reset();
        assert_eq!(run_in(&mut runtime, "x = 1"), Ok(Value::Int(1)));
    }

    #[test]
    fn test_cancel_runaway_loop() {
        let mut runtime = Runtime::new();
        let token = runtime.cancel_token();
        let ticks = Rc::new(Cell::new(0));
        let counter = Rc::clone(&ticks);
        runtime.register_native("tick", move |_args| {
            counter.set(counter.get() + 1);
            if counter.get() == 3 {
                token.cancel();
            }
            Ok(Value::Nil)
        });

        let err = run_in(&mut runtime, "while (true) { tick() }").unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(ticks.get(), 3);
    }

    #[test]
    fn test_cancel_inside_empty_loop_body() {
        let mut runtime = Runtime::new();
        let token = runtime.cancel_token();
        runtime.register_native("stop", move |_args| {
            token.cancel();
            Ok(Value::Bool(true))
        });
        assert_eq!(run_in(&mut runtime, "while (stop()) { }"), Err(EvalError::Cancelled));
    }

    #[test]
    fn test_cancel_reaches_nested_calls() {
        let mut runtime = Runtime::new();
        let token = runtime.cancel_token();
        runtime.register_native_fn("each", move |caller, args| {
            let func = args[0].to_function()?;
            for i in 0..10 {
                if i == 2 {
                    token.cancel();
                }
                caller.call(&func, vec![Value::Int(i)])?;
            }
            Ok(Value::Nil)
        });
        let err = run_in(&mut runtime, "n = 0 each(|i| { n = i })").unwrap_err();
        assert_eq!(err, EvalError::Cancelled);
    }

    #[test]
    fn test_malformed_operation_is_fatal() {
        let operand = Expr::new(ExprKind::Constant { value: Value::Int(1) }, Position::NONE);
        let expr = Expr::new(
            ExprKind::Operation {
                op: OperationKind::Add,
                operands: vec![operand],
            },
            Position::new(1, 1),
        );
        let program = Program::new(vec![expr.into()]);
        assert_eq!(
            Runtime::new().execute(&program),
            Err(EvalError::Fatal("operator + applied to 1 operands".to_string()))
        );
    }

    #[test]
    fn test_cancel_reaches_native_callbacks() {
        let mut runtime = Runtime::new();
        let token = runtime.cancel_token();
        let ticks = Rc::new(Cell::new(0));
        let counter = Rc::clone(&ticks);
        runtime.register_native("tick", move |_args| {
            counter.set(counter.get() + 1);
            token.cancel();
            Ok(Value::Nil)
        });
        runtime.register_native_fn("repeat", |caller, args| {
            let func = args[1].to_function()?;
            for _ in 0..args[0].to_int()? {
                caller.call(&func, Vec::new())?;
            }
            Ok(Value::Nil)
        });
        let err = run_in(&mut runtime, "repeat(100000, tick)").unwrap_err();
        assert_eq!(err, EvalError::Cancelled);
        assert_eq!(ticks.get(), 1);
    }

    #[test]
    fn test_timeout_token_leaves_host_token_alone() {
        let mut runtime = Runtime::new();
        runtime.timeout_token().cancel();
        assert_eq!(run_in(&mut runtime, "1"), Err(EvalError::Cancelled));
        assert!(!runtime.cancel_token().is_cancelled());
        runtime.timeout_token().reset();
        assert_eq!(run_in(&mut runtime, "1"), Ok(Value::Int(1)));
    }

    #[test]
    fn test_deep_expression_is_an_error() {
        let mut expr = Expr::new(ExprKind::Constant { value: Value::Int(1) }, Position::NONE);
        for _ in 0..100 {
            expr = Expr::new(
                ExprKind::Operation {
                    op: OperationKind::Negative,
                    operands: vec![expr],
                },
                Position::new(1, 1),
            );
        }
        let program = Program::new(vec![expr.into()]);

        let mut runtime = Runtime::with_config(RuntimeConfig {
            max_nesting_depth: 50,
            ..RuntimeConfig::default()
        });
        match runtime.execute(&program) {
            Err(EvalError::Runtime(err)) => assert_eq!(err.message, "Nesting too deep"),
            other => panic!("expected a runtime error, got {:?}", other),
        }
        assert_eq!(Runtime::new().execute(&program), Ok(Value::Int(1)));
    }

    #[test]
    fn test_nesting_is_counted_per_call_frame() {
        let mut runtime = Runtime::with_config(RuntimeConfig {
            max_nesting_depth: 20,
            ..RuntimeConfig::default()
        });
        let result = run_in(
            &mut runtime,
            "f = |n| { if (n == 0) { 0 } else { 1 + f(n - 1) } } f(100)",
        );
        assert_eq!(result, Ok(Value::Int(100)));
    }

    #[test]
    fn test_default_call_depth_fits_a_small_thread_stack() {
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let depth = RuntimeConfig::DEFAULT_MAX_CALL_DEPTH as i32 - 1;
                let source = format!(
                    "f = |n| {{ if (n == 0) {{ 0 }} else {{ 1 + f(n - 1) }} }} f({})",
                    depth
                );
                // values are not `Send`, so only the rendering leaves the thread
                run(&source).map(|value| value.to_string())
            })
            .unwrap();
        let depth = RuntimeConfig::DEFAULT_MAX_CALL_DEPTH - 1;
        assert_eq!(handle.join().unwrap(), Ok(depth.to_string()));
    }
}
