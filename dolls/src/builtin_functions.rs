//! The standard library every [`crate::Interpreter`] starts with.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use dolls_runtime::Runtime;
use dolls_source::{Abort, RuntimeError};
use dolls_value::{Caller, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::Output;

/// Registers `print`, `p`, `for`, `foreach`, `size`, `rand`, `assert`,
/// `assert_eq` and `clock`. `print` writes to `output`; `rand` draws from a
/// generator seeded with `seed`, or from entropy when `None`.
pub fn register_all(runtime: &mut Runtime, output: &Output, seed: Option<u64>) {
    let out = output.clone();
    runtime.register_native("print", move |args| print(&out, args));
    let out = output.clone();
    runtime.register_native("p", move |args| print(&out, args));

    runtime.register_native_fn("for", for_range);
    runtime.register_native_fn("foreach", foreach);
    runtime.register_native("size", size);

    let rng = Rc::new(RefCell::new(match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }));
    runtime.register_native("rand", move |args| random(&mut rng.borrow_mut(), args));

    runtime.register_native("assert", assert);
    runtime.register_native("assert_eq", assert_eq);
    runtime.register_native("clock", clock);
}

/// Returns the `index`th argument (0-based).
fn param(args: &[Value], index: usize) -> Result<&Value, RuntimeError> {
    args.get(index)
        .ok_or_else(|| RuntimeError::new(format!("Parameter #{} is required", index + 1)))
}

/// `print(args...)`: writes the arguments separated by spaces, then a newline.
pub fn print(output: &Output, args: &[Value]) -> Result<Value, RuntimeError> {
    let line: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    output.write(&line.join(" "));
    output.write("\n");
    Ok(Value::Nil)
}

/// `for(start, end, f)`: calls `f(i)` for every `i` from `start` to `end` inclusive.
pub fn for_range(caller: &mut dyn Caller, args: &[Value]) -> Result<Value, Abort> {
    let start = param(args, 0)?.to_int()?;
    let end = param(args, 1)?.to_int()?;
    let func = param(args, 2)?.to_function()?;

    for i in start..=end {
        caller.call(&func, vec![Value::Int(i)])?;
    }
    Ok(Value::Nil)
}

/// `foreach(array, f)`: calls `f(element, index)` for every element.
/// The length is re-read every step, so `f` may grow or shrink the array.
pub fn foreach(caller: &mut dyn Caller, args: &[Value]) -> Result<Value, Abort> {
    let array = param(args, 0)?.to_array()?;
    let func = param(args, 1)?.to_function()?;

    let mut index: i32 = 0;
    while (index as usize) < array.len() {
        let element = array.get(index)?;
        caller.call(&func, vec![element, Value::Int(index)])?;
        index += 1;
    }
    Ok(Value::Nil)
}

/// `size(array)`: number of elements.
pub fn size(args: &[Value]) -> Result<Value, RuntimeError> {
    let array = param(args, 0)?.to_array()?;
    Ok(Value::Int(array.len() as i32))
}

/// `rand()` is a float in `[0, 1)`, `rand(max)` an int in `[0, max)` and
/// `rand(min, max)` an int in `[min, max)`. An empty range yields its lower bound.
pub fn random(rng: &mut StdRng, args: &[Value]) -> Result<Value, RuntimeError> {
    let (min, max) = match args.len() {
        0 => return Ok(Value::Float(rng.gen::<f64>())),
        1 => (0, param(args, 0)?.to_int()?),
        _ => (param(args, 0)?.to_int()?, param(args, 1)?.to_int()?),
    };

    if min > max {
        return Err(RuntimeError::new(format!(
            "Invalid range for rand: {} > {}",
            min, max
        )));
    }
    if min == max {
        return Ok(Value::Int(min));
    }
    Ok(Value::Int(rng.gen_range(min..max)))
}

/// `assert(cond)`: fails unless `cond` is truthy.
pub fn assert(args: &[Value]) -> Result<Value, RuntimeError> {
    if param(args, 0)?.to_bool() {
        Ok(Value::Bool(true))
    } else {
        Err(RuntimeError::new("Assertion failed"))
    }
}

/// `assert_eq(left, right)`: fails unless both display the same.
pub fn assert_eq(args: &[Value]) -> Result<Value, RuntimeError> {
    let left = param(args, 0)?.to_string();
    let right = param(args, 1)?.to_string();

    if left == right {
        Ok(Value::Bool(true))
    } else {
        Err(RuntimeError::new(format!(
            "Assertion failed: {} != {}",
            left, right
        )))
    }
}

/// `clock()`: seconds since the Unix epoch.
pub fn clock(_args: &[Value]) -> Result<Value, RuntimeError> {
    let since_the_epoch_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .map_err(|_| RuntimeError::new("System clock is before the Unix epoch"))?;
    Ok(Value::Float(since_the_epoch_secs))
}
