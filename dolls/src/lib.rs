//! Embeddable interpreter for the dolls scripting language.
//!
//! ```
//! use dolls::Interpreter;
//!
//! let mut interpreter = Interpreter::new();
//! let outcome = interpreter.run("f = |x| { x * x } print(f(4))").unwrap();
//! assert_eq!(outcome.output, "16\n");
//! ```

pub mod builtin_functions;
mod output;
mod watchdog;

use std::time::Duration;

use dolls_parser::ast::Program;
use dolls_runtime::{CancelToken, Runtime, RuntimeConfig};
use dolls_source::EvalError;
use dolls_value::Value;
use log::debug;

pub use output::Output;
use watchdog::Watchdog;

/// Interpreter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bytes of `print` output kept per run.
    pub output_limit: usize,
    pub max_call_depth: usize,
    /// Cancel a run that takes longer than this.
    pub timeout: Option<Duration>,
    /// Seed for `rand`. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Config {
    pub const DEFAULT_OUTPUT_LIMIT: usize = 64 * 1024;
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_limit: Self::DEFAULT_OUTPUT_LIMIT,
            max_call_depth: RuntimeConfig::DEFAULT_MAX_CALL_DEPTH,
            timeout: None,
            seed: None,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Value of the last top level statement.
    pub value: Value,
    /// Everything printed during the run.
    pub output: String,
}

/// A [`Runtime`] loaded with the standard library.
/// Globals survive between runs.
pub struct Interpreter {
    runtime: Runtime,
    output: Output,
    config: Config,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let mut runtime = Runtime::with_config(RuntimeConfig {
            max_call_depth: config.max_call_depth,
            ..RuntimeConfig::default()
        });
        let output = Output::new(config.output_limit);
        builtin_functions::register_all(&mut runtime, &output, config.seed);
        Self {
            runtime,
            output,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gives access to the runtime, e.g. to register more native functions.
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.runtime.cancel_token()
    }

    /// Lexes and parses `source` without running it.
    pub fn parse(&self, source: &str) -> Result<Program, EvalError> {
        dolls_parser::parse_source(source)
    }

    /// Parses and runs `source`.
    pub fn run(&mut self, source: &str) -> Result<Outcome, EvalError> {
        let program = self.parse(source)?;
        self.execute(&program)
    }

    /// Runs an already parsed program.
    ///
    /// On failure the output printed before the error stays available
    /// through [`Interpreter::take_output`].
    pub fn execute(&mut self, program: &Program) -> Result<Outcome, EvalError> {
        self.output.clear();

        let watchdog = self
            .config
            .timeout
            .map(|timeout| Watchdog::arm(self.runtime.timeout_token(), timeout));

        let result = self.runtime.execute(program);

        if let Some(watchdog) = watchdog {
            if watchdog.disarm() {
                // a timeout is not a standing request; the next run starts clean
                debug!("run timed out");
                self.runtime.timeout_token().reset();
            }
        }

        let value = result?;
        Ok(Outcome {
            value,
            output: self.output.take(),
        })
    }

    /// Output of the last run that has not been collected yet.
    pub fn take_output(&mut self) -> String {
        self.output.take()
    }

    /// `true` if the last run printed more than [`Config::output_limit`] bytes.
    pub fn output_truncated(&self) -> bool {
        self.output.is_truncated()
    }
}
