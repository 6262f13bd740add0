use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use dolls::{Config, Interpreter};
use dolls_runtime::RuntimeConfig;
use dolls_source::{EvalError, Source};
use dolls_value::Value;

/// dolls is a small dynamic scripting language.
/// Without a file or an expression, starts an interactive prompt.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Script to run.
    file: Option<PathBuf>,

    /// Run this source text instead of a file.
    #[arg(short, long, value_name = "EXPR")]
    eval: Option<String>,

    /// Cancel a run after this many milliseconds.
    #[arg(long, value_name = "N")]
    timeout_ms: Option<u64>,

    /// Print the syntax tree of every program before running it.
    #[arg(long)]
    dump_ast: bool,

    /// Bytes of output kept per run.
    #[arg(long, value_name = "N", default_value_t = Config::DEFAULT_OUTPUT_LIMIT)]
    output_limit: usize,

    /// Maximum depth of nested function calls.
    #[arg(long, value_name = "N", default_value_t = RuntimeConfig::DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

/// Exit status of a run that failed.
const EXIT_ERROR: i32 = 1;
/// Exit status of a run that was cancelled (timed out).
const EXIT_CANCELLED: i32 = 2;

fn main() {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{} {:#}", style("error:").red().bold(), err);
            process::exit(EXIT_ERROR);
        }
    }
}

fn run(args: Args) -> Result<i32> {
    let config = Config {
        output_limit: args.output_limit,
        max_call_depth: args.max_call_depth,
        timeout: args.timeout_ms.map(Duration::from_millis),
        seed: None,
    };
    let mut interpreter = Interpreter::with_config(config);

    let source = match (&args.eval, &args.file) {
        (Some(source), _) => source.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?,
        (None, None) => {
            repl(&mut interpreter, args.dump_ast)?;
            return Ok(0);
        }
    };

    match run_source(&mut interpreter, &source, args.dump_ast) {
        Ok(_) => Ok(0),
        Err(err) if err.is_cancelled() => Ok(EXIT_CANCELLED),
        Err(_) => Ok(EXIT_ERROR),
    }
}

/// Runs `source`, printing its output and reporting any error on stderr.
fn run_source(interpreter: &mut Interpreter, source: &str, dump_ast: bool) -> Result<Value, EvalError> {
    let program = interpreter.parse(source).map_err(|err| {
        report(source, &err);
        err
    })?;
    if dump_ast {
        eprint!("{}", style(program.print(0)).dim());
    }

    match interpreter.execute(&program) {
        Ok(outcome) => {
            print!("{}", outcome.output);
            if interpreter.output_truncated() {
                eprintln!("{}", style("(output truncated)").yellow());
            }
            Ok(outcome.value)
        }
        Err(err) => {
            print!("{}", interpreter.take_output());
            report(source, &err);
            Err(err)
        }
    }
}

fn report(source: &str, err: &EvalError) {
    let headline = if err.is_cancelled() {
        style(err.to_string()).yellow().bold()
    } else {
        style(err.to_string()).red().bold()
    };
    eprintln!("{}", headline);

    let excerpt = err
        .position()
        .and_then(|position| Source::new(source).excerpt(position));
    if let Some(excerpt) = excerpt {
        eprintln!("{}", style(excerpt).dim());
    }
}

/// Reads lines until EOF or `:quit`. Globals carry over from one line to the next.
fn repl(interpreter: &mut Interpreter, mut dump_ast: bool) -> Result<()> {
    let mut stdout = io::stdout();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        stdout.flush()?;

        let input = match lines.next() {
            Some(line) => line?,
            None => break,
        };

        match input.trim() {
            "" => continue,
            ":quit" => break,
            ":ast" => {
                dump_ast = !dump_ast;
                eprintln!("AST dump {}", if dump_ast { "on" } else { "off" });
                continue;
            }
            _ => {}
        }

        if let Ok(value) = run_source(interpreter, &input, dump_ast) {
            if !value.is_nil() {
                println!("{}", style(value).cyan());
            }
        }
        stdout.flush()?;
    }

    Ok(())
}
