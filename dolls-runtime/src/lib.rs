//! Tree-walking evaluator for dolls programs.

pub mod cancel;
pub mod config;
mod ops;
pub mod runtime;

pub use cancel::CancelToken;
pub use config::RuntimeConfig;
pub use runtime::Runtime;
