// File: src/lib.rs
//
// Library interface for the Wisp interpreter. Exposes the compiler and
// VM modules for integration testing and for `main.rs`'s CLI frontend.

pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod errors;
pub mod gc;
pub mod lexer;
pub mod natives;
pub mod repl;
pub mod table;
pub mod value;
pub mod vm;

use vm::{InterpretError, Vm};

/// The outcome of running a source string to completion, mapped onto
/// the process exit codes the CLI reports (spec §7): 0 success, 65
/// compile error, 70 runtime error.
pub enum RunOutcome {
    Ok,
    CompileError(Vec<errors::CompileError>),
    RuntimeError(errors::RuntimeError),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Ok => 0,
            RunOutcome::CompileError(_) => 65,
            RunOutcome::RuntimeError(_) => 70,
        }
    }
}

/// Compiles and runs `source` in a fresh VM. Used by `run` (one script,
/// one VM); the REPL instead keeps a `Vm` alive across calls to
/// `Vm::interpret` so declarations persist between lines.
pub fn interpret(source: &str, trace: bool, stress_gc: bool) -> RunOutcome {
    let mut vm = Vm::new(trace, stress_gc);
    match vm.interpret(source) {
        Ok(()) => RunOutcome::Ok,
        Err(InterpretError::Compile(errs)) => RunOutcome::CompileError(errs),
        Err(InterpretError::Runtime(err)) => RunOutcome::RuntimeError(err),
    }
}
