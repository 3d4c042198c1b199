// File: src/errors.rs
//
// Compile-time and runtime error types (spec §7). Compile errors
// accumulate during a panic-mode/synchronize parse; a runtime error
// carries a frame-by-frame stack trace captured at the point of failure.

use colored::Colorize;
use std::fmt;

#[derive(Debug, Clone)]
pub struct CompileError {
    pub line: u32,
    pub at_end: bool,
    pub lexeme: String,
    pub message: String,
}

impl CompileError {
    pub fn new(line: u32, lexeme: impl Into<String>, at_end: bool, message: impl Into<String>) -> Self {
        CompileError { line, at_end, lexeme: lexeme.into(), message: message.into() }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("[line {}] Error", self.line).red().bold())?;
        if self.at_end {
            write!(f, " at end")?;
        } else if !self.lexeme.is_empty() {
            write!(f, " at '{}'", self.lexeme)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// One entry of a runtime error's stack trace, printed innermost call
/// first — the frame that was executing when the error was raised.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub line: u32,
    pub trace: Vec<StackFrame>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        RuntimeError { message: message.into(), line, trace: Vec::new() }
    }

    pub fn with_trace(mut self, trace: Vec<StackFrame>) -> Self {
        self.trace = trace;
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message.red().bold())?;
        // `trace` runs innermost call first, "script" last — the VM
        // builds it by walking its call-frame stack top to bottom.
        for (i, frame) in self.trace.iter().enumerate() {
            if i + 1 == self.trace.len() {
                write!(f, "[line {}] in {}", frame.line, frame.name)?;
            } else {
                writeln!(f, "[line {}] in {}", frame.line, frame.name)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}
