// File: src/repl.rs
//
// Interactive REPL (spec §10). Each line is compiled and run against a
// single long-lived `Vm`, so `var`/`fun`/`class` declarations from one
// line are visible on the next — unlike `run`, which starts fresh.

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::vm::{InterpretError, Vm};

pub struct Repl {
    vm: Vm,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new(trace: bool, stress_gc: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let editor = DefaultEditor::new()?;
        Ok(Repl { vm: Vm::new(trace, stress_gc), editor })
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", "Wisp REPL — Ctrl+D to exit".bright_cyan());

        loop {
            match self.editor.readline("wisp> ") {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.eval_line(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    println!("{}", "\nGoodbye!".bright_cyan());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {err}", "Error:".bright_red());
                    break;
                }
            }
        }

        Ok(())
    }

    fn eval_line(&mut self, line: &str) {
        match self.vm.interpret(line) {
            Ok(()) => {}
            Err(InterpretError::Compile(errors)) => {
                for err in &errors {
                    eprintln!("{err}");
                }
            }
            Err(InterpretError::Runtime(err)) => {
                eprintln!("{err}");
            }
        }
    }
}
