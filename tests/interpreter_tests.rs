// Integration tests for the Wisp interpreter.
//
// Each test compiles and runs a complete program through `wisp::interpret`
// and checks its result status. A handful also capture stdout to check
// `print` output for the end-to-end scenarios.

use std::io::Read;
use std::process::{Command, Stdio};

use wisp::RunOutcome;

fn run(source: &str) -> RunOutcome {
    wisp::interpret(source, false, false)
}

fn assert_ok(source: &str) {
    match run(source) {
        RunOutcome::Ok => {}
        RunOutcome::CompileError(errs) => panic!("unexpected compile error(s): {errs:?}"),
        RunOutcome::RuntimeError(err) => panic!("unexpected runtime error: {err}"),
    }
}

fn assert_runtime_error_contains(source: &str, needle: &str) {
    match run(source) {
        RunOutcome::RuntimeError(err) => {
            assert!(err.message.contains(needle), "expected '{needle}' in '{}'", err.message);
        }
        other => panic!("expected a runtime error containing '{needle}', got a different outcome (ok: {})", matches!(other, RunOutcome::Ok)),
    }
}

fn assert_compile_error(source: &str) {
    match run(source) {
        RunOutcome::CompileError(_) => {}
        other => panic!("expected a compile error, got a different outcome (ok: {})", matches!(other, RunOutcome::Ok)),
    }
}

/// Runs `source` as a subprocess of the built `wisp` binary and returns its
/// captured stdout. Used for the spec's end-to-end scenarios, which are
/// specified in terms of what actually reaches stdout.
fn run_via_binary(source: &str) -> String {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("wisp_test_{}.wisp", std::process::id()));
    std::fs::write(&path, source).expect("write temp script");

    let exe = env!("CARGO_BIN_EXE_wisp");
    let mut child = Command::new(exe)
        .arg("run")
        .arg(&path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn wisp binary");
    let status = child.wait().expect("wait for wisp binary");
    let mut stdout = String::new();
    child.stdout.take().unwrap().read_to_string(&mut stdout).unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(status.success(), "script exited with {status}, stdout: {stdout}");
    stdout
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run_via_binary("print 1 + 2 * 3;"), "7\n");
}

#[test]
fn string_concatenation() {
    assert_eq!(run_via_binary(r#"var a = "hi"; var b = "!"; print a + b;"#), "hi!\n");
}

#[test]
fn closures_are_stateful_counters() {
    let source = r#"
        fun makeCounter() {
            var i = 0;
            fun c() { i = i + 1; return i; }
            return c;
        }
        var c = makeCounter();
        print c();
        print c();
        print c();
    "#;
    assert_eq!(run_via_binary(source), "1\n2\n3\n");
}

#[test]
fn super_calls_chain_to_the_parent_method() {
    let source = r#"
        class A { greet() { return "hi"; } }
        class B < A { greet() { return super.greet() + "!"; } }
        print B().greet();
    "#;
    assert_eq!(run_via_binary(source), "hi!\n");
}

#[test]
fn init_runs_on_construction() {
    let source = r#"
        class P { init(x) { this.x = x; } }
        var p = P(42);
        print p.x;
    "#;
    assert_eq!(run_via_binary(source), "42\n");
}

#[test]
fn continue_skips_to_the_next_loop_iteration() {
    let source = r#"
        for (var i = 0; i < 3; i = i + 1) {
            if (i == 1) continue;
            print i;
        }
    "#;
    assert_eq!(run_via_binary(source), "0\n2\n");
}

#[test]
fn adding_a_number_to_a_string_is_a_runtime_error() {
    assert_runtime_error_contains(r#"print 1 + "a";"#, "Operands must be two numbers or two strings.");
}

#[test]
fn calling_a_nil_value_is_a_runtime_error() {
    assert_runtime_error_contains("var x; x();", "Can only call functions and classes.");
}

#[test]
fn accessing_an_unknown_property_is_a_runtime_error() {
    assert_runtime_error_contains("class C{} print C().nope;", "Undefined property 'nope'.");
}

#[test]
fn divide_and_modulo_by_zero_are_runtime_errors() {
    assert_runtime_error_contains("print 1 / 0;", "Divide by zero.");
    assert_runtime_error_contains("print 1 % 0;", "Modulo by zero.");
}

#[test]
fn return_from_top_level_is_a_compile_error() {
    assert_compile_error("return 1;");
}

#[test]
fn self_inheriting_class_is_a_compile_error() {
    assert_compile_error("class A < A {}");
}

#[test]
fn continue_outside_a_loop_is_a_compile_error() {
    assert_compile_error("continue;");
}

#[test]
fn switch_statement_runs_the_matching_case() {
    let source = r#"
        var n = 2;
        switch (n) {
            case 1: print "one"; break;
            case 2: print "two"; break;
            default: print "other";
        }
    "#;
    assert_ok(source);
}

#[test]
fn modulus_shares_terms_precedence_with_add_and_subtract() {
    // `%` sits at Term precedence alongside `+`/`-` (not Factor with `*`/`/`),
    // so same-precedence operators chain left-associatively: (7 - 5) % 3 = 2,
    // not 7 - (5 % 3) = 5.
    assert_eq!(run_via_binary("print 7 - 5 % 3;"), "2\n");
}

#[test]
fn ternary_picks_the_matching_branch() {
    assert_eq!(run_via_binary("print true ? 1 : 2;"), "1\n");
    assert_eq!(run_via_binary("print false ? 1 : 2;"), "2\n");
}

#[test]
fn deeply_nested_calls_do_not_corrupt_state() {
    let source = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(15);
    "#;
    assert_eq!(run_via_binary(source), "610\n");
}
