use mila_core::compile_source;
use mila_core::compiler::CompileOptions;
use mila_core::error::{CompileErrorKind, LangError};
use mila_core::ir::{BufferedRuntime, ExecError, ExecOptions, Instruction, Interpreter, Module};
use mila_core::span::Span;

fn compile(source: &str) -> Module {
    compile_source(source, CompileOptions::default()).expect("program should compile")
}

fn run(source: &str, input: &str) -> String {
    let module = compile(source);
    let mut runtime = BufferedRuntime::new(input);
    let status = Interpreter::new(&module)
        .run(&mut runtime)
        .expect("program should run");
    assert_eq!(status, 0);
    runtime.into_output()
}

fn compile_error(source: &str) -> mila_core::error::CompileError {
    match compile_source(source, CompileOptions::default()) {
        Err(LangError::Compile(err)) => err,
        other => panic!("expected a compile error, got {:?}", other),
    }
}

#[test]
fn precedence_is_visible_in_results() {
    assert_eq!(run("begin writeln(2 + 3 * 4) end.", ""), "14\n");
    assert_eq!(run("begin writeln(10 - 3 - 2) end.", ""), "5\n");
    assert_eq!(run("begin writeln((10 - 3) * -2) end.", ""), "-14\n");
}

#[test]
fn mixed_arithmetic_promotes_to_double() {
    assert_eq!(run("begin writeln(1 + 2.5) end.", ""), "3.500000\n");
    let module = compile("var d: double; begin d := 1 + 2.5 end.");
    let main = module.function("main").expect("entry function");
    let instructions: Vec<&Instruction> = main.blocks.iter().flat_map(|b| &b.instructions).collect();
    assert!(
        !instructions
            .iter()
            .any(|inst| matches!(inst, Instruction::Binary { op, .. } if !op.is_float())),
        "no integer arithmetic expected in {:?}",
        instructions
    );
}

#[test]
fn for_loops_visit_both_directions() {
    let source = "var i: integer; begin for i := 1 to 3 do writeln(i); for i := 3 downto 1 do writeln(i) end.";
    assert_eq!(run(source, ""), "1\n2\n3\n3\n2\n1\n");
}

#[test]
fn for_loop_finish_is_evaluated_once() {
    let source = "
var calls, i: integer;
function limit(): integer;
begin
    calls := calls + 1;
    limit := 3
end;
begin
    for i := 1 to limit() do write(i);
    writeln(calls)
end.";
    assert_eq!(run(source, ""), "1231\n");
}

#[test]
fn exit_leaves_the_function_early() {
    let source = "
function sign(x: integer): integer;
begin
    sign := 0;
    if x > 0 then begin sign := 1; exit end;
    if x < 0 then sign := -1
end;
begin
    writeln(sign(9)); writeln(sign(-9)); writeln(sign(0))
end.";
    assert_eq!(run(source, ""), "1\n-1\n0\n");
}

#[test]
fn readln_reports_its_status() {
    let source = "var x: integer; begin readln(x); writeln(x) end.";
    assert_eq!(run(source, "41"), "41\n");

    let module = compile(source);
    assert!(module.global_by_name("readln.status").is_some());
}

#[test]
fn locals_start_uninitialised() {
    let module = compile("procedure p; var y: integer; begin writeln(y) end; begin p() end.");
    let mut runtime = BufferedRuntime::default();
    let err = Interpreter::new(&module).run(&mut runtime).unwrap_err();
    assert!(matches!(err, ExecError::Uninitialised(ref f) if f == "p"), "{:?}", err);
}

#[test]
fn runaway_loops_hit_the_step_limit() {
    let module = compile("begin while 1 = 1 do begin end end.");
    let options = ExecOptions {
        step_limit: 1_000,
        ..ExecOptions::default()
    };
    let mut runtime = BufferedRuntime::default();
    let err = Interpreter::with_options(&module, options)
        .run(&mut runtime)
        .unwrap_err();
    assert_eq!(err, ExecError::StepLimitExceeded(1_000));
}

#[test]
fn unknown_identifier_points_at_the_name() {
    let err = compile_error("begin\n  writeln(1 + missing)\nend.");
    assert_eq!(err.kind, CompileErrorKind::UnknownIdentifier);
    assert_eq!(err.message, "Unknown identifier: 'missing'");
    assert_eq!(err.span, Some(Span::new(2, 15)));
}

#[test]
fn constants_cannot_be_assigned() {
    let err = compile_error("const n = 1; begin n := 2 end.");
    assert_eq!(err.kind, CompileErrorKind::ConstantAssignment);
    assert_eq!(err.message, "Cannot change constant 'n'");

    let err = compile_error("const n = 1; var x: integer; begin readln(n) end.");
    assert_eq!(err.kind, CompileErrorKind::ConstantAssignment);
}

#[test]
fn arity_errors_state_both_counts() {
    let err = compile_error("function f(a: integer): integer; begin f := a end; begin writeln(f(1, 2)) end.");
    assert_eq!(err.kind, CompileErrorKind::ArgumentCountMismatch);
    assert_eq!(err.message, "Wrong number of arguments for 'f': expected 1, got 2");
    assert!(err.span.is_some());
}

#[test]
fn reserved_names_cannot_be_redefined() {
    let err = compile_error("procedure writeln(x: integer); begin end; begin end.");
    assert_eq!(err.kind, CompileErrorKind::Redefinition);
    assert_eq!(err.message, "'writeln' is a reserved name");
}

#[test]
fn emitted_text_declares_the_runtime() {
    let text = compile("begin writeln(\"hi\"); writeln(1.5) end.").to_string();
    assert!(text.contains("declare void @writeln_str(ptr)"), "{}", text);
    assert!(text.contains("declare void @writeln_double(double)"), "{}", text);
    assert!(text.contains("define i64 @main()"), "{}", text);
}

#[test]
fn locals_and_parameters_shadow_globals() {
    let source = "
var x, y: integer;
procedure bump(x: integer);
begin
    x := x + 100;
    writeln(x)
end;
function twice(n: integer): integer;
var y: integer;
begin
    y := n * 2;
    twice := y
end;
begin
    x := 1;
    y := 7;
    bump(x);
    writeln(twice(5));
    writeln(x);
    writeln(y)
end.";
    assert_eq!(run(source, ""), "101\n10\n1\n7\n");
}

#[test]
fn exit_in_the_main_block_ends_the_program() {
    let source = "
var i: integer;
begin
    for i := 1 to 5 do begin
        if i = 3 then exit;
        writeln(i)
    end;
    writeln(99)
end.";
    assert_eq!(run(source, ""), "1\n2\n");
}

#[test]
fn long_sums_within_the_nesting_limit_still_compile() {
    let source = format!("var x: integer; begin x := 1{}; writeln(x) end.", " + 1".repeat(199));
    assert_eq!(run(&source, ""), "200\n");
}

#[test]
fn globals_cannot_take_runtime_symbol_names() {
    for name in ["main", "writeln_int", "readln"] {
        let err = compile_error(&format!("var {}: integer; begin end.", name));
        assert_eq!(err.kind, CompileErrorKind::Redefinition, "{}", name);
        assert_eq!(err.message, format!("'{}' is a reserved name", name));
    }
}
