//! End-to-end tests: compile a source program, load it at address 0
//! and execute it until the machine halts.
use cmin::prelude::*;

const STEP_BUDGET: usize = 100_000;

fn run(source: &str) -> (Processor, Halt) {
    let words = compile_str("test.c", source).expect("compilation failed");
    let mut cpu = Processor::new(Memory::with_image(&words));
    let halt = cpu
        .run(STEP_BUDGET)
        .cloned()
        .expect("step budget exhausted without a halt");
    (cpu, halt)
}

fn exit_status(source: &str) -> Word {
    match run(source).1 {
        Halt::Exit(status) => status,
        other => panic!("program did not exit cleanly: {:?}", other),
    }
}

#[test]
fn test_return_literal() {
    assert_eq!(exit_status("int main(void) { return 7; }"), 7);
}

#[test]
fn test_discarded_expression_statement() {
    // The literal passes through GR1 and is overwritten by the return.
    assert_eq!(exit_status("int main(void) { 42; return 0; }"), 0);
}

#[test]
fn test_store_load_round_trip() {
    // A global keeps the stored value across the read.
    assert_eq!(
        exit_status("int x; int main(void) { x = 5; return x; }"),
        5
    );
}

#[test]
fn test_arithmetic() {
    assert_eq!(exit_status("int main(void) { return 2 + 3; }"), 5);
    assert_eq!(exit_status("int main(void) { return 1 + 2 + 3 + 4; }"), 10);
    // Two's complement wrap-around.
    assert_eq!(exit_status("int main(void) { return 2 - 5; }"), 0xFFFD);
}

#[test]
fn test_unary_operators() {
    assert_eq!(exit_status("int main(void) { return -3; }"), 0xFFFD);
    assert_eq!(exit_status("int main(void) { return +3; }"), 3);
    assert_eq!(exit_status("int main(void) { return -(1 + 2); }"), 0xFFFD);
}

#[test]
fn test_bitwise_operators() {
    assert_eq!(exit_status("int main(void) { return 12 & 10; }"), 8);
    assert_eq!(exit_status("int main(void) { return 12 | 10; }"), 14);
    assert_eq!(exit_status("int main(void) { return 12 ^ 10; }"), 6);
    // `&' and `^' bind tighter than `|'.
    assert_eq!(exit_status("int main(void) { return 12 & 10 | 1; }"), 9);
}

#[test]
fn test_if_else_branches() {
    let source = "int main(void) { int x; x = 1; if (x) return 10; else return 20; }";
    assert_eq!(exit_status(source), 10);

    let source = "int main(void) { int x; x = 0; if (x) return 10; else return 20; }";
    assert_eq!(exit_status(source), 20);
}

#[test]
fn test_if_without_else_falls_through() {
    let source = "int main(void) { int x; x = 0; if (x) return 10; return 20; }";
    assert_eq!(exit_status(source), 20);
}

#[test]
fn test_while_loop() {
    let source = "
        int main(void) {
            int i;
            int acc;
            i = 5;
            acc = 0;
            while (i) {
                acc = acc + i;
                i = i - 1;
            }
            return acc;
        }
    ";
    assert_eq!(exit_status(source), 15);
}

#[test]
fn test_while_loop_never_entered() {
    let source = "int main(void) { int i; i = 0; while (i) i = i - 1; return 9; }";
    assert_eq!(exit_status(source), 9);
}

#[test]
fn test_pointer_store_through() {
    let source = "
        int x;
        int main(void) {
            int *p;
            p = &x;
            *p = 9;
            return x;
        }
    ";
    assert_eq!(exit_status(source), 9);
}

#[test]
fn test_pointer_read_through() {
    let source = "
        int x;
        int main(void) {
            int *p;
            x = 31;
            p = &x;
            return *p;
        }
    ";
    assert_eq!(exit_status(source), 31);
}

#[test]
fn test_local_pointer_to_local() {
    let source = "
        int main(void) {
            int v;
            int *p;
            p = &v;
            *p = 6;
            return v;
        }
    ";
    assert_eq!(exit_status(source), 6);
}

#[test]
fn test_function_call_with_arguments() {
    let source = "
        int sub(int a, int b) { return a - b; }
        int main(void) { return sub(8, 5); }
    ";
    assert_eq!(exit_status(source), 3);
}

#[test]
fn test_forward_call_writes_global() {
    // `main' calls a function defined later in the file; the call
    // site's placeholder address must be patched to the real entry.
    let source = "
        int w;
        int f(int a, int b);
        int main(void) { f(5, 8); return w; }
        int f(int a, int b) { w = a - b; return w; }
    ";
    let program = Parser::new("test.c", source).parse().unwrap();
    let words = Compiler::new().compile(&program).unwrap();

    let w = program.scope.find("w").unwrap();
    let address = w.storage().unwrap().address;

    let mut cpu = Processor::new(Memory::with_image(&words));
    let halt = cpu.run(STEP_BUDGET).cloned().unwrap();

    assert_eq!(halt, Halt::Exit(0xFFFD));
    assert_eq!(cpu.memory().read(address as usize), 0xFFFD);
    assert_eq!(cpu.register(Register::Gr1), 0xFFFD);
}

#[test]
fn test_recursive_sum() {
    let source = "
        int sum(int n) {
            if (n) return n + sum(n - 1);
            return 0;
        }
        int main(void) { return sum(5); }
    ";
    assert_eq!(exit_status(source), 15);
}

#[test]
fn test_nested_call_arguments_do_not_clobber() {
    // The second argument is itself a call; the first argument's slot
    // must survive it.
    let source = "
        int id(int n) { return n; }
        int sub(int a, int b) { return a - b; }
        int main(void) { return sub(9, id(4)); }
    ";
    assert_eq!(exit_status(source), 5);
}

#[test]
fn test_call_through_function_pointer() {
    let source = "
        int add1(int n) { return n + 1; }
        int main(void) {
            int (*pf)(int);
            pf = &add1;
            return (*pf)(41);
        }
    ";
    assert_eq!(exit_status(source), 42);
}

#[test]
fn test_chained_assignment() {
    let source = "
        int x;
        int y;
        int main(void) { x = y = 4; return x + y; }
    ";
    assert_eq!(exit_status(source), 8);
}

#[test]
fn test_comma_expression() {
    let source = "int x; int main(void) { return x = 1, x + 1; }";
    assert_eq!(exit_status(source), 2);
}

#[test]
fn test_globals_are_zero_initialized() {
    assert_eq!(exit_status("int g; int main(void) { return g; }"), 0);
}

#[test]
fn test_sibling_blocks() {
    let source = "
        int main(void) {
            int r;
            r = 0;
            { int a; a = 1; r = r + a; }
            { int b; b = 2; r = r + b; }
            return r;
        }
    ";
    assert_eq!(exit_status(source), 3);
}

#[test]
fn test_shadowed_global() {
    let source = "
        int x;
        int main(void) {
            int x;
            x = 3;
            return x;
        }
    ";
    assert_eq!(exit_status(source), 3);
}

#[test]
fn test_semantic_error_reported_before_any_code_runs() {
    // A call with the wrong arity never reaches code generation.
    let source = "int f(int a); int main(void) { return f(1, 2); }";
    let err = compile_str("test.c", source).unwrap_err();
    assert!(matches!(err, CminError::Semantic { .. }));
    assert!(err.to_string().contains("wrong number of arguments"));
}

#[test]
fn test_diagnostic_carries_file_and_line() {
    let source = "int x;\nint x;";
    let err = compile_str("prog.c", source).unwrap_err();
    assert_eq!(err.to_string(), "prog.c(2): `x' is already declared in this scope.");
}

#[test]
fn test_deep_expression_spills_through_stack() {
    // Every binary node pushes its right operand; a deeply nested
    // expression exercises the machine stack.
    let source = "int main(void) { return ((((1 + 2) + 3) + 4) + (5 + (6 + (7 + 8)))); }";
    assert_eq!(exit_status(source), 36);
}
