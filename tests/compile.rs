//! End-to-end checks driving the full preprocess/lex/parse/check/codegen
//! pipeline over real source text, rather than one stage in isolation.

use ikac::codegen::TargetOs;
use ikac::types::source::SourceState;

fn compile(src_text: &str) -> Result<String, String> {
    let mut src = SourceState::new();
    ikac::compile_str(&mut src, "test.ika", src_text, "main", TargetOs::Linux)
        .map(|out| out.assembly)
        .map_err(|e| e.to_string())
}

#[test]
fn compiles_a_function_with_arithmetic_and_a_call() {
    let asm = compile(
        r#"
        fn add(i32 a, i32 b) i32 {
            return a + b;
        }
        fn main() i32 {
            return add(2, 3);
        }
        "#,
    )
    .unwrap();
    assert!(asm.contains("add:"));
    assert!(asm.contains("main:"));
    assert!(asm.contains("call add"));
    assert!(asm.contains("addl %ecx, %eax"));
}

#[test]
fn struct_valued_globals_and_composite_returns_round_trip() {
    let asm = compile(
        r#"
        type Point { i32 x; i32 y; }
        Point origin;
        fn make(i32 x, i32 y) Point {
            Point p;
            p.x = x;
            p.y = y;
            return p;
        }
        fn main() i32 {
            origin = make(1, 2);
            return 0;
        }
        "#,
    )
    .unwrap();
    assert!(asm.contains("origin:"));
    assert!(asm.contains("make:"));
}

#[test]
fn loops_and_print_lower_without_error() {
    let asm = compile(
        r#"
        fn main() i32 {
            i32 i;
            i = 0;
            while (i < 10) {
                print("%d\n", i);
                i = i + 1;
            }
            return 0;
        }
        "#,
    )
    .unwrap();
    assert!(asm.contains("call printf"));
    assert!(asm.contains(".LC0"));
}

#[test]
fn undeclared_identifier_is_reported_with_a_position() {
    let err = compile("fn main() i32 { return missing_var; }").unwrap_err();
    assert!(err.contains("undeclared identifier 'missing_var'"), "{err}");
    assert!(err.contains("test.ika:1:"), "{err}");
}

#[test]
fn break_outside_a_loop_is_rejected() {
    let err = compile(
        r#"
        fn main() i32 {
            break;
            return 0;
        }
        "#,
    )
    .unwrap_err();
    assert!(err.contains("break statement not within a loop"), "{err}");
}

#[test]
fn cli_binary_writes_assembly_to_an_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("prog.ika");
    std::fs::write(&src_path, "fn main() i32 { return 0; }").unwrap();
    let out_path = dir.path().join("prog.s");

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_ikac"))
        .arg(&src_path)
        .arg("-o")
        .arg(&out_path)
        .status()
        .expect("spawn ikac");
    assert!(status.success());

    let generated = std::fs::read_to_string(&out_path).unwrap();
    assert!(generated.contains("main:"));
}
