use a64_compiler::compile_to_asm;
use std::collections::HashMap;

/// Compile a source string, asserting the pipeline reported no problems.
fn asm_for(source: &str) -> String {
    let compilation = compile_to_asm(source).expect("lexing should succeed");
    assert!(
        compilation.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        compilation.diagnostics
    );
    compilation.asm
}

/// Evaluate the emitted instruction subset and return the exit status the
/// program would hand to the OS. Any stack-discipline violation shows up as
/// a read from a slot that was never written or a fall off the end.
fn run_asm(asm: &str) -> u32 {
    let lines: Vec<String> = asm
        .lines()
        .map(|line| line.trim().replace('\t', " "))
        .collect();

    let mut labels: HashMap<&str, usize> = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        if let Some(name) = line.strip_suffix(':') {
            labels.insert(name, i);
        }
    }

    let (mut w0, mut w1) = (0u32, 0u32);
    let mut sp: i64 = 0;
    let mut mem: HashMap<i64, u32> = HashMap::new();
    let mut equal = false;
    let mut pc = 0usize;

    for _ in 0..100_000 {
        let line = match lines.get(pc) {
            Some(line) => line.as_str(),
            None => panic!("program fell off the end without exiting"),
        };
        pc += 1;
        if line.is_empty() || line.ends_with(':') || line.starts_with('.') {
            continue;
        }
        if line == "svc #0x80" {
            return w0;
        }
        if line == "mov x16, #1" {
            continue;
        }
        if line == "cmp w0, #0" {
            equal = w0 == 0;
            continue;
        }
        if let Some(target) = line.strip_prefix("b.eq ") {
            if equal {
                pc = *labels.get(target).expect("branch to unknown label");
            }
            continue;
        }
        if let Some(target) = line.strip_prefix("b ") {
            pc = *labels.get(target).expect("branch to unknown label");
            continue;
        }
        if line == "str w0, [sp, #-16]!" {
            sp -= 16;
            mem.insert(sp, w0);
            continue;
        }
        if line == "ldr w0, [sp], #16" {
            w0 = *mem.get(&sp).expect("pop from unwritten slot");
            sp += 16;
            continue;
        }
        if line == "ldr w1, [sp], #16" {
            w1 = *mem.get(&sp).expect("pop from unwritten slot");
            sp += 16;
            continue;
        }
        if let Some(imm) = line.strip_prefix("mov w0, #") {
            w0 = imm.parse().expect("bad immediate");
            continue;
        }
        if let Some(imm) = line.strip_prefix("add sp, sp, #") {
            sp += imm.parse::<i64>().expect("bad immediate");
            continue;
        }
        if let Some(rest) = line.strip_prefix("ldr w0, [sp, #") {
            let offset: i64 = rest.trim_end_matches(']').parse().expect("bad offset");
            w0 = *mem.get(&(sp + offset)).expect("load from unwritten slot");
            continue;
        }
        if let Some(rest) = line.strip_prefix("str w1, [sp, #") {
            let offset: i64 = rest.trim_end_matches(']').parse().expect("bad offset");
            mem.insert(sp + offset, w1);
            continue;
        }
        match line {
            "add w0, w0, w1" => w0 = w0.wrapping_add(w1),
            "sub w0, w0, w1" => w0 = w0.wrapping_sub(w1),
            "mul w0, w0, w1" => w0 = w0.wrapping_mul(w1),
            "udiv w0, w0, w1" => w0 = if w1 == 0 { 0 } else { w0 / w1 },
            other => panic!("unhandled instruction in test evaluator: {}", other),
        }
    }
    panic!("runaway program");
}

fn run_program(source: &str) -> u32 {
    run_asm(&asm_for(source))
}

// ── Fixed framing ────────────────────────────────────────────────────────

#[test]
fn prologue_is_fixed() {
    let asm = asm_for("exit(0);");
    let lines: Vec<&str> = asm.lines().collect();
    assert_eq!(lines[0], ".globl\t_main");
    assert_eq!(lines[1], ".p2align 2");
    assert_eq!(lines[2], "_main:");
}

#[test]
fn default_epilogue_closes_every_program() {
    let asm = asm_for("let x = 1;");
    let lines: Vec<&str> = asm.lines().collect();
    let tail = &lines[lines.len() - 3..];
    assert_eq!(tail, ["\tmov\tw0, #0", "\tmov\tx16, #1", "\tsvc\t#0x80"]);
}

#[test]
fn empty_program_exits_zero() {
    assert_eq!(run_program(""), 0);
}

// ── End-to-end exit codes ────────────────────────────────────────────────

#[test]
fn exit_zero() {
    assert_eq!(run_program("exit(0);"), 0);
}

#[test]
fn exit_constant() {
    assert_eq!(run_program("exit(42);"), 42);
}

#[test]
fn precedence_in_arithmetic() {
    assert_eq!(run_program("let x = 2; let y = 3; exit(x + y * 4);"), 14);
}

#[test]
fn inner_scope_shadows() {
    assert_eq!(run_program("let x = 10; { let x = 1; exit(x); }"), 1);
}

#[test]
fn if_takes_truthy_arm() {
    assert_eq!(
        run_program("let x = 5; if (x) { exit(1); } else { exit(2); }"),
        1
    );
}

#[test]
fn elif_chain_falls_through_to_else() {
    let source = "let x = 0; if (x) { exit(1); } elif (x) { exit(2); } else { exit(3); }";
    assert_eq!(run_program(source), 3);
}

#[test]
fn assignment_overwrites_slot() {
    assert_eq!(run_program("let x = 1; x = 7; exit(x);"), 7);
}

#[test]
fn division_is_unsigned_and_truncating() {
    assert_eq!(run_program("exit(20 / 3);"), 6);
}

#[test]
fn exit_is_terminal() {
    // The second exit is emitted but never reached.
    assert_eq!(run_program("exit(1); exit(2);"), 1);
}

#[test]
fn zero_is_the_only_falsy_value() {
    assert_eq!(
        run_program("let x = 3; if (x - 3) { exit(1); } exit(7);"),
        7
    );
}

#[test]
fn assignment_through_scope_boundary() {
    let source = "let y = 7; { let a = 1; y = a + y; } exit(y);";
    assert_eq!(run_program(source), 8);
}

#[test]
fn elif_arm_can_win() {
    let source = "let x = 2; if (x - 2) { exit(1); } elif (x) { exit(2); } else { exit(3); }";
    assert_eq!(run_program(source), 2);
}

// ── Codegen structural properties ────────────────────────────────────────

#[test]
fn scope_exit_unwinds_locals() {
    let asm = asm_for("{ let a = 1; let b = 2; } exit(0);");
    assert!(
        asm.contains("add\tsp, sp, #32"),
        "two 16-byte slots should be unwound at scope exit"
    );
}

#[test]
fn empty_scope_emits_no_unwind() {
    let asm = asm_for("{ } exit(0);");
    assert!(!asm.contains("add\tsp, sp,"));
}

#[test]
fn variable_loads_use_absolute_frame_offsets() {
    // With x then y on the stack, reading x two slots deep lands at #16 and
    // reading y at #0 once the stack is back at statement level.
    let asm = asm_for("let x = 2; let y = 3; exit(x);");
    assert!(asm.contains("ldr\tw0, [sp, #16]"));
    let asm = asm_for("let x = 2; let y = 3; exit(y);");
    assert!(asm.contains("ldr\tw0, [sp, #0]"));
}

#[test]
fn if_without_tail_emits_only_skip_label() {
    let asm = asm_for("let x = 1; if (x) { x = 2; } exit(x);");
    assert!(asm.contains(".L0_skip:"));
    assert!(!asm.contains("_end"));
}

#[test]
fn if_chain_labels_are_unique() {
    let source = "let x = 1;
        if (x) { x = 2; } elif (x) { x = 3; } else { x = 4; }
        if (x) { x = 5; } else { x = 6; }
        exit(x);";
    let asm = asm_for(source);
    let mut seen = Vec::new();
    for line in asm.lines() {
        if let Some(label) = line.strip_suffix(':') {
            if label.starts_with(".L") {
                assert!(!seen.contains(&label.to_string()), "duplicate label {label}");
                seen.push(label.to_string());
            }
        }
    }
    assert!(seen.len() >= 4);
}

#[test]
fn output_is_deterministic() {
    let source = std::fs::read_to_string("../samples/elif_chain.a64")
        .expect("failed to read samples/elif_chain.a64");
    assert_eq!(asm_for(&source), asm_for(&source));
}

// ── Sample program compilation ───────────────────────────────────────────
// Each sample under ../samples compiles cleanly and produces the exit
// status promised by its comments.

#[test]
fn sample_answer() {
    let source = std::fs::read_to_string("../samples/answer.a64")
        .expect("failed to read samples/answer.a64");
    assert_eq!(run_program(&source), 42);
}

#[test]
fn sample_arith() {
    let source = std::fs::read_to_string("../samples/arith.a64")
        .expect("failed to read samples/arith.a64");
    assert_eq!(run_program(&source), 14);
}

#[test]
fn sample_shadowing() {
    let source = std::fs::read_to_string("../samples/shadowing.a64")
        .expect("failed to read samples/shadowing.a64");
    assert_eq!(run_program(&source), 1);
}

#[test]
fn sample_elif_chain() {
    let source = std::fs::read_to_string("../samples/elif_chain.a64")
        .expect("failed to read samples/elif_chain.a64");
    assert_eq!(run_program(&source), 3);
}

#[test]
fn sample_scopes() {
    let source = std::fs::read_to_string("../samples/scopes.a64")
        .expect("failed to read samples/scopes.a64");
    assert_eq!(run_program(&source), 10);
}
