use crate::ast::{BinOp, Expr, IfTail, Program, Scope, Stmt};
use std::collections::HashMap;

/// Every value occupies one 16-byte stack slot, keeping SP aligned as the
/// AArch64 ABI requires.
const SLOT_SIZE: usize = 16;

/// Compile a program to Apple-flavored AArch64 assembly text.
pub fn generate(program: &Program) -> String {
    let mut gen = Codegen::new();
    gen.emit_program(program);
    gen.out
}

struct Codegen {
    out: String,
    /// One frame per open lexical scope, mapping a variable to the value of
    /// `stack_size` just before its slot was pushed.
    frames: Vec<HashMap<String, usize>>,
    /// Bytes pushed since `_main` entry. Must equal the runtime SP
    /// displacement at every point between two statement-level emissions.
    stack_size: usize,
    label_counter: usize,
}

impl Codegen {
    fn new() -> Self {
        Self {
            out: String::new(),
            frames: vec![HashMap::new()],
            stack_size: 0,
            label_counter: 0,
        }
    }

    fn emit_program(&mut self, program: &Program) {
        self.out.push_str(".globl\t_main\n.p2align 2\n_main:\n");
        for stmt in &program.statements {
            self.emit_stmt(stmt);
        }
        // Fallback for control flow that reaches the end without an exit.
        self.emit("mov\tw0, #0");
        self.emit_exit_syscall();
    }

    // ── Statements ───────────────────────────────────────────────────────

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { name, value } => {
                self.emit_expr(value);
                // The slot the initializer pushed is the variable's storage.
                let recorded = self.stack_size - SLOT_SIZE;
                if let Some(frame) = self.frames.last_mut() {
                    frame.insert(name.clone(), recorded);
                }
            }
            Stmt::Assign { name, value } => {
                self.emit_expr(value);
                self.pop("w1");
                let offset = self.variable_offset(name);
                self.emit(&format!("str\tw1, [sp, #{}]", offset));
            }
            Stmt::Exit { value } => {
                self.emit_expr(value);
                self.pop("w0");
                self.emit_exit_syscall();
            }
            Stmt::If {
                condition,
                then_block,
                tail,
            } => self.emit_if(condition, then_block, tail.as_deref()),
            Stmt::Block(scope) => self.emit_scope(scope),
        }
    }

    fn emit_scope(&mut self, scope: &Scope) {
        self.frames.push(HashMap::new());
        let entry = self.stack_size;
        for stmt in &scope.statements {
            self.emit_stmt(stmt);
        }
        // Unwind the scope's slots so the locals die with it.
        let local = self.stack_size - entry;
        if local > 0 {
            self.emit(&format!("add\tsp, sp, #{}", local));
        }
        self.stack_size = entry;
        self.frames.pop();
    }

    fn emit_if(&mut self, condition: &Expr, then_block: &Scope, tail: Option<&IfTail>) {
        let label = self.next_label();
        self.emit_expr(condition);
        self.pop("w0");
        self.emit("cmp\tw0, #0");
        self.emit(&format!("b.eq\t.L{}_skip", label));
        self.emit_scope(then_block);
        match tail {
            None => self.emit_label(&format!(".L{}_skip", label)),
            Some(tail) => {
                // Every truthy arm of the chain converges on this label.
                let end = format!(".L{}_end", label);
                self.emit(&format!("b\t{}", end));
                self.emit_label(&format!(".L{}_skip", label));
                self.emit_if_tail(tail, &end);
                self.emit_label(&end);
            }
        }
    }

    fn emit_if_tail(&mut self, tail: &IfTail, end: &str) {
        match tail {
            IfTail::Elif {
                condition,
                block,
                next,
            } => {
                let label = self.next_label();
                self.emit_expr(condition);
                self.pop("w0");
                self.emit("cmp\tw0, #0");
                self.emit(&format!("b.eq\t.L{}_skip", label));
                self.emit_scope(block);
                self.emit(&format!("b\t{}", end));
                self.emit_label(&format!(".L{}_skip", label));
                if let Some(next) = next {
                    self.emit_if_tail(next, end);
                }
            }
            IfTail::Else { block } => self.emit_scope(block),
        }
    }

    // ── Expressions ──────────────────────────────────────────────────────

    /// Postcondition: the expression's 32-bit value sits in a fresh slot on
    /// top of the stack and `stack_size` has grown by one slot.
    fn emit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::IntLit(digits) => {
                self.emit(&format!("mov\tw0, #{}", digits));
                self.push_result();
            }
            Expr::Ident(name) => {
                let offset = self.variable_offset(name);
                self.emit(&format!("ldr\tw0, [sp, #{}]", offset));
                self.push_result();
            }
            Expr::Binary { op, left, right } => {
                self.emit_expr(left);
                self.emit_expr(right);
                self.pop("w1");
                self.pop("w0");
                let instr = match op {
                    BinOp::Add => "add",
                    BinOp::Sub => "sub",
                    BinOp::Mul => "mul",
                    BinOp::Div => "udiv",
                };
                self.emit(&format!("{}\tw0, w0, w1", instr));
                self.push_result();
            }
        }
    }

    /// Offset of `name`'s slot from the current SP. Both `stack_size` and
    /// the recorded value count bytes from `_main` entry, so the difference
    /// holds no matter how many unrelated pushes happened in between.
    fn variable_offset(&self, name: &str) -> usize {
        let recorded = self
            .frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .unwrap_or_else(|| panic!("variable '{}' reached the generator undeclared", name));
        self.stack_size - recorded - SLOT_SIZE
    }

    // ── Emission helpers ─────────────────────────────────────────────────

    fn push_result(&mut self) {
        self.emit("str\tw0, [sp, #-16]!");
        self.stack_size += SLOT_SIZE;
    }

    fn pop(&mut self, reg: &str) {
        self.emit(&format!("ldr\t{}, [sp], #16", reg));
        self.stack_size -= SLOT_SIZE;
    }

    fn emit_exit_syscall(&mut self) {
        self.emit("mov\tx16, #1");
        self.emit("svc\t#0x80");
    }

    fn emit(&mut self, instr: &str) {
        self.out.push('\t');
        self.out.push_str(instr);
        self.out.push('\n');
    }

    fn emit_label(&mut self, label: &str) {
        self.out.push_str(label);
        self.out.push_str(":\n");
    }

    fn next_label(&mut self) -> usize {
        let label = self.label_counter;
        self.label_counter += 1;
        label
    }
}
