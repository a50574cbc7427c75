//! Test-only helpers: diagnostic formatting, a compile harness and a small
//! interpreter for the target machine, so generated programs can be executed
//! end to end.

use std::fmt::Display;

use crate::{
    codegen::code::{CodeBuffer, Instruction, Opcode, Reg},
    pipeline,
    token::Spanned,
};

/// Renders phase errors as `line:col: message`, the shape the tests assert
/// against.
pub fn format_errors<E: Display>(src: &str, errors: &[Spanned<E>]) -> Vec<String> {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.span.line_col(src), error.inner))
        .collect()
}

/// Compiles a source that is expected to be well-formed.
#[track_caller]
pub fn compile_ok(src: &str) -> CodeBuffer {
    match pipeline::compile(src) {
        Ok(buf) => buf,
        Err(diagnostics) => panic!("compilation failed: {diagnostics:#?}"),
    }
}

/// Compiles and runs a program, feeding `input` to `IN` instructions and
/// collecting everything `OUT` prints.
#[track_caller]
pub fn compile_and_run(src: &str, input: &[i32]) -> Vec<i32> {
    Machine::new(&compile_ok(src)).run(input)
}

const STACK_SIZE: usize = 1024;
const STEP_LIMIT: usize = 1_000_000;

/// An interpreter for the target machine, faithful to its quirks: `ST`
/// through `Tp` pushes (post-decrement), `LD` through `Tp` pops
/// (pre-increment), `ST` through `Fp` appends to the frame, and `RET` pops
/// `Fp` then `Pc`.
pub struct Machine {
    code: Vec<Instruction>,
    stack: Vec<i32>,
    reg: [i32; 6],
}

impl Machine {
    pub fn new(buf: &CodeBuffer) -> Machine {
        let mut reg = [0; 6];
        // Location 0 holds the safety halt; execution starts right after.
        reg[Reg::Pc.number() as usize] = 1;
        reg[Reg::Tp.number() as usize] = STACK_SIZE as i32 - 1;
        Machine {
            code: buf.instructions().to_vec(),
            stack: vec![0; STACK_SIZE],
            reg,
        }
    }

    pub fn run(mut self, input: &[i32]) -> Vec<i32> {
        let mut input = input.iter().copied();
        let mut output = Vec::new();

        for _ in 0..STEP_LIMIT {
            let pc = self.get(Reg::Pc) as usize;
            let Some(&instruction) = self.code.get(pc) else {
                panic!("program counter out of range: {pc}");
            };
            self.set(Reg::Pc, pc as i32 + 1);

            match instruction {
                Instruction::Ro { op, r, s, t } => match op {
                    Opcode::Halt => return output,
                    Opcode::Ret => {
                        let fp = self.pop();
                        let pc = self.pop();
                        self.set(Reg::Fp, fp);
                        self.set(Reg::Pc, pc);
                    }
                    Opcode::In => {
                        let value = input.next().unwrap_or_else(|| panic!("input exhausted"));
                        self.set(r, value);
                    }
                    Opcode::Out => output.push(self.get(r)),
                    Opcode::Add => self.set(r, self.get(s) + self.get(t)),
                    Opcode::Sub => self.set(r, self.get(s) - self.get(t)),
                    Opcode::Mul => self.set(r, self.get(s) * self.get(t)),
                    Opcode::Div => {
                        assert!(self.get(t) != 0, "division by zero");
                        self.set(r, self.get(s) / self.get(t));
                    }
                    _ => panic!("register-memory opcode in register-only form"),
                },
                Instruction::Rm { op, r, d, s } => {
                    let address = d + self.get(s);
                    match op {
                        Opcode::Ld => {
                            let address = if s == Reg::Tp {
                                self.set(Reg::Tp, self.get(Reg::Tp) + 1);
                                d + self.get(Reg::Tp)
                            } else {
                                address
                            };
                            let value = self.load(address);
                            self.set(r, value);
                        }
                        Opcode::St => {
                            self.store(address, self.get(r));
                            if s == Reg::Fp {
                                self.set(Reg::Fp, self.get(Reg::Fp) + 1);
                            } else if s == Reg::Tp {
                                self.set(Reg::Tp, self.get(Reg::Tp) - 1);
                            }
                        }
                        Opcode::Ls => {
                            for _ in 0..d {
                                self.set(Reg::Tp, self.get(Reg::Tp) + 1);
                                let value = self.load(self.get(Reg::Tp));
                                self.store(self.get(Reg::Fp), value);
                                self.set(Reg::Fp, self.get(Reg::Fp) + 1);
                            }
                        }
                        Opcode::Lda => self.set(r, address),
                        Opcode::Ldc => self.set(r, d),
                        Opcode::Jlt => self.jump_if(self.get(r) < 0, address),
                        Opcode::Jle => self.jump_if(self.get(r) <= 0, address),
                        Opcode::Jgt => self.jump_if(self.get(r) > 0, address),
                        Opcode::Jge => self.jump_if(self.get(r) >= 0, address),
                        Opcode::Jeq => self.jump_if(self.get(r) == 0, address),
                        Opcode::Jne => self.jump_if(self.get(r) != 0, address),
                        _ => panic!("register-only opcode in register-memory form"),
                    }
                }
            }
        }
        panic!("step limit exceeded; runaway program?");
    }

    fn jump_if(&mut self, condition: bool, target: i32) {
        if condition {
            self.set(Reg::Pc, target);
        }
    }

    fn pop(&mut self) -> i32 {
        self.set(Reg::Tp, self.get(Reg::Tp) + 1);
        self.load(self.get(Reg::Tp))
    }

    fn get(&self, r: Reg) -> i32 {
        self.reg[r.number() as usize]
    }

    fn set(&mut self, r: Reg, value: i32) {
        self.reg[r.number() as usize] = value;
    }

    fn load(&self, address: i32) -> i32 {
        let address = usize::try_from(address).unwrap_or_else(|_| panic!("load below stack"));
        self.stack[address]
    }

    fn store(&mut self, address: i32, value: i32) {
        let address = usize::try_from(address).unwrap_or_else(|_| panic!("store below stack"));
        self.stack[address] = value;
    }
}
