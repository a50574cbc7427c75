use std::fmt;

/// The six machine registers.
///
/// `Ax`/`Bx` are scratch accumulators. `Pc` is the program counter, exposed
/// as a plain register so jumps are ordinary loads. `Bp` addresses the global
/// region, `Fp` the current frame, and `Tp` the temporary stack growing down
/// from the top of data memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {
    Ax,
    Bx,
    Pc,
    Bp,
    Fp,
    Tp,
}

impl Reg {
    pub fn number(self) -> i32 {
        match self {
            Reg::Ax => 0,
            Reg::Bx => 1,
            Reg::Pc => 2,
            Reg::Bp => 3,
            Reg::Fp => 4,
            Reg::Tp => 5,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    // Register-only.
    Halt,
    /// Pops `Fp`, then `Pc`, from the temporary stack.
    Ret,
    In,
    Out,
    Add,
    Sub,
    Mul,
    Div,

    // Register-memory.
    Ld,
    St,
    /// Bulk move: pops `d` cells from the temporary stack and appends them to
    /// the frame, advancing `Fp`.
    Ls,
    Lda,
    Ldc,
    Jlt,
    Jle,
    Jgt,
    Jge,
    Jeq,
    Jne,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Halt => "HALT",
            Ret => "RET",
            In => "IN",
            Out => "OUT",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Ld => "LD",
            St => "ST",
            Ls => "LS",
            Lda => "LDA",
            Ldc => "LDC",
            Jlt => "JLT",
            Jle => "JLE",
            Jgt => "JGT",
            Jge => "JGE",
            Jeq => "JEQ",
            Jne => "JNE",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Serialized as `OP r,s,t`.
    Ro { op: Opcode, r: Reg, s: Reg, t: Reg },
    /// Serialized as `OP r,d(s)`; the effective address is `d + reg[s]`.
    Rm { op: Opcode, r: Reg, d: i32, s: Reg },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Ro { op, r, s, t } => write!(
                f,
                "{:<5}  {},{},{}",
                op.mnemonic(),
                r.number(),
                s.number(),
                t.number()
            ),
            Instruction::Rm { op, r, d, s } => write!(
                f,
                "{:<5}  {},{}({})",
                op.mnemonic(),
                r.number(),
                d,
                s.number()
            ),
        }
    }
}

/// An instruction buffer with single-pass backpatching.
///
/// The generator emits forward jumps by [`skip`](CodeBuffer::skip)ping their
/// slots, then later [`backup`](CodeBuffer::backup)s to the reserved
/// location, emits the now-computable instruction, and
/// [`restore`](CodeBuffer::restore)s to the high-water mark. Skipped slots
/// that are never patched serialize as `HALT`.
#[derive(Default)]
pub struct CodeBuffer {
    code: Vec<Instruction>,
    current: usize,
    high: usize,
}

const PLACEHOLDER: Instruction = Instruction::Ro {
    op: Opcode::Halt,
    r: Reg::Ax,
    s: Reg::Ax,
    t: Reg::Ax,
};

impl CodeBuffer {
    pub fn emit_ro(&mut self, op: Opcode, r: Reg, s: Reg, t: Reg) {
        self.put(Instruction::Ro { op, r, s, t });
    }

    pub fn emit_rm(&mut self, op: Opcode, r: Reg, d: i32, s: Reg) {
        self.put(Instruction::Rm { op, r, d, s });
    }

    /// Emits a register-memory instruction whose displacement refers to the
    /// absolute location `target`, rewritten as `Pc`-relative. The machine
    /// has already advanced `Pc` past the instruction when the displacement
    /// is applied.
    pub fn emit_rm_abs(&mut self, op: Opcode, r: Reg, target: usize) {
        let d = target as i32 - (self.current as i32 + 1);
        self.put(Instruction::Rm { op, r, d, s: Reg::Pc });
    }

    /// Reserves `steps` slots for later backpatching and returns the first
    /// reserved location.
    pub fn skip(&mut self, steps: usize) -> usize {
        let loc = self.current;
        self.current += steps;
        self.high = self.high.max(self.current);
        loc
    }

    /// The next location an emit would write to.
    pub fn location(&self) -> usize {
        self.current
    }

    /// Rewinds the emit position to a previously skipped location.
    pub fn backup(&mut self, loc: usize) {
        debug_assert!(loc <= self.high, "rewind past the high-water mark");
        self.current = loc;
    }

    /// Moves the emit position back to the high-water mark.
    pub fn restore(&mut self) {
        self.current = self.high;
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.code
    }

    fn put(&mut self, instruction: Instruction) {
        while self.code.len() < self.current {
            self.code.push(PLACEHOLDER);
        }
        if self.current < self.code.len() {
            self.code[self.current] = instruction;
        } else {
            self.code.push(instruction);
        }
        self.current += 1;
        self.high = self.high.max(self.current);
    }
}

impl fmt::Display for CodeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (loc, instruction) in self.code.iter().enumerate() {
            writeln!(f, "{loc:03}:  {instruction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::{CodeBuffer, Opcode::*, Reg::*};

    #[test]
    fn serialization_formats() {
        let mut buf = CodeBuffer::default();
        buf.emit_ro(Halt, Ax, Ax, Ax);
        buf.emit_rm(St, Ax, 0, Tp);
        buf.emit_rm(Ldc, Ax, -3, Ax);
        assert_eq!(
            buf.to_string(),
            indoc! {"
                000:  HALT   0,0,0
                001:  ST     0,0(5)
                002:  LDC    0,-3(0)
            "}
        );
    }

    #[test]
    fn skip_backup_restore() {
        let mut buf = CodeBuffer::default();
        buf.emit_ro(Halt, Ax, Ax, Ax);
        let slot = buf.skip(1);
        buf.emit_ro(Out, Ax, Ax, Ax);
        let end = buf.location();
        buf.backup(slot);
        buf.emit_rm(Ldc, Pc, end as i32, Ax);
        buf.restore();
        buf.emit_ro(Ret, Ax, Ax, Ax);
        assert_eq!(
            buf.to_string(),
            indoc! {"
                000:  HALT   0,0,0
                001:  LDC    2,3(0)
                002:  OUT    0,0,0
                003:  RET    0,0,0
            "}
        );
    }

    #[test]
    fn absolute_targets_become_pc_relative() {
        let mut buf = CodeBuffer::default();
        let slot = buf.skip(1);
        buf.emit_ro(Out, Ax, Ax, Ax);
        buf.backup(slot);
        // Target 2 from location 0: the machine holds Pc = 1 here.
        buf.emit_rm_abs(Jeq, Ax, 2);
        buf.restore();
        assert_eq!(
            buf.to_string(),
            indoc! {"
                000:  JEQ    0,1(2)
                001:  OUT    0,0,0
            "}
        );
    }

    #[test]
    fn unpatched_slots_serialize_as_halt() {
        let mut buf = CodeBuffer::default();
        buf.skip(1);
        buf.emit_ro(Out, Ax, Ax, Ax);
        assert_eq!(
            buf.to_string(),
            indoc! {"
                000:  HALT   0,0,0
                001:  OUT    0,0,0
            "}
        );
    }
}
