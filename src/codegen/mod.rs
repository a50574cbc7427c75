//! Single-pass code generation for the stack-oriented target machine.
//!
//! Storage layout:
//!
//! - Globals sit at the bottom of data memory; `Bp` is set to the total
//!   global size, so the cell with offset `k` lives at `-(k + 1)(Bp)`.
//! - Frames grow upward from `Fp`. A frame holds the callee's arguments
//!   followed by its reserved local area; a declaration with offset `k` is
//!   addressed as `-(k + 1)(Fp)`.
//! - The temporary stack grows downward from the top of data memory through
//!   `Tp`; `ST` on `Tp` pushes and `LD` on `Tp` pops.
//!
//! Forward references (jump targets, call return addresses, the jump to
//! `main`) are resolved by reserving slots in the [`CodeBuffer`] and
//! backpatching them once the target is known.

pub mod code;

use crate::{
    ast::{Ast, NodeId, NodeKind, Program},
    codegen::code::{CodeBuffer, Opcode, Reg},
};

/// Generates a complete program image. Expects a parsed, resolved and
/// type-checked tree; records storage offsets and function entry points in
/// the node marks as it goes.
pub fn generate(program: &mut Program) -> CodeBuffer {
    let decls = program.decls;
    let mut g = Generator {
        ast: &mut program.ast,
        buf: CodeBuffer::default(),
        scope_depth: 0,
        has_outermost_return: false,
    };

    // Location 0 is the final resting point: `main` returns here through the
    // bootstrap linkage below, and a program with no `main` jumps here.
    g.buf.emit_ro(Opcode::Halt, Reg::Ax, Reg::Ax, Reg::Ax);

    // Bootstrap linkage for `main`: a zero return address (the halt above)
    // and the initial frame pointer, pushed exactly as a call site would.
    g.buf.emit_rm(Opcode::St, Reg::Ax, 0, Reg::Tp);
    g.buf.emit_rm(Opcode::St, Reg::Fp, 0, Reg::Tp);

    g.gen_program(decls);
    g.buf
}

struct Generator<'ast> {
    ast: &'ast mut Ast,
    buf: CodeBuffer,
    /// Compound nesting depth within the current function; the function body
    /// itself is depth 1.
    scope_depth: u32,
    /// Whether the current function ends in a `return` at body level, making
    /// the synthesized epilogue unnecessary.
    has_outermost_return: bool,
}

impl Generator<'_> {
    fn gen_program(&mut self, decls: Option<NodeId>) {
        let decls: Vec<_> = self.ast.siblings(decls).collect();

        // Lay out the global region and point Bp (and the initial Fp) one
        // past its end.
        let mut global_bound = 0;
        for &decl in &decls {
            match self.ast[decl].kind {
                NodeKind::ScalarDecl { .. } => {
                    self.ast[decl].marks.offset = global_bound;
                    global_bound += 1;
                }
                NodeKind::ArrayDecl { size, .. } => {
                    self.ast[decl].marks.offset = global_bound;
                    global_bound += size;
                }
                _ => {}
            }
        }
        if global_bound != 0 {
            self.buf.emit_rm(Opcode::Ldc, Reg::Bp, global_bound, Reg::Ax);
            self.buf.emit_rm(Opcode::Ldc, Reg::Fp, global_bound, Reg::Ax);
        }

        let jmp_main = self.buf.skip(1);
        let mut entry_point = 0;

        for &decl in &decls {
            if let NodeKind::FnDecl { name, .. } = &self.ast[decl].kind {
                let entry = self.buf.location();
                if entry_point == 0 && &**name == "main" {
                    entry_point = entry;
                }
                self.ast[decl].marks.offset = entry as i32;
                self.gen_func(decl);
            }
        }

        self.buf.backup(jmp_main);
        self.buf
            .emit_rm(Opcode::Ldc, Reg::Pc, entry_point as i32, Reg::Ax);
        self.buf.restore();
    }

    fn gen_func(&mut self, id: NodeId) {
        let NodeKind::FnDecl { name, params, body, .. } = &self.ast[id].kind else {
            unreachable!("not a function declaration");
        };
        let (name, params, body) = (name.clone(), *params, *body);
        let Some(body) = body else {
            unreachable!("builtins are never emitted");
        };

        let local_size = self.layout_frame(id, params, body);

        // Nothing calls `main`, so its local area is reserved in the
        // prologue rather than at a call site.
        if local_size != 0 && &*name == "main" {
            self.buf.emit_rm(Opcode::Lda, Reg::Fp, local_size, Reg::Fp);
        }

        self.scope_depth = 0;
        self.has_outermost_return = false;
        self.gen_stmt(body);

        // A function whose body does not end every path in `return` falls
        // through to a synthesized one.
        if !self.has_outermost_return {
            self.buf.emit_ro(Opcode::Ret, Reg::Ax, Reg::Ax, Reg::Ax);
        }
    }

    /// Assigns frame offsets: body-level locals first, then locals of nested
    /// blocks (flattened into the same frame), then one cell per parameter.
    /// Returns the local area size, parameters excluded.
    fn layout_frame(&mut self, id: NodeId, params: Option<NodeId>, body: NodeId) -> i32 {
        let NodeKind::Compound { decls, stmts } = self.ast[body].kind else {
            unreachable!("function body is a compound");
        };

        let mut bound = 0;
        let decls: Vec<_> = self.ast.siblings(decls).collect();
        for decl in decls {
            bound += self.place_local(decl, bound);
        }
        bound = self.layout_nested(stmts, bound);

        self.ast[id].marks.local_size = bound;

        let params: Vec<_> = self.ast.siblings(params).collect();
        for param in params {
            self.ast[param].marks.offset = bound;
            bound += 1;
        }

        self.ast[id].marks.local_size
    }

    fn layout_nested(&mut self, stmts: Option<NodeId>, mut bound: i32) -> i32 {
        let stmts: Vec<_> = self.ast.siblings(stmts).collect();
        for stmt in stmts {
            match self.ast[stmt].kind {
                NodeKind::Compound { decls, stmts } => {
                    let decls: Vec<_> = self.ast.siblings(decls).collect();
                    for decl in decls {
                        bound += self.place_local(decl, bound);
                    }
                    bound = self.layout_nested(stmts, bound);
                }
                NodeKind::If { then, otherwise, .. } => {
                    if let Some(then) = then {
                        bound = self.layout_nested_one(then, bound);
                    }
                    if let Some(otherwise) = otherwise {
                        bound = self.layout_nested_one(otherwise, bound);
                    }
                }
                NodeKind::While { body, .. } => {
                    if let Some(body) = body {
                        bound = self.layout_nested_one(body, bound);
                    }
                }
                _ => {}
            }
        }
        bound
    }

    /// A sub-statement is a chain of length one; reuse the chain walker.
    fn layout_nested_one(&mut self, stmt: NodeId, bound: i32) -> i32 {
        debug_assert!(self.ast[stmt].next.is_none());
        self.layout_nested(Some(stmt), bound)
    }

    fn place_local(&mut self, decl: NodeId, bound: i32) -> i32 {
        match self.ast[decl].kind {
            NodeKind::ScalarDecl { .. } => {
                self.ast[decl].marks.offset = bound;
                1
            }
            NodeKind::ArrayDecl { size, .. } => {
                self.ast[decl].marks.offset = bound;
                size
            }
            _ => 0,
        }
    }

    fn gen_stmts(&mut self, stmts: Option<NodeId>) {
        let stmts: Vec<_> = self.ast.siblings(stmts).collect();
        for stmt in stmts {
            self.gen_stmt(stmt);
        }
    }

    fn gen_stmt(&mut self, id: NodeId) {
        match self.ast[id].kind {
            NodeKind::Compound { stmts, .. } => {
                self.scope_depth += 1;
                self.gen_stmts(stmts);
                self.scope_depth -= 1;
            }
            NodeKind::If { .. } => self.gen_if(id),
            NodeKind::While { .. } => self.gen_while(id),
            NodeKind::Return { value } => self.gen_return(value),
            NodeKind::Call { .. } => self.gen_call(id),
            // Statement-position assignments keep the store but skip
            // materializing the result.
            NodeKind::Assign { target, value } => self.gen_assign(target, value, false),
            // Other bare expressions have no effect; emit nothing.
            NodeKind::Binary { .. } | NodeKind::Num(_) | NodeKind::Id { .. } => {}
            _ => unreachable!("declarations are not statements"),
        }
    }

    fn gen_if(&mut self, id: NodeId) {
        let NodeKind::If { cond, then, otherwise } = self.ast[id].kind else {
            unreachable!();
        };

        self.gen_expr(cond, false, true);
        let else_jmp = self.buf.skip(1);

        self.scope_depth += 1;
        if let Some(then) = then {
            self.gen_stmt(then);
        }
        self.scope_depth -= 1;

        let end_jmp = self.buf.skip(1);
        let else_loc = self.buf.location();
        self.buf.backup(else_jmp);
        self.buf.emit_rm_abs(Opcode::Jeq, Reg::Ax, else_loc);
        self.buf.restore();

        self.scope_depth += 1;
        if let Some(otherwise) = otherwise {
            self.gen_stmt(otherwise);
        }
        self.scope_depth -= 1;

        let end_loc = self.buf.location();
        self.buf.backup(end_jmp);
        self.buf.emit_rm(Opcode::Ldc, Reg::Pc, end_loc as i32, Reg::Ax);
        self.buf.restore();
    }

    fn gen_while(&mut self, id: NodeId) {
        let NodeKind::While { cond, body } = self.ast[id].kind else {
            unreachable!();
        };

        let head = self.buf.location();
        self.gen_expr(cond, false, true);
        let end_jmp = self.buf.skip(1);

        self.scope_depth += 1;
        if let Some(body) = body {
            self.gen_stmt(body);
        }
        self.scope_depth -= 1;

        let head_jmp = self.buf.skip(1);
        let end = self.buf.location();

        self.buf.backup(end_jmp);
        self.buf.emit_rm_abs(Opcode::Jeq, Reg::Ax, end);
        self.buf.backup(head_jmp);
        self.buf.emit_rm(Opcode::Ldc, Reg::Pc, head as i32, Reg::Ax);
        self.buf.restore();
    }

    fn gen_return(&mut self, value: Option<NodeId>) {
        if self.scope_depth == 1 {
            self.has_outermost_return = true;
        }
        if let Some(value) = value {
            self.gen_expr(value, false, true);
        }
        // Ax holds the return value, if any; `RET` restores Fp and Pc.
        self.buf.emit_ro(Opcode::Ret, Reg::Ax, Reg::Ax, Reg::Ax);
    }

    /// Emits a call; the result (for `int` functions) is left in `Ax`.
    ///
    /// Call protocol: push the return address and the caller's `Fp` onto the
    /// temporary stack, evaluate arguments left to right pushing each, then
    /// move the arguments into the callee's frame in one `LS`, reserve the
    /// callee's local area, and jump. The callee's `RET` pops `Fp` and the
    /// return address back off.
    fn gen_call(&mut self, id: NodeId) {
        let NodeKind::Call { args, .. } = self.ast[id].kind else {
            unreachable!();
        };
        let callee = self.decl_of(id);

        // The builtins bypass the protocol entirely: they compile to a
        // single machine instruction operating on `Ax`.
        if let NodeKind::FnDecl { body: None, name, .. } = &self.ast[callee].kind {
            match &**name {
                "input" => self.buf.emit_ro(Opcode::In, Reg::Ax, Reg::Ax, Reg::Ax),
                "output" => {
                    let arg = args.unwrap_or_else(|| unreachable!("arity checked"));
                    self.gen_expr(arg, false, true);
                    self.buf.emit_ro(Opcode::Out, Reg::Ax, Reg::Ax, Reg::Ax);
                }
                _ => unreachable!("unknown builtin"),
            }
            return;
        }

        // Return address slot, patched once the call sequence length is
        // known.
        let ret_slot = self.buf.skip(1);
        self.buf.emit_rm(Opcode::St, Reg::Bx, 0, Reg::Tp);
        self.buf.emit_rm(Opcode::St, Reg::Fp, 0, Reg::Tp);

        let args: Vec<_> = self.ast.siblings(args).collect();
        for &arg in &args {
            self.gen_expr(arg, false, true);
            self.buf.emit_rm(Opcode::St, Reg::Ax, 0, Reg::Tp);
        }
        if !args.is_empty() {
            self.buf.emit_rm(Opcode::Ls, Reg::Ax, args.len() as i32, Reg::Ax);
        }

        let local_size = self.ast[callee].marks.local_size;
        if local_size != 0 {
            self.buf.emit_rm(Opcode::Lda, Reg::Fp, local_size, Reg::Fp);
        }

        let entry = self.ast[callee].marks.offset;
        self.buf.emit_rm(Opcode::Ldc, Reg::Pc, entry, Reg::Ax);

        // Bx := address of the instruction after the jump.
        let here = self.buf.location();
        self.buf.backup(ret_slot);
        self.buf
            .emit_rm(Opcode::Lda, Reg::Bx, (here - ret_slot - 1) as i32, Reg::Pc);
        self.buf.restore();
    }

    fn gen_assign(&mut self, target: NodeId, value: NodeId, need_result: bool) {
        self.gen_expr(value, false, true);
        self.buf.emit_rm(Opcode::St, Reg::Ax, 0, Reg::Tp);

        // Target address into Ax, value back into Bx, store.
        self.gen_expr(target, true, false);
        self.buf.emit_rm(Opcode::Ld, Reg::Bx, 0, Reg::Tp);
        self.buf.emit_rm(Opcode::St, Reg::Bx, 0, Reg::Ax);

        if need_result {
            self.buf.emit_rm(Opcode::Lda, Reg::Ax, 0, Reg::Bx);
        }
    }

    /// Emits an expression. With `need_val` the value ends up in `Ax`; with
    /// `need_addr` (scalars and indexed accesses) the cell address does.
    fn gen_expr(&mut self, id: NodeId, need_addr: bool, need_val: bool) {
        match self.ast[id].kind {
            NodeKind::Num(value) => {
                self.buf.emit_rm(Opcode::Ldc, Reg::Ax, value, Reg::Ax);
            }
            NodeKind::Call { .. } => self.gen_call(id),
            NodeKind::Assign { target, value } => self.gen_assign(target, value, true),
            NodeKind::Binary { op, lhs, rhs } => {
                self.gen_expr(lhs, false, true);
                self.buf.emit_rm(Opcode::St, Reg::Ax, 0, Reg::Tp);
                self.gen_expr(rhs, false, true);
                self.buf.emit_rm(Opcode::Ld, Reg::Bx, 0, Reg::Tp);
                // Bx: lhs, Ax: rhs.
                self.gen_binop(op);
            }
            NodeKind::Id { index, .. } => self.gen_id(id, index, need_addr, need_val),
            _ => unreachable!("not an expression node"),
        }
    }

    fn gen_binop(&mut self, op: crate::ast::BinOp) {
        use crate::ast::BinOp;
        let arith = match op {
            BinOp::Add => Some(Opcode::Add),
            BinOp::Sub => Some(Opcode::Sub),
            BinOp::Mul => Some(Opcode::Mul),
            BinOp::Div => Some(Opcode::Div),
            _ => None,
        };
        if let Some(op) = arith {
            self.buf.emit_ro(op, Reg::Ax, Reg::Bx, Reg::Ax);
            return;
        }

        // Comparisons canonicalize to 0/1 in Ax: subtract, then a
        // conditional skip over the "false" arm.
        let jump = match op {
            BinOp::Lt => Opcode::Jlt,
            BinOp::Le => Opcode::Jle,
            BinOp::Gt => Opcode::Jgt,
            BinOp::Ge => Opcode::Jge,
            BinOp::Eq => Opcode::Jeq,
            BinOp::Ne => Opcode::Jne,
            _ => unreachable!(),
        };
        self.buf.emit_ro(Opcode::Sub, Reg::Ax, Reg::Bx, Reg::Ax);
        self.buf.emit_rm(jump, Reg::Ax, 2, Reg::Pc);
        self.buf.emit_rm(Opcode::Ldc, Reg::Ax, 0, Reg::Ax);
        self.buf.emit_rm(Opcode::Lda, Reg::Pc, 1, Reg::Pc);
        self.buf.emit_rm(Opcode::Ldc, Reg::Ax, 1, Reg::Ax);
    }

    fn gen_id(&mut self, id: NodeId, index: Option<NodeId>, need_addr: bool, need_val: bool) {
        let decl = self.decl_of(id);
        let base = if self.ast[decl].marks.is_global {
            Reg::Bp
        } else {
            Reg::Fp
        };
        let d = -(self.ast[decl].marks.offset + 1);

        match self.ast[decl].kind {
            NodeKind::ScalarDecl { .. } => {
                let op = if need_addr { Opcode::Lda } else { Opcode::Ld };
                self.buf.emit_rm(op, Reg::Ax, d, base);
            }
            NodeKind::ArrayDecl { is_param, .. } => {
                // An array parameter cell holds the caller's array address,
                // so it is loaded; a local or global array's address is the
                // cell's own.
                let base_op = if is_param { Opcode::Ld } else { Opcode::Lda };
                match index {
                    None => self.buf.emit_rm(base_op, Reg::Ax, d, base),
                    Some(index) => {
                        self.gen_expr(index, false, true);
                        self.buf.emit_rm(base_op, Reg::Bx, d, base);
                        // Elements descend from the base address.
                        self.buf.emit_ro(Opcode::Sub, Reg::Ax, Reg::Bx, Reg::Ax);
                        if need_val {
                            self.buf.emit_rm(Opcode::Ld, Reg::Ax, 0, Reg::Ax);
                        }
                    }
                }
            }
            _ => unreachable!("identifier use resolves to a variable"),
        }
    }

    fn decl_of(&self, id: NodeId) -> NodeId {
        self.ast[id]
            .marks
            .decl
            .unwrap_or_else(|| unreachable!("tree is resolved"))
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use crate::util::test_utils::compile_ok;

    #[test]
    fn minimal_program_image() {
        let buf = compile_ok("void main(void) { output(1); }");
        assert_eq!(
            buf.to_string(),
            indoc! {"
                000:  HALT   0,0,0
                001:  ST     0,0(5)
                002:  ST     4,0(5)
                003:  LDC    2,4(0)
                004:  LDC    0,1(0)
                005:  OUT    0,0,0
                006:  RET    0,0,0
            "}
        );
    }

    #[test]
    fn globals_reserve_the_public_area() {
        let buf = compile_ok("int g; int a[3]; void main(void) { }");
        let listing = buf.to_string();
        // Bp and the initial Fp both point past the four global cells.
        assert_eq!(
            listing.lines().nth(3).unwrap_or(""),
            "003:  LDC    3,4(0)"
        );
        assert_eq!(
            listing.lines().nth(4).unwrap_or(""),
            "004:  LDC    4,4(0)"
        );
    }

    #[test]
    fn comparison_canonicalizes_to_zero_or_one() {
        let buf = compile_ok("void main(void) { output(1 < 2); }");
        assert_eq!(
            buf.to_string(),
            indoc! {"
                000:  HALT   0,0,0
                001:  ST     0,0(5)
                002:  ST     4,0(5)
                003:  LDC    2,4(0)
                004:  LDC    0,1(0)
                005:  ST     0,0(5)
                006:  LDC    0,2(0)
                007:  LD     1,0(5)
                008:  SUB    0,1,0
                009:  JLT    0,2(2)
                010:  LDC    0,0(0)
                011:  LDA    2,1(2)
                012:  LDC    0,1(0)
                013:  OUT    0,0,0
                014:  RET    0,0,0
            "}
        );
    }

    #[test]
    fn while_jumps_are_backpatched() {
        let buf = compile_ok(
            "void main(void) { int i; i = 0; while (i < 3) { i = i + 1; } }",
        );
        let listing = buf.to_string();
        // The loop exit is a Pc-relative JEQ and the back edge an absolute
        // LDC into Pc; both must land inside the image.
        assert!(listing.contains("JEQ"), "{listing}");
        assert!(listing.contains("LDC    2,"), "{listing}");
    }
}
