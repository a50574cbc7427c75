//! Human-readable tree dumps, used by the test suite and the CLI's tree
//! printer.

use crate::ast::{Ast, NodeId, NodeKind, Program};

pub fn print_program_string(program: &Program) -> String {
    let mut out = String::new();
    for decl in program.ast.siblings(program.decls) {
        print_into(&mut out, &program.ast, decl, 0);
    }
    out
}

pub fn print_node_string(ast: &Ast, root: NodeId) -> String {
    let mut out = String::new();
    print_into(&mut out, ast, root, 0);
    out
}

/// One line per node, two-space indents. Expression nodes carry their source
/// span; structural nodes don't need one.
fn print_into(out: &mut String, ast: &Ast, id: NodeId, depth: usize) {
    let node = &ast[id];
    let span = node.span;

    for _ in 0..depth {
        out.push_str("  ");
    }
    match &node.kind {
        NodeKind::ScalarDecl { name, ty, is_param } => {
            out.push_str(&format!("scalar {name}: {ty}"));
            if *is_param {
                out.push_str(" (param)");
            }
            out.push('\n');
        }
        NodeKind::ArrayDecl { name, size, is_param } => {
            if *is_param {
                out.push_str(&format!("array {name}[] (param)\n"));
            } else {
                out.push_str(&format!("array {name}[{size}]\n"));
            }
        }
        NodeKind::FnDecl { name, ret, params, body } => {
            out.push_str(&format!("function {name}: {ret}\n"));
            for param in ast.siblings(*params) {
                print_into(out, ast, param, depth + 1);
            }
            if let Some(body) = *body {
                print_into(out, ast, body, depth + 1);
            }
        }
        NodeKind::Compound { decls, stmts } => {
            out.push_str("block\n");
            for decl in ast.siblings(*decls) {
                print_into(out, ast, decl, depth + 1);
            }
            for stmt in ast.siblings(*stmts) {
                print_into(out, ast, stmt, depth + 1);
            }
        }
        NodeKind::If { cond, then, otherwise } => {
            out.push_str("if\n");
            print_into(out, ast, *cond, depth + 1);
            if let Some(then) = *then {
                print_into(out, ast, then, depth + 1);
            }
            if let Some(otherwise) = *otherwise {
                print_into(out, ast, otherwise, depth + 1);
            }
        }
        NodeKind::While { cond, body } => {
            out.push_str("while\n");
            print_into(out, ast, *cond, depth + 1);
            if let Some(body) = *body {
                print_into(out, ast, body, depth + 1);
            }
        }
        NodeKind::Return { value } => {
            out.push_str("return\n");
            if let Some(value) = *value {
                print_into(out, ast, value, depth + 1);
            }
        }
        NodeKind::Call { name, args } => {
            out.push_str(&format!("call {name} ({span})\n"));
            for arg in ast.siblings(*args) {
                print_into(out, ast, arg, depth + 1);
            }
        }
        NodeKind::Binary { op, lhs, rhs } => {
            out.push_str(&format!("binary {op:?} ({span})\n"));
            print_into(out, ast, *lhs, depth + 1);
            print_into(out, ast, *rhs, depth + 1);
        }
        NodeKind::Num(value) => {
            out.push_str(&format!("num {value} ({span})\n"));
        }
        NodeKind::Id { name, index } => match *index {
            Some(index) => {
                out.push_str(&format!("index {name} ({span})\n"));
                print_into(out, ast, index, depth + 1);
            }
            None => out.push_str(&format!("ident {name} ({span})\n")),
        },
        NodeKind::Assign { target, value } => {
            out.push_str(&format!("assign ({span})\n"));
            print_into(out, ast, *target, depth + 1);
            print_into(out, ast, *value, depth + 1);
        }
    }
}
