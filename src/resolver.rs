use std::collections::HashMap;

use crate::{
    ast::{Ast, Name, NodeId, NodeKind, Program, Ty},
    token::{Span, Spanned},
};

type Result<T, E = ()> = std::result::Result<T, E>;

/// Binds every identifier and call use to its declaration, recording the
/// handle in the node's marks. `return` statements are bound to their
/// enclosing function the same way.
///
/// Resolution is purely name-based; whether a binding is *usable* in a given
/// position (calling a variable, indexing a function) is the type checker's
/// business.
pub fn resolve(program: &mut Program) -> Result<(), Vec<Spanned<Error>>> {
    let mut r = Resolver {
        ast: &mut program.ast,
        scopes: Vec::with_capacity(8),
        current_fn: None,
        errors: Vec::new(),
    };

    r.scopes.push(HashMap::new());
    r.declare_builtins();
    for decl in collect(r.ast.siblings(program.decls)) {
        r.visit(decl);
    }
    r.scopes.pop();

    // Top-level variable declarations live in the global region.
    for decl in collect(r.ast.siblings(program.decls)) {
        if let NodeKind::ScalarDecl { .. } | NodeKind::ArrayDecl { .. } = r.ast[decl].kind {
            r.ast[decl].marks.is_global = true;
        }
    }

    if r.errors.is_empty() {
        Ok(())
    } else {
        Err(r.errors)
    }
}

/// The sibling iterator borrows the arena, but visiting mutates it; buffer
/// the chain first.
fn collect(siblings: impl Iterator<Item = NodeId>) -> Vec<NodeId> {
    siblings.collect()
}

struct Resolver<'ast> {
    ast: &'ast mut Ast,
    /// Innermost scope last. Lookups walk it back to front, so an inner
    /// binding shadows any outer one with the same name.
    scopes: Vec<HashMap<Name, NodeId>>,
    current_fn: Option<NodeId>,
    errors: Vec<Spanned<Error>>,
}

impl Resolver<'_> {
    /// The two runtime primitives, `int input(void)` and `void output(int)`.
    /// They are synthesized as body-less function declarations so that call
    /// sites bind and type-check like any user function.
    fn declare_builtins(&mut self) {
        let span = Span::new_of_length(0, 0);

        let input = self.ast.alloc(
            NodeKind::FnDecl {
                name: "input".into(),
                ret: Ty::Int,
                params: None,
                body: None,
            },
            span,
        );

        let param = self.ast.alloc(
            NodeKind::ScalarDecl {
                name: "x".into(),
                ty: Ty::Int,
                is_param: true,
            },
            span,
        );
        let output = self.ast.alloc(
            NodeKind::FnDecl {
                name: "output".into(),
                ret: Ty::Void,
                params: Some(param),
                body: None,
            },
            span,
        );

        self.bind("input".into(), input);
        self.bind("output".into(), output);
    }

    fn visit(&mut self, id: NodeId) {
        match &self.ast[id].kind {
            NodeKind::ScalarDecl { name, .. } | NodeKind::ArrayDecl { name, .. } => {
                self.declare(name.clone(), id);
            }
            NodeKind::FnDecl { name, params, body, .. } => {
                let (name, params, body) = (name.clone(), *params, *body);
                self.declare(name, id);

                let enclosing = self.current_fn.replace(id);
                self.scopes.push(HashMap::new());
                for param in collect(self.ast.siblings(params)) {
                    self.visit(param);
                }
                if let Some(body) = body {
                    // The body compound shares the parameter scope.
                    self.visit_compound_in_place(body);
                }
                self.scopes.pop();
                self.current_fn = enclosing;
            }
            NodeKind::Compound { .. } => {
                self.scopes.push(HashMap::new());
                self.visit_compound_in_place(id);
                self.scopes.pop();
            }
            NodeKind::If {
                cond,
                then,
                otherwise,
            } => {
                let (cond, then, otherwise) = (*cond, *then, *otherwise);
                self.visit(cond);
                if let Some(then) = then {
                    self.visit(then);
                }
                if let Some(otherwise) = otherwise {
                    self.visit(otherwise);
                }
            }
            NodeKind::While { cond, body } => {
                let (cond, body) = (*cond, *body);
                self.visit(cond);
                if let Some(body) = body {
                    self.visit(body);
                }
            }
            NodeKind::Return { value } => {
                let value = *value;
                self.ast[id].marks.decl = self.current_fn;
                if let Some(value) = value {
                    self.visit(value);
                }
            }
            NodeKind::Call { name, args } => {
                let (name, args) = (name.clone(), *args);
                self.bind_use(id, &name);
                for arg in collect(self.ast.siblings(args)) {
                    self.visit(arg);
                }
            }
            NodeKind::Binary { lhs, rhs, .. } => {
                let (lhs, rhs) = (*lhs, *rhs);
                self.visit(lhs);
                self.visit(rhs);
            }
            NodeKind::Id { name, index } => {
                let (name, index) = (name.clone(), *index);
                self.bind_use(id, &name);
                if let Some(index) = index {
                    self.visit(index);
                }
            }
            NodeKind::Assign { target, value } => {
                let (target, value) = (*target, *value);
                self.visit(target);
                self.visit(value);
            }
            NodeKind::Num(_) => {}
        }
    }

    /// Visits a compound's declarations and statements without opening a new
    /// scope. Callers decide the scope discipline.
    fn visit_compound_in_place(&mut self, id: NodeId) {
        let NodeKind::Compound { decls, stmts } = self.ast[id].kind else {
            unreachable!("not a compound node");
        };
        for decl in collect(self.ast.siblings(decls)) {
            self.visit(decl);
        }
        for stmt in collect(self.ast.siblings(stmts)) {
            self.visit(stmt);
        }
    }

    /// Inserts a binding into the innermost scope. A clash within the same
    /// scope is an error; the first binding wins.
    fn declare(&mut self, name: Name, id: NodeId) {
        let scope = self.scopes.last_mut().unwrap_or_else(|| unreachable!());
        if scope.contains_key(&name) {
            let span = self.ast[id].span;
            self.errors.push(span.wrap(Error::Duplicate { name }));
        } else {
            scope.insert(name, id);
        }
    }

    /// Unconditional insert, for the builtin prelude.
    fn bind(&mut self, name: Name, id: NodeId) {
        let scope = self.scopes.last_mut().unwrap_or_else(|| unreachable!());
        scope.insert(name, id);
    }

    fn bind_use(&mut self, id: NodeId, name: &Name) {
        match self.lookup(name) {
            Some(decl) => self.ast[id].marks.decl = Some(decl),
            None => {
                let span = self.ast[id].span;
                self.errors.push(span.wrap(Error::Undeclared { name: name.clone() }));
            }
        }
    }

    fn lookup(&self, name: &Name) -> Option<NodeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Undeclared { name: Name },
    Duplicate { name: Name },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Undeclared { name } => write!(f, "undeclared identifier `{name}`"),
            Error::Duplicate { name } => {
                write!(f, "duplicate declaration of `{name}` in the same scope")
            }
        }
    }
}
