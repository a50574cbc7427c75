use crate::{
    ast::{Ast, Name, NodeId, NodeKind, Program, Ty},
    token::Spanned,
};

type Result<T, E = ()> = std::result::Result<T, E>;

/// Checks the program bottom-up, tagging every expression node with its
/// resolved type. Runs only on a fully resolved tree, so every use site has a
/// declaration to consult.
pub fn check(program: &mut Program) -> Result<(), Vec<Spanned<Error>>> {
    let mut c = Checker {
        ast: &mut program.ast,
        errors: Vec::new(),
    };

    let decls: Vec<_> = c.ast.siblings(program.decls).collect();
    for decl in decls {
        c.visit(decl);
    }

    if c.errors.is_empty() {
        Ok(())
    } else {
        Err(c.errors)
    }
}

struct Checker<'ast> {
    ast: &'ast mut Ast,
    errors: Vec<Spanned<Error>>,
}

impl Checker<'_> {
    fn visit(&mut self, id: NodeId) {
        match &self.ast[id].kind {
            NodeKind::ScalarDecl { .. } | NodeKind::ArrayDecl { .. } => {}
            NodeKind::FnDecl { body, .. } => {
                if let Some(body) = *body {
                    self.visit(body);
                }
            }
            NodeKind::Compound { stmts, .. } => {
                let stmts: Vec<_> = self.ast.siblings(*stmts).collect();
                for stmt in stmts {
                    self.visit(stmt);
                }
            }
            NodeKind::If {
                cond,
                then,
                otherwise,
            } => {
                let (cond, then, otherwise) = (*cond, *then, *otherwise);
                self.check_condition(cond);
                if let Some(then) = then {
                    self.visit(then);
                }
                if let Some(otherwise) = otherwise {
                    self.visit(otherwise);
                }
            }
            NodeKind::While { cond, body } => {
                let (cond, body) = (*cond, *body);
                self.check_condition(cond);
                if let Some(body) = body {
                    self.visit(body);
                }
            }
            NodeKind::Return { value } => {
                let value = *value;
                self.check_return(id, value);
            }
            // Expression statements: check, discard the type.
            NodeKind::Call { .. }
            | NodeKind::Binary { .. }
            | NodeKind::Num(_)
            | NodeKind::Id { .. }
            | NodeKind::Assign { .. } => {
                self.visit_expr(id);
            }
        }
    }

    fn check_condition(&mut self, cond: NodeId) {
        let got = self.visit_expr(cond);
        if got != Ty::Int {
            let span = self.ast[cond].span;
            self.errors.push(span.wrap(Error::ConditionNotInt { got }));
        }
    }

    fn check_return(&mut self, id: NodeId, value: Option<NodeId>) {
        let func = self.decl_of(id);
        let NodeKind::FnDecl { name, ret, .. } = &self.ast[func].kind else {
            unreachable!("return not bound to a function");
        };
        let (name, ret) = (name.clone(), *ret);

        match (ret, value) {
            (Ty::Int, None) => {
                let span = self.ast[id].span;
                self.errors.push(span.wrap(Error::MissingReturnValue { name }));
            }
            (Ty::Void, Some(value)) => {
                self.visit_expr(value);
                let span = self.ast[id].span;
                self.errors
                    .push(span.wrap(Error::UnexpectedReturnValue { name }));
            }
            (Ty::Int, Some(value)) => {
                let got = self.visit_expr(value);
                if got != Ty::Int {
                    let span = self.ast[value].span;
                    self.errors
                        .push(span.wrap(Error::ReturnTypeMismatch { name, got }));
                }
            }
            (Ty::Void, None) => {}
            _ => unreachable!("function return type is always int or void"),
        }
    }

    /// Computes and records the type of an expression node. Errors recover to
    /// `Int` so a single fault does not cascade up the tree.
    fn visit_expr(&mut self, id: NodeId) -> Ty {
        let ty = self.expr_ty(id);
        self.ast[id].marks.ty = Some(ty);
        ty
    }

    fn expr_ty(&mut self, id: NodeId) -> Ty {
        match &self.ast[id].kind {
            NodeKind::Num(_) => Ty::Int,
            NodeKind::Id { index, .. } => {
                let index = *index;
                match index {
                    Some(index) => self.indexed_ty(id, index),
                    None => self.bare_id_ty(id),
                }
            }
            NodeKind::Call { name, args } => {
                let (name, args) = (name.clone(), *args);
                self.call_ty(id, &name, args)
            }
            NodeKind::Binary { lhs, rhs, .. } => {
                let (lhs, rhs) = (*lhs, *rhs);
                self.check_int_operand(lhs);
                self.check_int_operand(rhs);
                Ty::Int
            }
            NodeKind::Assign { target, value } => {
                let (target, value) = (*target, *value);
                let target_ty = self.visit_expr(target);
                if target_ty != Ty::Int {
                    let span = self.ast[target].span;
                    self.errors
                        .push(span.wrap(Error::AssignTargetNotInt { got: target_ty }));
                }
                let got = self.visit_expr(value);
                if got != Ty::Int && target_ty == Ty::Int {
                    let span = self.ast[value].span;
                    self.errors.push(span.wrap(Error::AssignTypeMismatch { got }));
                }
                Ty::Int
            }
            _ => unreachable!("not an expression node"),
        }
    }

    /// A bare identifier: scalars read as `int`, array names denote the whole
    /// array, function names are callable only.
    fn bare_id_ty(&mut self, id: NodeId) -> Ty {
        let decl = self.decl_of(id);
        match &self.ast[decl].kind {
            NodeKind::ScalarDecl { ty: Ty::Int, .. } => Ty::Int,
            NodeKind::ScalarDecl { name, .. } => {
                let name = name.clone();
                let span = self.ast[id].span;
                self.errors.push(span.wrap(Error::VoidVariable { name }));
                Ty::Int
            }
            NodeKind::ArrayDecl { .. } => Ty::Array,
            NodeKind::FnDecl { .. } => Ty::Function,
            _ => unreachable!("declaration mark is always a declaration node"),
        }
    }

    fn indexed_ty(&mut self, id: NodeId, index: NodeId) -> Ty {
        let got = self.visit_expr(index);
        if got != Ty::Int {
            let span = self.ast[index].span;
            self.errors.push(span.wrap(Error::IndexNotInt { got }));
        }

        let decl = self.decl_of(id);
        if !matches!(self.ast[decl].kind, NodeKind::ArrayDecl { .. }) {
            let name = self.name_of(id);
            let span = self.ast[id].span;
            self.errors.push(span.wrap(Error::NotIndexable { name }));
        }
        Ty::Int
    }

    fn call_ty(&mut self, id: NodeId, name: &Name, args: Option<NodeId>) -> Ty {
        let decl = self.decl_of(id);
        let NodeKind::FnDecl { ret, params, .. } = &self.ast[decl].kind else {
            let span = self.ast[id].span;
            self.errors
                .push(span.wrap(Error::NotCallable { name: name.clone() }));
            // Still check the arguments themselves.
            let args: Vec<_> = self.ast.siblings(args).collect();
            for arg in args {
                self.visit_expr(arg);
            }
            return Ty::Int;
        };
        let (ret, params) = (*ret, *params);

        let params: Vec<_> = self.ast.siblings(params).collect();
        let args: Vec<_> = self.ast.siblings(args).collect();

        if params.len() != args.len() {
            let span = self.ast[id].span;
            self.errors.push(span.wrap(Error::ArityMismatch {
                name: name.clone(),
                expected: params.len(),
                got: args.len(),
            }));
        }

        for (position, (&param, &arg)) in params.iter().zip(&args).enumerate() {
            let expected = match self.ast[param].kind {
                NodeKind::ArrayDecl { .. } => Ty::Array,
                NodeKind::ScalarDecl { ty, .. } => ty,
                _ => unreachable!("parameter is always a declaration node"),
            };
            let got = self.visit_expr(arg);
            if got != expected {
                let span = self.ast[arg].span;
                self.errors.push(span.wrap(Error::ArgumentTypeMismatch {
                    name: name.clone(),
                    position: position + 1,
                    expected,
                    got,
                }));
            }
        }
        // Extra arguments past the parameter list still get checked.
        for &arg in args.iter().skip(params.len()) {
            self.visit_expr(arg);
        }

        ret
    }

    fn check_int_operand(&mut self, operand: NodeId) {
        let got = self.visit_expr(operand);
        if got != Ty::Int {
            let span = self.ast[operand].span;
            self.errors.push(span.wrap(Error::OperandNotInt { got }));
        }
    }

    fn decl_of(&self, id: NodeId) -> NodeId {
        self.ast[id]
            .marks
            .decl
            .unwrap_or_else(|| unreachable!("tree is resolved"))
    }

    fn name_of(&self, id: NodeId) -> Name {
        self.ast[id]
            .name()
            .cloned()
            .unwrap_or_else(|| unreachable!("node has a name"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    VoidVariable { name: Name },
    NotIndexable { name: Name },
    IndexNotInt { got: Ty },
    NotCallable { name: Name },
    ArityMismatch {
        name: Name,
        expected: usize,
        got: usize,
    },
    ArgumentTypeMismatch {
        name: Name,
        position: usize,
        expected: Ty,
        got: Ty,
    },
    OperandNotInt { got: Ty },
    ConditionNotInt { got: Ty },
    AssignTargetNotInt { got: Ty },
    AssignTypeMismatch { got: Ty },
    MissingReturnValue { name: Name },
    UnexpectedReturnValue { name: Name },
    ReturnTypeMismatch { name: Name, got: Ty },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Error::*;
        match self {
            VoidVariable { name } => {
                write!(f, "variable `{name}` is declared `void` and cannot be used")
            }
            NotIndexable { name } => write!(f, "`{name}` is not an array"),
            IndexNotInt { got } => write!(f, "array subscript must be `int`, got `{got}`"),
            NotCallable { name } => write!(f, "`{name}` is not a function"),
            ArityMismatch {
                name,
                expected,
                got,
            } => write!(
                f,
                "function `{name}` expects {expected} argument(s), but {got} were given"
            ),
            ArgumentTypeMismatch {
                name,
                position,
                expected,
                got,
            } => write!(
                f,
                "argument {position} to `{name}` must be `{expected}`, got `{got}`"
            ),
            OperandNotInt { got } => {
                write!(f, "operator requires `int` operands, got `{got}`")
            }
            ConditionNotInt { got } => write!(f, "condition must be `int`, got `{got}`"),
            AssignTargetNotInt { got } => {
                write!(f, "assignment target must be `int`, got `{got}`")
            }
            AssignTypeMismatch { got } => {
                write!(f, "cannot assign `{got}` to an `int` variable")
            }
            MissingReturnValue { name } => {
                write!(f, "function `{name}` must return a value")
            }
            UnexpectedReturnValue { name } => {
                write!(f, "void function `{name}` cannot return a value")
            }
            ReturnTypeMismatch { name, got } => {
                write!(f, "function `{name}` returns `int`, got `{got}`")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{parser, resolver, util::test_utils::format_errors};

    #[track_caller]
    fn check(src: &str) -> Vec<String> {
        let tokens = &mut Vec::with_capacity(256);
        let mut program = parser::parse_program(src, tokens)
            .unwrap_or_else(|_| panic!("program under test must parse"));
        resolver::resolve(&mut program)
            .unwrap_or_else(|_| panic!("program under test must resolve"));
        match super::check(&mut program) {
            Ok(()) => vec![],
            Err(errors) => format_errors(src, &errors),
        }
    }

    #[test]
    fn well_typed_program() {
        let errors = check("void main(void) { output(2 + 3 * 4); }");
        assert_eq!(errors, Vec::<String>::new());
    }

    #[test]
    fn arity_mismatch() {
        let errors = check("void g(int x) { } void main(void) { g(1, 2); }");
        assert_eq!(
            errors,
            ["1:37: function `g` expects 1 argument(s), but 2 were given"]
        );
    }

    #[test]
    fn builtin_arity_is_checked() {
        let errors = check("void main(void) { output(); }");
        assert_eq!(
            errors,
            ["1:19: function `output` expects 1 argument(s), but 0 were given"]
        );
    }

    #[test]
    fn array_argument_for_scalar_parameter() {
        let errors = check("void g(int x) { } void main(void) { int a[4]; g(a); }");
        assert_eq!(errors, ["1:49: argument 1 to `g` must be `int`, got `int[]`"]);
    }

    #[test]
    fn whole_array_argument_for_array_parameter() {
        let errors = check("int sum(int a[]) { return a[0]; } void main(void) { int b[4]; output(sum(b)); }");
        assert_eq!(errors, Vec::<String>::new());
    }

    #[test]
    fn condition_must_be_int() {
        let errors = check("void main(void) { int a[3]; if (a) return; }");
        assert_eq!(errors, ["1:33: condition must be `int`, got `int[]`"]);
    }

    #[test]
    fn indexing_a_scalar() {
        let errors = check("void main(void) { int x; x[0] = 1; }");
        assert_eq!(errors, ["1:26: `x` is not an array"]);
    }

    #[test]
    fn subscript_must_be_int() {
        let errors = check("void main(void) { int a[3]; int b[3]; a[b] = 1; }");
        assert_eq!(errors, ["1:41: array subscript must be `int`, got `int[]`"]);
    }

    #[test]
    fn calling_a_variable() {
        let errors = check("int x; void main(void) { x(); }");
        assert_eq!(errors, ["1:26: `x` is not a function"]);
    }

    #[test]
    fn missing_return_value() {
        let errors = check("int f(void) { return; }");
        assert_eq!(errors, ["1:15: function `f` must return a value"]);
    }

    #[test]
    fn return_value_in_void_function() {
        let errors = check("void main(void) { return 1; }");
        assert_eq!(errors, ["1:19: void function `main` cannot return a value"]);
    }

    #[test]
    fn returning_an_array() {
        let errors = check("int f(int a[]) { return a; }");
        assert_eq!(errors, ["1:25: function `f` returns `int`, got `int[]`"]);
    }

    #[test]
    fn void_variable_use() {
        let errors = check("void main(void) { void x; x = 1; }");
        assert_eq!(
            errors,
            ["1:27: variable `x` is declared `void` and cannot be used"]
        );
    }

    #[test]
    fn array_operand_in_arithmetic() {
        let errors = check("void main(void) { int a[3]; output(a + 1); }");
        assert_eq!(errors, ["1:36: operator requires `int` operands, got `int[]`"]);
    }

    #[test]
    fn assignment_to_whole_array() {
        let errors = check("void main(void) { int a[3]; int x; a = x; }");
        assert_eq!(errors, ["1:36: assignment target must be `int`, got `int[]`"]);
    }

    #[test]
    fn void_call_result_in_expression() {
        let errors = check("void main(void) { int x; x = output(1); }");
        assert_eq!(errors, ["1:30: cannot assign `void` to an `int` variable"]);
    }
}
