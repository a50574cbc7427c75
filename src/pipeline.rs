use std::fmt::{self, Display};

use crate::{
    ast::Program,
    codegen::{self, code::CodeBuffer},
    parser, resolver,
    token::{LineCol, Spanned},
    type_checker,
};

/// Runs the analysis phases (parse, resolve, type check) over a source text,
/// producing the fully annotated tree.
///
/// Phases are gated: each one runs only if every previous phase finished
/// without errors, so later phases can assume a well-formed input.
pub fn analyze(src: &str) -> Result<Program, Vec<Diagnostic>> {
    let tokens = &mut Vec::with_capacity(src.len() / 2);

    let mut program = parser::parse_program(src, tokens)
        .map_err(|(_, errors)| diagnostics(Phase::Parse, src, &errors))?;
    resolver::resolve(&mut program).map_err(|errors| diagnostics(Phase::Resolve, src, &errors))?;
    type_checker::check(&mut program)
        .map_err(|errors| diagnostics(Phase::TypeCheck, src, &errors))?;
    Ok(program)
}

/// Compiles a source text down to a program image for the target machine.
/// Code is only ever generated for a fully checked tree.
pub fn compile(src: &str) -> Result<CodeBuffer, Vec<Diagnostic>> {
    let mut program = analyze(src)?;
    Ok(codegen::generate(&mut program))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Lexical and syntax errors; the lexer's error tokens surface here.
    Parse,
    Resolve,
    TypeCheck,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Parse => "syntax",
            Phase::Resolve => "resolve",
            Phase::TypeCheck => "type",
        })
    }
}

/// A phase error rendered against the source text. Positions are 1-based
/// line and column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub phase: Phase,
    pub pos: LineCol,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error at {}: {}", self.phase, self.pos, self.message)
    }
}

fn diagnostics<E: Display>(phase: Phase, src: &str, errors: &[Spanned<E>]) -> Vec<Diagnostic> {
    errors
        .iter()
        .map(|error| Diagnostic {
            phase,
            pos: error.span.line_col(src),
            message: error.inner.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::{compile, Phase};
    use crate::util::test_utils::compile_and_run;

    #[track_caller]
    fn diagnostics(src: &str) -> Vec<String> {
        match compile(src) {
            Ok(_) => vec![],
            Err(diagnostics) => diagnostics.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn arithmetic_precedence() {
        let output = compile_and_run("void main(void) { output(2 + 3 * 4); }", &[]);
        assert_eq!(output, [14]);
    }

    #[test]
    fn echo_input() {
        let output = compile_and_run("void main(void) { output(input()); }", &[7]);
        assert_eq!(output, [7]);
    }

    #[test]
    fn division_truncates() {
        let output = compile_and_run("void main(void) { output(7 / 2); }", &[]);
        assert_eq!(output, [3]);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        let output = compile_and_run(
            "void main(void) { output(3 < 5); output(5 <= 4); output(2 == 2); output(2 != 2); }",
            &[],
        );
        assert_eq!(output, [1, 0, 1, 0]);
    }

    #[test]
    fn if_else_branches() {
        let src = indoc! {"
            void main(void) {
                int x;
                x = input();
                if (x > 0)
                    output(1);
                else
                    output(0);
            }
        "};
        assert_eq!(compile_and_run(src, &[5]), [1]);
        assert_eq!(compile_and_run(src, &[-5]), [0]);
    }

    #[test]
    fn while_loop_counts() {
        let src = indoc! {"
            void main(void) {
                int i;
                i = 0;
                while (i < 5) {
                    output(i);
                    i = i + 1;
                }
            }
        "};
        assert_eq!(compile_and_run(src, &[]), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn recursive_factorial() {
        let src = indoc! {"
            int fact(int n) {
                if (n <= 1)
                    return 1;
                return n * fact(n - 1);
            }

            void main(void) {
                output(fact(input()));
            }
        "};
        assert_eq!(compile_and_run(src, &[6]), [720]);
    }

    #[test]
    fn globals_persist_across_calls() {
        let src = indoc! {"
            int counter;

            void bump(void) {
                counter = counter + 1;
            }

            void main(void) {
                counter = 0;
                bump();
                bump();
                bump();
                output(counter);
            }
        "};
        assert_eq!(compile_and_run(src, &[]), [3]);
    }

    #[test]
    fn local_arrays_index_and_store() {
        let src = indoc! {"
            void main(void) {
                int a[5];
                int i;
                i = 0;
                while (i < 5) {
                    a[i] = i * i;
                    i = i + 1;
                }
                output(a[3]);
                output(a[4]);
            }
        "};
        assert_eq!(compile_and_run(src, &[]), [9, 16]);
    }

    #[test]
    fn array_parameters_alias_the_caller() {
        let src = indoc! {"
            void fill(int a[], int n) {
                int i;
                i = 0;
                while (i < n) {
                    a[i] = input();
                    i = i + 1;
                }
            }

            int sum(int a[], int n) {
                int i;
                int total;
                i = 0;
                total = 0;
                while (i < n) {
                    total = total + a[i];
                    i = i + 1;
                }
                return total;
            }

            void main(void) {
                int data[4];
                fill(data, 4);
                output(sum(data, 4));
            }
        "};
        assert_eq!(compile_and_run(src, &[10, 20, 30, 40]), [100]);
    }

    #[test]
    fn global_array_through_functions() {
        let src = indoc! {"
            int data[3];

            int get(int i) {
                return data[i];
            }

            void main(void) {
                data[0] = 11;
                data[1] = 22;
                data[2] = 33;
                output(get(0) + get(2));
            }
        "};
        assert_eq!(compile_and_run(src, &[]), [44]);
    }

    #[test]
    fn nested_block_locals() {
        let src = indoc! {"
            void main(void) {
                int x;
                x = 1;
                {
                    int y;
                    y = 2;
                    output(x + y);
                }
                output(x);
            }
        "};
        assert_eq!(compile_and_run(src, &[]), [3, 1]);
    }

    #[test]
    fn shadowed_variable_resumes_after_inner_scope() {
        let src = indoc! {"
            void main(void) {
                int x;
                x = 1;
                {
                    int x;
                    x = 2;
                    output(x);
                }
                output(x);
            }
        "};
        assert_eq!(compile_and_run(src, &[]), [2, 1]);
    }

    #[test]
    fn int_function_without_return_still_returns() {
        // The epilogue supplies the missing `RET`; the call must come back.
        let src = indoc! {"
            int f(void) { }

            void main(void) {
                f();
                output(3);
            }
        "};
        assert_eq!(compile_and_run(src, &[]), [3]);
    }

    #[test]
    fn assignment_is_an_expression() {
        let src = indoc! {"
            void main(void) {
                int x;
                int y;
                y = (x = 4) + 1;
                output(x);
                output(y);
            }
        "};
        assert_eq!(compile_and_run(src, &[]), [4, 5]);
    }

    #[test]
    fn selection_sort_end_to_end() {
        let src = indoc! {"
            int minloc(int a[], int low, int high) {
                int i;
                int x;
                int k;
                k = low;
                x = a[low];
                i = low + 1;
                while (i < high) {
                    if (a[i] < x) {
                        x = a[i];
                        k = i;
                    }
                    i = i + 1;
                }
                return k;
            }

            void sort(int a[], int low, int high) {
                int i;
                int k;
                i = low;
                while (i < high - 1) {
                    int t;
                    k = minloc(a, i, high);
                    t = a[k];
                    a[k] = a[i];
                    a[i] = t;
                    i = i + 1;
                }
            }

            void main(void) {
                int x[5];
                int i;
                i = 0;
                while (i < 5) {
                    x[i] = input();
                    i = i + 1;
                }
                sort(x, 0, 5);
                i = 0;
                while (i < 5) {
                    output(x[i]);
                    i = i + 1;
                }
            }
        "};
        assert_eq!(compile_and_run(src, &[4, 1, 5, 2, 3]), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn parse_errors_gate_later_phases() {
        // `x` is also undeclared, but resolution never runs.
        assert_eq!(
            diagnostics("void main(void) { int a[0]; x = 1; }"),
            ["syntax error at 1:25: invalid array size 0"]
        );
    }

    #[test]
    fn resolve_errors_gate_type_checking() {
        // The arity error on `output` is never reported.
        assert_eq!(
            diagnostics("void main(void) { y = output(); }"),
            ["resolve error at 1:19: undeclared identifier `y`"]
        );
    }

    #[test]
    fn type_errors_prevent_code_generation() {
        assert_eq!(
            diagnostics("void main(void) { output(1, 2); }"),
            ["type error at 1:19: function `output` expects 1 argument(s), but 2 were given"]
        );
    }

    #[test]
    fn successful_compile_reports_nothing() {
        assert!(compile("void main(void) { }").is_ok());
        assert_eq!(
            diagnostics("void main(void) { }"),
            Vec::<String>::new()
        );
    }

    #[test]
    fn multiple_errors_in_one_phase_all_surface() {
        let errors = diagnostics("void main(void) { x = 1; y = 2; }");
        assert_eq!(
            errors,
            [
                "resolve error at 1:19: undeclared identifier `x`",
                "resolve error at 1:26: undeclared identifier `y`",
            ]
        );
    }

    #[test]
    fn phase_tags_are_stable() {
        assert_eq!(Phase::Parse.to_string(), "syntax");
        assert_eq!(Phase::Resolve.to_string(), "resolve");
        assert_eq!(Phase::TypeCheck.to_string(), "type");
    }
}
