use crate::{
    ast::{Ast, BinOp, Name, NodeId, NodeKind, Program, Ty},
    lexer::{self, extract},
    token::{Span, Spanned, Token, TokenKind},
};

type Result<T, E = ()> = std::result::Result<T, E>;

pub type ParseResult<T> = Result<T, (T, Vec<Spanned<Error>>)>;

/// Parses a whole translation unit.
///
/// On failure the best-effort tree is still returned alongside the recorded
/// diagnostics, so callers can inspect what did parse.
pub fn parse_program(src: &str, tokens: &mut Vec<Token>) -> ParseResult<Program> {
    let mut p = Parser::new(src, tokens);
    let decls = p.parse_program();
    let program = Program { ast: p.ast, decls };
    if p.errors.is_empty() {
        Ok(program)
    } else {
        Err((program, p.errors))
    }
}

/// Parses a single expression. Trailing input past the expression is not an
/// error here; this entry point exists for tests and debugging.
pub fn parse_expr(src: &str, tokens: &mut Vec<Token>) -> ParseResult<(Ast, Option<NodeId>)> {
    let mut p = Parser::new(src, tokens);
    let root = p.parse_expr().ok();
    let out = (p.ast, root);
    if p.errors.is_empty() {
        Ok(out)
    } else {
        Err((out, p.errors))
    }
}

struct Parser<'src, 'tok> {
    src: &'src str,
    tokens: &'tok [Token],
    ast: Ast,
    cursor: usize,
    /// Span of the most recently consumed non-trivia token; used to close
    /// statement spans.
    last_span: Span,
    errors: Vec<Spanned<Error>>,
}

impl Parser<'_, '_> {
    fn parse_program(&mut self) -> Option<NodeId> {
        let mut head = None;
        let mut last = None;
        while self.except([]) {
            let Some(decl) = self.recover(&[], Self::parse_decl) else {
                break;
            };
            self.chain(&mut head, &mut last, decl);
        }
        let _ = self.consume(TokenKind::Eof);
        head
    }

    /// declaration := type ID ( ';' | '[' NUM ']' ';' | '(' params ')' block )
    fn parse_decl(&mut self) -> Result<NodeId> {
        let start = self.peek().span();
        let ty = self.parse_type_atom()?;
        let name_token = self.consume(TokenKind::Identifier)?;
        let name = extract::ident(name_token, self.src);

        match self.peek().kind {
            TokenKind::Semicolon => {
                let end = self.advance();
                let kind = NodeKind::ScalarDecl {
                    name,
                    ty,
                    is_param: false,
                };
                Ok(self.ast.alloc(kind, start.to(end.span())))
            }
            TokenKind::LBracket => {
                self.advance();
                let size = self.parse_array_size()?;
                self.consume(TokenKind::RBracket)?;
                let end = self.consume(TokenKind::Semicolon)?;
                let kind = NodeKind::ArrayDecl {
                    name,
                    size,
                    is_param: false,
                };
                Ok(self.ast.alloc(kind, start.to(end.span())))
            }
            TokenKind::LParen => {
                self.advance();
                let params = self.parse_params()?;
                self.consume(TokenKind::RParen)?;
                let body = self.parse_compound()?;
                let span = start.to(self.ast[body].span);
                let kind = NodeKind::FnDecl {
                    name,
                    ret: ty,
                    params,
                    body: Some(body),
                };
                Ok(self.ast.alloc(kind, span))
            }
            other => {
                let c = self.peek();
                self.error(c.span().wrap(Error::UnexpectedTokenInDecl { token: other }));
                Err(())
            }
        }
    }

    /// A local variable declaration: like [`Self::parse_decl`] but without
    /// the function form.
    fn parse_var_decl(&mut self) -> Result<NodeId> {
        let start = self.peek().span();
        let ty = self.parse_type_atom()?;
        let name_token = self.consume(TokenKind::Identifier)?;
        let name = extract::ident(name_token, self.src);

        match self.peek().kind {
            TokenKind::Semicolon => {
                let end = self.advance();
                let kind = NodeKind::ScalarDecl {
                    name,
                    ty,
                    is_param: false,
                };
                Ok(self.ast.alloc(kind, start.to(end.span())))
            }
            TokenKind::LBracket => {
                self.advance();
                let size = self.parse_array_size()?;
                self.consume(TokenKind::RBracket)?;
                let end = self.consume(TokenKind::Semicolon)?;
                let kind = NodeKind::ArrayDecl {
                    name,
                    size,
                    is_param: false,
                };
                Ok(self.ast.alloc(kind, start.to(end.span())))
            }
            other => {
                let c = self.peek();
                self.error(c.span().wrap(Error::UnexpectedTokenInDecl { token: other }));
                Err(())
            }
        }
    }

    /// The declared element count must be a positive integer. The error is
    /// recorded but parsing continues; later phases are gated anyway.
    fn parse_array_size(&mut self) -> Result<i32> {
        let token = self.consume(TokenKind::Number)?;
        let Ok(size) = extract::int(token, self.src) else {
            self.error(token.span().wrap(Error::ParseInt));
            return Ok(0);
        };
        if size <= 0 {
            self.error(token.span().wrap(Error::InvalidArraySize(size)));
        }
        Ok(size)
    }

    /// params := 'void' | param (',' param)*
    fn parse_params(&mut self) -> Result<Option<NodeId>> {
        if self.take(TokenKind::Void) || self.is(TokenKind::RParen) {
            return Ok(None);
        }
        let mut head = None;
        let mut last = None;
        loop {
            let param = self.parse_param()?;
            self.chain(&mut head, &mut last, param);
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        Ok(head)
    }

    /// param := type ID ('[' ']')?
    fn parse_param(&mut self) -> Result<NodeId> {
        let start = self.peek().span();
        let ty = self.parse_type_atom()?;
        let name_token = self.consume(TokenKind::Identifier)?;
        let name = extract::ident(name_token, self.src);

        if self.take(TokenKind::LBracket) {
            // Array parameters are declared `foo[]`; the size belongs to the
            // caller's array.
            let end = self.consume(TokenKind::RBracket)?;
            let kind = NodeKind::ArrayDecl {
                name,
                size: 0,
                is_param: true,
            };
            Ok(self.ast.alloc(kind, start.to(end.span())))
        } else {
            let kind = NodeKind::ScalarDecl {
                name,
                ty,
                is_param: true,
            };
            Ok(self.ast.alloc(kind, start.to(name_token.span())))
        }
    }

    fn parse_type_atom(&mut self) -> Result<Ty> {
        match self.peek().kind {
            TokenKind::Int => {
                self.advance();
                Ok(Ty::Int)
            }
            TokenKind::Void => {
                self.advance();
                Ok(Ty::Void)
            }
            actual => {
                let c = self.peek();
                self.error(c.span().wrap(Error::ExpectedTypeAtom { actual }));
                Err(())
            }
        }
    }

    /// block := '{' localDecl* statement* '}'
    fn parse_compound(&mut self) -> Result<NodeId> {
        let start = self.consume(TokenKind::LBrace)?;

        let mut decls = None;
        let mut last_decl = None;
        while matches!(self.peek().kind, TokenKind::Int | TokenKind::Void) {
            match self.parse_var_decl() {
                Ok(decl) => self.chain(&mut decls, &mut last_decl, decl),
                Err(()) => {
                    // Skip one token and retry from the block body.
                    if self.peek().is_eof() {
                        break;
                    }
                    self.advance();
                }
            }
        }

        let mut stmts = None;
        let mut last_stmt = None;
        while self.except([TokenKind::RBrace]) {
            let Some(stmt) = self.recover(&[TokenKind::RBrace], Self::parse_statement) else {
                break;
            };
            if let Some(stmt) = stmt {
                self.chain(&mut stmts, &mut last_stmt, stmt);
            }
        }

        let end = self.consume(TokenKind::RBrace)?;
        let kind = NodeKind::Compound { decls, stmts };
        Ok(self.ast.alloc(kind, start.span().to(end.span())))
    }

    /// Empty statements (a bare `;`) produce no node, hence the nested
    /// `Option`.
    fn parse_statement(&mut self) -> Result<Option<NodeId>> {
        match self.peek().kind {
            TokenKind::If => self.parse_if().map(Some),
            TokenKind::While => self.parse_while().map(Some),
            TokenKind::Return => self.parse_return().map(Some),
            TokenKind::LBrace => self.parse_compound().map(Some),
            TokenKind::Identifier | TokenKind::Number | TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.consume(TokenKind::Semicolon)?;
                Ok(Some(expr))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(None)
            }
            token => {
                let c = self.peek();
                self.error(c.span().wrap(Error::UnexpectedTokenInStmt { token }));
                Err(())
            }
        }
    }

    /// if := 'if' '(' expr ')' statement ('else' statement)?
    fn parse_if(&mut self) -> Result<NodeId> {
        let start = self.advance();
        self.consume(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;
        let then = self.parse_statement()?;
        let otherwise = if self.take(TokenKind::Else) {
            self.parse_statement()?
        } else {
            None
        };
        let span = start.span().to(self.last_span);
        let kind = NodeKind::If {
            cond,
            then,
            otherwise,
        };
        Ok(self.ast.alloc(kind, span))
    }

    /// while := 'while' '(' expr ')' statement
    fn parse_while(&mut self) -> Result<NodeId> {
        let start = self.advance();
        self.consume(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;
        let body = self.parse_statement()?;
        let span = start.span().to(self.last_span);
        Ok(self.ast.alloc(NodeKind::While { cond, body }, span))
    }

    /// return := 'return' expr? ';'
    fn parse_return(&mut self) -> Result<NodeId> {
        let start = self.advance();
        let value = if self.is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let end = self.consume(TokenKind::Semicolon)?;
        let span = start.span().to(end.span());
        Ok(self.ast.alloc(NodeKind::Return { value }, span))
    }

    /// expr := (lvalue '=' expr) | relExpr
    ///
    /// There is no backtracking: an identifier prefix (plain, indexed or
    /// call) is parsed exactly once and then either becomes an assignment
    /// target or is threaded down the precedence levels as the already-parsed
    /// primary.
    fn parse_expr(&mut self) -> Result<NodeId> {
        let prefix = if self.is(TokenKind::Identifier) {
            Some(self.parse_id_prefix()?)
        } else {
            None
        };

        if let Some(lhs) = prefix {
            if self.is(TokenKind::Assign) {
                return self.parse_assignment(lhs);
            }
        }
        self.parse_rel_expr(prefix)
    }

    fn parse_assignment(&mut self, lhs: NodeId) -> Result<NodeId> {
        // A plain or indexed identifier is a legal target; a call result is
        // not.
        if !matches!(self.ast[lhs].kind, NodeKind::Id { .. }) {
            let span = self.ast[lhs].span;
            self.error(span.wrap(Error::InvalidAssignmentTarget));
            return Err(());
        }
        self.advance(); // `=`
        let value = self.parse_expr()?;
        let span = self.ast[lhs].span.to(self.ast[value].span);
        let kind = NodeKind::Assign { target: lhs, value };
        Ok(self.ast.alloc(kind, span))
    }

    /// relExpr := addExpr (relOp addExpr)?
    ///
    /// A single level: `a < b < c` does not parse as two comparisons.
    fn parse_rel_expr(&mut self, pass: Option<NodeId>) -> Result<NodeId> {
        let lhs = self.parse_add_expr(pass)?;
        if !self.peek().kind.is_rel_op() {
            return Ok(lhs);
        }
        let op = binop_of(self.advance().kind);
        let rhs = self.parse_add_expr(None)?;
        let span = self.ast[lhs].span.to(self.ast[rhs].span);
        Ok(self.ast.alloc(NodeKind::Binary { op, lhs, rhs }, span))
    }

    /// addExpr := term (('+'|'-') term)*
    fn parse_add_expr(&mut self, pass: Option<NodeId>) -> Result<NodeId> {
        let mut lhs = self.parse_term(pass)?;
        while matches!(self.peek().kind, TokenKind::Plus | TokenKind::Minus) {
            let op = binop_of(self.advance().kind);
            let rhs = self.parse_term(None)?;
            let span = self.ast[lhs].span.to(self.ast[rhs].span);
            lhs = self.ast.alloc(NodeKind::Binary { op, lhs, rhs }, span);
        }
        Ok(lhs)
    }

    /// term := factor (('*'|'/') factor)*
    fn parse_term(&mut self, pass: Option<NodeId>) -> Result<NodeId> {
        let mut lhs = self.parse_factor(pass)?;
        while matches!(self.peek().kind, TokenKind::Star | TokenKind::Slash) {
            let op = binop_of(self.advance().kind);
            let rhs = self.parse_factor(None)?;
            let span = self.ast[lhs].span.to(self.ast[rhs].span);
            lhs = self.ast.alloc(NodeKind::Binary { op, lhs, rhs }, span);
        }
        Ok(lhs)
    }

    /// factor := ID ('[' expr ']')? | ID '(' args ')' | '(' expr ')' | NUM
    fn parse_factor(&mut self, pass: Option<NodeId>) -> Result<NodeId> {
        // End point of the pass-down protocol: the identifier prefix was
        // already parsed before the precedence descent began.
        if let Some(pass) = pass {
            return Ok(pass);
        }

        match self.peek().kind {
            TokenKind::Identifier => self.parse_id_prefix(),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Number => {
                let token = self.advance();
                let Ok(value) = extract::int(token, self.src) else {
                    self.error(token.span().wrap(Error::ParseInt));
                    return Err(());
                };
                Ok(self.ast.alloc(NodeKind::Num(value), token.span()))
            }
            token => {
                let c = self.peek();
                self.error(c.span().wrap(Error::UnexpectedTokenInExpr { token }));
                Err(())
            }
        }
    }

    /// An identifier plus whatever trails it: a call `f(args)`, an indexed
    /// access `a[expr]`, or nothing.
    fn parse_id_prefix(&mut self) -> Result<NodeId> {
        let token = self.consume(TokenKind::Identifier)?;
        let name: Name = extract::ident(token, self.src);

        if self.take(TokenKind::LParen) {
            let args = self.parse_args()?;
            let end = self.consume(TokenKind::RParen)?;
            let kind = NodeKind::Call { name, args };
            Ok(self.ast.alloc(kind, token.span().to(end.span())))
        } else if self.take(TokenKind::LBracket) {
            let index = self.parse_expr()?;
            let end = self.consume(TokenKind::RBracket)?;
            let kind = NodeKind::Id {
                name,
                index: Some(index),
            };
            Ok(self.ast.alloc(kind, token.span().to(end.span())))
        } else {
            let kind = NodeKind::Id { name, index: None };
            Ok(self.ast.alloc(kind, token.span()))
        }
    }

    fn parse_args(&mut self) -> Result<Option<NodeId>> {
        if self.is(TokenKind::RParen) {
            return Ok(None);
        }
        let mut head = None;
        let mut last = None;
        loop {
            let arg = self.parse_expr()?;
            self.chain(&mut head, &mut last, arg);
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        Ok(head)
    }
}

impl Parser<'_, '_> {
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Parser<'src, 'tok> {
        assert!(tokens.is_empty());
        lexer::lex(src, tokens);
        let tokens: &'tok [Token] = tokens;

        let mut p = Parser {
            src,
            tokens,
            ast: Ast::with_capacity(tokens.len()),
            cursor: 0,
            last_span: Span::new_of_length(0, 0),
            errors: Vec::with_capacity(8),
        };
        p.report_lexical_errors();
        p.setup();
        p
    }

    /// Reports every error token produced by the lexer. The parser then
    /// treats them as skippable so syntax analysis continues best-effort.
    fn report_lexical_errors(&mut self) {
        let tokens = self.tokens;
        for token in tokens {
            if token.kind.is_error() {
                self.errors.push(token.span().wrap(Error::Lexer(token.kind)));
            }
        }
    }

    fn error(&mut self, error: Spanned<Error>) {
        self.errors.push(error);
    }

    /// Appends `id` to the sibling chain rooted at `head`.
    fn chain(&mut self, head: &mut Option<NodeId>, last: &mut Option<NodeId>, id: NodeId) {
        match last {
            Some(prev) => self.ast[*prev].next = Some(id),
            None => *head = Some(id),
        }
        *last = Some(id);
    }

    fn skippable(&self, token: Token) -> bool {
        token.kind.is_trivia() || token.kind.is_error()
    }

    /// Skips any leading trivia.
    fn setup(&mut self) {
        while self.skippable(self.peek_raw()) {
            self.cursor += 1;
        }
    }

    fn peek_raw(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => *token,
            None => Token::eof_for(self.src),
        }
    }

    /// Returns the current (non-trivia) token.
    fn peek(&self) -> Token {
        self.peek_raw()
    }

    /// Returns the current token and advances past it, skipping trivia.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        self.last_span = c.span();
        while {
            self.cursor += 1;
            self.skippable(self.peek_raw())
        } {}
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning
    /// true. If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one. If not,
    /// records an error without advancing.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            self.advance();
            Ok(c)
        } else {
            self.error(c.span().wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }));
            Err(())
        }
    }

    /// Returns true while the current token does *not* match one of the
    /// provided ones. [`TokenKind::Eof`] is implicitly included in the list.
    fn except(&self, except: impl IntoIterator<Item = TokenKind>) -> bool {
        let c = self.peek();
        for e in except {
            if c.kind == e {
                return false;
            }
        }
        c.kind != TokenKind::Eof
    }

    /// Panic-mode recovery: on failure, skip exactly one token and retry the
    /// same grammar point. Stops (returning `None`) at end of input or at any
    /// of the `stop` tokens.
    fn recover<T>(
        &mut self,
        stop: &[TokenKind],
        mut f: impl FnMut(&mut Self) -> Result<T>,
    ) -> Option<T> {
        loop {
            if let Ok(val) = f(self) {
                break Some(val);
            }
            let c = self.peek().kind;
            if c == TokenKind::Eof || stop.contains(&c) {
                break None;
            }
            self.advance();
            let c = self.peek().kind;
            if c == TokenKind::Eof || stop.contains(&c) {
                break None;
            }
        }
    }
}

fn binop_of(kind: TokenKind) -> BinOp {
    match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::Less => BinOp::Lt,
        TokenKind::LessEq => BinOp::Le,
        TokenKind::Greater => BinOp::Gt,
        TokenKind::GreaterEq => BinOp::Ge,
        TokenKind::EqEq => BinOp::Eq,
        TokenKind::NotEq => BinOp::Ne,
        _ => unreachable!("not a binary operator token"),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    ExpectedTypeAtom {
        actual: TokenKind,
    },
    UnexpectedTokenInDecl {
        token: TokenKind,
    },
    UnexpectedTokenInStmt {
        token: TokenKind,
    },
    UnexpectedTokenInExpr {
        token: TokenKind,
    },
    InvalidAssignmentTarget,
    InvalidArraySize(i32),
    ParseInt,
    /// A token kind which holds the [`TokenKind::is_error`] property.
    Lexer(TokenKind),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Error::*;
        match self {
            Unexpected { actual, expected } => {
                write!(f, "expected token {expected:?}, but got {actual:?}")
            }
            ExpectedTypeAtom { actual } => {
                write!(f, "expected a type specifier, but got {actual:?}")
            }
            UnexpectedTokenInDecl { token } => {
                write!(f, "unexpected token {token:?} in declaration")
            }
            UnexpectedTokenInStmt { token } => {
                write!(f, "unexpected token {token:?} in statement")
            }
            UnexpectedTokenInExpr { token } => {
                write!(f, "unexpected token {token:?} in expression")
            }
            InvalidAssignmentTarget => write!(f, "invalid assignment target"),
            InvalidArraySize(size) => write!(f, "invalid array size {size}"),
            ParseInt => write!(f, "integer literal out of range"),
            Lexer(TokenKind::ErrorUnexpectedChar) => write!(f, "unexpected character"),
            Lexer(TokenKind::ErrorLoneBang) => write!(f, "expected `=` after `!`"),
            Lexer(TokenKind::ErrorUnclosedComment) => write!(f, "unterminated block comment"),
            Lexer(_) => unreachable!("not error token"),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use crate::util::{fmt, test_utils::format_errors};

    #[track_caller]
    fn check_program(src: &str, expected_tree: &str, expected_errors: &[&str]) {
        let tokens = &mut Vec::with_capacity(256);
        let (program, errors) = match super::parse_program(src, tokens) {
            Ok(program) => (program, vec![]),
            Err((program, errors)) => (program, errors),
        };
        let tree = fmt::print_program_string(&program);
        assert_eq!(format_errors(src, &errors), expected_errors);
        assert_eq!(tree.trim(), expected_tree.trim());
    }

    #[track_caller]
    fn check_expr(src: &str, expected_tree: &str, expected_errors: &[&str]) {
        let tokens = &mut Vec::with_capacity(256);
        let ((ast, root), errors) = match super::parse_expr(src, tokens) {
            Ok(out) => (out, vec![]),
            Err((out, errors)) => (out, errors),
        };
        let tree = root.map_or_else(String::new, |root| fmt::print_node_string(&ast, root));
        assert_eq!(format_errors(src, &errors), expected_errors);
        assert_eq!(tree.trim(), expected_tree.trim());
    }

    #[test]
    fn precedence_and_grouping() {
        check_expr(
            "(1 * 2 + 3) - (1 + 2 * 3)",
            indoc! {"
                binary Sub (1..24)
                  binary Add (1..10)
                    binary Mul (1..6)
                      num 1 (1..2)
                      num 2 (5..6)
                    num 3 (9..10)
                  binary Add (15..24)
                    num 1 (15..16)
                    binary Mul (19..24)
                      num 2 (19..20)
                      num 3 (23..24)
            "},
            &[],
        );
    }

    #[test]
    fn assignment_pass_down() {
        check_expr(
            "x = y + 1",
            indoc! {"
                assign (0..9)
                  ident x (0..1)
                  binary Add (4..9)
                    ident y (4..5)
                    num 1 (8..9)
            "},
            &[],
        );
    }

    #[test]
    fn indexed_assignment_target() {
        check_expr(
            "a[i+1] = 2",
            indoc! {"
                assign (0..10)
                  index a (0..6)
                    binary Add (2..5)
                      ident i (2..3)
                      num 1 (4..5)
                  num 2 (9..10)
            "},
            &[],
        );
    }

    #[test]
    fn call_is_not_an_assignment_target() {
        check_expr("f() = 1", "", &["1:1: invalid assignment target"]);
    }

    #[test]
    fn call_with_arguments() {
        check_expr(
            "f(x, g())",
            indoc! {"
                call f (0..9)
                  ident x (2..3)
                  call g (5..8)
            "},
            &[],
        );
    }

    #[test]
    fn relational_does_not_chain() {
        // The second `<` is simply not consumed by the expression grammar.
        check_expr(
            "a < b < c",
            indoc! {"
                binary Lt (0..5)
                  ident a (0..1)
                  ident b (4..5)
            "},
            &[],
        );
    }

    #[test]
    fn pass_down_through_every_level() {
        check_expr(
            "a[2] * 3 < b",
            indoc! {"
                binary Lt (0..12)
                  binary Mul (0..8)
                    index a (0..4)
                      num 2 (2..3)
                    num 3 (7..8)
                  ident b (11..12)
            "},
            &[],
        );
    }

    #[test]
    fn unexpected_token_in_expr() {
        check_expr("x = ;", "", &["1:5: unexpected token Semicolon in expression"]);
    }

    #[test]
    fn simple_program() {
        check_program(
            "void main(void) { int x; x = 2 + 3 * 4; output(x); }",
            indoc! {"
                function main: void
                  block
                    scalar x: int
                    assign (25..38)
                      ident x (25..26)
                      binary Add (29..38)
                        num 2 (29..30)
                        binary Mul (33..38)
                          num 3 (33..34)
                          num 4 (37..38)
                    call output (40..49)
                      ident x (47..48)
            "},
            &[],
        );
    }

    #[test]
    fn function_with_parameters() {
        check_program(
            "int f(int a, int b[]) { return a; }",
            indoc! {"
                function f: int
                  scalar a: int (param)
                  array b[] (param)
                  block
                    return
                      ident a (31..32)
            "},
            &[],
        );
    }

    #[test]
    fn globals_and_control_flow() {
        check_program(
            indoc! {"
                int g;
                int a[8];
                void main(void) {
                    while (g < 8) {
                        if (a[g] == 0) g = g + 1; else return;
                    }
                }
            "},
            indoc! {"
                scalar g: int
                array a[8]
                function main: void
                  block
                    while
                      binary Lt (46..51)
                        ident g (46..47)
                        num 8 (50..51)
                      block
                        if
                          binary Eq (67..76)
                            index a (67..71)
                              ident g (69..70)
                            num 0 (75..76)
                          assign (78..87)
                            ident g (78..79)
                            binary Add (82..87)
                              ident g (82..83)
                              num 1 (86..87)
                          return
            "},
            &[],
        );
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        check_program(
            "void main(void) { if (1) if (2) x = 1; else x = 2; }",
            indoc! {"
                function main: void
                  block
                    if
                      num 1 (22..23)
                      if
                        num 2 (29..30)
                        assign (32..37)
                          ident x (32..33)
                          num 1 (36..37)
                        assign (44..49)
                          ident x (44..45)
                          num 2 (48..49)
            "},
            &[],
        );
    }

    #[test]
    fn zero_array_size_is_a_parse_error() {
        check_program(
            "int a[0];",
            indoc! {"
                array a[0]
            "},
            &["1:7: invalid array size 0"],
        );
    }

    #[test]
    fn recovery_discovers_later_declarations() {
        check_program(
            "int x\nint y;\nvoid main(void) { }",
            indoc! {"
                function main: void
                  block
            "},
            &[
                "2:1: unexpected token Int in declaration",
                "2:5: expected a type specifier, but got Identifier",
                "2:6: expected a type specifier, but got Semicolon",
            ],
        );
    }

    #[test]
    fn recovery_within_a_block() {
        check_program(
            "void main(void) { x = ; y = 1; }",
            indoc! {"
                function main: void
                  block
                    assign (24..29)
                      ident y (24..25)
                      num 1 (28..29)
            "},
            &["1:23: unexpected token Semicolon in expression"],
        );
    }

    #[test]
    fn lexical_errors_are_reported() {
        check_program(
            "int $;",
            "",
            &[
                "1:5: unexpected character",
                "1:6: expected token Identifier, but got Semicolon",
            ],
        );
    }
}
