// program      := declaration*
// declaration  := type ID ( ';' | '[' NUM ']' ';' | '(' params ')' block )
// params       := 'void' | param (',' param)*
// param        := type ID ('[' ']')?
// block        := '{' localDecl* statement* '}'
// statement    := if | while | return | block | exprStmt
// expr         := (lvalue '=' expr) | relExpr
// relExpr      := addExpr (relOp addExpr)?          -- no chaining
// addExpr      := term (('+'|'-') term)*
// term         := factor (('*'|'/') factor)*
// factor       := ID ('[' expr ']')? | ID '(' args ')' | '(' expr ')' | NUM

use std::{
    num::NonZeroU32,
    ops::{Index, IndexMut},
    rc::Rc,
};

use crate::token::Span;

pub type Name = Rc<str>;

/// A handle to a node inside an [`Ast`] arena.
///
/// All cross-node relations (children, sibling chains and the resolved
/// declaration back-reference) are stored as handles, never as owning
/// pointers: a use site and its declaration can both be reached from each
/// other through scope traversal, but neither owns the other's lifetime.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    fn from_index(index: usize) -> NodeId {
        let raw = u32::try_from(index + 1).expect("ast arena out of capacity");
        // SAFETY: never zero due to the +1.
        NodeId(unsafe { NonZeroU32::new_unchecked(raw) })
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The syntax tree, an arena of nodes.
///
/// The parser creates it; resolver, type checker and code generator annotate
/// nodes in place (through [`Marks`]) without ever restructuring the tree.
#[derive(Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn with_capacity(capacity: usize) -> Ast {
        Ast {
            nodes: Vec::with_capacity(capacity),
        }
    }

    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            kind,
            span,
            next: None,
            marks: Marks::default(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over every node handle, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId::from_index)
    }

    /// Iterates over a sibling chain, starting at `first`.
    pub fn siblings(&self, first: Option<NodeId>) -> Siblings<'_> {
        Siblings {
            ast: self,
            current: first,
        }
    }
}

impl Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for Ast {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}

/// A parsed translation unit: the arena plus the head of the top-level
/// declaration chain.
#[derive(Default)]
pub struct Program {
    pub ast: Ast,
    pub decls: Option<NodeId>,
}

pub struct Siblings<'ast> {
    ast: &'ast Ast,
    current: Option<NodeId>,
}

impl Iterator for Siblings<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.ast[id].next;
        Some(id)
    }
}

pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    /// Next statement/declaration in the enclosing sequence, if any.
    pub next: Option<NodeId>,
    pub marks: Marks,
}

impl Node {
    pub fn name(&self) -> Option<&Name> {
        use NodeKind::*;
        match &self.kind {
            ScalarDecl { name, .. }
            | ArrayDecl { name, .. }
            | FnDecl { name, .. }
            | Call { name, .. }
            | Id { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_decl(&self) -> bool {
        use NodeKind::*;
        matches!(
            self.kind,
            ScalarDecl { .. } | ArrayDecl { .. } | FnDecl { .. }
        )
    }

    pub fn is_param(&self) -> bool {
        use NodeKind::*;
        match self.kind {
            ScalarDecl { is_param, .. } | ArrayDecl { is_param, .. } => is_param,
            _ => false,
        }
    }
}

/// Annotations filled in by the phases that follow parsing. The parser leaves
/// all of them at their defaults.
#[derive(Default)]
pub struct Marks {
    /// Resolved declaration for identifier and call uses; for `return`
    /// statements, the enclosing function. A lookup relation, not ownership.
    pub decl: Option<NodeId>,
    /// Resolved type tag, assigned by the type checker.
    pub ty: Option<Ty>,
    /// Whether a scalar/array declaration lives in the global region. Set by
    /// the post-resolution shallow pass over the top-level chain.
    pub is_global: bool,
    /// Slot offset within the global region or function frame; for function
    /// declarations, the entry address in the instruction stream.
    pub offset: i32,
    /// For function declarations: frame size of the locals, parameters
    /// excluded.
    pub local_size: i32,
}

pub enum NodeKind {
    // Declarations
    ScalarDecl {
        name: Name,
        /// Declared atom type. `void x;` parses; the type checker rejects any
        /// use of such a variable.
        ty: Ty,
        is_param: bool,
    },
    ArrayDecl {
        name: Name,
        /// Declared element count (> 0); parameters carry 0, their size is
        /// the caller's business.
        size: i32,
        is_param: bool,
    },
    FnDecl {
        name: Name,
        ret: Ty,
        /// Head of the parameter declaration chain.
        params: Option<NodeId>,
        body: Option<NodeId>,
    },

    // Statements
    If {
        cond: NodeId,
        then: Option<NodeId>,
        otherwise: Option<NodeId>,
    },
    While {
        cond: NodeId,
        body: Option<NodeId>,
    },
    Return {
        value: Option<NodeId>,
    },
    Call {
        name: Name,
        /// Head of the argument expression chain.
        args: Option<NodeId>,
    },
    Compound {
        /// Head of the local declaration chain.
        decls: Option<NodeId>,
        /// Head of the statement chain.
        stmts: Option<NodeId>,
    },

    // Expressions
    Binary {
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Num(i32),
    Id {
        name: Name,
        /// Subscript expression; `None` for a bare identifier.
        index: Option<NodeId>,
    },
    Assign {
        /// Always an `Id` node (plain or indexed).
        target: NodeId,
        value: NodeId,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    /// Relational and equality operators; they lower to a compare-and-branch
    /// sequence producing a canonical 0/1.
    pub fn is_relational(self) -> bool {
        use BinOp::*;
        matches!(self, Lt | Le | Gt | Ge | Eq | Ne)
    }
}

/// Resolved type tag. The language has no boolean values: comparisons
/// produce `Int` 0/1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    Void,
    Int,
    Array,
    Function,
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Ty::Void => "void",
            Ty::Int => "int",
            Ty::Array => "int[]",
            Ty::Function => "function",
        };
        f.write_str(name)
    }
}
