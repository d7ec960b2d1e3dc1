//! The parse AST.
//!
//! This crate does not contain a lexer or parser — those are external
//! collaborators. `ast` defines the node shapes the core consumes, and
//! is read-only once handed to `sema::analyze`. The small builder
//! functions at the bottom exist so tests (and any embedder that
//! already has a parsed tree in some other shape) can construct
//! `Program` values without going through a concrete parser.

/// Binary expression operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Product,
    Add,
    Sub,
    Mul,
    Div,
    Contraction,
    Transposition,
}

/// An expression node. `Brack` covers both tensor stacks (`[a, b]`)
/// and the integer/list-of-lists literals used as the right operand of
/// `Contraction`/`Transposition` — the grammar does not distinguish them
/// syntactically, so Sema tells them apart structurally.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(String),
    Integer(i64),
    Brack(Vec<Expr>),
    Paren(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// Whether a variable declaration is flagged as a pipeline input or
/// output. Unflagged variables carry `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoFlag {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Variable,
    Type,
}

/// `var[iable] <io>? id : typeExpr;` or `type id : typeExpr;`
#[derive(Debug, Clone)]
pub struct Decl {
    pub kind: DeclKind,
    pub id: String,
    pub type_expr: Expr,
    pub io: Option<IoFlag>,
}

/// `id = expr;`
#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemPosition {
    First,
    Last,
}

/// Per-element loop directive. Validated by Sema but not consumed by
/// either code generation path.
#[derive(Debug, Clone)]
pub struct ElemDirect {
    pub position: ElemPosition,
    pub dim: i64,
    pub symbols: Vec<String>,
}

/// A top-level item: a declaration, an assignment, or an element
/// directive, in source order.
#[derive(Debug, Clone)]
pub enum Item {
    Decl(Decl),
    Stmt(Stmt),
    ElemDirect(ElemDirect),
}

/// The root AST node.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    pub fn decls(&self) -> impl Iterator<Item = &Decl> {
        self.items.iter().filter_map(|it| match it {
            Item::Decl(d) => Some(d),
            _ => None,
        })
    }

    pub fn stmts(&self) -> impl Iterator<Item = &Stmt> {
        self.items.iter().filter_map(|it| match it {
            Item::Stmt(s) => Some(s),
            _ => None,
        })
    }
}

// --- construction helpers, used by tests and by embedders building a
// `Program` directly from some other front-end's syntax tree ---

pub fn id(name: impl Into<String>) -> Expr {
    Expr::Identifier(name.into())
}

pub fn int(value: i64) -> Expr {
    Expr::Integer(value)
}

pub fn brack(members: Vec<Expr>) -> Expr {
    Expr::Brack(members)
}

pub fn paren(e: Expr) -> Expr {
    Expr::Paren(Box::new(e))
}

pub fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
}

/// `[d0, d1, ...]` as an integer-list type expression.
pub fn dims(values: impl IntoIterator<Item = i64>) -> Expr {
    brack(values.into_iter().map(int).collect())
}

/// `[[i0, j0, ...], [i1, j1, ...], ...]`, the right operand of a
/// contraction or transposition.
pub fn index_lists(lists: impl IntoIterator<Item = Vec<i64>>) -> Expr {
    brack(
        lists
            .into_iter()
            .map(|l| dims(l))
            .collect(),
    )
}

pub fn var_decl(name: impl Into<String>, type_expr: Expr, io: Option<IoFlag>) -> Decl {
    Decl {
        kind: DeclKind::Variable,
        id: name.into(),
        type_expr,
        io,
    }
}

pub fn type_decl(name: impl Into<String>, type_expr: Expr) -> Decl {
    Decl {
        kind: DeclKind::Type,
        id: name.into(),
        type_expr,
        io: None,
    }
}

pub fn stmt(name: impl Into<String>, expr: Expr) -> Stmt {
    Stmt {
        id: name.into(),
        expr,
    }
}
