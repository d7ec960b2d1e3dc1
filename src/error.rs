//! Crate-wide error types.
//!
//! A `#[derive(Fail)]` enum with `#[cause]`-wrapped sources and `From`
//! impls so passes can propagate with `?`. User-facing diagnostics
//! (`SemaError`) and unreachable-on-well-formed-input invariants
//! (`InternalError`) are kept as distinct types, and joined under
//! `CoreError` for the pipeline's public entry points.
use failure::Fail;

/// Diagnostics produced by semantic analysis. Each variant names the
/// offending symbol or expression.
#[derive(Debug, Fail, PartialEq, Eq, Clone)]
pub enum SemaError {
    #[fail(display = "symbol '{}' already declared", name)]
    DuplicateDeclaration { name: String },

    #[fail(display = "use of undeclared identifier '{}'", name)]
    UndeclaredIdentifier { name: String },

    #[fail(
        display = "assignment to '{}' has mismatched type: expected {:?}, found {:?}",
        name, expected, found
    )]
    AssignmentTypeMismatch {
        name: String,
        expected: Vec<u32>,
        found: Vec<u32>,
    },

    #[fail(display = "right-hand side of contraction is not a list of lists")]
    ContractionIndexNotList,

    #[fail(display = "contraction over an empty outer index list")]
    EmptyContractionList,

    #[fail(display = "index {} appears more than once in a contraction", index)]
    DuplicateContractionIndex { index: usize },

    #[fail(
        display = "incompatible dimensions in contraction index list: dim({})={} but dim({})={}",
        first_index, first_dim, other_index, other_dim
    )]
    IncompatibleContractionDims {
        first_index: usize,
        first_dim: u32,
        other_index: usize,
        other_dim: u32,
    },

    #[fail(display = "tensor stack cannot be empty")]
    EmptyStack,

    #[fail(
        display = "type mismatch in tensor stack: member 0 has type {:?}, member {} has type {:?}",
        expected, index, found
    )]
    StackTypeMismatch {
        expected: Vec<u32>,
        index: usize,
        found: Vec<u32>,
    },

    #[fail(display = "invalid type expression: '{}' is neither a named type nor an integer list", name)]
    InvalidTypeExpr { name: String },

    #[fail(display = "element directive references undeclared symbol '{}'", name)]
    ElemDirectUndeclaredSymbol { name: String },

    #[fail(display = "element directive dimension must be a positive integer, found {}", value)]
    ElemDirectInvalidDimension { value: i64 },
}

/// Invariant violations that should not be reachable on well-formed
/// input. Surfaced distinctly from `SemaError` so callers can tell a
/// user-facing mistake from a
/// compiler bug.
#[derive(Debug, Fail, PartialEq, Eq, Clone)]
pub enum InternalError {
    #[fail(display = "contraction tuple has {} indices, only pairs are supported", len)]
    NonPairContraction { len: usize },

    #[fail(display = "contraction over a non-product sub-expression")]
    ContractionOverNonProduct,

    #[fail(display = "leg {} of node '{}' already has an edge attached", leg, node)]
    DuplicateEdgeAttachment { node: String, leg: usize },

    #[fail(display = "no edge found between consecutive sequence nodes '{}' and '{}'", src, tgt)]
    MissingSequenceEdge { src: String, tgt: String },

    #[fail(display = "attempted to erase node '{}' which still has attached edges", node)]
    EraseNodeWithEdges { node: String },

    #[fail(display = "mismatched left/right index counts in contraction: {} vs {}", left, right)]
    MismatchedIndexCounts { left: usize, right: usize },
}

/// The union of everything a pipeline entry point can fail with.
#[derive(Debug, Fail, Clone)]
pub enum CoreError {
    #[fail(display = "{}", _0)]
    Sema(#[cause] SemaError),
    #[fail(display = "{}", _0)]
    Internal(#[cause] InternalError),
}

impl From<SemaError> for CoreError {
    fn from(e: SemaError) -> Self {
        CoreError::Sema(e)
    }
}

impl From<InternalError> for CoreError {
    fn from(e: InternalError) -> Self {
        CoreError::Internal(e)
    }
}

pub type SemaResult<T> = Result<T, SemaError>;
pub type CoreResult<T> = Result<T, CoreError>;
