//! Semantic analysis.
//!
//! Walks a parsed `ast::Program` top to bottom, in declaration order,
//! and produces a `SemaOutput`: an interned type for every declared
//! symbol, a type recorded for every expression actually reachable as
//! a tensor value, and the input/output/named-type bookkeeping the
//! later passes need.
//!
//! Expressions are keyed in `expr_types` by their address
//! (`*const ast::Expr`) rather than by a synthetic id — the AST is
//! handed to us by reference and never mutated or moved during
//! analysis, so pointer identity is stable for the life of the call.
use crate::ast::{self, BinOp, Expr, Item};
use crate::error::SemaError;
use crate::indexlist::list_of_lists;
use crate::symbol::{Symbol, SymbolKind, SymbolTable};
use crate::types::{Type, TypeInterner};
use fxhash::{FxHashMap, FxHashSet};
use log::trace;

/// Which end of the iteration order an `elem` directive names; carried
/// through unchanged from the AST.
pub use ast::ElemPosition;

/// A validated `elem` directive. Checked for well-formedness but not
/// consumed by either code generation path — it is recorded here
/// purely so a caller can inspect it or re-validate downstream tooling
/// against it.
#[derive(Debug, Clone)]
pub struct ElemInfo {
    pub position: ElemPosition,
    pub dim: u32,
    pub symbols: FxHashSet<String>,
}

/// Everything semantic analysis produces for one compilation unit.
pub struct SemaOutput<'a> {
    pub interner: TypeInterner,
    pub symbols: SymbolTable,
    expr_types: FxHashMap<*const Expr, Type>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub named_types: FxHashMap<String, Type>,
    pub elem_info: Option<ElemInfo>,
    _program: std::marker::PhantomData<&'a ast::Program>,
}

impl<'a> SemaOutput<'a> {
    /// The type recorded for `expr`, if `expr` was visited as a tensor
    /// value. Literal index lists (the right operand of a contraction
    /// or transposition) are never visited this way and have no entry
    /// here — they are not tensors.
    pub fn type_of(&self, expr: &'a Expr) -> Option<&Type> {
        self.expr_types.get(&(expr as *const Expr))
    }
}

struct Analyzer {
    interner: TypeInterner,
    symbols: SymbolTable,
    expr_types: FxHashMap<*const Expr, Type>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    named_types: FxHashMap<String, Type>,
    elem_info: Option<ElemInfo>,
}

pub fn analyze(program: &ast::Program) -> Result<SemaOutput<'_>, SemaError> {
    let mut a = Analyzer {
        interner: TypeInterner::new(),
        symbols: SymbolTable::new(),
        expr_types: FxHashMap::default(),
        inputs: Vec::new(),
        outputs: Vec::new(),
        named_types: FxHashMap::default(),
        elem_info: None,
    };

    for (decl_index, item) in program.items.iter().enumerate() {
        match item {
            Item::Decl(decl) => a.visit_decl(decl, decl_index)?,
            Item::Stmt(stmt) => a.visit_stmt(stmt)?,
            Item::ElemDirect(elem) => a.visit_elem_direct(elem)?,
        }
    }

    Ok(SemaOutput {
        interner: a.interner,
        symbols: a.symbols,
        expr_types: a.expr_types,
        inputs: a.inputs,
        outputs: a.outputs,
        named_types: a.named_types,
        elem_info: a.elem_info,
        _program: std::marker::PhantomData,
    })
}

impl Analyzer {
    fn visit_decl(&mut self, decl: &ast::Decl, decl_index: usize) -> Result<(), SemaError> {
        let ty = self.resolve_type_expr(&decl.type_expr)?;
        trace!("declaring '{}' as {:?}", decl.id, ty.dims());

        let kind = match decl.kind {
            ast::DeclKind::Variable => SymbolKind::Variable,
            ast::DeclKind::Type => SymbolKind::Type,
        };

        if !self
            .symbols
            .add_symbol(Symbol::new(kind, decl.id.clone(), ty.clone(), Some(decl_index)))
        {
            return Err(SemaError::DuplicateDeclaration {
                name: decl.id.clone(),
            });
        }

        match decl.kind {
            ast::DeclKind::Variable => match decl.io {
                Some(ast::IoFlag::Input) => self.inputs.push(decl.id.clone()),
                Some(ast::IoFlag::Output) => self.outputs.push(decl.id.clone()),
                None => {}
            },
            ast::DeclKind::Type => {
                self.named_types.insert(decl.id.clone(), ty);
            }
        }

        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &ast::Stmt) -> Result<(), SemaError> {
        let sym = self
            .symbols
            .get_symbol(&stmt.id)
            .ok_or_else(|| SemaError::UndeclaredIdentifier {
                name: stmt.id.clone(),
            })?;
        let declared = sym.ty().clone();

        let found = self.type_of_expr(&stmt.expr)?;
        if found != declared {
            return Err(SemaError::AssignmentTypeMismatch {
                name: stmt.id.clone(),
                expected: declared.dims().to_vec(),
                found: found.dims().to_vec(),
            });
        }
        trace!("assignment to '{}' checks out", stmt.id);
        Ok(())
    }

    fn visit_elem_direct(&mut self, elem: &ast::ElemDirect) -> Result<(), SemaError> {
        if elem.dim <= 0 {
            return Err(SemaError::ElemDirectInvalidDimension { value: elem.dim });
        }
        let mut syms = FxHashSet::default();
        for name in &elem.symbols {
            if self.symbols.get_symbol(name).is_none() {
                return Err(SemaError::ElemDirectUndeclaredSymbol { name: name.clone() });
            }
            syms.insert(name.clone());
        }
        self.elem_info = Some(ElemInfo {
            position: elem.position,
            dim: elem.dim as u32,
            symbols: syms,
        });
        Ok(())
    }

    /// A type expression is either a named type identifier or a
    /// literal list of positive dimensions.
    fn resolve_type_expr(&mut self, expr: &Expr) -> Result<Type, SemaError> {
        match expr {
            Expr::Identifier(name) => {
                if let Some(ty) = self.named_types.get(name) {
                    return Ok(ty.clone());
                }
                Err(SemaError::InvalidTypeExpr { name: name.clone() })
            }
            Expr::Brack(members) => {
                let mut dims = Vec::with_capacity(members.len());
                for m in members {
                    match m {
                        Expr::Integer(v) if *v > 0 => dims.push(*v as u32),
                        _ => {
                            return Err(SemaError::InvalidTypeExpr {
                                name: "<list>".to_string(),
                            })
                        }
                    }
                }
                Ok(self.interner.get_or_create(dims))
            }
            _ => Err(SemaError::InvalidTypeExpr {
                name: "<expr>".to_string(),
            }),
        }
    }

    /// Types `expr` as a tensor value, recording the result in
    /// `expr_types`. Does not recurse into the right-hand side of a
    /// `Contraction`/`Transposition`, which is index data rather than a
    /// tensor expression and is parsed separately by
    /// `integer_list`/`list_of_lists`.
    fn type_of_expr(&mut self, expr: &Expr) -> Result<Type, SemaError> {
        let ty = match expr {
            Expr::Identifier(name) => self
                .symbols
                .get_symbol(name)
                .map(|s| s.ty().clone())
                .ok_or_else(|| SemaError::UndeclaredIdentifier { name: name.clone() })?,
            Expr::Integer(_) => self.interner.scalar(),
            Expr::Paren(inner) => self.type_of_expr(inner)?,
            Expr::Brack(members) => self.type_of_stack(members)?,
            Expr::Binary(op, lhs, rhs) => self.type_of_binary(*op, lhs, rhs)?,
        };
        self.expr_types.insert(expr as *const Expr, ty.clone());
        Ok(ty)
    }

    fn type_of_stack(&mut self, members: &[Expr]) -> Result<Type, SemaError> {
        if members.is_empty() {
            return Err(SemaError::EmptyStack);
        }
        let first = self.type_of_expr(&members[0])?;
        for (index, m) in members.iter().enumerate().skip(1) {
            let t = self.type_of_expr(m)?;
            if t != first {
                return Err(SemaError::StackTypeMismatch {
                    expected: first.dims().to_vec(),
                    index,
                    found: t.dims().to_vec(),
                });
            }
        }
        let mut dims = vec![members.len() as u32];
        dims.extend_from_slice(first.dims());
        Ok(self.interner.get_or_create(dims))
    }

    fn type_of_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<Type, SemaError> {
        match op {
            BinOp::Product => {
                let tl = self.type_of_expr(lhs)?;
                let tr = self.type_of_expr(rhs)?;
                let mut dims = tl.dims().to_vec();
                dims.extend_from_slice(tr.dims());
                Ok(self.interner.get_or_create(dims))
            }
            BinOp::Add | BinOp::Sub => {
                let tl = self.type_of_expr(lhs)?;
                let tr = self.type_of_expr(rhs)?;
                if tl != tr {
                    return Err(SemaError::AssignmentTypeMismatch {
                        name: "<binary expression>".to_string(),
                        expected: tl.dims().to_vec(),
                        found: tr.dims().to_vec(),
                    });
                }
                Ok(tl)
            }
            // Mul with a scalar left operand (and symmetrically Div with
            // a scalar right operand) is well-typed against an arbitrary
            // other side; DirectCodeGen/GraphCodeGen lower this case to
            // ScalarMul/ScalarDiv instead of Mul/Div.
            BinOp::Mul => {
                let tl = self.type_of_expr(lhs)?;
                if self.interner.is_scalar(&tl) {
                    return self.type_of_expr(rhs);
                }
                let tr = self.type_of_expr(rhs)?;
                if tl != tr {
                    return Err(SemaError::AssignmentTypeMismatch {
                        name: "<binary expression>".to_string(),
                        expected: tl.dims().to_vec(),
                        found: tr.dims().to_vec(),
                    });
                }
                Ok(tl)
            }
            BinOp::Div => {
                let tl = self.type_of_expr(lhs)?;
                let tr = self.type_of_expr(rhs)?;
                if self.interner.is_scalar(&tr) {
                    return Ok(tl);
                }
                if tl != tr {
                    return Err(SemaError::AssignmentTypeMismatch {
                        name: "<binary expression>".to_string(),
                        expected: tl.dims().to_vec(),
                        found: tr.dims().to_vec(),
                    });
                }
                Ok(tl)
            }
            BinOp::Contraction => self.type_of_contraction(lhs, rhs),
            BinOp::Transposition => self.type_of_transposition(lhs, rhs),
        }
    }

    /// `t . rhs`. The right operand must parse as a (non-empty) list of
    /// integer lists; anything else is the `ContractionIndexNotList`
    /// user diagnostic. There is no implicit "contract last axis
    /// against first" fallback.
    fn type_of_contraction(&mut self, lhs: &Expr, rhs: &Expr) -> Result<Type, SemaError> {
        let tl = self.type_of_expr(lhs)?;

        let lists = list_of_lists(rhs).ok_or(SemaError::ContractionIndexNotList)?;
        if lists.is_empty() {
            return Err(SemaError::EmptyContractionList);
        }
        let mut seen = FxHashSet::default();
        let mut removed: Vec<usize> = Vec::new();
        for list in &lists {
            if list.is_empty() {
                return Err(SemaError::EmptyContractionList);
            }
            let first_index = list[0];
            let first_dim = *tl.dims().get(first_index).ok_or(SemaError::IncompatibleContractionDims {
                first_index,
                first_dim: 0,
                other_index: first_index,
                other_dim: 0,
            })?;
            for &index in list {
                if !seen.insert(index) {
                    return Err(SemaError::DuplicateContractionIndex { index });
                }
                let dim = *tl.dims().get(index).ok_or(SemaError::IncompatibleContractionDims {
                    first_index,
                    first_dim,
                    other_index: index,
                    other_dim: 0,
                })?;
                if dim != first_dim {
                    return Err(SemaError::IncompatibleContractionDims {
                        first_index,
                        first_dim,
                        other_index: index,
                        other_dim: dim,
                    });
                }
                removed.push(index);
            }
        }
        removed.sort_unstable();
        let mut dims = tl.dims().to_vec();
        for (removed_so_far, index) in removed.into_iter().enumerate() {
            dims.remove(index - removed_so_far);
        }
        Ok(self.interner.get_or_create(dims))
    }

    /// `t .> rhs` (transposition): `rhs` is a list of index pairs into
    /// `t`'s dimension vector; the result swaps each pair.
    fn type_of_transposition(&mut self, lhs: &Expr, rhs: &Expr) -> Result<Type, SemaError> {
        let tl = self.type_of_expr(lhs)?;
        let lists = list_of_lists(rhs).ok_or(SemaError::ContractionIndexNotList)?;
        let mut dims = tl.dims().to_vec();
        for pair in &lists {
            if pair.len() != 2 {
                return Err(SemaError::ContractionIndexNotList);
            }
            let (i, j) = (pair[0], pair[1]);
            if i >= dims.len() || j >= dims.len() {
                return Err(SemaError::IncompatibleContractionDims {
                    first_index: i,
                    first_dim: 0,
                    other_index: j,
                    other_dim: 0,
                });
            }
            dims.swap(i, j);
        }
        Ok(self.interner.get_or_create(dims))
    }
}
