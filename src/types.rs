//! Interned tensor types.
//!
//! A `TensorType` is an ordered sequence of positive dimensions; rank 0
//! is the unique scalar type. Types are interned by structural equality
//! over their dimension vector, and compared by pointer identity once
//! interned, using `Rc` rather than a raw-pointer-owning table.
use failure::Fail;
use fxhash::FxHashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Debug)]
struct TensorTypeData {
    dims: Vec<u32>,
}

/// A structurally-interned tensor type. Cloning is cheap (`Rc` bump);
/// equality and hashing are by identity of the interned representative.
#[derive(Debug, Clone)]
pub struct Type(Rc<TensorTypeData>);

impl Type {
    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.dims.len()
    }

    /// The dimension vector.
    pub fn dims(&self) -> &[u32] {
        &self.0.dims
    }

    pub fn dim(&self, index: usize) -> u32 {
        self.0.dims[index]
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

/// Owns every `Type` created during a compilation unit.
pub struct TypeInterner {
    by_dims: FxHashMap<Vec<u32>, Type>,
    creation_order: Vec<Type>,
    scalar: Type,
}

impl TypeInterner {
    pub fn new() -> Self {
        let scalar = Type(Rc::new(TensorTypeData { dims: vec![] }));
        let mut by_dims = FxHashMap::default();
        by_dims.insert(vec![], scalar.clone());
        TypeInterner {
            by_dims,
            creation_order: vec![scalar.clone()],
            scalar,
        }
    }

    /// Returns the unique scalar type (rank 0).
    pub fn scalar(&self) -> Type {
        self.scalar.clone()
    }

    pub fn is_scalar(&self, t: &Type) -> bool {
        *t == self.scalar
    }

    /// Interns `dims`, returning the canonical `Type` for that
    /// dimension sequence. Two calls with equal `dims` return `Type`s
    /// that compare equal.
    pub fn get_or_create(&mut self, dims: Vec<u32>) -> Type {
        if let Some(t) = self.by_dims.get(&dims) {
            return t.clone();
        }
        let t = Type(Rc::new(TensorTypeData { dims: dims.clone() }));
        self.by_dims.insert(dims, t.clone());
        self.creation_order.push(t.clone());
        t
    }

    /// Iterates over every interned type, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.creation_order.iter()
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Raised wherever Sema requires structural type equality.
#[derive(Debug, Fail, Clone, PartialEq, Eq)]
#[fail(display = "type mismatch: expected {:?}, found {:?}", expected, found)]
pub struct TypeError {
    pub expected: Vec<u32>,
    pub found: Vec<u32>,
}

impl TypeError {
    pub fn check_equals(expected: &Type, found: &Type) -> Result<(), TypeError> {
        if expected == found {
            Ok(())
        } else {
            Err(TypeError {
                expected: expected.dims().to_vec(),
                found: found.dims().to_vec(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_is_rank_zero() {
        let interner = TypeInterner::new();
        assert_eq!(interner.scalar().rank(), 0);
        assert!(interner.is_scalar(&interner.scalar()));
    }

    #[test]
    fn interning_is_structural() {
        let mut interner = TypeInterner::new();
        let a = interner.get_or_create(vec![3, 4]);
        let b = interner.get_or_create(vec![3, 4]);
        assert_eq!(a, b);
        let c = interner.get_or_create(vec![4, 3]);
        assert_ne!(a, c);
    }

    #[test]
    fn creation_order_is_preserved() {
        let mut interner = TypeInterner::new();
        interner.get_or_create(vec![1]);
        interner.get_or_create(vec![2]);
        let dims: Vec<Vec<u32>> = interner.iter().map(|t| t.dims().to_vec()).collect();
        assert_eq!(dims, vec![vec![], vec![1], vec![2]]);
    }

    #[test]
    fn check_equals_reports_mismatch() {
        let mut interner = TypeInterner::new();
        let a = interner.get_or_create(vec![2, 3]);
        let b = interner.get_or_create(vec![2, 4]);
        assert!(TypeError::check_equals(&a, &a).is_ok());
        assert!(TypeError::check_equals(&a, &b).is_err());
    }
}
