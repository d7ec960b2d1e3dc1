//! Parses the two literal-list shapes the AST uses for non-tensor
//! operands: a flat list of non-negative integers, and a list of such
//! lists. Used on the right of `Contraction`/`Transposition` nodes by
//! `sema`, `direct_codegen` and `graph_codegen` alike.
use crate::ast::Expr;

/// Parses `expr` as a flat list of non-negative integers, if it is one.
pub fn integer_list(expr: &Expr) -> Option<Vec<usize>> {
    match expr {
        Expr::Brack(members) => members
            .iter()
            .map(|m| match m {
                Expr::Integer(v) if *v >= 0 => Some(*v as usize),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

/// Parses `expr` as a list of integer lists, if it is one.
pub fn list_of_lists(expr: &Expr) -> Option<Vec<Vec<usize>>> {
    match expr {
        Expr::Brack(members) => members.iter().map(integer_list).collect(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    #[test]
    fn parses_nested_lists() {
        let e = index_lists(vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(list_of_lists(&e), Some(vec![vec![1, 2], vec![3, 4]]));
    }

    #[test]
    fn rejects_non_list() {
        assert_eq!(list_of_lists(&id("a")), None);
        assert_eq!(integer_list(&id("a")), None);
    }

    #[test]
    fn rejects_negative_entries() {
        let e = dims(vec![1, -2]);
        assert_eq!(integer_list(&e), None);
    }
}
