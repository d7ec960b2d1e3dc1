//! The downstream `Emitter` interface: the sole point of contact with
//! a back end. Both code generators call these operations and these
//! alone; nothing in this crate knows what a back end does with the
//! names it hands back. A trait describing everything a target is
//! asked to do, plus one reference implementation usable in tests
//! without a real back end.
use crate::ast::IoFlag;

/// The element-wise operators an `Emitter::elementwise` call may be
/// asked to apply. `ScalarMul`/`ScalarDiv` are the scalar-broadcast
/// forms `direct_codegen`/`graph_codegen` select when one operand of a
/// `Mul`/`Div` is rank 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemOp {
    Add,
    Sub,
    Mul,
    Div,
    ScalarMul,
    ScalarDiv,
}

impl ElemOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ElemOp::Add => "+",
            ElemOp::Sub => "-",
            ElemOp::Mul => "*",
            ElemOp::Div => "/",
            ElemOp::ScalarMul => "*.",
            ElemOp::ScalarDiv => "/.",
        }
    }
}

/// Everything the core calls on a back end. Every
/// operation that produces a value takes the previously minted
/// temporary names of its operands and is handed the output name to
/// use — `graph_codegen` always calls `fresh_temp` first so the
/// `Emitter` itself never has to invent names.
pub trait Emitter {
    /// Introduces a variable. Called once per `Decl` before any
    /// assignment referencing it.
    fn declare_variable(&mut self, name: &str, dims: &[u32], io: Option<IoFlag>);
    /// `lhs = rhs`.
    fn assign(&mut self, lhs: &str, rhs: &str);
    /// Full outer product, no contraction: `out = a # b`.
    fn product(&mut self, out: &str, a: &str, b: &str);
    /// Tensor contraction over matched index lists; `a_idx`/`b_idx`
    /// are equal-length and index-paired positionally.
    fn contract(&mut self, out: &str, a: &str, a_idx: &[usize], b: &str, b_idx: &[usize]);
    /// Element-wise binary operation.
    fn elementwise(&mut self, out: &str, op: ElemOp, a: &str, b: &str);
    /// Stacks `members` along a new leading axis.
    fn stack(&mut self, out: &str, members: &[String]);
    /// Swaps each listed dimension pair of `a`.
    fn transposition(&mut self, out: &str, a: &str, pairs: &[(usize, usize)]);
    /// Mints a fresh, unique temporary name.
    fn fresh_temp(&mut self) -> String;
}

/// A reference `Emitter` that records every call as a human-readable
/// line instead of driving any real numerical back end — used by this
/// crate's own tests and as a template for a real one (a `numpy`- or
/// `theano`-flavored emitter would replace `record`'s formatting, not
/// the call sequence above it).
#[derive(Debug, Default)]
pub struct StringEmitter {
    pub log: Vec<String>,
    next_temp: usize,
}

impl StringEmitter {
    pub fn new() -> Self {
        StringEmitter::default()
    }

    fn record(&mut self, line: String) {
        self.log.push(line);
    }
}

impl Emitter for StringEmitter {
    fn declare_variable(&mut self, name: &str, dims: &[u32], io: Option<IoFlag>) {
        let flag = match io {
            Some(IoFlag::Input) => " input",
            Some(IoFlag::Output) => " output",
            None => "",
        };
        self.record(format!("declare{} {}: {:?}", flag, name, dims));
    }

    fn assign(&mut self, lhs: &str, rhs: &str) {
        self.record(format!("{} = {}", lhs, rhs));
    }

    fn product(&mut self, out: &str, a: &str, b: &str) {
        self.record(format!("{} = product({}, {})", out, a, b));
    }

    fn contract(&mut self, out: &str, a: &str, a_idx: &[usize], b: &str, b_idx: &[usize]) {
        self.record(format!(
            "{} = contract({}, {:?}, {}, {:?})",
            out, a, a_idx, b, b_idx
        ));
    }

    fn elementwise(&mut self, out: &str, op: ElemOp, a: &str, b: &str) {
        self.record(format!("{} = {} {} {}", out, a, op.symbol(), b));
    }

    fn stack(&mut self, out: &str, members: &[String]) {
        self.record(format!("{} = stack({:?})", out, members));
    }

    fn transposition(&mut self, out: &str, a: &str, pairs: &[(usize, usize)]) {
        self.record(format!("{} = transpose({}, {:?})", out, a, pairs));
    }

    fn fresh_temp(&mut self) -> String {
        let name = format!("__t{}", self.next_temp);
        self.next_temp += 1;
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_temp_is_unique_per_call() {
        let mut e = StringEmitter::new();
        assert_eq!(e.fresh_temp(), "__t0");
        assert_eq!(e.fresh_temp(), "__t1");
    }

    #[test]
    fn records_calls_as_readable_lines() {
        let mut e = StringEmitter::new();
        e.declare_variable("a", &[3], Some(IoFlag::Input));
        e.contract("c", "a", &[0], "b", &[0]);
        assert_eq!(e.log[0], "declare input a: [3]");
        assert_eq!(e.log[1], "c = contract(a, [0], b, [0])");
    }
}
