//! End-to-end tests, one per representative compilation scenario, built
//! directly against hand-constructed `ast::Program` values — this
//! crate has no parser of its own, so an integration test is the
//! closest thing to "feed the compiler a program" available here.
use tensorlang_core::ast::*;
use tensorlang_core::config::CompileOptions;
use tensorlang_core::emit::StringEmitter;
use tensorlang_core::{compile_direct, compile_via_network};

fn tail(log: &[String], n: usize) -> &[String] {
    &log[log.len() - n..]
}

#[test]
fn scalar_contraction_matches_on_both_pipelines() {
    let _ = env_logger::try_init();
    let program = Program {
        items: vec![
            Item::Decl(var_decl("a", dims(vec![3]), Some(IoFlag::Input))),
            Item::Decl(var_decl("b", dims(vec![3]), Some(IoFlag::Input))),
            Item::Decl(var_decl("c", dims(vec![]), Some(IoFlag::Output))),
            Item::Stmt(stmt(
                "c",
                bin(
                    BinOp::Contraction,
                    bin(BinOp::Product, id("a"), id("b")),
                    index_lists(vec![vec![0, 1]]),
                ),
            )),
        ],
    };

    let mut direct = StringEmitter::new();
    compile_direct(&program, CompileOptions::default(), &mut direct).unwrap();
    assert_eq!(
        tail(&direct.log, 2),
        [
            "__t0 = contract(a, [0], b, [0])".to_string(),
            "c = __t0".to_string(),
        ]
    );

    let mut network = StringEmitter::new();
    compile_via_network(&program, &mut network).unwrap();
    assert_eq!(
        tail(&network.log, 2),
        [
            "__t0 = contract(a, [0], b, [0])".to_string(),
            "c = __t0".to_string(),
        ]
    );
}

#[test]
fn matrix_contraction_rebalances_the_mixed_pair() {
    let _ = env_logger::try_init();
    let program = Program {
        items: vec![
            Item::Decl(var_decl("a", dims(vec![4, 5]), Some(IoFlag::Input))),
            Item::Decl(var_decl("b", dims(vec![5, 6]), Some(IoFlag::Input))),
            Item::Decl(var_decl("c", dims(vec![4, 6]), Some(IoFlag::Output))),
            Item::Stmt(stmt(
                "c",
                bin(
                    BinOp::Contraction,
                    bin(BinOp::Product, id("a"), id("b")),
                    index_lists(vec![vec![1, 2]]),
                ),
            )),
        ],
    };

    let mut emitter = StringEmitter::new();
    compile_direct(&program, CompileOptions::default(), &mut emitter).unwrap();
    assert_eq!(
        tail(&emitter.log, 2),
        [
            "__t0 = contract(a, [1], b, [0])".to_string(),
            "c = __t0".to_string(),
        ]
    );
}

#[test]
fn stack_of_plain_identifiers_becomes_indexed_assignments() {
    let _ = env_logger::try_init();
    let program = Program {
        items: vec![
            Item::Decl(var_decl("a", dims(vec![2]), None)),
            Item::Decl(var_decl("b", dims(vec![2]), None)),
            Item::Decl(var_decl("c", dims(vec![2, 2]), None)),
            Item::Stmt(stmt("c", brack(vec![id("a"), id("b")]))),
        ],
    };

    let mut emitter = StringEmitter::new();
    compile_direct(&program, CompileOptions::default(), &mut emitter).unwrap();
    assert_eq!(
        tail(&emitter.log, 2),
        ["c[0] = a".to_string(), "c[1] = b".to_string()]
    );
}

#[test]
fn stack_of_arithmetic_expressions_becomes_indexed_assignments() {
    let _ = env_logger::try_init();
    let program = Program {
        items: vec![
            Item::Decl(var_decl("a", dims(vec![2]), None)),
            Item::Decl(var_decl("b", dims(vec![2]), None)),
            Item::Decl(var_decl("c", dims(vec![2, 2]), None)),
            Item::Stmt(stmt(
                "c",
                brack(vec![
                    bin(BinOp::Add, id("a"), id("b")),
                    bin(BinOp::Sub, id("a"), id("b")),
                ]),
            )),
        ],
    };

    let mut emitter = StringEmitter::new();
    compile_direct(&program, CompileOptions::default(), &mut emitter).unwrap();
    assert_eq!(
        tail(&emitter.log, 4),
        [
            "__t0 = a + b".to_string(),
            "c[0] = __t0".to_string(),
            "__t1 = a - b".to_string(),
            "c[1] = __t1".to_string(),
        ]
    );
}

#[test]
fn three_tensor_chain_contracts_neighbours_before_the_far_pair() {
    let _ = env_logger::try_init();
    let program = Program {
        items: vec![
            Item::Decl(var_decl("a", dims(vec![2, 3]), Some(IoFlag::Input))),
            Item::Decl(var_decl("b", dims(vec![3, 4]), Some(IoFlag::Input))),
            Item::Decl(var_decl("c", dims(vec![4, 5]), Some(IoFlag::Input))),
            Item::Decl(var_decl("r", dims(vec![2, 5]), Some(IoFlag::Output))),
            Item::Stmt(stmt(
                "r",
                bin(
                    BinOp::Contraction,
                    bin(BinOp::Product, bin(BinOp::Product, id("a"), id("b")), id("c")),
                    index_lists(vec![vec![1, 2], vec![3, 4]]),
                ),
            )),
        ],
    };

    let mut emitter = StringEmitter::new();
    compile_via_network(&program, &mut emitter).unwrap();
    assert_eq!(
        tail(&emitter.log, 3),
        [
            "__t0 = contract(a, [1], b, [0])".to_string(),
            "__t1 = contract(__t0, [1], c, [0])".to_string(),
            "r = __t1".to_string(),
        ]
    );
}

#[test]
fn transposition_swaps_the_listed_dimension_pair() {
    let _ = env_logger::try_init();
    let program = Program {
        items: vec![
            Item::Decl(var_decl("a", dims(vec![2, 3, 4]), Some(IoFlag::Input))),
            Item::Decl(var_decl("b", dims(vec![2, 4, 3]), Some(IoFlag::Output))),
            Item::Stmt(stmt(
                "b",
                bin(BinOp::Transposition, id("a"), index_lists(vec![vec![1, 2]])),
            )),
        ],
    };

    let mut emitter = StringEmitter::new();
    compile_direct(&program, CompileOptions::default(), &mut emitter).unwrap();
    assert_eq!(
        tail(&emitter.log, 2),
        [
            "__t0 = transpose(a, [(1, 2)])".to_string(),
            "b = __t0".to_string(),
        ]
    );
}
