//! Compiler core for a small declarative tensor-algebra DSL.
//!
//! This crate owns structural tensor typing (`sema`), two independent
//! lowering strategies from the parse AST down to `Emitter` calls
//! (`direct_codegen` + `transform`, and `graph_codegen`), and the
//! supporting IR/graph representations each of those needs. It does
//! not contain a lexer, parser, or any concrete back end — those are
//! external collaborators that hand this crate an `ast::Program` and
//! implement `emit::Emitter` themselves.
//!
//! Two ways to go from a parsed program to emitted calls:
//!
//! - [`compile_direct`]: lowers to the `exprtree` IR, runs
//!   `transform::stack_remover` over it, then walks the normalized IR
//!   to drive an `Emitter`. Stacks become one assignment per member.
//! - [`compile_via_network`]: lowers straight from the AST through a
//!   `graph` tensor network, scheduling contractions itself and
//!   emitting stacks as one native `Emitter::stack` call.
//!
//! Both share `sema::analyze` for typing and `error::CoreError` for
//! failure, but otherwise never call into each other: they are two
//! independent entry points rather than stages of a single pipeline.
pub mod ast;
pub mod config;
pub mod direct_codegen;
pub mod emit;
pub mod error;
pub mod exprtree;
pub mod graph;
pub mod graph_codegen;
pub mod sema;
pub mod symbol;
pub mod transform;
pub mod types;

pub(crate) mod contraction;
pub(crate) mod indexlist;

use std::collections::HashSet;

use config::CompileOptions;
use emit::Emitter;
use error::CoreError;

/// Runs the `ExprTree`-based pipeline end to end: typing, AST→IR
/// lowering, stack removal, then emission. The declared-symbol set
/// `transform::stack_remover` needs to tell a real declaration from a
/// lifted temporary is derived from `sema`'s symbol table, so callers
/// never have to build it themselves.
pub fn compile_direct(
    program: &ast::Program,
    options: CompileOptions,
    emitter: &mut dyn Emitter,
) -> Result<(), CoreError> {
    let sema_out = sema::analyze(program)?;

    for decl in program.decls() {
        if let ast::DeclKind::Variable = decl.kind {
            if let Some(sym) = sema_out.symbols.get_symbol(&decl.id) {
                emitter.declare_variable(&decl.id, sym.ty().dims(), decl.io);
            }
        }
    }

    let (mut builder, assignments) = direct_codegen::lower_program(program, &sema_out)?;

    let declared_ids: HashSet<String> = sema_out.symbols.iter().map(|s| s.name().to_string()).collect();
    let assignments = transform::stack_remover::remove_stacks(
        &mut builder,
        assignments,
        &declared_ids,
        options.lift_nested_stacks,
    );

    direct_codegen::emit_assignments(&builder, &assignments, emitter)?;
    Ok(())
}

/// Runs the tensor-network pipeline end to end: typing, then AST→graph
/// lowering with its own contraction scheduling, straight to `emitter`.
/// Takes no `CompileOptions` — this strategy has no stack-lifting step
/// to gate, since `graph_codegen` always emits a stack natively.
pub fn compile_via_network(program: &ast::Program, emitter: &mut dyn Emitter) -> Result<(), CoreError> {
    let sema_out = sema::analyze(program)?;
    graph_codegen::lower_program(program, &sema_out, emitter)
}
