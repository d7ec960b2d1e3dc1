//! Ambient compilation configuration. A single `Copy` struct rather
//! than an on-disk config format, serializable via
//! `#[derive(Serialize, Deserialize)]` so an embedder can persist or
//! pass it around as JSON alongside `serde_json`.
use serde::{Deserialize, Serialize};

/// Options threaded through a single call to `compile`/`lower_program`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Whether `transform::stack_remover` should first lift nested
    /// `Stack` subtrees to top-level temporaries before expanding
    /// top-level stacks. Disabling this is only sound for inputs
    /// already known to have no nested stacks — it exists so a caller
    /// inspecting pre-lift IR (e.g. a diagnostic tool) can skip the
    /// rewrite rather than because any supported program needs it
    /// skipped.
    pub lift_nested_stacks: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            lift_nested_stacks: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lifts_nested_stacks() {
        assert!(CompileOptions::default().lift_nested_stacks);
    }

    #[test]
    fn round_trips_through_json() {
        let opts = CompileOptions {
            lift_nested_stacks: false,
        };
        let json = serde_json::to_string(&opts).unwrap();
        let back: CompileOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(opts, back);
    }
}
