//! Incremental build driver for the AssemblyScript WASI conformance suite.
//!
//! ascbuild keeps a flat directory of AssemblyScript test sources compiled
//! to WebAssembly. It is a file-staleness task scheduler around an external
//! compiler, not a compiler: it lists the suite directory, pairs every `.ts`
//! source with its `.wasm` counterpart, recompiles the ones whose binary is
//! missing or older than the source, and lets every in-flight compilation
//! settle before reporting all failures in one aggregate.
//!
//! # Modules
//!
//! - [`suite`] -- Directory listing, extension mapping, and mtime-based
//!   staleness checks. Produces the [`suite::SourceTarget`] work list.
//! - [`throttle`] -- The per-run launch budget: bounded in-flight count plus
//!   a minimum spacing between launch instants.
//! - [`compile`] -- Subprocess invocation of the external compiler and
//!   settled-failure aggregation.
//! - [`driver`] -- The scan → filter → dispatch → aggregate pipeline behind
//!   the `ascbuild` binary.
//!
//! # Example
//!
//! Derive the output path tracked for a suite source:
//!
//! ```
//! use ascbuild::suite::{has_extension, map_extension};
//! use std::path::Path;
//!
//! let source = Path::new("testsuite/args_get-multiple-arguments.ts");
//! assert!(has_extension(source, "ts"));
//! assert_eq!(
//!     map_extension(source, "ts", "wasm").unwrap(),
//!     Path::new("testsuite/args_get-multiple-arguments.wasm"),
//! );
//! ```

pub mod compile;
pub mod driver;
pub mod suite;
pub mod throttle;
