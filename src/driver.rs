//! The scan → staleness filter → dispatch → aggregate pipeline.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::compile::{self, BuildFailure, Compiler, OUTPUT_EXTENSION, SOURCE_EXTENSION};
use crate::suite::{self, SuiteError};
use crate::throttle::{Throttle, ThrottleConfig};

/// Fatal outcomes of a whole run.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Discovery failed; nothing was dispatched.
    #[error(transparent)]
    Suite(#[from] SuiteError),
    /// One or more compilations failed after every target settled.
    #[error(transparent)]
    Failed(#[from] BuildFailure),
}

/// Counts reported after a fully successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    /// Targets recompiled this run.
    pub compiled: usize,
    /// Targets whose output was already newer than the source.
    pub fresh: usize,
}

/// Compile every stale `.ts` source in `suite_dir` to its `.wasm`
/// counterpart.
///
/// Discovery errors abort immediately, before any dispatch. Compile
/// failures are allowed to settle across the whole suite and come back as
/// one aggregate. An empty or fully fresh suite succeeds trivially.
pub async fn build(
    suite_dir: &Path,
    compiler: &Compiler,
    config: ThrottleConfig,
) -> Result<BuildSummary, BuildError> {
    let (stale, fresh) = suite::stale_targets(suite_dir, SOURCE_EXTENSION, OUTPUT_EXTENSION)?;
    debug!(
        "{}: {} stale target(s), {} fresh",
        suite_dir.display(),
        stale.len(),
        fresh
    );
    let throttle = Throttle::new(config);
    let compiled = compile::compile_all(stale, compiler, &throttle).await?;
    Ok(BuildSummary { compiled, fresh })
}
