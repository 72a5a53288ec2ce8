//! External compiler invocation and settled-failure aggregation.
//!
//! The compiler is a black box: a command-line tool handed a source path
//! and an output path, judged purely by its exit code. Each stale target
//! becomes one subprocess, admitted through the [`Throttle`], and every
//! launched compilation runs to completion whether or not its siblings
//! fail. Only after all outcomes settle does a failed target fail the run,
//! as one [`BuildFailure`] naming every failure.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use futures::future;
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

use crate::suite::SourceTarget;
use crate::throttle::Throttle;

/// Extension of the suite's source files.
pub const SOURCE_EXTENSION: &str = "ts";
/// Extension of the compiled binaries sitting alongside them.
pub const OUTPUT_EXTENSION: &str = "wasm";

/// A single compilation's failure, recorded per target and never allowed
/// to abort sibling compilations.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The compiler process could not be started at all.
    #[error("failed to launch compiler: {0}")]
    Launch(#[from] io::Error),
    /// The compiler ran and exited nonzero.
    #[error("compiler {status}:\n{stderr}")]
    Failed {
        /// The subprocess exit status.
        status: ExitStatus,
        /// Whatever the compiler wrote to its error stream.
        stderr: String,
    },
}

/// The external compiler invocation: a program plus fixed leading
/// arguments, with `<source> -o <output>` appended per target.
#[derive(Debug, Clone)]
pub struct Compiler {
    program: OsString,
    args: Vec<OsString>,
}

impl Compiler {
    /// The production toolchain: AssemblyScript's `asc` through the npm
    /// wrapper, equivalent to `npm run asc --silent -- <src> -o <out>`.
    pub fn assemblyscript() -> Self {
        Self::new("npm", ["run", "asc", "--silent", "--"])
    }

    /// An arbitrary compiler command, for suites built with a different
    /// toolchain (tests point this at stub executables).
    pub fn new(
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Run one compilation to completion. Success is exit code zero;
    /// a launch failure or nonzero exit surfaces as a [`CompileError`]
    /// carrying the raw process detail.
    pub async fn compile(&self, target: &SourceTarget) -> Result<(), CompileError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&target.source)
            .arg("-o")
            .arg(&target.output)
            .output()
            .await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(CompileError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

/// A target that settled as failed, paired with its error detail for the
/// aggregate report.
#[derive(Debug)]
pub struct FailedTarget {
    /// The source file whose compilation failed.
    pub source: PathBuf,
    /// Why it failed.
    pub error: CompileError,
}

/// One or more compilations failed.
///
/// Synthesized only after every in-flight target has settled, so the
/// report names every failure of the run, not just the first.
#[derive(Debug)]
#[must_use]
pub struct BuildFailure {
    /// Every failing target, in discovery order.
    pub failures: Vec<FailedTarget>,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "\n\n")?;
            }
            write!(
                f,
                "Failed to compile {}:\n{}",
                failure.source.display(),
                failure.error
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildFailure {}

/// Dispatch every target through `throttle` and let all of them settle.
///
/// A failing target never cancels or blocks its siblings; their outputs
/// are still produced. Returns the number of successful compilations, or
/// the aggregate of every failure once everything has completed. An empty
/// target list succeeds trivially without spawning anything.
pub async fn compile_all(
    targets: Vec<SourceTarget>,
    compiler: &Compiler,
    throttle: &Throttle,
) -> Result<usize, BuildFailure> {
    let jobs = targets.into_iter().map(|target| async move {
        let _permit = throttle.admit().await;
        info!("compiling {}", target.source.display());
        let result = compiler.compile(&target).await;
        (target, result)
    });

    let mut compiled = 0;
    let mut failures = Vec::new();
    for (target, result) in future::join_all(jobs).await {
        match result {
            Ok(()) => compiled += 1,
            Err(error) => failures.push(FailedTarget {
                source: target.source,
                error,
            }),
        }
    }

    if failures.is_empty() {
        Ok(compiled)
    } else {
        Err(BuildFailure { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(source: &str, stderr: &str) -> FailedTarget {
        FailedTarget {
            source: PathBuf::from(source),
            error: CompileError::Launch(io::Error::new(io::ErrorKind::Other, stderr.to_string())),
        }
    }

    #[test]
    fn aggregate_report_names_every_failure() {
        let report = BuildFailure {
            failures: vec![failed("suite/a.ts", "no such program"), failed("suite/b.ts", "enoent")],
        }
        .to_string();

        assert!(report.contains("Failed to compile suite/a.ts:"));
        assert!(report.contains("no such program"));
        assert!(report.contains("Failed to compile suite/b.ts:"));
        // one blank line between entries
        assert_eq!(report.matches("\n\n").count(), 1);
    }

    #[tokio::test]
    async fn launch_failure_is_captured_not_thrown() {
        let compiler = Compiler::new("/no/such/compiler", Vec::<String>::new());
        let target = SourceTarget {
            source: PathBuf::from("suite/a.ts"),
            output: PathBuf::from("suite/a.wasm"),
        };
        let err = compiler.compile(&target).await.unwrap_err();
        assert!(matches!(err, CompileError::Launch(_)));
    }
}
