//! Running a located compiler and classifying what it reported.

use crate::error::{Error, Result};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::warn;

pub mod forked;
pub mod in_process;

pub use forked::ForkedProcessInvoker;
pub use in_process::InProcessInvoker;

/// Marks a diagnostic that carries a source position, e.g. `foo.idl (line 12): ...`.
pub const LOCATION_MARKER: &str = "(line ";
/// Marks a positioned diagnostic that must not fail the build on its own.
pub const WARNING_MARKER: &str = "WARNING";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub succeeded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeOptions {
    pub debug: bool,
    pub fail_on_error: bool,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        InvokeOptions {
            debug: false,
            fail_on_error: true,
        }
    }
}

/// Failures of the compiler installation rather than of the IDL being compiled.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum EntryPointError {
    #[error("{0} has no entry point")]
    MissingEntryPoint(String),
    #[error("{0}")]
    Crashed(String),
}

pub type EntryResult = std::result::Result<i32, EntryPointError>;

/// A compiler that can be called with an argument vector and explicit output sinks.
pub trait EntryPoint: Send + Sync {
    fn invoke(
        &self,
        args: &[String],
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> EntryResult;
}

impl<F> EntryPoint for F
where
    F: Fn(&[String], &mut dyn Write, &mut dyn Write) -> EntryResult + Send + Sync,
{
    fn invoke(
        &self,
        args: &[String],
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> EntryResult {
        self(args, out, err)
    }
}

/// What a forked child needs to start the same compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JvmLaunch {
    pub runtime: PathBuf,
    pub classpath: Vec<PathBuf>,
}

/// A compiler resolved once per run.
#[derive(Clone)]
pub struct CompilerHandle {
    pub name: String,
    pub entry: Arc<dyn EntryPoint>,
    pub launch: Option<JvmLaunch>,
}

impl CompilerHandle {
    pub fn in_process(name: impl Into<String>, entry: Arc<dyn EntryPoint>) -> Self {
        CompilerHandle {
            name: name.into(),
            entry,
            launch: None,
        }
    }
}

impl fmt::Debug for CompilerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerHandle")
            .field("name", &self.name)
            .field("launch", &self.launch)
            .finish()
    }
}

/// True when any stderr line is a positioned diagnostic not flagged as a warning.
///
/// Lines are judged independently, so a warning line never masks an error on
/// another line. The markers follow the idlj diagnostic format.
pub fn has_error_lines(stderr: &str) -> bool {
    stderr.lines().any(|line| {
        let offending = line.contains(LOCATION_MARKER) && !line.contains(WARNING_MARKER);
        if offending {
            tracing::debug!("Failed due to error: <{}>", line);
        }
        offending
    })
}

pub(crate) fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Applies the fail-on-error policy to a classified result.
pub(crate) fn gate(
    result: InvocationResult,
    options: &InvokeOptions,
    entry_point: &str,
) -> Result<InvocationResult> {
    if result.succeeded {
        return Ok(result);
    }
    if options.fail_on_error {
        return Err(Error::CompilationFailure {
            entry_point: entry_point.to_string(),
            exit_code: result.exit_code,
        });
    }
    warn!(
        exit_code = result.exit_code,
        "IDL compilation reported errors; continuing because fail_on_error is off"
    );
    Ok(result)
}
