use super::{
    command_line, gate, has_error_lines, CompilerHandle, EntryPointError, InvocationResult,
    InvokeOptions,
};
use crate::error::{Error, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info};

/// Output of one call, owned by the call and dropped with it.
#[derive(Default)]
struct CaptureBuffers {
    out: Vec<u8>,
    err: Vec<u8>,
}

impl CaptureBuffers {
    fn into_strings(self) -> (String, String) {
        (
            String::from_utf8_lossy(&self.out).into_owned(),
            String::from_utf8_lossy(&self.err).into_owned(),
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "compiler panicked".to_string()
    }
}

/// Calls the compiler directly and judges the outcome from its return code
/// and from the diagnostics it wrote to its error sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessInvoker {
    options: InvokeOptions,
}

impl InProcessInvoker {
    pub fn new(options: InvokeOptions) -> Self {
        InProcessInvoker { options }
    }

    pub fn run(&self, compiler: &CompilerHandle, args: &[String]) -> Result<InvocationResult> {
        debug!("{}", command_line(&compiler.name, args));

        let mut capture = CaptureBuffers::default();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            compiler
                .entry
                .invoke(args, &mut capture.out, &mut capture.err)
        }));

        let exit_code = match outcome {
            Ok(Ok(code)) => code,
            Ok(Err(EntryPointError::MissingEntryPoint(_))) => {
                return Err(Error::Infrastructure(
                    "Error: Compiler had no main method".to_string(),
                ))
            }
            Ok(Err(EntryPointError::Crashed(reason))) => {
                return Err(Error::Infrastructure(format!(
                    "IDL compilation failed: {reason}"
                )))
            }
            Err(payload) => {
                return Err(Error::Infrastructure(format!(
                    "IDL compilation failed: {}",
                    panic_message(payload.as_ref())
                )))
            }
        };
        debug!("Completed with code {}", exit_code);

        let (stdout, stderr) = capture.into_strings();
        if !stdout.is_empty() {
            info!("{}", stdout);
        }
        if !stderr.is_empty() {
            error!("{}", stderr);
        }

        let succeeded = exit_code == 0 && !has_error_lines(&stderr);
        gate(
            InvocationResult {
                exit_code,
                stdout,
                stderr,
                succeeded,
            },
            &self.options,
            &compiler.name,
        )
    }
}
