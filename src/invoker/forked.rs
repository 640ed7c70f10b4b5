use super::{command_line, gate, InvocationResult, InvokeOptions, JvmLaunch};
use crate::error::{Error, Result};
use crossbeam_channel::Sender;
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Stdout,
    Stderr,
}

fn spawn_reader<R>(channel: Channel, pipe: R, lines: Sender<(Channel, String)>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    if lines.send((channel, line)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!("stopped reading compiler {:?}: {}", channel, err);
                    break;
                }
            }
        }
    })
}

/// Joins the output readers, then waits for the child even if a reader died.
fn reap(child: &mut Child, readers: Vec<JoinHandle<()>>) -> Result<ExitStatus> {
    let readers_finished = readers
        .into_iter()
        .fold(true, |finished, reader| reader.join().is_ok() && finished);
    let status = child
        .wait()
        .map_err(|e| Error::Infrastructure(format!("Error waiting for compiler: {e}")))?;
    if !readers_finished {
        return Err(Error::Infrastructure(
            "Compiler output reader panicked".into(),
        ));
    }
    Ok(status)
}

/// Runs the compiler in a child runtime and echoes its output as it arrives.
#[derive(Debug, Clone)]
pub struct ForkedProcessInvoker {
    runtime: PathBuf,
    classpath: Vec<PathBuf>,
    options: InvokeOptions,
}

impl ForkedProcessInvoker {
    pub fn new(launch: JvmLaunch, options: InvokeOptions) -> Self {
        ForkedProcessInvoker {
            runtime: launch.runtime,
            classpath: launch.classpath,
            options,
        }
    }

    /// `runtime -classpath <entries> <entry_point> args...`
    pub fn command_line(&self, entry_point: &str, args: &[String]) -> Result<Vec<OsString>> {
        let classpath = std::env::join_paths(&self.classpath)
            .map_err(|e| Error::Infrastructure(format!("Invalid compiler classpath: {e}")))?;

        let mut line = vec![
            self.runtime.clone().into_os_string(),
            OsString::from("-classpath"),
            classpath,
            OsString::from(entry_point),
        ];
        line.extend(args.iter().map(OsString::from));
        Ok(line)
    }

    pub fn run(&self, entry_point: &str, args: &[String]) -> Result<InvocationResult> {
        let line = self.command_line(entry_point, args)?;
        if self.options.debug {
            let printable: Vec<String> = line
                .iter()
                .map(|part| part.to_string_lossy().into_owned())
                .collect();
            debug!("{}", command_line(&printable[0], &printable[1..]));
        }

        let mut child = Command::new(&line[0])
            .args(&line[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Infrastructure(format!("Error forking compiler: {e}")))?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(Channel::Stdout, stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(Channel::Stderr, stderr, tx.clone()));
        }
        drop(tx);

        let mut stdout = String::new();
        let mut stderr = String::new();
        for (channel, line) in rx.iter() {
            match channel {
                Channel::Stdout => {
                    let _ = writeln!(io::stdout().lock(), "{line}");
                    stdout.push_str(&line);
                    stdout.push('\n');
                }
                Channel::Stderr => {
                    let _ = writeln!(io::stderr().lock(), "{line}");
                    stderr.push_str(&line);
                    stderr.push('\n');
                }
            }
        }

        let status = reap(&mut child, readers)?;
        let exit_code = status.code().unwrap_or(-1);
        debug!("Forked compiler exited with code {}", exit_code);
        gate(
            InvocationResult {
                exit_code,
                stdout,
                stderr,
                succeeded: exit_code == 0,
            },
            &self.options,
            entry_point,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn invoker(runtime: &Path, fail_on_error: bool) -> ForkedProcessInvoker {
        ForkedProcessInvoker::new(
            JvmLaunch {
                runtime: runtime.to_path_buf(),
                classpath: vec![
                    PathBuf::from("/opt/jacorb/lib/idl.jar"),
                    PathBuf::from("/opt/jacorb/lib/logkit.jar"),
                ],
            },
            InvokeOptions {
                debug: true,
                fail_on_error,
            },
        )
    }

    #[test]
    fn command_line_places_classpath_and_entry_point_before_arguments() {
        let forked = invoker(Path::new("/usr/lib/jvm/bin/java"), true);
        let line = forked
            .command_line("org.jacorb.idl.parser", &["-d".into(), "out".into()])
            .unwrap();
        let expected_classpath =
            std::env::join_paths(["/opt/jacorb/lib/idl.jar", "/opt/jacorb/lib/logkit.jar"])
                .unwrap();
        assert_eq!(
            line,
            vec![
                OsString::from("/usr/lib/jvm/bin/java"),
                OsString::from("-classpath"),
                expected_classpath,
                OsString::from("org.jacorb.idl.parser"),
                OsString::from("-d"),
                OsString::from("out"),
            ]
        );
    }

    #[test]
    fn unspawnable_runtime_is_an_infrastructure_error() {
        let forked = invoker(Path::new("/nonexistent/bin/java"), false);
        let err = forked.run("org.jacorb.idl.parser", &[]).unwrap_err();
        assert!(
            matches!(err, Error::Infrastructure(msg) if msg.contains("Error forking compiler"))
        );
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::tempdir;

        // Stands in for `java`: $1=-classpath $2=<cp> $3=<entry point> $4=<exit code>
        const FAKE_RUNTIME: &str = r#"#!/bin/sh
echo "running $3"
echo "bank.idl (line 4): should not matter" >&2
i=0
while [ $i -lt 3000 ]; do
  echo "stdout line $i ...................................................."
  echo "stderr line $i ...................................................." >&2
  i=$((i+1))
done
exit $4
"#;

        fn fake_runtime(dir: &Path) -> PathBuf {
            let path = dir.join("fake-java");
            fs::write(&path, FAKE_RUNTIME).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn streams_output_and_succeeds_on_zero_exit() {
            let dir = tempdir().unwrap();
            let forked = invoker(&fake_runtime(dir.path()), true);

            let result = forked.run("org.jacorb.idl.parser", &["0".into()]).unwrap();
            assert!(result.succeeded);
            assert!(result.stdout.starts_with("running org.jacorb.idl.parser\n"));
            assert!(result.stderr.contains("(line 4)"));
        }

        #[test]
        fn both_streams_drain_past_the_pipe_buffer() {
            let dir = tempdir().unwrap();
            let forked = invoker(&fake_runtime(dir.path()), true);

            let result = forked.run("org.jacorb.idl.parser", &["0".into()]).unwrap();
            assert!(result.stdout.len() > 128 * 1024);
            assert!(result.stderr.len() > 128 * 1024);
            assert_eq!(result.stdout.lines().count(), 3001);
            assert_eq!(result.stderr.lines().count(), 3001);
            assert!(result.stdout.ends_with(&format!("stdout line 2999 {}\n", ".".repeat(52))));
            assert!(result.stderr.ends_with(&format!("stderr line 2999 {}\n", ".".repeat(52))));
        }

        #[test]
        fn child_is_reaped_when_a_reader_panics() {
            let mut child = Command::new("sh")
                .args(["-c", "sleep 0.3; exit 7"])
                .spawn()
                .unwrap();
            let reader = thread::spawn(|| panic!("reader lost its pipe"));

            let err = reap(&mut child, vec![reader]).unwrap_err();
            assert!(matches!(err, Error::Infrastructure(msg) if msg.contains("reader panicked")));
            let status = child.try_wait().unwrap().expect("child already waited on");
            assert_eq!(status.code(), Some(7));
        }

        #[test]
        fn non_zero_exit_fails_when_failing_on_error() {
            let dir = tempdir().unwrap();
            let forked = invoker(&fake_runtime(dir.path()), true);

            let err = forked
                .run("org.openorb.compiler.IdlCompiler", &["3".into()])
                .unwrap_err();
            assert!(matches!(err, Error::CompilationFailure { exit_code: 3, .. }));
        }

        #[test]
        fn non_zero_exit_is_reported_when_lenient() {
            let dir = tempdir().unwrap();
            let forked = invoker(&fake_runtime(dir.path()), false);

            let result = forked
                .run("org.openorb.compiler.IdlCompiler", &["3".into()])
                .unwrap();
            assert!(!result.succeeded);
            assert_eq!(result.exit_code, 3);
        }
    }
}
