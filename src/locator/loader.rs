//! Finding the class that implements a compiler.

use crate::invoker::{CompilerHandle, EntryPoint, EntryPointError, EntryResult, JvmLaunch};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("class not found: {0}")]
    NotFound(String),
    #[error("no java runtime available to run {0}")]
    NoRuntime(String),
}

/// Resolves entry-point names to runnable compilers.
pub trait CompilerLoader {
    /// Searches `entries` before anything already on the search path.
    fn prepend_search_path(&mut self, entries: &[PathBuf]);

    fn search_path(&self) -> Vec<PathBuf>;

    fn load(&self, entry_point: &str) -> Result<CompilerHandle, LoadError>;
}

/// Statically registered compilers first, then class files on a classpath.
#[derive(Clone, Default)]
pub struct ClasspathLoader {
    registered: HashMap<String, Arc<dyn EntryPoint>>,
    classpath: Vec<PathBuf>,
    runtime: Option<PathBuf>,
}

impl ClasspathLoader {
    pub fn new(classpath: Vec<PathBuf>, runtime: Option<PathBuf>) -> Self {
        ClasspathLoader {
            registered: HashMap::new(),
            classpath,
            runtime,
        }
    }

    /// `configured` entries, then the ones from `CLASSPATH`.
    pub fn with_environment_classpath(configured: &[PathBuf], runtime: Option<PathBuf>) -> Self {
        let mut classpath = configured.to_vec();
        if let Some(value) = std::env::var_os("CLASSPATH") {
            classpath.extend(std::env::split_paths(&value));
        }
        Self::new(classpath, runtime)
    }

    /// Makes an in-process compiler available under `entry_point`.
    pub fn register(&mut self, entry_point: impl Into<String>, entry: Arc<dyn EntryPoint>) {
        self.registered.insert(entry_point.into(), entry);
    }

    fn contains_class(&self, entry: &Path, class_file: &str) -> bool {
        if entry.is_dir() {
            return entry.join(class_file).is_file();
        }
        let is_archive = entry
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"));
        if !is_archive {
            return false;
        }
        match archive_has_entry(entry, class_file) {
            Ok(found) => found,
            Err(err) => {
                debug!("skipping classpath entry {}: {}", entry.display(), err);
                false
            }
        }
    }
}

const END_OF_DIRECTORY: &[u8; 4] = b"PK\x05\x06";
const DIRECTORY_ENTRY: &[u8; 4] = b"PK\x01\x02";
const END_RECORD_LEN: usize = 22;
const ENTRY_HEADER_LEN: usize = 46;
// end record plus the longest archive comment
const MAX_TAIL: u64 = END_RECORD_LEN as u64 + u16::MAX as u64;

fn le16(bytes: &[u8], at: usize) -> usize {
    u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize
}

fn le32(bytes: &[u8], at: usize) -> u64 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as u64
}

/// Looks `name` up among the entry names of a zip central directory.
fn archive_has_entry(archive: &Path, name: &str) -> io::Result<bool> {
    let mut file = File::open(archive)?;
    let len = file.metadata()?.len();
    let tail_len = len.min(MAX_TAIL);
    let mut tail = vec![0; tail_len as usize];
    file.seek(SeekFrom::Start(len - tail_len))?;
    file.read_exact(&mut tail)?;

    let Some(end) = (0..tail.len().saturating_sub(END_RECORD_LEN - 1))
        .rev()
        .find(|&at| tail[at..].starts_with(END_OF_DIRECTORY))
    else {
        return Ok(false);
    };
    let entries = le16(&tail, end + 10);
    let directory_len = le32(&tail, end + 12);
    let directory_offset = le32(&tail, end + 16);
    if directory_offset + directory_len > len {
        return Ok(false);
    }

    let mut directory = vec![0; directory_len as usize];
    file.seek(SeekFrom::Start(directory_offset))?;
    file.read_exact(&mut directory)?;

    let mut at = 0;
    for _ in 0..entries {
        if at + ENTRY_HEADER_LEN > directory.len() || !directory[at..].starts_with(DIRECTORY_ENTRY)
        {
            break;
        }
        let name_len = le16(&directory, at + 28);
        let extra_len = le16(&directory, at + 30);
        let comment_len = le16(&directory, at + 32);
        let name_start = at + ENTRY_HEADER_LEN;
        match directory.get(name_start..name_start + name_len) {
            Some(entry) if entry == name.as_bytes() => return Ok(true),
            Some(_) => {}
            None => break,
        }
        at = name_start + name_len + extra_len + comment_len;
    }
    Ok(false)
}

impl CompilerLoader for ClasspathLoader {
    fn prepend_search_path(&mut self, entries: &[PathBuf]) {
        let mut classpath = entries.to_vec();
        classpath.append(&mut self.classpath);
        self.classpath = classpath;
    }

    fn search_path(&self) -> Vec<PathBuf> {
        self.classpath.clone()
    }

    fn load(&self, entry_point: &str) -> Result<CompilerHandle, LoadError> {
        if let Some(entry) = self.registered.get(entry_point) {
            return Ok(CompilerHandle::in_process(entry_point, Arc::clone(entry)));
        }

        let class_file = format!("{}.class", entry_point.replace('.', "/"));
        if !self
            .classpath
            .iter()
            .any(|entry| self.contains_class(entry, &class_file))
        {
            return Err(LoadError::NotFound(entry_point.to_string()));
        }

        let runtime = self
            .runtime
            .clone()
            .ok_or_else(|| LoadError::NoRuntime(entry_point.to_string()))?;
        let launch = JvmLaunch {
            runtime,
            classpath: self.classpath.clone(),
        };
        Ok(CompilerHandle {
            name: entry_point.to_string(),
            entry: Arc::new(JvmMain {
                launch: launch.clone(),
                main_class: entry_point.to_string(),
            }),
            launch: Some(launch),
        })
    }
}

/// Runs a class's `main` in a child runtime with its output captured.
#[derive(Debug, Clone)]
pub struct JvmMain {
    launch: JvmLaunch,
    main_class: String,
}

impl EntryPoint for JvmMain {
    fn invoke(&self, args: &[String], out: &mut dyn Write, err: &mut dyn Write) -> EntryResult {
        let classpath = std::env::join_paths(&self.launch.classpath)
            .map_err(|e| EntryPointError::Crashed(format!("invalid classpath: {e}")))?;
        let output = Command::new(&self.launch.runtime)
            .arg("-classpath")
            .arg(classpath)
            .arg(&self.main_class)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| EntryPointError::Crashed(format!("cannot start java: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("Main method not found") {
            return Err(EntryPointError::MissingEntryPoint(self.main_class.clone()));
        }
        out.write_all(&output.stdout)
            .and_then(|_| err.write_all(&output.stderr))
            .map_err(|e| EntryPointError::Crashed(e.to_string()))?;
        Ok(output.status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const CLASS: &str = "org.jacorb.idl.parser";

    #[test]
    fn registered_compiler_wins_without_classpath() {
        let mut loader = ClasspathLoader::new(Vec::new(), None);
        loader.register(
            CLASS,
            Arc::new(|_: &[String], _: &mut dyn Write, _: &mut dyn Write| -> EntryResult { Ok(0) }),
        );
        let handle = loader.load(CLASS).unwrap();
        assert_eq!(handle.name, CLASS);
        assert!(handle.launch.is_none());
    }

    #[test]
    fn class_directory_on_classpath_is_found() {
        let dir = tempdir().unwrap();
        let classes = dir.path().join("classes");
        fs::create_dir_all(classes.join("org/jacorb/idl")).unwrap();
        fs::write(classes.join("org/jacorb/idl/parser.class"), b"\xca\xfe\xba\xbe").unwrap();

        let loader = ClasspathLoader::new(vec![classes.clone()], Some(PathBuf::from("java")));
        let handle = loader.load(CLASS).unwrap();
        assert_eq!(
            handle.launch,
            Some(JvmLaunch {
                runtime: PathBuf::from("java"),
                classpath: vec![classes],
            })
        );
    }

    /// A stored-only zip holding empty entries named `names`.
    fn jar(names: &[&str]) -> Vec<u8> {
        let mut local = Vec::new();
        let mut directory = Vec::new();
        for name in names {
            let offset = local.len() as u32;
            local.extend_from_slice(b"PK\x03\x04");
            local.extend_from_slice(&[0; 22]);
            local.extend_from_slice(&(name.len() as u16).to_le_bytes());
            local.extend_from_slice(&0u16.to_le_bytes());
            local.extend_from_slice(name.as_bytes());

            directory.extend_from_slice(b"PK\x01\x02");
            directory.extend_from_slice(&[0; 24]);
            directory.extend_from_slice(&(name.len() as u16).to_le_bytes());
            directory.extend_from_slice(&[0; 12]);
            directory.extend_from_slice(&offset.to_le_bytes());
            directory.extend_from_slice(name.as_bytes());
        }
        let mut bytes = local;
        let directory_offset = bytes.len() as u32;
        bytes.extend_from_slice(&directory);
        bytes.extend_from_slice(b"PK\x05\x06");
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(&(names.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(names.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(directory.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&directory_offset.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes
    }

    #[test]
    fn archive_directory_is_searched_for_the_entry_name() {
        let dir = tempdir().unwrap();
        let jar_path = dir.path().join("idl.jar");
        fs::write(
            &jar_path,
            jar(&["META-INF/MANIFEST.MF", "org/jacorb/idl/parser.class"]),
        )
        .unwrap();

        let loader = ClasspathLoader::new(vec![jar_path], Some(PathBuf::from("java")));
        assert!(loader.load(CLASS).is_ok());
        assert_eq!(
            loader.load("org.openorb.compiler.IdlCompiler").unwrap_err(),
            LoadError::NotFound("org.openorb.compiler.IdlCompiler".into())
        );
    }

    #[test]
    fn entry_name_must_match_whole() {
        let dir = tempdir().unwrap();
        let jar_path = dir.path().join("idl.jar");
        fs::write(
            &jar_path,
            jar(&["xorg/jacorb/idl/parser.class", "org/jacorb/idl/parser.classes"]),
        )
        .unwrap();

        let loader = ClasspathLoader::new(vec![jar_path], Some(PathBuf::from("java")));
        assert_eq!(
            loader.load(CLASS).unwrap_err(),
            LoadError::NotFound(CLASS.into())
        );
    }

    #[test]
    fn truncated_archive_is_skipped() {
        let dir = tempdir().unwrap();
        let jar_path = dir.path().join("broken.jar");
        fs::write(&jar_path, b"PK\x03\x04 org/jacorb/idl/parser.class").unwrap();

        let loader = ClasspathLoader::new(vec![jar_path], Some(PathBuf::from("java")));
        assert!(loader.load(CLASS).is_err());
    }

    #[test]
    fn found_class_without_runtime_cannot_load() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("org/jacorb/idl")).unwrap();
        fs::write(dir.path().join("org/jacorb/idl/parser.class"), b"").unwrap();

        let loader = ClasspathLoader::new(vec![dir.path().to_path_buf()], None);
        assert_eq!(
            loader.load(CLASS).unwrap_err(),
            LoadError::NoRuntime(CLASS.into())
        );
    }

    #[test]
    fn prepended_entries_come_first() {
        let mut loader = ClasspathLoader::new(vec![PathBuf::from("b.jar")], None);
        loader.prepend_search_path(&[PathBuf::from("a.jar")]);
        assert_eq!(
            loader.search_path(),
            vec![PathBuf::from("a.jar"), PathBuf::from("b.jar")]
        );
    }
}
