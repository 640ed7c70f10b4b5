//! Facts about the Java runtime the compilers will run on.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnvironment {
    pub java_home: Option<PathBuf>,
    pub java_version: Option<String>,
    pub vm_vendor: Option<String>,
    pub vm_name: Option<String>,
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').to_string()
}

/// Reads `KEY="value"` pairs from a JDK `release` file.
pub fn parse_release(content: &str) -> RuntimeEnvironment {
    let mut env = RuntimeEnvironment::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "JAVA_VERSION" => env.java_version = Some(unquote(value)),
            "IMPLEMENTOR" => env.vm_vendor = Some(unquote(value)),
            "JVM_VARIANT" => env.vm_name = Some(unquote(value)),
            _ => {}
        }
    }
    env
}

/// Extracts version and VM name from `java -version` output.
pub fn parse_version_banner(banner: &str) -> RuntimeEnvironment {
    let mut env = RuntimeEnvironment::default();
    if let Some(first) = banner.lines().next() {
        env.java_version = first.split('"').nth(1).map(str::to_string);
    }
    env.vm_name = banner
        .lines()
        .find(|line| line.contains(" VM "))
        .map(|line| line.split(" (build").next().unwrap_or(line).trim().to_string());
    if banner.contains("IBM") || banner.contains("OpenJ9") {
        env.vm_vendor = Some("IBM Corporation".to_string());
    }
    env
}

impl RuntimeEnvironment {
    /// Inspects `JAVA_HOME`, falling back to the `java` on `PATH`.
    pub fn probe() -> Self {
        let java_home = env::var_os("JAVA_HOME")
            .map(PathBuf::from)
            .filter(|home| home.is_dir())
            .or_else(java_home_from_path);

        let mut probed = java_home
            .as_deref()
            .and_then(|home| fs::read_to_string(home.join("release")).ok())
            .map(|content| parse_release(&content))
            .unwrap_or_default();

        if probed.java_version.is_none() {
            if let Some(java) = java_executable(java_home.as_deref()) {
                if let Some(banner) = version_banner(&java) {
                    let from_banner = parse_version_banner(&banner);
                    probed.java_version = from_banner.java_version;
                    probed.vm_name = probed.vm_name.or(from_banner.vm_name);
                    probed.vm_vendor = probed.vm_vendor.or(from_banner.vm_vendor);
                }
            }
        }

        probed.java_home = java_home;
        debug!(?probed, "probed java runtime");
        probed
    }

    /// Java 9 and later hide the JDK-internal compiler behind the module system.
    /// An unknown version is treated as modern.
    pub fn has_module_system(&self) -> bool {
        self.java_version
            .as_deref()
            .map_or(true, |version| !version.starts_with("1."))
    }

    pub fn is_ibm(&self) -> bool {
        self.vm_vendor
            .as_deref()
            .is_some_and(|vendor| vendor.contains("IBM"))
    }

    pub fn is_hotspot(&self) -> bool {
        self.vm_name
            .as_deref()
            .is_some_and(|name| name.to_ascii_lowercase().contains("hotspot"))
    }

    pub fn java_executable(&self) -> Option<PathBuf> {
        java_executable(self.java_home.as_deref())
    }

    /// The JDK 8 tools archive that carries the built-in idlj.
    ///
    /// `java_home` may name either the JDK root or its `jre` directory.
    pub fn tools_jar(&self) -> Option<PathBuf> {
        let home = self.java_home.as_ref()?;
        let in_home = home.join("lib").join("tools.jar");
        if in_home.is_file() || home.join("jre").is_dir() {
            return Some(in_home);
        }
        if home.file_name().is_some_and(|name| name == "jre") {
            return Some(home.join("..").join("lib").join("tools.jar"));
        }
        Some(in_home)
    }
}

fn java_home_from_path() -> Option<PathBuf> {
    let java = which::which("java").ok()?;
    let java = fs::canonicalize(&java).unwrap_or(java);
    java.parent()?.parent().map(Path::to_path_buf)
}

fn java_executable(java_home: Option<&Path>) -> Option<PathBuf> {
    let name = if cfg!(windows) { "java.exe" } else { "java" };
    match java_home {
        Some(home) => Some(home.join("bin").join(name)).filter(|path| path.is_file()),
        None => which::which("java").ok(),
    }
}

fn version_banner(java: &Path) -> Option<String> {
    let output = Command::new(java)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .ok()?;
    // the banner goes to stderr
    Some(String::from_utf8_lossy(&output.stderr).into_owned())
}
