use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_INCLUDE: &str = "**/*.idl";
pub const MANIFEST_FILE: &str = "idlgen.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PackagePrefix {
    #[serde(rename = "type")]
    pub type_name: String,
    pub prefix: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PackageTranslation {
    #[serde(rename = "type")]
    pub type_name: String,
    pub replacement_package: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Define {
    pub symbol: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Define {
    pub fn symbol(symbol: impl Into<String>) -> Self {
        Define {
            symbol: symbol.into(),
            value: None,
        }
    }

    pub fn valued(symbol: impl Into<String>, value: impl Into<String>) -> Self {
        Define {
            symbol: symbol.into(),
            value: Some(value.into()),
        }
    }
}

/// Backend-agnostic options for one translation unit.
///
/// Built once from a [`SourceConfig`] and never mutated afterwards; each
/// backend decides which of these it can express.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub emit_stubs: bool,
    pub emit_skeletons: bool,
    pub compatible: bool,
    pub package_prefix: Option<String>,
    pub package_prefixes: Vec<PackagePrefix>,
    pub package_translations: Vec<PackageTranslation>,
    pub defines: Vec<Define>,
    pub extra_args: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            emit_stubs: true,
            emit_skeletons: true,
            compatible: true,
            package_prefix: None,
            package_prefixes: Vec::new(),
            package_translations: Vec::new(),
            defines: Vec::new(),
            extra_args: Vec::new(),
            include_dirs: Vec::new(),
        }
    }
}

fn enabled() -> bool {
    true
}

/// One `[[sources]]` record of the manifest.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default = "enabled")]
    pub emit_stubs: bool,
    #[serde(default = "enabled")]
    pub emit_skeletons: bool,
    #[serde(default = "enabled")]
    pub compatible: bool,
    #[serde(default)]
    pub package_prefix: Option<String>,
    #[serde(default)]
    pub package_prefixes: Vec<PackagePrefix>,
    #[serde(default)]
    pub package_translations: Vec<PackageTranslation>,
    #[serde(default)]
    pub defines: Vec<Define>,
    #[serde(default)]
    pub additional_arguments: Vec<String>,
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            includes: Vec::new(),
            excludes: Vec::new(),
            emit_stubs: true,
            emit_skeletons: true,
            compatible: true,
            package_prefix: None,
            package_prefixes: Vec::new(),
            package_translations: Vec::new(),
            defines: Vec::new(),
            additional_arguments: Vec::new(),
            include_dirs: Vec::new(),
        }
    }
}

impl SourceConfig {
    /// Include patterns, falling back to every `.idl` file below the root.
    pub fn include_patterns(&self) -> Vec<String> {
        if self.includes.is_empty() {
            vec![DEFAULT_INCLUDE.to_string()]
        } else {
            self.includes.clone()
        }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            emit_stubs: self.emit_stubs,
            emit_skeletons: self.emit_skeletons,
            compatible: self.compatible,
            package_prefix: self.package_prefix.clone(),
            package_prefixes: self.package_prefixes.clone(),
            package_translations: self.package_translations.clone(),
            defines: self.defines.clone(),
            extra_args: self.additional_arguments.clone(),
            include_dirs: self.include_dirs.clone(),
        }
    }
}

/// Which set of directories a run works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Main,
    Test,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct BuildSection {
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    #[serde(default)]
    pub test_source_dir: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub test_output_dir: Option<PathBuf>,
    #[serde(default)]
    pub timestamp_dir: Option<PathBuf>,
    #[serde(default)]
    pub test_timestamp_dir: Option<PathBuf>,
    #[serde(default)]
    pub compiler: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub fail_on_error: Option<bool>,
    #[serde(default)]
    pub stale_millis: u64,
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub classpath: Vec<PathBuf>,
    #[serde(default)]
    pub fork: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest at {}", path.display()))?;
        let manifest: Manifest = toml::from_str(&content)
            .with_context(|| format!("Invalid manifest TOML at {}", path.display()))?;
        Ok(manifest)
    }

    /// Loads the manifest if present; a missing file means all defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Manifest::default())
        }
    }

    pub fn manifest_dir(manifest_path: &Path) -> PathBuf {
        manifest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Flattens the manifest into the settings of a single run.
    pub fn settings(&self, base_dir: &Path, scope: Scope) -> BuildSettings {
        let build = &self.build;
        let pick = |configured: &Option<PathBuf>, default: &str| {
            base_dir.join(configured.clone().unwrap_or_else(|| PathBuf::from(default)))
        };
        let (source_dir, output_dir, timestamp_dir) = match scope {
            Scope::Main => (
                pick(&build.source_dir, "src/main/idl"),
                pick(&build.output_dir, "target/generated-sources/idl"),
                pick(&build.timestamp_dir, "target/idlj-timestamp"),
            ),
            Scope::Test => (
                pick(&build.test_source_dir, "src/test/idl"),
                pick(&build.test_output_dir, "target/generated-test-sources/idl"),
                pick(&build.test_timestamp_dir, "target/idlj-test-timestamp"),
            ),
        };

        BuildSettings {
            source_dir,
            output_dir,
            timestamp_dir,
            include_dirs: build.include_dirs.iter().map(|d| base_dir.join(d)).collect(),
            classpath: build.classpath.iter().map(|d| base_dir.join(d)).collect(),
            compiler: build.compiler.clone(),
            debug: build.debug,
            fail_on_error: build.fail_on_error.unwrap_or(true),
            fork: build.fork.unwrap_or(true),
            stale_millis: build.stale_millis,
            sources: self
                .sources
                .iter()
                .map(|unit| SourceConfig {
                    include_dirs: unit.include_dirs.iter().map(|d| base_dir.join(d)).collect(),
                    ..unit.clone()
                })
                .collect(),
        }
    }
}

/// Everything one run needs, with paths already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub timestamp_dir: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub compiler: Option<String>,
    pub debug: bool,
    pub fail_on_error: bool,
    pub fork: bool,
    pub stale_millis: u64,
    pub sources: Vec<SourceConfig>,
}

impl BuildSettings {
    /// The configured translation units, or a single default one.
    pub fn translation_units(&self) -> Vec<SourceConfig> {
        if self.sources.is_empty() {
            vec![SourceConfig::default()]
        } else {
            self.sources.clone()
        }
    }
}
