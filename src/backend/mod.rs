use crate::config::BackendConfig;
use crate::error::Result;
use crate::invoker::{
    CompilerHandle, ForkedProcessInvoker, InProcessInvoker, InvocationResult, InvokeOptions,
};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

mod idlj;
mod jacorb;
mod openorb;
pub mod paths;

/// The IDL compilers idlgen knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// idlj as shipped with JDK 8 and earlier
    BuiltIn,
    /// the idlj fork published by Glassfish, for module-system JDKs
    Glassfish,
    Jacorb,
    Openorb,
}

pub const ORACLE_IDLJ_ENTRY_POINT: &str = "com.sun.tools.corba.se.idl.toJavaPortable.Compile";
pub const IBM_IDLJ_ENTRY_POINT: &str = "com.ibm.idl.toJavaPortable.Compile";
pub const GLASSFISH_ENTRY_POINT: &str = "com.sun.tools.corba.ee.idl.toJavaPortable.Compile";
pub const JACORB_ENTRY_POINT: &str = "org.jacorb.idl.parser";
pub const OPENORB_ENTRY_POINT: &str = "org.openorb.compiler.IdlCompiler";

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::BuiltIn,
        BackendKind::Glassfish,
        BackendKind::Jacorb,
        BackendKind::Openorb,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::BuiltIn => "idlj",
            BackendKind::Glassfish => "glassfish",
            BackendKind::Jacorb => "jacorb",
            BackendKind::Openorb => "openorb",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Fully qualified class implementing the compiler.
    pub fn entry_point(&self, ibm_vm: bool) -> &'static str {
        match self {
            BackendKind::BuiltIn if ibm_vm => IBM_IDLJ_ENTRY_POINT,
            BackendKind::BuiltIn => ORACLE_IDLJ_ENTRY_POINT,
            BackendKind::Glassfish => GLASSFISH_ENTRY_POINT,
            BackendKind::Jacorb => JACORB_ENTRY_POINT,
            BackendKind::Openorb => OPENORB_ENTRY_POINT,
        }
    }

    /// Whether the compiler tolerates running in a child runtime.
    pub fn supports_fork(&self) -> bool {
        matches!(self, BackendKind::Jacorb | BackendKind::Openorb)
    }

    /// Flags selecting what to generate, in this compiler's vocabulary.
    pub fn emit_flags(&self, emit_stubs: bool, emit_skeletons: bool) -> &'static [&'static str] {
        match self {
            BackendKind::BuiltIn | BackendKind::Glassfish => {
                idlj::emit_flags(emit_stubs, emit_skeletons)
            }
            BackendKind::Jacorb => jacorb::emit_flags(emit_stubs, emit_skeletons),
            BackendKind::Openorb => openorb::emit_flags(emit_stubs, emit_skeletons),
        }
    }

    /// Builds the compiler command line for one file.
    ///
    /// `include_dirs` come first, followed by the unit's own include dirs.
    /// Fails with [`crate::Error::UnsupportedFeature`] instead of dropping an
    /// option the compiler cannot express.
    pub fn build_arguments(
        &self,
        ctx: &ArgumentContext,
        config: &BackendConfig,
        include_dirs: &[PathBuf],
        output_dir: &Path,
        source_file: &Path,
    ) -> Result<Vec<String>> {
        match self {
            BackendKind::BuiltIn | BackendKind::Glassfish => idlj::arguments(
                *self,
                ctx,
                config,
                include_dirs,
                output_dir,
                source_file,
            ),
            BackendKind::Jacorb => {
                jacorb::arguments(ctx, config, include_dirs, output_dir, source_file)
            }
            BackendKind::Openorb => {
                openorb::arguments(ctx, config, include_dirs, output_dir, source_file)
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options a backend may be unable to express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    PackagePrefix,
    PackagePrefixes,
    PackageTranslations,
    DefineValue,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Feature::PackagePrefix => "packagePrefix",
            Feature::PackagePrefixes => "package prefixes",
            Feature::PackageTranslations => "package translations",
            Feature::DefineValue => "defining symbol values",
        };
        f.write_str(text)
    }
}

/// Inputs to argument building that come from the run, not the unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentContext {
    pub debug: bool,
    pub working_dir: PathBuf,
}

/// A compiler chosen for this run, ready to translate files.
#[derive(Debug, Clone)]
pub struct Backend {
    kind: BackendKind,
    compiler: CompilerHandle,
    context: ArgumentContext,
    options: InvokeOptions,
    fork: bool,
}

impl Backend {
    pub fn new(
        kind: BackendKind,
        compiler: CompilerHandle,
        context: ArgumentContext,
        options: InvokeOptions,
        fork: bool,
    ) -> Self {
        Backend {
            kind,
            compiler,
            context,
            options,
            fork,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn compiler(&self) -> &CompilerHandle {
        &self.compiler
    }

    pub fn working_dir(&self) -> &Path {
        &self.context.working_dir
    }

    pub fn build_arguments(
        &self,
        config: &BackendConfig,
        include_dirs: &[PathBuf],
        output_dir: &Path,
        source_file: &Path,
    ) -> Result<Vec<String>> {
        self.kind.build_arguments(
            &self.context,
            config,
            include_dirs,
            output_dir,
            source_file,
        )
    }

    pub fn invoke(&self, args: &[String]) -> Result<InvocationResult> {
        debug!("Current dir : {}", self.context.working_dir.display());
        match &self.compiler.launch {
            Some(launch) if self.fork && self.kind.supports_fork() => {
                ForkedProcessInvoker::new(launch.clone(), self.options)
                    .run(&self.compiler.name, args)
            }
            _ => InProcessInvoker::new(self.options).run(&self.compiler, args),
        }
    }
}
