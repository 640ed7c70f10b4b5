use crate::backend::{ArgumentContext, Backend, BackendKind};
use crate::error::{Error, Result};
use crate::invoker::{CompilerHandle, InvokeOptions};
use std::path::PathBuf;
use tracing::{debug, info};

pub mod environment;
pub mod loader;

pub use environment::RuntimeEnvironment;
pub use loader::{ClasspathLoader, CompilerLoader, LoadError};

const HOTSPOT_FILE_LOCATOR: &str = "com.sun.tools.corba.se.idl.som.cff.FileLocator";
const IDL_COMPILER_NOT_AVAILABLE: &str = "IDL compiler not available";
const USE_GLASSFISH_IDL: &str =
    "Built-in IDL compiler not available in JDK9. Use the glassfish compiler instead.";

/// Flags every backend of a run is built with.
#[derive(Debug, Clone)]
pub struct LocatorOptions {
    pub debug: bool,
    pub fail_on_error: bool,
    pub fork: bool,
    pub working_dir: PathBuf,
}

/// Picks the backend for a run and locates its compiler once.
pub struct BackendLocator<L: CompilerLoader> {
    loader: L,
    environment: RuntimeEnvironment,
    options: LocatorOptions,
}

impl<L: CompilerLoader> BackendLocator<L> {
    pub fn new(loader: L, environment: RuntimeEnvironment, options: LocatorOptions) -> Self {
        BackendLocator {
            loader,
            environment,
            options,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// The backend used when none is configured.
    pub fn default_kind(&self) -> BackendKind {
        if self.environment.has_module_system() {
            BackendKind::Glassfish
        } else {
            BackendKind::BuiltIn
        }
    }

    pub fn select(&self, explicit: Option<&str>) -> Result<BackendKind> {
        match explicit {
            Some(name) => BackendKind::from_name(name)
                .ok_or_else(|| Error::UnsupportedBackend(name.to_string())),
            None => Ok(self.default_kind()),
        }
    }

    pub fn resolve(&mut self, explicit: Option<&str>) -> Result<Backend> {
        let kind = self.select(explicit)?;
        debug!(backend = %kind, "selected IDL compiler");
        let compiler = match kind {
            BackendKind::BuiltIn => self.locate_built_in()?,
            BackendKind::Glassfish => self.locate(kind, IDL_COMPILER_NOT_AVAILABLE)?,
            BackendKind::Jacorb => self.locate(kind, "JacORB IDL compiler not found")?,
            BackendKind::Openorb => self.locate(kind, "OpenORB IDL compiler not found")?,
        };

        Ok(Backend::new(
            kind,
            compiler,
            ArgumentContext {
                debug: self.options.debug,
                working_dir: self.options.working_dir.clone(),
            },
            InvokeOptions {
                debug: self.options.debug,
                fail_on_error: self.options.fail_on_error,
            },
            self.options.fork,
        ))
    }

    fn locate(&self, kind: BackendKind, missing: &str) -> Result<CompilerHandle> {
        let entry_point = kind.entry_point(self.environment.is_ibm());
        self.loader
            .load(entry_point)
            .map_err(|err| Error::BackendUnavailable {
                message: missing.to_string(),
                source: Some(Box::new(err)),
            })
    }

    /// The JDK 8 compiler lives in `tools.jar`, which is not on the default
    /// classpath; add it and try once more.
    fn locate_built_in(&mut self) -> Result<CompilerHandle> {
        let entry_point = BackendKind::BuiltIn.entry_point(self.environment.is_ibm());
        match self.loader.load(entry_point) {
            Ok(handle) => Ok(handle),
            Err(LoadError::NotFound(_)) => {
                self.load_with_tools_jar(entry_point)
                    .map_err(|second| Error::BackendUnavailable {
                        message: self.second_try_message(&second).to_string(),
                        source: Some(Box::new(second)),
                    })
            }
            Err(other) => Err(Error::BackendUnavailable {
                message: IDL_COMPILER_NOT_AVAILABLE.to_string(),
                source: Some(Box::new(other)),
            }),
        }
    }

    fn load_with_tools_jar(
        &mut self,
        entry_point: &str,
    ) -> std::result::Result<CompilerHandle, LoadError> {
        let tools_jar = self
            .environment
            .tools_jar()
            .ok_or_else(|| LoadError::NotFound(entry_point.to_string()))?;
        info!("Retrying IDL compiler lookup with {}", tools_jar.display());
        self.loader.prepend_search_path(&[tools_jar]);

        if self.environment.is_hotspot() {
            self.loader.load(HOTSPOT_FILE_LOCATOR)?;
        }
        self.loader.load(entry_point)
    }

    fn second_try_message(&self, err: &LoadError) -> &'static str {
        if matches!(err, LoadError::NotFound(_)) && self.environment.has_module_system() {
            USE_GLASSFISH_IDL
        } else {
            IDL_COMPILER_NOT_AVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GLASSFISH_ENTRY_POINT, IBM_IDLJ_ENTRY_POINT, ORACLE_IDLJ_ENTRY_POINT};
    use crate::invoker::EntryResult;
    use std::io::Write;
    use std::sync::Arc;

    /// Knows a fixed set of classes, optionally only once a given entry is on the path.
    #[derive(Default)]
    struct FakeLoader {
        available: Vec<&'static str>,
        needs_on_path: Option<&'static str>,
        prepended: Vec<PathBuf>,
        loads: std::cell::RefCell<Vec<String>>,
    }

    impl CompilerLoader for FakeLoader {
        fn prepend_search_path(&mut self, entries: &[PathBuf]) {
            let mut path = entries.to_vec();
            path.append(&mut self.prepended);
            self.prepended = path;
        }

        fn search_path(&self) -> Vec<PathBuf> {
            self.prepended.clone()
        }

        fn load(&self, entry_point: &str) -> std::result::Result<CompilerHandle, LoadError> {
            self.loads.borrow_mut().push(entry_point.to_string());
            let reachable = match self.needs_on_path {
                Some(required) => self.prepended.iter().any(|p| p.ends_with(required)),
                None => true,
            };
            if reachable && self.available.iter().any(|c| *c == entry_point) {
                Ok(CompilerHandle::in_process(
                    entry_point,
                    Arc::new(
                        |_: &[String], _: &mut dyn Write, _: &mut dyn Write| -> EntryResult {
                            Ok(0)
                        },
                    ),
                ))
            } else {
                Err(LoadError::NotFound(entry_point.to_string()))
            }
        }
    }

    fn options() -> LocatorOptions {
        LocatorOptions {
            debug: false,
            fail_on_error: true,
            fork: true,
            working_dir: PathBuf::from("/work"),
        }
    }

    fn jdk8() -> RuntimeEnvironment {
        RuntimeEnvironment {
            java_home: Some(PathBuf::from("/usr/lib/jvm/java-8/jre")),
            java_version: Some("1.8.0_292".into()),
            vm_vendor: Some("Oracle Corporation".into()),
            vm_name: None,
        }
    }

    fn jdk11() -> RuntimeEnvironment {
        RuntimeEnvironment {
            java_version: Some("11.0.2".into()),
            ..jdk8()
        }
    }

    fn everything() -> FakeLoader {
        FakeLoader {
            available: vec![
                ORACLE_IDLJ_ENTRY_POINT,
                IBM_IDLJ_ENTRY_POINT,
                GLASSFISH_ENTRY_POINT,
                "org.jacorb.idl.parser",
                "org.openorb.compiler.IdlCompiler",
                HOTSPOT_FILE_LOCATOR,
            ],
            ..FakeLoader::default()
        }
    }

    #[test]
    fn explicit_names_select_their_backend() {
        let mut locator = BackendLocator::new(everything(), jdk8(), options());
        for kind in BackendKind::ALL {
            assert_eq!(locator.resolve(Some(kind.name())).unwrap().kind(), kind);
        }
        let glassfish = locator.resolve(Some("glassfish")).unwrap();
        assert_eq!(glassfish.compiler().name, GLASSFISH_ENTRY_POINT);
    }

    #[test]
    fn unknown_name_is_rejected_before_loading_anything() {
        let mut locator = BackendLocator::new(everything(), jdk8(), options());
        let err = locator.resolve(Some("unknown")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedBackend(name) if name == "unknown"));
        assert!(locator.loader().loads.borrow().is_empty());
    }

    #[test]
    fn default_follows_the_module_system() {
        let mut legacy = BackendLocator::new(everything(), jdk8(), options());
        assert_eq!(legacy.resolve(None).unwrap().kind(), BackendKind::BuiltIn);

        let mut modern = BackendLocator::new(everything(), jdk11(), options());
        assert_eq!(modern.resolve(None).unwrap().kind(), BackendKind::Glassfish);
    }

    #[test]
    fn ibm_vm_uses_ibm_compiler_class() {
        let env = RuntimeEnvironment {
            vm_vendor: Some("IBM Corporation".into()),
            ..jdk8()
        };
        let mut locator = BackendLocator::new(everything(), env, options());
        let backend = locator.resolve(Some("idlj")).unwrap();
        assert_eq!(backend.compiler().name, IBM_IDLJ_ENTRY_POINT);
    }

    #[test]
    fn built_in_compiler_found_after_adding_tools_jar() {
        let loader = FakeLoader {
            needs_on_path: Some("tools.jar"),
            ..everything()
        };
        let mut locator = BackendLocator::new(loader, jdk8(), options());
        let backend = locator.resolve(Some("idlj")).unwrap();
        assert_eq!(backend.compiler().name, ORACLE_IDLJ_ENTRY_POINT);
        assert_eq!(
            locator.loader().search_path(),
            vec![PathBuf::from("/usr/lib/jvm/java-8/jre/../lib/tools.jar")]
        );
    }

    #[test]
    fn hotspot_retry_also_requires_the_file_locator() {
        let env = RuntimeEnvironment {
            vm_name: Some("Java HotSpot(TM) 64-Bit Server VM".into()),
            ..jdk8()
        };
        let loader = FakeLoader {
            available: vec![ORACLE_IDLJ_ENTRY_POINT],
            needs_on_path: Some("tools.jar"),
            ..FakeLoader::default()
        };
        let mut locator = BackendLocator::new(loader, env, options());
        let err = locator.resolve(Some("idlj")).unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable { .. }));
        assert!(locator
            .loader()
            .loads
            .borrow()
            .contains(&HOTSPOT_FILE_LOCATOR.to_string()));
    }

    #[test]
    fn missing_compiler_on_modern_jdk_recommends_glassfish() {
        let mut locator = BackendLocator::new(FakeLoader::default(), jdk11(), options());
        let err = locator.resolve(Some("idlj")).unwrap_err();
        assert!(err.to_string().contains("Use the glassfish compiler"));
        assert_eq!(locator.loader().search_path().len(), 1);
    }

    #[test]
    fn missing_compiler_on_jdk8_is_plainly_unavailable() {
        let mut locator = BackendLocator::new(FakeLoader::default(), jdk8(), options());
        let err = locator.resolve(Some("idlj")).unwrap_err();
        assert_eq!(err.to_string(), IDL_COMPILER_NOT_AVAILABLE);
    }

    #[test]
    fn third_party_compilers_report_their_own_absence() {
        let mut locator = BackendLocator::new(FakeLoader::default(), jdk11(), options());
        let err = locator.resolve(Some("jacorb")).unwrap_err();
        assert_eq!(err.to_string(), "JacORB IDL compiler not found");
        let err = locator.resolve(Some("openorb")).unwrap_err();
        assert_eq!(err.to_string(), "OpenORB IDL compiler not found");
        assert!(locator.loader().search_path().is_empty());
    }
}
