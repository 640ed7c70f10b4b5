use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use idlgen::backend::BackendKind;
use idlgen::config::{BuildSettings, Manifest, Scope, MANIFEST_FILE};
use idlgen::executor::Orchestrator;
use idlgen::locator::{BackendLocator, ClasspathLoader, LocatorOptions, RuntimeEnvironment};
use idlgen::workspace::{AnnouncingRegistry, OsWorkspace};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "idlgen",
    about = "Incremental CORBA IDL to Java translation",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate the stale IDL files of the main source tree
    Generate(RunArgs),
    /// Translate the stale IDL files of the test source tree
    GenerateTest(RunArgs),
    /// List the IDL files that would be translated
    Stale {
        #[command(flatten)]
        run: RunArgs,
        /// Inspect the test source tree instead of the main one
        #[arg(long)]
        test: bool,
    },
    /// List the supported IDL compilers
    Backends,
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Path to the manifest
    #[arg(long, default_value = MANIFEST_FILE)]
    manifest: PathBuf,
    /// IDL compiler to use (idlj, glassfish, jacorb, openorb)
    #[arg(long)]
    compiler: Option<String>,
    /// Log debug output and pass debug flags to the compiler
    #[arg(long)]
    debug: bool,
    /// Keep going when the compiler reports errors
    #[arg(long)]
    no_fail_on_error: bool,
    /// Tolerance in milliseconds before a source counts as newer than its marker
    #[arg(long)]
    stale_millis: Option<u64>,
    /// Never run the compiler in a child process
    #[arg(long)]
    no_fork: bool,
}

impl RunArgs {
    fn settings(&self, scope: Scope) -> Result<BuildSettings> {
        let manifest = Manifest::load_or_default(&self.manifest)?;
        let mut settings = manifest.settings(&Manifest::manifest_dir(&self.manifest), scope);
        if self.compiler.is_some() {
            settings.compiler = self.compiler.clone();
        }
        settings.debug |= self.debug;
        settings.fail_on_error &= !self.no_fail_on_error;
        settings.fork &= !self.no_fork;
        if let Some(millis) = self.stale_millis {
            settings.stale_millis = millis;
        }
        Ok(settings)
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn generate(args: &RunArgs, scope: Scope) -> Result<()> {
    let settings = args.settings(scope)?;
    let environment = RuntimeEnvironment::probe();
    let loader = ClasspathLoader::with_environment_classpath(
        &settings.classpath,
        environment.java_executable(),
    );
    let working_dir = std::env::current_dir().context("Failed to read the current directory")?;
    let options = LocatorOptions {
        debug: settings.debug,
        fail_on_error: settings.fail_on_error,
        fork: settings.fork,
        working_dir,
    };
    let mut locator = BackendLocator::new(loader, environment, options);

    let mut orchestrator = Orchestrator::new(settings, OsWorkspace, AnnouncingRegistry::default());
    let summary = orchestrator
        .execute(&mut locator)
        .context("IDL translation failed")?;
    info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "IDL translation finished"
    );
    Ok(())
}

fn list_stale(args: &RunArgs, test: bool) -> Result<()> {
    let scope = if test { Scope::Test } else { Scope::Main };
    let settings = args.settings(scope)?;
    let orchestrator = Orchestrator::new(settings, OsWorkspace, AnnouncingRegistry::default());
    for planned in orchestrator.plan()? {
        for file in planned.stale {
            println!("{}", file.path.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let debug = match &cli.command {
        Commands::Generate(run) | Commands::GenerateTest(run) => run.debug,
        Commands::Stale { run, .. } => run.debug,
        Commands::Backends => false,
    };
    init_logging(debug);

    match cli.command {
        Commands::Generate(run) => generate(&run, Scope::Main),
        Commands::GenerateTest(run) => generate(&run, Scope::Test),
        Commands::Stale { run, test } => list_stale(&run, test),
        Commands::Backends => {
            for kind in BackendKind::ALL {
                let modes = if kind.supports_fork() {
                    "in-process or forked"
                } else {
                    "in-process"
                };
                println!("{:<10} {}", kind.name(), modes);
            }
            Ok(())
        }
    }
}
