use super::paths::{display_arg, relative_to_working_dir};
use super::{ArgumentContext, BackendKind, Feature};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

pub(super) fn emit_flags(emit_stubs: bool, emit_skeletons: bool) -> &'static [&'static str] {
    match (emit_stubs, emit_skeletons) {
        (true, true) => &[],
        // tie classes delegate to the skeleton, so they go with it
        (true, false) => &["-noskeleton", "-notie"],
        (false, true) => &["-nostub"],
        (false, false) => &["-noskeleton", "-nostub"],
    }
}

pub(super) fn arguments(
    ctx: &ArgumentContext,
    config: &BackendConfig,
    include_dirs: &[PathBuf],
    output_dir: &Path,
    source_file: &Path,
) -> Result<Vec<String>> {
    let unsupported = |feature| Error::UnsupportedFeature {
        backend: BackendKind::Openorb,
        feature,
    };
    if !config.package_prefixes.is_empty() {
        return Err(unsupported(Feature::PackagePrefixes));
    }
    if !config.package_translations.is_empty() {
        return Err(unsupported(Feature::PackageTranslations));
    }

    let mut args = Vec::new();
    if ctx.debug {
        args.push("-verbose".to_string());
    }

    for dir in include_dirs.iter().chain(&config.include_dirs) {
        args.push(format!("-I{}", display_arg(dir)));
    }

    args.push("-d".to_string());
    args.push(relative_to_working_dir(&ctx.working_dir, output_dir));

    args.extend(
        emit_flags(config.emit_stubs, config.emit_skeletons)
            .iter()
            .map(|flag| flag.to_string()),
    );

    if let Some(prefix) = &config.package_prefix {
        args.push("-package".to_string());
        args.push(prefix.clone());
    }

    for define in &config.defines {
        match &define.value {
            Some(value) => args.push(format!("-D{}={}", define.symbol, value)),
            None => args.push(format!("-D{}", define.symbol)),
        }
    }

    args.extend(config.extra_args.iter().cloned());
    args.push(display_arg(source_file));
    Ok(args)
}
