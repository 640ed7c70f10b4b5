//! Argument syntax of the idlj family: the JDK built-in compiler and its
//! Glassfish fork share one command line.

use super::paths::{display_arg, relative_to_working_dir};
use super::{ArgumentContext, BackendKind, Feature};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

pub(super) fn emit_flags(emit_stubs: bool, emit_skeletons: bool) -> &'static [&'static str] {
    match (emit_stubs, emit_skeletons) {
        (true, true) => &["-fallTIE"],
        (true, false) => &["-fclient"],
        (false, true) => &["-fserver"],
        (false, false) => &["-fserverTIE"],
    }
}

pub(super) fn arguments(
    kind: BackendKind,
    ctx: &ArgumentContext,
    config: &BackendConfig,
    include_dirs: &[PathBuf],
    output_dir: &Path,
    source_file: &Path,
) -> Result<Vec<String>> {
    let unsupported = |feature| Error::UnsupportedFeature {
        backend: kind,
        feature,
    };

    let mut args = Vec::new();
    if ctx.debug {
        args.push("-verbose".to_string());
    }

    for dir in include_dirs.iter().chain(&config.include_dirs) {
        args.push("-i".to_string());
        args.push(display_arg(dir));
    }

    args.push("-td".to_string());
    args.push(relative_to_working_dir(&ctx.working_dir, output_dir));

    if config.package_prefix.is_some() {
        return Err(unsupported(Feature::PackagePrefix));
    }

    for prefix in &config.package_prefixes {
        args.push("-pkgPrefix".to_string());
        args.push(prefix.type_name.clone());
        args.push(prefix.prefix.clone());
    }

    for translation in &config.package_translations {
        args.push("-pkgTranslate".to_string());
        args.push(translation.type_name.clone());
        args.push(translation.replacement_package.clone());
    }

    for define in &config.defines {
        if define.value.is_some() {
            return Err(unsupported(Feature::DefineValue));
        }
        args.push("-d".to_string());
        args.push(define.symbol.clone());
    }

    args.extend(
        emit_flags(config.emit_stubs, config.emit_skeletons)
            .iter()
            .map(|flag| flag.to_string()),
    );

    if config.compatible {
        args.push("-oldImplBase".to_string());
    }

    args.extend(config.extra_args.iter().cloned());
    args.push(display_arg(source_file));
    Ok(args)
}
