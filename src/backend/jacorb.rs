use super::paths::{display_arg, relative_to_working_dir};
use super::ArgumentContext;
use crate::config::BackendConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};

pub(super) fn emit_flags(emit_stubs: bool, emit_skeletons: bool) -> &'static [&'static str] {
    match (emit_stubs, emit_skeletons) {
        (true, true) => &[],
        (true, false) => &["-noskel"],
        (false, true) => &["-nostub"],
        (false, false) => &["-noskel", "-nostub"],
    }
}

pub(super) fn arguments(
    ctx: &ArgumentContext,
    config: &BackendConfig,
    include_dirs: &[PathBuf],
    output_dir: &Path,
    source_file: &Path,
) -> Result<Vec<String>> {
    let mut args = Vec::new();

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

    // -i2jpackage maps an IDL scope to a Java package; an empty scope is global.
    if let Some(prefix) = &config.package_prefix {
        args.push("-i2jpackage".to_string());
        args.push(format!(":{prefix}"));
    }
    for prefix in &config.package_prefixes {
        args.push("-i2jpackage".to_string());
        args.push(format!(
            "{}:{}.{}",
            prefix.type_name, prefix.prefix, prefix.type_name
        ));
    }
    for translation in &config.package_translations {
        args.push("-i2jpackage".to_string());
        args.push(format!(
            "{}:{}",
            translation.type_name, translation.replacement_package
        ));
    }

    for define in &config.defines {
        match &define.value {
            Some(value) => args.push(format!("-D{}={}", define.symbol, value)),
            None => args.push(format!("-D{}", define.symbol)),
        }
    }

    if config.compatible {
        tracing::debug!("jacorb has no compatibility mode; ignoring it");
    }

    args.extend(config.extra_args.iter().cloned());
    args.push(display_arg(source_file));
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Define, PackagePrefix, PackageTranslation};

    fn ctx() -> ArgumentContext {
        ArgumentContext {
            debug: true,
            working_dir: PathBuf::from("/work"),
        }
    }

    fn build(config: &BackendConfig) -> Vec<String> {
        arguments(
            &ctx(),
            config,
            &[PathBuf::from("/work/src/main/idl")],
            Path::new("/work/target/idl"),
            Path::new("/work/src/main/idl/bank.idl"),
        )
        .unwrap()
    }

    #[test]
    fn default_arguments() {
        assert_eq!(
            build(&BackendConfig::default()),
            vec![
                "-I/work/src/main/idl",
                "-d",
                "target/idl",
                "/work/src/main/idl/bank.idl"
            ]
        );
    }

    #[test]
    fn sloppy_names_only_when_asked() {
        assert!(!build(&BackendConfig::default()).contains(&"-sloppy_names".to_string()));

        let config = BackendConfig {
            extra_args: vec!["-arg1".into(), "arg2".into(), "-sloppy_names".into()],
            ..BackendConfig::default()
        };
        let args = build(&config);
        assert!(args.contains(&"-sloppy_names".to_string()));
        assert!(args.windows(2).any(|w| w == ["-arg1", "arg2"]));
    }

    #[test]
    fn package_options_map_to_i2jpackage() {
        let config = BackendConfig {
            package_prefix: Some("aPrefix".into()),
            package_prefixes: vec![PackagePrefix {
                type_name: "aType1".into(),
                prefix: "aPrefix1".into(),
            }],
            package_translations: vec![PackageTranslation {
                type_name: "aType2".into(),
                replacement_package: "org.acme".into(),
            }],
            ..BackendConfig::default()
        };
        let args = build(&config);
        assert!(args.windows(2).any(|w| w == ["-i2jpackage", ":aPrefix"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["-i2jpackage", "aType1:aPrefix1.aType1"]));
        assert!(args.windows(2).any(|w| w == ["-i2jpackage", "aType2:org.acme"]));
    }

    #[test]
    fn defines_keep_their_values() {
        let config = BackendConfig {
            defines: vec![Define::symbol("symbol1"), Define::valued("symbol2", "value2")],
            ..BackendConfig::default()
        };
        let args = build(&config);
        assert!(args.contains(&"-Dsymbol1".to_string()));
        assert!(args.contains(&"-Dsymbol2=value2".to_string()));
    }
}
