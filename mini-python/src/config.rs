// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Loading launcher settings from a YAML file. */

use {
    anyhow::{Context, Result},
    log::debug,
    minipy_embed::LauncherConfig,
    std::path::Path,
};

/// Environment variable naming a YAML file with launcher settings.
pub const CONFIG_ENV: &str = "MINI_PYTHON_CONFIG";

/// Resolve the [LauncherConfig] for this process.
///
/// Defaults are used unless [CONFIG_ENV] names a file. Keys missing from
/// the file keep their default values.
pub fn load_config() -> Result<LauncherConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => load_config_path(Path::new(&path)),
        _ => Ok(LauncherConfig::default()),
    }
}

pub fn load_config_path(path: &Path) -> Result<LauncherConfig> {
    debug!("loading launcher config from {}", path.display());

    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;

    LauncherConfig::from_yaml_str(&yaml)
        .with_context(|| format!("parsing YAML in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use {super::*, std::path::PathBuf};

    #[test]
    fn load_partial_file() -> Result<()> {
        let td = tempfile::Builder::new()
            .prefix("mini-python-test-")
            .tempdir()?;
        let path = td.path().join("config.yaml");
        std::fs::write(
            &path,
            "search_path:\n  variable: MINI_PYTHON_TEST_PATH\nfallback:\n  struct_module: false\n",
        )?;

        let config = load_config_path(&path)?;
        assert_eq!(config.search_path.variable, "MINI_PYTHON_TEST_PATH");
        assert_eq!(
            config.search_path.default,
            LauncherConfig::default().search_path.default
        );
        assert!(!config.fallback.struct_module);

        Ok(())
    }

    #[test]
    fn load_missing_file() {
        let err = load_config_path(&PathBuf::from("/nonexistent/mini_python.yaml")).unwrap_err();
        assert!(format!("{:#}", err).starts_with("reading /nonexistent/mini_python.yaml"));
    }

    #[test]
    fn load_malformed_file() -> Result<()> {
        let td = tempfile::Builder::new()
            .prefix("mini-python-test-")
            .tempdir()?;
        let path = td.path().join("config.yaml");
        std::fs::write(&path, "search_path: [unterminated\n")?;

        let err = load_config_path(&path).unwrap_err();
        assert!(err.to_string().starts_with("parsing YAML in"));

        Ok(())
    }
}
