// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::config::load_config,
    anyhow::Result,
    log::{debug, LevelFilter},
    minipy_embed::{CPythonRuntime, Launcher},
    std::str::FromStr,
};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "MINI_PYTHON_LOG";

const DEFAULT_LOG_FILTER: &str = "warn";

fn init_logging() {
    let env = env_logger::Env::default()
        .filter_or(LOG_ENV, DEFAULT_LOG_FILTER)
        .write_style("MINI_PYTHON_LOG_STYLE");

    let mut builder = env_logger::Builder::from_env(env);

    // Disable log context unless something chattier than the default was asked for.
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|value| LevelFilter::from_str(&value).ok())
        .unwrap_or(LevelFilter::Warn);

    if level <= LevelFilter::Warn {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();
}

/// Run the launcher for the current process.
///
/// Launch failures are reported here and turned into an exit code. An `Err`
/// means the launcher could not be set up at all.
pub fn run() -> Result<i32> {
    init_logging();

    let config = load_config()?;
    let runtime = CPythonRuntime::new()?;

    match Launcher::new(runtime, config).run(std::env::args_os()) {
        Ok(code) => {
            debug!("exiting with {}", code);
            Ok(code)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(e.exit_code())
        }
    }
}
