// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data structures for configuring the launcher.

use {
    crate::extension::ExtensionModule,
    std::{
        ffi::{OsStr, OsString},
        path::PathBuf,
    },
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Name of the environment variable holding the module search path.
pub const DEFAULT_SEARCH_PATH_VARIABLE: &str = "PYTHONPATH";

#[cfg(target_os = "android")]
const DEFAULT_SEARCH_PATH: &str = "/data/local/tmp/mini_python/lib";

#[cfg(all(unix, not(target_os = "android")))]
const DEFAULT_SEARCH_PATH: &str = "/usr/local/lib/mini_python";

#[cfg(windows)]
const DEFAULT_SEARCH_PATH: &str = ".\\lib";

/// Describes how the module search path environment variable is defaulted.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct SearchPathConfig {
    /// Environment variable consulted by the interpreter.
    pub variable: String,

    /// Value injected when the variable is absent from the environment.
    pub default: PathBuf,
}

impl Default for SearchPathConfig {
    fn default() -> Self {
        Self {
            variable: DEFAULT_SEARCH_PATH_VARIABLE.to_string(),
            default: PathBuf::from(DEFAULT_SEARCH_PATH),
        }
    }
}

impl SearchPathConfig {
    /// Decide which value, if any, the variable should be set to.
    ///
    /// `current` is the value inherited from the parent process. A value that
    /// is present, even an empty one, is never replaced.
    pub fn resolve(&self, current: Option<&OsStr>) -> Option<OsString> {
        match current {
            Some(_) => None,
            None => Some(self.default.clone().into_os_string()),
        }
    }

    /// Resolve against the process environment and apply the result.
    ///
    /// Returns the value that was written, if any.
    pub fn apply_to_environment(&self) -> Option<OsString> {
        let current = std::env::var_os(&self.variable);

        let value = self.resolve(current.as_deref())?;
        std::env::set_var(&self.variable, &value);

        Some(value)
    }
}

/// Controls which fallback extension modules may be registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct Availability {
    /// Register a stub `_struct` module.
    pub struct_module: bool,

    /// Register a stub `_multiprocessing` module.
    pub multiprocessing_module: bool,
}

impl Default for Availability {
    fn default() -> Self {
        Self::from_features()
    }
}

impl Availability {
    /// Availability as compiled in via crate features.
    pub fn from_features() -> Self {
        Self {
            struct_module: cfg!(feature = "fallback-struct"),
            multiprocessing_module: cfg!(feature = "fallback-multiprocessing"),
        }
    }

    /// Availability with every fallback module disabled.
    pub fn none() -> Self {
        Self {
            struct_module: false,
            multiprocessing_module: false,
        }
    }

    /// Intersect with another availability.
    ///
    /// Configuration can only switch off what the build provides.
    pub fn restrict(self, other: Availability) -> Self {
        Self {
            struct_module: self.struct_module && other.struct_module,
            multiprocessing_module: self.multiprocessing_module && other.multiprocessing_module,
        }
    }
}

/// Configuration of a launcher run.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct LauncherConfig {
    /// Module search path defaulting.
    pub search_path: SearchPathConfig,

    /// Fallback modules permitted when the embedded modules can't be registered.
    pub fallback: Availability,

    /// Precompiled extension modules to register before interpreter start.
    ///
    /// These are function pointers into the embedding binary and can't be
    /// expressed in a configuration file. The `mini_python` executable leaves
    /// this empty, so fallback modules are only reached by embedders that
    /// populate it through the library API.
    #[cfg_attr(feature = "serialization", serde(skip))]
    pub embedded_modules: Vec<ExtensionModule>,
}

#[cfg(feature = "serialization")]
impl LauncherConfig {
    /// Parse a config from YAML. Missing fields keep their default values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}
