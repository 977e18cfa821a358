// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    pyo3::ffi as pyffi,
    std::{
        ffi::{CStr, OsString},
        fmt::{Display, Formatter},
    },
};

/// Exit code for every fatal launcher failure.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Exit code used when interpreter finalization fails.
///
/// This wins over whatever the script itself returned.
pub const FINALIZE_FAILURE_EXIT_CODE: i32 = 120;

/// Represents a fatal error encountered while launching a script.
///
/// All variants terminate the launcher with [FAILURE_EXIT_CODE]. By the time
/// a value of this type is handed back to the caller, every resource the
/// launcher acquired has already been released.
#[derive(Debug)]
pub enum LaunchError {
    /// No script path was given.
    Usage,
    /// An invocation argument could not be converted to a wide string.
    DecodeArgument { index: usize },
    /// The wide-string argument buffer could not be allocated.
    AllocationFailed,
    /// A fallback extension module was rejected by the interpreter.
    FallbackRegistration { name: String },
    /// The interpreter refused to start.
    InterpreterInit(String),
    /// The script file could not be opened for reading.
    OpenScript {
        path: OsString,
        source: std::io::Error,
    },
}

impl Display for LaunchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::Usage => f.write_str("Usage: mini_python script.py"),
            LaunchError::DecodeArgument { index } => write!(f, "cannot decode argv[{}]", index),
            LaunchError::AllocationFailed => f.write_str("memory allocation failed"),
            LaunchError::FallbackRegistration { name } => {
                write!(f, "could not register fallback module {}", name)
            }
            LaunchError::InterpreterInit(msg) => {
                write!(f, "failed to initialize Python interpreter: {}", msg)
            }
            LaunchError::OpenScript { path, .. } => {
                write!(f, "Could not open {}", path.to_string_lossy())
            }
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::OpenScript { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl LaunchError {
    /// The process exit code this error terminates with.
    pub fn exit_code(&self) -> i32 {
        FAILURE_EXIT_CODE
    }

    pub fn new_from_pystatus(status: &pyffi::PyStatus, context: &str) -> Self {
        if !status.func.is_null() && !status.err_msg.is_null() {
            let func = unsafe { CStr::from_ptr(status.func) };
            let msg = unsafe { CStr::from_ptr(status.err_msg) };

            LaunchError::InterpreterInit(format!(
                "during {}: {}: {}",
                context,
                func.to_string_lossy(),
                msg.to_string_lossy()
            ))
        } else if !status.err_msg.is_null() {
            let msg = unsafe { CStr::from_ptr(status.err_msg) };

            LaunchError::InterpreterInit(format!("during {}: {}", context, msg.to_string_lossy()))
        } else {
            LaunchError::InterpreterInit(format!("during {}: could not format PyStatus", context))
        }
    }
}
