// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*!
Launch a script in an embedded Python interpreter.

The `minipy-embed` crate contains the process lifecycle of a minimal Python
launcher: it registers extension modules, defaults the module search path,
decodes process arguments to the interpreter's wide string form, starts the
interpreter, runs a single script file and tears everything down again,
yielding a process exit code.

The most important types in this crate are [Launcher] and
[CPythonRuntime]. A [LauncherConfig] defines how the launcher behaves. A
[CPythonRuntime] is the interpreter linked into the current process. The
[Launcher] is generic over [EmbeddedRuntime] so the lifecycle can be driven
against other implementations, which is how its failure paths are tested.

```no_run
use minipy_embed::{CPythonRuntime, Launcher, LauncherConfig};

let runtime = CPythonRuntime::new().unwrap();
let code = match Launcher::new(runtime, LauncherConfig::default()).run(std::env::args_os()) {
    Ok(code) => code,
    Err(e) => {
        eprintln!("{}", e);
        e.exit_code()
    }
};
std::process::exit(code);
```

# Dependencies

The `pyo3` crate provides the raw bindings to the Python C API (its `ffi`
module). No higher-level `pyo3` functionality is used. `libc` provides
`fopen()` for the `FILE*` the interpreter's file execution API wants.
Logging goes through the `log` facade; installing a logger is up to the
executable.
*/

mod config;
mod error;
mod extension;
mod launcher;
mod pystr;
mod runtime;

#[cfg(test)]
mod test;

#[allow(unused_imports)]
pub use crate::{
    config::{Availability, LauncherConfig, SearchPathConfig, DEFAULT_SEARCH_PATH_VARIABLE},
    error::{LaunchError, FAILURE_EXIT_CODE, FINALIZE_FAILURE_EXIT_CODE},
    extension::{
        ExtensionModule, FallbackRegistry, InitFunc, MULTIPROCESSING_FALLBACK,
        MULTIPROCESSING_MODULE_NAME, STRUCT_FALLBACK, STRUCT_MODULE_NAME,
    },
    launcher::{Invocation, Launcher},
    pystr::OwnedPyStr,
    runtime::{sys_path0, CPythonRuntime, EmbeddedRuntime, ScriptFile},
};
