// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Calls into the embedded interpreter.

use {
    crate::{error::LaunchError, extension::ExtensionModule, pystr::OwnedPyStr},
    libc::c_int,
    log::warn,
    once_cell::sync::Lazy,
    pyo3::ffi as pyffi,
    std::{
        collections::TryReserveError,
        ffi::{CString, OsStr},
        mem::MaybeUninit,
        path::Path,
        ptr::{addr_of_mut, null_mut},
        sync::{Mutex, MutexGuard},
    },
};

#[cfg(unix)]
use std::os::unix::ffi::OsStrExt;

static GLOBAL_INTERPRETER_GUARD: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// The operations the launcher performs against an embedded interpreter.
///
/// Implementations own whatever process-global state the interpreter has.
/// Resources handed out by the runtime (`WideStr`, `Script`) release
/// themselves when dropped.
pub trait EmbeddedRuntime {
    /// An argument converted to the interpreter's wide string form.
    type WideStr;

    /// A script file opened for reading.
    type Script;

    /// Register precompiled extension modules linked into the binary.
    ///
    /// An `Err` means the modules are unavailable and fallbacks should be used.
    fn register_embedded_modules(&mut self, modules: &[ExtensionModule]) -> Result<(), String>;

    /// Register a single fallback module.
    fn register_fallback_module(&mut self, module: &ExtensionModule) -> Result<(), String>;

    /// Convert an argument to the interpreter's wide string form.
    fn decode(&self, value: &OsStr) -> Result<Self::WideStr, &'static str>;

    /// Allocate an empty buffer able to hold `len` decoded arguments.
    fn allocate_argv(&self, len: usize) -> Result<Vec<Self::WideStr>, TryReserveError> {
        let mut argv = Vec::new();
        argv.try_reserve_exact(len)?;

        Ok(argv)
    }

    /// Set the program name and start the interpreter.
    fn initialize(&mut self, program_name: &Self::WideStr) -> Result<(), LaunchError>;

    /// Make the decoded arguments the interpreter's `sys.argv`.
    fn publish_argv(&mut self, argv: &[Self::WideStr]);

    fn open_script(&mut self, path: &OsStr) -> std::io::Result<Self::Script>;

    /// Execute an opened script as `__main__`.
    ///
    /// The interpreter may exit the process from within this call.
    fn run_script(&mut self, script: &mut Self::Script) -> i32;

    /// Shut down the interpreter. Returns 0 on success.
    fn finalize(&mut self) -> c_int;
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum InterpreterState {
    NotStarted,
    Initialized,
    Finalized,
}

/// The CPython interpreter linked into this process.
///
/// Python interpreters have global state and there can only be a single
/// instance of this type per process. There exists a global lock enforcing
/// this. Calling `new()` will block waiting for this lock. The lock is
/// released when the instance is dropped.
pub struct CPythonRuntime {
    state: InterpreterState,
    _interpreter_guard: MutexGuard<'static, ()>,
}

impl CPythonRuntime {
    pub fn new() -> Result<Self, LaunchError> {
        let guard = GLOBAL_INTERPRETER_GUARD.lock().map_err(|_| {
            LaunchError::InterpreterInit("unable to acquire global interpreter guard".to_string())
        })?;

        Ok(Self {
            state: InterpreterState::NotStarted,
            _interpreter_guard: guard,
        })
    }

    /// Insert the directory of `argv[0]` at the front of `sys.path`.
    fn prepend_sys_path(&self, argv0: &OwnedPyStr) -> Result<(), &'static str> {
        let path0 = sys_path0(&argv0.to_string_lossy());

        unsafe {
            // Borrowed reference.
            let sys_path = pyffi::PySys_GetObject(c"path".as_ptr());
            if sys_path.is_null() || pyffi::PyList_Check(sys_path) == 0 {
                return Err("sys.path is not a list");
            }

            let item = pyffi::PyUnicode_FromStringAndSize(
                path0.as_ptr() as *const _,
                path0.len() as pyffi::Py_ssize_t,
            );
            if item.is_null() {
                pyffi::PyErr_Clear();
                return Err("unable to convert sys.path entry");
            }

            let res = pyffi::PyList_Insert(sys_path, 0, item);
            pyffi::Py_DecRef(item);

            if res != 0 {
                pyffi::PyErr_Clear();
                return Err("unable to insert into sys.path");
            }
        }

        Ok(())
    }

    fn set_sys_argv(&self, argv: &[OwnedPyStr]) -> Result<(), &'static str> {
        unsafe {
            let list = pyffi::PyList_New(argv.len() as pyffi::Py_ssize_t);
            if list.is_null() {
                pyffi::PyErr_Clear();
                return Err("unable to allocate sys.argv");
            }

            for (i, arg) in argv.iter().enumerate() {
                let item = pyffi::PyUnicode_FromWideChar(arg.as_wchar_ptr(), -1);
                if item.is_null() {
                    pyffi::PyErr_Clear();
                    pyffi::Py_DecRef(list);
                    return Err("unable to convert argument to str");
                }

                // Steals the reference to item.
                pyffi::PyList_SetItem(list, i as pyffi::Py_ssize_t, item);
            }

            let res = pyffi::PySys_SetObject(c"argv".as_ptr(), list);
            pyffi::Py_DecRef(list);

            if res != 0 {
                pyffi::PyErr_Clear();
                return Err("unable to set sys.argv");
            }
        }

        Ok(())
    }
}

impl EmbeddedRuntime for CPythonRuntime {
    type WideStr = OwnedPyStr;
    type Script = ScriptFile;

    fn register_embedded_modules(&mut self, modules: &[ExtensionModule]) -> Result<(), String> {
        if self.state != InterpreterState::NotStarted {
            return Err("interpreter already started".to_string());
        }

        if modules.is_empty() {
            return Ok(());
        }

        let mut table = modules
            .iter()
            .map(|m| pyffi::_inittab {
                name: m.name.as_ptr() as _,
                initfunc: Some(m.init_func),
            })
            .collect::<Vec<_>>();

        // Sentinel record with NULLs.
        table.push(pyffi::_inittab {
            name: null_mut::<libc::c_char>() as _,
            initfunc: None,
        });

        // The entries are copied. Names point at 'static data, so the table
        // itself can go away once this returns.
        match unsafe { pyffi::PyImport_ExtendInittab(table.as_mut_ptr()) } {
            0 => Ok(()),
            _ => Err(format!(
                "PyImport_ExtendInittab rejected {} modules",
                modules.len()
            )),
        }
    }

    fn register_fallback_module(&mut self, module: &ExtensionModule) -> Result<(), String> {
        if self.state != InterpreterState::NotStarted {
            return Err("interpreter already started".to_string());
        }

        match unsafe { pyffi::PyImport_AppendInittab(module.name.as_ptr(), Some(module.init_func)) }
        {
            0 => Ok(()),
            _ => Err(format!(
                "PyImport_AppendInittab failed for {}",
                module.name_lossy()
            )),
        }
    }

    fn decode(&self, value: &OsStr) -> Result<OwnedPyStr, &'static str> {
        OwnedPyStr::from_osstr(value)
    }

    fn initialize(&mut self, program_name: &OwnedPyStr) -> Result<(), LaunchError> {
        if self.state != InterpreterState::NotStarted {
            return Err(LaunchError::InterpreterInit(
                "interpreter cannot be initialized twice".to_string(),
            ));
        }

        let mut config = MaybeUninit::<pyffi::PyConfig>::zeroed();

        unsafe {
            let config_ptr = config.as_mut_ptr();
            pyffi::PyConfig_InitPythonConfig(config_ptr);

            // Arguments are published after initialization. There is nothing
            // for the interpreter to parse.
            (*config_ptr).parse_argv = 0;

            let status = pyffi::PyConfig_SetString(
                config_ptr,
                addr_of_mut!((*config_ptr).program_name),
                program_name.as_wchar_ptr(),
            );
            if pyffi::PyStatus_Exception(status) != 0 {
                pyffi::PyConfig_Clear(config_ptr);
                return Err(LaunchError::new_from_pystatus(
                    &status,
                    "setting program_name",
                ));
            }

            let status = pyffi::Py_InitializeFromConfig(config_ptr);
            pyffi::PyConfig_Clear(config_ptr);

            if pyffi::PyStatus_Exception(status) != 0 {
                return Err(LaunchError::new_from_pystatus(
                    &status,
                    "initializing Python",
                ));
            }
        }

        self.state = InterpreterState::Initialized;

        Ok(())
    }

    fn publish_argv(&mut self, argv: &[OwnedPyStr]) {
        if let Err(msg) = self.set_sys_argv(argv) {
            warn!("{}", msg);
            return;
        }

        if let Some(argv0) = argv.first() {
            if let Err(msg) = self.prepend_sys_path(argv0) {
                warn!("{}", msg);
            }
        }
    }

    fn open_script(&mut self, path: &OsStr) -> std::io::Result<ScriptFile> {
        ScriptFile::open(path)
    }

    fn run_script(&mut self, script: &mut ScriptFile) -> i32 {
        unsafe { pyffi::PyRun_SimpleFileExFlags(script.fp, script.path.as_ptr(), 0, null_mut()) }
    }

    fn finalize(&mut self) -> c_int {
        if self.state != InterpreterState::Initialized {
            return 0;
        }

        self.state = InterpreterState::Finalized;

        unsafe { pyffi::Py_FinalizeEx() }
    }
}

impl Drop for CPythonRuntime {
    fn drop(&mut self) {
        if self.state == InterpreterState::Initialized {
            let _ = self.finalize();
        }
    }
}

/// A script file opened with the C runtime's `fopen()`.
///
/// The interpreter's file-execution API wants a `FILE*`. The handle is closed
/// when this is dropped.
#[derive(Debug)]
pub struct ScriptFile {
    fp: *mut libc::FILE,
    path: CString,
}

impl ScriptFile {
    pub fn open(path: &OsStr) -> std::io::Result<Self> {
        let c_path = path_to_cstring(path)?;

        let fp = unsafe { libc::fopen(c_path.as_ptr(), c"r".as_ptr()) };
        if fp.is_null() {
            return Err(std::io::Error::last_os_error());
        }

        let script = Self { fp, path: c_path };

        // fopen() happily opens directories on POSIX.
        if !std::fs::metadata(path)?.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            ));
        }

        Ok(script)
    }
}

impl Drop for ScriptFile {
    fn drop(&mut self) {
        unsafe {
            libc::fclose(self.fp);
        }
    }
}

#[cfg(unix)]
fn path_to_cstring(path: &OsStr) -> std::io::Result<CString> {
    CString::new(path.as_bytes()).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

#[cfg(windows)]
fn path_to_cstring(path: &OsStr) -> std::io::Result<CString> {
    let path = path.to_str().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path is not valid Unicode")
    })?;

    CString::new(path).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

/// The `sys.path` entry derived from `argv[0]`.
///
/// This is the directory component of the value, or the empty string when
/// there is none.
pub fn sys_path0(argv0: &str) -> String {
    match Path::new(argv0).parent() {
        Some(parent) => parent.to_string_lossy().into_owned(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sys_path0_values() {
        assert_eq!(sys_path0("/usr/bin/mini_python"), "/usr/bin");
        assert_eq!(sys_path0("mini_python"), "");
        assert_eq!(sys_path0("/mini_python"), "/");
        assert_eq!(sys_path0(""), "");
    }

    #[test]
    fn open_missing_script() {
        let td = tempfile::Builder::new()
            .prefix("minipy-test-")
            .tempdir()
            .unwrap();
        let path = td.path().join("missing.py");

        let err = ScriptFile::open(path.as_os_str()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn open_existing_script() {
        let td = tempfile::Builder::new()
            .prefix("minipy-test-")
            .tempdir()
            .unwrap();
        let path = td.path().join("hello.py");
        std::fs::write(&path, "print('hello')\n").unwrap();

        ScriptFile::open(path.as_os_str()).unwrap();
    }

    #[test]
    fn open_directory_rejected() {
        let td = tempfile::Builder::new()
            .prefix("minipy-test-")
            .tempdir()
            .unwrap();

        let err = ScriptFile::open(td.path().as_os_str()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn default_allocate_argv() {
        let runtime = CPythonRuntime::new().unwrap();

        let argv = runtime.allocate_argv(3).unwrap();
        assert!(argv.is_empty());
        assert!(argv.capacity() >= 3);

        assert!(runtime.allocate_argv(usize::MAX).is_err());
    }
}
