// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{
        error::LaunchError, extension::ExtensionModule, runtime::EmbeddedRuntime,
        LauncherConfig, SearchPathConfig,
    },
    libc::c_int,
    std::{
        cell::{Cell, RefCell},
        collections::TryReserveError,
        ffi::{OsStr, OsString},
        path::PathBuf,
        rc::Rc,
    },
};


pub const PYTHON_INTERPRETER_PATH: &str = match option_env!("PYTHON_INTERPRETER_PATH") {
    Some(path) => path,
    None => "python3",
};

/// Something a [RecordingRuntime] was asked to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    RegisterEmbedded(usize),
    RegisterFallback(String),
    Decode(String),
    Initialize {
        program_name: String,
        search_path: Option<OsString>,
    },
    Allocate(usize),
    PublishArgv(Vec<String>),
    OpenScript(String),
    RunScript,
    CloseScript,
    Release(String),
    Finalize,
}

/// Failures and results a [RecordingRuntime] is told to produce.
#[derive(Clone, Debug, Default)]
pub struct Behavior {
    pub embedded_fails: bool,
    pub fallback_fails_for: Option<&'static str>,
    pub decode_fails_for: Option<&'static str>,
    pub allocation_fails: bool,
    pub init_fails: bool,
    pub open_fails: bool,
    pub script_result: i32,
    pub finalize_status: c_int,
}

/// Shared log of events plus a count of wide strings not yet released.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    events: Rc<RefCell<Vec<Event>>>,
    live: Rc<Cell<usize>>,
}

impl Journal {
    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn live_strings(&self) -> usize {
        self.live.get()
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.events.borrow().contains(event)
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events.borrow().iter().position(|e| e == event)
    }
}

#[derive(Debug)]
pub struct RecordedStr {
    value: String,
    journal: Journal,
}

impl Drop for RecordedStr {
    fn drop(&mut self) {
        self.journal.live.set(self.journal.live.get() - 1);
        self.journal.record(Event::Release(self.value.clone()));
    }
}

#[derive(Debug)]
pub struct RecordedScript {
    journal: Journal,
}

impl Drop for RecordedScript {
    fn drop(&mut self) {
        self.journal.record(Event::CloseScript);
    }
}

/// An [EmbeddedRuntime] that records calls instead of running Python.
pub struct RecordingRuntime {
    behavior: Behavior,
    journal: Journal,
    search_path_variable: String,
}

impl RecordingRuntime {
    pub fn new(behavior: Behavior, search_path_variable: &str) -> (Self, Journal) {
        let journal = Journal::default();

        (
            Self {
                behavior,
                journal: journal.clone(),
                search_path_variable: search_path_variable.to_string(),
            },
            journal,
        )
    }
}

impl EmbeddedRuntime for RecordingRuntime {
    type WideStr = RecordedStr;
    type Script = RecordedScript;

    fn register_embedded_modules(&mut self, modules: &[ExtensionModule]) -> Result<(), String> {
        self.journal.record(Event::RegisterEmbedded(modules.len()));

        if self.behavior.embedded_fails {
            Err("embedded modules not linked".to_string())
        } else {
            Ok(())
        }
    }

    fn register_fallback_module(&mut self, module: &ExtensionModule) -> Result<(), String> {
        let name = module.name_lossy().into_owned();
        self.journal.record(Event::RegisterFallback(name.clone()));

        if self.behavior.fallback_fails_for == Some(name.as_str()) {
            Err(format!("refusing {}", name))
        } else {
            Ok(())
        }
    }

    fn decode(&self, value: &OsStr) -> Result<RecordedStr, &'static str> {
        let value = value.to_string_lossy().into_owned();
        self.journal.record(Event::Decode(value.clone()));

        if self.behavior.decode_fails_for == Some(value.as_str()) {
            return Err("invalid encoding");
        }

        self.journal.live.set(self.journal.live.get() + 1);

        Ok(RecordedStr {
            value,
            journal: self.journal.clone(),
        })
    }

    fn allocate_argv(&self, len: usize) -> Result<Vec<RecordedStr>, TryReserveError> {
        self.journal.record(Event::Allocate(len));

        // A request this large can never be satisfied.
        let request = if self.behavior.allocation_fails {
            usize::MAX
        } else {
            len
        };

        let mut argv = Vec::new();
        argv.try_reserve_exact(request)?;

        Ok(argv)
    }

    fn initialize(&mut self, program_name: &RecordedStr) -> Result<(), LaunchError> {
        self.journal.record(Event::Initialize {
            program_name: program_name.value.clone(),
            search_path: std::env::var_os(&self.search_path_variable),
        });

        if self.behavior.init_fails {
            Err(LaunchError::InterpreterInit("refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn publish_argv(&mut self, argv: &[RecordedStr]) {
        self.journal.record(Event::PublishArgv(
            argv.iter().map(|s| s.value.clone()).collect(),
        ));
    }

    fn open_script(&mut self, path: &OsStr) -> std::io::Result<RecordedScript> {
        self.journal
            .record(Event::OpenScript(path.to_string_lossy().into_owned()));

        if self.behavior.open_fails {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            ))
        } else {
            Ok(RecordedScript {
                journal: self.journal.clone(),
            })
        }
    }

    fn run_script(&mut self, _script: &mut RecordedScript) -> i32 {
        self.journal.record(Event::RunScript);
        self.behavior.script_result
    }

    fn finalize(&mut self) -> c_int {
        self.journal.record(Event::Finalize);
        self.behavior.finalize_status
    }
}

/// A launcher config whose search path variable is private to one test.
pub fn isolated_config(variable: &str) -> LauncherConfig {
    LauncherConfig {
        search_path: SearchPathConfig {
            variable: variable.to_string(),
            default: PathBuf::from("/fake/lib"),
        },
        ..LauncherConfig::default()
    }
}
