// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Run a script in an embedded interpreter.

[Launcher::run()] walks a fixed sequence of steps:

1. Validate the invocation arguments.
2. Register embedded extension modules, substituting fallback stubs if that
   fails.
3. Default the module search path environment variable if it is absent.
4. Decode the program name.
5. Initialize the interpreter.
6. Allocate and decode the full argument vector.
7. Publish the argument vector to the interpreter.
8. Open the script file.
9. Execute the script.
10. Close the script file.
11. Release the decoded arguments and the program name.
12. Finalize the interpreter.

Nothing is retried. Every failure after step 5 releases whatever was
acquired and finalizes the interpreter before the error is returned.
*/

use {
    crate::{
        config::{Availability, LauncherConfig},
        error::{LaunchError, FINALIZE_FAILURE_EXIT_CODE},
        extension::FallbackRegistry,
        runtime::EmbeddedRuntime,
    },
    log::{debug, warn},
    std::ffi::{OsStr, OsString},
};

/// Validated process arguments.
///
/// Element 0 is the launcher, element 1 the script. Everything is forwarded
/// to the interpreter as `sys.argv`, including element 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    args: Vec<OsString>,
}

impl Invocation {
    pub fn new<I, T>(args: I) -> Result<Self, LaunchError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args = args.into_iter().map(|x| x.into()).collect::<Vec<_>>();

        if args.len() < 2 {
            return Err(LaunchError::Usage);
        }

        Ok(Self { args })
    }

    pub fn program(&self) -> &OsStr {
        &self.args[0]
    }

    pub fn script_path(&self) -> &OsStr {
        &self.args[1]
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

/// Everything the launcher decodes for the interpreter.
///
/// Fields drop in declaration order: the decoded arguments, then their
/// buffer, then the program name.
struct LaunchResources<W> {
    argv: Vec<W>,
    program_name: W,
}

impl<W> LaunchResources<W> {
    fn new(program_name: W) -> Self {
        Self {
            argv: Vec::new(),
            program_name,
        }
    }

    fn release(self) {
        debug!("releasing {} decoded arguments", self.argv.len());
        let Self { argv, program_name } = self;

        drop(argv);
        drop(program_name);
    }
}

/// Drives an [EmbeddedRuntime] through a single script execution.
pub struct Launcher<R: EmbeddedRuntime> {
    runtime: R,
    config: LauncherConfig,
    fallback: FallbackRegistry,
}

impl<R: EmbeddedRuntime> Launcher<R> {
    pub fn new(runtime: R, config: LauncherConfig) -> Self {
        let fallback = FallbackRegistry::from_availability(
            Availability::from_features().restrict(config.fallback),
        );

        Self {
            runtime,
            config,
            fallback,
        }
    }

    /// Replace the fallback modules registered when embedded modules fail.
    pub fn with_fallback_registry(mut self, registry: FallbackRegistry) -> Self {
        self.fallback = registry;
        self
    }

    pub fn fallback_registry(&self) -> &FallbackRegistry {
        &self.fallback
    }

    /// Run the script named by the arguments and return the process exit code.
    ///
    /// `args` are the full process arguments, starting with the launcher
    /// itself. On `Err`, the exit code is [LaunchError::exit_code()].
    ///
    /// If the script raises `SystemExit` or the interpreter aborts, the
    /// process exits from inside this call and nothing after script
    /// execution runs.
    pub fn run<I, T>(mut self, args: I) -> Result<i32, LaunchError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let invocation = Invocation::new(args)?;

        self.bootstrap_modules()?;

        if let Some(value) = self.config.search_path.apply_to_environment() {
            debug!(
                "set {} to {}",
                self.config.search_path.variable,
                value.to_string_lossy()
            );
        }

        let program_name = self
            .runtime
            .decode(invocation.program())
            .map_err(|msg| {
                debug!("decoding program name: {}", msg);
                LaunchError::DecodeArgument { index: 0 }
            })?;

        self.runtime.initialize(&program_name)?;
        debug!("interpreter initialized");

        let mut resources = LaunchResources::new(program_name);

        match self.execute(&invocation, &mut resources) {
            Ok(result) => {
                resources.release();
                Ok(self.finalize(result))
            }
            Err(err) => {
                resources.release();
                // The failure being reported wins over a finalization failure.
                let _ = self.finalize(0);
                Err(err)
            }
        }
    }

    fn bootstrap_modules(&mut self) -> Result<(), LaunchError> {
        let msg = match self
            .runtime
            .register_embedded_modules(&self.config.embedded_modules)
        {
            Ok(()) => {
                debug!(
                    "registered {} embedded modules",
                    self.config.embedded_modules.len()
                );
                return Ok(());
            }
            Err(msg) => msg,
        };

        warn!("embedded modules unavailable: {}", msg);

        for module in self.fallback.iter() {
            debug!("registering fallback module {}", module.name_lossy());

            self.runtime
                .register_fallback_module(module)
                .map_err(|msg| {
                    debug!("{}", msg);
                    LaunchError::FallbackRegistration {
                        name: module.name_lossy().into_owned(),
                    }
                })?;
        }

        Ok(())
    }

    fn execute(
        &mut self,
        invocation: &Invocation,
        resources: &mut LaunchResources<R::WideStr>,
    ) -> Result<i32, LaunchError> {
        let args = invocation.args();

        resources.argv = self
            .runtime
            .allocate_argv(args.len())
            .map_err(|_| LaunchError::AllocationFailed)?;

        for (index, arg) in args.iter().enumerate() {
            let value = self.runtime.decode(arg).map_err(|msg| {
                debug!("decoding argv[{}]: {}", index, msg);
                LaunchError::DecodeArgument { index }
            })?;

            resources.argv.push(value);
        }

        self.runtime.publish_argv(&resources.argv);

        let mut script = self
            .runtime
            .open_script(invocation.script_path())
            .map_err(|source| LaunchError::OpenScript {
                path: invocation.script_path().to_os_string(),
                source,
            })?;

        debug!("running {}", invocation.script_path().to_string_lossy());
        let result = self.runtime.run_script(&mut script);
        drop(script);

        debug!("script returned {}", result);

        Ok(result)
    }

    fn finalize(&mut self, result: i32) -> i32 {
        match self.runtime.finalize() {
            0 => result,
            status => {
                warn!("interpreter finalization failed ({})", status);
                FINALIZE_FAILURE_EXIT_CODE
            }
        }
    }
}
