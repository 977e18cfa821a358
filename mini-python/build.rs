// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

fn main() {
    println!("cargo:rerun-if-env-changed=PYO3_PYTHON");
    println!("cargo:rerun-if-env-changed=PYO3_CONFIG_FILE");

    let config = pyo3_build_config::get();

    // A shared libpython outside the default search path must still be found
    // when the executable runs straight out of the target directory.
    if config.shared {
        if let Some(lib_dir) = &config.lib_dir {
            #[cfg(unix)]
            println!("cargo:rustc-link-arg=-Wl,-rpath,{}", lib_dir);
        }
    }

    if let Some(executable) = &config.executable {
        println!("cargo:rustc-env=PYTHON_INTERPRETER_PATH={}", executable);
    }
}
