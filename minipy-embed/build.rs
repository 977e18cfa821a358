// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

fn main() {
    println!("cargo:rerun-if-env-changed=PYO3_PYTHON");
    println!("cargo:rerun-if-env-changed=PYO3_CONFIG_FILE");

    // Tests configure the interpreter as if it were the Python executable pyo3
    // links against, so path calculation finds its standard library.
    let config = pyo3_build_config::get();
    if let Some(executable) = &config.executable {
        println!("cargo:rustc-env=PYTHON_INTERPRETER_PATH={}", executable);
    }
}
