// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Extension modules registered before interpreter start.

Two kinds of modules flow through here. Precompiled modules linked into the
embedding binary are described by [ExtensionModule] and handed to the
embedded modules initializer. When that initializer fails, the launcher
substitutes stub modules from a [FallbackRegistry] so that `import _struct`
and `import _multiprocessing` still resolve to *something*.

The stubs expose no functions. Their only purpose is to exist.
*/

use {
    crate::config::Availability,
    pyo3::ffi as pyffi,
    std::{borrow::Cow, ffi::CStr, ptr::addr_of_mut},
};

/// Signature of a `PyInit_*` module initialization function.
pub type InitFunc = unsafe extern "C" fn() -> *mut pyffi::PyObject;

/// Defines an extension module to register with the interpreter.
#[derive(Clone, Copy, Debug)]
pub struct ExtensionModule {
    /// Name of the extension module.
    pub name: &'static CStr,

    /// Extension module initialization function.
    pub init_func: InitFunc,
}

impl ExtensionModule {
    pub fn name_lossy(&self) -> Cow<'static, str> {
        self.name.to_string_lossy()
    }
}

pub const STRUCT_MODULE_NAME: &CStr = c"_struct";
pub const MULTIPROCESSING_MODULE_NAME: &CStr = c"_multiprocessing";

static mut STRUCT_MODULE_DEF: pyffi::PyModuleDef = pyffi::PyModuleDef {
    m_base: pyffi::PyModuleDef_HEAD_INIT,
    m_name: STRUCT_MODULE_NAME.as_ptr(),
    m_doc: c"Placeholder for the unavailable struct accelerator.".as_ptr(),
    m_size: 0,
    m_methods: std::ptr::null_mut(),
    m_slots: std::ptr::null_mut(),
    m_traverse: None,
    m_clear: None,
    m_free: None,
};

static mut MULTIPROCESSING_MODULE_DEF: pyffi::PyModuleDef = pyffi::PyModuleDef {
    m_base: pyffi::PyModuleDef_HEAD_INIT,
    m_name: MULTIPROCESSING_MODULE_NAME.as_ptr(),
    m_doc: c"Placeholder for the unavailable multiprocessing accelerator.".as_ptr(),
    m_size: 0,
    m_methods: std::ptr::null_mut(),
    m_slots: std::ptr::null_mut(),
    m_traverse: None,
    m_clear: None,
    m_free: None,
};

/// Module initialization function for the `_struct` stub.
#[allow(non_snake_case)]
pub extern "C" fn PyInit__struct() -> *mut pyffi::PyObject {
    unsafe { pyffi::PyModule_Create(addr_of_mut!(STRUCT_MODULE_DEF)) }
}

/// Module initialization function for the `_multiprocessing` stub.
#[allow(non_snake_case)]
pub extern "C" fn PyInit__multiprocessing() -> *mut pyffi::PyObject {
    unsafe { pyffi::PyModule_Create(addr_of_mut!(MULTIPROCESSING_MODULE_DEF)) }
}

/// Stub registered in place of the `_struct` extension.
pub const STRUCT_FALLBACK: ExtensionModule = ExtensionModule {
    name: STRUCT_MODULE_NAME,
    init_func: PyInit__struct,
};

/// Stub registered in place of the `_multiprocessing` extension.
pub const MULTIPROCESSING_FALLBACK: ExtensionModule = ExtensionModule {
    name: MULTIPROCESSING_MODULE_NAME,
    init_func: PyInit__multiprocessing,
};

/// Read-only table of modules to register when embedded modules are unavailable.
///
/// Entries are unique by name and keep their insertion order, which is the
/// order they get registered in.
#[derive(Clone, Debug, Default)]
pub struct FallbackRegistry {
    modules: Vec<ExtensionModule>,
}

impl FallbackRegistry {
    /// Construct the registry of stub modules permitted by `availability`.
    pub fn from_availability(availability: Availability) -> Self {
        let mut modules = vec![];

        if availability.struct_module {
            modules.push(STRUCT_FALLBACK);
        }
        if availability.multiprocessing_module {
            modules.push(MULTIPROCESSING_FALLBACK);
        }

        modules.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Look up the factory for a module name.
    pub fn get(&self, name: &str) -> Option<&ExtensionModule> {
        self.modules
            .iter()
            .find(|m| m.name.to_bytes() == name.as_bytes())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtensionModule> {
        self.modules.iter()
    }
}

impl FromIterator<ExtensionModule> for FallbackRegistry {
    fn from_iter<I: IntoIterator<Item = ExtensionModule>>(iter: I) -> Self {
        let mut modules: Vec<ExtensionModule> = vec![];

        for module in iter {
            if let Some(existing) = modules.iter_mut().find(|m| m.name == module.name) {
                *existing = module;
            } else {
                modules.push(module);
            }
        }

        Self { modules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_all_available() {
        let registry = FallbackRegistry::from_availability(Availability {
            struct_module: true,
            multiprocessing_module: true,
        });

        assert_eq!(registry.len(), 2);
        let names = registry
            .iter()
            .map(|m| m.name_lossy().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["_struct", "_multiprocessing"]);
        assert!(registry.get("_struct").is_some());
        assert!(registry.get("_multiprocessing").is_some());
        assert!(registry.get("select").is_none());
    }

    #[test]
    fn registry_respects_availability() {
        let registry = FallbackRegistry::from_availability(Availability {
            struct_module: false,
            multiprocessing_module: true,
        });
        assert_eq!(registry.len(), 1);
        assert!(registry.get("_struct").is_none());

        assert!(FallbackRegistry::from_availability(Availability::none()).is_empty());
    }

    #[test]
    fn duplicate_names_collapse() {
        let registry = [STRUCT_FALLBACK, MULTIPROCESSING_FALLBACK, STRUCT_FALLBACK]
            .into_iter()
            .collect::<FallbackRegistry>();

        assert_eq!(registry.len(), 2);
    }
}
