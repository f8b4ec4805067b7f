// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Dynamic plugin loading.
//!
//! Opens `<dir>/<lib>.<ext>` with libloading, checks the exported
//! [`PluginDeclaration`], and walks its factory enumeration. Every failure
//! path drops what was acquired so far in reverse order: the handle before
//! the library, the library before the path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use libloading::Library;

use super::abi::{FactoryEnumFn, HandleFactory, MEDIAGRAPH_ABI_VERSION, PLUGIN_SYMBOL, PluginDeclaration};
use crate::core::error::{GraphError, Result};
use crate::core::implementation::PluginHandle;

/// Opens plugin libraries from one search directory.
#[derive(Debug)]
pub struct PluginLoader {
    search_dir: PathBuf,
    open_libraries: Arc<AtomicUsize>,
}

impl PluginLoader {
    pub fn new(search_dir: impl Into<PathBuf>) -> Self {
        Self {
            search_dir: search_dir.into(),
            open_libraries: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn search_dir(&self) -> &Path {
        &self.search_dir
    }

    /// Libraries opened by this loader and not yet closed.
    pub fn open_libraries(&self) -> usize {
        self.open_libraries.load(Ordering::SeqCst)
    }

    /// Full path of library `lib`.
    pub fn library_path(&self, lib: &str) -> PathBuf {
        self.search_dir
            .join(format!("{}.{}", lib, std::env::consts::DLL_EXTENSION))
    }

    /// Open library `lib` and validate its declaration.
    pub fn open(&self, lib: &str) -> Result<PluginLibrary> {
        let path = self.library_path(lib);

        let library = unsafe { Library::new(&path) }.map_err(|e| {
            tracing::error!("[plugin] Can't load {}: {}", path.display(), e);
            GraphError::ResourceNotFound(format!("{}: {}", path.display(), e))
        })?;

        let declaration: &PluginDeclaration = unsafe {
            let symbol = library
                .get::<*const PluginDeclaration>(PLUGIN_SYMBOL)
                .map_err(|e| {
                    tracing::error!("[plugin] Can't find declaration in {}: {}", path.display(), e);
                    GraphError::ResourceNotFound(format!(
                        "{}: missing MEDIAGRAPH_PLUGIN symbol",
                        path.display()
                    ))
                })?;
            &**symbol
        };

        let enum_factories = check_declaration(declaration, &path)?;

        self.open_libraries.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[plugin] Opened {}", path.display());

        Ok(PluginLibrary {
            enum_factories,
            path,
            open_libraries: Arc::clone(&self.open_libraries),
            library,
        })
    }
}

/// Accept `declaration` only if it was built against this ABI version.
fn check_declaration(declaration: &PluginDeclaration, path: &Path) -> Result<FactoryEnumFn> {
    if declaration.abi_version != MEDIAGRAPH_ABI_VERSION {
        tracing::error!(
            "[plugin] ABI version mismatch for {}: plugin has v{}, host expects v{}",
            path.display(),
            declaration.abi_version,
            MEDIAGRAPH_ABI_VERSION
        );
        return Err(GraphError::IncompatiblePlugin(format!(
            "{}: ABI v{} (expected v{})",
            path.display(),
            declaration.abi_version,
            MEDIAGRAPH_ABI_VERSION
        )));
    }
    Ok(declaration.enum_factories)
}

/// An open plugin library. Closed on drop.
pub struct PluginLibrary {
    enum_factories: FactoryEnumFn,
    path: PathBuf,
    open_libraries: Arc<AtomicUsize>,
    // Last field: code must stay mapped until everything above is gone.
    library: Library,
}

impl std::fmt::Debug for PluginLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLibrary")
            .field("path", &self.path)
            .field("library", &self.library)
            .finish()
    }
}

impl PluginLibrary {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Factories exported by the library, in enumeration order.
    pub fn factories(&self) -> impl Iterator<Item = &HandleFactory> + '_ {
        let enum_factories = self.enum_factories;
        (0u32..).map_while(move |index| enum_factories(index))
    }

    /// Find the factory called `name`.
    pub fn find_factory(&self, name: &str) -> Result<&HandleFactory> {
        self.factories().find(|f| f.name == name).ok_or_else(|| {
            tracing::error!("[plugin] No factory '{}' in {}", name, self.path.display());
            GraphError::ResourceNotFound(format!(
                "factory '{}' in {}",
                name,
                self.path.display()
            ))
        })
    }
}

impl Drop for PluginLibrary {
    fn drop(&mut self) {
        self.open_libraries.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!("[plugin] Closing {}", self.path.display());
    }
}

/// A plugin object together with the library that provides its code.
///
/// Field order is drop order: the handle goes before the library.
pub struct LoadedPlugin {
    handle: Box<dyn PluginHandle>,
    factory_name: String,
    library: PluginLibrary,
}

impl LoadedPlugin {
    pub(crate) fn new(handle: Box<dyn PluginHandle>, factory_name: &str, library: PluginLibrary) -> Self {
        Self {
            handle,
            factory_name: factory_name.to_string(),
            library,
        }
    }

    pub fn handle(&self) -> &dyn PluginHandle {
        self.handle.as_ref()
    }

    pub fn factory_name(&self) -> &str {
        &self.factory_name
    }

    pub fn library_path(&self) -> &Path {
        self.library.path()
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("factory_name", &self.factory_name)
            .field("library", &self.library)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn test_missing_library_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = PluginLoader::new(dir.path());

        let err = loader.open("libdoes-not-exist").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Resource);
        assert_eq!(loader.open_libraries(), 0);
    }

    #[test]
    fn test_non_library_file_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = PluginLoader::new(dir.path());
        std::fs::write(loader.library_path("libgarbage"), b"not a shared object").unwrap();

        let err = loader.open("libgarbage").unwrap_err();

        assert!(matches!(err, GraphError::ResourceNotFound(_)));
        assert_eq!(loader.open_libraries(), 0);
    }

    #[allow(improper_ctypes_definitions)]
    extern "C" fn no_factories(_: u32) -> Option<&'static HandleFactory> {
        None
    }

    #[test]
    fn test_declaration_with_other_abi_version_is_incompatible() {
        let declaration = PluginDeclaration {
            abi_version: MEDIAGRAPH_ABI_VERSION + 1,
            enum_factories: no_factories,
        };

        let err = check_declaration(&declaration, Path::new("/plugins/libfuture.so")).unwrap_err();

        assert!(matches!(err, GraphError::IncompatiblePlugin(_)));
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let current = PluginDeclaration {
            abi_version: MEDIAGRAPH_ABI_VERSION,
            enum_factories: no_factories,
        };
        let enum_factories = check_declaration(&current, Path::new("/plugins/libnow.so")).unwrap();
        assert!(enum_factories(0).is_none());
    }

    #[test]
    fn test_library_path_uses_platform_extension() {
        let loader = PluginLoader::new("/plugins");
        let expected = format!("/plugins/libaudiotestsrc.{}", std::env::consts::DLL_EXTENSION);
        assert_eq!(loader.library_path("libaudiotestsrc"), PathBuf::from(expected));
    }
}
