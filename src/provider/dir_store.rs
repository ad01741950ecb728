//! Directory-backed asset store
//!
//! Scans a directory tree once at open time and classifies files into
//! asset types through glob rules. Asset paths are the files' relative
//! paths with separators normalized to `/`; scan order is sorted by
//! file name, so folder lookups are deterministic across platforms.

use std::path::Path;

use glob::Pattern;
use walkdir::WalkDir;

use crate::error::ArborError;
use crate::graph::{Graph, ObjId};
use crate::provider::{AssetStore, MemoryAssetStore};
use crate::types::TypeKey;

/// A glob rule classifying files into an asset type
#[derive(Debug)]
pub struct TypeRule {
    pattern: Pattern,
    ty: TypeKey,
}

impl TypeRule {
    pub fn new(pattern: &str, ty: impl Into<TypeKey>) -> Result<Self, ArborError> {
        let pattern = Pattern::new(pattern).map_err(|e| ArborError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern, ty: ty.into() })
    }
}

/// Asset store over a scanned directory tree.
///
/// Files matching no rule are skipped. Delegates lookups to an
/// in-memory store built from the scan.
#[derive(Debug)]
pub struct DirAssetStore {
    inner: MemoryAssetStore,
}

impl DirAssetStore {
    pub fn open(root: impl AsRef<Path>, rules: &[TypeRule]) -> Result<Self, ArborError> {
        let root = root.as_ref();
        let inner = MemoryAssetStore::new();
        let walker = WalkDir::new(root).sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            if let Some(rule) = rules.iter().find(|r| r.pattern.matches(&rel)) {
                inner.declare(rel, rule.ty.clone());
            }
        }
        Ok(Self { inner })
    }
}

impl AssetStore for DirAssetStore {
    fn load(&self, graph: &Graph, path: &str) -> Option<ObjId> {
        self.inner.load(graph, path)
    }

    fn load_all(&self, graph: &Graph, path: &str) -> Vec<ObjId> {
        self.inner.load_all(graph, path)
    }

    fn find_in_folder(&self, graph: &Graph, folder: &str, ty: Option<&TypeKey>) -> Vec<ObjId> {
        self.inner.find_in_folder(graph, folder, ty)
    }
}
