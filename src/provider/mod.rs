//! Engine collaborators: asset stores, stand-in providers, host environment
//!
//! The engine never touches storage or the player loop directly; it
//! goes through these traits. Objects minted here go into the graph's
//! shared object table, which is why every method takes `&Graph`.

mod dir_store;

pub use dir_store::DirAssetStore;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::graph::{Graph, ObjId};
use crate::types::TypeKey;

/// Asset access for asset-kind bindings.
///
/// Lookups are infallible at this layer: an absent asset is an empty
/// result, and the engine turns an empty candidate set into the
/// appropriate diagnostic.
pub trait AssetStore: Send + Sync {
    /// Primary asset at `path`
    fn load(&self, graph: &Graph, path: &str) -> Option<ObjId>;

    /// Every asset at `path`, in declaration order
    fn load_all(&self, graph: &Graph, path: &str) -> Vec<ObjId>;

    /// Assets under `folder`, path-ascending, optionally narrowed to
    /// types assignable to `ty`
    fn find_in_folder(&self, graph: &Graph, folder: &str, ty: Option<&TypeKey>) -> Vec<ObjId>;
}

/// Stand-in object generation for deferred bindings.
///
/// A stand-in site counts as resolved once the proxy exists; repeated
/// requests for the same type must return the same object.
pub trait StandIns: Send + Sync {
    fn get_or_create(&self, graph: &Graph, ty: &TypeKey) -> anyhow::Result<ObjId>;
}

/// The surrounding runtime the engine runs inside
pub trait HostEnv: Send + Sync {
    /// Whether the player loop is mid-frame; resolution is rejected
    /// outright while it is
    fn playback_active(&self) -> bool;
}

/// In-memory asset store, declared up front, minted lazily.
///
/// Declarations are keyed by path in a sorted map so folder scans are
/// path-ascending regardless of declaration order.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    declared: RwLock<BTreeMap<String, Vec<TypeKey>>>,
    minted: DashMap<String, Vec<ObjId>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one asset at `path` (repeatable; order preserved per path)
    pub fn declare(&self, path: impl Into<String>, ty: impl Into<TypeKey>) {
        self.declared
            .write()
            .entry(path.into())
            .or_default()
            .push(ty.into());
    }

    fn objects_at(&self, graph: &Graph, path: &str) -> Vec<ObjId> {
        if let Some(cached) = self.minted.get(path) {
            return cached.clone();
        }
        let tys = match self.declared.read().get(path) {
            Some(tys) => tys.clone(),
            None => return Vec::new(),
        };
        let objs: Vec<ObjId> = tys
            .iter()
            .enumerate()
            .map(|(i, ty)| graph.alloc_object(ty.clone(), format!("asset:{path}#{i}")))
            .collect();
        self.minted.insert(path.to_string(), objs.clone());
        objs
    }
}

impl AssetStore for MemoryAssetStore {
    fn load(&self, graph: &Graph, path: &str) -> Option<ObjId> {
        self.objects_at(graph, path).into_iter().next()
    }

    fn load_all(&self, graph: &Graph, path: &str) -> Vec<ObjId> {
        self.objects_at(graph, path)
    }

    fn find_in_folder(&self, graph: &Graph, folder: &str, ty: Option<&TypeKey>) -> Vec<ObjId> {
        let prefix = if folder.is_empty() || folder.ends_with('/') {
            folder.to_string()
        } else {
            format!("{folder}/")
        };
        let paths: Vec<String> = self
            .declared
            .read()
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect();
        let mut out = Vec::new();
        for path in paths {
            for obj in self.objects_at(graph, &path) {
                let keep = match (ty, graph.object_ty(obj)) {
                    (Some(filter), Some(obj_ty)) => graph.types().is_assignable(&obj_ty, filter),
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                if keep {
                    out.push(obj);
                }
            }
        }
        out
    }
}

/// Stand-in provider caching one proxy per requested type
#[derive(Default)]
pub struct CachedStandIns {
    cache: DashMap<TypeKey, ObjId>,
}

impl CachedStandIns {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StandIns for CachedStandIns {
    fn get_or_create(&self, graph: &Graph, ty: &TypeKey) -> anyhow::Result<ObjId> {
        let obj = *self
            .cache
            .entry(ty.clone())
            .or_insert_with(|| graph.alloc_object(ty.clone(), format!("stand_in:{ty}")));
        Ok(obj)
    }
}

/// Default host environment: an edit-time session with a settable
/// playback flag
#[derive(Default)]
pub struct DefaultEnv {
    playing: AtomicBool,
}

impl DefaultEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }
}

impl HostEnv for DefaultEnv {
    fn playback_active(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}
