//! Arbor - tree-scoped dependency injection for component object graphs

pub mod binding;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod graph;
pub mod locator;
pub mod manifest;
pub mod provider;
pub mod registry;
pub mod stats;
pub mod types;

pub use binding::{validate, Binder, Binding, BindingKind, Predicate, Qualifiers};
pub use diagnostics::{DiagLog, Diagnostic, DiagnosticKind, Severity};
pub use engine::{Engine, Isolation, Phase};
pub use error::{ArborError, FixSuggestion};
pub use graph::{
    Cardinality, ConfigureFn, Context, ContextKind, Graph, Host, HostId, InjectionSite, Node,
    NodeId, ObjEntry, ObjId, Scope, ScopeId, SiteKind, Slot, SlotValue,
};
pub use locator::{Anchor, FactoryFn, LocateCx, Locator, Shape};
pub use manifest::{Manifest, SCENE_SCHEMA};
pub use provider::{
    AssetStore, CachedStandIns, DefaultEnv, DirAssetStore, HostEnv, MemoryAssetStore, StandIns,
};
pub use registry::GlobalRegistry;
pub use stats::RunStats;
pub use types::{TypeKey, TypeTable, COMPONENT_CONTRACT, SCOPE_TYPE};
