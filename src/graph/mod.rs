//! Object graph: node tree, hosts, scopes, and the object table
//!
//! The graph is owned by the host environment and mutated between
//! runs; the engine reads it during a run and only writes injection
//! slots. Traversal is index-based and deterministic: depth-first,
//! child-index ascending, with no node lists cached across runs.

mod context;
mod site;

pub use context::{Context, ContextKind, Isolation};
pub use site::{Cardinality, InjectionSite, SiteKind, Slot, SlotValue};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::binding::Binder;
use crate::error::ArborError;
use crate::types::{TypeKey, TypeTable, SCOPE_TYPE};

macro_rules! index_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

index_id!(
    /// A position in the node tree
    NodeId
);
index_id!(
    /// A behavioral unit attached to a node
    HostId
);
index_id!(
    /// A binding-declaring host
    ScopeId
);
index_id!(
    /// An instance in the object table
    ObjId
);

/// A scope's configuration routine, invoked once per run.
/// An `Err` discards the scope's bindings for that run.
pub type ConfigureFn = Arc<dyn Fn(&mut Binder) -> anyhow::Result<()> + Send + Sync>;

/// A position in the tree
#[derive(Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub hosts: Vec<HostId>,
    pub scope: Option<ScopeId>,
    /// Owning scene identity (normally set on roots)
    pub scene: Option<Arc<str>>,
    /// This node is the root of a prefab asset
    pub prefab_asset: Option<Arc<str>>,
    /// This node is the root of a prefab instance
    pub prefab_instance: Option<Arc<str>>,
}

/// A behavioral unit attached to exactly one node
pub struct Host {
    pub node: NodeId,
    pub ty: TypeKey,
    /// The instance this host embodies in the object table
    pub object: ObjId,
    sites: Vec<InjectionSite>,
}

impl Host {
    /// Structural discovery of annotated injection sites
    pub fn sites(&self) -> &[InjectionSite] {
        &self.sites
    }

    pub fn site_mut(&mut self, index: usize) -> Option<&mut InjectionSite> {
        self.sites.get_mut(index)
    }
}

/// A host specialization that declares bindings for nearby nodes
pub struct Scope {
    pub node: NodeId,
    pub host: HostId,
    pub config: ConfigureFn,
}

/// An entry in the object table
#[derive(Debug, Clone)]
pub struct ObjEntry {
    pub ty: TypeKey,
    pub label: Arc<str>,
}

/// The component-based object graph
pub struct Graph {
    types: TypeTable,
    nodes: Vec<Node>,
    hosts: Vec<Host>,
    scopes: Vec<Scope>,
    roots: Vec<NodeId>,
    /// Interior-mutable so collaborators (asset stores, stand-in
    /// providers) can mint objects against a shared `&Graph`.
    objects: DashMap<u32, ObjEntry>,
    next_obj: AtomicU32,
}

impl Graph {
    pub fn new(types: TypeTable) -> Self {
        Self {
            types,
            nodes: Vec::new(),
            hosts: Vec::new(),
            scopes: Vec::new(),
            roots: Vec::new(),
            objects: DashMap::new(),
            next_obj: AtomicU32::new(0),
        }
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    // ─────────────────────────────────────────────────────────────
    // Tree construction
    // ─────────────────────────────────────────────────────────────

    fn push_node(&mut self, name: impl Into<String>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.into(),
            parent,
            children: Vec::new(),
            hosts: Vec::new(),
            scope: None,
            scene: None,
            prefab_asset: None,
            prefab_instance: None,
        });
        id
    }

    pub fn add_root(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.push_node(name, None);
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let id = self.push_node(name, Some(parent));
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn set_scene(&mut self, node: NodeId, scene: impl AsRef<str>) {
        self.nodes[node.index()].scene = Some(Arc::from(scene.as_ref()));
    }

    pub fn mark_prefab_asset(&mut self, node: NodeId, key: impl AsRef<str>) {
        self.nodes[node.index()].prefab_asset = Some(Arc::from(key.as_ref()));
    }

    pub fn mark_prefab_instance(&mut self, node: NodeId, key: impl AsRef<str>) {
        self.nodes[node.index()].prefab_instance = Some(Arc::from(key.as_ref()));
    }

    /// Attach a host of `ty` with its discovered sites.
    ///
    /// The host type must be assignable to the `Component` contract;
    /// interface-typed sites get a bridged slot.
    pub fn attach_host(
        &mut self,
        node: NodeId,
        ty: impl Into<TypeKey>,
        mut sites: Vec<InjectionSite>,
    ) -> Result<HostId, ArborError> {
        let ty = ty.into();
        if !self.types.is_component(&ty) {
            return Err(ArborError::NotAComponentType { ty: ty.to_string() });
        }
        for site in &mut sites {
            site.set_bridged(self.types.is_interface(&site.requested));
        }
        let label: Arc<str> =
            Arc::from(format!("{}/{}", self.nodes[node.index()].name, ty).as_str());
        let object = self.alloc_object(ty.clone(), label);
        let id = HostId(self.hosts.len() as u32);
        self.hosts.push(Host { node, ty, object, sites });
        self.nodes[node.index()].hosts.push(id);
        Ok(id)
    }

    /// Attach a scope (at most one per node); the scope itself is a
    /// host of the built-in `Scope` type.
    pub fn attach_scope(&mut self, node: NodeId, config: ConfigureFn) -> Result<ScopeId, ArborError> {
        if self.nodes[node.index()].scope.is_some() {
            return Err(ArborError::ScopeAlreadyAttached {
                node: self.nodes[node.index()].name.clone(),
            });
        }
        let host = self.attach_host(node, SCOPE_TYPE, Vec::new())?;
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope { node, host, config });
        self.nodes[node.index()].scope = Some(id);
        Ok(id)
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn host(&self, id: HostId) -> &Host {
        &self.hosts[id.index()]
    }

    pub fn host_mut(&mut self, id: HostId) -> &mut Host {
        &mut self.hosts[id.index()]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    // ─────────────────────────────────────────────────────────────
    // Object table
    // ─────────────────────────────────────────────────────────────

    /// Mint an instance (takes `&self`: collaborators mint against a
    /// shared graph during resolution)
    pub fn alloc_object(&self, ty: TypeKey, label: impl Into<Arc<str>>) -> ObjId {
        let id = self.next_obj.fetch_add(1, Ordering::SeqCst);
        self.objects.insert(id, ObjEntry { ty, label: label.into() });
        ObjId(id)
    }

    pub fn object(&self, id: ObjId) -> Option<ObjEntry> {
        self.objects.get(&id.0).map(|e| e.clone())
    }

    pub fn object_ty(&self, id: ObjId) -> Option<TypeKey> {
        self.objects.get(&id.0).map(|e| e.ty.clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    // ─────────────────────────────────────────────────────────────
    // Traversal (fixed order: depth-first, child-index ascending)
    // ─────────────────────────────────────────────────────────────

    /// Reachable nodes from `root` in DFS pre-order
    pub fn collect_from(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants(root, true)
    }

    /// Descendants in DFS pre-order, children by ascending index
    pub fn descendants(&self, node: NodeId, include_self: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = if include_self {
            vec![node]
        } else {
            let mut init: Vec<NodeId> = self.node(node).children.clone();
            init.reverse();
            init
        };
        while let Some(n) = stack.pop() {
            out.push(n);
            for &child in self.node(n).children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Ancestors from nearest to farthest, excluding the node itself
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.node(node).parent;
        while let Some(n) = cursor {
            out.push(n);
            cursor = self.node(n).parent;
        }
        out
    }

    /// Siblings by child index, excluding the node itself
    pub fn siblings(&self, node: NodeId) -> Vec<NodeId> {
        match self.node(node).parent {
            Some(parent) => self
                .node(parent)
                .children
                .iter()
                .copied()
                .filter(|&c| c != node)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Root of the chain containing `node`
    pub fn root_of(&self, node: NodeId) -> NodeId {
        let mut cursor = node;
        while let Some(parent) = self.node(cursor).parent {
            cursor = parent;
        }
        cursor
    }

    /// Host objects on `node` assignable to `ty`, in attach order
    pub fn hosts_assignable(&self, node: NodeId, ty: &TypeKey) -> Vec<ObjId> {
        self.node(node)
            .hosts
            .iter()
            .map(|&h| self.host(h))
            .filter(|h| self.types.is_assignable(&h.ty, ty))
            .map(|h| h.object)
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Persistence bridging
    // ─────────────────────────────────────────────────────────────

    /// Re-derive every bridged accessor from its backing slot, as the
    /// host environment does after a persistence reload.
    pub fn reload(&mut self) {
        for host in &mut self.hosts {
            for site in &mut host.sites {
                site.slot.refresh();
            }
        }
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("hosts", &self.hosts.len())
            .field("scopes", &self.scopes.len())
            .field("objects", &self.objects.len())
            .finish()
    }
}
