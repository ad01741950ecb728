//! Context classification and isolation-gated scope lookup
//!
//! A node's context is its storage/lifecycle domain: prefab asset,
//! prefab instance, owning scene, or detached. Two nodes share context
//! iff kind and key both match. Context gates cross-boundary scope
//! resolution when isolation is enabled, and is computed fresh every
//! run: a node's classification can change between edits.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::graph::{Graph, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    PrefabAsset,
    PrefabInstance,
    Scene,
    Detached,
}

/// A node's storage/lifecycle domain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Context {
    pub kind: ContextKind,
    pub key: Arc<str>,
}

impl Context {
    pub fn new(kind: ContextKind, key: impl AsRef<str>) -> Self {
        Self { kind, key: Arc::from(key.as_ref()) }
    }

    pub fn is_prefab(&self) -> bool {
        matches!(self.kind, ContextKind::PrefabAsset | ContextKind::PrefabInstance)
    }
}

/// Whether scope-chain walks may cross context boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    Enabled,
    Disabled,
}

impl Isolation {
    pub fn is_enabled(self) -> bool {
        matches!(self, Isolation::Enabled)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ContextKind::PrefabAsset => "prefab_asset",
            ContextKind::PrefabInstance => "prefab_instance",
            ContextKind::Scene => "scene",
            ContextKind::Detached => "detached",
        };
        write!(f, "{{{},{}}}", kind, self.key)
    }
}

impl Graph {
    /// Classify a node's context by walking outward.
    ///
    /// Precedence: nearest prefab-asset root, else nearest
    /// prefab-instance root, else the owning scene identity, else
    /// detached (keyed by the chain's root name).
    pub fn context_of(&self, node: NodeId) -> Context {
        let chain = self.chain_outward(node);

        for &n in &chain {
            if let Some(key) = &self.node(n).prefab_asset {
                return Context { kind: ContextKind::PrefabAsset, key: key.clone() };
            }
        }
        for &n in &chain {
            if let Some(key) = &self.node(n).prefab_instance {
                return Context { kind: ContextKind::PrefabInstance, key: key.clone() };
            }
        }
        for &n in &chain {
            if let Some(scene) = &self.node(n).scene {
                return Context { kind: ContextKind::Scene, key: scene.clone() };
            }
        }

        let root = chain.last().copied().unwrap_or(node);
        Context {
            kind: ContextKind::Detached,
            key: Arc::from(self.node(root).name.as_str()),
        }
    }

    /// Find the nearest scope-bearing node at or above `node`.
    ///
    /// With isolation enabled, ancestors whose context differs from the
    /// start node's are skipped (the walk continues past them).
    pub fn nearest_scope(&self, node: NodeId, isolation: Isolation) -> Option<NodeId> {
        self.scope_chain(node, isolation).into_iter().next()
    }

    /// Every scope-bearing node at or above `node`, nearest first.
    ///
    /// The gate is anchored once at the start node's context; it never
    /// re-anchors at scopes found along the way.
    pub fn scope_chain(&self, node: NodeId, isolation: Isolation) -> Vec<NodeId> {
        let origin = isolation.is_enabled().then(|| self.context_of(node));
        let mut chain = Vec::new();
        let mut cursor = Some(node);
        while let Some(n) = cursor {
            let gated = origin
                .as_ref()
                .map(|origin| self.context_of(n) != *origin)
                .unwrap_or(false);
            if !gated && self.node(n).scope.is_some() {
                chain.push(n);
            }
            cursor = self.node(n).parent;
        }
        chain
    }

    /// Node chain from `node` up to its root, inclusive on both ends
    fn chain_outward(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = vec![node];
        let mut cursor = self.node(node).parent;
        while let Some(n) = cursor {
            chain.push(n);
            cursor = self.node(n).parent;
        }
        chain
    }
}
