//! Locator strategy library
//!
//! A locator is a pure function from graph position to an ordered
//! candidate set: `(site, requesting node, scope node) -> candidates`.
//! The ~30 anchor-by-shape strategies of the original design collapse
//! into one parameterized traversal primitive ([`Anchor`] x [`Shape`])
//! plus a handful of special strategies (constant, factory, whole-graph
//! search, stand-in proxy, asset store family).
//!
//! Determinism: on an unchanged graph every strategy yields the same
//! ordered candidates; ties break first-encountered under depth-first,
//! child-index-ascending order.

use std::fmt;
use std::sync::Arc;

use crate::graph::{Graph, NodeId, ObjId};
use crate::provider::{AssetStore, StandIns};
use crate::types::TypeKey;

/// Where a relative traversal starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The root of the requesting node's chain
    Root,
    /// The node carrying the resolving scope
    Scope,
    /// The node carrying the requesting host
    Site,
    /// An arbitrary fixed node
    Node(NodeId),
}

/// The portion of the tree a relative traversal covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// The anchor node itself
    Current,
    FirstChild,
    LastChild,
    ChildAt(usize),
    /// Nearest to farthest, excluding the anchor
    Ancestors,
    /// DFS pre-order, children by ascending index
    Descendants { include_self: bool },
    /// By child index, excluding the anchor
    Siblings,
}

/// A zero-argument candidate factory; errors are caught per-site.
pub type FactoryFn = Arc<dyn Fn() -> anyhow::Result<Vec<ObjId>> + Send + Sync>;

/// Everything a locator may consult, borrowed for one invocation
pub struct LocateCx<'a> {
    pub graph: &'a Graph,
    /// Node carrying the requesting host
    pub site_node: NodeId,
    /// Node carrying the resolving scope
    pub scope_node: NodeId,
    /// The binding's concrete type; relative strategies yield hosts
    /// assignable to it
    pub target_ty: &'a TypeKey,
    pub assets: &'a dyn AssetStore,
    pub stand_ins: &'a dyn StandIns,
}

#[derive(Clone)]
enum LocatorKind {
    Relative { anchor: Anchor, shape: Shape },
    Constant(ObjId),
    Factory(FactoryFn),
    /// Unrestricted whole-graph search across every root
    Everywhere,
    /// Deferred stand-in from the generation collaborator; resolved as
    /// soon as the stand-in object itself is obtained
    StandIn,
    AssetLoad(String),
    AssetLoadAll(String),
    AssetFolder { folder: String, ty: Option<TypeKey> },
}

/// A pure strategy computing position-relative candidates
#[derive(Clone)]
pub struct Locator {
    kind: LocatorKind,
}

impl Locator {
    // ─────────────────────────────────────────────────────────────
    // The parameterized primitive and its conventional shorthands
    // ─────────────────────────────────────────────────────────────

    pub fn from_anchor(anchor: Anchor, shape: Shape) -> Self {
        Self { kind: LocatorKind::Relative { anchor, shape } }
    }

    /// Scope node itself
    pub fn from_self() -> Self {
        Self::from_anchor(Anchor::Scope, Shape::Current)
    }

    pub fn from_descendants(include_self: bool) -> Self {
        Self::from_anchor(Anchor::Scope, Shape::Descendants { include_self })
    }

    pub fn from_ancestors() -> Self {
        Self::from_anchor(Anchor::Scope, Shape::Ancestors)
    }

    pub fn from_siblings() -> Self {
        Self::from_anchor(Anchor::Scope, Shape::Siblings)
    }

    pub fn from_child_at(index: usize) -> Self {
        Self::from_anchor(Anchor::Scope, Shape::ChildAt(index))
    }

    /// Root-anchored variant of any shape
    pub fn from_root(shape: Shape) -> Self {
        Self::from_anchor(Anchor::Root, shape)
    }

    /// Site-anchored variant of any shape
    pub fn from_site(shape: Shape) -> Self {
        Self::from_anchor(Anchor::Site, shape)
    }

    /// Anchored at an arbitrary fixed node
    pub fn from_node(node: NodeId, shape: Shape) -> Self {
        Self::from_anchor(Anchor::Node(node), shape)
    }

    // ─────────────────────────────────────────────────────────────
    // Special strategies
    // ─────────────────────────────────────────────────────────────

    pub fn constant(obj: ObjId) -> Self {
        Self { kind: LocatorKind::Constant(obj) }
    }

    /// Single-valued factory
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<ObjId> + Send + Sync + 'static,
    {
        Self {
            kind: LocatorKind::Factory(Arc::new(move || f().map(|obj| vec![obj]))),
        }
    }

    /// Multi-valued factory
    pub fn multi_factory<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<Vec<ObjId>> + Send + Sync + 'static,
    {
        Self { kind: LocatorKind::Factory(Arc::new(f)) }
    }

    pub fn everywhere() -> Self {
        Self { kind: LocatorKind::Everywhere }
    }

    pub fn stand_in() -> Self {
        Self { kind: LocatorKind::StandIn }
    }

    pub fn asset_load(path: impl Into<String>) -> Self {
        Self { kind: LocatorKind::AssetLoad(path.into()) }
    }

    pub fn asset_load_all(path: impl Into<String>) -> Self {
        Self { kind: LocatorKind::AssetLoadAll(path.into()) }
    }

    pub fn asset_folder(folder: impl Into<String>, ty: Option<TypeKey>) -> Self {
        Self { kind: LocatorKind::AssetFolder { folder: folder.into(), ty } }
    }

    // ─────────────────────────────────────────────────────────────
    // Invocation
    // ─────────────────────────────────────────────────────────────

    /// Compute the ordered candidate set
    pub fn locate(&self, cx: &LocateCx<'_>) -> anyhow::Result<Vec<ObjId>> {
        match &self.kind {
            LocatorKind::Relative { anchor, shape } => {
                let anchor_node = match anchor {
                    Anchor::Root => cx.graph.root_of(cx.site_node),
                    Anchor::Scope => cx.scope_node,
                    Anchor::Site => cx.site_node,
                    Anchor::Node(n) => *n,
                };
                let mut out = Vec::new();
                for node in shape_nodes(cx.graph, anchor_node, *shape) {
                    out.extend(cx.graph.hosts_assignable(node, cx.target_ty));
                }
                Ok(out)
            }
            LocatorKind::Constant(obj) => Ok(vec![*obj]),
            LocatorKind::Factory(f) => f(),
            LocatorKind::Everywhere => {
                let mut out = Vec::new();
                for &root in cx.graph.roots() {
                    for node in cx.graph.descendants(root, true) {
                        out.extend(cx.graph.hosts_assignable(node, cx.target_ty));
                    }
                }
                Ok(out)
            }
            LocatorKind::StandIn => {
                let obj = cx.stand_ins.get_or_create(cx.graph, cx.target_ty)?;
                Ok(vec![obj])
            }
            LocatorKind::AssetLoad(path) => {
                Ok(cx.assets.load(cx.graph, path).into_iter().collect())
            }
            LocatorKind::AssetLoadAll(path) => Ok(cx.assets.load_all(cx.graph, path)),
            LocatorKind::AssetFolder { folder, ty } => {
                Ok(cx.assets.find_in_folder(cx.graph, folder, ty.as_ref()))
            }
        }
    }
}

/// Nodes a shape covers, in the fixed deterministic order
fn shape_nodes(graph: &Graph, anchor: NodeId, shape: Shape) -> Vec<NodeId> {
    match shape {
        Shape::Current => vec![anchor],
        Shape::FirstChild => graph.node(anchor).children.first().copied().into_iter().collect(),
        Shape::LastChild => graph.node(anchor).children.last().copied().into_iter().collect(),
        Shape::ChildAt(i) => graph.node(anchor).children.get(i).copied().into_iter().collect(),
        Shape::Ancestors => graph.ancestors(anchor),
        Shape::Descendants { include_self } => graph.descendants(anchor, include_self),
        Shape::Siblings => graph.siblings(anchor),
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LocatorKind::Relative { anchor, shape } => {
                write!(f, "Locator::Relative({anchor:?}, {shape:?})")
            }
            LocatorKind::Constant(obj) => write!(f, "Locator::Constant({obj:?})"),
            LocatorKind::Factory(_) => write!(f, "Locator::Factory"),
            LocatorKind::Everywhere => write!(f, "Locator::Everywhere"),
            LocatorKind::StandIn => write!(f, "Locator::StandIn"),
            LocatorKind::AssetLoad(path) => write!(f, "Locator::AssetLoad({path})"),
            LocatorKind::AssetLoadAll(path) => write!(f, "Locator::AssetLoadAll({path})"),
            LocatorKind::AssetFolder { folder, ty } => {
                write!(f, "Locator::AssetFolder({folder}, {ty:?})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CachedStandIns, MemoryAssetStore};
    use crate::types::TypeTable;

    struct Fixture {
        graph: Graph,
        root: NodeId,
        left: NodeId,
        leaf: NodeId,
        right: NodeId,
        assets: MemoryAssetStore,
        stand_ins: CachedStandIns,
    }

    fn fixture() -> Fixture {
        // root ── left ── leaf
        //      └─ right
        let mut types = TypeTable::new();
        let iweapon = types.interface("IWeapon").unwrap();
        let sword = types.component("Sword").unwrap();
        types.add_super(&sword, &iweapon).unwrap();
        types.component("Shield").unwrap();

        let mut graph = Graph::new(types);
        let root = graph.add_root("root");
        let left = graph.add_child(root, "left");
        let leaf = graph.add_child(left, "leaf");
        let right = graph.add_child(root, "right");

        Fixture {
            graph,
            root,
            left,
            leaf,
            right,
            assets: MemoryAssetStore::default(),
            stand_ins: CachedStandIns::default(),
        }
    }

    impl Fixture {
        fn cx<'a>(&'a self, site: NodeId, scope: NodeId, ty: &'a TypeKey) -> LocateCx<'a> {
            LocateCx {
                graph: &self.graph,
                site_node: site,
                scope_node: scope,
                target_ty: ty,
                assets: &self.assets,
                stand_ins: &self.stand_ins,
            }
        }
    }

    #[test]
    fn descendants_in_dfs_order_excluding_self() {
        let mut fx = fixture();
        let on_root = fx.graph.attach_host(fx.root, "Sword", vec![]).unwrap();
        let on_leaf = fx.graph.attach_host(fx.leaf, "Sword", vec![]).unwrap();
        let on_right = fx.graph.attach_host(fx.right, "Sword", vec![]).unwrap();

        let ty = TypeKey::from("Sword");
        let cx = fx.cx(fx.root, fx.root, &ty);

        let found = Locator::from_descendants(false).locate(&cx).unwrap();
        assert_eq!(
            found,
            vec![fx.graph.host(on_leaf).object, fx.graph.host(on_right).object]
        );

        let found = Locator::from_descendants(true).locate(&cx).unwrap();
        assert_eq!(found[0], fx.graph.host(on_root).object);
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn relative_filters_by_assignability() {
        let mut fx = fixture();
        fx.graph.attach_host(fx.leaf, "Shield", vec![]).unwrap();
        let sword = fx.graph.attach_host(fx.leaf, "Sword", vec![]).unwrap();

        let iweapon = TypeKey::from("IWeapon");
        let cx = fx.cx(fx.root, fx.root, &iweapon);
        let found = Locator::from_descendants(false).locate(&cx).unwrap();
        assert_eq!(found, vec![fx.graph.host(sword).object]);
    }

    #[test]
    fn ancestors_near_to_far() {
        let mut fx = fixture();
        let on_left = fx.graph.attach_host(fx.left, "Sword", vec![]).unwrap();
        let on_root = fx.graph.attach_host(fx.root, "Sword", vec![]).unwrap();

        let ty = TypeKey::from("Sword");
        let cx = fx.cx(fx.leaf, fx.leaf, &ty);
        let found = Locator::from_site(Shape::Ancestors).locate(&cx).unwrap();
        assert_eq!(
            found,
            vec![fx.graph.host(on_left).object, fx.graph.host(on_root).object]
        );
    }

    #[test]
    fn siblings_exclude_anchor() {
        let mut fx = fixture();
        fx.graph.attach_host(fx.left, "Sword", vec![]).unwrap();
        let on_right = fx.graph.attach_host(fx.right, "Sword", vec![]).unwrap();

        let ty = TypeKey::from("Sword");
        let cx = fx.cx(fx.left, fx.left, &ty);
        let found = Locator::from_site(Shape::Siblings).locate(&cx).unwrap();
        assert_eq!(found, vec![fx.graph.host(on_right).object]);
    }

    #[test]
    fn child_shapes() {
        let mut fx = fixture();
        let on_left = fx.graph.attach_host(fx.left, "Sword", vec![]).unwrap();
        let on_right = fx.graph.attach_host(fx.right, "Sword", vec![]).unwrap();

        let ty = TypeKey::from("Sword");
        let cx = fx.cx(fx.root, fx.root, &ty);

        let first = Locator::from_anchor(Anchor::Scope, Shape::FirstChild);
        assert_eq!(first.locate(&cx).unwrap(), vec![fx.graph.host(on_left).object]);

        let last = Locator::from_anchor(Anchor::Scope, Shape::LastChild);
        assert_eq!(last.locate(&cx).unwrap(), vec![fx.graph.host(on_right).object]);

        assert_eq!(
            Locator::from_child_at(1).locate(&cx).unwrap(),
            vec![fx.graph.host(on_right).object]
        );
        assert!(Locator::from_child_at(9).locate(&cx).unwrap().is_empty());
    }

    #[test]
    fn root_anchor_follows_the_requesting_chain() {
        let mut fx = fixture();
        let on_root = fx.graph.attach_host(fx.root, "Sword", vec![]).unwrap();

        let ty = TypeKey::from("Sword");
        // Scope node is elsewhere; Root anchors on the site's chain root
        let cx = fx.cx(fx.leaf, fx.right, &ty);
        let found = Locator::from_root(Shape::Current).locate(&cx).unwrap();
        assert_eq!(found, vec![fx.graph.host(on_root).object]);
    }

    #[test]
    fn everywhere_spans_all_roots() {
        let mut fx = fixture();
        let second_root = fx.graph.add_root("other");
        let a = fx.graph.attach_host(fx.leaf, "Sword", vec![]).unwrap();
        let b = fx.graph.attach_host(second_root, "Sword", vec![]).unwrap();

        let ty = TypeKey::from("Sword");
        let cx = fx.cx(fx.leaf, fx.leaf, &ty);
        let found = Locator::everywhere().locate(&cx).unwrap();
        assert_eq!(
            found,
            vec![fx.graph.host(a).object, fx.graph.host(b).object]
        );
    }

    #[test]
    fn constant_and_factory() {
        let fx = fixture();
        let obj = fx.graph.alloc_object("Sword".into(), "fixed");

        let ty = TypeKey::from("Sword");
        let cx = fx.cx(fx.root, fx.root, &ty);
        assert_eq!(Locator::constant(obj).locate(&cx).unwrap(), vec![obj]);

        let made = fx.graph.alloc_object("Sword".into(), "made");
        let factory = Locator::factory(move || Ok(made));
        assert_eq!(factory.locate(&cx).unwrap(), vec![made]);

        let failing = Locator::factory(|| anyhow::bail!("forge is cold"));
        assert!(failing.locate(&cx).is_err());
    }

    #[test]
    fn stand_in_resolves_to_cached_proxy() {
        let fx = fixture();
        let ty = TypeKey::from("Sword");
        let cx = fx.cx(fx.root, fx.root, &ty);

        let first = Locator::stand_in().locate(&cx).unwrap();
        let second = Locator::stand_in().locate(&cx).unwrap();
        assert_eq!(first.len(), 1);
        // Persisted and reused by type identity
        assert_eq!(first, second);
    }

    #[test]
    fn locate_is_deterministic_on_unchanged_graph() {
        let mut fx = fixture();
        fx.graph.attach_host(fx.leaf, "Sword", vec![]).unwrap();
        fx.graph.attach_host(fx.right, "Sword", vec![]).unwrap();
        fx.graph.attach_host(fx.root, "Sword", vec![]).unwrap();

        let ty = TypeKey::from("Sword");
        let cx = fx.cx(fx.leaf, fx.root, &ty);
        let locator = Locator::from_descendants(true);
        let first = locator.locate(&cx).unwrap();
        for _ in 0..5 {
            assert_eq!(locator.locate(&cx).unwrap(), first);
        }
    }
}
