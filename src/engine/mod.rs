//! Resolution and injection engine
//!
//! Orchestrates a run over a live, externally-owned graph: collect
//! reachable nodes, configure scopes, resolve every injection site,
//! report. Per-site failures become diagnostics and the run continues;
//! the only run-level rejection is live playback. Runs are synchronous
//! and single-threaded, and batches execute strictly sequentially
//! because they share the registry session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::binding::{validate, Binder, Binding, BindingKind};
use crate::diagnostics::{DiagLog, DiagnosticKind};
use crate::error::ArborError;
use crate::graph::{Cardinality, Graph, HostId, InjectionSite, NodeId, ObjId, SlotValue};
use crate::locator::LocateCx;
use crate::provider::{AssetStore, CachedStandIns, DefaultEnv, HostEnv, MemoryAssetStore, StandIns};
use crate::registry::GlobalRegistry;
use crate::stats::RunStats;

/// Run phases, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Collecting,
    Configuring,
    Resolving,
    Reporting,
}

pub use crate::graph::Isolation;

/// The resolution engine.
///
/// Collaborators are trait objects wired at construction; the graph is
/// borrowed per run, never owned.
pub struct Engine {
    assets: Arc<dyn AssetStore>,
    stand_ins: Arc<dyn StandIns>,
    env: Arc<dyn HostEnv>,
    registry: GlobalRegistry,
    diag: DiagLog,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        let diag = DiagLog::new();
        Self {
            assets: Arc::new(MemoryAssetStore::new()),
            stand_ins: Arc::new(CachedStandIns::new()),
            env: Arc::new(DefaultEnv::new()),
            registry: GlobalRegistry::new(diag.clone()),
            diag,
        }
    }

    pub fn with_assets(mut self, assets: Arc<dyn AssetStore>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_stand_ins(mut self, stand_ins: Arc<dyn StandIns>) -> Self {
        self.stand_ins = stand_ins;
        self
    }

    pub fn with_env(mut self, env: Arc<dyn HostEnv>) -> Self {
        self.env = env;
        self
    }

    pub fn diagnostics(&self) -> &DiagLog {
        &self.diag
    }

    pub fn registry(&self) -> &GlobalRegistry {
        &self.registry
    }

    // ─────────────────────────────────────────────────────────────
    // Driver surface
    // ─────────────────────────────────────────────────────────────

    /// Resolve one root. Opens a fresh registry session around the run.
    pub fn run_single(
        &mut self,
        graph: &mut Graph,
        root: NodeId,
        isolation: Isolation,
    ) -> Result<RunStats, ArborError> {
        self.reject_during_playback()?;
        self.registry.begin_session();
        let stats = self.run_one(graph, root, isolation);
        self.registry.end_session();
        Ok(stats)
    }

    /// Resolve several roots, strictly sequentially, under one shared
    /// registry session. Stats merge across runs.
    pub fn run_batch(
        &mut self,
        graph: &mut Graph,
        roots: &[NodeId],
        isolation: Isolation,
    ) -> Result<RunStats, ArborError> {
        self.reject_during_playback()?;
        self.registry.begin_session();
        let mut total = RunStats::new();
        for &root in roots {
            let stats = self.run_one(graph, root, isolation);
            total.merge(&stats);
        }
        self.registry.end_session();
        Ok(total)
    }

    /// Resolve every declared root of the graph
    pub fn run_all(&mut self, graph: &mut Graph, isolation: Isolation) -> Result<RunStats, ArborError> {
        let roots = graph.roots().to_vec();
        self.run_batch(graph, &roots, isolation)
    }

    /// Configure and validate only: collect, run every scope routine,
    /// drop invalid bindings with diagnostics, resolve nothing. The
    /// CLI's validate path.
    pub fn check(&self, graph: &Graph, root: NodeId) -> RunStats {
        let mut stats = RunStats::new();
        let start = Instant::now();
        let nodes = graph.collect_from(root);
        self.configure(graph, &nodes, &mut stats);
        stats.set_elapsed(start.elapsed());
        stats
    }

    fn reject_during_playback(&self) -> Result<(), ArborError> {
        if self.env.playback_active() {
            warn!("run rejected: live playback active");
            return Err(ArborError::PlaybackActive);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // One run
    // ─────────────────────────────────────────────────────────────

    fn run_one(&mut self, graph: &mut Graph, root: NodeId, isolation: Isolation) -> RunStats {
        let start = Instant::now();
        let mut stats = RunStats::new();

        debug!(phase = ?Phase::Collecting, root = root.index(), "run start");
        let nodes = graph.collect_from(root);

        debug!(phase = ?Phase::Configuring, nodes = nodes.len(), "configuring scopes");
        let mut table = self.configure(graph, &nodes, &mut stats);

        debug!(phase = ?Phase::Resolving, scopes = table.scopes.len(), "resolving sites");
        for &node in &nodes {
            for host_id in graph.node(node).hosts.clone() {
                self.resolve_host(graph, host_id, isolation, &mut table, &mut stats);
            }
        }

        debug!(phase = ?Phase::Reporting, "reporting unused bindings");
        for entry in &table.scopes {
            for binding in &entry.bindings {
                if !binding.is_used() {
                    self.diag.emit(
                        Some(graph.node(entry.node).name.as_str().into()),
                        DiagnosticKind::UnusedBinding {
                            contract: binding.contract().as_str().into(),
                        },
                    );
                    stats.unused_bindings += 1;
                }
            }
        }

        stats.set_elapsed(start.elapsed());
        debug!(phase = ?Phase::Idle, %stats, "run complete");
        stats
    }

    /// Invoke every scope routine in graph order; validate and keep
    /// the surviving bindings per scope node.
    fn configure(&self, graph: &Graph, nodes: &[NodeId], stats: &mut RunStats) -> BindingTable {
        let mut table = BindingTable::default();
        for &node in nodes {
            let Some(scope_id) = graph.node(node).scope else {
                continue;
            };
            stats.scopes_processed += 1;

            let config = graph.scope(scope_id).config.clone();
            let mut binder = Binder::new();
            if let Err(err) = config(&mut binder) {
                self.diag.emit(
                    Some(graph.node(node).name.as_str().into()),
                    DiagnosticKind::ConfigurationError { error: format!("{err:#}") },
                );
                continue;
            }
            stats.bindings_registered += binder.len() as u64;

            let declaring = graph.context_of(node);
            let mut kept = Vec::new();
            for binding in binder.into_bindings() {
                match validate(&binding, graph.types(), &declaring) {
                    Ok(()) => kept.push(binding),
                    Err(err) => {
                        self.diag.emit(
                            Some(graph.node(node).name.as_str().into()),
                            DiagnosticKind::InvalidBinding {
                                contract: binding.contract().as_str().into(),
                                reason: err.to_string(),
                            },
                        );
                        stats.invalid_bindings += 1;
                    }
                }
            }
            if !kept.is_empty() {
                table.index.insert(node, table.scopes.len());
                table.scopes.push(ScopeBindings { node, bindings: kept });
            }
        }
        table
    }

    fn resolve_host(
        &mut self,
        graph: &mut Graph,
        host_id: HostId,
        isolation: Isolation,
        table: &mut BindingTable,
        stats: &mut RunStats,
    ) {
        let host = graph.host(host_id);
        let host_ty = host.ty.clone();
        let site_node = host.node;
        let node_name: Arc<str> = graph.node(site_node).name.as_str().into();
        let site_count = host.sites().len();

        for idx in 0..site_count {
            // Clone the descriptor so locators can borrow the graph
            let site = graph.host(host_id).sites()[idx].clone();
            self.resolve_site(
                graph, host_id, idx, &site, &host_ty, site_node, &node_name, isolation, table,
                stats,
            );
        }
    }

    /// Per-site algorithm: nearest-scope-wins binding selection, then
    /// locate, filter, and assign (or register, for globals).
    #[allow(clippy::too_many_arguments)]
    fn resolve_site(
        &mut self,
        graph: &mut Graph,
        host_id: HostId,
        site_idx: usize,
        site: &InjectionSite,
        host_ty: &crate::types::TypeKey,
        site_node: NodeId,
        node_name: &Arc<str>,
        isolation: Isolation,
        table: &mut BindingTable,
        stats: &mut RunStats,
    ) {
        let Some((scope_node, binding_idx)) =
            table.select(graph, site_node, site, host_ty, isolation)
        else {
            if !site.optional {
                self.diag.emit(
                    Some(node_name.clone()),
                    DiagnosticKind::MissingBinding {
                        requested: site.requested.as_str().into(),
                        member: site.member.as_str().into(),
                        host_ty: host_ty.as_str().into(),
                    },
                );
                stats.missing_bindings += 1;
            }
            return;
        };

        let binding = &table.scopes[table.index[&scope_node]].bindings[binding_idx];
        let kind = binding.kind;
        let contract = binding.contract().clone();
        let locator = binding.locator.clone();
        let predicates = binding.qualifiers.predicates.clone();

        // Validation guarantees a locator on every surviving binding
        let Some(locator) = locator else {
            return;
        };

        let cx = LocateCx {
            graph,
            site_node,
            scope_node,
            target_ty: &table.scopes[table.index[&scope_node]].bindings[binding_idx].concrete_ty,
            assets: self.assets.as_ref(),
            stand_ins: self.stand_ins.as_ref(),
        };
        let candidates = match locator.locate(&cx) {
            Ok(candidates) => candidates,
            Err(err) => {
                self.diag.emit(
                    Some(node_name.clone()),
                    DiagnosticKind::InvalidBinding {
                        contract: contract.as_str().into(),
                        reason: format!("locator failed: {err:#}"),
                    },
                );
                stats.invalid_bindings += 1;
                return;
            }
        };

        // Predicate intersection, order-independent
        let mut survivors = Vec::with_capacity(candidates.len());
        'candidates: for obj in candidates {
            for pred in &predicates {
                match pred(graph, obj) {
                    Ok(true) => {}
                    Ok(false) => continue 'candidates,
                    Err(err) => {
                        self.diag.emit(
                            Some(node_name.clone()),
                            DiagnosticKind::InvalidBinding {
                                contract: contract.as_str().into(),
                                reason: format!("predicate failed: {err:#}"),
                            },
                        );
                        stats.invalid_bindings += 1;
                        return;
                    }
                }
            }
            survivors.push(obj);
        }

        if kind == BindingKind::Global {
            self.register_global(
                &contract, survivors, site, node_name, table, scope_node, binding_idx, stats,
            );
            return;
        }

        match site.cardinality {
            Cardinality::Single => match survivors.first() {
                Some(&obj) => {
                    self.assign(graph, host_id, site_idx, SlotValue::One(obj));
                    stats.sites_injected += 1;
                    table.mark_used(scope_node, binding_idx);
                }
                None => {
                    if !site.optional {
                        self.diag.emit(
                            Some(node_name.clone()),
                            DiagnosticKind::MissingDependency {
                                requested: site.requested.as_str().into(),
                                member: site.member.as_str().into(),
                                host_ty: host_ty.as_str().into(),
                                detail: "locator yielded no surviving candidate".to_string(),
                            },
                        );
                        stats.missing_dependencies += 1;
                    }
                }
            },
            // An empty collection is a valid assignment
            Cardinality::Collection => {
                self.assign(graph, host_id, site_idx, SlotValue::Many(survivors));
                stats.sites_injected += 1;
                table.mark_used(scope_node, binding_idx);
            }
        }
    }

    /// Global bindings register their first candidate under the
    /// contract type instead of writing the site; "use" means
    /// registration.
    #[allow(clippy::too_many_arguments)]
    fn register_global(
        &mut self,
        contract: &crate::types::TypeKey,
        survivors: Vec<ObjId>,
        site: &InjectionSite,
        node_name: &Arc<str>,
        table: &mut BindingTable,
        scope_node: NodeId,
        binding_idx: usize,
        stats: &mut RunStats,
    ) {
        match survivors.first() {
            Some(&obj) => {
                // Duplicate registration leaves its own diagnostic
                if self.registry.register(contract, obj) {
                    table.mark_used(scope_node, binding_idx);
                }
            }
            None => {
                if !site.optional {
                    self.diag.emit(
                        Some(node_name.clone()),
                        DiagnosticKind::MissingDependency {
                            requested: site.requested.as_str().into(),
                            member: site.member.as_str().into(),
                            host_ty: contract.as_str().into(),
                            detail: "global binding yielded no candidate to register".to_string(),
                        },
                    );
                    stats.missing_dependencies += 1;
                }
            }
        }
    }

    fn assign(&self, graph: &mut Graph, host_id: HostId, site_idx: usize, value: SlotValue) {
        if let Some(site) = graph.host_mut(host_id).site_mut(site_idx) {
            site.slot.assign(value);
        }
    }
}

/// One run's surviving bindings, grouped per scope node
struct ScopeBindings {
    node: NodeId,
    bindings: Vec<Binding>,
}

#[derive(Default)]
struct BindingTable {
    scopes: Vec<ScopeBindings>,
    index: HashMap<NodeId, usize>,
}

impl BindingTable {
    /// Nearest-scope-wins selection: walk the site node's scope chain
    /// (context-gated against the site node's own context) and stop at
    /// the first scope offering a matching binding.
    fn select(
        &self,
        graph: &Graph,
        site_node: NodeId,
        site: &InjectionSite,
        host_ty: &crate::types::TypeKey,
        isolation: Isolation,
    ) -> Option<(NodeId, usize)> {
        for node in graph.scope_chain(site_node, isolation) {
            let Some(&scope_idx) = self.index.get(&node) else {
                continue;
            };
            let found = self.scopes[scope_idx]
                .bindings
                .iter()
                .position(|b| b.matches_site(site, host_ty));
            if let Some(binding_idx) = found {
                return Some((node, binding_idx));
            }
        }
        None
    }

    fn mark_used(&mut self, scope_node: NodeId, binding_idx: usize) {
        if let Some(&scope_idx) = self.index.get(&scope_node) {
            self.scopes[scope_idx].bindings[binding_idx].used = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConfigureFn;
    use crate::locator::Locator;
    use crate::types::TypeTable;

    fn weapon_types() -> TypeTable {
        let mut t = TypeTable::new();
        let iweapon = t.interface("IWeapon").unwrap();
        let sword = t.component("Sword").unwrap();
        t.add_super(&sword, &iweapon).unwrap();
        t.component("Player").unwrap();
        t
    }

    fn config(bindings: Vec<Binding>) -> ConfigureFn {
        Arc::new(move |binder| {
            for b in &bindings {
                binder.add(b.clone());
            }
            Ok(())
        })
    }

    #[test]
    fn resolves_a_simple_site() {
        let mut g = Graph::new(weapon_types());
        let root = g.add_root("Level");
        g.set_scene(root, "main");
        g.attach_scope(
            root,
            config(vec![Binding::bind("IWeapon")
                .to("Sword")
                .via(Locator::from_descendants(true))]),
        )
        .unwrap();
        let child = g.add_child(root, "Armory");
        let sword = g.attach_host(child, "Sword", vec![]).unwrap();
        let player = g
            .attach_host(root, "Player", vec![InjectionSite::new("weapon", "IWeapon")])
            .unwrap();

        let mut engine = Engine::new();
        let stats = engine.run_single(&mut g, root, Isolation::Enabled).unwrap();

        assert_eq!(stats.scopes_processed, 1);
        assert_eq!(stats.bindings_registered, 1);
        assert_eq!(stats.sites_injected, 1);
        assert!(!stats.has_failures());
        assert_eq!(
            g.host(player).sites()[0].slot.value().one(),
            Some(g.host(sword).object)
        );
    }

    #[test]
    fn shadow_walk_stays_anchored_past_unmatched_scopes() {
        let mut g = Graph::new(weapon_types());
        let root = g.add_root("Level");
        g.set_scene(root, "main");
        let inst = g.add_child(root, "Door");
        g.mark_prefab_instance(inst, "door-1");
        // The instance scope would match, but it is foreign to the
        // asset context below and must stay invisible even after the
        // asset scope fails to match.
        g.attach_scope(
            inst,
            config(vec![Binding::bind("IWeapon")
                .to("Sword")
                .via(Locator::from_descendants(true))]),
        )
        .unwrap();
        let asset = g.add_child(inst, "Blueprint");
        g.mark_prefab_asset(asset, "bp-1");
        g.attach_scope(
            asset,
            config(vec![Binding::bind("Player").via(Locator::from_self())]),
        )
        .unwrap();
        g.attach_host(asset, "Sword", vec![]).unwrap();
        let host = g
            .attach_host(asset, "Player", vec![InjectionSite::new("weapon", "IWeapon")])
            .unwrap();

        let mut engine = Engine::new();
        let stats = engine.run_single(&mut g, root, Isolation::Enabled).unwrap();

        assert_eq!(stats.missing_bindings, 1);
        assert!(g.host(host).sites()[0].slot.value().is_empty());
        assert!(engine
            .diagnostics()
            .errors()
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::MissingBinding { .. })));
    }

    #[test]
    fn configuration_error_discards_that_scope_only() {
        let mut g = Graph::new(weapon_types());
        let root = g.add_root("Level");
        g.set_scene(root, "main");
        let failing: ConfigureFn = Arc::new(|_| anyhow::bail!("broken routine"));
        g.attach_scope(root, failing).unwrap();
        let child = g.add_child(root, "Inner");
        g.attach_scope(
            child,
            config(vec![Binding::bind("Sword").via(Locator::from_descendants(true))]),
        )
        .unwrap();
        let sword = g.attach_host(child, "Sword", vec![]).unwrap();
        let site_host = g
            .attach_host(child, "Player", vec![InjectionSite::new("blade", "Sword")])
            .unwrap();

        let mut engine = Engine::new();
        let stats = engine.run_single(&mut g, root, Isolation::Enabled).unwrap();

        assert_eq!(stats.scopes_processed, 2);
        assert_eq!(stats.sites_injected, 1);
        assert_eq!(
            g.host(site_host).sites()[0].slot.value().one(),
            Some(g.host(sword).object)
        );
        let errors = engine.diagnostics().errors();
        assert!(errors
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::ConfigurationError { .. })));
    }

    #[test]
    fn predicate_error_is_caught_per_site() {
        let mut g = Graph::new(weapon_types());
        let root = g.add_root("Level");
        g.attach_scope(
            root,
            config(vec![Binding::bind("Sword")
                .when(|_, _| anyhow::bail!("flaky predicate"))
                .via(Locator::from_descendants(true))]),
        )
        .unwrap();
        g.attach_host(root, "Sword", vec![]).unwrap();
        let host = g
            .attach_host(root, "Player", vec![InjectionSite::new("blade", "Sword")])
            .unwrap();

        let mut engine = Engine::new();
        let stats = engine.run_single(&mut g, root, Isolation::Enabled).unwrap();

        assert_eq!(stats.invalid_bindings, 1);
        assert_eq!(stats.sites_injected, 0);
        assert!(g.host(host).sites()[0].slot.value().is_empty());
    }

    #[test]
    fn playback_rejects_the_run() {
        let mut g = Graph::new(weapon_types());
        let root = g.add_root("Level");

        let env = Arc::new(DefaultEnv::new());
        env.set_playing(true);
        let mut engine = Engine::new().with_env(env);
        let err = engine.run_single(&mut g, root, Isolation::Enabled).unwrap_err();
        assert!(matches!(err, ArborError::PlaybackActive));
    }

    #[test]
    fn empty_collection_is_valid_and_counts_as_injected() {
        let mut g = Graph::new(weapon_types());
        let root = g.add_root("Level");
        g.attach_scope(
            root,
            config(vec![Binding::bind("Sword").via(Locator::from_descendants(false))]),
        )
        .unwrap();
        let host = g
            .attach_host(
                root,
                "Player",
                vec![InjectionSite::new("blades", "Sword").collection()],
            )
            .unwrap();

        let mut engine = Engine::new();
        let stats = engine.run_single(&mut g, root, Isolation::Enabled).unwrap();

        assert_eq!(stats.sites_injected, 1);
        assert_eq!(stats.missing_dependencies, 0);
        assert_eq!(stats.unused_bindings, 0);
        assert_eq!(g.host(host).sites()[0].slot.value().many(), &[] as &[ObjId]);
    }

    #[test]
    fn unused_binding_is_a_warning() {
        let mut g = Graph::new(weapon_types());
        let root = g.add_root("Level");
        g.attach_scope(
            root,
            config(vec![Binding::bind("Sword").via(Locator::from_descendants(true))]),
        )
        .unwrap();

        let mut engine = Engine::new();
        let stats = engine.run_single(&mut g, root, Isolation::Enabled).unwrap();

        assert_eq!(stats.unused_bindings, 1);
        assert!(!stats.has_failures());
        assert_eq!(engine.diagnostics().warnings().len(), 1);
    }

    #[test]
    fn global_binding_registers_instead_of_assigning() {
        let mut g = Graph::new(weapon_types());
        let root = g.add_root("Level");
        g.set_scene(root, "main");
        g.attach_scope(
            root,
            config(vec![Binding::bind("IWeapon")
                .to("Sword")
                .as_global()
                .via(Locator::from_descendants(true))]),
        )
        .unwrap();
        let sword = g.attach_host(root, "Sword", vec![]).unwrap();
        let host = g
            .attach_host(root, "Player", vec![InjectionSite::new("weapon", "IWeapon")])
            .unwrap();

        let mut engine = Engine::new();
        let stats = engine.run_single(&mut g, root, Isolation::Enabled).unwrap();

        // Registration, not assignment; the binding still counts as used
        assert_eq!(stats.sites_injected, 0);
        assert!(g.host(host).sites()[0].slot.value().is_empty());
        assert_eq!(stats.unused_bindings, 0);
        assert!(engine.diagnostics().errors().is_empty());
        // The session closed with the run
        assert!(engine.registry().is_empty());
        let _ = sword;
    }

    #[test]
    fn check_validates_without_resolving() {
        let mut g = Graph::new(weapon_types());
        let root = g.add_root("Level");
        g.attach_scope(
            root,
            config(vec![
                Binding::bind("Sword").via(Locator::from_descendants(true)),
                Binding::bind("Sword").as_global().as_collection().via(Locator::from_self()),
            ]),
        )
        .unwrap();
        let host = g
            .attach_host(root, "Player", vec![InjectionSite::new("blade", "Sword")])
            .unwrap();

        let engine = Engine::new();
        let stats = engine.check(&g, root);

        assert_eq!(stats.bindings_registered, 2);
        assert_eq!(stats.invalid_bindings, 1);
        assert_eq!(stats.sites_injected, 0);
        assert!(g.host(host).sites()[0].slot.value().is_empty());
    }
}
