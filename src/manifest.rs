//! Declarative scene manifests (YAML)
//!
//! The CLI's input format: type declarations, the node tree with hosts
//! and injection sites, and scopes with declarative binding specs.
//! Every locator family except code-only strategies (constant,
//! factory, predicates) is expressible. Parsing is two-phase: serde
//! into spec structs, then `build()` into a validated [`Graph`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::binding::Binding;
use crate::error::ArborError;
use crate::graph::{Cardinality, ConfigureFn, Graph, InjectionSite, NodeId, SiteKind};
use crate::locator::{Anchor, Locator, Shape};
use crate::types::{validate_type_name, TypeKey, TypeTable};

pub const SCENE_SCHEMA: &str = "arbor/scene@0.1";

/// A parsed scene manifest
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub schema: String,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
pub struct TypeSpec {
    pub name: String,
    #[serde(default)]
    pub kind: TypeKindSpec,
    #[serde(default)]
    pub supers: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKindSpec {
    Interface,
    #[default]
    Component,
    Class,
}

#[derive(Debug, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub prefab_asset: Option<String>,
    #[serde(default)]
    pub prefab_instance: Option<String>,
    #[serde(default)]
    pub hosts: Vec<HostSpec>,
    #[serde(default)]
    pub scope: Option<ScopeSpec>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
pub struct HostSpec {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub sites: Vec<SiteSpec>,
}

#[derive(Debug, Deserialize)]
pub struct SiteSpec {
    pub member: String,
    pub requested: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub kind: SiteKind,
}

#[derive(Debug, Deserialize)]
pub struct ScopeSpec {
    #[serde(default)]
    pub bindings: Vec<BindingSpec>,
}

#[derive(Debug, Deserialize)]
pub struct BindingSpec {
    pub contract: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub kind: BindingKindSpec,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
    /// Absent locators survive parsing and fail binding validation at
    /// run time, so `validate` reports them uniformly
    #[serde(default)]
    pub locator: Option<LocatorSpec>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKindSpec {
    #[default]
    Component,
    Asset,
    Global,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum LocatorSpec {
    Relative {
        /// `root`, `scope`, `site`, or `node:<Name>`
        #[serde(default = "default_anchor")]
        anchor: String,
        shape: ShapeSpec,
        #[serde(default)]
        index: usize,
        #[serde(default)]
        include_self: bool,
    },
    Everywhere,
    StandIn,
    AssetLoad { path: String },
    AssetLoadAll { path: String },
    AssetFolder {
        folder: String,
        #[serde(default, rename = "type")]
        ty: Option<String>,
    },
}

fn default_anchor() -> String {
    "scope".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeSpec {
    Current,
    FirstChild,
    LastChild,
    ChildAt,
    Ancestors,
    Descendants,
    Siblings,
}

impl Manifest {
    /// Parse and check the schema tag
    pub fn from_yaml(yaml: &str) -> Result<Self, ArborError> {
        let manifest: Manifest = serde_yaml::from_str(yaml)?;
        if manifest.schema != SCENE_SCHEMA {
            return Err(ArborError::SchemaMismatch {
                expected: SCENE_SCHEMA.to_string(),
                got: manifest.schema,
            });
        }
        Ok(manifest)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ArborError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Materialize the manifest into a graph.
    ///
    /// Node names must be unique (locator anchors address nodes by
    /// name); all referenced types and nodes must be declared.
    pub fn build(&self) -> Result<Graph, ArborError> {
        let mut types = TypeTable::new();
        for spec in &self.types {
            match spec.kind {
                TypeKindSpec::Interface => types.interface(&spec.name)?,
                TypeKindSpec::Component => types.component(&spec.name)?,
                TypeKindSpec::Class => types.class(&spec.name)?,
            };
        }
        // Supers in a second pass so declaration order does not matter
        for spec in &self.types {
            let key = TypeKey::from(spec.name.as_str());
            for sup in &spec.supers {
                types.add_super(&key, &TypeKey::from(sup.as_str()))?;
            }
        }

        let mut graph = Graph::new(types);
        let mut names: HashMap<String, NodeId> = HashMap::new();
        let mut flat: Vec<(NodeId, &NodeSpec)> = Vec::new();
        for spec in &self.nodes {
            let id = graph.add_root(&spec.name);
            self.grow(&mut graph, &mut names, &mut flat, id, spec)?;
        }

        // Hosts and scopes after the whole tree exists, so node
        // anchors can reference forward declarations
        for &(node, spec) in &flat {
            for host in &spec.hosts {
                self.check_type(&graph, &host.ty)?;
                let mut sites = Vec::with_capacity(host.sites.len());
                for site in &host.sites {
                    sites.push(self.build_site(&graph, site)?);
                }
                graph.attach_host(node, host.ty.as_str(), sites)?;
            }
        }
        for &(node, spec) in &flat {
            if let Some(scope) = &spec.scope {
                let mut bindings = Vec::with_capacity(scope.bindings.len());
                for binding in &scope.bindings {
                    bindings.push(self.build_binding(&graph, &names, binding)?);
                }
                let config: ConfigureFn = Arc::new(move |binder| {
                    for binding in &bindings {
                        binder.add(binding.clone());
                    }
                    Ok(())
                });
                graph.attach_scope(node, config)?;
            }
        }

        Ok(graph)
    }

    fn grow<'a>(
        &self,
        graph: &mut Graph,
        names: &mut HashMap<String, NodeId>,
        flat: &mut Vec<(NodeId, &'a NodeSpec)>,
        id: NodeId,
        spec: &'a NodeSpec,
    ) -> Result<(), ArborError> {
        if names.insert(spec.name.clone(), id).is_some() {
            return Err(ArborError::DuplicateNodeName { name: spec.name.clone() });
        }
        if let Some(scene) = &spec.scene {
            graph.set_scene(id, scene);
        }
        if let Some(key) = &spec.prefab_asset {
            graph.mark_prefab_asset(id, key);
        }
        if let Some(key) = &spec.prefab_instance {
            graph.mark_prefab_instance(id, key);
        }
        flat.push((id, spec));
        for child in &spec.children {
            let child_id = graph.add_child(id, &child.name);
            self.grow(graph, names, flat, child_id, child)?;
        }
        Ok(())
    }

    fn build_site(&self, graph: &Graph, spec: &SiteSpec) -> Result<InjectionSite, ArborError> {
        self.check_type(graph, &spec.requested)?;
        let mut site = InjectionSite::new(&spec.member, spec.requested.as_str());
        if spec.cardinality == Cardinality::Collection {
            site = site.collection();
        }
        if let Some(id) = &spec.id {
            site = site.with_id(id);
        }
        if spec.optional {
            site = site.optional();
        }
        Ok(site.of_kind(spec.kind))
    }

    fn build_binding(
        &self,
        graph: &Graph,
        names: &HashMap<String, NodeId>,
        spec: &BindingSpec,
    ) -> Result<Binding, ArborError> {
        self.check_type(graph, &spec.contract)?;
        let mut binding = Binding::bind(spec.contract.as_str());
        if let Some(to) = &spec.to {
            self.check_type(graph, to)?;
            binding = binding.to(to.as_str());
        }
        binding = match spec.kind {
            BindingKindSpec::Component => binding.as_component(),
            BindingKindSpec::Asset => binding.as_asset(),
            BindingKindSpec::Global => binding.as_global(),
        };
        if spec.cardinality == Cardinality::Collection {
            binding = binding.as_collection();
        }
        if let Some(id) = &spec.id {
            binding = binding.with_id(id);
        }
        for target in &spec.targets {
            self.check_type(graph, target)?;
            binding = binding.when_injected_into(target.as_str());
        }
        for member in &spec.members {
            binding = binding.for_member(member);
        }
        if let Some(locator) = &spec.locator {
            binding = binding.via(self.build_locator(names, locator)?);
        }
        Ok(binding)
    }

    fn build_locator(
        &self,
        names: &HashMap<String, NodeId>,
        spec: &LocatorSpec,
    ) -> Result<Locator, ArborError> {
        Ok(match spec {
            LocatorSpec::Relative { anchor, shape, index, include_self } => {
                let anchor = parse_anchor(anchor, names)?;
                let shape = match shape {
                    ShapeSpec::Current => Shape::Current,
                    ShapeSpec::FirstChild => Shape::FirstChild,
                    ShapeSpec::LastChild => Shape::LastChild,
                    ShapeSpec::ChildAt => Shape::ChildAt(*index),
                    ShapeSpec::Ancestors => Shape::Ancestors,
                    ShapeSpec::Descendants => Shape::Descendants { include_self: *include_self },
                    ShapeSpec::Siblings => Shape::Siblings,
                };
                Locator::from_anchor(anchor, shape)
            }
            LocatorSpec::Everywhere => Locator::everywhere(),
            LocatorSpec::StandIn => Locator::stand_in(),
            LocatorSpec::AssetLoad { path } => Locator::asset_load(path.as_str()),
            LocatorSpec::AssetLoadAll { path } => Locator::asset_load_all(path.as_str()),
            LocatorSpec::AssetFolder { folder, ty } => Locator::asset_folder(
                folder.as_str(),
                ty.as_ref().map(|t| TypeKey::from(t.as_str())),
            ),
        })
    }

    fn check_type(&self, graph: &Graph, name: &str) -> Result<(), ArborError> {
        validate_type_name(name)?;
        if !graph.types().contains(&TypeKey::from(name)) {
            return Err(ArborError::UnknownType { name: name.to_string() });
        }
        Ok(())
    }
}

fn parse_anchor(s: &str, names: &HashMap<String, NodeId>) -> Result<Anchor, ArborError> {
    match s {
        "root" => Ok(Anchor::Root),
        "scope" => Ok(Anchor::Scope),
        "site" => Ok(Anchor::Site),
        other => {
            let name = other.strip_prefix("node:").unwrap_or(other);
            names
                .get(name)
                .copied()
                .map(Anchor::Node)
                .ok_or_else(|| ArborError::UnknownNode { name: name.to_string() })
        }
    }
}
