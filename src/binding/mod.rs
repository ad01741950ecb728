//! Binding model: declarative rules mapping requested types to locators
//!
//! A binding is declared by a scope's configuration routine through a
//! consuming builder: `Binding::bind("IWeapon").to("Sword")
//! .with_id("melee").via(Locator::from_descendants(false))`.
//! Validity rules live in [`validate`]; invalid bindings are dropped
//! before resolution with a diagnostic, never a panic.

mod validate;

pub use validate::validate;

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::graph::{Cardinality, Graph, InjectionSite, ObjId};
use crate::locator::Locator;
use crate::types::TypeKey;

/// Where a binding's instances come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    #[default]
    Component,
    Asset,
    Global,
}

/// A candidate filter; an `Err` is caught per-site and reported as an
/// invalid binding, never propagated.
pub type Predicate = Arc<dyn Fn(&Graph, ObjId) -> anyhow::Result<bool> + Send + Sync>;

/// Narrowing conditions on a binding
#[derive(Clone, Default)]
pub struct Qualifiers {
    pub id: Option<String>,
    /// Host runtime types this binding applies to (unordered; empty = any)
    pub target_types: BTreeSet<TypeKey>,
    /// Site member names this binding applies to (unordered; empty = any)
    pub members: BTreeSet<String>,
    pub predicates: Vec<Predicate>,
}

impl fmt::Debug for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Qualifiers")
            .field("id", &self.id)
            .field("target_types", &self.target_types)
            .field("members", &self.members)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

/// A rule mapping a requested type (plus qualifiers) to a locator
#[derive(Clone)]
pub struct Binding {
    /// Optional interface redirection; matching falls back to the
    /// concrete type when absent
    pub interface_ty: Option<TypeKey>,
    pub concrete_ty: TypeKey,
    pub kind: BindingKind,
    pub cardinality: Cardinality,
    pub qualifiers: Qualifiers,
    pub locator: Option<Locator>,
    pub(crate) used: bool,
}

impl Binding {
    /// Start a binding for `contract`
    pub fn bind(contract: impl Into<TypeKey>) -> Self {
        Self {
            interface_ty: None,
            concrete_ty: contract.into(),
            kind: BindingKind::Component,
            cardinality: Cardinality::Single,
            qualifiers: Qualifiers::default(),
            locator: None,
            used: false,
        }
    }

    /// Redirect an interface contract to a concrete type
    pub fn to(mut self, concrete: impl Into<TypeKey>) -> Self {
        self.interface_ty = Some(std::mem::replace(&mut self.concrete_ty, concrete.into()));
        self
    }

    pub fn as_component(mut self) -> Self {
        self.kind = BindingKind::Component;
        self
    }

    pub fn as_asset(mut self) -> Self {
        self.kind = BindingKind::Asset;
        self
    }

    pub fn as_global(mut self) -> Self {
        self.kind = BindingKind::Global;
        self
    }

    pub fn as_collection(mut self) -> Self {
        self.cardinality = Cardinality::Collection;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.qualifiers.id = Some(id.into());
        self
    }

    /// Restrict to sites hosted by `ty` (repeatable; set is unordered)
    pub fn when_injected_into(mut self, ty: impl Into<TypeKey>) -> Self {
        self.qualifiers.target_types.insert(ty.into());
        self
    }

    /// Restrict to sites on the named member (repeatable)
    pub fn for_member(mut self, member: impl Into<String>) -> Self {
        self.qualifiers.members.insert(member.into());
        self
    }

    /// Add a candidate predicate (repeatable)
    pub fn when<F>(mut self, pred: F) -> Self
    where
        F: Fn(&Graph, ObjId) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.qualifiers.predicates.push(Arc::new(pred));
        self
    }

    /// Set the locator; a binding without one never validates
    pub fn via(mut self, locator: Locator) -> Self {
        self.locator = Some(locator);
        self
    }

    /// The type this binding matches against (interface, else concrete)
    pub fn contract(&self) -> &TypeKey {
        self.interface_ty.as_ref().unwrap_or(&self.concrete_ty)
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    /// Selection-time match: type, cardinality, id, target type, member.
    /// Predicates run later against located candidates.
    pub fn matches_site(&self, site: &InjectionSite, host_ty: &TypeKey) -> bool {
        if self.contract() != &site.requested {
            return false;
        }
        // A single site has no take-first contract over a collection
        // binding; the reverse widening is allowed.
        let cardinality_ok = match (site.cardinality, self.cardinality) {
            (Cardinality::Single, Cardinality::Collection) => false,
            _ => true,
        };
        if !cardinality_ok {
            return false;
        }
        if self.qualifiers.id != site.id {
            return false;
        }
        if !self.qualifiers.target_types.is_empty()
            && !self.qualifiers.target_types.contains(host_ty)
        {
            return false;
        }
        if !self.qualifiers.members.is_empty() && !self.qualifiers.members.contains(&site.member) {
            return false;
        }
        true
    }
}

// Equality and hashing cover the declarative identity of a binding;
// locator and predicates are opaque functions and excluded. The
// qualifier sets compare unordered.
impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.interface_ty == other.interface_ty
            && self.concrete_ty == other.concrete_ty
            && self.kind == other.kind
            && self.cardinality == other.cardinality
            && self.qualifiers.id == other.qualifiers.id
            && self.qualifiers.target_types == other.qualifiers.target_types
            && self.qualifiers.members == other.qualifiers.members
    }
}

impl Eq for Binding {}

impl Hash for Binding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.interface_ty.hash(state);
        self.concrete_ty.hash(state);
        self.kind.hash(state);
        (self.cardinality as u8).hash(state);
        self.qualifiers.id.hash(state);
        for ty in &self.qualifiers.target_types {
            ty.hash(state);
        }
        for member in &self.qualifiers.members {
            member.hash(state);
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("contract", self.contract())
            .field("concrete", &self.concrete_ty)
            .field("kind", &self.kind)
            .field("cardinality", &self.cardinality)
            .field("qualifiers", &self.qualifiers)
            .field("has_locator", &self.locator.is_some())
            .field("used", &self.used)
            .finish()
    }
}

/// Per-scope collection surface handed to configuration routines
///
/// Holds no engine or graph handle, so a routine cannot trigger a
/// nested run.
#[derive(Default)]
pub struct Binder {
    bindings: Vec<Binding>,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub(crate) fn into_bindings(self) -> Vec<Binding> {
        self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InjectionSite;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(b: &Binding) -> u64 {
        let mut h = DefaultHasher::new();
        b.hash(&mut h);
        h.finish()
    }

    #[test]
    fn to_redirects_contract() {
        let b = Binding::bind("IWeapon").to("Sword");
        assert_eq!(b.contract().as_str(), "IWeapon");
        assert_eq!(b.concrete_ty.as_str(), "Sword");

        let plain = Binding::bind("Sword");
        assert_eq!(plain.contract().as_str(), "Sword");
        assert!(plain.interface_ty.is_none());
    }

    #[test]
    fn target_type_set_compares_unordered() {
        let a = Binding::bind("IWeapon")
            .to("Sword")
            .when_injected_into("Player")
            .when_injected_into("Enemy");
        let b = Binding::bind("IWeapon")
            .to("Sword")
            .when_injected_into("Enemy")
            .when_injected_into("Player");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn locator_and_predicates_excluded_from_identity() {
        let a = Binding::bind("Sword").when(|_, _| Ok(true));
        let b = Binding::bind("Sword").via(Locator::from_self());
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn match_requires_exact_contract() {
        let b = Binding::bind("IWeapon").to("Sword");
        let site = InjectionSite::new("weapon", "IWeapon");
        assert!(b.matches_site(&site, &"Player".into()));

        let concrete_site = InjectionSite::new("weapon", "Sword");
        assert!(!b.matches_site(&concrete_site, &"Player".into()));
    }

    #[test]
    fn match_requires_id_equality_including_absent() {
        let tagged = Binding::bind("Sword").with_id("melee");
        let plain = Binding::bind("Sword");

        let plain_site = InjectionSite::new("weapon", "Sword");
        let tagged_site = InjectionSite::new("weapon", "Sword").with_id("melee");

        assert!(!tagged.matches_site(&plain_site, &"Player".into()));
        assert!(tagged.matches_site(&tagged_site, &"Player".into()));
        assert!(!plain.matches_site(&tagged_site, &"Player".into()));
        assert!(plain.matches_site(&plain_site, &"Player".into()));
    }

    #[test]
    fn collection_site_accepts_single_binding_not_reverse() {
        let single = Binding::bind("Sword");
        let multi = Binding::bind("Sword").as_collection();

        let single_site = InjectionSite::new("weapon", "Sword");
        let multi_site = InjectionSite::new("weapons", "Sword").collection();

        assert!(single.matches_site(&single_site, &"Player".into()));
        assert!(single.matches_site(&multi_site, &"Player".into()));
        assert!(multi.matches_site(&multi_site, &"Player".into()));
        assert!(!multi.matches_site(&single_site, &"Player".into()));
    }

    #[test]
    fn target_and_member_filters_gate_matches() {
        let b = Binding::bind("Sword")
            .when_injected_into("Player")
            .for_member("main_hand");

        let site = InjectionSite::new("main_hand", "Sword");
        assert!(b.matches_site(&site, &"Player".into()));
        assert!(!b.matches_site(&site, &"Enemy".into()));

        let other_member = InjectionSite::new("off_hand", "Sword");
        assert!(!b.matches_site(&other_member, &"Player".into()));
    }

    #[test]
    fn binder_collects_in_order() {
        let mut binder = Binder::new();
        assert!(binder.is_empty());
        binder.add(Binding::bind("A"));
        binder.add(Binding::bind("B"));
        assert_eq!(binder.len(), 2);
        let bindings = binder.into_bindings();
        assert_eq!(bindings[0].concrete_ty.as_str(), "A");
        assert_eq!(bindings[1].concrete_ty.as_str(), "B");
    }
}
