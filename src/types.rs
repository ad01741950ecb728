//! Type identity without reflection
//!
//! The host environment resolves dependencies by runtime type. This crate
//! has no reflection, so types are interned names (`TypeKey`) plus a
//! declared assignability relation (`TypeTable`): interfaces, classes,
//! and components (classes assignable to the `Component` host contract).
//!
//! Uses Arc<str> for zero-cost cloning of type keys.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ArborError;

/// Pattern for type names: identifier segments joined by `::`
static TYPE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*$").unwrap());

/// The host contract every component type must be assignable to
pub const COMPONENT_CONTRACT: &str = "Component";

/// The built-in type of scope hosts (a `Component` specialization)
pub const SCOPE_TYPE: &str = "Scope";

/// Interned type name
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TypeKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.0)
    }
}

/// Validate a type name against the identifier pattern
pub fn validate_type_name(name: &str) -> Result<(), ArborError> {
    if name.is_empty() {
        return Err(ArborError::InvalidTypeName {
            name: name.to_string(),
            reason: "cannot be empty".into(),
        });
    }
    if !TYPE_NAME_PATTERN.is_match(name) {
        return Err(ArborError::InvalidTypeName {
            name: name.to_string(),
            reason: "must be identifier segments joined by '::'".into(),
        });
    }
    Ok(())
}

/// Declared facts about one type
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub key: TypeKey,
    pub is_interface: bool,
    /// Direct supertypes (implemented interfaces and base classes)
    pub supers: BTreeSet<TypeKey>,
}

/// Registry of declared types and their assignability relation
///
/// `is_assignable` is reflexive and transitive over declared supers.
/// Unregistered keys are only assignable to themselves.
#[derive(Debug, Clone)]
pub struct TypeTable {
    infos: HashMap<TypeKey, TypeInfo>,
    component: TypeKey,
}

impl TypeTable {
    /// Create a table with the built-in `Component` contract and `Scope` type
    pub fn new() -> Self {
        let mut table = Self {
            infos: HashMap::new(),
            component: TypeKey::new(COMPONENT_CONTRACT),
        };
        table
            .class(COMPONENT_CONTRACT)
            .and_then(|_| table.component(SCOPE_TYPE))
            .expect("built-in type names are valid");
        table
    }

    fn insert(&mut self, name: &str, is_interface: bool) -> Result<TypeKey, ArborError> {
        validate_type_name(name)?;
        let key = TypeKey::new(name);
        if self.infos.contains_key(&key) {
            return Err(ArborError::DuplicateType { name: name.to_string() });
        }
        self.infos.insert(
            key.clone(),
            TypeInfo { key: key.clone(), is_interface, supers: BTreeSet::new() },
        );
        Ok(key)
    }

    /// Declare an interface type
    pub fn interface(&mut self, name: &str) -> Result<TypeKey, ArborError> {
        self.insert(name, true)
    }

    /// Declare a plain class (asset types, data objects)
    pub fn class(&mut self, name: &str) -> Result<TypeKey, ArborError> {
        self.insert(name, false)
    }

    /// Declare a component class (assignable to the `Component` contract)
    pub fn component(&mut self, name: &str) -> Result<TypeKey, ArborError> {
        let key = self.insert(name, false)?;
        let contract = self.component.clone();
        self.add_super(&key, &contract)?;
        Ok(key)
    }

    /// Record that `ty` is assignable to `sup` (implements or extends)
    pub fn add_super(&mut self, ty: &TypeKey, sup: &TypeKey) -> Result<(), ArborError> {
        if !self.infos.contains_key(sup) {
            return Err(ArborError::UnknownType { name: sup.to_string() });
        }
        let info = self
            .infos
            .get_mut(ty)
            .ok_or_else(|| ArborError::UnknownType { name: ty.to_string() })?;
        info.supers.insert(sup.clone());
        Ok(())
    }

    pub fn contains(&self, ty: &TypeKey) -> bool {
        self.infos.contains_key(ty)
    }

    pub fn is_interface(&self, ty: &TypeKey) -> bool {
        self.infos.get(ty).map(|i| i.is_interface).unwrap_or(false)
    }

    pub fn component_contract(&self) -> &TypeKey {
        &self.component
    }

    /// Can a value of `concrete` satisfy a request for `requested`?
    pub fn is_assignable(&self, concrete: &TypeKey, requested: &TypeKey) -> bool {
        if concrete == requested {
            return true;
        }
        // BFS over declared supers
        let mut seen: BTreeSet<&TypeKey> = BTreeSet::new();
        let mut queue: VecDeque<&TypeKey> = VecDeque::new();
        queue.push_back(concrete);
        while let Some(current) = queue.pop_front() {
            if let Some(info) = self.infos.get(current) {
                for sup in &info.supers {
                    if sup == requested {
                        return true;
                    }
                    if seen.insert(sup) {
                        queue.push_back(sup);
                    }
                }
            }
        }
        false
    }

    /// Is this a component type (assignable to the contract)?
    pub fn is_component(&self, ty: &TypeKey) -> bool {
        self.is_assignable(ty, &self.component.clone())
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_weapons() -> TypeTable {
        let mut t = TypeTable::new();
        let iweapon = t.interface("IWeapon").unwrap();
        let sword = t.component("Sword").unwrap();
        t.add_super(&sword, &iweapon).unwrap();
        t
    }

    // ═══════════════════════════════════════════════════════════════
    // Name validation
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn valid_names() {
        assert!(validate_type_name("Sword").is_ok());
        assert!(validate_type_name("IWeapon").is_ok());
        assert!(validate_type_name("combat::Sword").is_ok());
        assert!(validate_type_name("a_b::C2").is_ok());
    }

    #[test]
    fn reject_bad_names() {
        assert!(validate_type_name("").is_err());
        assert!(validate_type_name("2Sword").is_err());
        assert!(validate_type_name("Sword Board").is_err());
        assert!(validate_type_name("combat::").is_err());
        assert!(validate_type_name("::Sword").is_err());
        assert!(validate_type_name("combat.Sword").is_err());
    }

    // ═══════════════════════════════════════════════════════════════
    // Registration
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn builtins_present() {
        let t = TypeTable::new();
        assert!(t.contains(&TypeKey::from(COMPONENT_CONTRACT)));
        assert!(t.is_component(&TypeKey::from(SCOPE_TYPE)));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut t = TypeTable::new();
        t.class("Mesh").unwrap();
        let err = t.interface("Mesh").unwrap_err();
        assert!(err.to_string().contains("ARBOR-003"));
    }

    #[test]
    fn add_super_requires_known_types() {
        let mut t = TypeTable::new();
        let mesh = t.class("Mesh").unwrap();
        let missing = TypeKey::from("Missing");
        assert!(t.add_super(&mesh, &missing).is_err());
        assert!(t.add_super(&missing, &mesh).is_err());
    }

    // ═══════════════════════════════════════════════════════════════
    // Assignability
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn assignable_is_reflexive() {
        let t = TypeTable::new();
        let unregistered = TypeKey::from("Ghost");
        assert!(t.is_assignable(&unregistered, &unregistered));
    }

    #[test]
    fn component_implements_interface() {
        let t = table_with_weapons();
        assert!(t.is_assignable(&"Sword".into(), &"IWeapon".into()));
        assert!(t.is_assignable(&"Sword".into(), &COMPONENT_CONTRACT.into()));
        assert!(!t.is_assignable(&"IWeapon".into(), &"Sword".into()));
    }

    #[test]
    fn assignable_is_transitive() {
        let mut t = TypeTable::new();
        let base = t.interface("IBase").unwrap();
        let mid = t.interface("IMid").unwrap();
        let leaf = t.component("Leaf").unwrap();
        t.add_super(&mid, &base).unwrap();
        t.add_super(&leaf, &mid).unwrap();
        assert!(t.is_assignable(&leaf, &base));
    }

    #[test]
    fn interface_flag() {
        let t = table_with_weapons();
        assert!(t.is_interface(&"IWeapon".into()));
        assert!(!t.is_interface(&"Sword".into()));
        assert!(!t.is_interface(&"Unregistered".into()));
    }
}
