//! Injection sites and assignment slots
//!
//! A site is an annotated member on a host requesting a dependency.
//! Interface-typed sites cannot be persisted directly by the host
//! environment, so assignment goes through a hidden concrete-base
//! backing slot; the exposed accessor is refreshed after every
//! assignment and after every graph reload.

use serde::{Deserialize, Serialize};

use crate::graph::ObjId;
use crate::types::TypeKey;

/// How many instances a site requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    Single,
    Collection,
}

/// The structural kind of the annotated member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    #[default]
    Field,
    Property,
    Parameter,
}

/// A slot's current contents
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotValue {
    #[default]
    Empty,
    One(ObjId),
    Many(Vec<ObjId>),
}

impl SlotValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, SlotValue::Empty)
    }

    /// The single instance, if any
    pub fn one(&self) -> Option<ObjId> {
        match self {
            SlotValue::One(obj) => Some(*obj),
            _ => None,
        }
    }

    /// The instance sequence (a single value reads as a one-element slice)
    pub fn many(&self) -> &[ObjId] {
        match self {
            SlotValue::Many(objs) => objs,
            SlotValue::One(obj) => std::slice::from_ref(obj),
            SlotValue::Empty => &[],
        }
    }
}

/// Assignment target of a site
///
/// Concrete-typed sites write the exposed value directly. Bridged
/// (interface-typed) sites write the hidden backing slot and copy it
/// into the exposed accessor on `refresh()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    exposed: SlotValue,
    backing: SlotValue,
    bridged: bool,
}

impl Slot {
    pub fn new(bridged: bool) -> Self {
        Self { exposed: SlotValue::Empty, backing: SlotValue::Empty, bridged }
    }

    pub fn is_bridged(&self) -> bool {
        self.bridged
    }

    /// What the host observes through the accessor
    pub fn value(&self) -> &SlotValue {
        &self.exposed
    }

    /// The persisted concrete-base slot (bridged sites only)
    pub fn backing(&self) -> &SlotValue {
        &self.backing
    }

    pub fn assign(&mut self, value: SlotValue) {
        if self.bridged {
            self.backing = value;
            self.refresh();
        } else {
            self.exposed = value;
        }
    }

    /// Re-derive the exposed accessor from the backing slot.
    /// Called after assignment and after every graph reload.
    pub fn refresh(&mut self) {
        if self.bridged {
            self.exposed = self.backing.clone();
        }
    }

    pub fn clear(&mut self) {
        self.exposed = SlotValue::Empty;
        self.backing = SlotValue::Empty;
    }
}

/// An annotated member requesting a dependency
#[derive(Debug, Clone)]
pub struct InjectionSite {
    pub member: String,
    pub requested: TypeKey,
    pub cardinality: Cardinality,
    /// Only bindings carrying the same id qualify
    pub id: Option<String>,
    /// Suppress missing-binding/missing-dependency diagnostics
    pub optional: bool,
    pub kind: SiteKind,
    pub slot: Slot,
}

impl InjectionSite {
    pub fn new(member: impl Into<String>, requested: impl Into<TypeKey>) -> Self {
        Self {
            member: member.into(),
            requested: requested.into(),
            cardinality: Cardinality::Single,
            id: None,
            optional: false,
            kind: SiteKind::Field,
            slot: Slot::new(false),
        }
    }

    pub fn collection(mut self) -> Self {
        self.cardinality = Cardinality::Collection;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn of_kind(mut self, kind: SiteKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attachment fixes the bridging mode from the requested type.
    pub(crate) fn set_bridged(&mut self, bridged: bool) {
        self.slot = Slot::new(bridged);
    }
}
