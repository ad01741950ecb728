//! Static legality rules for bindings
//!
//! Run once per binding during the Configuring phase, before any
//! resolution. A failing binding is dropped with a diagnostic; the run
//! continues.

use crate::binding::{Binding, BindingKind};
use crate::error::ArborError;
use crate::graph::{Cardinality, Context};
use crate::types::TypeTable;

/// Check a binding against the static rules.
///
/// Fails when: no locator is set; the interface redirection names a
/// non-interface; a component binding's concrete type is not a
/// component; a global binding declares collection cardinality or an
/// id; a global binding is declared from a prefab context.
pub fn validate(
    binding: &Binding,
    types: &TypeTable,
    declaring_context: &Context,
) -> Result<(), ArborError> {
    let contract = binding.contract().to_string();

    if binding.locator.is_none() {
        return Err(ArborError::NoLocator { contract });
    }

    if let Some(iface) = &binding.interface_ty {
        if !types.is_interface(iface) {
            return Err(ArborError::NotAnInterface { ty: iface.to_string() });
        }
    }

    if binding.kind == BindingKind::Component && !types.is_component(&binding.concrete_ty) {
        return Err(ArborError::ConcreteNotComponent {
            ty: binding.concrete_ty.to_string(),
        });
    }

    if binding.kind == BindingKind::Global {
        if binding.cardinality == Cardinality::Collection {
            return Err(ArborError::GlobalCollection { contract });
        }
        if let Some(id) = &binding.qualifiers.id {
            if !id.is_empty() {
                return Err(ArborError::GlobalWithId { contract, id: id.clone() });
            }
        }
        if declaring_context.is_prefab() {
            return Err(ArborError::GlobalFromPrefab {
                contract,
                context: declaring_context.to_string(),
            });
        }
    }

    Ok(())
}
