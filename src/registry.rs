//! Global registry for type-keyed singletons
//!
//! Holds at most one instance per contract type, alive only within a
//! resolution session. The engine opens a session around each run (or
//! batch); touching the registry outside one is a no-op that leaves a
//! warning in the log, never a panic.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::diagnostics::{DiagLog, DiagnosticKind};
use crate::graph::ObjId;
use crate::types::TypeKey;

pub struct GlobalRegistry {
    /// `Some` while a session is open
    entries: RwLock<Option<HashMap<TypeKey, ObjId>>>,
    diag: DiagLog,
}

impl GlobalRegistry {
    pub fn new(diag: DiagLog) -> Self {
        Self { entries: RwLock::new(None), diag }
    }

    pub fn session_active(&self) -> bool {
        self.entries.read().is_some()
    }

    /// Open a session, clearing any prior entries
    pub fn begin_session(&self) {
        *self.entries.write() = Some(HashMap::new());
    }

    /// Close the session and drop every entry
    pub fn end_session(&self) {
        *self.entries.write() = None;
    }

    /// Register `obj` under `contract`.
    ///
    /// Returns false (with a diagnostic) on a duplicate contract or
    /// outside a session; a duplicate never overwrites silently.
    pub fn register(&self, contract: &TypeKey, obj: ObjId) -> bool {
        let mut guard = self.entries.write();
        let Some(entries) = guard.as_mut() else {
            self.misuse("register outside an active session");
            return false;
        };
        if entries.contains_key(contract) {
            self.diag.emit(
                None,
                DiagnosticKind::DuplicateGlobalRegistration {
                    contract: contract.as_str().into(),
                },
            );
            return false;
        }
        entries.insert(contract.clone(), obj);
        true
    }

    /// Remove the entry under `contract`, if any
    pub fn unregister(&self, contract: &TypeKey) -> bool {
        let mut guard = self.entries.write();
        let Some(entries) = guard.as_mut() else {
            self.misuse("unregister outside an active session");
            return false;
        };
        entries.remove(contract).is_some()
    }

    /// Look up the instance under `contract`; an absent entry leaves a
    /// missing-dependency diagnostic at the call site's discretion, so
    /// this only reports session misuse.
    pub fn get(&self, contract: &TypeKey) -> Option<ObjId> {
        let guard = self.entries.read();
        let Some(entries) = guard.as_ref() else {
            self.misuse("get outside an active session");
            return None;
        };
        entries.get(contract).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().as_ref().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn misuse(&self, detail: &str) {
        self.diag
            .emit(None, DiagnosticKind::RegistryMisuse { detail: detail.to_string() });
    }
}

impl std::fmt::Debug for GlobalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalRegistry")
            .field("session_active", &self.session_active())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    fn registry() -> (GlobalRegistry, DiagLog) {
        let diag = DiagLog::new();
        (GlobalRegistry::new(diag.clone()), diag)
    }

    #[test]
    fn register_and_get_within_session() {
        let (reg, diag) = registry();
        reg.begin_session();
        let ty = TypeKey::from("IAudio");
        assert!(reg.register(&ty, ObjId(1)));
        assert_eq!(reg.get(&ty), Some(ObjId(1)));
        assert!(diag.is_empty());
    }

    #[test]
    fn duplicate_registration_is_rejected_not_overwritten() {
        let (reg, diag) = registry();
        reg.begin_session();
        let ty = TypeKey::from("IAudio");
        assert!(reg.register(&ty, ObjId(1)));
        assert!(!reg.register(&ty, ObjId(2)));

        assert_eq!(reg.get(&ty), Some(ObjId(1)));
        assert_eq!(diag.errors().len(), 1);
        assert_eq!(diag.errors()[0].kind.contract(), Some("IAudio"));
    }

    #[test]
    fn operations_outside_session_are_warned_noops() {
        let (reg, diag) = registry();
        let ty = TypeKey::from("IAudio");
        assert!(!reg.register(&ty, ObjId(1)));
        assert_eq!(reg.get(&ty), None);
        assert!(!reg.unregister(&ty));
        assert_eq!(diag.warnings().len(), 3);
        assert!(diag.errors().is_empty());
    }

    #[test]
    fn end_session_drops_entries() {
        let (reg, diag) = registry();
        reg.begin_session();
        let ty = TypeKey::from("IAudio");
        reg.register(&ty, ObjId(1));
        reg.end_session();
        assert!(!reg.session_active());

        reg.begin_session();
        assert_eq!(reg.get(&ty), None);
        assert!(reg.is_empty());
        assert!(diag.is_empty());
    }

    #[test]
    fn unregister_frees_the_contract() {
        let (reg, _diag) = registry();
        reg.begin_session();
        let ty = TypeKey::from("IAudio");
        reg.register(&ty, ObjId(1));
        assert!(reg.unregister(&ty));
        assert!(!reg.unregister(&ty));
        assert!(reg.register(&ty, ObjId(2)));
        assert_eq!(reg.get(&ty), Some(ObjId(2)));
    }

    #[test]
    fn misuse_severity_is_warning() {
        let (reg, diag) = registry();
        reg.get(&TypeKey::from("T"));
        assert_eq!(diag.diagnostics()[0].severity, Severity::Warning);
    }
}
