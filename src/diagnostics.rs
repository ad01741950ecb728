//! Diagnostic log for resolution runs (v0.1)
//!
//! Resolution never aborts on a per-site failure; every failure lands
//! here and the run continues.
//! - Diagnostic: envelope with id + timestamp + severity + kind
//! - DiagnosticKind: 7 variants across binding/site/registry levels
//! - DiagLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// Single diagnostic in the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since log creation (ms)
    pub timestamp_ms: u64,
    pub severity: Severity,
    /// Node the diagnostic is anchored on, if any
    pub node: Option<Arc<str>>,
    pub kind: DiagnosticKind,
}

/// All possible diagnostic kinds
///
/// Uses Arc<str> for type/member fields to enable zero-cost cloning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticKind {
    // ═══════════════════════════════════════════
    // SITE LEVEL
    // ═══════════════════════════════════════════
    /// No binding matched the site
    MissingBinding {
        requested: Arc<str>,
        member: Arc<str>,
        host_ty: Arc<str>,
    },
    /// A binding matched but produced no candidate
    MissingDependency {
        requested: Arc<str>,
        member: Arc<str>,
        host_ty: Arc<str>,
        detail: String,
    },

    // ═══════════════════════════════════════════
    // BINDING LEVEL
    // ═══════════════════════════════════════════
    /// A binding failed the static rules or its locator errored
    InvalidBinding {
        contract: Arc<str>,
        reason: String,
    },
    /// A scope's configuration routine returned an error; its bindings
    /// are dropped for the run
    ConfigurationError {
        error: String,
    },
    /// A binding matched no site over the whole run
    UnusedBinding {
        contract: Arc<str>,
    },

    // ═══════════════════════════════════════════
    // REGISTRY LEVEL
    // ═══════════════════════════════════════════
    DuplicateGlobalRegistration {
        contract: Arc<str>,
    },
    /// Registry touched outside an active session
    RegistryMisuse {
        detail: String,
    },
}

impl DiagnosticKind {
    /// Extract the contract/requested type, if the kind carries one
    pub fn contract(&self) -> Option<&str> {
        match self {
            Self::MissingBinding { requested, .. }
            | Self::MissingDependency { requested, .. } => Some(requested),
            Self::InvalidBinding { contract, .. }
            | Self::UnusedBinding { contract }
            | Self::DuplicateGlobalRegistration { contract } => Some(contract),
            Self::ConfigurationError { .. } | Self::RegistryMisuse { .. } => None,
        }
    }

    /// Severity is fixed per kind
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnusedBinding { .. } | Self::RegistryMisuse { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Thread-safe, append-only diagnostic log
#[derive(Clone)]
pub struct DiagLog {
    diags: Arc<RwLock<Vec<Diagnostic>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl DiagLog {
    pub fn new() -> Self {
        Self {
            diags: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit a diagnostic (thread-safe, returns diagnostic ID)
    pub fn emit(&self, node: Option<Arc<str>>, kind: DiagnosticKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let diag = Diagnostic {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            severity: kind.severity(),
            node,
            kind,
        };

        self.diags.write().push(diag);
        id
    }

    /// Get all diagnostics (cloned)
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diags.read().clone()
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.diagnostics()
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .collect()
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.diagnostics()
            .into_iter()
            .filter(|d| d.severity == Severity::Warning)
            .collect()
    }

    /// Filter diagnostics anchored on a node
    pub fn filter_node(&self, node: &str) -> Vec<Diagnostic> {
        self.diagnostics()
            .into_iter()
            .filter(|d| d.node.as_deref() == Some(node))
            .collect()
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.diagnostics()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.diags.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DiagLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DiagLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagLog").field("len", &self.len()).finish()
    }
}
