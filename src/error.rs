//! Error types with fix suggestions (v0.1)

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
/// Some variants are only constructed in library code/tests.
#[derive(Error, Debug)]
pub enum ArborError {
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Manifest errors (ARBOR-001 to ARBOR-006)
    // ─────────────────────────────────────────────────────────────

    #[error("ARBOR-001: Invalid schema: expected '{expected}', got '{got}'")]
    SchemaMismatch { expected: String, got: String },

    #[error("ARBOR-002: Invalid type name '{name}': {reason}")]
    InvalidTypeName { name: String, reason: String },

    #[error("ARBOR-003: Type '{name}' declared twice")]
    DuplicateType { name: String },

    #[error("ARBOR-004: Unknown type '{name}'")]
    UnknownType { name: String },

    #[error("ARBOR-005: Node name '{name}' is not unique")]
    DuplicateNodeName { name: String },

    #[error("ARBOR-006: Unknown node '{name}'")]
    UnknownNode { name: String },

    // ─────────────────────────────────────────────────────────────
    // Graph / run errors (ARBOR-010 to ARBOR-012)
    // ─────────────────────────────────────────────────────────────

    #[error("ARBOR-010: Refusing to run while live playback is active")]
    PlaybackActive,

    #[error("ARBOR-011: Node '{node}' already carries a scope")]
    ScopeAlreadyAttached { node: String },

    #[error("ARBOR-012: Type '{ty}' is not assignable to the Component contract")]
    NotAComponentType { ty: String },

    #[error("ARBOR-013: Invalid asset pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Binding validity rules (ARBOR-020 to ARBOR-025)
    // ─────────────────────────────────────────────────────────────

    #[error("ARBOR-020: Binding for '{contract}' has no locator")]
    NoLocator { contract: String },

    #[error("ARBOR-021: Binding interface type '{ty}' is not an interface")]
    NotAnInterface { ty: String },

    #[error("ARBOR-022: Component binding concrete type '{ty}' is not a component")]
    ConcreteNotComponent { ty: String },

    #[error("ARBOR-023: Global binding for '{contract}' cannot have collection cardinality")]
    GlobalCollection { contract: String },

    #[error("ARBOR-024: Global binding for '{contract}' cannot carry id '{id}'")]
    GlobalWithId { contract: String, id: String },

    #[error("ARBOR-025: Global binding for '{contract}' declared from prefab context '{context}'")]
    GlobalFromPrefab { contract: String, context: String },
}

impl FixSuggestion for ArborError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ArborError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            ArborError::Io(_) => Some("Check file path and permissions"),

            ArborError::SchemaMismatch { .. } => Some("Set schema: arbor/scene@0.1"),
            ArborError::InvalidTypeName { .. } => {
                Some("Type names are identifiers, optionally with :: path segments")
            }
            ArborError::DuplicateType { .. } => Some("Declare each type once in the types: list"),
            ArborError::UnknownType { .. } => Some("Declare the type in the types: list first"),
            ArborError::DuplicateNodeName { .. } => {
                Some("Node names must be unique so locators can anchor on them")
            }
            ArborError::UnknownNode { .. } => Some("Check the node name in the locator anchor"),

            ArborError::PlaybackActive => {
                Some("Stop playback in the host environment before running injection")
            }
            ArborError::ScopeAlreadyAttached { .. } => {
                Some("A node hosts at most one scope; attach to a child node instead")
            }
            ArborError::NotAComponentType { .. } => {
                Some("Declare the type with kind: component (or derive it from Component)")
            }
            ArborError::InvalidPattern { .. } => {
                Some("Asset patterns use glob syntax, e.g. audio/**/*.wav")
            }

            ArborError::NoLocator { .. } => Some("Finish the binding with a .via(locator) step"),
            ArborError::NotAnInterface { .. } => {
                Some("bind() a declared interface, or drop the .to() redirection")
            }
            ArborError::ConcreteNotComponent { .. } => {
                Some("Use .as_asset() for non-component types")
            }
            ArborError::GlobalCollection { .. } => {
                Some("Global bindings are single-instance; drop .as_collection()")
            }
            ArborError::GlobalWithId { .. } => {
                Some("Global bindings are keyed by type only; drop .with_id()")
            }
            ArborError::GlobalFromPrefab { .. } => {
                Some("Declare global bindings from a scene scope, not a prefab")
            }
        }
    }
}
