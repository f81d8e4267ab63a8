use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("joiner: at least two documents are required, got: {0}")]
    NotEnoughDocuments(usize),

    #[error("joiner: document has no body: {0}")]
    EmptyDocument(String),

    #[error("joiner: document carries {count} parse errors: {path}")]
    DocumentWithErrors { path: String, count: usize },

    #[error("joiner: document root is not an object: {0}")]
    InvalidDocumentRoot(String),

    #[error("joiner: unknown openapi version: {0}")]
    UnknownVersion(String),

    #[error("joiner: incompatible versions: {left} ({left_path}) and {right} ({right_path})")]
    IncompatibleVersions {
        left: String,
        left_path: String,
        right: String,
        right_path: String,
    },

    #[error("joiner: unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("joiner: unknown equivalence mode: {0}")]
    UnknownEquivalenceMode(String),

    #[error("joiner: unknown primary operation policy: {0}")]
    UnknownPrimaryOperationPolicy(String),

    #[error("joiner: collision on {name} between {left_source}:{left_line}:{left_column} and {right_source}:{right_line}:{right_column}, use --{flag} to resolve")]
    Collision {
        name: String,
        left_source: String,
        left_line: u32,
        left_column: u32,
        right_source: String,
        right_line: u32,
        right_column: u32,
        flag: String,
    },

    #[error("joiner: {0} not supported for paths")]
    ResolutionNotSupportedForPaths(String),

    #[error("joiner: custom resolution value has wrong type for {0}")]
    CustomValueWrongType(String),

    #[error("joiner: deduplicate strategy requires equivalence mode shallow or deep")]
    DeduplicateWithoutEquivalence,

    #[error("joiner: schemas named {name} are not equivalent: {differences} differences")]
    NotEquivalent { name: String, differences: usize },

    #[error("joiner: handler failed: {0}")]
    HandlerFail(String),

    #[error("joiner: cannot deserialize yaml document: {0}")]
    DeserializeYaml(serde_yaml::Error),

    #[error("joiner: cannot deserialize json document: {0}")]
    DeserializeJson(serde_json::Error),
}
