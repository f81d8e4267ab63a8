pub mod collision;
pub mod dedup;
pub mod filters;
pub mod rename;
pub mod rewrite;
pub mod sections;
pub mod strategy;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::graph::ReferenceGraph;
use crate::report::{CollisionReport, WarningCategory, Warnings};
use crate::schema::{ParsedSpec, Schema, SourceFormat, SourceMap, SpecVersion};
use crate::scope::section_path;

use dedup::{EquivalenceMode, EquivalenceOracle};
use rename::{NameGenerator, PrimaryOperationPolicy};
use rewrite::RefRewriter;
use strategy::{CollisionContext, CollisionHandler, CollisionKind, CollisionResolution, Strategy};

/// Source names produced by parsers fed from memory instead of a real
/// file, they degrade collision diagnostics.
const GENERIC_SOURCES: [&str; 6] = [
    "ParseBytes.yaml",
    "ParseBytes.json",
    "ParseFile.yaml",
    "ParseFile.json",
    "stdin",
    "-",
];

pub struct Joiner;

impl Joiner {
    pub fn options() -> JoinerOptions {
        JoinerOptions {
            default_strategy: Strategy::Fail,
            path_strategy: None,
            schema_strategy: None,
            component_strategy: None,
            deduplicate_tags: true,
            merge_arrays: true,
            rename_template: rename::DEFAULT_TEMPLATE.to_string(),
            namespace_prefix: HashMap::new(),
            always_apply_prefix: false,
            equivalence_mode: EquivalenceMode::None,
            collision_report: false,
            semantic_deduplication: false,
            operation_context: false,
            primary_operation_policy: PrimaryOperationPolicy::FirstEncountered,
            handler: None,
            handler_kinds: None,
            oracle: Box::new(dedup::structural_equivalence),
        }
    }
}

pub struct JoinerOptions {
    pub(crate) default_strategy: Strategy,
    pub(crate) path_strategy: Option<Strategy>,
    pub(crate) schema_strategy: Option<Strategy>,
    pub(crate) component_strategy: Option<Strategy>,
    pub(crate) deduplicate_tags: bool,
    pub(crate) merge_arrays: bool,
    pub(crate) rename_template: String,
    pub(crate) namespace_prefix: HashMap<String, String>,
    pub(crate) always_apply_prefix: bool,
    pub(crate) equivalence_mode: EquivalenceMode,
    pub(crate) collision_report: bool,
    pub(crate) semantic_deduplication: bool,
    pub(crate) operation_context: bool,
    pub(crate) primary_operation_policy: PrimaryOperationPolicy,
    pub(crate) handler: Option<CollisionHandler>,
    pub(crate) handler_kinds: Option<HashSet<CollisionKind>>,
    pub(crate) oracle: EquivalenceOracle,
}

impl JoinerOptions {
    pub fn with_default_strategy(&mut self, value: Strategy) -> &mut Self {
        self.default_strategy = value;
        self
    }

    pub fn with_path_strategy(&mut self, value: Strategy) -> &mut Self {
        self.path_strategy = Some(value);
        self
    }

    pub fn with_schema_strategy(&mut self, value: Strategy) -> &mut Self {
        self.schema_strategy = Some(value);
        self
    }

    pub fn with_component_strategy(&mut self, value: Strategy) -> &mut Self {
        self.component_strategy = Some(value);
        self
    }

    pub fn with_deduplicate_tags(&mut self, value: bool) -> &mut Self {
        self.deduplicate_tags = value;
        self
    }

    pub fn with_merge_arrays(&mut self, value: bool) -> &mut Self {
        self.merge_arrays = value;
        self
    }

    pub fn with_rename_template(&mut self, value: &str) -> &mut Self {
        self.rename_template = value.to_string();
        self
    }

    pub fn with_namespace_prefix(&mut self, source: &str, prefix: &str) -> &mut Self {
        self.namespace_prefix
            .insert(source.to_string(), prefix.to_string());
        self
    }

    pub fn with_always_apply_prefix(&mut self, value: bool) -> &mut Self {
        self.always_apply_prefix = value;
        self
    }

    pub fn with_equivalence_mode(&mut self, value: EquivalenceMode) -> &mut Self {
        self.equivalence_mode = value;
        self
    }

    pub fn with_collision_report(&mut self, value: bool) -> &mut Self {
        self.collision_report = value;
        self
    }

    pub fn with_semantic_deduplication(&mut self, value: bool) -> &mut Self {
        self.semantic_deduplication = value;
        self
    }

    pub fn with_operation_context(&mut self, value: bool) -> &mut Self {
        self.operation_context = value;
        self
    }

    pub fn with_primary_operation_policy(&mut self, value: PrimaryOperationPolicy) -> &mut Self {
        self.primary_operation_policy = value;
        self
    }

    pub fn with_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&CollisionContext) -> Result<CollisionResolution, Error> + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn with_handler_kinds(&mut self, kinds: &[CollisionKind]) -> &mut Self {
        self.handler_kinds = Some(kinds.iter().copied().collect());
        self
    }

    pub fn with_equivalence_oracle<F>(&mut self, oracle: F) -> &mut Self
    where
        F: Fn(&Value, &Value, EquivalenceMode) -> (bool, usize) + 'static,
    {
        self.oracle = Box::new(oracle);
        self
    }

    pub(crate) fn effective_strategy(&self, kind: CollisionKind) -> Strategy {
        match kind {
            CollisionKind::Path | CollisionKind::Webhook => self.path_strategy,
            CollisionKind::Schema => self.schema_strategy,
            _ => self.component_strategy,
        }
        .unwrap_or(self.default_strategy)
    }

    /// Joins the documents in order, the first one is the base.
    pub fn process(&self, specs: &[ParsedSpec]) -> Result<JoinResult, Error> {
        if specs.len() < 2 {
            return Err(Error::NotEnoughDocuments(specs.len()));
        }

        let mut warnings = Warnings::default();

        for spec in specs {
            if spec.schema.get_body().is_null() {
                return Err(Error::EmptyDocument(spec.source_path.clone()));
            }

            if !spec.schema.get_body().is_object() {
                return Err(Error::InvalidDocumentRoot(spec.source_path.clone()));
            }

            if !spec.errors.is_empty() {
                return Err(Error::DocumentWithErrors {
                    path: spec.source_path.clone(),
                    count: spec.errors.len(),
                });
            }

            if spec.source_path.is_empty()
                || GENERIC_SOURCES.contains(&spec.source_path.as_str())
            {
                warnings.add(
                    WarningCategory::GenericSourceName,
                    format!(
                        "generic source name degrades diagnostics: {}",
                        if spec.source_path.is_empty() {
                            "<empty>"
                        } else {
                            spec.source_path.as_str()
                        }
                    ),
                );
            }
        }

        let base = &specs[0];
        let base_version = base.spec_version()?;

        for spec in &specs[1..] {
            let version = spec.spec_version()?;

            if version.major != base_version.major {
                return Err(Error::IncompatibleVersions {
                    left: base.version.clone(),
                    left_path: base.source_path.clone(),
                    right: spec.version.clone(),
                    right_path: spec.source_path.clone(),
                });
            }

            if version.minor != base_version.minor {
                warnings.add(
                    WarningCategory::VersionMismatch,
                    format!(
                        "joining version {} ({}) with {} ({})",
                        base.version, base.source_path, spec.version, spec.source_path
                    ),
                );
            }
        }

        let mut state = JoinState {
            doc: base.schema.get_body().clone(),
            version: base_version,
            warnings,
            collisions: 0,
            report: self.collision_report.then(CollisionReport::default),
            rewriter: RefRewriter::default(),
            namer: NameGenerator::new(&self.rename_template),
            first_source: base.source_path.clone(),
            first_map: base.source_map.clone(),
        };

        for (index, incoming) in specs.iter().enumerate().skip(1) {
            log::debug!(
                "merging {} into {}",
                incoming.source_path,
                state.first_source
            );

            let mut graph = self.operation_context.then(|| {
                ReferenceGraph::build(incoming.schema.get_body(), state.version)
            });

            sections::merge_paths(self, &mut state, incoming)?;

            if !state.version.is_legacy() {
                sections::merge_webhooks(self, &mut state, incoming)?;
            }

            sections::merge_schemas(self, &mut state, incoming, graph.as_mut(), index)?;

            if !state.version.is_legacy() {
                sections::merge_components(self, &mut state, incoming)?;
            }

            if self.merge_arrays {
                sections::merge_array_fields(&mut state, incoming);
            }

            sections::merge_tags(self, &mut state, incoming);
        }

        if self.semantic_deduplication {
            self.deduplicate_schemas(&mut state);
        }

        state.rewriter.process(&mut state.doc);

        let stats = DocumentStats::from_document(&state.doc, state.version);
        let renames = state.rewriter.bindings();

        Ok(JoinResult {
            schema: Schema::from_json(state.doc),
            version: base.version.clone(),
            source_format: base.source_format,
            warnings: state.warnings,
            collisions: state.collisions,
            report: state.report,
            source_path: base.source_path.clone(),
            renames,
            stats,
        })
    }

    fn deduplicate_schemas(&self, state: &mut JoinState) {
        let (section, pointer) = if state.version.is_legacy() {
            ("definitions", "/definitions")
        } else {
            ("components.schemas", "/components/schemas")
        };

        let schemas = match state.doc.pointer(pointer).and_then(Value::as_object) {
            Some(schemas) if schemas.len() > 1 => schemas.clone(),
            _ => return,
        };

        // the consolidation pass has to compare something, default to
        // a deep comparison when no mode was configured
        let mode = match self.equivalence_mode {
            EquivalenceMode::None => EquivalenceMode::Deep,
            configured => configured,
        };

        let bindings = dedup::equivalence_classes(&schemas, &self.oracle, mode);
        if bindings.is_empty() {
            return;
        }

        if let Some(schemas) = state.doc.pointer_mut(pointer).and_then(Value::as_object_mut) {
            for (loser, canonical) in &bindings {
                schemas.remove(loser);
                state.rewriter.register(loser, canonical, state.version.major);
                state.warnings.add_at(
                    WarningCategory::SchemaDeduplicated,
                    format!("schema {loser} deduplicated into {canonical}"),
                    &section_path(section, loser),
                    (0, 0),
                );
            }
        }

        let canonical_names = bindings
            .iter()
            .map(|(_, canonical)| canonical.as_str())
            .collect::<HashSet<_>>();

        state.warnings.add(
            WarningCategory::SemanticDedupSummary,
            format!(
                "semantic deduplication consolidated {} schemas into {} canonical names",
                bindings.len(),
                canonical_names.len()
            ),
        );
    }
}

/// Per-join mutable state owned by the orchestrator.
pub(crate) struct JoinState {
    pub doc: Value,
    pub version: SpecVersion,
    pub warnings: Warnings,
    pub collisions: usize,
    pub report: Option<CollisionReport>,
    pub rewriter: RefRewriter,
    pub namer: NameGenerator,
    pub first_source: String,
    pub first_map: Option<SourceMap>,
}

#[derive(Debug)]
pub struct JoinResult {
    pub schema: Schema,
    pub version: String,
    pub source_format: SourceFormat,
    pub warnings: Warnings,
    pub collisions: usize,
    pub report: Option<CollisionReport>,
    pub source_path: String,
    pub renames: HashMap<String, String>,
    pub stats: DocumentStats,
}

impl JoinResult {
    pub fn legacy_warnings(&self) -> Vec<String> {
        self.warnings.legacy()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub paths: usize,
    pub operations: usize,
    pub webhooks: usize,
    pub schemas: usize,
    pub components: usize,
    pub tags: usize,
}

impl DocumentStats {
    pub fn from_document(doc: &Value, version: SpecVersion) -> DocumentStats {
        const METHODS: [&str; 8] = [
            "get", "put", "post", "delete", "options", "head", "patch", "trace",
        ];
        const COMPONENT_KEYS: [&str; 9] = [
            "responses",
            "parameters",
            "examples",
            "requestBodies",
            "headers",
            "securitySchemes",
            "links",
            "callbacks",
            "pathItems",
        ];

        let count = |pointer: &str| {
            doc.pointer(pointer)
                .and_then(Value::as_object)
                .map(|m| m.len())
                .unwrap_or(0)
        };

        let operations = doc
            .get("paths")
            .and_then(Value::as_object)
            .map(|paths| {
                paths
                    .values()
                    .filter_map(Value::as_object)
                    .map(|item| METHODS.iter().filter(|m| item.contains_key(**m)).count())
                    .sum()
            })
            .unwrap_or(0);

        DocumentStats {
            paths: count("/paths"),
            operations,
            webhooks: count("/webhooks"),
            schemas: count(if version.is_legacy() {
                "/definitions"
            } else {
                "/components/schemas"
            }),
            components: COMPONENT_KEYS
                .iter()
                .map(|key| count(&format!("/components/{key}")))
                .sum(),
            tags: doc
                .get("tags")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0),
        }
    }
}
