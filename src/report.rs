use std::fmt;

use crate::join::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCategory {
    SchemaCollision,
    PathCollision,
    WebhookCollision,
    SchemaRenamed,
    SchemaDeduplicated,
    NamespacePrefix,
    HandlerError,
    HandlerResolution,
    GenericSourceName,
    VersionMismatch,
    SemanticDedupSummary,
}

impl fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SchemaCollision => "schema-collision",
            Self::PathCollision => "path-collision",
            Self::WebhookCollision => "webhook-collision",
            Self::SchemaRenamed => "schema-renamed",
            Self::SchemaDeduplicated => "schema-deduplicated",
            Self::NamespacePrefix => "namespace-prefix",
            Self::HandlerError => "handler-error",
            Self::HandlerResolution => "handler-resolution",
            Self::GenericSourceName => "generic-source-name",
            Self::VersionMismatch => "version-mismatch",
            Self::SemanticDedupSummary => "semantic-dedup-summary",
        };

        write!(f, "{label}")
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub category: WarningCategory,
    pub message: String,
    pub json_path: Option<String>,
    pub line: u32,
    pub column: u32,
}

/// Ordered list of structured warnings. The flat legacy list is derived
/// on demand instead of being stored alongside.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    list: Vec<Warning>,
}

impl Warnings {
    pub fn add(&mut self, category: WarningCategory, message: String) {
        self.list.push(Warning {
            category,
            message,
            json_path: None,
            line: 0,
            column: 0,
        });
    }

    pub fn add_at(
        &mut self,
        category: WarningCategory,
        message: String,
        json_path: &str,
        location: (u32, u32),
    ) {
        self.list.push(Warning {
            category,
            message,
            json_path: Some(json_path.to_string()),
            line: location.0,
            column: location.1,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn of_category(&self, category: WarningCategory) -> Vec<&Warning> {
        self.list.iter().filter(|w| w.category == category).collect()
    }

    pub fn legacy(&self) -> Vec<String> {
        self.list
            .iter()
            .map(|w| match &w.json_path {
                Some(path) => format!(
                    "[{}] {} ({}:{}:{})",
                    w.category, w.message, path, w.line, w.column
                ),
                None => format!("[{}] {}", w.category, w.message),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeptLeft,
    KeptRight,
    Renamed,
    Deduplicated,
    Custom,
    Failed,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::KeptLeft => "kept-left",
            Self::KeptRight => "kept-right",
            Self::Renamed => "renamed",
            Self::Deduplicated => "deduplicated",
            Self::Custom => "custom",
            Self::Failed => "failed",
        };

        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct SourceRef {
    pub path: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub struct CollisionEvent {
    pub name: String,
    pub left: SourceRef,
    pub right: SourceRef,
    pub strategy: Strategy,
    pub resolution: Resolution,
    pub new_name: Option<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionReport {
    pub events: Vec<CollisionEvent>,
    pub total_collisions: usize,
    pub resolved_by_rename: usize,
    pub resolved_by_dedup: usize,
    pub resolved_by_accept: usize,
    pub failed_collisions: usize,
}

impl CollisionReport {
    pub fn record(&mut self, event: CollisionEvent) {
        self.total_collisions += 1;

        match event.resolution {
            Resolution::Renamed => self.resolved_by_rename += 1,
            Resolution::Deduplicated => self.resolved_by_dedup += 1,
            Resolution::KeptLeft | Resolution::KeptRight | Resolution::Custom => {
                self.resolved_by_accept += 1
            }
            Resolution::Failed => self.failed_collisions += 1,
        }

        self.events.push(event);
    }

    pub fn has_failures(&self) -> bool {
        self.failed_collisions > 0
    }

    pub fn critical_events(&self) -> Vec<&CollisionEvent> {
        self.events
            .iter()
            .filter(|e| e.severity == Severity::Critical)
            .collect()
    }

    pub fn by_resolution(&self, resolution: Resolution) -> Vec<&CollisionEvent> {
        self.events
            .iter()
            .filter(|e| e.resolution == resolution)
            .collect()
    }
}

pub fn severity_of(resolution: Resolution) -> Severity {
    match resolution {
        Resolution::Failed => Severity::Critical,
        Resolution::KeptLeft | Resolution::KeptRight => Severity::Warning,
        Resolution::Renamed | Resolution::Deduplicated | Resolution::Custom => Severity::Info,
    }
}
