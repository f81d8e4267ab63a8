use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::Error;
use crate::join::rename::RenameContext;
use crate::report::WarningCategory;

/// Per-section collision strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fail,
    FailOnPaths,
    AcceptLeft,
    AcceptRight,
    RenameLeft,
    RenameRight,
    Deduplicate,
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(input: &str) -> Result<Strategy, Self::Err> {
        match input {
            "fail" => Ok(Strategy::Fail),
            "fail-on-paths" => Ok(Strategy::FailOnPaths),
            "accept-left" => Ok(Strategy::AcceptLeft),
            "accept-right" => Ok(Strategy::AcceptRight),
            "rename-left" => Ok(Strategy::RenameLeft),
            "rename-right" => Ok(Strategy::RenameRight),
            "deduplicate" => Ok(Strategy::Deduplicate),
            _ => Err(Error::UnknownStrategy(input.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fail => "fail",
            Self::FailOnPaths => "fail-on-paths",
            Self::AcceptLeft => "accept-left",
            Self::AcceptRight => "accept-right",
            Self::RenameLeft => "rename-left",
            Self::RenameRight => "rename-right",
            Self::Deduplicate => "deduplicate",
        };

        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionKind {
    Schema,
    Path,
    Webhook,
    Response,
    Parameter,
    Example,
    RequestBody,
    Header,
    SecurityScheme,
    Link,
    Callback,
}

impl CollisionKind {
    /// The component sub-map kinds, in document order.
    pub const COMPONENT_KINDS: [(CollisionKind, &'static str); 9] = [
        (CollisionKind::Response, "responses"),
        (CollisionKind::Parameter, "parameters"),
        (CollisionKind::Example, "examples"),
        (CollisionKind::RequestBody, "requestBodies"),
        (CollisionKind::Header, "headers"),
        (CollisionKind::SecurityScheme, "securitySchemes"),
        (CollisionKind::Link, "links"),
        (CollisionKind::Callback, "callbacks"),
        (CollisionKind::Path, "pathItems"),
    ];

    pub fn is_pathlike(&self) -> bool {
        matches!(self, CollisionKind::Path | CollisionKind::Webhook)
    }

    /// The cli flag a fail-strategy error should point the user at.
    pub fn flag(&self) -> &'static str {
        match self {
            CollisionKind::Path | CollisionKind::Webhook => "path-strategy",
            CollisionKind::Schema => "schema-strategy",
            _ => "component-strategy",
        }
    }

    pub fn warning_category(&self) -> WarningCategory {
        match self {
            CollisionKind::Path => WarningCategory::PathCollision,
            CollisionKind::Webhook => WarningCategory::WebhookCollision,
            _ => WarningCategory::SchemaCollision,
        }
    }
}

impl fmt::Display for CollisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Schema => "schema",
            Self::Path => "path",
            Self::Webhook => "webhook",
            Self::Response => "response",
            Self::Parameter => "parameter",
            Self::Example => "example",
            Self::RequestBody => "requestBody",
            Self::Header => "header",
            Self::SecurityScheme => "securityScheme",
            Self::Link => "link",
            Self::Callback => "callback",
        };

        write!(f, "{label}")
    }
}

/// Action requested by a user collision handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionAction {
    #[default]
    Continue,
    AcceptLeft,
    AcceptRight,
    Rename,
    Deduplicate,
    Custom,
    Fail,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionResolution {
    pub action: ResolutionAction,
    pub new_name: Option<String>,
    pub custom_value: Option<Value>,
    pub message: Option<String>,
}

impl CollisionResolution {
    pub fn keep_going() -> Self {
        Self::default()
    }

    pub fn accept_left() -> Self {
        Self {
            action: ResolutionAction::AcceptLeft,
            ..Self::default()
        }
    }

    pub fn accept_right() -> Self {
        Self {
            action: ResolutionAction::AcceptRight,
            ..Self::default()
        }
    }

    pub fn rename(new_name: Option<String>) -> Self {
        Self {
            action: ResolutionAction::Rename,
            new_name,
            ..Self::default()
        }
    }

    pub fn deduplicate() -> Self {
        Self {
            action: ResolutionAction::Deduplicate,
            ..Self::default()
        }
    }

    pub fn custom(value: Value) -> Self {
        Self {
            action: ResolutionAction::Custom,
            custom_value: Some(value),
            ..Self::default()
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            action: ResolutionAction::Fail,
            message: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

/// Everything a handler or the engine knows about one collision.
pub struct CollisionContext<'a> {
    pub kind: CollisionKind,
    pub name: &'a str,
    pub json_path: String,
    pub left_source: &'a str,
    pub right_source: &'a str,
    pub left_location: (u32, u32),
    pub right_location: (u32, u32),
    pub left: &'a Value,
    pub right: &'a Value,
    pub rename_hint: Option<&'a RenameContext>,
    pub strategy: Strategy,
}

pub type CollisionHandler = Box<dyn Fn(&CollisionContext) -> Result<CollisionResolution, Error>>;
