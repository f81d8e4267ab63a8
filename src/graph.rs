use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Value;

use crate::schema::SpecVersion;
use crate::scope::SchemaScope;

const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageKind {
    Request,
    Response,
    Parameter,
    Header,
    Callback,
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Parameter => "parameter",
            Self::Header => "header",
            Self::Callback => "callback",
        };

        write!(f, "{label}")
    }
}

#[derive(Debug, Clone)]
pub struct OperationUsage {
    pub path: String,
    pub method: String,
    pub operation_id: String,
    pub tags: Vec<String>,
    pub usage: UsageKind,
    pub status_code: String,
    pub param_name: String,
    pub media_type: String,
}

impl OperationUsage {
    fn dedup_key(&self) -> (String, String, UsageKind, String) {
        (
            self.path.clone(),
            self.method.clone(),
            self.usage,
            self.status_code.clone(),
        )
    }
}

/// Reverse reference edge: the key schema is referenced by `from` at
/// `location` within it.
#[derive(Debug, Clone)]
pub struct SchemaEdge {
    pub from: String,
    pub location: String,
}

/// Per-document index of schema-to-schema and schema-to-operation
/// references. Built once per source, read during renaming, discarded
/// after the source is merged.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    schema_edges: HashMap<String, Vec<SchemaEdge>>,
    operation_edges: HashMap<String, Vec<OperationUsage>>,
    resolved: HashMap<String, Vec<OperationUsage>>,
}

impl ReferenceGraph {
    pub fn build(body: &Value, version: SpecVersion) -> ReferenceGraph {
        let mut graph = ReferenceGraph::default();

        let root = match body.as_object() {
            Some(root) => root,
            None => return graph,
        };

        if let Some(paths) = root.get("paths").and_then(Value::as_object) {
            for (path, item) in paths {
                graph.scan_path_item(path, item, version);
            }
        }

        if !version.is_legacy() {
            if let Some(webhooks) = root.get("webhooks").and_then(Value::as_object) {
                for (name, item) in webhooks {
                    graph.scan_path_item(&format!("webhook:{name}"), item, version);
                }
            }
        }

        let schemas = if version.is_legacy() {
            root.get("definitions")
        } else {
            body.pointer("/components/schemas")
        };

        if let Some(schemas) = schemas.and_then(Value::as_object) {
            for (name, schema) in schemas {
                let mut scope = SchemaScope::default();
                graph.scan_schema(name, schema, &mut scope, version);
            }
        }

        graph
    }

    pub fn schema_edges(&self, name: &str) -> &[SchemaEdge] {
        self.schema_edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn usages(&self, name: &str) -> &[OperationUsage] {
        self.operation_edges
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Direct references to a schema, from other schemas and operations.
    pub fn ref_count(&self, name: &str) -> usize {
        self.schema_edges(name).len() + self.usages(name).len()
    }

    /// All operation usages reachable from `name` through reverse schema
    /// edges. Memoized, cycle safe.
    pub fn resolve_lineage(&mut self, name: &str) -> Vec<OperationUsage> {
        if let Some(cached) = self.resolved.get(name) {
            return cached.clone();
        }

        let mut visited = HashSet::new();
        let mut usages = vec![];
        self.collect_lineage(name, &mut visited, &mut usages);

        let deduped = dedup_usages(usages);
        self.resolved.insert(name.to_string(), deduped.clone());

        deduped
    }

    fn collect_lineage(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        usages: &mut Vec<OperationUsage>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }

        if let Some(direct) = self.operation_edges.get(name) {
            usages.extend(direct.iter().cloned());
        }

        if let Some(edges) = self.schema_edges.get(name) {
            let referrers = edges.iter().map(|e| e.from.clone()).collect::<Vec<_>>();
            for referrer in referrers {
                self.collect_lineage(&referrer, visited, usages);
            }
        }
    }

    fn scan_path_item(&mut self, path: &str, item: &Value, version: SpecVersion) {
        let item = match item.as_object() {
            Some(item) => item,
            None => return,
        };

        if let Some(parameters) = item.get("parameters").and_then(Value::as_array) {
            for parameter in parameters {
                self.scan_parameter(path, "", "", &[], parameter, version);
            }
        }

        for method in METHODS {
            let operation = match item.get(method).and_then(Value::as_object) {
                Some(operation) => operation,
                None => continue,
            };

            let operation_id = operation
                .get("operationId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let tags = string_array(operation.get("tags"));

            if let Some(parameters) = operation.get("parameters").and_then(Value::as_array) {
                for parameter in parameters {
                    self.scan_parameter(path, method, &operation_id, &tags, parameter, version);
                }
            }

            if let Some(content) = operation
                .get("requestBody")
                .and_then(|b| b.get("content"))
                .and_then(Value::as_object)
            {
                for (media_type, media) in content {
                    for name in schema_refs(media.get("schema"), version) {
                        self.record_usage(
                            name,
                            OperationUsage {
                                path: path.to_string(),
                                method: method.to_string(),
                                operation_id: operation_id.clone(),
                                tags: tags.clone(),
                                usage: UsageKind::Request,
                                status_code: String::new(),
                                param_name: String::new(),
                                media_type: media_type.clone(),
                            },
                        );
                    }
                }
            }

            if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
                self.scan_responses(path, method, &operation_id, &tags, responses, version);
            }

            if let Some(callbacks) = operation.get("callbacks").and_then(Value::as_object) {
                for (callback_name, callback) in callbacks {
                    let expressions = match callback.as_object() {
                        Some(expressions) => expressions,
                        None => continue,
                    };

                    for (callback_path, callback_item) in expressions {
                        let synthetic = format!("{path}->{callback_name}:{callback_path}");
                        self.scan_callback_item(&synthetic, callback_item, version);
                    }
                }
            }
        }
    }

    fn scan_callback_item(&mut self, path: &str, item: &Value, version: SpecVersion) {
        let item = match item.as_object() {
            Some(item) => item,
            None => return,
        };

        for method in METHODS {
            let operation = match item.get(method).and_then(Value::as_object) {
                Some(operation) => operation,
                None => continue,
            };

            let operation_id = operation
                .get("operationId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let tags = string_array(operation.get("tags"));

            if let Some(content) = operation
                .get("requestBody")
                .and_then(|b| b.get("content"))
                .and_then(Value::as_object)
            {
                for (media_type, media) in content {
                    for name in schema_refs(media.get("schema"), version) {
                        self.record_usage(
                            name,
                            OperationUsage {
                                path: path.to_string(),
                                method: method.to_string(),
                                operation_id: operation_id.clone(),
                                tags: tags.clone(),
                                usage: UsageKind::Callback,
                                status_code: String::new(),
                                param_name: String::new(),
                                media_type: media_type.clone(),
                            },
                        );
                    }
                }
            }

            // callback responses surface on the wire as regular responses
            if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
                self.scan_responses(path, method, &operation_id, &tags, responses, version);
            }
        }
    }

    fn scan_responses(
        &mut self,
        path: &str,
        method: &str,
        operation_id: &str,
        tags: &[String],
        responses: &serde_json::Map<String, Value>,
        version: SpecVersion,
    ) {
        for (status_code, response) in responses {
            if let Some(content) = response.get("content").and_then(Value::as_object) {
                for (media_type, media) in content {
                    for name in schema_refs(media.get("schema"), version) {
                        self.record_usage(
                            name,
                            OperationUsage {
                                path: path.to_string(),
                                method: method.to_string(),
                                operation_id: operation_id.to_string(),
                                tags: tags.to_vec(),
                                usage: UsageKind::Response,
                                status_code: status_code.clone(),
                                param_name: String::new(),
                                media_type: media_type.clone(),
                            },
                        );
                    }
                }
            }

            // legacy documents keep the schema directly under the response
            if version.is_legacy() {
                for name in schema_refs(response.get("schema"), version) {
                    self.record_usage(
                        name,
                        OperationUsage {
                            path: path.to_string(),
                            method: method.to_string(),
                            operation_id: operation_id.to_string(),
                            tags: tags.to_vec(),
                            usage: UsageKind::Response,
                            status_code: status_code.clone(),
                            param_name: String::new(),
                            media_type: String::new(),
                        },
                    );
                }
            }

            if let Some(headers) = response.get("headers").and_then(Value::as_object) {
                for (header_name, header) in headers {
                    for name in schema_refs(header.get("schema"), version) {
                        self.record_usage(
                            name,
                            OperationUsage {
                                path: path.to_string(),
                                method: method.to_string(),
                                operation_id: operation_id.to_string(),
                                tags: tags.to_vec(),
                                usage: UsageKind::Header,
                                status_code: status_code.clone(),
                                param_name: header_name.clone(),
                                media_type: String::new(),
                            },
                        );
                    }
                }
            }
        }
    }

    fn scan_parameter(
        &mut self,
        path: &str,
        method: &str,
        operation_id: &str,
        tags: &[String],
        parameter: &Value,
        version: SpecVersion,
    ) {
        let param_name = parameter
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        for name in schema_refs(Some(parameter), version) {
            self.record_usage(
                name,
                OperationUsage {
                    path: path.to_string(),
                    method: method.to_string(),
                    operation_id: operation_id.to_string(),
                    tags: tags.to_vec(),
                    usage: UsageKind::Parameter,
                    status_code: String::new(),
                    param_name: param_name.clone(),
                    media_type: String::new(),
                },
            );
        }
    }

    fn record_usage(&mut self, name: String, usage: OperationUsage) {
        self.operation_edges.entry(name).or_default().push(usage);
    }

    fn scan_schema(
        &mut self,
        from: &str,
        node: &Value,
        scope: &mut SchemaScope,
        version: SpecVersion,
    ) {
        let map = match node.as_object() {
            Some(map) => map,
            None => return,
        };

        if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            if let Some(target) = version.ref_name(reference) {
                self.schema_edges
                    .entry(target.to_string())
                    .or_default()
                    .push(SchemaEdge {
                        from: from.to_string(),
                        location: scope.relative(),
                    });
            }

            return;
        }

        for keyword in [
            "additionalProperties",
            "not",
            "contains",
            "propertyNames",
            "if",
            "then",
            "else",
            "contentSchema",
            "unevaluatedProperties",
            "unevaluatedItems",
        ] {
            if let Some(child) = map.get(keyword) {
                scope.property(keyword);
                self.scan_schema(from, child, scope, version);
                scope.pop();
            }
        }

        match map.get("items") {
            Some(Value::Array(items)) => {
                for (index, child) in items.iter().enumerate() {
                    scope.property("items").index(index);
                    self.scan_schema(from, child, scope, version);
                    scope.pop().pop();
                }
            }
            Some(child) => {
                scope.property("items");
                self.scan_schema(from, child, scope, version);
                scope.pop();
            }
            None => {}
        }

        for keyword in ["allOf", "anyOf", "oneOf", "prefixItems"] {
            if let Some(children) = map.get(keyword).and_then(Value::as_array) {
                for (index, child) in children.iter().enumerate() {
                    scope.property(keyword).index(index);
                    self.scan_schema(from, child, scope, version);
                    scope.pop().pop();
                }
            }
        }

        for keyword in ["properties", "patternProperties", "dependentSchemas", "$defs"] {
            if let Some(children) = map.get(keyword).and_then(Value::as_object) {
                for (key, child) in children {
                    scope.property(keyword).property(key);
                    self.scan_schema(from, child, scope, version);
                    scope.pop().pop();
                }
            }
        }
    }
}

/// Removes duplicated usages by `(path, method, usage, status_code)`,
/// preserving insertion order.
pub fn dedup_usages(usages: Vec<OperationUsage>) -> Vec<OperationUsage> {
    let mut seen = HashSet::new();
    let mut out = vec![];

    for usage in usages {
        if seen.insert(usage.dedup_key()) {
            out.push(usage);
        }
    }

    out
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// All internal schema references anywhere under a node, in traversal
/// order. Catches refs nested in inline schemas as well.
fn schema_refs(node: Option<&Value>, version: SpecVersion) -> Vec<String> {
    let mut out = vec![];

    if let Some(node) = node {
        collect_refs(node, version, &mut out);
    }

    out
}

fn collect_refs(node: &Value, version: SpecVersion, out: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                if let Some(name) = version.ref_name(reference) {
                    out.push(name.to_string());
                }

                return;
            }

            for (_, value) in map {
                collect_refs(value, version, out);
            }
        }
        Value::Array(a) => {
            for value in a {
                collect_refs(value, version, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v3() -> SpecVersion {
        SpecVersion::parse("3.0.3").unwrap()
    }

    #[test]
    fn test_operation_edges() {
        let body = json!({
            "paths": {
                "/users": {
                    "get": {
                        "operationId": "listUsers",
                        "tags": ["users"],
                        "parameters": [
                            {
                                "name": "filter",
                                "in": "query",
                                "schema": {"$ref": "#/components/schemas/UserFilter"}
                            }
                        ],
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": {"$ref": "#/components/schemas/User"}
                                        }
                                    }
                                },
                                "headers": {
                                    "X-Rate-Limit": {
                                        "schema": {"$ref": "#/components/schemas/RateLimit"}
                                    }
                                }
                            }
                        }
                    },
                    "post": {
                        "operationId": "createUser",
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/User"}
                                }
                            }
                        },
                        "responses": {}
                    }
                }
            }
        });

        let graph = ReferenceGraph::build(&body, v3());

        let user = graph.usages("User");
        assert_eq!(user.len(), 2);
        assert_eq!(user[0].usage, UsageKind::Response);
        assert_eq!(user[0].status_code, "200");
        assert_eq!(user[0].media_type, "application/json");
        assert_eq!(user[1].usage, UsageKind::Request);
        assert_eq!(user[1].operation_id, "createUser");

        let filter = graph.usages("UserFilter");
        assert_eq!(filter.len(), 1);
        assert_eq!(filter[0].usage, UsageKind::Parameter);
        assert_eq!(filter[0].param_name, "filter");

        let limit = graph.usages("RateLimit");
        assert_eq!(limit.len(), 1);
        assert_eq!(limit[0].usage, UsageKind::Header);
        assert_eq!(limit[0].param_name, "X-Rate-Limit");
    }

    #[test]
    fn test_callback_edges_use_synthetic_path() {
        let body = json!({
            "paths": {
                "/subscribe": {
                    "post": {
                        "callbacks": {
                            "onEvent": {
                                "{$request.body#/url}": {
                                    "post": {
                                        "requestBody": {
                                            "content": {
                                                "application/json": {
                                                    "schema": {"$ref": "#/components/schemas/Event"}
                                                }
                                            }
                                        },
                                        "responses": {
                                            "200": {
                                                "content": {
                                                    "application/json": {
                                                        "schema": {"$ref": "#/components/schemas/Ack"}
                                                    }
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        },
                        "responses": {}
                    }
                }
            }
        });

        let graph = ReferenceGraph::build(&body, v3());

        let event = graph.usages("Event");
        assert_eq!(event.len(), 1);
        assert_eq!(event[0].usage, UsageKind::Callback);
        assert_eq!(event[0].path, "/subscribe->onEvent:{$request.body#/url}");

        let ack = graph.usages("Ack");
        assert_eq!(ack.len(), 1);
        assert_eq!(ack[0].usage, UsageKind::Response);
    }

    #[test]
    fn test_webhook_edges_use_synthetic_path() {
        let body = json!({
            "webhooks": {
                "newPet": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Pet"}
                                }
                            }
                        },
                        "responses": {}
                    }
                }
            }
        });

        let graph = ReferenceGraph::build(&body, SpecVersion::parse("3.1.0").unwrap());

        let pet = graph.usages("Pet");
        assert_eq!(pet.len(), 1);
        assert_eq!(pet[0].path, "webhook:newPet");
    }

    #[test]
    fn test_schema_edges_locations() {
        let body = json!({
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "properties": {
                            "address": {"$ref": "#/components/schemas/Address"}
                        },
                        "allOf": [
                            {"$ref": "#/components/schemas/Base"}
                        ]
                    },
                    "Address": {"type": "object"},
                    "Base": {"type": "object"}
                }
            }
        });

        let graph = ReferenceGraph::build(&body, v3());

        let address = graph.schema_edges("Address");
        assert_eq!(address.len(), 1);
        assert_eq!(address[0].from, "User");
        assert_eq!(address[0].location, "properties.address");

        let base = graph.schema_edges("Base");
        assert_eq!(base[0].location, "allOf[0]");
    }

    #[test]
    fn test_lineage_follows_reverse_edges() {
        let body = json!({
            "paths": {
                "/users": {
                    "get": {
                        "operationId": "listUsers",
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/User"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "User": {
                        "properties": {
                            "address": {"$ref": "#/components/schemas/Address"}
                        }
                    },
                    "Address": {"type": "object"}
                }
            }
        });

        let mut graph = ReferenceGraph::build(&body, v3());

        // Address is only used through User
        let lineage = graph.resolve_lineage("Address");
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage[0].operation_id, "listUsers");

        // memoized result stays stable
        let again = graph.resolve_lineage("Address");
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_lineage_terminates_on_cycles() {
        let body = json!({
            "paths": {
                "/nodes": {
                    "get": {
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Node"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Node": {
                        "properties": {
                            "next": {"$ref": "#/components/schemas/Node"},
                            "meta": {"$ref": "#/components/schemas/Meta"}
                        }
                    },
                    "Meta": {
                        "properties": {
                            "owner": {"$ref": "#/components/schemas/Node"}
                        }
                    }
                }
            }
        });

        let mut graph = ReferenceGraph::build(&body, v3());

        let lineage = graph.resolve_lineage("Meta");
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage[0].path, "/nodes");
    }

    #[test]
    fn test_dedup_usages_is_idempotent() {
        let usage = |path: &str, method: &str| OperationUsage {
            path: path.to_string(),
            method: method.to_string(),
            operation_id: String::new(),
            tags: vec![],
            usage: UsageKind::Request,
            status_code: String::new(),
            param_name: String::new(),
            media_type: String::new(),
        };

        let usages = vec![
            usage("/a", "get"),
            usage("/a", "get"),
            usage("/b", "get"),
        ];

        let once = dedup_usages(usages);
        assert_eq!(once.len(), 2);

        let twice = dedup_usages(once.clone());
        assert_eq!(twice.len(), once.len());
    }

    #[test]
    fn test_missing_sections_build_empty_graph() {
        let mut graph = ReferenceGraph::build(&json!({"openapi": "3.0.0"}), v3());

        assert!(graph.resolve_lineage("Anything").is_empty());
        assert_eq!(graph.ref_count("Anything"), 0);
    }
}
