use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct Schema {
    body: Value,
}

impl Schema {
    pub fn from_json(body: Value) -> Schema {
        Schema { body }
    }

    pub fn from_json_str(data: &str) -> Result<Schema, Error> {
        let body = serde_json::from_str(data).map_err(Error::DeserializeJson)?;

        Ok(Schema { body })
    }

    pub fn from_yaml_str(data: &str) -> Result<Schema, Error> {
        let mut docs = serde_yaml::Deserializer::from_str(data)
            .map(|d| Value::deserialize(d).map_err(Error::DeserializeYaml))
            .collect::<Result<Vec<_>, _>>()?;

        match docs.len() {
            1 => Ok(Schema {
                body: docs.remove(0),
            }),
            _ => Ok(Schema {
                body: docs.into_iter().collect::<Value>(),
            }),
        }
    }

    pub fn get_body(&self) -> &Value {
        &self.body
    }

    pub fn get_body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Yaml,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecVersion {
    pub major: u64,
    pub minor: u64,
}

impl SpecVersion {
    // openapi versions are not semver, swagger declares itself as plain "2.0"
    pub fn parse(raw: &str) -> Result<SpecVersion, Error> {
        let mut parts = raw.split('.');

        let major = parts
            .next()
            .and_then(|p| p.parse::<u64>().ok())
            .ok_or_else(|| Error::UnknownVersion(raw.to_string()))?;
        let minor = parts
            .next()
            .and_then(|p| p.parse::<u64>().ok())
            .ok_or_else(|| Error::UnknownVersion(raw.to_string()))?;

        if major != 2 && major != 3 {
            return Err(Error::UnknownVersion(raw.to_string()));
        }

        Ok(SpecVersion { major, minor })
    }

    pub fn is_legacy(&self) -> bool {
        self.major == 2
    }

    pub fn ref_prefix(&self) -> &'static str {
        if self.is_legacy() {
            "#/definitions/"
        } else {
            "#/components/schemas/"
        }
    }

    pub fn schemas_section(&self) -> &'static str {
        if self.is_legacy() {
            "definitions"
        } else {
            "components.schemas"
        }
    }

    /// Extracts the schema name from an internal reference, ignoring
    /// external and non-schema references.
    pub fn ref_name<'a>(&self, reference: &'a str) -> Option<&'a str> {
        reference
            .strip_prefix(self.ref_prefix())
            .filter(|name| !name.is_empty() && !name.contains('/'))
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Read-only lookup from a dotted json-path to a source location.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    entries: HashMap<String, (u32, u32)>,
}

impl SourceMap {
    pub fn new(entries: HashMap<String, (u32, u32)>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, json_path: &str, line: u32, column: u32) {
        self.entries.insert(json_path.to_string(), (line, column));
    }

    pub fn locate(&self, json_path: &str) -> (u32, u32) {
        self.entries.get(json_path).copied().unwrap_or((0, 0))
    }
}

#[derive(Debug, Clone)]
pub struct ParsedSpec {
    pub schema: Schema,
    pub version: String,
    pub source_path: String,
    pub source_format: SourceFormat,
    pub errors: Vec<String>,
    pub source_map: Option<SourceMap>,
}

impl ParsedSpec {
    pub fn new(schema: Schema, source_path: &str, source_format: SourceFormat) -> ParsedSpec {
        let version = schema
            .get_body()
            .as_object()
            .and_then(|root| root.get("openapi").or_else(|| root.get("swagger")))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        ParsedSpec {
            schema,
            version,
            source_path: source_path.to_string(),
            source_format,
            errors: vec![],
            source_map: None,
        }
    }

    pub fn from_json(body: Value, source_path: &str) -> ParsedSpec {
        Self::new(Schema::from_json(body), source_path, SourceFormat::Json)
    }

    pub fn from_yaml_str(data: &str, source_path: &str) -> Result<ParsedSpec, Error> {
        Ok(Self::new(
            Schema::from_yaml_str(data)?,
            source_path,
            SourceFormat::Yaml,
        ))
    }

    pub fn with_source_map(mut self, source_map: SourceMap) -> Self {
        self.source_map = Some(source_map);
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn spec_version(&self) -> Result<SpecVersion, Error> {
        SpecVersion::parse(&self.version)
    }

    pub fn locate(&self, json_path: &str) -> (u32, u32) {
        self.source_map
            .as_ref()
            .map(|m| m.locate(json_path))
            .unwrap_or((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("2.0", 2, 0 ; "swagger")]
    #[test_case("3.0.3", 3, 0 ; "openapi 30x")]
    #[test_case("3.1.0", 3, 1 ; "openapi 31x")]
    fn test_version_parse(raw: &str, major: u64, minor: u64) {
        let version = SpecVersion::parse(raw).unwrap();

        assert_eq!(version.major, major);
        assert_eq!(version.minor, minor);
    }

    #[test_case("1.2" ; "swagger 12 is too old")]
    #[test_case("4.0.0" ; "unknown major")]
    #[test_case("three.one" ; "garbage")]
    #[test_case("" ; "empty")]
    fn test_version_parse_fails(raw: &str) {
        assert!(SpecVersion::parse(raw).is_err());
    }

    #[test]
    fn test_ref_name_extraction() {
        let v3 = SpecVersion::parse("3.0.0").unwrap();
        let v2 = SpecVersion::parse("2.0").unwrap();

        assert_eq!(v3.ref_name("#/components/schemas/User"), Some("User"));
        assert_eq!(v3.ref_name("#/components/responses/User"), None);
        assert_eq!(v3.ref_name("other.yaml#/components/schemas/User"), None);
        assert_eq!(v2.ref_name("#/definitions/User"), Some("User"));
        assert_eq!(v2.ref_name("#/components/schemas/User"), None);
    }

    #[test]
    fn test_parsed_spec_detects_version() {
        let spec = ParsedSpec::from_json(json!({"openapi": "3.0.1", "paths": {}}), "api.json");
        assert_eq!(spec.version, "3.0.1");

        let spec = ParsedSpec::from_json(json!({"swagger": "2.0"}), "api.json");
        assert_eq!(spec.version, "2.0");
    }

    #[test]
    fn test_parsed_spec_from_yaml() {
        let spec = ParsedSpec::from_yaml_str("openapi: 3.1.0\npaths: {}\n", "api.yaml").unwrap();

        assert_eq!(spec.version, "3.1.0");
        assert_eq!(spec.source_format, SourceFormat::Yaml);
    }

    #[test]
    fn test_source_map_lookup() {
        let mut map = SourceMap::default();
        map.insert("$.components.schemas.User", 10, 3);

        assert_eq!(map.locate("$.components.schemas.User"), (10, 3));
        assert_eq!(map.locate("$.components.schemas.Missing"), (0, 0));
    }
}
