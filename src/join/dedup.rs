use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EquivalenceMode {
    #[default]
    None,
    Shallow,
    Deep,
}

impl FromStr for EquivalenceMode {
    type Err = Error;

    fn from_str(input: &str) -> Result<EquivalenceMode, Self::Err> {
        match input {
            "none" => Ok(EquivalenceMode::None),
            "shallow" => Ok(EquivalenceMode::Shallow),
            "deep" => Ok(EquivalenceMode::Deep),
            _ => Err(Error::UnknownEquivalenceMode(input.to_string())),
        }
    }
}

/// Black-box equivalence check: `(equivalent, number of differences)`.
pub type EquivalenceOracle = Box<dyn Fn(&Value, &Value, EquivalenceMode) -> (bool, usize)>;

const ANNOTATION_KEYS: [&str; 4] = ["description", "title", "example", "examples"];

/// Default structural oracle. Annotation keywords do not participate
/// in the comparison.
pub fn structural_equivalence(left: &Value, right: &Value, mode: EquivalenceMode) -> (bool, usize) {
    match mode {
        EquivalenceMode::None => (false, 0),
        EquivalenceMode::Shallow => {
            let differences = shallow_differences(left, right);
            (differences == 0, differences)
        }
        EquivalenceMode::Deep => {
            let mut differences = 0;
            deep_differences(left, right, &mut differences);
            (differences == 0, differences)
        }
    }
}

fn shallow_differences(left: &Value, right: &Value) -> usize {
    match (left.as_object(), right.as_object()) {
        (Some(left), Some(right)) => {
            let mut keys: Vec<&String> = left.keys().chain(right.keys()).collect();
            keys.sort();
            keys.dedup();

            keys.into_iter()
                .filter(|k| !ANNOTATION_KEYS.contains(&k.as_str()))
                .filter(|k| left.get(k.as_str()) != right.get(k.as_str()))
                .count()
        }
        _ => usize::from(left != right),
    }
}

fn deep_differences(left: &Value, right: &Value, differences: &mut usize) {
    match (left, right) {
        (Value::Object(left), Value::Object(right)) => {
            let mut keys: Vec<&String> = left.keys().chain(right.keys()).collect();
            keys.sort();
            keys.dedup();

            for key in keys {
                if ANNOTATION_KEYS.contains(&key.as_str()) {
                    continue;
                }

                match (left.get(key.as_str()), right.get(key.as_str())) {
                    (Some(l), Some(r)) => deep_differences(l, r, differences),
                    _ => *differences += 1,
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            if left.len() != right.len() {
                *differences += 1;
                return;
            }

            for (l, r) in left.iter().zip(right.iter()) {
                deep_differences(l, r, differences);
            }
        }
        (l, r) => {
            if l != r {
                *differences += 1;
            }
        }
    }
}

/// Groups schemas into structural equivalence classes and returns the
/// rename bindings `(loser, canonical)` where the canonical name is the
/// lexicographically smallest in its class.
pub fn equivalence_classes(
    schemas: &Map<String, Value>,
    oracle: &EquivalenceOracle,
    mode: EquivalenceMode,
) -> Vec<(String, String)> {
    let mut names: Vec<&String> = schemas.keys().collect();
    names.sort();

    // representatives are the alphabetically first of each class
    let mut representatives: Vec<&String> = vec![];
    let mut bindings = vec![];

    for name in names {
        let value = &schemas[name.as_str()];

        match representatives
            .iter()
            .find(|canon| oracle(&schemas[canon.as_str()], value, mode).0)
        {
            Some(canonical) => bindings.push((name.clone(), (*canonical).clone())),
            None => representatives.push(name),
        }
    }

    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_none_mode_never_matches() {
        let a = json!({"type": "object"});

        assert_eq!(structural_equivalence(&a, &a, EquivalenceMode::None), (false, 0));
    }

    #[test]
    fn test_deep_ignores_annotations() {
        let a = json!({
            "type": "object",
            "description": "base-user",
            "properties": {"name": {"type": "string", "title": "Name"}}
        });
        let b = json!({
            "type": "object",
            "description": "overlay-user",
            "properties": {"name": {"type": "string"}}
        });

        let (equivalent, differences) = structural_equivalence(&a, &b, EquivalenceMode::Deep);

        assert!(equivalent);
        assert_eq!(differences, 0);
    }

    #[test]
    fn test_deep_counts_differences() {
        let a = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"}
            }
        });
        let b = json!({
            "type": "object",
            "properties": {
                "name": {"type": "number"},
                "email": {"type": "string"}
            }
        });

        let (equivalent, differences) = structural_equivalence(&a, &b, EquivalenceMode::Deep);

        assert!(!equivalent);
        // name type mismatch, age missing right, email missing left
        assert_eq!(differences, 3);
    }

    #[test_case(EquivalenceMode::Shallow ; "shallow")]
    #[test_case(EquivalenceMode::Deep ; "deep")]
    fn test_identical_schemas_are_equivalent(mode: EquivalenceMode) {
        let a = json!({
            "type": "object",
            "properties": {"sku": {"type": "string"}},
            "required": ["sku"]
        });

        assert!(structural_equivalence(&a, &a.clone(), mode).0);
    }

    #[test]
    fn test_shallow_compares_top_level_only_by_key() {
        let a = json!({"type": "object", "properties": {"a": {"type": "string"}}});
        let b = json!({"type": "string"});

        let (equivalent, differences) =
            structural_equivalence(&a, &b, EquivalenceMode::Shallow);

        assert!(!equivalent);
        // type differs and properties only on the left
        assert_eq!(differences, 2);
    }

    #[test]
    fn test_equivalence_classes_pick_alphabetical_canonical() {
        let mut schemas = Map::new();
        schemas.insert("Location".to_string(), json!({"type": "object", "properties": {"lat": {"type": "number"}}}));
        schemas.insert("Address".to_string(), json!({"type": "object", "properties": {"lat": {"type": "number"}}}));
        schemas.insert("Other".to_string(), json!({"type": "string"}));

        let oracle: EquivalenceOracle = Box::new(structural_equivalence);
        let bindings = equivalence_classes(&schemas, &oracle, EquivalenceMode::Deep);

        assert_eq!(bindings, vec![("Location".to_string(), "Address".to_string())]);
    }

    #[test]
    fn test_equivalence_classes_multiple_groups() {
        let mut schemas = Map::new();
        schemas.insert("B".to_string(), json!({"type": "object"}));
        schemas.insert("A".to_string(), json!({"type": "object"}));
        schemas.insert("D".to_string(), json!({"type": "string"}));
        schemas.insert("C".to_string(), json!({"type": "string"}));

        let oracle: EquivalenceOracle = Box::new(structural_equivalence);
        let bindings = equivalence_classes(&schemas, &oracle, EquivalenceMode::Deep);

        assert_eq!(
            bindings,
            vec![
                ("B".to_string(), "A".to_string()),
                ("D".to_string(), "C".to_string()),
            ]
        );
    }
}
