use std::collections::HashMap;

use serde_json::Value;

#[derive(Debug, Clone)]
struct RenameBinding {
    new_name: String,
    major: u64,
}

/// Accumulates rename bindings during the merge and rewrites every
/// internal schema reference and discriminator mapping in one pass at
/// finalize time. Re-registering an old name overwrites the previous
/// binding.
#[derive(Debug, Default)]
pub struct RefRewriter {
    renames: HashMap<String, RenameBinding>,
}

impl RefRewriter {
    pub fn register(&mut self, old_name: &str, new_name: &str, major: u64) {
        self.renames.insert(
            old_name.to_string(),
            RenameBinding {
                new_name: new_name.to_string(),
                major,
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn new_name_of(&self, old_name: &str) -> Option<&str> {
        self.renames.get(old_name).map(|b| b.new_name.as_str())
    }

    pub fn bindings(&self) -> HashMap<String, String> {
        self.renames
            .iter()
            .map(|(old, binding)| (old.clone(), binding.new_name.clone()))
            .collect()
    }

    /// Rewrites the whole document in place. Idempotent as long as no
    /// generated name is itself registered as an old name.
    pub fn process(&self, root: &mut Value) {
        if self.renames.is_empty() {
            return;
        }

        self.process_node(root);
    }

    fn process_node(&self, node: &mut Value) {
        match node {
            Value::Object(ref mut map) => {
                if let Some(Value::String(reference)) = map.get_mut("$ref") {
                    if let Some(rewritten) = self.rewrite_ref(reference) {
                        *reference = rewritten;
                    }
                }

                if let Some(mapping) = map
                    .get_mut("discriminator")
                    .and_then(|d| d.get_mut("mapping"))
                    .and_then(Value::as_object_mut)
                {
                    for (_, target) in mapping.iter_mut() {
                        if let Value::String(value) = target {
                            if let Some(rewritten) = self.rewrite_mapping_value(value) {
                                *value = rewritten;
                            }
                        }
                    }
                }

                for (key, value) in map.iter_mut() {
                    if key == "$ref" {
                        continue;
                    }

                    self.process_node(value);
                }
            }
            Value::Array(a) => {
                for value in a.iter_mut() {
                    self.process_node(value);
                }
            }
            _ => {}
        }
    }

    fn rewrite_ref(&self, reference: &str) -> Option<String> {
        let (prefix, name) = split_internal_ref(reference)?;

        let binding = self.renames.get(name)?;
        if ref_prefix_for(binding.major) != prefix {
            return None;
        }

        Some(format!("{prefix}{}", binding.new_name))
    }

    // discriminator mapping values may be a short schema name or a ref
    fn rewrite_mapping_value(&self, value: &str) -> Option<String> {
        if value.contains('#') {
            return self.rewrite_ref(value);
        }

        self.renames.get(value).map(|b| b.new_name.clone())
    }
}

fn ref_prefix_for(major: u64) -> &'static str {
    if major == 2 {
        "#/definitions/"
    } else {
        "#/components/schemas/"
    }
}

fn split_internal_ref(reference: &str) -> Option<(&'static str, &str)> {
    for prefix in ["#/components/schemas/", "#/definitions/"] {
        if let Some(name) = reference.strip_prefix(prefix) {
            if !name.is_empty() && !name.contains('/') {
                return Some((prefix, name));
            }
        }
    }

    None
}
