use std::collections::HashMap;

use inflector::Inflector;
use regex::Regex;
use serde_json::Value;
use tera::to_value;
use tera::Tera;
use tera::{try_get_value, Result as TeraResult};

pub fn register(tera: &mut Tera) {
    tera.register_filter("camelcase", camelcase);
    tera.register_filter("pascalcase", pascalcase);
    tera.register_filter("snakecase", snakecase);
    tera.register_filter("kebabcase", kebabcase);

    tera.register_filter("path_segment", path_segment);
    tera.register_filter("path_resource", path_resource);
    tera.register_filter("path_last", path_last);
    tera.register_filter("path_clean", path_clean);

    tera.register_filter("first_tag", first_tag);
    tera.register_filter("join_tags", join_tags);
    tera.register_filter("has_tag", has_tag);

    tera.register_function("coalesce", coalesce);
}

pub fn pascalcase(value: &Value, _: &HashMap<String, Value>) -> TeraResult<Value> {
    let s = try_get_value!("pascalcase", "value", String, value);
    let case = s.to_pascal_case();

    Ok(to_value(case).unwrap())
}

pub fn camelcase(value: &Value, _: &HashMap<String, Value>) -> TeraResult<Value> {
    let s = try_get_value!("camelcase", "value", String, value);
    let case = s.to_camel_case();

    Ok(to_value(case).unwrap())
}

pub fn snakecase(value: &Value, _: &HashMap<String, Value>) -> TeraResult<Value> {
    let s = try_get_value!("snakecase", "value", String, value);
    let case = s.to_snake_case();

    Ok(to_value(case).unwrap())
}

pub fn kebabcase(value: &Value, _: &HashMap<String, Value>) -> TeraResult<Value> {
    let s = try_get_value!("kebabcase", "value", String, value);
    let case = s.to_kebab_case();

    Ok(to_value(case).unwrap())
}

lazy_static! {
    static ref PARAMETER_SEGMENT: Regex = Regex::new(r"^\{.+\}$").unwrap();
}

fn resource_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && !PARAMETER_SEGMENT.is_match(s))
        .collect()
}

/// Picks one non-parameter segment of a path, negative index counts
/// from the end. Out of range indexes yield an empty string.
pub fn path_segment(value: &Value, args: &HashMap<String, Value>) -> TeraResult<Value> {
    let path = try_get_value!("path_segment", "value", String, value);

    let index = match args.get("index") {
        Some(val) => try_get_value!("path_segment", "index", i64, val),
        None => return Err(tera::Error::msg("Please provide index parameter")),
    };

    let segments = resource_segments(&path);
    let position = if index < 0 {
        segments.len() as i64 + index
    } else {
        index
    };

    let segment = usize::try_from(position)
        .ok()
        .and_then(|i| segments.get(i))
        .copied()
        .unwrap_or_default();

    Ok(to_value(segment).unwrap())
}

pub fn path_resource(value: &Value, _: &HashMap<String, Value>) -> TeraResult<Value> {
    let path = try_get_value!("path_resource", "value", String, value);

    let resource = resource_segments(&path).first().copied().unwrap_or_default();

    Ok(to_value(resource).unwrap())
}

pub fn path_last(value: &Value, _: &HashMap<String, Value>) -> TeraResult<Value> {
    let path = try_get_value!("path_last", "value", String, value);

    let last = resource_segments(&path).last().copied().unwrap_or_default();

    Ok(to_value(last).unwrap())
}

/// Whole path flattened to an identifier: braces dropped, separators
/// replaced by underscores.
pub fn path_clean(value: &Value, _: &HashMap<String, Value>) -> TeraResult<Value> {
    let path = try_get_value!("path_clean", "value", String, value);

    let cleaned = path
        .trim_matches('/')
        .chars()
        .filter_map(|c| match c {
            '{' | '}' => None,
            '/' | '-' | '.' | ' ' => Some('_'),
            other => Some(other),
        })
        .collect::<String>();

    Ok(to_value(cleaned).unwrap())
}

pub fn first_tag(value: &Value, _: &HashMap<String, Value>) -> TeraResult<Value> {
    let tags = try_get_value!("first_tag", "value", Vec<String>, value);

    Ok(to_value(tags.first().cloned().unwrap_or_default()).unwrap())
}

pub fn join_tags(value: &Value, args: &HashMap<String, Value>) -> TeraResult<Value> {
    let tags = try_get_value!("join_tags", "value", Vec<String>, value);

    let sep = match args.get("sep") {
        Some(val) => try_get_value!("join_tags", "sep", String, val),
        None => "_".to_string(),
    };

    Ok(to_value(tags.join(&sep)).unwrap())
}

pub fn has_tag(value: &Value, args: &HashMap<String, Value>) -> TeraResult<Value> {
    let tags = try_get_value!("has_tag", "value", Vec<String>, value);

    let tag = match args.get("tag") {
        Some(val) => try_get_value!("has_tag", "tag", String, val),
        None => return Err(tera::Error::msg("Please provide tag parameter")),
    };

    Ok(to_value(tags.contains(&tag)).unwrap())
}

/// First non-empty value from `values`.
pub fn coalesce(args: &HashMap<String, Value>) -> TeraResult<Value> {
    let values = match args.get("values") {
        Some(Value::Array(values)) => values,
        _ => {
            return Err(tera::Error::msg(
                "The `coalesce` function has to have a `values` argument, type: array",
            ))
        }
    };

    let found = values
        .iter()
        .find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            _ => true,
        })
        .cloned()
        .unwrap_or(Value::String(String::new()));

    Ok(found)
}
