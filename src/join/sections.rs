use serde_json::{Map, Value};

use crate::error::Error;
use crate::graph::ReferenceGraph;
use crate::join::collision::{self, EngineIo, Outcome, Side};
use crate::join::rename::RenameContext;
use crate::join::strategy::{CollisionContext, CollisionKind, Strategy};
use crate::join::{JoinState, JoinerOptions};
use crate::report::{Resolution, WarningCategory};
use crate::schema::ParsedSpec;
use crate::scope::section_path;
use crate::tools;

pub(crate) fn merge_paths(
    options: &JoinerOptions,
    state: &mut JoinState,
    incoming: &ParsedSpec,
) -> Result<(), Error> {
    let strategy = options.effective_strategy(CollisionKind::Path);

    merge_map_section(
        options,
        state,
        incoming,
        "paths",
        "/paths",
        CollisionKind::Path,
        strategy,
    )
}

pub(crate) fn merge_webhooks(
    options: &JoinerOptions,
    state: &mut JoinState,
    incoming: &ParsedSpec,
) -> Result<(), Error> {
    let strategy = options.effective_strategy(CollisionKind::Webhook);

    merge_map_section(
        options,
        state,
        incoming,
        "webhooks",
        "/webhooks",
        CollisionKind::Webhook,
        strategy,
    )
}

pub(crate) fn merge_components(
    options: &JoinerOptions,
    state: &mut JoinState,
    incoming: &ParsedSpec,
) -> Result<(), Error> {
    let strategy = options
        .component_strategy
        .unwrap_or(options.default_strategy);

    for (kind, key) in CollisionKind::COMPONENT_KINDS {
        merge_map_section(
            options,
            state,
            incoming,
            &format!("components.{key}"),
            &format!("/components/{key}"),
            kind,
            strategy,
        )?;
    }

    Ok(())
}

/// Generic contract for every non-schema map section: insert absent
/// names, dispatch present ones to the collision engine.
fn merge_map_section(
    options: &JoinerOptions,
    state: &mut JoinState,
    incoming: &ParsedSpec,
    section: &str,
    pointer: &str,
    kind: CollisionKind,
    strategy: Strategy,
) -> Result<(), Error> {
    let source = match incoming.schema.get_body().pointer(pointer) {
        Some(Value::Object(map)) if !map.is_empty() => map.clone(),
        _ => return Ok(()),
    };

    let mut dest = take_section(&mut state.doc, pointer);
    let result = (|| {
        for (name, value) in &source {
            if !dest.contains_key(name) {
                dest.insert(name.clone(), value.clone());
                continue;
            }

            state.collisions += 1;

            let json_path = section_path(section, name);
            let left = dest.get(name).cloned().unwrap_or(Value::Null);
            let first_source = state.first_source.clone();

            let ctx = CollisionContext {
                kind,
                name: name.as_str(),
                left_location: state
                    .first_map
                    .as_ref()
                    .map(|m| m.locate(&json_path))
                    .unwrap_or((0, 0)),
                right_location: incoming.locate(&json_path),
                left_source: first_source.as_str(),
                right_source: incoming.source_path.as_str(),
                left: &left,
                right: value,
                rename_hint: None,
                strategy,
                json_path,
            };

            let outcome = collision::resolve(
                options,
                &mut EngineIo {
                    warnings: &mut state.warnings,
                    report: &mut state.report,
                    namer: &state.namer,
                },
                &ctx,
            )?;

            match outcome {
                Outcome::KeptLeft => {
                    collision::record_event(&mut state.report, &ctx, Resolution::KeptLeft, None);
                }
                Outcome::Deduplicated => {
                    collision::record_event(
                        &mut state.report,
                        &ctx,
                        Resolution::Deduplicated,
                        None,
                    );
                }
                Outcome::KeptRight => {
                    dest.insert(name.clone(), value.clone());
                    collision::record_event(&mut state.report, &ctx, Resolution::KeptRight, None);
                }
                Outcome::Custom(custom) => {
                    dest.insert(name.clone(), custom);
                    collision::record_event(&mut state.report, &ctx, Resolution::Custom, None);
                }
                Outcome::Renamed { new_name, .. } => {
                    // handler driven rename of a plain component, no
                    // reference rewriting applies
                    let unique = unique_name(&new_name, &dest);
                    dest.insert(unique.clone(), value.clone());
                    collision::record_event(
                        &mut state.report,
                        &ctx,
                        Resolution::Renamed,
                        Some(unique),
                    );
                }
            }
        }

        Ok(())
    })();

    put_section(&mut state.doc, pointer, dest);

    result
}

pub(crate) fn merge_schemas(
    options: &JoinerOptions,
    state: &mut JoinState,
    incoming: &ParsedSpec,
    graph: Option<&mut ReferenceGraph>,
    index: usize,
) -> Result<(), Error> {
    let strategy = options.effective_strategy(CollisionKind::Schema);
    let version = state.version;
    let (section, pointer) = if version.is_legacy() {
        ("definitions", "/definitions")
    } else {
        ("components.schemas", "/components/schemas")
    };

    let source = match incoming.schema.get_body().pointer(pointer) {
        Some(Value::Object(map)) if !map.is_empty() => map.clone(),
        _ => return Ok(()),
    };

    let prefix = options.namespace_prefix.get(&incoming.source_path);
    let mut graph = graph;

    let mut dest = take_section(&mut state.doc, pointer);
    let result = (|| {
        for (name, value) in &source {
            let effective_name = match prefix {
                Some(prefix) if options.always_apply_prefix => {
                    let prefixed = format!("{prefix}_{name}");
                    state.rewriter.register(name, &prefixed, version.major);
                    state.warnings.add_at(
                        WarningCategory::NamespacePrefix,
                        format!("schema {name} prefixed as {prefixed}"),
                        &section_path(section, name),
                        incoming.locate(&section_path(section, name)),
                    );

                    prefixed
                }
                _ => name.clone(),
            };

            if !dest.contains_key(&effective_name) {
                dest.insert(effective_name, value.clone());
                continue;
            }

            state.collisions += 1;

            let json_path = section_path(section, &effective_name);
            let left = dest.get(&effective_name).cloned().unwrap_or(Value::Null);
            let first_source = state.first_source.clone();

            let mut hint = RenameContext::new(&effective_name, &incoming.source_path, index);
            if let Some(graph) = graph.as_deref_mut() {
                let usages = graph.resolve_lineage(name);
                hint = hint.with_usages(
                    &usages,
                    graph.ref_count(name),
                    options.primary_operation_policy,
                );
            }

            let ctx = CollisionContext {
                kind: CollisionKind::Schema,
                name: effective_name.as_str(),
                left_location: state
                    .first_map
                    .as_ref()
                    .map(|m| m.locate(&json_path))
                    .unwrap_or((0, 0)),
                right_location: incoming.locate(&json_path),
                left_source: first_source.as_str(),
                right_source: incoming.source_path.as_str(),
                left: &left,
                right: value,
                rename_hint: Some(&hint),
                strategy,
                json_path,
            };

            let outcome = collision::resolve(
                options,
                &mut EngineIo {
                    warnings: &mut state.warnings,
                    report: &mut state.report,
                    namer: &state.namer,
                },
                &ctx,
            )?;

            match outcome {
                Outcome::KeptLeft => {
                    collision::record_event(&mut state.report, &ctx, Resolution::KeptLeft, None);
                }
                Outcome::Deduplicated => {
                    collision::record_event(
                        &mut state.report,
                        &ctx,
                        Resolution::Deduplicated,
                        None,
                    );
                }
                Outcome::KeptRight => {
                    dest.insert(effective_name.clone(), value.clone());
                    collision::record_event(&mut state.report, &ctx, Resolution::KeptRight, None);
                }
                Outcome::Custom(custom) => {
                    dest.insert(effective_name.clone(), custom);
                    collision::record_event(&mut state.report, &ctx, Resolution::Custom, None);
                }
                Outcome::Renamed { side, new_name } => {
                    let unique = unique_name(&new_name, &dest);

                    match side {
                        Side::Right => {
                            dest.insert(unique.clone(), value.clone());
                        }
                        Side::Left => {
                            if let Some(existing) = dest.remove(&effective_name) {
                                dest.insert(unique.clone(), existing);
                            }
                            dest.insert(effective_name.clone(), value.clone());
                        }
                    }

                    state
                        .rewriter
                        .register(&effective_name, &unique, version.major);
                    state.warnings.add_at(
                        WarningCategory::SchemaRenamed,
                        format!("schema {effective_name} renamed to {unique}"),
                        &ctx.json_path,
                        ctx.right_location,
                    );
                    collision::record_event(
                        &mut state.report,
                        &ctx,
                        Resolution::Renamed,
                        Some(unique),
                    );
                }
            }
        }

        Ok(())
    })();

    put_section(&mut state.doc, pointer, dest);

    result
}

pub(crate) fn merge_array_fields(state: &mut JoinState, incoming: &ParsedSpec) {
    let root = match state.doc.as_object_mut() {
        Some(root) => root,
        None => return,
    };

    for field in ["servers", "security"] {
        let entries = match incoming.schema.get_body().get(field).and_then(Value::as_array) {
            Some(entries) if !entries.is_empty() => entries,
            _ => continue,
        };

        let dest = root
            .entry(field)
            .or_insert(Value::Array(vec![]))
            .as_array_mut();

        if let Some(dest) = dest {
            dest.extend(entries.iter().cloned());
        }
    }
}

pub(crate) fn merge_tags(options: &JoinerOptions, state: &mut JoinState, incoming: &ParsedSpec) {
    let merged_tags = match incoming.schema.get_body().get("tags").and_then(Value::as_array) {
        Some(tags) if !tags.is_empty() => tags,
        _ => return,
    };

    let root = match state.doc.as_object_mut() {
        Some(root) => root,
        None => return,
    };

    let tags = match root
        .entry("tags")
        .or_insert(Value::Array(vec![]))
        .as_array_mut()
    {
        Some(tags) => tags,
        None => return,
    };

    let names = tags
        .iter()
        .filter_map(|t| match t {
            Value::Object(o) => o.get("name").and_then(|s| s.as_str()).map(str::to_string),
            _ => None,
        })
        .collect::<Vec<_>>();

    for tag in merged_tags {
        if options.deduplicate_tags {
            let name = match tag {
                Value::Object(o) => o.get("name").and_then(|s| s.as_str()),
                _ => None,
            };

            if name.map(|n| names.contains(&n.to_string())).unwrap_or(false) {
                continue;
            }
        }

        tags.push(tag.clone());
    }
}

fn unique_name(candidate: &str, taken: &Map<String, Value>) -> String {
    let mut name = candidate.to_string();

    while taken.contains_key(&name) {
        name = tools::bump_suffix_number(&name);
    }

    name
}

fn take_section(doc: &mut Value, pointer: &str) -> Map<String, Value> {
    let mut node = doc;

    for part in pointer.trim_matches('/').split('/') {
        let map = match node.as_object_mut() {
            Some(map) => map,
            None => return Map::new(),
        };

        node = map
            .entry(part)
            .or_insert(Value::Object(Map::new()));
    }

    match node {
        Value::Object(map) => std::mem::take(map),
        _ => Map::new(),
    }
}

fn put_section(doc: &mut Value, pointer: &str, section: Map<String, Value>) {
    let mut node = doc;

    for part in pointer.trim_matches('/').split('/') {
        let map = match node.as_object_mut() {
            Some(map) => map,
            None => return,
        };

        node = map
            .entry(part)
            .or_insert(Value::Object(Map::new()));
    }

    *node = Value::Object(section);
}
