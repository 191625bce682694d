//! Criteria-filtered configuration tree.
//!
//! A node is a plain JSON value, or an object carrying `$filter` which makes
//! it a decision point. Branches are keyed by the literal criteria value;
//! `$range` selects on numeric criteria, `$default` is the fallback and
//! `$base` is merged underneath whichever branch wins. `$meta` documents a
//! node and never appears in resolved values.

use crate::criteria::Criteria;
use crate::error::{ConfigError, ResolutionError};
use serde_json::{Map, Value};
use std::borrow::Cow;

const FILTER: &str = "$filter";
const DEFAULT: &str = "$default";
const META: &str = "$meta";
const BASE: &str = "$base";
const RANGE: &str = "$range";

/// Immutable configuration tree. Construction only checks shape; branch
/// coverage is verified when a path is resolved.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    tree: Value,
}

impl ConfigStore {
    pub fn build(tree: Value) -> Result<Self, ConfigError> {
        validate(&tree, "")?;
        Ok(Self { tree })
    }

    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let tree = serde_json::from_str::<Value>(source)?;
        Self::build(tree)
    }

    /// Resolves `path` to a fully materialised value. `Ok(None)` means the
    /// path walks off the tree.
    pub fn resolve(
        &self,
        path: &str,
        criteria: &Criteria,
    ) -> Result<Option<Value>, ResolutionError> {
        let Some((node, walked)) = self.walk(path, criteria)? else {
            return Ok(None);
        };
        materialize(&node, criteria, &walked).map(Some)
    }

    /// Returns the `$meta` string documenting the node `path` addresses.
    pub fn resolve_meta(
        &self,
        path: &str,
        criteria: &Criteria,
    ) -> Result<Option<String>, ResolutionError> {
        let Some((mut node, walked)) = self.walk(path, criteria)? else {
            return Ok(None);
        };

        loop {
            if let Some(meta) = node.get(META).and_then(Value::as_str) {
                return Ok(Some(meta.to_string()));
            }
            if !is_filter(&node) {
                return Ok(None);
            }
            node = select_branch(node, criteria, &walked)?;
        }
    }

    /// Walks every segment of `path`, applying filters on the way down. The
    /// returned node is the one addressed by the final segment, with its own
    /// filter still unapplied.
    fn walk<'a>(
        &'a self,
        path: &str,
        criteria: &Criteria,
    ) -> Result<Option<(Cow<'a, Value>, String)>, ResolutionError> {
        let segments = split_path(path)?;
        let mut node = Cow::Borrowed(&self.tree);
        let mut walked = String::new();

        for segment in segments {
            node = apply_filters(node, criteria, &walked)?;
            let Some(next) = child(node, segment) else {
                return Ok(None);
            };
            node = next;
            walked.push('/');
            walked.push_str(segment);
        }

        Ok(Some((node, walked)))
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, ResolutionError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(ResolutionError::InvalidPath {
            path: path.to_string(),
        });
    };
    Ok(rest.split('/').filter(|s| !s.is_empty()).collect())
}

fn child<'a>(node: Cow<'a, Value>, segment: &str) -> Option<Cow<'a, Value>> {
    fn lookup<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
        match value {
            Value::Object(map) if !segment.starts_with('$') => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    match node {
        Cow::Borrowed(value) => lookup(value, segment).map(Cow::Borrowed),
        Cow::Owned(value) => lookup(&value, segment).cloned().map(Cow::Owned),
    }
}

fn is_filter(value: &Value) -> bool {
    value.as_object().is_some_and(|map| map.contains_key(FILTER))
}

fn apply_filters<'a>(
    mut node: Cow<'a, Value>,
    criteria: &Criteria,
    path: &str,
) -> Result<Cow<'a, Value>, ResolutionError> {
    while is_filter(&node) {
        node = select_branch(node, criteria, path)?;
    }
    Ok(node)
}

/// Picks the branch of a single filter node: exact criteria value first, then
/// `$range`, then `$default`.
fn select_branch<'a>(
    node: Cow<'a, Value>,
    criteria: &Criteria,
    path: &str,
) -> Result<Cow<'a, Value>, ResolutionError> {
    let Some((selected, base)) = choose_branch(&node, criteria, path)? else {
        return Ok(node);
    };

    let branch = match node {
        Cow::Borrowed(value) => Cow::Borrowed(pick(value, &selected, criteria)),
        Cow::Owned(value) => Cow::Owned(pick(&value, &selected, criteria).clone()),
    };

    // A branch that is itself a filter is resolved before the base goes under it.
    Ok(match base {
        Some(base) => {
            let branch = apply_filters(branch, criteria, path)?;
            Cow::Owned(merge(base, branch.into_owned()))
        }
        None => branch,
    })
}

fn choose_branch(
    node: &Value,
    criteria: &Criteria,
    path: &str,
) -> Result<Option<(String, Option<Value>)>, ResolutionError> {
    let Some(map) = node.as_object() else {
        return Ok(None);
    };
    let filter = map.get(FILTER).and_then(Value::as_str).unwrap_or_default();
    let value = criteria.get(filter);

    let selected = value
        .filter(|v| !v.starts_with('$'))
        .and_then(|v| map.get(v.as_str()).map(|_| v.as_str()))
        .or_else(|| value.and_then(|v| select_range(map, v)).map(|_| RANGE))
        .or_else(|| map.get(DEFAULT).map(|_| DEFAULT));

    let Some(selected) = selected else {
        return Err(ResolutionError::NoMatchingBranch {
            path: display_path(path),
            filter: filter.to_string(),
            value: value.cloned(),
            criteria: criteria.clone(),
        });
    };
    tracing::trace!(path = %display_path(path), filter, branch = selected, "filter resolved");

    Ok(Some((selected.to_string(), map.get(BASE).cloned())))
}

fn pick<'v>(node: &'v Value, selected: &str, criteria: &Criteria) -> &'v Value {
    static NULL: Value = Value::Null;
    let Some(map) = node.as_object() else {
        return &NULL;
    };
    if selected == RANGE {
        let filter = map.get(FILTER).and_then(Value::as_str).unwrap_or_default();
        return criteria
            .get(filter)
            .and_then(|v| select_range(map, v))
            .unwrap_or(&NULL);
    }
    map.get(selected).unwrap_or(&NULL)
}

fn select_range<'v>(map: &'v Map<String, Value>, criteria_value: &str) -> Option<&'v Value> {
    let wanted = criteria_value.trim().parse::<f64>().ok()?;
    map.get(RANGE)?
        .as_array()?
        .iter()
        .find(|entry| {
            entry
                .get("limit")
                .and_then(Value::as_f64)
                .is_some_and(|limit| wanted <= limit)
        })
        .and_then(|entry| entry.get("value"))
}

/// Deep merge with `overlay` winning; non-object overlays replace the base.
fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

fn materialize(node: &Value, criteria: &Criteria, path: &str) -> Result<Value, ResolutionError> {
    if is_filter(node) {
        let selected = select_branch(Cow::Borrowed(node), criteria, path)?;
        return materialize(&selected, criteria, path);
    }

    match node {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if key.starts_with('$') {
                    continue;
                }
                let child_path = format!("{path}/{key}");
                out.insert(key.clone(), materialize(value, criteria, &child_path)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| materialize(item, criteria, &format!("{path}/{i}")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn validate(node: &Value, path: &str) -> Result<(), ConfigError> {
    match node {
        Value::Object(map) => {
            let filtered = map.contains_key(FILTER);
            for (key, value) in map {
                let child_path = format!("{path}/{key}");
                match key.as_str() {
                    FILTER => match value.as_str() {
                        Some(name) if !name.trim().is_empty() => {}
                        _ => {
                            return Err(ConfigError::invalid(
                                path,
                                "`$filter` must be a non-empty string",
                            ));
                        }
                    },
                    META => {
                        if !value.is_string() {
                            return Err(ConfigError::invalid(path, "`$meta` must be a string"));
                        }
                    }
                    DEFAULT | BASE | RANGE if !filtered => {
                        return Err(ConfigError::invalid(
                            path,
                            format!("`{key}` is only allowed beside `$filter`"),
                        ));
                    }
                    DEFAULT => validate(value, &child_path)?,
                    BASE => {
                        if !value.is_object() {
                            return Err(ConfigError::invalid(path, "`$base` must be an object"));
                        }
                        validate(value, &child_path)?;
                    }
                    RANGE => validate_range(value, path)?,
                    other if other.starts_with('$') => {
                        return Err(ConfigError::invalid(
                            path,
                            format!("unknown directive `{other}`"),
                        ));
                    }
                    _ => validate(value, &child_path)?,
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                validate(item, &format!("{path}/{i}"))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_range(value: &Value, path: &str) -> Result<(), ConfigError> {
    let entries = value
        .as_array()
        .ok_or_else(|| ConfigError::invalid(path, "`$range` must be an array"))?;

    let mut previous: Option<f64> = None;
    for (i, entry) in entries.iter().enumerate() {
        let limit = entry
            .get("limit")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                ConfigError::invalid(path, format!("`$range[{i}]` needs a numeric `limit`"))
            })?;
        let Some(inner) = entry.get("value") else {
            return Err(ConfigError::invalid(
                path,
                format!("`$range[{i}]` needs a `value`"),
            ));
        };
        if previous.is_some_and(|p| limit <= p) {
            return Err(ConfigError::invalid(
                path,
                "`$range` limits must be strictly ascending",
            ));
        }
        previous = Some(limit);
        validate(inner, &format!("{path}/$range/{i}"))?;
    }
    Ok(())
}
