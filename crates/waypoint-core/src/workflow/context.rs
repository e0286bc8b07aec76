//! Execution context: the JSON document a run threads through its states.
//!
//! Paths use a small JSONPath subset: `$` is the root, `.key` selects an
//! object member and `[n]` selects an array element (`$.output.items[0]`).
//! Reads of missing paths yield `null`; writes create intermediate objects
//! and leave every key outside the written path untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use waypoint_types::workflow::MessageTemplate;

/// Root path: selects (or replaces) the whole context.
pub const ROOT_PATH: &str = "$";

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// One step of a parsed context path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Malformed context path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path '{path}': {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

impl PathError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse `$`, `$.a.b`, `$.items[2].name` into segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PathError> {
    let mut rest = path
        .trim()
        .strip_prefix('$')
        .ok_or_else(|| PathError::new(path, "must start with '$'"))?;
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            let key = &after[..end];
            if key.is_empty() {
                return Err(PathError::new(path, "empty member name"));
            }
            segments.push(PathSegment::Key(key.to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after
                .find(']')
                .ok_or_else(|| PathError::new(path, "unclosed '['"))?;
            let index = after[..end]
                .trim()
                .parse::<usize>()
                .map_err(|_| PathError::new(path, "array index must be a non-negative integer"))?;
            segments.push(PathSegment::Index(index));
            rest = &after[end + 1..];
        } else {
            return Err(PathError::new(
                path,
                format!("unexpected character '{}'", rest.chars().next().unwrap_or(' ')),
            ));
        }
    }

    Ok(segments)
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// The JSON document flowing through a run.
///
/// Each state reads its input from the context and writes its result back at
/// a path. Parallel branches each get their own deep copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    data: Value,
}

impl ExecutionContext {
    /// Empty object context.
    pub fn new() -> Self {
        Self {
            data: Value::Object(Map::new()),
        }
    }

    /// Seed a context from a trigger payload. `null` becomes an empty object.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::new(),
            data => Self { data },
        }
    }

    /// Value at `path`, or `null` if any segment is missing.
    pub fn get(&self, path: &str) -> Value {
        self.lookup(path).cloned().unwrap_or(Value::Null)
    }

    /// Borrow the value at `path` when it exists.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let segments = parse_path(path).ok()?;
        let mut current = &self.data;
        for segment in &segments {
            current = match segment {
                PathSegment::Key(key) => current.as_object()?.get(key)?,
                PathSegment::Index(index) => current.as_array()?.get(*index)?,
            };
        }
        Some(current)
    }

    /// Write `value` at `path`.
    ///
    /// `$` replaces the whole context. Any other path replaces only the value
    /// at that location, creating objects (or padding arrays with `null`)
    /// along the way. A scalar standing where a container is needed is
    /// replaced by that container.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), PathError> {
        let segments = parse_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            self.data = value;
            return Ok(());
        };

        let mut current = &mut self.data;
        for (i, segment) in parents.iter().enumerate() {
            let next_is_index = matches!(segments[i + 1], PathSegment::Index(_));
            current = child_mut(current, segment, next_is_index);
        }

        match last {
            PathSegment::Key(key) => {
                ensure_object(current).insert(key.clone(), value);
            }
            PathSegment::Index(index) => {
                let items = ensure_array(current);
                if items.len() <= *index {
                    items.resize(*index + 1, Value::Null);
                }
                items[*index] = value;
            }
        }
        Ok(())
    }

    /// Set a top-level member, leaving the rest of the document untouched.
    pub fn insert(&mut self, key: &str, value: Value) {
        ensure_object(&mut self.data).insert(key.to_string(), value);
    }

    /// Write the branch outputs of a Parallel state as an array at `path`.
    pub fn merge(&mut self, path: &str, children: Vec<ExecutionContext>) -> Result<(), PathError> {
        let joined = children.into_iter().map(ExecutionContext::into_value).collect();
        self.set(path, Value::Array(joined))
    }

    /// Immutable copy of the current document, for events and results.
    pub fn snapshot(&self) -> Value {
        self.data.clone()
    }

    pub fn as_value(&self) -> &Value {
        &self.data
    }

    pub fn into_value(self) -> Value {
        self.data
    }

    /// Render a Notify message body.
    pub fn render(&self, template: &MessageTemplate) -> String {
        match template {
            MessageTemplate::Path(path) => value_to_text(&self.get(path)),
            MessageTemplate::Text(text) => self.resolve_template(text),
        }
    }

    /// Replace `{{ $.path }}` markers with the text form of the value found.
    ///
    /// Markers whose path is malformed or missing are left as-is.
    pub fn resolve_template(&self, template: &str) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                result.push_str(&rest[start..]);
                return result;
            };
            let expr = after_open[..end].trim();
            match self.lookup(expr) {
                Some(value) => result.push_str(&value_to_text(value)),
                None => result.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after_open[end + 2..];
        }

        result.push_str(rest);
        result
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Strings render verbatim; everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}

fn ensure_array(value: &mut Value) -> &mut Vec<Value> {
    if !value.is_array() {
        *value = Value::Array(Vec::new());
    }
    match value {
        Value::Array(items) => items,
        _ => unreachable!("value was just replaced by an array"),
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &PathSegment, next_is_index: bool) -> &'a mut Value {
    let empty = || {
        if next_is_index {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    };
    match segment {
        PathSegment::Key(key) => ensure_object(value).entry(key.clone()).or_insert_with(empty),
        PathSegment::Index(index) => {
            let items = ensure_array(value);
            if items.len() <= *index {
                items.resize(*index + 1, Value::Null);
            }
            let slot = &mut items[*index];
            if slot.is_null() {
                *slot = empty();
            }
            slot
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_path_forms() {
        assert!(parse_path("$").unwrap().is_empty());
        assert_eq!(
            parse_path("$.output.items[2].name").unwrap(),
            vec![
                PathSegment::Key("output".into()),
                PathSegment::Key("items".into()),
                PathSegment::Index(2),
                PathSegment::Key("name".into()),
            ]
        );
    }

    #[test]
    fn parse_path_rejects_malformed() {
        assert!(parse_path("output").is_err());
        assert!(parse_path("$.").is_err());
        assert!(parse_path("$.a..b").is_err());
        assert!(parse_path("$.a[").is_err());
        assert!(parse_path("$.a[x]").is_err());
        assert!(parse_path("$a").is_err());
    }

    #[test]
    fn get_missing_path_is_null() {
        let ctx = ExecutionContext::from_value(json!({ "a": { "b": 1 } }));
        assert_eq!(ctx.get("$.a.b"), json!(1));
        assert_eq!(ctx.get("$.a.c"), Value::Null);
        assert_eq!(ctx.get("$.a.b.c"), Value::Null);
        assert_eq!(ctx.get("$.list[3]"), Value::Null);
        assert_eq!(ctx.get("not a path"), Value::Null);
        assert_eq!(ctx.get("$"), json!({ "a": { "b": 1 } }));
    }

    #[test]
    fn set_preserves_unrelated_keys() {
        let mut ctx = ExecutionContext::from_value(json!({ "trigger": "cron", "a": { "keep": true } }));
        ctx.set("$.a.result", json!({ "Payload": "report" })).unwrap();
        ctx.set("$.output", json!(42)).unwrap();

        assert_eq!(
            ctx.snapshot(),
            json!({
                "trigger": "cron",
                "a": { "keep": true, "result": { "Payload": "report" } },
                "output": 42
            })
        );
    }

    #[test]
    fn insert_accepts_any_member_name() {
        let mut ctx = ExecutionContext::from_value(json!({ "keep": 1 }));
        ctx.insert("Run Report.v2", json!("ok"));
        assert_eq!(ctx.snapshot(), json!({ "keep": 1, "Run Report.v2": "ok" }));
    }

    #[test]
    fn set_root_replaces_context() {
        let mut ctx = ExecutionContext::from_value(json!({ "old": 1 }));
        ctx.set("$", json!({ "new": 2 })).unwrap();
        assert_eq!(ctx.snapshot(), json!({ "new": 2 }));
    }

    #[test]
    fn set_creates_arrays_for_index_segments() {
        let mut ctx = ExecutionContext::new();
        ctx.set("$.rows[1].id", json!("b")).unwrap();
        assert_eq!(ctx.snapshot(), json!({ "rows": [null, { "id": "b" }] }));
    }

    #[test]
    fn set_rejects_bad_path() {
        let mut ctx = ExecutionContext::new();
        assert!(ctx.set("output", json!(1)).is_err());
        assert_eq!(ctx.snapshot(), json!({}));
    }

    #[test]
    fn merge_writes_children_in_order() {
        let mut ctx = ExecutionContext::from_value(json!({ "input": 1 }));
        let a = ExecutionContext::from_value(json!({ "branch": "a" }));
        let b = ExecutionContext::from_value(json!({ "branch": "b" }));
        ctx.merge("$.Fanout", vec![a, b]).unwrap();
        assert_eq!(
            ctx.snapshot(),
            json!({ "input": 1, "Fanout": [{ "branch": "a" }, { "branch": "b" }] })
        );
    }

    #[test]
    fn null_seed_is_empty_object() {
        assert_eq!(ExecutionContext::from_value(Value::Null).snapshot(), json!({}));
    }

    #[test]
    fn render_path_and_text_templates() {
        let ctx = ExecutionContext::from_value(json!({
            "output": { "Payload": "3 expensive functions", "Count": 3, "Rows": [1, 2] }
        }));
        assert_eq!(
            ctx.render(&MessageTemplate::Path("$.output.Payload".into())),
            "3 expensive functions"
        );
        assert_eq!(ctx.render(&MessageTemplate::Path("$.output.Rows".into())), "[1,2]");
        assert_eq!(
            ctx.render(&MessageTemplate::Text(
                "found {{ $.output.Count }} ({{$.output.Payload}})".into()
            )),
            "found 3 (3 expensive functions)"
        );
    }

    #[test]
    fn unresolved_template_markers_are_kept() {
        let ctx = ExecutionContext::new();
        assert_eq!(ctx.resolve_template("x {{ $.missing }} y"), "x {{ $.missing }} y");
        assert_eq!(ctx.resolve_template("open {{ $.a"), "open {{ $.a");
        assert_eq!(ctx.resolve_template("plain"), "plain");
    }
}
