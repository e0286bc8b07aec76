//! Catch resolution: first matching policy wins, in declaration order.

use serde_json::{Value, json};
use waypoint_types::workflow::CatchPolicy;

use super::retry::kind_matches;

/// The first catch policy whose error kinds match `kind`.
pub fn resolve<'a>(catches: &'a [CatchPolicy], kind: &str) -> Option<&'a CatchPolicy> {
    catches.iter().find(|c| kind_matches(&c.error_kinds, kind))
}

/// The `{kind, message}` document a catch writes at its result path.
pub fn error_output(kind: &str, message: &str) -> Value {
    json!({ "kind": kind, "message": message })
}
