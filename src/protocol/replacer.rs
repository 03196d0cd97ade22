//! Outbound JSON replacer.
//!
//! A replacer is consulted for every value of an outbound envelope before it
//! is written to the wire, top-down, starting with the whole envelope under
//! the empty key. It lets callers encode values the plain JSON mapping does
//! not cover (or strip fields) without touching the protocol code.

use serde_json::{Map, Value};
use std::sync::Arc;

/// Replacer callback: `(key, value) -> replacement`.
///
/// Object members are visited with their member name, array elements with
/// their decimal index. Returning `None` drops an object member; inside an
/// array the element becomes `null`. The replacement is then walked in turn,
/// so a replacer that returns an object sees that object's members next.
pub type JsonReplacer = Arc<dyn Fn(&str, Value) -> Option<Value> + Send + Sync>;

/// Run `replacer` over `root`. A dropped root encodes as `null`.
pub(crate) fn apply(replacer: &JsonReplacer, root: Value) -> Value {
    walk(replacer, "", root).unwrap_or(Value::Null)
}

fn walk(replacer: &JsonReplacer, key: &str, value: Value) -> Option<Value> {
    // ---
    let value = replacer(key, value)?;

    let walked = match value {
        Value::Object(members) => Value::Object(
            members
                .into_iter()
                .filter_map(|(k, v)| walk(replacer, &k, v).map(|v| (k, v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| walk(replacer, &i.to_string(), v).unwrap_or(Value::Null))
                .collect(),
        ),
        scalar => scalar,
    };

    Some(walked)
}
