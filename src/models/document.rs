//! Accessors for schema-free documents
//!
//! Every orchestrator kind has its own `spec`/`status` shape and those shapes
//! change between versions. These helpers walk a JSON document by path and
//! return `None` when any segment is missing or has the wrong type, so callers
//! degrade instead of failing.

use serde_json::{Map, Value};

/// Walk `path` from `doc`, returning the value at the end if every segment exists
pub fn get_nested<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |current, segment| current.get(segment))
}

pub fn get_nested_string<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a str> {
    get_nested(doc, path).and_then(Value::as_str)
}

/// Integer at `path`; accepts integral floats since some producers emit `3.0`
pub fn get_nested_i64(doc: &Value, path: &[&str]) -> Option<i64> {
    let value = get_nested(doc, path)?;
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

pub fn get_nested_bool(doc: &Value, path: &[&str]) -> Option<bool> {
    get_nested(doc, path).and_then(Value::as_bool)
}

pub fn get_nested_slice<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a [Value]> {
    get_nested(doc, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

pub fn get_nested_map<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Map<String, Value>> {
    get_nested(doc, path).and_then(Value::as_object)
}

/// Find the condition of the given type in a `conditions` list
pub fn find_condition<'a>(status: &'a Value, condition_type: &str) -> Option<&'a Value> {
    get_nested_slice(status, &["conditions"])?
        .iter()
        .find(|c| c.get("type").and_then(Value::as_str) == Some(condition_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_lookup() {
        let doc = json!({"spec": {"ref": {"branch": "main"}, "replicas": 3, "suspend": true}});

        assert_eq!(get_nested_string(&doc, &["spec", "ref", "branch"]), Some("main"));
        assert_eq!(get_nested_i64(&doc, &["spec", "replicas"]), Some(3));
        assert_eq!(get_nested_bool(&doc, &["spec", "suspend"]), Some(true));
        assert!(get_nested_map(&doc, &["spec", "ref"]).is_some());
    }

    #[test]
    fn test_missing_or_mistyped_is_none() {
        let doc = json!({"spec": {"replicas": "three", "items": {}}});

        assert_eq!(get_nested_i64(&doc, &["spec", "replicas"]), None);
        assert_eq!(get_nested_string(&doc, &["spec", "nope", "deeper"]), None);
        assert_eq!(get_nested_slice(&doc, &["spec", "items"]), None);
        assert_eq!(get_nested_string(&Value::Null, &["spec"]), None);
    }

    #[test]
    fn test_integral_float() {
        let doc = json!({"n": 2.0, "m": 2.5});
        assert_eq!(get_nested_i64(&doc, &["n"]), Some(2));
        assert_eq!(get_nested_i64(&doc, &["m"]), None);
    }

    #[test]
    fn test_find_condition() {
        let status = json!({"conditions": [
            {"type": "Reconciling", "status": "False"},
            {"type": "Ready", "status": "True", "message": "ok"}
        ]});
        let ready = find_condition(&status, "Ready").unwrap();
        assert_eq!(ready["message"], "ok");
        assert!(find_condition(&status, "Stalled").is_none());
    }
}
