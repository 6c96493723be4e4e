use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier key carried by every stored document.
pub const ID_KEY: &str = "_id";

/// A schemaless JSON document.
pub type Document = Map<String, Value>;

/// Equality filter over document fields.
///
/// Keys may be dotted paths (`"analysis.status"`) to reach into nested
/// objects. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    conditions: Map<String, Value>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::all().eq(ID_KEY, id)
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    pub fn conditions(&self) -> &Map<String, Value> {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The `_id` value when the filter is a plain id lookup.
    pub fn id_only(&self) -> Option<&Value> {
        match self.conditions.get(ID_KEY) {
            Some(id) if self.conditions.len() == 1 => Some(id),
            _ => None,
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(path, expected)| lookup(document, path) == Some(expected))
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(conditions: Map<String, Value>) -> Self {
        Self { conditions }
    }
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Renders a document id as the string form used for storage keys and return
/// values. String ids are used verbatim, anything else as compact JSON.
pub fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Merges `fields` into `document` with `$set` semantics. Returns whether any
/// value actually changed.
pub fn apply_set(document: &mut Document, fields: &Document) -> bool {
    let mut changed = false;
    for (key, value) in fields {
        if document.get(key) != Some(value) {
            document.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::all().matches(&doc(json!({"a": 1}))));
    }

    #[test]
    fn filter_requires_all_conditions() {
        let filter = Filter::all().eq("analyzed", false).eq("city", "Kutaisi");

        assert!(filter.matches(&doc(json!({"analyzed": false, "city": "Kutaisi"}))));
        assert!(!filter.matches(&doc(json!({"analyzed": true, "city": "Kutaisi"}))));
        assert!(!filter.matches(&doc(json!({"city": "Kutaisi"}))));
    }

    #[test]
    fn filter_follows_dotted_paths() {
        let filter = Filter::all().eq("analysis.status", "seller");

        assert!(filter.matches(&doc(json!({"analysis": {"status": "seller"}}))));
        assert!(!filter.matches(&doc(json!({"analysis": "seller"}))));
    }

    #[test]
    fn id_only_recognises_plain_id_lookups() {
        assert_eq!(Filter::by_id(7).id_only(), Some(&json!(7)));
        assert!(Filter::by_id(7).eq("analyzed", false).id_only().is_none());
        assert!(Filter::all().eq("analyzed", false).id_only().is_none());
        assert!(Filter::all().id_only().is_none());
    }

    #[test]
    fn apply_set_reports_changes_only() {
        let mut document = doc(json!({"_id": "1", "analyzed": false}));

        assert!(apply_set(&mut document, &doc(json!({"analyzed": true}))));
        assert!(!apply_set(&mut document, &doc(json!({"analyzed": true}))));
        assert_eq!(document.get("analyzed"), Some(&json!(true)));
    }

    #[test]
    fn id_to_string_keeps_plain_strings() {
        assert_eq!(id_to_string(&json!("abc")), "abc");
        assert_eq!(id_to_string(&json!(42)), "42");
        assert_eq!(id_to_string(&json!({"$oid": "x"})), r#"{"$oid":"x"}"#);
    }
}
