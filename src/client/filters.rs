use std::collections::BTreeMap;

use crate::error::Result;
use crate::transport::Request;

/// The engine's `filters` query parameter: a JSON object mapping each filter
/// name to a list of values, e.g. `{"dangling":["true"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<String, Vec<String>>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to the single value `value`, replacing anything set before.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    /// Add `value` to the values already set for `key`.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Attach as a `filters` query parameter; no-op when empty.
    pub fn apply(&self, request: Request) -> Result<Request> {
        if self.is_empty() {
            return Ok(request);
        }
        Ok(request.query("filters", serde_json::to_string(&self.0)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_previous_value() {
        let mut filters = Filters::new();
        filters.set("label", "a=1");
        filters.set("label", "b=2");
        assert_eq!(filters.get("label"), Some(&["b=2".to_string()][..]));
    }

    #[test]
    fn add_accumulates() {
        let mut filters = Filters::new();
        filters.add("name", "web");
        filters.add("name", "db");
        assert_eq!(filters.get("name").unwrap().len(), 2);
    }

    #[test]
    fn empty_filters_leave_request_untouched() {
        let req = Filters::new().apply(Request::get("/volumes")).unwrap();
        assert_eq!(req.target(), "/volumes");
    }

    #[test]
    fn encodes_as_sorted_json_object() {
        let mut filters = Filters::new();
        filters.set("driver", "local");
        filters.set("dangling", "true");
        let req = filters.apply(Request::get("/volumes")).unwrap();
        assert_eq!(
            req.query_pairs(),
            &[(
                "filters".to_string(),
                r#"{"dangling":["true"],"driver":["local"]}"#.to_string()
            )]
        );
    }
}
