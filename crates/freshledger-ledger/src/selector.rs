use serde::Serialize;
use serde_json::Value;

/// A single field predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Eq(Value),
    Lte(f64),
    Gte(f64),
    Exists,
    /// At least one element of an array field satisfies the nested selector.
    ElemMatch(Selector),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clause {
    pub field: String,
    pub condition: Condition,
}

/// Structured query predicate over JSON records. All clauses must hold.
///
/// Built with typed methods so that no caller formats query strings:
///
/// ```
/// use freshledger_ledger::Selector;
///
/// let selector = Selector::new()
///     .eq("store_id", "S1")
///     .elem_match("items", Selector::new().eq("item_id", "A"))
///     .eq("invoice_type", "purchase");
/// assert_eq!(selector.clauses().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selector {
    clauses: Vec<Clause>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    pub fn lte(self, field: impl Into<String>, bound: f64) -> Self {
        self.with(field, Condition::Lte(bound))
    }

    pub fn gte(self, field: impl Into<String>, bound: f64) -> Self {
        self.with(field, Condition::Gte(bound))
    }

    pub fn exists(self, field: impl Into<String>) -> Self {
        self.with(field, Condition::Exists)
    }

    pub fn elem_match(self, field: impl Into<String>, nested: Selector) -> Self {
        self.with(field, Condition::ElemMatch(nested))
    }

    fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            condition,
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Evaluate against a decoded document. Non-objects never match.
    pub fn matches(&self, doc: &Value) -> bool {
        let Some(object) = doc.as_object() else {
            return false;
        };
        self.clauses.iter().all(|clause| {
            let field = object.get(&clause.field);
            match (&clause.condition, field) {
                (Condition::Exists, found) => found.is_some_and(|v| !v.is_null()),
                (Condition::Eq(expected), Some(actual)) => expected == actual,
                (Condition::Lte(bound), Some(actual)) => {
                    actual.as_f64().is_some_and(|n| n <= *bound)
                }
                (Condition::Gte(bound), Some(actual)) => {
                    actual.as_f64().is_some_and(|n| n >= *bound)
                }
                (Condition::ElemMatch(nested), Some(Value::Array(elements))) => {
                    elements.iter().any(|element| nested.matches(element))
                }
                _ => false,
            }
        })
    }

    /// Evaluate against raw JSON bytes. Undecodable values never match.
    pub fn matches_bytes(&self, bytes: &[u8]) -> bool {
        serde_json::from_slice::<Value>(bytes)
            .map(|doc| self.matches(&doc))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn invoice() -> Value {
        json!({
            "store_id": "S1",
            "invoice_type": "purchase",
            "items": [
                {"item_id": "A", "expiry_date": "2025-06-01"},
                {"item_id": "B", "expiry_date": "2025-01-01"}
            ]
        })
    }

    #[test]
    fn test_empty_selector_matches_any_object() {
        assert!(Selector::new().matches(&invoice()));
        assert!(!Selector::new().matches(&json!([1, 2])));
    }

    #[test]
    fn test_equality_and_elem_match() {
        let selector = Selector::new()
            .eq("store_id", "S1")
            .elem_match(
                "items",
                Selector::new().eq("item_id", "B").eq("expiry_date", "2025-01-01"),
            )
            .eq("invoice_type", "purchase");
        assert!(selector.matches(&invoice()));
    }

    #[test]
    fn test_elem_match_requires_single_element() {
        // item A with B's expiry exists in neither element
        let selector = Selector::new().elem_match(
            "items",
            Selector::new().eq("item_id", "A").eq("expiry_date", "2025-01-01"),
        );
        assert!(!selector.matches(&invoice()));
    }

    #[test]
    fn test_range_conditions() {
        let doc = json!({"quality_index": 50.0});
        assert!(Selector::new().lte("quality_index", 50.0).matches(&doc));
        assert!(!Selector::new().gte("quality_index", 80.0).matches(&doc));
        assert!(!Selector::new().lte("quality_index", 50.0).matches(&json!({"quality_index": "low"})));
        assert!(!Selector::new().lte("quality_index", 50.0).matches(&json!({})));
    }

    #[test]
    fn test_exists() {
        assert!(Selector::new().exists("items").matches(&invoice()));
        assert!(!Selector::new().exists("previous_state").matches(&invoice()));
        assert!(!Selector::new().exists("x").matches(&json!({"x": null})));
    }

    #[test]
    fn test_injection_text_is_plain_data() {
        let hostile = r#"S1","invoice_type":{"$ne":null}"#;
        let selector = Selector::new().eq("store_id", hostile);
        assert!(!selector.matches(&invoice()));
        assert!(selector.matches(&json!({"store_id": hostile})));
    }

    #[test]
    fn test_matches_bytes_rejects_garbage() {
        assert!(!Selector::new().matches_bytes(b"not json"));
        assert!(Selector::new().eq("a", 1).matches_bytes(br#"{"a":1}"#));
    }

    proptest! {
        #[test]
        fn prop_eq_matches_only_its_own_value(a in ".*", b in ".*") {
            let doc = json!({"store_id": a.clone()});
            prop_assert!(Selector::new().eq("store_id", a.as_str()).matches(&doc));
            prop_assert_eq!(Selector::new().eq("store_id", b.as_str()).matches(&doc), a == b);
        }

        #[test]
        fn prop_range_bounds_partition(value in -1e6f64..1e6, bound in -1e6f64..1e6) {
            let doc = json!({"quality_index": value});
            let at_most = Selector::new().lte("quality_index", bound).matches(&doc);
            let at_least = Selector::new().gte("quality_index", bound).matches(&doc);
            prop_assert!(at_most || at_least);
            prop_assert_eq!(at_most && at_least, value == bound);
        }
    }
}
