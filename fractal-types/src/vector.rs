//! Vector store contract and the metadata filter grammar.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// A search hit from a vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    /// The stored vector's id.
    pub id: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
    /// Metadata stored alongside the vector.
    pub metadata: serde_json::Value,
}

/// Comparison operator in a metadata filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Exact equality (the default).
    Eq,
    /// Membership in a JSON array.
    In,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Substring (strings) or element (arrays) containment.
    Contains,
}

/// One clause of a metadata filter.
#[derive(Debug, Clone)]
pub struct FilterClause {
    /// Metadata key; the reserved key `id` matches the vector id.
    pub key: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Expected value.
    pub value: serde_json::Value,
}

/// A conjunctive metadata filter parsed from `key__op` style keys.
///
/// `{"id__in": [...], "created_at__lt": "..."}` parses to two clauses; a
/// bare key means equality. Ordering comparisons fall back to string
/// comparison when either side is not a number, which makes RFC 3339
/// timestamps order correctly.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    /// The clauses, all of which must match.
    pub clauses: Vec<FilterClause>,
}

impl MetadataFilter {
    /// Parse a filter from a `key__op` map. Unknown operator suffixes are
    /// treated as part of the key name with equality semantics.
    #[must_use]
    pub fn parse(raw: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut parsed = Vec::new();
        for (raw_key, value) in raw {
            let (key, op) = match raw_key.rsplit_once("__") {
                Some((key, "in")) => (key.to_string(), FilterOp::In),
                Some((key, "lt")) => (key.to_string(), FilterOp::Lt),
                Some((key, "lte")) => (key.to_string(), FilterOp::Lte),
                Some((key, "gt")) => (key.to_string(), FilterOp::Gt),
                Some((key, "gte")) => (key.to_string(), FilterOp::Gte),
                Some((key, "contains")) => (key.to_string(), FilterOp::Contains),
                Some((key, "eq")) => (key.to_string(), FilterOp::Eq),
                _ => (raw_key.clone(), FilterOp::Eq),
            };
            parsed.push(FilterClause {
                key,
                op,
                value: value.clone(),
            });
        }
        Self { clauses: parsed }
    }

    /// Whether the filter matches a vector with the given id and metadata.
    #[must_use]
    pub fn matches(&self, id: &str, metadata: &serde_json::Value) -> bool {
        self.clauses.iter().all(|clause| {
            let actual = if clause.key == "id" {
                serde_json::Value::String(id.to_string())
            } else {
                match metadata.get(&clause.key) {
                    Some(v) => v.clone(),
                    None => return false,
                }
            };
            clause_matches(&actual, clause.op, &clause.value)
        })
    }
}

fn clause_matches(actual: &serde_json::Value, op: FilterOp, expected: &serde_json::Value) -> bool {
    use serde_json::Value;
    match op {
        FilterOp::Eq => actual == expected,
        FilterOp::In => expected
            .as_array()
            .is_some_and(|arr| arr.contains(actual)),
        FilterOp::Contains => match actual {
            Value::Array(items) => items.contains(expected),
            Value::String(s) => expected.as_str().is_some_and(|e| s.contains(e)),
            _ => false,
        },
        FilterOp::Lt | FilterOp::Lte | FilterOp::Gt | FilterOp::Gte => {
            let ordering = compare(actual, expected);
            match (ordering, op) {
                (Some(o), FilterOp::Lt) => o.is_lt(),
                (Some(o), FilterOp::Lte) => o.is_le(),
                (Some(o), FilterOp::Gt) => o.is_gt(),
                (Some(o), FilterOp::Gte) => o.is_ge(),
                _ => false,
            }
        }
    }
}

/// Order two JSON values: numerically when both are numbers, otherwise as
/// strings (which orders RFC 3339 timestamps correctly).
fn compare(a: &serde_json::Value, b: &serde_json::Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// The vector store capability backing the L4 memory tier.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store a vector. Returns `true` if it was newly added, `false` if it
    /// replaced an existing id.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] when the vector's
    /// dimension disagrees with the store; no other state changes.
    async fn add(
        &self,
        id: &str,
        embedding: &[f32],
        metadata: serde_json::Value,
    ) -> Result<bool, MemoryError>;

    /// Return the `top_k` nearest vectors by cosine similarity, scores
    /// descending.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorHit>, MemoryError>;

    /// Delete by id. Returns whether the id was present. Idempotent.
    async fn delete(&self, id: &str) -> Result<bool, MemoryError>;

    /// Delete everything matching the filter. Returns the count removed.
    async fn delete_by_metadata(&self, filter: &MetadataFilter) -> Result<usize, MemoryError>;

    /// Remove all vectors.
    async fn clear(&self) -> Result<bool, MemoryError>;

    /// Number of stored vectors.
    async fn len(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(raw: serde_json::Value) -> MetadataFilter {
        MetadataFilter::parse(raw.as_object().unwrap())
    }

    #[test]
    fn bare_key_is_equality() {
        let f = filter(json!({"action": "search"}));
        assert!(f.matches("v1", &json!({"action": "search"})));
        assert!(!f.matches("v1", &json!({"action": "browse"})));
    }

    #[test]
    fn id_in_clause() {
        let f = filter(json!({"id__in": ["a", "b"]}));
        assert!(f.matches("a", &json!({})));
        assert!(!f.matches("c", &json!({})));
    }

    #[test]
    fn timestamp_lt_orders_as_strings() {
        let f = filter(json!({"created_at__lt": "2026-02-01T00:00:00Z"}));
        assert!(f.matches("v", &json!({"created_at": "2026-01-15T12:00:00Z"})));
        assert!(!f.matches("v", &json!({"created_at": "2026-03-01T00:00:00Z"})));
    }

    #[test]
    fn contains_on_arrays_and_strings() {
        let f = filter(json!({"tags__contains": "search"}));
        assert!(f.matches("v", &json!({"tags": ["search", "completed"]})));
        assert!(!f.matches("v", &json!({"tags": ["browse"]})));

        let f = filter(json!({"action__contains": "ear"}));
        assert!(f.matches("v", &json!({"action": "search"})));
    }

    #[test]
    fn missing_key_never_matches() {
        let f = filter(json!({"absent": 1}));
        assert!(!f.matches("v", &json!({"present": 1})));
    }
}
