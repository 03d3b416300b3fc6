use std::cmp::Ordering;

use serde_json::Value;

use crate::Document;

/// A filter over top-level fields of a document body.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value.
    Eq { field: String, value: Value },

    /// Field equals one of the values.
    OneOf { field: String, values: Vec<Value> },

    /// Numeric field is greater than or equal to the bound.
    Gte { field: String, bound: f64 },

    /// Numeric field is less than or equal to the bound.
    Lte { field: String, bound: f64 },

    /// String field contains the needle, ignoring case.
    Contains { field: String, needle: String },

    /// At least one of the nested conditions holds.
    Any(Vec<Condition>),
}

impl Condition {
    /// Evaluates the condition against a document body.
    ///
    /// Missing fields and fields of the wrong type never match.
    pub fn matches(&self, body: &Value) -> bool {
        match self {
            Self::Eq { field, value } => body.get(field) == Some(value),
            Self::OneOf { field, values } => body
                .get(field)
                .is_some_and(|actual| values.contains(actual)),
            Self::Gte { field, bound } => body
                .get(field)
                .and_then(Value::as_f64)
                .is_some_and(|n| n >= *bound),
            Self::Lte { field, bound } => body
                .get(field)
                .and_then(Value::as_f64)
                .is_some_and(|n| n <= *bound),
            Self::Contains { field, needle } => body
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
            Self::Any(conditions) => conditions.iter().any(|c| c.matches(body)),
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SortOrder {
    /// Oldest first, by insertion sequence.
    #[default]
    Inserted,

    /// Newest first, by insertion sequence.
    InsertedDesc,

    /// By a body field. Documents missing the field sort last; ties fall
    /// back to insertion order.
    Field { field: String, descending: bool },
}

/// Builder for document queries against a single collection.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub collection: String,
    pub conditions: Vec<Condition>,
    pub sort: SortOrder,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query returning every document in the collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            conditions: Vec::new(),
            sort: SortOrder::default(),
            limit: None,
            offset: None,
        }
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn one_of<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition::OneOf {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn gte(mut self, field: impl Into<String>, bound: f64) -> Self {
        self.conditions.push(Condition::Gte {
            field: field.into(),
            bound,
        });
        self
    }

    pub fn lte(mut self, field: impl Into<String>, bound: f64) -> Self {
        self.conditions.push(Condition::Lte {
            field: field.into(),
            bound,
        });
        self
    }

    pub fn contains(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.conditions.push(Condition::Contains {
            field: field.into(),
            needle: needle.into(),
        });
        self
    }

    /// Adds a disjunction: at least one of `conditions` must hold.
    pub fn any(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions.push(Condition::Any(conditions));
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.sort = SortOrder::InsertedDesc;
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort = SortOrder::Field {
            field: field.into(),
            descending,
        };
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true when every condition holds for the body.
    pub fn matches(&self, body: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(body))
    }

    /// Filters, sorts and pages documents of any collection in memory.
    ///
    /// Documents from other collections are ignored.
    pub fn apply<'a>(&self, documents: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let mut selected: Vec<Document> = documents
            .into_iter()
            .filter(|d| d.collection == self.collection && self.matches(&d.body))
            .cloned()
            .collect();

        match &self.sort {
            SortOrder::Inserted => selected.sort_by_key(|d| d.seq),
            SortOrder::InsertedDesc => selected.sort_by_key(|d| std::cmp::Reverse(d.seq)),
            SortOrder::Field { field, descending } => selected.sort_by(|a, b| {
                compare_field(a.field(field), b.field(field), *descending).then(a.seq.cmp(&b.seq))
            }),
        }

        selected
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

fn compare_field(a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = match (a, b) {
                (Value::Number(x), Value::Number(y)) => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
                (Value::String(x), Value::String(y)) => x.cmp(y),
                (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                _ => Ordering::Equal,
            };
            if descending { ord.reverse() } else { ord }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use crate::Version;

    fn doc(seq: i64, body: Value) -> Document {
        Document {
            collection: "listings".into(),
            id: Uuid::new_v4(),
            version: Version::first(),
            seq,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            body,
        }
    }

    #[test]
    fn contains_ignores_case() {
        let c = Condition::Contains {
            field: "industry".into(),
            needle: "FOOD".into(),
        };
        assert!(c.matches(&json!({"industry": "Food & Beverage"})));
        assert!(!c.matches(&json!({"industry": "Retail"})));
        assert!(!c.matches(&json!({})));
    }

    #[test]
    fn numeric_bounds_skip_missing_and_null() {
        let c = Condition::Gte {
            field: "annual_revenue".into(),
            bound: 100.0,
        };
        assert!(c.matches(&json!({"annual_revenue": 150})));
        assert!(!c.matches(&json!({"annual_revenue": 50})));
        assert!(!c.matches(&json!({"annual_revenue": null})));
        assert!(!c.matches(&json!({})));
    }

    #[test]
    fn one_of_and_any() {
        let q = DocumentQuery::collection("listings")
            .one_of("status", ["draft", "active"])
            .any(vec![
                Condition::Contains {
                    field: "title".into(),
                    needle: "cafe".into(),
                },
                Condition::Contains {
                    field: "description".into(),
                    needle: "cafe".into(),
                },
            ]);

        assert!(q.matches(&json!({"status": "active", "title": "Corner Cafe"})));
        assert!(q.matches(&json!({"status": "draft", "title": "Shop", "description": "a cafe"})));
        assert!(!q.matches(&json!({"status": "closed", "title": "Corner Cafe"})));
        assert!(!q.matches(&json!({"status": "active", "title": "Gym"})));
    }

    #[test]
    fn apply_sorts_by_field_with_missing_last_and_pages() {
        let docs = vec![
            doc(1, json!({"funding_raised": 10})),
            doc(2, json!({})),
            doc(3, json!({"funding_raised": 30})),
            doc(4, json!({"funding_raised": 20})),
        ];

        let q = DocumentQuery::collection("listings").sort_by("funding_raised", true);
        let seqs: Vec<i64> = q.apply(&docs).iter().map(|d| d.seq).collect();
        assert_eq!(seqs, vec![3, 4, 1, 2]);

        let paged = q.clone().offset(1).limit(2).apply(&docs);
        let seqs: Vec<i64> = paged.iter().map(|d| d.seq).collect();
        assert_eq!(seqs, vec![4, 1]);
    }

    #[test]
    fn apply_orders_by_insertion() {
        let docs = vec![doc(5, json!({})), doc(2, json!({})), doc(9, json!({}))];

        let asc: Vec<i64> = DocumentQuery::collection("listings")
            .apply(&docs)
            .iter()
            .map(|d| d.seq)
            .collect();
        assert_eq!(asc, vec![2, 5, 9]);

        let desc: Vec<i64> = DocumentQuery::collection("listings")
            .newest_first()
            .apply(&docs)
            .iter()
            .map(|d| d.seq)
            .collect();
        assert_eq!(desc, vec![9, 5, 2]);
    }

    #[test]
    fn apply_ignores_other_collections() {
        let mut other = doc(1, json!({}));
        other.collection = "offers".into();
        let docs = vec![other, doc(2, json!({}))];

        let result = DocumentQuery::collection("listings").apply(&docs);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].seq, 2);
    }
}
