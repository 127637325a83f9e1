// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Row filters shared by the REST and in-memory backends.
//!
//! A [`Query`] renders to PostgREST query parameters for the hosted database,
//! and is evaluated directly against JSON rows by the in-memory backend.

use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Eq(String, String),
    In(String, Vec<String>),
    IsNull(String),
}

/// A table selection: filters, ordering and an optional row limit.
#[derive(Debug, Clone)]
pub struct Query {
    table: &'static str,
    filters: Vec<Filter>,
    order: Vec<(String, bool)>,
    limit: Option<usize>,
}

impl Query {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn table_name(&self) -> &'static str {
        self.table
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Eq(column.to_string(), value.to_string()));
        self
    }

    pub fn in_list<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render as PostgREST query parameters (`col=eq.v`, `order=col.asc`, ...).
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|f| match f {
                Filter::Eq(col, v) => (col.clone(), format!("eq.{}", v)),
                Filter::In(col, vs) => {
                    let quoted: Vec<String> = vs
                        .iter()
                        .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
                        .collect();
                    (col.clone(), format!("in.({})", quoted.join(",")))
                }
                Filter::IsNull(col) => (col.clone(), "is.null".to_string()),
            })
            .collect();

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(col, asc)| format!("{}.{}", col, if *asc { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    /// Whether a JSON row satisfies every filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| match f {
            Filter::Eq(col, v) => row.get(col).is_some_and(|cell| cell_text(cell) == *v),
            Filter::In(col, vs) => row
                .get(col)
                .is_some_and(|cell| vs.contains(&cell_text(cell))),
            Filter::IsNull(col) => row.get(col).map_or(true, Value::is_null),
        })
    }

    /// Filter, sort and truncate a set of rows the way the database would.
    pub fn apply(&self, rows: &[Value]) -> Vec<Value> {
        let mut selected: Vec<Value> = rows.iter().filter(|r| self.matches(r)).cloned().collect();

        if !self.order.is_empty() {
            selected.sort_by(|a, b| {
                self.order
                    .iter()
                    .map(|(col, asc)| {
                        let ord = compare_cells(a.get(col), b.get(col));
                        if *asc {
                            ord
                        } else {
                            ord.reverse()
                        }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Text form of a cell, as PostgREST compares filter values.
fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Nulls sort last, numbers numerically, everything else by text.
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => cell_text(x).cmp(&cell_text(y)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_render_postgrest_syntax() {
        let q = Query::table("videos")
            .eq("module_id", "m1")
            .in_list("id", ["a", "b"])
            .is_null("deleted_at")
            .order("sort_order", true)
            .limit(10);

        let params = q.to_params();
        assert_eq!(
            params,
            vec![
                ("module_id".to_string(), "eq.m1".to_string()),
                ("id".to_string(), "in.(\"a\",\"b\")".to_string()),
                ("deleted_at".to_string(), "is.null".to_string()),
                ("order".to_string(), "sort_order.asc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_matches_bool_and_number_cells() {
        let row = json!({"published": true, "sort_order": 3, "note": null});
        assert!(Query::table("t").eq("published", true).matches(&row));
        assert!(Query::table("t").eq("sort_order", 3).matches(&row));
        assert!(Query::table("t").is_null("note").matches(&row));
        assert!(Query::table("t").is_null("missing").matches(&row));
        assert!(!Query::table("t").eq("published", false).matches(&row));
    }

    #[test]
    fn test_apply_orders_with_nulls_last() {
        let rows = vec![
            json!({"id": "c", "n": null}),
            json!({"id": "a", "n": 2}),
            json!({"id": "b", "n": 1}),
        ];
        let out = Query::table("t").order("n", true).apply(&rows);
        let ids: Vec<&str> = out.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let out = Query::table("t").order("n", false).limit(1).apply(&rows);
        assert_eq!(out[0]["id"], "c");
    }
}
