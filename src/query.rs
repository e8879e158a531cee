//! Column-projected, predicate-filtered table scans.
//!
//! A [`ScanRequest`] is rendered either into a polars expression (remote
//! scans, where polars pushes it into the file reader) or into a bound SQL
//! `WHERE` clause (local store reads).

use crate::error::{Result, WrdsError};
use chrono::NaiveDate;
use polars::prelude::{col, lit, Expr};
use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};

/// Typed literal used in predicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    fn to_expr(&self) -> Expr {
        match self {
            Value::Int(v) => lit(*v),
            Value::Float(v) => lit(*v),
            Value::Text(v) => lit(v.clone()),
            Value::Date(v) => lit(*v),
        }
    }

    fn to_sql(&self) -> SqlValue {
        match self {
            Value::Int(v) => SqlValue::Integer(*v),
            Value::Float(v) => SqlValue::Real(*v),
            Value::Text(v) => SqlValue::Text(v.clone()),
            Value::Date(v) => SqlValue::Text(v.format("%Y-%m-%d").to_string()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

/// Row filter on a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Eq(String, Value),
    In(String, Vec<Value>),
    /// Inclusive on both ends
    Between(String, Value, Value),
    IsNotNull(String),
}

impl Predicate {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq(column.to_string(), value.into())
    }

    pub fn is_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn between(column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Predicate::Between(column.to_string(), low.into(), high.into())
    }

    pub fn not_null(column: &str) -> Self {
        Predicate::IsNotNull(column.to_string())
    }

    pub fn column(&self) -> &str {
        match self {
            Predicate::Eq(c, _)
            | Predicate::In(c, _)
            | Predicate::Between(c, _, _)
            | Predicate::IsNotNull(c) => c,
        }
    }

    /// Polars expression for this predicate
    pub fn to_expr(&self) -> Expr {
        match self {
            Predicate::Eq(c, v) => col(c).eq(v.to_expr()),
            Predicate::In(c, values) => values
                .iter()
                .map(|v| col(c).eq(v.to_expr()))
                .reduce(|acc, e| acc.or(e))
                .unwrap_or_else(|| lit(false)),
            Predicate::Between(c, lo, hi) => col(c)
                .gt_eq(lo.to_expr())
                .and(col(c).lt_eq(hi.to_expr())),
            Predicate::IsNotNull(c) => col(c).is_not_null(),
        }
    }

    /// SQL fragment with `?` placeholders, pushing bound values onto `params`
    pub fn to_sql(&self, params: &mut Vec<SqlValue>) -> Result<String> {
        let column = quote_identifier(self.column())?;
        let sql = match self {
            Predicate::Eq(_, v) => {
                params.push(v.to_sql());
                format!("{} = ?", column)
            }
            Predicate::In(_, values) => {
                if values.is_empty() {
                    return Ok("0 = 1".to_string());
                }
                params.extend(values.iter().map(Value::to_sql));
                let placeholders = vec!["?"; values.len()].join(", ");
                format!("{} IN ({})", column, placeholders)
            }
            Predicate::Between(_, lo, hi) => {
                params.push(lo.to_sql());
                params.push(hi.to_sql());
                format!("{} BETWEEN ? AND ?", column)
            }
            Predicate::IsNotNull(_) => format!("{} IS NOT NULL", column),
        };
        Ok(sql)
    }
}

/// Combine predicates into a single conjunction
pub fn conjunction(predicates: &[Predicate]) -> Option<Expr> {
    predicates
        .iter()
        .map(Predicate::to_expr)
        .reduce(|acc, e| acc.and(e))
}

/// Render a `WHERE` clause (empty when there are no predicates)
pub fn where_clause(predicates: &[Predicate], params: &mut Vec<SqlValue>) -> Result<String> {
    if predicates.is_empty() {
        return Ok(String::new());
    }
    let parts = predicates
        .iter()
        .map(|p| p.to_sql(params))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

/// Validate and double-quote a table or column name
pub fn quote_identifier(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(WrdsError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

/// Scan of a remote table: `table` is `schema.table`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub table: String,
    pub columns: Vec<String>,
    pub predicates: Vec<Predicate>,
}

impl ScanRequest {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            predicates: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_binds_values() {
        let mut params = Vec::new();
        let clause = where_clause(
            &[
                Predicate::eq("permno", 10001i64),
                Predicate::is_in("exchcd", [1, 2]),
                Predicate::between(
                    "date",
                    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
                ),
            ],
            &mut params,
        )
        .unwrap();

        assert_eq!(
            clause,
            " WHERE \"permno\" = ? AND \"exchcd\" IN (?, ?) AND \"date\" BETWEEN ? AND ?"
        );
        assert_eq!(params.len(), 5);
        assert_eq!(params[3], SqlValue::Text("2020-01-01".to_string()));
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let mut params = Vec::new();
        let sql = Predicate::In("permno".to_string(), vec![])
            .to_sql(&mut params)
            .unwrap();
        assert_eq!(sql, "0 = 1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_identifier_validation() {
        assert_eq!(quote_identifier("crsp_monthly").unwrap(), "\"crsp_monthly\"");
        assert!(quote_identifier("x; DROP TABLE y").is_err());
        assert!(quote_identifier("1abc").is_err());
        assert!(quote_identifier("").is_err());
    }

    #[test]
    fn test_scan_request_builder() {
        let request = ScanRequest::new("crsp.msf")
            .columns(&["permno", "date"])
            .filter(Predicate::eq("permno", 1i64));
        assert_eq!(request.columns, vec!["permno", "date"]);
        assert_eq!(request.predicates.len(), 1);
        assert!(where_clause(&[], &mut Vec::new()).unwrap().is_empty());
    }
}
