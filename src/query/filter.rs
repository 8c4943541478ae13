//! Filter selections and validated filter specs

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::dataset::{Schema, Value};
use crate::error::{QueryError, Result};

/// Raw, unvalidated filter selection as sent by a client
///
/// Maps column name to the allowed values. An empty value list leaves the
/// column unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSelection(BTreeMap<String, Vec<Value>>);

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style constraint on one column
    pub fn with<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.0
            .insert(column.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, values: Vec<Value>) {
        self.0.insert(column.into(), values);
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Value>)> {
        self.0.iter()
    }
}

/// One conjunct of the predicate: `row[position] ∈ allowed`
#[derive(Debug, Clone)]
pub struct FilterClause {
    pub column: String,
    pub position: usize,
    allowed: HashSet<Value>,
}

impl FilterClause {
    fn matches(&self, value: &Value) -> bool {
        self.allowed.contains(value)
    }
}

/// A filter checked against a schema
///
/// Built atomically from a [`FilterSelection`]; there is no way to mutate it
/// afterwards. Values are coerced to each column's type, so `"10"` selects
/// the integer `10` in an integer column. A value that cannot be coerced
/// matches nothing, but its column stays constrained.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    clauses: Vec<FilterClause>,
}

impl FilterSpec {
    /// The match-everything filter
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Validate a selection against a schema
    ///
    /// # Arguments
    /// * `schema` - Schema of the dataset the filter will run against
    /// * `selection` - Raw client selection
    ///
    /// # Returns
    /// * `Result<FilterSpec>` - Validated spec, or `InvalidFilterColumn` for the
    ///   first unknown column (nothing is applied in that case)
    pub fn validate(schema: &Schema, selection: &FilterSelection) -> Result<Self> {
        if let Some(unknown) = selection
            .iter()
            .map(|(column, _)| column)
            .find(|column| schema.position(column).is_none())
        {
            return Err(QueryError::InvalidFilterColumn {
                column: unknown.clone(),
            }
            .into());
        }

        let clauses = selection
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .filter_map(|(column, values)| {
                let position = schema.position(column)?;
                let data_type = schema.column(position).data_type;
                let allowed = values
                    .iter()
                    .filter_map(|v| v.coerce_to(data_type))
                    .collect();
                Some(FilterClause {
                    column: column.clone(),
                    position,
                    allowed,
                })
            })
            .collect();

        Ok(Self { clauses })
    }

    /// Whether a row satisfies every clause
    pub fn matches(&self, row: &[Value]) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.matches(&row[clause.position]))
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_unconstrained(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, DataType};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("region", DataType::Text),
            Column::new("amount", DataType::Int),
        ])
        .unwrap()
    }

    #[test]
    fn test_unknown_column_rejects_everything() {
        let selection = FilterSelection::new()
            .with("region", ["east"])
            .with("regoin", ["west"]);
        let err = FilterSpec::validate(&schema(), &selection).unwrap_err();
        assert!(err.to_string().contains("regoin"));
    }

    #[test]
    fn test_empty_values_unconstrained() {
        let selection = FilterSelection::new().with("region", Vec::<Value>::new());
        let spec = FilterSpec::validate(&schema(), &selection).unwrap();
        assert!(spec.is_unconstrained());
        assert!(selection.is_empty());
    }

    #[test]
    fn test_text_filter_coerced_to_int() {
        let selection = FilterSelection::new().with("amount", ["10"]);
        let spec = FilterSpec::validate(&schema(), &selection).unwrap();
        assert!(spec.matches(&["east".into(), 10.into()]));
        assert!(!spec.matches(&["east".into(), 11.into()]));
    }

    #[test]
    fn test_uncoercible_value_matches_nothing() {
        let selection = FilterSelection::new().with("amount", ["ten"]);
        let spec = FilterSpec::validate(&schema(), &selection).unwrap();
        assert!(!spec.is_unconstrained());
        assert!(!spec.matches(&["east".into(), 10.into()]));
    }

    #[test]
    fn test_selection_json_shape() {
        let selection: FilterSelection =
            serde_json::from_str(r#"{"region": ["east", "west"], "amount": [10]}"#).unwrap();
        let spec = FilterSpec::validate(&schema(), &selection).unwrap();
        assert_eq!(spec.clauses().len(), 2);
        assert!(spec.matches(&["west".into(), 10.into()]));
    }
}
