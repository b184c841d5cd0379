use std::fmt;

use crate::core::{Result, StoreError, Value};

/// Named parameter bindings, in binding order.
pub type Params = Vec<(String, Value)>;

/// Conjunction of condition fragments with their named parameters.
///
/// Parameter names are unique across every fragment; a fragment whose
/// parameters collide with earlier ones is rejected as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<String>,
    params: Params,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: impl Into<String>, params: Params) -> Result<()> {
        let mut conflicts: Vec<String> = Vec::new();
        for (i, (name, _)) in params.iter().enumerate() {
            let seen_before = self.param(name).is_some() || params[..i].iter().any(|(n, _)| n == name);
            if seen_before && !conflicts.contains(name) {
                conflicts.push(name.clone());
            }
        }
        if !conflicts.is_empty() {
            return Err(StoreError::ParameterConflict(conflicts));
        }

        self.conditions.push(condition.into());
        self.params.extend(params);
        Ok(())
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "TRUE");
        }
        let parts: Vec<String> = self.conditions.iter().map(|c| format!("({})", c)).collect();
        write!(f, "{}", parts.join(" AND "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// Everything a backend needs to run a read.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub filter: Filter,
    pub order: Vec<OrderBy>,
    pub columns: Option<Vec<String>>,
    pub limit: usize,
}

/// Builds a [`Params`] list from `name => value` pairs.
///
/// ```
/// use tablestore::{params, Value};
///
/// let params = params! { "username" => "alice", "active" => true };
/// assert_eq!(params[1], ("active".to_string(), Value::Boolean(true)));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        vec![$((::std::string::String::from($name), $crate::Value::from($value))),+]
    };
}
