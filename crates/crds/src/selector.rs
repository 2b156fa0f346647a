//! Label selectors used by `Grafana` to pick which dashboards it imports.
//!
//! Same shape as the Kubernetes `LabelSelector`, evaluated locally against object labels.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Selector that cannot be evaluated
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// Operator other than In, NotIn, Exists, DoesNotExist
    #[error("unsupported label selector operator '{0}'")]
    UnknownOperator(String),

    /// In or NotIn without values
    #[error("operator '{operator}' on key '{key}' requires at least one value")]
    MissingValues { key: String, operator: String },
}

/// Label selector choosing which dashboards a Grafana imports
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardLabelSelector {
    /// Labels that must all be present with exactly these values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// Set-based requirements, all of which must hold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<LabelSelectorRequirement>>,
}

/// One `matchExpressions` entry
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// Label key
    pub key: String,

    /// One of In, NotIn, Exists, DoesNotExist
    pub operator: String,

    /// Values for In and NotIn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl DashboardLabelSelector {
    /// Selector requiring every given label
    pub fn with_labels<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: Some(
                labels
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            match_expressions: None,
        }
    }

    /// Evaluates the selector. An empty selector matches every object.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> Result<bool, SelectorError> {
        if let Some(match_labels) = &self.match_labels {
            let all = match_labels
                .iter()
                .all(|(key, value)| labels.get(key) == Some(value));
            if !all {
                // Operators are still validated so a bad selector never silently matches later
                for requirement in self.match_expressions.iter().flatten() {
                    requirement.validate()?;
                }
                return Ok(false);
            }
        }

        for requirement in self.match_expressions.iter().flatten() {
            if !requirement.matches(labels)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl LabelSelectorRequirement {
    fn values(&self) -> &[String] {
        self.values.as_deref().unwrap_or_default()
    }

    fn validate(&self) -> Result<(), SelectorError> {
        match self.operator.as_str() {
            "In" | "NotIn" if self.values().is_empty() => Err(SelectorError::MissingValues {
                key: self.key.clone(),
                operator: self.operator.clone(),
            }),
            "In" | "NotIn" | "Exists" | "DoesNotExist" => Ok(()),
            other => Err(SelectorError::UnknownOperator(other.to_string())),
        }
    }

    /// Evaluates the requirement against `labels`
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> Result<bool, SelectorError> {
        self.validate()?;
        let value = labels.get(&self.key);
        Ok(match self.operator.as_str() {
            "In" => value.is_some_and(|v| self.values().contains(v)),
            "NotIn" => value.is_none_or(|v| !self.values().contains(v)),
            "Exists" => value.is_some(),
            _ => value.is_none(),
        })
    }
}

/// True when ANY selector matches. No selectors means nothing is selected.
pub fn matches_any(
    selectors: &[DashboardLabelSelector],
    labels: &BTreeMap<String, String>,
) -> Result<bool, SelectorError> {
    let mut matched = false;
    for selector in selectors {
        matched |= selector.matches(labels)?;
    }
    Ok(matched)
}
