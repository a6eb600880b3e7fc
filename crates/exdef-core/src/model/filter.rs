//! Filters applied to an execution or to a single simple measure

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ObjRef, ObjRefInScope};

/// Attribute elements, listed either by uri or by textual value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeElements {
    Uris { uris: Vec<Option<String>> },
    Values { values: Vec<Option<String>> },
}

impl AttributeElements {
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeElements::Uris { uris } => uris.is_empty(),
            AttributeElements::Values { values } => values.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositiveAttributeFilter {
    pub display_form: ObjRef,
    #[serde(rename = "in")]
    pub in_elements: AttributeElements,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeAttributeFilter {
    pub display_form: ObjRef,
    pub not_in: AttributeElements,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsoluteDateFilter {
    pub data_set: ObjRef,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelativeDateFilter {
    pub data_set: ObjRef,
    pub granularity: String,
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonOperator {
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    EqualTo,
    NotEqualTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RangeOperator {
    Between,
    NotBetween,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonCondition {
    pub operator: ComparisonOperator,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treat_null_values_as: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeCondition {
    pub operator: RangeOperator,
    pub from: f64,
    pub to: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treat_null_values_as: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasureValueFilterCondition {
    Comparison(ComparisonCondition),
    Range(RangeCondition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureValueFilter {
    pub measure: ObjRefInScope,
    /// Absent condition makes the filter a no-op
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<MeasureValueFilterCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RankingOperator {
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingFilter {
    pub measure: ObjRefInScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<ObjRefInScope>>,
    pub operator: RankingOperator,
    pub value: u32,
}

/// Execution or measure filter.
///
/// Kinds without a typed variant are kept as [`Filter::Other`] and pass
/// through normalization untouched; they never carry local references.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    PositiveAttributeFilter(PositiveAttributeFilter),
    NegativeAttributeFilter(NegativeAttributeFilter),
    AbsoluteDateFilter(AbsoluteDateFilter),
    RelativeDateFilter(RelativeDateFilter),
    MeasureValueFilter(MeasureValueFilter),
    RankingFilter(RankingFilter),
    #[serde(untagged)]
    Other(Value),
}

// A known tag with a malformed body is an error; an unknown tag is opaque.
impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let typed = match &value {
            Value::Object(map) if map.len() == 1 => match map.iter().next() {
                Some((tag, body)) => typed_filter(tag, body).map_err(de::Error::custom)?,
                None => None,
            },
            Value::Object(_) => None,
            _ => return Err(de::Error::custom("filter must be a JSON object")),
        };
        Ok(typed.unwrap_or(Filter::Other(value)))
    }
}

/// `None` for tags without a typed variant
fn typed_filter(tag: &str, body: &Value) -> serde_json::Result<Option<Filter>> {
    let filter = match tag {
        "positiveAttributeFilter" => {
            Filter::PositiveAttributeFilter(serde_json::from_value(body.clone())?)
        }
        "negativeAttributeFilter" => {
            Filter::NegativeAttributeFilter(serde_json::from_value(body.clone())?)
        }
        "absoluteDateFilter" => Filter::AbsoluteDateFilter(serde_json::from_value(body.clone())?),
        "relativeDateFilter" => Filter::RelativeDateFilter(serde_json::from_value(body.clone())?),
        "measureValueFilter" => Filter::MeasureValueFilter(serde_json::from_value(body.clone())?),
        "rankingFilter" => Filter::RankingFilter(serde_json::from_value(body.clone())?),
        _ => return Ok(None),
    };
    Ok(Some(filter))
}

impl Filter {
    /// Negative attribute filter with nothing to exclude
    pub fn is_empty_negative_attribute_filter(&self) -> bool {
        matches!(self, Filter::NegativeAttributeFilter(f) if f.not_in.is_empty())
    }

    /// True for filters that have no effect on the computation.
    ///
    /// An empty *positive* attribute filter is not a no-op: it selects nothing.
    pub fn is_noop(&self) -> bool {
        match self {
            Filter::NegativeAttributeFilter(f) => f.not_in.is_empty(),
            Filter::MeasureValueFilter(f) => f.condition.is_none(),
            _ => false,
        }
    }

    /// Local identifiers this filter references
    pub fn local_id_references(&self) -> Vec<&str> {
        match self {
            Filter::MeasureValueFilter(f) => f.measure.local_id().into_iter().collect(),
            Filter::RankingFilter(f) => {
                let mut refs: Vec<&str> = f.measure.local_id().into_iter().collect();
                if let Some(attributes) = &f.attributes {
                    refs.extend(attributes.iter().filter_map(ObjRefInScope::local_id));
                }
                refs
            }
            _ => Vec::new(),
        }
    }
}
