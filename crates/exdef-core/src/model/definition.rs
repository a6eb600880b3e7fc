//! Execution definition: attributes, measures, buckets, sorts, dimensions, totals

use serde::{Deserialize, Serialize};

use super::{Filter, ObjRef, MEASURE_GROUP};

/// The complete description of an analytical query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDefinition {
    pub workspace: String,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub measures: Vec<Measure>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sort_by: Vec<SortItem>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_processing: Option<PostProcessing>,
}

impl ExecutionDefinition {
    pub fn new(workspace: impl Into<String>) -> Self {
        ExecutionDefinition {
            workspace: workspace.into(),
            buckets: Vec::new(),
            attributes: Vec::new(),
            measures: Vec::new(),
            filters: Vec::new(),
            sort_by: Vec::new(),
            dimensions: Vec::new(),
            post_processing: None,
        }
    }

    pub fn attribute(&self, local_id: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.local_identifier == local_id)
    }

    pub fn measure(&self, local_id: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.local_identifier == local_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub local_identifier: String,
    pub display_form: ObjRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Attribute {
    pub fn new(local_identifier: impl Into<String>, display_form: ObjRef) -> Self {
        Attribute {
            local_identifier: local_identifier.into(),
            display_form,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub local_identifier: String,
    pub definition: MeasureDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Measure {
    pub fn new(local_identifier: impl Into<String>, definition: MeasureDefinition) -> Self {
        Measure {
            local_identifier: local_identifier.into(),
            definition,
            alias: None,
            title: None,
            format: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Master measure of a PoP / previous-period measure
    pub fn master_identifier(&self) -> Option<&str> {
        match &self.definition {
            MeasureDefinition::PoP(d) => Some(&d.measure_identifier),
            MeasureDefinition::PreviousPeriod(d) => Some(&d.measure_identifier),
            _ => None,
        }
    }

    /// All measures this measure is computed from, in declaration order
    pub fn dependencies(&self) -> Vec<&str> {
        match &self.definition {
            MeasureDefinition::Simple(_) => Vec::new(),
            MeasureDefinition::PoP(d) => vec![d.measure_identifier.as_str()],
            MeasureDefinition::PreviousPeriod(d) => vec![d.measure_identifier.as_str()],
            MeasureDefinition::Arithmetic(d) => {
                d.measure_identifiers.iter().map(String::as_str).collect()
            }
        }
    }

    /// Display-only decoration present?
    pub fn has_removable_properties(&self) -> bool {
        self.alias.is_some() || self.title.is_some() || self.format.is_some()
    }

    pub fn strip_removable_properties(&mut self) {
        self.alias = None;
        self.title = None;
        self.format = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureDefinition {
    #[serde(rename = "measureDefinition")]
    Simple(SimpleMeasureDefinition),
    #[serde(rename = "popMeasureDefinition")]
    PoP(PopMeasureDefinition),
    #[serde(rename = "previousPeriodMeasure")]
    PreviousPeriod(PreviousPeriodMeasureDefinition),
    #[serde(rename = "arithmeticMeasure")]
    Arithmetic(ArithmeticMeasureDefinition),
}

impl MeasureDefinition {
    pub fn kind(&self) -> &'static str {
        match self {
            MeasureDefinition::Simple(_) => "simple",
            MeasureDefinition::PoP(_) => "pop",
            MeasureDefinition::PreviousPeriod(_) => "previous_period",
            MeasureDefinition::Arithmetic(_) => "arithmetic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Count,
    Avg,
    Min,
    Max,
    Median,
    Runsum,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
            Aggregation::Avg => "avg",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Median => "median",
            Aggregation::Runsum => "runsum",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleMeasureDefinition {
    pub item: ObjRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_ratio: Option<bool>,
}

impl SimpleMeasureDefinition {
    pub fn new(item: ObjRef) -> Self {
        SimpleMeasureDefinition {
            item,
            aggregation: None,
            filters: None,
            compute_ratio: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopMeasureDefinition {
    pub measure_identifier: String,
    pub pop_attribute: ObjRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousPeriodDateDataSet {
    pub data_set: ObjRef,
    pub periods_ago: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousPeriodMeasureDefinition {
    pub measure_identifier: String,
    pub date_data_sets: Vec<PreviousPeriodDateDataSet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOperator {
    Sum,
    Difference,
    Multiplication,
    Ratio,
    Change,
}

impl ArithmeticOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOperator::Sum => "sum",
            ArithmeticOperator::Difference => "difference",
            ArithmeticOperator::Multiplication => "multiplication",
            ArithmeticOperator::Ratio => "ratio",
            ArithmeticOperator::Change => "change",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArithmeticMeasureDefinition {
    pub measure_identifiers: Vec<String>,
    pub operator: ArithmeticOperator,
}

/// Attribute or measure placed in a bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketItem {
    Attribute(Attribute),
    Measure(Measure),
}

impl BucketItem {
    pub fn local_identifier(&self) -> &str {
        match self {
            BucketItem::Attribute(a) => &a.local_identifier,
            BucketItem::Measure(m) => &m.local_identifier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_identifier: Option<String>,
    #[serde(default)]
    pub items: Vec<BucketItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<Vec<Total>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalType {
    Sum,
    Max,
    Min,
    Avg,
    Med,
    Nat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Total {
    #[serde(rename = "type")]
    pub total_type: TotalType,
    pub measure_identifier: String,
    pub attribute_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub item_identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<Vec<Total>>,
}

impl Dimension {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Dimension {
            item_identifiers: items.into_iter().map(Into::into).collect(),
            totals: None,
        }
    }

    /// Item identifiers that are local ids (the measure group marker excluded)
    pub fn local_id_items(&self) -> impl Iterator<Item = &str> {
        self.item_identifiers
            .iter()
            .map(String::as_str)
            .filter(|item| *item != MEASURE_GROUP)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSortItem {
    pub direction: SortDirection,
    pub attribute_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeLocator {
    pub attribute_identifier: String,
    pub element: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureLocator {
    pub measure_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocatorItem {
    AttributeLocatorItem(AttributeLocator),
    MeasureLocatorItem(MeasureLocator),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureSortItem {
    pub direction: SortDirection,
    pub locators: Vec<LocatorItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortItem {
    AttributeSortItem(AttributeSortItem),
    MeasureSortItem(MeasureSortItem),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostProcessing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}
