//! Result metadata returned by a backend: dimension descriptors and headers

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ObjRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalDescriptorItem {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalDescriptor {
    pub total_header_item: TotalDescriptorItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureDescriptorItem {
    pub local_identifier: String,
    pub name: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub obj_ref: Option<ObjRef>,
    /// Backend fields without a typed counterpart, passed through as is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureDescriptor {
    pub measure_header_item: MeasureDescriptorItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureGroupDescriptor {
    pub items: Vec<MeasureDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<Vec<TotalDescriptor>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeHeaderFormOf {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub obj_ref: Option<ObjRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    pub local_identifier: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub obj_ref: Option<ObjRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<Vec<TotalDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_of: Option<AttributeHeaderFormOf>,
    /// Backend fields without a typed counterpart (granularity, format ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a dimension: an attribute, or the group of all measures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimensionItemDescriptor {
    #[serde(rename = "attributeHeader")]
    Attribute(AttributeDescriptor),
    #[serde(rename = "measureGroupHeader")]
    MeasureGroup(MeasureGroupDescriptor),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionDescriptor {
    pub headers: Vec<DimensionItemDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultAttributeHeaderItem {
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMeasureHeaderItem {
    pub name: String,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultTotalHeaderItem {
    pub name: String,
    #[serde(rename = "type")]
    pub total_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure_index: Option<u32>,
}

/// Label of one row / column position of a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultHeader {
    AttributeHeaderItem(ResultAttributeHeaderItem),
    MeasureHeaderItem(ResultMeasureHeaderItem),
    TotalHeaderItem(ResultTotalHeaderItem),
}

/// Headers of a whole result: per dimension, per header group, per position
pub type ResultHeaders = Vec<Vec<Vec<ResultHeader>>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_descriptor_wire_shape() {
        let json = r##"{
            "headers": [
                {"attributeHeader": {"localIdentifier": "a_label.region", "name": "Region"}},
                {"measureGroupHeader": {"items": [
                    {"measureHeaderItem": {"localIdentifier": "m_fact.price_sum", "name": "Sum of Price", "format": "#,##0"}}
                ]}}
            ]
        }"##;
        let dim: DimensionDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(dim.headers.len(), 2);
        match &dim.headers[1] {
            DimensionItemDescriptor::MeasureGroup(group) => {
                assert_eq!(group.items[0].measure_header_item.format, "#,##0");
            }
            other => panic!("expected measure group, got {:?}", other),
        }
    }

    #[test]
    fn test_descriptor_keeps_untyped_fields() {
        let json = serde_json::json!({
            "localIdentifier": "a_date.year",
            "name": "Year",
            "granularity": "GDC.time.year",
            "format": {"locale": "en-US", "pattern": "y"}
        });
        let descriptor: AttributeDescriptor = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(descriptor.extra["granularity"], "GDC.time.year");
        assert_eq!(serde_json::to_value(&descriptor).unwrap(), json);
    }

    #[test]
    fn test_result_header_wire_shape() {
        let json = r#"[
            {"attributeHeaderItem": {"name": "East", "uri": "/elements?id=1"}},
            {"measureHeaderItem": {"name": "m1", "order": 0}},
            {"totalHeaderItem": {"name": "sum", "type": "sum"}}
        ]"#;
        let headers: Vec<ResultHeader> = serde_json::from_str(json).unwrap();
        assert!(matches!(headers[0], ResultHeader::AttributeHeaderItem(ref h) if h.extra.is_empty()));
        assert!(matches!(headers[1], ResultHeader::MeasureHeaderItem(ref h) if h.order == 0));
        assert!(matches!(headers[2], ResultHeader::TotalHeaderItem(ref t) if t.total_type == "sum"));
    }
}
