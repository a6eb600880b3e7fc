//! Local identifier mapping and canonical local identifier derivation
//!
//! A [`LocalIdMap`] is the bijection between the local identifiers a caller
//! used in an execution definition and the canonical identifiers the
//! normalizer assigned. Canonical identifiers are derived from content only:
//! the same display form (or the same measure definition) always yields the
//! same proposal, so two definitions that differ only in cosmetic naming
//! normalize to the same thing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{Attribute, Filter, MeasureDefinition};
use crate::{Error, Result};

/// Bidirectional original ↔ normalized local identifier map.
///
/// Serializes as the normalized → original direction only (`n2oMap` on the
/// wire); the inverse is rebuilt and checked on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct LocalIdMap {
    o2n: BTreeMap<String, String>,
    n2o: BTreeMap<String, String>,
}

impl LocalIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a map from its normalized → original direction.
    ///
    /// Fails when two normalized identifiers point at the same original one.
    pub fn from_n2o(n2o: BTreeMap<String, String>) -> Result<Self> {
        let mut o2n = BTreeMap::new();
        for (normalized, original) in &n2o {
            if o2n.insert(original.clone(), normalized.clone()).is_some() {
                return Err(Error::DuplicateLocalId(original.clone()));
            }
        }
        Ok(LocalIdMap { o2n, n2o })
    }

    /// Map `original` to `proposed`, made unique by appending `_1`, `_2`, ...
    /// when the proposal is already taken. Returns the assigned identifier.
    ///
    /// Collisions happen when the definition contains the same attribute or
    /// measure several times under different local identifiers.
    ///
    /// # Errors
    /// `DuplicateLocalId` if `original` has been registered before.
    pub fn register(&mut self, original: &str, proposed: &str) -> Result<String> {
        if self.o2n.contains_key(original) {
            return Err(Error::DuplicateLocalId(original.to_string()));
        }

        let mut unique = proposed.to_string();
        let mut attempt = 1;
        while self.n2o.contains_key(&unique) {
            unique = format!("{}_{}", proposed, attempt);
            attempt += 1;
        }

        tracing::trace!(original, normalized = %unique, "registered localId mapping");

        self.o2n.insert(original.to_string(), unique.clone());
        self.n2o.insert(unique.clone(), original.to_string());
        Ok(unique)
    }

    pub fn normalized(&self, original: &str) -> Option<&str> {
        self.o2n.get(original).map(String::as_str)
    }

    pub fn original(&self, normalized: &str) -> Option<&str> {
        self.n2o.get(normalized).map(String::as_str)
    }

    /// Normalized counterpart of `original`, or `DanglingReference`
    pub fn require_normalized(&self, original: &str) -> Result<String> {
        self.normalized(original)
            .map(str::to_string)
            .ok_or_else(|| Error::DanglingReference(original.to_string()))
    }

    /// Original counterpart of `normalized`, or `MissingMapping`
    pub fn require_original(&self, normalized: &str) -> Result<String> {
        self.original(normalized)
            .map(str::to_string)
            .ok_or_else(|| Error::MissingMapping(normalized.to_string()))
    }

    pub fn o2n(&self) -> &BTreeMap<String, String> {
        &self.o2n
    }

    pub fn n2o(&self) -> &BTreeMap<String, String> {
        &self.n2o
    }

    pub fn len(&self) -> usize {
        self.n2o.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n2o.is_empty()
    }
}

impl TryFrom<BTreeMap<String, String>> for LocalIdMap {
    type Error = Error;

    fn try_from(n2o: BTreeMap<String, String>) -> Result<Self> {
        LocalIdMap::from_n2o(n2o)
    }
}

impl From<LocalIdMap> for BTreeMap<String, String> {
    fn from(map: LocalIdMap) -> Self {
        map.n2o
    }
}

// ── Canonical identifiers ─────────────────────────────────

/// Canonical local identifier of an attribute: `a_<display form>`
pub fn attribute_local_id(attribute: &Attribute) -> String {
    format!("a_{}", attribute.display_form)
}

/// Canonical local identifier of a measure, derived from its definition only.
///
/// Alias, title and format never contribute, so the result is the same
/// whether or not display decoration is kept.
pub fn measure_local_id(definition: &MeasureDefinition) -> Result<String> {
    let specific = match definition {
        MeasureDefinition::Simple(def) => {
            let mut id = def.item.to_string();
            if let Some(aggregation) = def.aggregation {
                id.push('_');
                id.push_str(aggregation.as_str());
            }
            if def.compute_ratio == Some(true) {
                id.push_str("_ratio");
            }
            if let Some(filters) = def.filters.as_deref().filter(|f| !f.is_empty()) {
                id.push('_');
                id.push_str(&filters_hash(filters)?);
            }
            id
        }
        MeasureDefinition::PoP(def) => {
            format!("{}_{}", def.measure_identifier, def.pop_attribute)
        }
        MeasureDefinition::PreviousPeriod(def) => {
            format!("{}_previous_period", def.measure_identifier)
        }
        MeasureDefinition::Arithmetic(def) => {
            let mut hasher = Sha256::new();
            hasher.update(def.operator.as_str().as_bytes());
            for id in &def.measure_identifiers {
                hasher.update(b"_");
                hasher.update(id.as_bytes());
            }
            short_hex(&hasher.finalize(), 16)
        }
    };

    Ok(format!("m_{}", specific))
}

fn filters_hash(filters: &[Filter]) -> Result<String> {
    let json = serde_json::to_string(filters)?;
    Ok(short_hex(&Sha256::digest(json.as_bytes()), 8))
}

fn short_hex(digest: &[u8], len: usize) -> String {
    let mut hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex.truncate(len);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    #[test]
    fn test_register_appends_suffix_on_collision() {
        let mut map = LocalIdMap::new();
        assert_eq!(map.register("x", "a_attr1").unwrap(), "a_attr1");
        assert_eq!(map.register("y", "a_attr1").unwrap(), "a_attr1_1");
        assert_eq!(map.register("z", "a_attr1").unwrap(), "a_attr1_2");

        assert_eq!(map.normalized("y"), Some("a_attr1_1"));
        assert_eq!(map.original("a_attr1_2"), Some("z"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_register_rejects_duplicate_original() {
        let mut map = LocalIdMap::new();
        map.register("x", "a_attr1").unwrap();
        let err = map.register("x", "a_attr2").unwrap_err();
        assert_eq!(err, Error::DuplicateLocalId("x".into()));
    }

    #[test]
    fn test_require_lookups() {
        let mut map = LocalIdMap::new();
        map.register("x", "a_attr1").unwrap();
        assert_eq!(map.require_normalized("x").unwrap(), "a_attr1");
        assert_eq!(
            map.require_normalized("nope").unwrap_err(),
            Error::DanglingReference("nope".into())
        );
        assert_eq!(
            map.require_original("nope").unwrap_err(),
            Error::MissingMapping("nope".into())
        );
    }

    #[test]
    fn test_serde_uses_n2o_direction() {
        let mut map = LocalIdMap::new();
        map.register("orig", "a_label").unwrap();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, serde_json::json!({"a_label": "orig"}));

        let back: LocalIdMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
        assert_eq!(back.normalized("orig"), Some("a_label"));
    }

    #[test]
    fn test_deserialize_rejects_non_bijective_map() {
        let json = serde_json::json!({"a_1": "orig", "a_2": "orig"});
        let result: std::result::Result<LocalIdMap, _> = serde_json::from_value(json);
        assert!(result.is_err(), "two normalized ids for one original must be rejected");
    }

    #[test]
    fn test_attribute_local_id() {
        let attr = Attribute::new("my_region", ObjRef::identifier("attr1")).with_alias("Region");
        assert_eq!(attribute_local_id(&attr), "a_attr1");

        let by_uri = Attribute::new("x", ObjRef::uri("/gdc/md/p/obj/12"));
        assert_eq!(attribute_local_id(&by_uri), "a_/gdc/md/p/obj/12");
    }

    #[test]
    fn test_simple_measure_local_id() {
        let mut def = SimpleMeasureDefinition::new(ObjRef::identifier("fact.price"));
        assert_eq!(
            measure_local_id(&MeasureDefinition::Simple(def.clone())).unwrap(),
            "m_fact.price"
        );

        def.aggregation = Some(Aggregation::Sum);
        def.compute_ratio = Some(true);
        assert_eq!(
            measure_local_id(&MeasureDefinition::Simple(def.clone())).unwrap(),
            "m_fact.price_sum_ratio"
        );

        def.filters = Some(vec![]);
        assert_eq!(
            measure_local_id(&MeasureDefinition::Simple(def.clone())).unwrap(),
            "m_fact.price_sum_ratio",
            "empty filter list contributes nothing"
        );

        def.filters = Some(vec![Filter::PositiveAttributeFilter(PositiveAttributeFilter {
            display_form: ObjRef::identifier("label.region"),
            in_elements: AttributeElements::Values {
                values: vec![Some("East".into())],
            },
        })]);
        let filtered = measure_local_id(&MeasureDefinition::Simple(def)).unwrap();
        assert!(filtered.starts_with("m_fact.price_sum_ratio_"));
        assert_eq!(filtered.len(), "m_fact.price_sum_ratio_".len() + 8);
    }

    #[test]
    fn test_derived_measure_local_ids() {
        let pop = MeasureDefinition::PoP(PopMeasureDefinition {
            measure_identifier: "m_fact.price".into(),
            pop_attribute: ObjRef::identifier("date.year"),
        });
        assert_eq!(measure_local_id(&pop).unwrap(), "m_m_fact.price_date.year");

        let pp = MeasureDefinition::PreviousPeriod(PreviousPeriodMeasureDefinition {
            measure_identifier: "m_fact.price".into(),
            date_data_sets: vec![PreviousPeriodDateDataSet {
                data_set: ObjRef::identifier("date"),
                periods_ago: 1,
            }],
        });
        assert_eq!(
            measure_local_id(&pp).unwrap(),
            "m_m_fact.price_previous_period"
        );
    }

    #[test]
    fn test_arithmetic_local_id_depends_on_operands_and_operator() {
        let make = |ids: &[&str], operator| {
            measure_local_id(&MeasureDefinition::Arithmetic(ArithmeticMeasureDefinition {
                measure_identifiers: ids.iter().map(|s| s.to_string()).collect(),
                operator,
            }))
            .unwrap()
        };

        let a = make(&["m1", "m2"], ArithmeticOperator::Sum);
        assert_eq!(a, make(&["m1", "m2"], ArithmeticOperator::Sum));
        assert_ne!(a, make(&["m2", "m1"], ArithmeticOperator::Sum));
        assert_ne!(a, make(&["m1", "m2"], ArithmeticOperator::Ratio));
        assert_eq!(a.len(), 2 + 16);
    }
}
