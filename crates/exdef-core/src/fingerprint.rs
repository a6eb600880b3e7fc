//! Execution definition fingerprint
//!
//! A quick first-level test whether two definitions lead to the same
//! computation. Two definitions with the same fingerprint are effectively the
//! same; two definitions with different fingerprints *may* still compute the
//! same thing.
//!
//! Disregarded:
//! - local identifiers (a reference contributes the fingerprint of its target)
//! - order of the definition's filters
//! - no-op filters
//! - absent vs. defaulted `filters` / `computeRatio` on simple measures
//!
//! # Pipeline
//!
//! `entity → canonical JSON (sorted keys) → join → SHA-256`

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::*;
use crate::{Error, Result};

/// Hex SHA-256 fingerprint of an execution definition
///
/// # Errors
/// `Inconsistent` for references to unknown local ids or measure cycles.
pub fn def_fingerprint(def: &ExecutionDefinition) -> Result<String> {
    let canonical = Fingerprint::new(def).compute()?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

struct Fingerprint<'a> {
    def: &'a ExecutionDefinition,
    /// fingerprints of attributes and measures by local id
    cache: BTreeMap<String, String>,
    /// local ids whose fingerprint computation has started
    requested: BTreeSet<String>,
}

impl<'a> Fingerprint<'a> {
    fn new(def: &'a ExecutionDefinition) -> Self {
        Fingerprint {
            def,
            cache: BTreeMap::new(),
            requested: BTreeSet::new(),
        }
    }

    fn compute(&mut self) -> Result<String> {
        let def = self.def;

        let mut filters = def
            .filters
            .iter()
            .map(|f| self.filter(f))
            .collect::<Result<Vec<_>>>()?;
        filters.sort();

        let mut parts = vec![def.workspace.clone()];
        parts.extend(filters);
        for attribute in &def.attributes {
            parts.push(self.attribute(attribute)?);
        }
        for measure in &def.measures {
            parts.push(self.measure(measure)?);
        }
        for sort in &def.sort_by {
            parts.push(self.sort_item(sort)?);
        }
        for dimension in &def.dimensions {
            parts.push(self.dimension(dimension)?);
        }

        parts.retain(|p| !p.is_empty());
        Ok(parts.join("_"))
    }

    // ── Attributes and measures ────────────────────────────

    fn attribute(&mut self, attribute: &Attribute) -> Result<String> {
        if let Some(hit) = self.cache.get(&attribute.local_identifier) {
            return Ok(hit.clone());
        }
        self.prevent_cycles(&attribute.local_identifier)?;

        let mut anonymous = attribute.clone();
        anonymous.local_identifier.clear();
        self.store(&attribute.local_identifier, &anonymous)
    }

    fn measure(&mut self, measure: &Measure) -> Result<String> {
        if let Some(hit) = self.cache.get(&measure.local_identifier) {
            return Ok(hit.clone());
        }
        self.prevent_cycles(&measure.local_identifier)?;

        let mut anonymous = measure.clone();
        anonymous.local_identifier.clear();

        match &mut anonymous.definition {
            MeasureDefinition::Simple(def) => {
                def.filters.get_or_insert_with(Vec::new);
                def.compute_ratio.get_or_insert(false);
            }
            MeasureDefinition::PoP(def) => {
                def.measure_identifier = self.measure_by_id(&def.measure_identifier)?;
            }
            MeasureDefinition::PreviousPeriod(def) => {
                def.measure_identifier = self.measure_by_id(&def.measure_identifier)?;
            }
            MeasureDefinition::Arithmetic(def) => {
                for operand in def.measure_identifiers.iter_mut() {
                    *operand = self.measure_by_id(operand)?;
                }
            }
        }

        self.store(&measure.local_identifier, &anonymous)
    }

    fn attribute_by_id(&mut self, local_id: &str) -> Result<String> {
        let def = self.def;
        let attribute = def.attribute(local_id).ok_or_else(|| {
            Error::Inconsistent(format!(
                "Attribute with localId '{}' not found in the execution definition",
                local_id
            ))
        })?;
        self.attribute(attribute)
    }

    fn measure_by_id(&mut self, local_id: &str) -> Result<String> {
        let def = self.def;
        let measure = def.measure(local_id).ok_or_else(|| {
            Error::Inconsistent(format!(
                "Measure with localId '{}' not found in the execution definition",
                local_id
            ))
        })?;
        self.measure(measure)
    }

    /// Either attribute or measure. Filters, sorts and dimensions may point
    /// at any declared local id, the same set the normalizer accepts.
    fn entity_by_id(&mut self, local_id: &str) -> Result<String> {
        if self.def.attribute(local_id).is_some() {
            self.attribute_by_id(local_id)
        } else if self.def.measure(local_id).is_some() {
            self.measure_by_id(local_id)
        } else {
            Err(Error::Inconsistent(format!(
                "localId '{}' not found in the execution definition",
                local_id
            )))
        }
    }

    // A fingerprint is requested once; later requests are served by the cache.
    fn prevent_cycles(&mut self, local_id: &str) -> Result<()> {
        if !self.requested.insert(local_id.to_string()) {
            return Err(Error::Inconsistent(format!(
                "Cycle detected at localId '{}'",
                local_id
            )));
        }
        Ok(())
    }

    fn store<T: Serialize>(&mut self, local_id: &str, value: &T) -> Result<String> {
        let fingerprint = serialize(value)?;
        self.cache.insert(local_id.to_string(), fingerprint.clone());
        Ok(fingerprint)
    }

    // ── Filters, sorts, dimensions ─────────────────────────

    fn filter(&mut self, filter: &Filter) -> Result<String> {
        if filter.is_noop() {
            return Ok(String::new());
        }

        match filter {
            Filter::MeasureValueFilter(f) => {
                let mut resolved = f.clone();
                if let Some(id) = resolved.measure.local_id_mut() {
                    *id = self.entity_by_id(id)?;
                }
                serialize(&Filter::MeasureValueFilter(resolved))
            }
            Filter::RankingFilter(f) => {
                let mut resolved = f.clone();
                if let Some(id) = resolved.measure.local_id_mut() {
                    *id = self.entity_by_id(id)?;
                }
                for attribute in resolved.attributes.iter_mut().flatten() {
                    if let Some(id) = attribute.local_id_mut() {
                        *id = self.entity_by_id(id)?;
                    }
                }
                serialize(&Filter::RankingFilter(resolved))
            }
            other => serialize(other),
        }
    }

    fn sort_item(&mut self, sort: &SortItem) -> Result<String> {
        let mut resolved = sort.clone();
        match &mut resolved {
            SortItem::AttributeSortItem(item) => {
                item.attribute_identifier = self.entity_by_id(&item.attribute_identifier)?;
            }
            SortItem::MeasureSortItem(item) => {
                for locator in item.locators.iter_mut() {
                    match locator {
                        LocatorItem::AttributeLocatorItem(l) => {
                            l.attribute_identifier = self.entity_by_id(&l.attribute_identifier)?;
                        }
                        LocatorItem::MeasureLocatorItem(l) => {
                            l.measure_identifier = self.entity_by_id(&l.measure_identifier)?;
                        }
                    }
                }
            }
        }
        serialize(&resolved)
    }

    fn dimension(&mut self, dimension: &Dimension) -> Result<String> {
        let mut resolved = dimension.clone();
        for item in resolved.item_identifiers.iter_mut() {
            if item.as_str() != MEASURE_GROUP {
                *item = self.entity_by_id(item)?;
            }
        }
        for total in resolved.totals.iter_mut().flatten() {
            total.attribute_identifier = self.entity_by_id(&total.attribute_identifier)?;
            total.measure_identifier = self.entity_by_id(&total.measure_identifier)?;
        }
        serialize(&resolved)
    }
}

/// Canonical JSON: keys sorted, no whitespace
fn serialize<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&value)?)
}
