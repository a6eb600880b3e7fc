//! Result denormalizer
//!
//! A backend computes results for the *normalized* definition, so every
//! local identifier in its dimension descriptors and headers is a canonical
//! one and all display decoration is missing. The [`Denormalizer`] maps the
//! identifiers back and restores alias, title and format from the original
//! definition, so the caller sees results as if the original definition had
//! been executed.
//!
//! # Measure format priority
//!
//! 1. format declared on the measure itself
//! 2. format declared on its master (PoP and previous-period measures)
//! 3. format resolved for the master within the same measure group
//! 4. format reported by the backend for the measure
//!
//! Derived measures carry no format by default; tier 3 lets them inherit the
//! master's *resolved* format, not just a declared one.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::*;
use crate::normalizer::NormalizationState;
use crate::rewire;
use crate::{Error, Result};

pub struct Denormalizer<'a> {
    state: &'a NormalizationState,
    attributes: BTreeMap<&'a str, &'a Attribute>,
    measures: BTreeMap<&'a str, &'a Measure>,
}

impl<'a> From<&'a NormalizationState> for Denormalizer<'a> {
    fn from(state: &'a NormalizationState) -> Self {
        Denormalizer::new(state)
    }
}

impl<'a> Denormalizer<'a> {
    pub fn new(state: &'a NormalizationState) -> Self {
        let original = state.original();

        let mut attributes = BTreeMap::new();
        for attribute in &original.attributes {
            attributes
                .entry(attribute.local_identifier.as_str())
                .or_insert(attribute);
        }
        let mut measures = BTreeMap::new();
        for measure in &original.measures {
            measures
                .entry(measure.local_identifier.as_str())
                .or_insert(measure);
        }

        Denormalizer {
            state,
            attributes,
            measures,
        }
    }

    pub fn state(&self) -> &NormalizationState {
        self.state
    }

    // ── Dimension descriptors ──────────────────────────────

    /// Restore original local ids, names and formats in dimension descriptors.
    ///
    /// # Errors
    /// `MissingMapping` if a descriptor carries an identifier the normalization
    /// never produced, `Inconsistent` if the mapped entity is not in the
    /// original definition.
    pub fn denormalize_dim_descriptors(
        &self,
        dimensions: &[DimensionDescriptor],
    ) -> Result<Vec<DimensionDescriptor>> {
        dimensions
            .iter()
            .map(|dimension| {
                let headers = dimension
                    .headers
                    .iter()
                    .map(|header| match header {
                        DimensionItemDescriptor::Attribute(attribute) => self
                            .denormalize_attribute_descriptor(attribute)
                            .map(DimensionItemDescriptor::Attribute),
                        DimensionItemDescriptor::MeasureGroup(group) => self
                            .denormalize_measure_group(group)
                            .map(DimensionItemDescriptor::MeasureGroup),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(DimensionDescriptor { headers })
            })
            .collect()
    }

    fn denormalize_attribute_descriptor(
        &self,
        descriptor: &AttributeDescriptor,
    ) -> Result<AttributeDescriptor> {
        let local_id = self.original_local_id(&descriptor.local_identifier)?;
        let attribute = self.attributes.get(local_id.as_str()).ok_or_else(|| {
            Error::Inconsistent(format!(
                "attribute '{}' is not part of the original definition",
                local_id
            ))
        })?;

        Ok(AttributeDescriptor {
            name: attribute
                .alias
                .clone()
                .unwrap_or_else(|| descriptor.name.clone()),
            local_identifier: local_id,
            ..descriptor.clone()
        })
    }

    fn denormalize_measure_group(
        &self,
        group: &MeasureGroupDescriptor,
    ) -> Result<MeasureGroupDescriptor> {
        let mut originals = Vec::with_capacity(group.items.len());
        let mut backend_formats = BTreeMap::new();

        for item in &group.items {
            let header = &item.measure_header_item;
            let local_id = self.original_local_id(&header.local_identifier)?;
            let measure = *self.measures.get(local_id.as_str()).ok_or_else(|| {
                Error::Inconsistent(format!(
                    "measure '{}' is not part of the original definition",
                    local_id
                ))
            })?;
            backend_formats.insert(local_id.clone(), header.format.clone());
            originals.push((local_id, measure));
        }

        let mut formats = FormatResolver {
            measures: &self.measures,
            backend: backend_formats,
            resolved: BTreeMap::new(),
            visiting: BTreeSet::new(),
        };

        let items = group
            .items
            .iter()
            .zip(originals)
            .map(|(item, (local_id, measure))| {
                let header = &item.measure_header_item;
                let format = formats
                    .resolve(&local_id)
                    .unwrap_or_else(|| header.format.clone());

                MeasureDescriptor {
                    measure_header_item: MeasureDescriptorItem {
                        local_identifier: local_id,
                        name: measure_display_name(measure, &header.name),
                        format,
                        ..header.clone()
                    },
                }
            })
            .collect();

        Ok(MeasureGroupDescriptor {
            items,
            total_items: group.total_items.clone(),
        })
    }

    // ── Result headers ─────────────────────────────────────

    /// Replace measure header names by alias or title of the original measure.
    ///
    /// Header names are not always local identifiers; names without a mapping
    /// pass through unchanged.
    pub fn denormalize_headers(&self, headers: &ResultHeaders) -> ResultHeaders {
        headers
            .iter()
            .map(|dimension| {
                dimension
                    .iter()
                    .map(|group| {
                        group
                            .iter()
                            .map(|h| self.denormalize_header(h))
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn denormalize_header(&self, header: &ResultHeader) -> ResultHeader {
        match header {
            ResultHeader::MeasureHeaderItem(item) => {
                ResultHeader::MeasureHeaderItem(ResultMeasureHeaderItem {
                    name: self.original_measure_title(&item.name),
                    order: item.order,
                })
            }
            other => other.clone(),
        }
    }

    fn original_measure_title(&self, name: &str) -> String {
        let measure = self
            .state
            .id_map()
            .original(name)
            .and_then(|local_id| self.measures.get(local_id));

        match measure {
            Some(measure) => measure_display_name(measure, name),
            None => {
                tracing::trace!(name, "measure header name has no mapping, passed through");
                name.to_string()
            }
        }
    }

    // ── Definitions ────────────────────────────────────────

    /// Map a normalized definition back to original local ids and restore
    /// display decoration from the original definition.
    ///
    /// Filters dropped as no-ops during normalization are not restored.
    pub fn denormalize_definition(
        &self,
        normalized: &ExecutionDefinition,
    ) -> Result<ExecutionDefinition> {
        let ids = self.state.id_map();
        let strict = |id: &str| ids.require_original(id);

        let mut def = normalized.clone();

        for attribute in def.attributes.iter_mut() {
            self.restore_attribute(attribute)?;
        }
        for measure in def.measures.iter_mut() {
            self.restore_measure(measure)?;
        }

        rewire::rewire_filters(&mut def.filters, &strict)?;
        rewire::rewire_sorts(&mut def.sort_by, &strict)?;
        rewire::rewire_dimensions(&mut def.dimensions, &strict)?;

        let lenient = |id: &str| ids.original(id).map(str::to_string);
        rewire::rewire_bucket_totals(&mut def.buckets, &lenient);

        for item in def.buckets.iter_mut().flat_map(|b| b.items.iter_mut()) {
            let restored = match item {
                BucketItem::Attribute(attribute) => self.restore_attribute(attribute),
                BucketItem::Measure(measure) => self.restore_measure(measure),
            };
            if let Err(err) = restored {
                tracing::warn!(error = %err, "bucket item kept as is");
            }
        }

        Ok(def)
    }

    fn restore_attribute(&self, attribute: &mut Attribute) -> Result<()> {
        let local_id = self.original_local_id(&attribute.local_identifier)?;
        if let Some(original) = self.attributes.get(local_id.as_str()) {
            attribute.alias = original.alias.clone();
        }
        attribute.local_identifier = local_id;
        Ok(())
    }

    fn restore_measure(&self, measure: &mut Measure) -> Result<()> {
        let ids = self.state.id_map();
        let local_id = self.original_local_id(&measure.local_identifier)?;

        match &mut measure.definition {
            MeasureDefinition::Simple(_) => {}
            MeasureDefinition::PoP(def) => {
                def.measure_identifier = ids.require_original(&def.measure_identifier)?;
            }
            MeasureDefinition::PreviousPeriod(def) => {
                def.measure_identifier = ids.require_original(&def.measure_identifier)?;
            }
            MeasureDefinition::Arithmetic(def) => {
                for operand in def.measure_identifiers.iter_mut() {
                    *operand = ids.require_original(operand)?;
                }
            }
        }

        if let Some(original) = self.measures.get(local_id.as_str()) {
            measure.alias = original.alias.clone();
            measure.title = original.title.clone();
            measure.format = original.format.clone();
        }
        measure.local_identifier = local_id;
        Ok(())
    }

    fn original_local_id(&self, normalized: &str) -> Result<String> {
        self.state.id_map().require_original(normalized)
    }
}

fn measure_display_name(measure: &Measure, fallback: &str) -> String {
    measure
        .alias
        .as_deref()
        .or(measure.title.as_deref())
        .unwrap_or(fallback)
        .to_string()
}

/// Measure format resolution within one measure group, keyed by original local id
struct FormatResolver<'d> {
    measures: &'d BTreeMap<&'d str, &'d Measure>,
    backend: BTreeMap<String, String>,
    resolved: BTreeMap<String, String>,
    visiting: BTreeSet<String>,
}

impl FormatResolver<'_> {
    /// `None` when the measure is not part of the group
    fn resolve(&mut self, local_id: &str) -> Option<String> {
        if let Some(format) = self.resolved.get(local_id) {
            return Some(format.clone());
        }
        let backend = self.backend.get(local_id)?.clone();
        let measure = self.measures.get(local_id).copied();

        // a recorded state may contain master cycles
        if !self.visiting.insert(local_id.to_string()) {
            return Some(backend);
        }

        let mut format = measure.and_then(|m| m.format.clone());

        if format.is_none() {
            if let Some(master_id) = measure.and_then(Measure::master_identifier) {
                format = self
                    .measures
                    .get(master_id)
                    .and_then(|master| master.format.clone());
                if format.is_none() {
                    format = self.resolve(master_id);
                }
            }
        }

        let format = format.unwrap_or(backend);
        self.visiting.remove(local_id);
        self.resolved.insert(local_id.to_string(), format.clone());
        Some(format)
    }
}
