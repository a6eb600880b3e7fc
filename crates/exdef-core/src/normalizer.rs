//! Execution definition normalizer
//!
//! Normalization strips everything the backend does not need to compute a
//! result and rewrites local identifiers to canonical, content-derived ones:
//!
//! - attribute alias
//! - measure alias, title and format
//! - custom-crafted local identifiers
//! - filters that have no effect
//!
//! Two definitions that differ only in these respects normalize to the same
//! value, which makes the normalized definition a good cache key. The
//! [`NormalizationState`] keeps the original definition and the identifier
//! mapping so that results computed for the normalized definition can be
//! translated back (see [`crate::denormalizer`]).
//!
//! # Pipeline
//!
//! `clone → drop no-op filters → attributes → measures (depth-first) →
//! filters → sorts → dimensions → bucket totals`
//!
//! # Guarantees
//!
//! - **Pure**: the caller's definition is never mutated
//! - **Deterministic**: same input always produces the same state
//! - **Idempotent**: normalizing a normalized definition changes nothing
//! - **All-or-nothing**: any integrity failure aborts the whole run

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::local_id::{attribute_local_id, measure_local_id, LocalIdMap};
use crate::model::*;
use crate::rewire;
use crate::{Error, Result};

// ── Public API ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeOptions {
    /// Keep alias, title and format. Local identifiers are normalized regardless.
    #[serde(default)]
    pub keep_removable_properties: bool,
}

/// Outcome of a successful normalization: both definitions and the mapping between them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationState {
    normalized: ExecutionDefinition,
    original: ExecutionDefinition,
    #[serde(rename = "n2oMap")]
    id_map: LocalIdMap,
}

impl NormalizationState {
    /// Assemble a state from parts produced elsewhere, e.g. a recorded backend fixture
    pub fn from_parts(
        original: ExecutionDefinition,
        normalized: ExecutionDefinition,
        id_map: LocalIdMap,
    ) -> Self {
        NormalizationState {
            normalized,
            original,
            id_map,
        }
    }

    pub fn normalized(&self) -> &ExecutionDefinition {
        &self.normalized
    }

    pub fn original(&self) -> &ExecutionDefinition {
        &self.original
    }

    pub fn id_map(&self) -> &LocalIdMap {
        &self.id_map
    }
}

/// Normalize an execution definition
///
/// # Errors
/// - `DuplicateLocalId` if two entities share an original local identifier
/// - `MissingMeasure` if a master / operand measure does not exist
/// - `CircularDependency` if measures depend on each other in a cycle
/// - `DanglingReference` if a filter, sort or dimension points nowhere
pub fn normalize(
    definition: &ExecutionDefinition,
    options: NormalizeOptions,
) -> Result<NormalizationState> {
    Normalizer::normalize(definition, options)
}

// ── Normalizer ─────────────────────────────────────────────

/// Single-use normalization run.
///
/// Measures are processed depth-first over the master / operand graph. Each
/// measure is *unvisited*, *in progress* (on `path`) or *done* (has an entry
/// in `done`); reaching an in-progress measure again is a cycle.
pub struct Normalizer {
    options: NormalizeOptions,
    ids: LocalIdMap,
    measures: Vec<Measure>,
    measure_index: BTreeMap<String, usize>,
    done: Vec<Option<String>>,
    path: Vec<usize>,
}

impl Normalizer {
    pub fn normalize(
        definition: &ExecutionDefinition,
        options: NormalizeOptions,
    ) -> Result<NormalizationState> {
        let _span =
            tracing::debug_span!("normalize", workspace = %definition.workspace).entered();

        let mut normalized = definition.clone();

        let before = normalized.filters.len();
        normalized.filters.retain(|f| !f.is_noop());
        if normalized.filters.len() != before {
            tracing::debug!(
                dropped = before - normalized.filters.len(),
                "dropped no-op filters"
            );
        }

        let mut normalizer = Normalizer::new(std::mem::take(&mut normalized.measures), options);
        normalizer.normalize_attributes(&mut normalized.attributes)?;
        normalizer.normalize_measures()?;

        let Normalizer { ids, measures, .. } = normalizer;
        normalized.measures = measures;

        let strict = |id: &str| ids.require_normalized(id);
        rewire::rewire_filters(&mut normalized.filters, &strict)?;
        rewire::rewire_sorts(&mut normalized.sort_by, &strict)?;
        rewire::rewire_dimensions(&mut normalized.dimensions, &strict)?;

        let lenient = |id: &str| ids.normalized(id).map(str::to_string);
        rewire::rewire_bucket_totals(&mut normalized.buckets, &lenient);
        replace_bucket_items(
            &mut normalized.buckets,
            &normalized.attributes,
            &normalized.measures,
            &ids,
        );

        tracing::debug!(mapped = ids.len(), "normalization finished");

        Ok(NormalizationState {
            normalized,
            original: definition.clone(),
            id_map: ids,
        })
    }

    fn new(measures: Vec<Measure>, options: NormalizeOptions) -> Self {
        let mut measure_index = BTreeMap::new();
        for (idx, measure) in measures.iter().enumerate() {
            // first wins; a later duplicate fails when it registers its mapping
            measure_index
                .entry(measure.local_identifier.clone())
                .or_insert(idx);
        }

        Normalizer {
            options,
            ids: LocalIdMap::new(),
            done: vec![None; measures.len()],
            measures,
            measure_index,
            path: Vec::new(),
        }
    }

    fn normalize_attributes(&mut self, attributes: &mut [Attribute]) -> Result<()> {
        for attribute in attributes.iter_mut() {
            let proposed = attribute_local_id(attribute);
            let normalized = self.ids.register(&attribute.local_identifier, &proposed)?;

            if !self.options.keep_removable_properties {
                attribute.alias = None;
            }
            attribute.local_identifier = normalized;
        }
        Ok(())
    }

    fn normalize_measures(&mut self) -> Result<()> {
        for idx in 0..self.measures.len() {
            self.normalize_measure(idx)?;
        }
        Ok(())
    }

    /// Normalize one measure after all measures it depends on; returns its new local id
    fn normalize_measure(&mut self, idx: usize) -> Result<String> {
        if let Some(normalized) = &self.done[idx] {
            return Ok(normalized.clone());
        }

        let original_id = self.measures[idx].local_identifier.clone();

        if let Some(start) = self.path.iter().position(|i| *i == idx) {
            let mut path: Vec<String> = self.path[start..]
                .iter()
                .map(|i| self.measures[*i].local_identifier.clone())
                .collect();
            path.push(original_id.clone());
            return Err(Error::CircularDependency {
                local_id: original_id,
                path,
            });
        }

        self.path.push(idx);

        let mut definition = self.measures[idx].definition.clone();
        match &mut definition {
            MeasureDefinition::Simple(def) => {
                if let Some(filters) = def.filters.as_mut() {
                    filters.retain(|f| !f.is_empty_negative_attribute_filter());
                }
            }
            MeasureDefinition::PoP(def) => {
                def.measure_identifier =
                    self.resolve_dependency(&def.measure_identifier, &original_id)?;
            }
            MeasureDefinition::PreviousPeriod(def) => {
                def.measure_identifier =
                    self.resolve_dependency(&def.measure_identifier, &original_id)?;
            }
            MeasureDefinition::Arithmetic(def) => {
                let operands = def
                    .measure_identifiers
                    .iter()
                    .map(|operand| self.resolve_dependency(operand, &original_id))
                    .collect::<Result<Vec<_>>>()?;
                def.measure_identifiers = operands;
            }
        }

        let proposed = measure_local_id(&definition)?;
        let normalized = self.ids.register(&original_id, &proposed)?;

        let measure = &mut self.measures[idx];
        measure.definition = definition;
        if !self.options.keep_removable_properties {
            measure.strip_removable_properties();
        }
        measure.local_identifier = normalized.clone();

        tracing::debug!(
            original = %original_id,
            normalized = %normalized,
            kind = measure.definition.kind(),
            "normalized measure"
        );

        self.done[idx] = Some(normalized.clone());
        self.path.pop();

        Ok(normalized)
    }

    fn resolve_dependency(&mut self, referenced: &str, referrer: &str) -> Result<String> {
        let idx = *self
            .measure_index
            .get(referenced)
            .ok_or_else(|| Error::MissingMeasure {
                referenced: referenced.to_string(),
                referrer: referrer.to_string(),
            })?;
        self.normalize_measure(idx)
    }
}

/// Bucket items are copies of definition entities; swap in the normalized
/// counterparts. Items the definition does not know stay as they are.
fn replace_bucket_items(
    buckets: &mut [Bucket],
    attributes: &[Attribute],
    measures: &[Measure],
    ids: &LocalIdMap,
) {
    for item in buckets.iter_mut().flat_map(|b| b.items.iter_mut()) {
        let Some(normalized_id) = ids.normalized(item.local_identifier()) else {
            tracing::warn!(local_id = item.local_identifier(), "bucket item not in definition");
            continue;
        };

        let replacement = match item {
            BucketItem::Attribute(_) => attributes
                .iter()
                .find(|a| a.local_identifier == normalized_id)
                .cloned()
                .map(BucketItem::Attribute),
            BucketItem::Measure(_) => measures
                .iter()
                .find(|m| m.local_identifier == normalized_id)
                .cloned()
                .map(BucketItem::Measure),
        };

        if let Some(replacement) = replacement {
            *item = replacement;
        }
    }
}
