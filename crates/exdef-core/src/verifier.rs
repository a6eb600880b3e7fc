//! Definition verifier: checks referential integrity before normalization
//!
//! The normalizer stops at the first integrity failure. The verifier walks the
//! whole definition and accumulates every diagnostic instead, giving the
//! author a complete picture.
//!
//! # Verification Phases
//!
//! 1. **Identity**: local ids are unique across attributes and measures
//! 2. **Measure graph**: masters / operands exist, no circular dependencies
//! 3. **References**: filters, sorts, dimensions and totals point at known ids
//! 4. **Lenient spots**: things normalization tolerates but probably should not be there
//!
//! # Guarantees
//!
//! - A definition without error diagnostics normalizes successfully
//! - Warnings never make a definition invalid

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::*;

// ── Verification Result Types ─────────────────────────────

/// Result of definition verification, accumulating every diagnostic
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl VerificationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no errors were found (warnings are OK)
    pub fn is_valid(&self) -> bool {
        !self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .collect()
    }

    fn add_error(&mut self, kind: DiagnosticKind, message: String, location: String) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            kind,
            message,
            location: Some(location),
        });
    }

    fn add_warning(&mut self, kind: DiagnosticKind, message: String, location: String) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            kind,
            message,
            location: Some(location),
        });
    }
}

/// A single verification diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Path into the definition, e.g. `sortBy[1].locators[0]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if let Some(ref location) = self.location {
            write!(f, "{} [{}] at {}: {}", prefix, self.kind, location, self.message)
        } else {
            write!(f, "{} [{}]: {}", prefix, self.kind, self.message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Category of verification issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    DuplicateLocalId,
    MissingMeasure,
    CircularDependency,
    DanglingReference,
    NoOpFilter,
    UnknownBucketReference,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DiagnosticKind::DuplicateLocalId => write!(f, "duplicate"),
            DiagnosticKind::MissingMeasure => write!(f, "missing-measure"),
            DiagnosticKind::CircularDependency => write!(f, "cycle"),
            DiagnosticKind::DanglingReference => write!(f, "dangling"),
            DiagnosticKind::NoOpFilter => write!(f, "no-op"),
            DiagnosticKind::UnknownBucketReference => write!(f, "bucket"),
        }
    }
}

// ── Public API ────────────────────────────────────────────

/// Verify an execution definition for referential integrity.
///
/// Runs all verification phases and returns accumulated diagnostics.
pub fn verify(def: &ExecutionDefinition) -> VerificationResult {
    let mut result = VerificationResult::new();

    let known = verify_unique_local_ids(def, &mut result);
    verify_measure_graph(def, &mut result);
    verify_references(def, &known, &mut result);
    verify_lenient_spots(def, &known, &mut result);

    tracing::debug!(
        errors = result.errors().len(),
        warnings = result.warnings().len(),
        "verification finished"
    );
    result
}

// ── Phase 1: Identity ─────────────────────────────────────

/// Report duplicates; returns every local id the definition declares
fn verify_unique_local_ids<'d>(
    def: &'d ExecutionDefinition,
    result: &mut VerificationResult,
) -> BTreeSet<&'d str> {
    let mut seen = BTreeSet::new();

    let attributes = def
        .attributes
        .iter()
        .enumerate()
        .map(|(i, a)| (a.local_identifier.as_str(), format!("attributes[{}]", i)));
    let measures = def
        .measures
        .iter()
        .enumerate()
        .map(|(i, m)| (m.local_identifier.as_str(), format!("measures[{}]", i)));

    for (local_id, location) in attributes.chain(measures) {
        if !seen.insert(local_id) {
            result.add_error(
                DiagnosticKind::DuplicateLocalId,
                format!("duplicate localId '{}'", local_id),
                location,
            );
        }
    }
    seen
}

// ── Phase 2: Measure graph ────────────────────────────────

fn verify_measure_graph(def: &ExecutionDefinition, result: &mut VerificationResult) {
    let mut index = BTreeMap::new();
    for (i, measure) in def.measures.iter().enumerate() {
        index.entry(measure.local_identifier.as_str()).or_insert(i);
    }

    for (i, measure) in def.measures.iter().enumerate() {
        for dependency in measure.dependencies() {
            if !index.contains_key(dependency) {
                result.add_error(
                    DiagnosticKind::MissingMeasure,
                    format!(
                        "measure '{}' references unknown measure '{}'",
                        measure.local_identifier, dependency
                    ),
                    format!("measures[{}].definition", i),
                );
            }
        }
    }

    let mut walk = CycleWalk {
        def,
        index: &index,
        done: vec![false; def.measures.len()],
        path: Vec::new(),
    };
    for i in 0..def.measures.len() {
        walk.visit(i, result);
    }
}

/// Depth-first walk over master / operand edges; one diagnostic per back edge
struct CycleWalk<'d, 'i> {
    def: &'d ExecutionDefinition,
    index: &'i BTreeMap<&'d str, usize>,
    done: Vec<bool>,
    path: Vec<usize>,
}

impl CycleWalk<'_, '_> {
    fn visit(&mut self, idx: usize, result: &mut VerificationResult) {
        if self.done[idx] {
            return;
        }
        if let Some(start) = self.path.iter().position(|i| *i == idx) {
            let cycle: Vec<&str> = self.path[start..]
                .iter()
                .chain(std::iter::once(&idx))
                .map(|i| self.def.measures[*i].local_identifier.as_str())
                .collect();
            result.add_error(
                DiagnosticKind::CircularDependency,
                format!("circular measure dependency: {}", cycle.join(" -> ")),
                format!("measures[{}]", idx),
            );
            return;
        }

        let (def, index) = (self.def, self.index);
        self.path.push(idx);
        for dependency in def.measures[idx].dependencies() {
            if let Some(next) = index.get(dependency) {
                self.visit(*next, result);
            }
        }
        self.path.pop();
        self.done[idx] = true;
    }
}

// ── Phase 3: References ───────────────────────────────────

fn verify_references(
    def: &ExecutionDefinition,
    known: &BTreeSet<&str>,
    result: &mut VerificationResult,
) {
    let mut check = |local_id: &str, location: String| {
        if !known.contains(local_id) {
            result.add_error(
                DiagnosticKind::DanglingReference,
                format!("reference to unknown localId '{}'", local_id),
                location,
            );
        }
    };

    // no-op filters are dropped before their references matter
    for (i, filter) in def.filters.iter().enumerate() {
        if filter.is_noop() {
            continue;
        }
        for local_id in filter.local_id_references() {
            check(local_id, format!("filters[{}]", i));
        }
    }

    for (i, sort) in def.sort_by.iter().enumerate() {
        match sort {
            SortItem::AttributeSortItem(item) => {
                check(item.attribute_identifier.as_str(), format!("sortBy[{}]", i));
            }
            SortItem::MeasureSortItem(item) => {
                for (j, locator) in item.locators.iter().enumerate() {
                    let local_id = match locator {
                        LocatorItem::AttributeLocatorItem(l) => &l.attribute_identifier,
                        LocatorItem::MeasureLocatorItem(l) => &l.measure_identifier,
                    };
                    check(local_id.as_str(), format!("sortBy[{}].locators[{}]", i, j));
                }
            }
        }
    }

    for (i, dimension) in def.dimensions.iter().enumerate() {
        for local_id in dimension.local_id_items() {
            check(local_id, format!("dimensions[{}].itemIdentifiers", i));
        }
        for (j, total) in dimension.totals.iter().flatten().enumerate() {
            let location = format!("dimensions[{}].totals[{}]", i, j);
            check(total.attribute_identifier.as_str(), location.clone());
            check(total.measure_identifier.as_str(), location);
        }
    }
}

// ── Phase 4: Lenient spots ────────────────────────────────

fn verify_lenient_spots(
    def: &ExecutionDefinition,
    known: &BTreeSet<&str>,
    result: &mut VerificationResult,
) {
    for (i, filter) in def.filters.iter().enumerate() {
        if filter.is_noop() {
            result.add_warning(
                DiagnosticKind::NoOpFilter,
                "filter has no effect and will be dropped".to_string(),
                format!("filters[{}]", i),
            );
        }
    }

    for (i, bucket) in def.buckets.iter().enumerate() {
        for (j, item) in bucket.items.iter().enumerate() {
            if !known.contains(item.local_identifier()) {
                result.add_warning(
                    DiagnosticKind::UnknownBucketReference,
                    format!(
                        "bucket item '{}' is not part of the definition",
                        item.local_identifier()
                    ),
                    format!("buckets[{}].items[{}]", i, j),
                );
            }
        }
        for (j, total) in bucket.totals.iter().flatten().enumerate() {
            for local_id in [&total.attribute_identifier, &total.measure_identifier] {
                if !known.contains(local_id.as_str()) {
                    result.add_warning(
                        DiagnosticKind::UnknownBucketReference,
                        format!("bucket total references unknown localId '{}'", local_id),
                        format!("buckets[{}].totals[{}]", i, j),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{normalize, NormalizeOptions};
    use crate::test_fixtures::*;

    fn kinds(result: &VerificationResult) -> Vec<DiagnosticKind> {
        result.errors().iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_valid_sample_definition() {
        let result = verify(&sample_definition());
        assert!(result.is_valid(), "unexpected errors: {:?}", result.errors());
        assert_eq!(result.warnings().len(), 2, "two no-op filters expected");
        assert!(result
            .warnings()
            .iter()
            .all(|d| d.kind == DiagnosticKind::NoOpFilter));
    }

    #[test]
    fn test_empty_definition_is_valid() {
        let result = verify(&ExecutionDefinition::new("ws"));
        assert!(result.is_valid());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_duplicate_local_id_across_kinds() {
        let mut def = ExecutionDefinition::new("ws");
        def.attributes = vec![attr("x", "label.region")];
        def.measures = vec![sum("x", "fact.amount")];
        let result = verify(&def);
        assert_eq!(kinds(&result), vec![DiagnosticKind::DuplicateLocalId]);
        assert_eq!(result.errors()[0].location.as_deref(), Some("measures[0]"));
    }

    #[test]
    fn test_missing_master_reported() {
        let mut def = ExecutionDefinition::new("ws");
        def.measures = vec![pop("ly", "ghost", "date.year")];
        let result = verify(&def);
        assert_eq!(kinds(&result), vec![DiagnosticKind::MissingMeasure]);
        assert!(result.errors()[0].message.contains("ghost"));
    }

    #[test]
    fn test_cycle_reported_once() {
        let mut def = ExecutionDefinition::new("ws");
        def.measures = vec![
            arithmetic("A", &["B"], ArithmeticOperator::Sum),
            pop("B", "A", "date.year"),
        ];
        let result = verify(&def);
        assert_eq!(kinds(&result), vec![DiagnosticKind::CircularDependency]);
        assert!(
            result.errors()[0].message.contains("A -> B -> A"),
            "message: {}",
            result.errors()[0].message
        );
    }

    #[test]
    fn test_shared_master_is_not_a_cycle() {
        let mut def = ExecutionDefinition::new("ws");
        def.measures = vec![
            pop("ly", "base", "date.year"),
            previous_period("pp", "base"),
            arithmetic("diff", &["ly", "pp"], ArithmeticOperator::Difference),
            sum("base", "fact.amount"),
        ];
        assert!(verify(&def).is_valid());
    }

    #[test]
    fn test_all_dangling_references_accumulated() {
        let mut def = ExecutionDefinition::new("ws");
        def.attributes = vec![attr("a1", "label.region")];
        def.measures = vec![sum("m1", "fact.amount")];
        def.filters = vec![
            measure_value_filter("m_gone", Some(1.0)),
            // no-op: its reference is never checked
            measure_value_filter("m_never", None),
        ];
        def.sort_by = vec![measure_sort(vec![
            attribute_locator("a_gone", "x"),
            measure_locator("m1"),
        ])];
        def.dimensions = vec![Dimension {
            item_identifiers: vec!["a1".into(), "a_missing".into(), MEASURE_GROUP.into()],
            totals: Some(vec![total(TotalType::Sum, "m1", "a_total")]),
        }];

        let result = verify(&def);
        let locations: Vec<&str> = result
            .errors()
            .iter()
            .filter_map(|d| d.location.as_deref())
            .collect();
        assert_eq!(
            locations,
            vec![
                "filters[0]",
                "sortBy[0].locators[0]",
                "dimensions[0].itemIdentifiers",
                "dimensions[0].totals[0]",
            ]
        );
        assert!(kinds(&result)
            .iter()
            .all(|k| *k == DiagnosticKind::DanglingReference));
    }

    #[test]
    fn test_bucket_problems_are_warnings() {
        let mut def = ExecutionDefinition::new("ws");
        def.attributes = vec![attr("a1", "label.region")];
        def.buckets = vec![Bucket {
            local_identifier: None,
            items: vec![BucketItem::Measure(sum("m_stray", "fact.amount"))],
            totals: Some(vec![total(TotalType::Sum, "m_gone", "a1")]),
        }];

        let result = verify(&def);
        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 2);
        assert!(result
            .warnings()
            .iter()
            .all(|d| d.kind == DiagnosticKind::UnknownBucketReference));
    }

    #[test]
    fn test_valid_definition_normalizes() {
        let mut def = sample_definition();
        def.buckets[1].totals = Some(vec![total(TotalType::Max, "m_gone", "region")]);
        assert!(verify(&def).is_valid());
        assert!(normalize(&def, NormalizeOptions::default()).is_ok());
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic {
            severity: Severity::Error,
            kind: DiagnosticKind::DanglingReference,
            message: "reference to unknown localId 'x'".into(),
            location: Some("sortBy[0]".into()),
        };
        assert_eq!(
            diagnostic.to_string(),
            "error [dangling] at sortBy[0]: reference to unknown localId 'x'"
        );
    }

    #[test]
    fn test_diagnostics_serialize() {
        let mut def = ExecutionDefinition::new("ws");
        def.measures = vec![pop("ly", "ghost", "date.year")];
        let json = serde_json::to_value(verify(&def)).unwrap();
        assert_eq!(json["diagnostics"][0]["severity"], "error");
        assert_eq!(json["diagnostics"][0]["kind"], "missing_measure");
    }
}
