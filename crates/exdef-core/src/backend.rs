//! Execution backend seam and the normalizing decorator
//!
//! An [`ExecutionBackend`] computes results for an execution definition. The
//! [`NormalizingBackend`] wraps any backend: it hands the inner backend the
//! normalized definition only and denormalizes what comes back, so caching
//! and recording layers behind it see canonical definitions while callers in
//! front of it see their own vocabulary.
//!
//! ```text
//! caller ──def──▶ NormalizingBackend ──normalized──▶ inner backend
//!        ◀─result (original ids)─┘  ◀─result (normalized ids)─┘
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::denormalizer::Denormalizer;
use crate::fingerprint::def_fingerprint;
use crate::model::{DimensionDescriptor, ExecutionDefinition, ResultHeaders};
use crate::normalizer::{normalize, NormalizationState, NormalizeOptions};
use crate::{Error, Result};

/// What a backend returns for one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub dimensions: Vec<DimensionDescriptor>,
    /// Per dimension, per header group, per position
    #[serde(default)]
    pub headers: ResultHeaders,
    /// Computed values; opaque to normalization
    #[serde(default)]
    pub data: serde_json::Value,
}

pub trait ExecutionBackend {
    fn execute(&self, definition: &ExecutionDefinition) -> Result<ExecutionResult>;
}

impl<B: ExecutionBackend + ?Sized> ExecutionBackend for &B {
    fn execute(&self, definition: &ExecutionDefinition) -> Result<ExecutionResult> {
        (**self).execute(definition)
    }
}

// ── Normalizing decorator ─────────────────────────────────

pub struct NormalizingBackend<B> {
    inner: B,
    options: NormalizeOptions,
}

impl<B: ExecutionBackend> NormalizingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self::with_options(inner, NormalizeOptions::default())
    }

    pub fn with_options(inner: B, options: NormalizeOptions) -> Self {
        NormalizingBackend { inner, options }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Normalize, execute on the inner backend, and return the denormalized
    /// result together with the state used to produce it
    pub fn execute_with_state(
        &self,
        definition: &ExecutionDefinition,
    ) -> Result<(NormalizationState, ExecutionResult)> {
        let state = normalize(definition, self.options)?;
        let result = self.inner.execute(state.normalized())?;
        let denormalized = replay(&state, &result)?;
        Ok((state, denormalized))
    }
}

impl<B: ExecutionBackend> ExecutionBackend for NormalizingBackend<B> {
    fn execute(&self, definition: &ExecutionDefinition) -> Result<ExecutionResult> {
        self.execute_with_state(definition).map(|(_, result)| result)
    }
}

/// Denormalize a result computed for `state.normalized()`.
///
/// Also serves recorded fixtures, where both the result and the state were
/// captured earlier and the forward pass is not re-run.
pub fn replay(state: &NormalizationState, result: &ExecutionResult) -> Result<ExecutionResult> {
    let denormalizer = Denormalizer::from(state);
    Ok(ExecutionResult {
        dimensions: denormalizer.denormalize_dim_descriptors(&result.dimensions)?,
        headers: denormalizer.denormalize_headers(&result.headers),
        data: result.data.clone(),
    })
}

// ── Recorded backend ──────────────────────────────────────

/// One captured execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub definition: ExecutionDefinition,
    pub result: ExecutionResult,
}

/// Serves previously captured results, matched by definition fingerprint
#[derive(Debug, Clone, Default)]
pub struct RecordedBackend {
    recordings: BTreeMap<String, ExecutionResult>,
}

impl RecordedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_recordings(recordings: impl IntoIterator<Item = Recording>) -> Result<Self> {
        let mut backend = RecordedBackend::new();
        for recording in recordings {
            backend.record(&recording.definition, recording.result)?;
        }
        Ok(backend)
    }

    /// Store `result` for `definition`; replaces an earlier recording with the same fingerprint
    pub fn record(&mut self, definition: &ExecutionDefinition, result: ExecutionResult) -> Result<()> {
        let fingerprint = def_fingerprint(definition)?;
        tracing::debug!(%fingerprint, "recorded execution");
        self.recordings.insert(fingerprint, result);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }
}

impl ExecutionBackend for RecordedBackend {
    fn execute(&self, definition: &ExecutionDefinition) -> Result<ExecutionResult> {
        let fingerprint = def_fingerprint(definition)?;
        self.recordings.get(&fingerprint).cloned().ok_or_else(|| {
            Error::Backend(format!(
                "no recording matches definition fingerprint {}",
                fingerprint
            ))
        })
    }
}
