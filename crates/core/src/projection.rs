//! Results-table projection.
//!
//! A pure function from the backend's input/output catalog to the rows the
//! user inspects. No network, no hidden state: the projection is recomputed
//! from scratch on every refresh signal, and the input order the catalog
//! reports is preserved as-is (presentation order is the UI's decision).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::output_kind::OutputKind;
use crate::types::Timestamp;

/// Read model fetched from the backend's catalog endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Known uploaded-document keys, in the order the backend lists them.
    pub input_files: Vec<String>,
    /// Output kinds generated so far, per input key.
    pub outputs_by_input: HashMap<String, Vec<OutputKind>>,
    /// When each input's outputs were last updated.
    pub timestamps: HashMap<String, Timestamp>,
    /// When each input was uploaded.
    pub input_timestamps: HashMap<String, Timestamp>,
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub input_key: String,
    /// All seven required output kinds exist for this input.
    pub fully_processed: bool,
    /// Present kinds, normalised to canonical order.
    pub outputs: Vec<OutputKind>,
    /// Last output update, or `None` for an unprocessed input.
    pub last_updated: Option<Timestamp>,
    /// Upload time, when the backend knows it.
    pub uploaded_at: Option<Timestamp>,
}

/// Whether every required output kind has been generated for this set.
pub fn fully_processed(outputs: &[OutputKind]) -> bool {
    OutputKind::ALL.iter().all(|k| outputs.contains(k))
}

/// Project the catalog into result rows, one per input file.
pub fn project(catalog: &Catalog) -> Vec<ResultRow> {
    catalog
        .input_files
        .iter()
        .map(|key| {
            let present = catalog
                .outputs_by_input
                .get(key)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            // Normalise to canonical order; backends report sets, not order.
            let outputs: Vec<OutputKind> = OutputKind::ALL
                .into_iter()
                .filter(|k| present.contains(k))
                .collect();

            ResultRow {
                input_key: key.clone(),
                fully_processed: fully_processed(&outputs),
                outputs,
                last_updated: catalog.timestamps.get(key).copied(),
                uploaded_at: catalog.input_timestamps.get(key).copied(),
            }
        })
        .collect()
}
