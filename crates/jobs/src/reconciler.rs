//! Output reconciliation.
//!
//! Computes the delta between the outputs the backend reports as available
//! and the outputs already announced for a session. The delta is always
//! returned in canonical kind order, regardless of the order the backend
//! produced (or reported) the outputs. This is the idempotence core of the
//! whole job-tracking subsystem: a kind that has been announced once is
//! never part of a later delta.

use std::collections::HashSet;

use sopflow_core::OutputKind;

/// The available-but-unannounced kinds, in canonical announcement order.
///
/// Callers mark a kind as announced only after its announcement actually
/// succeeded, so a kind whose content fetch failed stays in the delta and
/// is retried on the next reconciliation pass.
pub fn reconcile_delta(
    available: &[OutputKind],
    announced: &HashSet<OutputKind>,
) -> Vec<OutputKind> {
    OutputKind::ALL
        .into_iter()
        .filter(|kind| available.contains(kind) && !announced.contains(kind))
        .collect()
}
