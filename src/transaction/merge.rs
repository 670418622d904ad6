//! Folding an emulated transaction's accumulated parts into one submission.

use std::collections::HashMap;

use tracing::debug;

use crate::engine::ParsedStatement;
use crate::error::LedgerSqlError;
use crate::params::Param;

use super::StatementPart;

/// One combined submission: every statement in order, one flat parameter list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedBatch {
    pub statements: Vec<ParsedStatement>,
    pub params: Vec<Param>,
}

/// Merge parts in submission order.
///
/// Positional ordinals of each part are shifted by the argument count of all
/// earlier parts, and the part's statements are shifted by the same amount so
/// their placeholders resolve to the renumbered names. Explicit names and the
/// renumbered positional names share one flat namespace across the batch.
///
/// # Errors
/// Returns `ParameterNameCollision` when two different parts bind the same
/// name, whether explicit or synthesized for a positional argument.
pub fn merge_parts(parts: &[StatementPart]) -> Result<MergedBatch, LedgerSqlError> {
    let mut batch = MergedBatch::default();
    let mut seen_names: HashMap<String, usize> = HashMap::new();
    let mut ordinal_shift = 0;

    for (part_idx, part) in parts.iter().enumerate() {
        batch
            .statements
            .extend(part.statements.iter().map(|s| s.shifted(ordinal_shift)));

        for param in &part.params {
            let mut shifted = param.clone();
            shifted.ordinal += ordinal_shift;
            let name = shifted.bound_name();
            if let Some(owner) = seen_names.insert(name.clone(), part_idx)
                && owner != part_idx
            {
                return Err(LedgerSqlError::ParameterNameCollision { name });
            }
            batch.params.push(shifted);
        }
        ordinal_shift += part.params.len();
    }

    debug!(
        parts = parts.len(),
        statements = batch.statements.len(),
        params = batch.params.len(),
        "merged batched transaction"
    );
    Ok(batch)
}
