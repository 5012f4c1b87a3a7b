//! Column width estimation over raw record values.

use rayon::ThreadPool;
use rayon::prelude::*;

use crate::conf::C_RENDER_NULL;
use crate::spec::{EnumRawValue, SpecRowTable, SpecWidthPolicy};
use crate::util::{calculate_batch_size, generate_row_chunks};

/// Byte length of the default text rendering of `value`.
pub fn estimate_render_len(value: &EnumRawValue) -> usize {
    match value {
        EnumRawValue::Null => C_RENDER_NULL.len(),
        EnumRawValue::String(s) => s.len(),
        other => other.to_string().len(),
    }
}

/// Clamped display width of one value.
pub fn estimate_value_width(value: &EnumRawValue, policy: &SpecWidthPolicy) -> f64 {
    (estimate_render_len(value) as f64 * policy.char_factor)
        .clamp(policy.width_min, policy.width_max)
}

/// Estimate per-column widths from every row of `table`.
///
/// Each batch folds into its own width vector; vectors are max-reduced on
/// the calling thread. Absent fields do not contribute, so a column with no
/// values keeps `policy.width_min`.
pub fn estimate_column_widths(
    table: &SpecRowTable<'_>,
    policy: &SpecWidthPolicy,
    thread_pool: Option<&ThreadPool>,
) -> Vec<f64> {
    let n_rows = table.n_rows();
    let n_cols = table.n_cols();

    let Some(thread_pool) = thread_pool else {
        return estimate_batch_widths(table, policy, 0, n_rows);
    };

    let n_batch_size = calculate_batch_size(n_rows, thread_pool.current_num_threads());
    let l_batches = generate_row_chunks(n_rows, n_batch_size);

    let l_widths_by_batch: Vec<Vec<f64>> = thread_pool.install(|| {
        l_batches
            .into_par_iter()
            .map(|(n_row_start, n_rows_batch)| {
                estimate_batch_widths(table, policy, n_row_start, n_rows_batch)
            })
            .collect()
    });

    let mut l_widths = vec![policy.width_min; n_cols];
    for l_widths_batch in l_widths_by_batch {
        for (n_width, n_width_batch) in l_widths.iter_mut().zip(l_widths_batch) {
            *n_width = n_width.max(n_width_batch);
        }
    }
    l_widths
}

fn estimate_batch_widths(
    table: &SpecRowTable<'_>,
    policy: &SpecWidthPolicy,
    n_row_start: usize,
    n_rows_batch: usize,
) -> Vec<f64> {
    let mut l_widths = vec![policy.width_min; table.n_cols()];
    for n_idx_row in n_row_start..n_row_start + n_rows_batch {
        for (n_width, raw) in l_widths.iter_mut().zip(table.row(n_idx_row)) {
            if let Some(raw) = raw {
                *n_width = n_width.max(estimate_value_width(raw, policy));
            }
        }
    }
    l_widths
}
