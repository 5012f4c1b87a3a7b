//! Hidden-column planning.

use std::ops::RangeInclusive;

use rayon::ThreadPool;
use rayon::prelude::*;

use crate::spec::SpecColumn;

/// Masking plan for one hidden column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecHiddenColumnPlan {
    /// Zero-based column index.
    pub col_idx: usize,
    /// Column name.
    pub name: String,
    /// Sheet rows to restyle, header included.
    pub rows: RangeInclusive<usize>,
}

/// Plan hiding and masking for every hidden column of `columns`.
///
/// Plans cover sheet rows `0..=n_rows_data` and come back in column order.
/// Workers only produce coordinates; applying them is left to the caller.
pub fn plan_hidden_columns(
    columns: &[SpecColumn],
    n_rows_data: usize,
    thread_pool: Option<&ThreadPool>,
) -> Vec<SpecHiddenColumnPlan> {
    let l_queue: Vec<(usize, &SpecColumn)> = columns
        .iter()
        .enumerate()
        .filter(|(_, column)| column.visibility.is_hidden())
        .collect();

    let derive_plan = |(col_idx, column): (usize, &SpecColumn)| SpecHiddenColumnPlan {
        col_idx,
        name: column.name.clone(),
        rows: 0..=n_rows_data,
    };

    match thread_pool {
        Some(thread_pool) => {
            thread_pool.install(|| l_queue.into_par_iter().map(derive_plan).collect())
        }
        None => l_queue.into_iter().map(derive_plan).collect(),
    }
}
