//! Sequential/parallel dispatch of row coercion.

use rayon::ThreadPool;
use rayon::prelude::*;

use crate::coerce::coerce_row_into;
use crate::spec::{EnumPartitionStrategy, Result, SpecCell, SpecColumn, SpecRowTable};
use crate::util::{calculate_batch_size, generate_row_chunks};

/// Merged coercion output of all batches.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecPartitionOutcome {
    /// Cells in row-major order.
    pub cells: Vec<SpecCell>,
    /// Strategy that ran.
    pub strategy: EnumPartitionStrategy,
    /// Number of batches (1 when sequential).
    pub n_batches: usize,
}

/// Pick the strategy for `n_rows` records.
pub fn plan_partition_strategy(
    n_rows: usize,
    threshold_rows_parallel: usize,
    thread_pool: Option<&ThreadPool>,
) -> EnumPartitionStrategy {
    if n_rows > threshold_rows_parallel && thread_pool.is_some() {
        EnumPartitionStrategy::Parallel
    } else {
        EnumPartitionStrategy::Sequential
    }
}

/// Coerce every row of `table`, in parallel above `threshold_rows_parallel`.
///
/// Fails with the first error in row order. In parallel mode every batch runs
/// to completion before the merge barrier; the lowest failing batch wins and
/// all successful batch output is dropped.
pub fn coerce_rows(
    table: &SpecRowTable<'_>,
    columns: &[SpecColumn],
    threshold_rows_parallel: usize,
    thread_pool: Option<&ThreadPool>,
) -> Result<SpecPartitionOutcome> {
    let n_rows = table.n_rows();
    let strategy = plan_partition_strategy(n_rows, threshold_rows_parallel, thread_pool);

    let (EnumPartitionStrategy::Parallel, Some(thread_pool)) = (strategy, thread_pool) else {
        tracing::debug!(n_rows, "coercing rows sequentially");
        let cells = coerce_batch(table, columns, 0, n_rows)?;
        return Ok(SpecPartitionOutcome {
            cells,
            strategy: EnumPartitionStrategy::Sequential,
            n_batches: 1,
        });
    };

    let n_batch_size = calculate_batch_size(n_rows, thread_pool.current_num_threads());
    let l_batches = generate_row_chunks(n_rows, n_batch_size);
    let n_batches = l_batches.len();
    tracing::debug!(n_rows, n_batches, n_batch_size, "coercing rows in parallel");

    let l_results: Vec<Result<Vec<SpecCell>>> = thread_pool.install(|| {
        l_batches
            .into_par_iter()
            .map(|(n_row_start, n_rows_batch)| {
                coerce_batch(table, columns, n_row_start, n_rows_batch)
            })
            .collect()
    });

    let mut cells = Vec::with_capacity(n_rows * columns.len());
    for res_batch in l_results {
        cells.extend(res_batch?);
    }

    Ok(SpecPartitionOutcome {
        cells,
        strategy,
        n_batches,
    })
}

fn coerce_batch(
    table: &SpecRowTable<'_>,
    columns: &[SpecColumn],
    n_row_start: usize,
    n_rows_batch: usize,
) -> Result<Vec<SpecCell>> {
    let mut l_cells = Vec::with_capacity(n_rows_batch * columns.len());
    for n_idx_row in n_row_start..n_row_start + n_rows_batch {
        coerce_row_into(&mut l_cells, table.row(n_idx_row), columns, n_idx_row)?;
    }
    Ok(l_cells)
}
