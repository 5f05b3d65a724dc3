//! Minimum-cost bipartite assignment on integer costs.
//!
//! Shortest augmenting path form of the Hungarian (Kuhn-Munkres) algorithm
//! with row and column potentials. Missing edges are priced so that any
//! assignment using fewer of them is cheaper than one using more, which
//! maximizes the number of real pairs first and minimizes their total cost
//! second.
#![allow(clippy::needless_range_loop)]

/// Represents a match between a row index and column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub row_idx: usize,
    pub col_idx: usize,
}

/// Result of linear sum assignment.
#[derive(Debug, Clone)]
pub struct AssignmentResult {
    /// Assigned (row, col) pairs, all over real edges
    pub assignments: Vec<Assignment>,
    /// Indices of rows that were not matched
    pub unmatched_rows: Vec<usize>,
    /// Indices of columns that were not matched
    pub unmatched_cols: Vec<usize>,
}

/// Solve the assignment problem for a sparse integer cost matrix.
///
/// `cost[i][j]` is `None` where row `i` and column `j` may not be paired.
/// All rows must have the same length and costs must be non-negative.
pub fn linear_sum_assignment(cost: &[Vec<Option<i64>>]) -> AssignmentResult {
    let num_rows = cost.len();
    let num_cols = cost.first().map_or(0, |r| r.len());
    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            assignments: Vec::new(),
            unmatched_rows: (0..num_rows).collect(),
            unmatched_cols: (0..num_cols).collect(),
        };
    }

    // Every forbidden edge costs more than any full assignment of real edges.
    let max_real = cost.iter().flatten().flatten().copied().max().unwrap_or(0).max(0);
    let forbidden = (max_real + 1).saturating_mul(num_rows.max(num_cols) as i64 + 1);

    // The solver wants rows <= cols.
    let transposed = num_rows > num_cols;
    let (n, m) = if transposed { (num_cols, num_rows) } else { (num_rows, num_cols) };
    let at = |i: usize, j: usize| -> i64 {
        let c = if transposed { cost[j][i] } else { cost[i][j] };
        c.unwrap_or(forbidden)
    };

    let row_of_col = solve(n, m, at);

    let mut assignments = Vec::new();
    for (j, row) in row_of_col.iter().enumerate() {
        if let Some(i) = *row {
            let (r, c) = if transposed { (j, i) } else { (i, j) };
            if cost[r][c].is_some() {
                assignments.push(Assignment { row_idx: r, col_idx: c });
            }
        }
    }
    assignments.sort_by_key(|a| (a.row_idx, a.col_idx));

    let unmatched_rows = (0..num_rows)
        .filter(|r| !assignments.iter().any(|a| a.row_idx == *r))
        .collect();
    let unmatched_cols = (0..num_cols)
        .filter(|c| !assignments.iter().any(|a| a.col_idx == *c))
        .collect();

    AssignmentResult {
        assignments,
        unmatched_rows,
        unmatched_cols,
    }
}

/// Core solver for an `n x m` matrix with `n <= m`. Returns, for each
/// column, the row assigned to it.
fn solve<F>(n: usize, m: usize, a: F) -> Vec<Option<usize>>
where
    F: Fn(usize, usize) -> i64,
{
    const INF: i64 = i64::MAX / 4;
    // 1-based arrays; index 0 is the virtual start column.
    let mut u = vec![0i64; n + 1];
    let mut v = vec![0i64; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut minv = vec![INF; m + 1];
        let mut used = vec![false; m + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = INF;
            let mut j1 = 0;
            for j in 1..=m {
                if !used[j] {
                    let cur = a(i0 - 1, j - 1) - u[i0] - v[j];
                    if cur < minv[j] {
                        minv[j] = cur;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    (1..=m).map(|j| (p[j] != 0).then(|| p[j] - 1)).collect()
}
