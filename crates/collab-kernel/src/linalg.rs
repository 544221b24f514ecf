//! Dense linear algebra over row-major `Vec<Vec<f64>>` matrices.
//!
//! Only what task generation and the metrics need: products with a matrix
//! and its transpose, Euclidean norms, and an orthonormal basis via
//! Householder QR.

/// Row-major dense matrix.
pub type Matrix = Vec<Vec<f64>>;

/// Compute `m · v`.
pub fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter()
        .map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum())
        .collect()
}

/// Compute `mᵗ · v` without materializing the transpose.
pub fn mat_t_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    let cols = m.first().map_or(0, Vec::len);
    let mut out = vec![0.0; cols];
    for (row, &scale) in m.iter().zip(v) {
        for (acc, &a) in out.iter_mut().zip(row) {
            *acc += a * scale;
        }
    }
    out
}

/// Euclidean norm. Zero for an empty slice.
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Element-wise `a - b`.
pub fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// Identity matrix of size `n`.
pub fn identity(n: usize) -> Matrix {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

/// Orthonormal basis of the columns of a square matrix.
///
/// Returns the `Q` factor of a Householder QR decomposition `a = Q·R`.
/// `Q` is orthonormal for any input, including rank-deficient draws,
/// since it is built as a product of reflections rather than by
/// normalizing residual columns.
pub fn orthonormalize(a: &[Vec<f64>]) -> Matrix {
    let n = a.len();
    let mut r: Matrix = a.to_vec();
    let mut q = identity(n);

    for k in 0..n.saturating_sub(1) {
        let column: Vec<f64> = (k..n).map(|i| r[i][k]).collect();
        let column_norm = norm(&column);
        if column_norm == 0.0 {
            continue;
        }

        // Reflect onto -sign(x0)·|x|·e0 to avoid cancellation.
        let alpha = if column[0] >= 0.0 {
            -column_norm
        } else {
            column_norm
        };
        let mut v = column;
        v[0] -= alpha;
        let v_norm = norm(&v);
        if v_norm <= f64::EPSILON * column_norm {
            continue;
        }
        for x in &mut v {
            *x /= v_norm;
        }

        // R <- H·R
        for j in 0..n {
            let s: f64 = v.iter().enumerate().map(|(l, vl)| vl * r[k + l][j]).sum();
            for (l, vl) in v.iter().enumerate() {
                r[k + l][j] -= 2.0 * vl * s;
            }
        }

        // Q <- Q·H
        for row in q.iter_mut() {
            let s: f64 = v.iter().enumerate().map(|(l, vl)| row[k + l] * vl).sum();
            for (l, vl) in v.iter().enumerate() {
                row[k + l] -= 2.0 * s * vl;
            }
        }
    }

    q
}

/// Check `mᵗ·m ≈ I` within `tol` for every entry.
pub fn is_orthonormal(m: &[Vec<f64>], tol: f64) -> bool {
    let n = m.len();
    if m.iter().any(|row| row.len() != n) {
        return false;
    }
    for i in 0..n {
        for j in 0..n {
            let dot: f64 = m.iter().map(|row| row[i] * row[j]).sum();
            let expected = if i == j { 1.0 } else { 0.0 };
            if (dot - expected).abs() > tol {
                return false;
            }
        }
    }
    true
}
