use nalgebra::{Matrix3, Vector3};

const LOVASZ_DELTA: f64 = 0.75;

/// Gram-Schmidt orthogonalisation of the columns of `b` (not normalised).
fn gram_schmidt(b: &Matrix3<f64>) -> Matrix3<f64> {
    let mut b_star = *b;
    for i in 0..3 {
        let mut col = b.column(i).into_owned();
        for j in 0..i {
            let bj = b_star.column(j).into_owned();
            let denom = bj.norm_squared();
            if denom > 0.0 {
                col -= bj * (b.column(i).dot(&bj) / denom);
            }
        }
        b_star.set_column(i, &col);
    }
    b_star
}

/// Performs LLL lattice reduction on a 3D basis (columns, floating point).
pub fn lll_reduce(basis: Matrix3<f64>) -> Matrix3<f64> {
    let mut b = basis;
    let mut k = 1;

    while k < 3 {
        let b_star = gram_schmidt(&b);

        // Size reduction of column k against all earlier columns
        for j in (0..k).rev() {
            let bj_star = b_star.column(j).into_owned();
            let mu = b.column(k).dot(&bj_star) / bj_star.norm_squared();
            if mu.abs() > 0.5 {
                let shift = b.column(j) * mu.round();
                let col_k = b.column(k) - shift;
                b.set_column(k, &col_k);
            }
        }

        let b_star = gram_schmidt(&b);
        let prev = b_star.column(k - 1).norm_squared();
        let mu = b.column(k).dot(&b_star.column(k - 1)) / prev;

        // Lovász condition
        if b_star.column(k).norm_squared() >= (LOVASZ_DELTA - mu * mu) * prev {
            k += 1;
        } else {
            b.swap_columns(k, k - 1);
            k = 1.max(k - 1);
        }
    }
    b
}

/// Reduces an in-plane pair of translation vectors to the shortest equivalent
/// pair. The stacking direction is parked as a very long third column so it
/// never mixes into the in-plane vectors.
pub fn reduce_in_plane(
    a1: &Vector3<f64>,
    a2: &Vector3<f64>,
    normal: &Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    let temp_basis = Matrix3::from_columns(&[*a1, *a2, normal.normalize() * 10000.0]);
    let reduced = lll_reduce(temp_basis);
    (reduced.column(0).into_owned(), reduced.column(1).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skewed_hexagonal_basis_is_reduced() {
        let a = 2.46;
        let a1 = Vector3::new(a, 0.0, 0.0);
        let a2 = Vector3::new(a * 0.5, a * 3f64.sqrt() / 2.0, 0.0);
        // 3*a1 + a2 spans the same lattice with a1 but is far from shortest.
        let (r1, r2) = reduce_in_plane(&a1, &(a1 * 3.0 + a2), &Vector3::z());
        assert!((r1.norm() - a).abs() < 1e-9);
        assert!((r2.norm() - a).abs() < 1e-9);
        assert!(r1.z.abs() < 1e-12 && r2.z.abs() < 1e-12);
    }
}
