//! Shape checks and checked factorisations

use nalgebra::{Cholesky, DMatrix, Dyn, RealField, SymmetricEigen};
use num_traits::Float;

use crate::{LqgError, Result};

/// Fails with [`LqgError::ShapeMismatch`] unless `matrix` is `rows x cols`.
pub fn expect_shape<T: RealField>(
    matrix: &DMatrix<T>,
    name: &'static str,
    rows: usize,
    cols: usize,
) -> Result<()> {
    if matrix.shape() != (rows, cols) {
        return Err(LqgError::ShapeMismatch {
            matrix: name,
            expected: (rows, cols),
            found: matrix.shape(),
        });
    }
    Ok(())
}

/// Largest absolute entry of a matrix (zero for an empty matrix).
pub fn max_abs<T: RealField + Float + Copy>(matrix: &DMatrix<T>) -> T {
    matrix
        .iter()
        .fold(T::zero(), |acc, &v| Float::max(acc, Float::abs(v)))
}

/// Checks that a matrix is symmetric positive semidefinite.
///
/// Both the asymmetry and the most negative eigenvalue are compared
/// against `tolerance` scaled by the largest entry.
pub fn is_positive_semidefinite<T: RealField + Float + Copy>(
    matrix: &DMatrix<T>,
    tolerance: T,
) -> bool {
    if !matrix.is_square() {
        return false;
    }
    if matrix.iter().any(|v| !Float::is_finite(*v)) {
        return false;
    }

    let scale = Float::max(max_abs(matrix), T::one());
    let bound = tolerance * scale;

    let n = matrix.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if Float::abs(matrix[(i, j)] - matrix[(j, i)]) > bound {
                return false;
            }
        }
    }

    let eigen = SymmetricEigen::new(matrix.clone());
    eigen.eigenvalues.iter().all(|&lambda| lambda >= -bound)
}

/// Cholesky factorisation that rejects numerically singular matrices.
///
/// The factorisation fails with [`LqgError::SingularMatrix`] when the matrix
/// is not positive definite or when the squared ratio of the smallest to the
/// largest pivot does not exceed `tolerance`.
pub fn checked_cholesky<T: RealField + Float + Copy>(
    matrix: &DMatrix<T>,
    tolerance: T,
) -> Result<Cholesky<T, Dyn>> {
    let chol = matrix.clone().cholesky().ok_or(LqgError::SingularMatrix)?;

    let diagonal = chol.l_dirty().diagonal();
    let largest = diagonal
        .iter()
        .fold(T::zero(), |acc, &d| Float::max(acc, Float::abs(d)));
    let smallest = diagonal
        .iter()
        .fold(<T as Float>::infinity(), |acc, &d| Float::min(acc, Float::abs(d)));

    // NaN pivots fail the comparison as well
    if !(smallest * smallest > tolerance * largest * largest) {
        return Err(LqgError::SingularMatrix);
    }

    Ok(chol)
}

/// Inverts a symmetric positive semidefinite matrix.
///
/// Uses the Cholesky inverse when the matrix is positive definite and falls
/// back to the Moore-Penrose pseudo-inverse otherwise, so an all-zero matrix
/// maps to an all-zero inverse.
pub fn symmetric_inverse<T: RealField + Float + Copy>(
    matrix: &DMatrix<T>,
    epsilon: T,
) -> Result<DMatrix<T>> {
    if let Some(chol) = matrix.clone().cholesky() {
        let inverse = chol.inverse();
        if inverse.iter().all(|v| Float::is_finite(*v)) {
            return Ok(inverse);
        }
    }

    log::trace!("cholesky inverse unavailable, using pseudo-inverse");
    matrix
        .clone()
        .pseudo_inverse(epsilon)
        .map_err(|_| LqgError::SingularMatrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn test_expect_shape() {
        let m = DMatrix::<f64>::zeros(2, 3);
        assert!(expect_shape(&m, "M", 2, 3).is_ok());
        assert_eq!(
            expect_shape(&m, "M", 3, 2),
            Err(LqgError::ShapeMismatch {
                matrix: "M",
                expected: (3, 2),
                found: (2, 3),
            })
        );
    }

    #[test]
    fn test_positive_semidefinite() {
        let psd = dmatrix![2.0, 1.0; 1.0, 2.0];
        assert!(is_positive_semidefinite(&psd, 1e-9));

        let singular = dmatrix![1.0, -1.0; -1.0, 1.0];
        assert!(is_positive_semidefinite(&singular, 1e-9));

        let indefinite = dmatrix![1.0, 2.0; 2.0, 1.0];
        assert!(!is_positive_semidefinite(&indefinite, 1e-9));

        let asymmetric = dmatrix![1.0, 0.5; 0.0, 1.0];
        assert!(!is_positive_semidefinite(&asymmetric, 1e-9));
    }

    #[test]
    fn test_checked_cholesky_rejects_singular() {
        let spd = dmatrix![4.0, 1.0; 1.0, 3.0];
        assert!(checked_cholesky(&spd, 1e-12).is_ok());

        let singular = dmatrix![1.0, 0.0; 0.0, 0.0];
        assert_eq!(
            checked_cholesky(&singular, 1e-12).err(),
            Some(LqgError::SingularMatrix)
        );

        let rank_one = dmatrix![1.0, 1.0; 1.0, 1.0];
        assert_eq!(
            checked_cholesky(&rank_one, 1e-12).err(),
            Some(LqgError::SingularMatrix)
        );
    }

    #[test]
    fn test_symmetric_inverse() {
        let m = dmatrix![2.0, 0.0; 0.0, 4.0];
        let inv = symmetric_inverse(&m, 1e-12).unwrap();
        assert!((inv[(0, 0)] - 0.5).abs() < 1e-12);
        assert!((inv[(1, 1)] - 0.25).abs() < 1e-12);

        let zero = DMatrix::<f64>::zeros(2, 2);
        let inv = symmetric_inverse(&zero, 1e-12).unwrap();
        assert!(inv.iter().all(|v| *v == 0.0));
    }
}
