//! Block-structured matrix assembly
//!
//! The augmented (plant, belief) transition is built from sub-blocks; these
//! helpers place dense blocks into a larger zero-initialised matrix.

use nalgebra::{DMatrix, RealField};

/// Stacks two matrices side by side: `[left, right]`.
///
/// # Panics
/// Panics if the row counts differ.
pub fn hstack<T: RealField + Copy>(left: &DMatrix<T>, right: &DMatrix<T>) -> DMatrix<T> {
    assert_eq!(left.nrows(), right.nrows(), "hstack requires equal row counts");
    let mut out = DMatrix::zeros(left.nrows(), left.ncols() + right.ncols());
    out.view_mut((0, 0), left.shape()).copy_from(left);
    out.view_mut((0, left.ncols()), right.shape()).copy_from(right);
    out
}

/// Stacks two matrices on top of each other: `[top; bottom]`.
///
/// # Panics
/// Panics if the column counts differ.
pub fn vstack<T: RealField + Copy>(top: &DMatrix<T>, bottom: &DMatrix<T>) -> DMatrix<T> {
    assert_eq!(top.ncols(), bottom.ncols(), "vstack requires equal column counts");
    let mut out = DMatrix::zeros(top.nrows() + bottom.nrows(), top.ncols());
    out.view_mut((0, 0), top.shape()).copy_from(top);
    out.view_mut((top.nrows(), 0), bottom.shape()).copy_from(bottom);
    out
}

/// Assembles a 2x2 block matrix.
///
/// ```text
/// | top_left     top_right    |
/// | bottom_left  bottom_right |
/// ```
pub fn block2x2<T: RealField + Copy>(
    top_left: &DMatrix<T>,
    top_right: &DMatrix<T>,
    bottom_left: &DMatrix<T>,
    bottom_right: &DMatrix<T>,
) -> DMatrix<T> {
    vstack(
        &hstack(top_left, top_right),
        &hstack(bottom_left, bottom_right),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn test_block2x2_layout() {
        let a = dmatrix![1.0, 2.0; 3.0, 4.0];
        let b = dmatrix![5.0; 6.0];
        let c = dmatrix![7.0, 8.0];
        let d = dmatrix![9.0];

        let m = block2x2(&a, &b, &c, &d);
        assert_eq!(m, dmatrix![1.0, 2.0, 5.0; 3.0, 4.0, 6.0; 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_stack_with_empty_block() {
        let a = dmatrix![1.0, 2.0];
        let empty = DMatrix::<f64>::zeros(1, 0);
        assert_eq!(hstack(&a, &empty), a);
    }

    #[test]
    #[should_panic]
    fn test_hstack_row_mismatch() {
        let a = dmatrix![1.0; 2.0];
        let b = dmatrix![1.0];
        hstack(&a, &b);
    }
}
