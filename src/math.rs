//! Small dense helpers for 3×3 cells and fractional coordinates.
use crate::error::{Result, TbError};
use ndarray::{Array2, ArrayBase, Data, Ix2};

/// Determinant of a 3×3 matrix, $(\bm a_1\times\bm a_2)\cdot\bm a_3$ for the rows $\bm a_i$.
pub fn det3<S: Data<Elem = f64>>(m: &ArrayBase<S, Ix2>) -> f64 {
    m[[0, 0]] * (m[[1, 1]] * m[[2, 2]] - m[[1, 2]] * m[[2, 1]])
        - m[[0, 1]] * (m[[1, 0]] * m[[2, 2]] - m[[1, 2]] * m[[2, 0]])
        + m[[0, 2]] * (m[[1, 0]] * m[[2, 1]] - m[[1, 1]] * m[[2, 0]])
}

/// Inverse of a 3×3 matrix through the adjugate.
pub fn inv3<S: Data<Elem = f64>>(m: &ArrayBase<S, Ix2>) -> Result<Array2<f64>> {
    let det = det3(m);
    if det.abs() < 1e-12 {
        return Err(TbError::SingularUnitCell { volume: det });
    }
    let mut inv = Array2::<f64>::zeros((3, 3));
    for i in 0..3 {
        for j in 0..3 {
            // cofactor of m[j,i]
            let (r0, r1) = ((j + 1) % 3, (j + 2) % 3);
            let (c0, c1) = ((i + 1) % 3, (i + 2) % 3);
            inv[[i, j]] = (m[[r0, c0]] * m[[r1, c1]] - m[[r0, c1]] * m[[r1, c0]]) / det;
        }
    }
    Ok(inv)
}

/// Row vector times 3×3 matrix.
#[inline(always)]
pub fn vec_dot_mat<S: Data<Elem = f64>>(v: &[f64; 3], m: &ArrayBase<S, Ix2>) -> [f64; 3] {
    let mut out = [0.0; 3];
    for j in 0..3 {
        out[j] = v[0] * m[[0, j]] + v[1] * m[[1, j]] + v[2] * m[[2, j]];
    }
    out
}

#[inline(always)]
pub fn is_near_integer(x: f64, tol: f64) -> bool {
    (x - x.round()).abs() <= tol
}

/// `true` if `a - b` is a lattice vector up to `tol` in every component.
#[inline(always)]
pub fn same_modulo_lattice(a: &[f64; 3], b: &[f64; 3], tol: f64) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| is_near_integer(x - y, tol))
}

/// Reduces `x` into `[-tol, 1)`. Values already in that window are kept as they are,
/// anything else is shifted by an integer into `[0, 1)`.
#[inline(always)]
pub fn wrap_unit(x: f64, tol: f64) -> f64 {
    if x >= -tol && x < 1.0 {
        x
    } else {
        x - x.floor()
    }
}
