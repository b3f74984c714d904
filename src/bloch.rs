use crate::Model;
use crate::error::{Result, TbError};
use ndarray::*;
use num_complex::Complex64;
use std::f64::consts::PI;

impl Model {
    /// Bloch Hamiltonian at `kvec` (fractional coordinates of the reciprocal lattice).
    ///
    /// $$H_{ij}(\bm k)=\sum_{\bm R}\bra{i\bm 0}\hat H\ket{j\bm R}e^{2\pi i\bm k\cdot\bm R}$$
    ///
    /// The orbital positions do not enter the phase, so $H(\bm k+\bm G)=H(\bm k)$.
    /// A model holding both directions of every hopping gives a Hermitian matrix.
    pub fn hamilton<S: Data<Elem = f64>>(&self, kvec: &ArrayBase<S, Ix1>) -> Result<Array2<Complex64>> {
        if kvec.len() != 3 {
            return Err(TbError::DimensionMismatch {
                context: "kvec".to_string(),
                expected: 3,
                found: kvec.len(),
            });
        }
        let norb = self.norb();
        let mut hamk = Array2::<Complex64>::zeros((norb, norb));
        for (R, i, j, hop) in self.hoppings().iter() {
            let phase = 2.0 * PI * (kvec[0] * R[0] as f64 + kvec[1] * R[1] as f64 + kvec[2] * R[2] as f64);
            hamk[[i, j]] += hop * Complex64::new(0.0, phase).exp();
        }
        Ok(hamk)
    }
}
