use crate::Model;
use crate::error::{Result, TbError};
use crate::generics::hop_use;
use crate::hopping::{HoppingTable, LatticeVector};
use crate::math::det3;
use crate::orbital::Orbital;
use ndarray::*;

impl Model {
    #[inline(always)]
    pub fn norb(&self) -> usize {
        self.orbitals.len()
    }
    #[inline(always)]
    pub fn lat(&self) -> &Array2<f64> {
        &self.lat
    }
    /// Orbital positions in fractional coordinates, one row per orbital.
    pub fn orb(&self) -> Array2<f64> {
        let mut orb = Array2::zeros((self.norb(), 3));
        orb.outer_iter_mut()
            .zip(self.orbitals.iter())
            .for_each(|(mut row, o)| {
                row.assign(&arr1(&o.position));
            });
        orb
    }
    /// Orbital positions in Cartesian coordinates.
    pub fn cart_positions(&self) -> Array2<f64> {
        self.orb().dot(&self.lat)
    }
    pub fn orbitals(&self) -> &[Orbital] {
        &self.orbitals
    }
    /// Mutable access to the orbitals; the orbital count cannot change through it.
    pub fn orbitals_mut(&mut self) -> &mut [Orbital] {
        &mut self.orbitals
    }
    pub fn labels(&self) -> Vec<&str> {
        self.orbitals.iter().map(|o| o.label.as_str()).collect()
    }
    pub fn occupations(&self) -> Vec<f64> {
        self.orbitals.iter().map(|o| o.occupation).collect()
    }
    /// Total occupation, the sum of the orbital weights.
    pub fn occupation(&self) -> f64 {
        self.orbitals.iter().map(|o| o.occupation).sum()
    }
    /// Signed unit cell volume.
    pub fn volume(&self) -> f64 {
        det3(&self.lat)
    }
    pub fn hoppings(&self) -> &HoppingTable {
        &self.hoppings
    }

    /// $\bra{i\bm 0}\hat H\ket{j\bm R}$ += tmp
    ///
    /// Only this direction is touched: the Hermitian partner has to be added separately.
    pub fn add_hop<U: hop_use>(&mut self, tmp: U, ind_i: usize, ind_j: usize, R: LatticeVector) -> Result<()> {
        let norb = self.norb();
        for index in [ind_i, ind_j] {
            if index >= norb {
                return Err(TbError::InvalidOrbitalIndex { index, norb });
            }
        }
        self.hoppings.add(R, ind_i, ind_j, tmp);
        Ok(())
    }

    /// Compares cell, orbitals and hoppings within `tol`.
    pub fn approx_eq(&self, other: &Model, tol: f64) -> bool {
        if self.norb() != other.norb() {
            return false;
        }
        let same_lat = self
            .lat
            .iter()
            .zip(other.lat.iter())
            .all(|(a, b)| (a - b).abs() <= tol);
        let same_orbitals = self.orbitals.iter().zip(other.orbitals.iter()).all(|(a, b)| {
            a.label == b.label
                && (a.occupation - b.occupation).abs() <= tol
                && a.position
                    .iter()
                    .zip(b.position.iter())
                    .all(|(x, y)| (x - y).abs() <= tol)
        });
        same_lat && same_orbitals && self.hoppings.is_close(&other.hoppings, tol)
    }
}
