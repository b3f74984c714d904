//! Sparse storage of the hopping terms $\bra{i\bm 0}\hat H\ket{j\bm R}$.
//!
//! A [`HoppingTable`] maps `(R, i, j)` to a complex amplitude. Adding to an existing
//! key sums the amplitudes, so building a table is a commutative reduction and the
//! order in which contributions arrive never changes which keys exist.
use crate::generics::hop_use;
use ndarray::{ArrayBase, Data, Ix2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Integer lattice translation in units of the owning cell's basis vectors.
pub type LatticeVector = [isize; 3];

/// One hopping term `(R, i, j, amplitude)`.
pub type HoppingEntry = (LatticeVector, usize, usize, Complex64);

#[inline(always)]
fn neg(r: &LatticeVector) -> LatticeVector {
    [-r[0], -r[1], -r[2]]
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HoppingTable {
    hoppings: BTreeMap<(LatticeVector, usize, usize), Complex64>,
}

impl HoppingTable {
    pub fn new() -> HoppingTable {
        HoppingTable::default()
    }

    /// $\bra{i\bm 0}\hat H\ket{j\bm R}$ += amplitude
    pub fn add<U: hop_use>(&mut self, r: LatticeVector, i: usize, j: usize, amplitude: U) {
        *self
            .hoppings
            .entry((r, i, j))
            .or_insert(Complex64::new(0.0, 0.0)) += amplitude.to_complex();
    }

    /// Amplitude stored at `(R, i, j)`, zero if the key is absent.
    pub fn get(&self, r: LatticeVector, i: usize, j: usize) -> Complex64 {
        self.hoppings
            .get(&(r, i, j))
            .copied()
            .unwrap_or(Complex64::new(0.0, 0.0))
    }

    pub fn len(&self) -> usize {
        self.hoppings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hoppings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = HoppingEntry> + '_ {
        self.hoppings.iter().map(|(&(r, i, j), &a)| (r, i, j, a))
    }

    pub fn lattice_vectors(&self) -> BTreeSet<LatticeVector> {
        self.hoppings.keys().map(|(r, _, _)| *r).collect()
    }

    /// Largest orbital index referenced by any entry.
    pub fn max_orbital_index(&self) -> Option<usize> {
        self.hoppings.keys().map(|(_, i, j)| (*i).max(*j)).max()
    }

    /// Returns a table holding every entry together with its Hermitian partner
    /// $(\bm R,i,j,t)\mapsto(-\bm R,j,i,t^*)$. The on-site term `R=0, i=j` is its own
    /// partner and is kept once.
    pub fn conjugate_completed(&self) -> HoppingTable {
        let mut out = HoppingTable::new();
        for (r, i, j, a) in self.iter() {
            out.add(r, i, j, a);
            if !(r == [0, 0, 0] && i == j) {
                out.add(neg(&r), j, i, a.conj());
            }
        }
        out
    }

    /// Keeps only the entries whose amplitude satisfies `predicate`.
    pub fn filtered<F>(&self, predicate: F) -> HoppingTable
    where
        F: Fn(&Complex64) -> bool,
    {
        HoppingTable {
            hoppings: self
                .hoppings
                .iter()
                .filter(|(_, a)| predicate(a))
                .map(|(k, a)| (*k, *a))
                .collect(),
        }
    }

    /// First key whose Hermitian partner differs from the conjugate amplitude by more
    /// than `tol`. A missing partner counts as a zero amplitude.
    pub fn hermiticity_violation(&self, tol: f64) -> Option<(LatticeVector, usize, usize)> {
        self.iter()
            .find(|&(r, i, j, a)| (self.get(neg(&r), j, i) - a.conj()).norm() > tol)
            .map(|(r, i, j, _)| (r, i, j))
    }

    /// Every key present in either table agrees within `tol`.
    pub fn is_close(&self, other: &HoppingTable, tol: f64) -> bool {
        self.iter()
            .all(|(r, i, j, a)| (a - other.get(r, i, j)).norm() <= tol)
            && other
                .iter()
                .all(|(r, i, j, a)| (a - self.get(r, i, j)).norm() <= tol)
    }

    /// Turns a square matrix into hopping terms at a single lattice vector.
    ///
    /// `orbitals` lists the model orbitals the rows/columns refer to; by default the
    /// first `mat.nrows()` orbitals are used.
    pub fn from_matrix<S, U>(
        mat: &ArrayBase<S, Ix2>,
        orbitals: Option<&[usize]>,
        r: LatticeVector,
        multiplier: Complex64,
    ) -> HoppingTable
    where
        S: Data<Elem = U>,
        U: hop_use,
    {
        let default_orbitals: Vec<usize> = (0..mat.nrows()).collect();
        let orbitals = orbitals.unwrap_or(&default_orbitals);
        let mut table = HoppingTable::new();
        for ((i, j), x) in mat.indexed_iter() {
            table.add(r, orbitals[i], orbitals[j], multiplier * x.to_complex());
        }
        table
    }
}

impl Extend<HoppingEntry> for HoppingTable {
    fn extend<T: IntoIterator<Item = HoppingEntry>>(&mut self, iter: T) {
        for (r, i, j, a) in iter {
            self.add(r, i, j, a);
        }
    }
}

impl FromIterator<HoppingEntry> for HoppingTable {
    fn from_iter<T: IntoIterator<Item = HoppingEntry>>(iter: T) -> Self {
        let mut table = HoppingTable::new();
        table.extend(iter);
        table
    }
}
