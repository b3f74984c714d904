//! This crate stores periodic tight-binding models as sparse hopping tables and
//! performs two structural transformations on them:
//!
//! 1: Expand a model into an `nx × ny × nz` supercell ([`Model::supercell`]).
//!
//! 2: Fold a (possibly perturbed) supercell model back onto a smaller reference
//!    unit cell ([`Model::fold_model`]), checking that both cells are compatible.
//!
//! Models can be written by hand ([`Model::tb_model`], [`Model::add_hop`]) or read from
//! the Wannier90 `seedname_hr.dat` file ([`Model::from_hr_file`]).
//!
//! # Examples
//! ```
//! use ndarray::array;
//! use Rustb_fold::{FoldOptions, HoppingTable, Model};
//!
//! let lat = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
//! let orb = array![[0.0, 0.0, 0.0], [0.5, 0.5, 0.0]];
//! let mut model = Model::tb_model(lat.clone(), orb, HoppingTable::new(), None, None).unwrap();
//! model.add_hop(-1.0, 0, 1, [0, 0, 0]).unwrap();
//! model.add_hop(-1.0, 1, 0, [0, 0, 0]).unwrap();
//!
//! let supercell = model.supercell([2, 1, 1]).unwrap();
//! assert_eq!(supercell.norb(), 4);
//! let folded = supercell.fold_model(&lat, &FoldOptions::default()).unwrap();
//! assert!(folded.approx_eq(&model, 1e-8));
//! ```
#![allow(non_snake_case)]
pub mod bloch;
pub mod error;
pub mod fold;
pub mod generics;
pub mod hopping;
pub mod math;
pub mod model_struct;
pub mod orbital;
pub mod supercell;
pub mod wannier90;

pub use crate::error::{Result, TbError};
pub use crate::fold::FoldOptions;
pub use crate::hopping::{HoppingEntry, HoppingTable, LatticeVector};
pub use crate::orbital::Orbital;
pub use crate::wannier90::{HrOptions, read_hr, read_hr_file};

use crate::math::det3;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// A periodic tight-binding model: unit cell, orbitals and the hopping table
/// $\bra{i\bm 0}\hat H\ket{j\bm R}$.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
    /// The lattice vectors, a 3$\times$3 matrix whose rows are the basis vectors in Cartesian coordinates.
    lat: Array2<f64>,
    /// The orbitals in index order, positions in fractional coordinates.
    orbitals: Vec<Orbital>,
    /// Every stored hopping, both directions included.
    hoppings: HoppingTable,
}

impl Model {
    /// Builds a model from a unit cell, fractional orbital positions (one row per orbital)
    /// and a hopping table.
    ///
    /// Missing occupations default to `0.0`, missing labels to the orbital index.
    pub fn tb_model(
        lat: Array2<f64>,
        orb: Array2<f64>,
        hoppings: HoppingTable,
        occupations: Option<Vec<f64>>,
        labels: Option<Vec<String>>,
    ) -> Result<Model> {
        if lat.nrows() != 3 || lat.ncols() != 3 {
            return Err(TbError::DimensionMismatch {
                context: "lat".to_string(),
                expected: 3,
                found: if lat.nrows() != 3 { lat.nrows() } else { lat.ncols() },
            });
        }
        let volume = det3(&lat);
        if volume.abs() < 1e-12 {
            return Err(TbError::SingularUnitCell { volume });
        }
        if orb.ncols() != 3 {
            return Err(TbError::DimensionMismatch {
                context: "orb columns".to_string(),
                expected: 3,
                found: orb.ncols(),
            });
        }
        let norb = orb.nrows();
        let occupations = occupations.unwrap_or_else(|| vec![0.0; norb]);
        if occupations.len() != norb {
            return Err(TbError::DimensionMismatch {
                context: "occupations".to_string(),
                expected: norb,
                found: occupations.len(),
            });
        }
        let labels = labels.unwrap_or_else(|| (0..norb).map(|i| i.to_string()).collect());
        if labels.len() != norb {
            return Err(TbError::DimensionMismatch {
                context: "labels".to_string(),
                expected: norb,
                found: labels.len(),
            });
        }
        if let Some(index) = hoppings.max_orbital_index() {
            if index >= norb {
                return Err(TbError::InvalidOrbitalIndex { index, norb });
            }
        }
        let orbitals = orb
            .outer_iter()
            .zip(labels)
            .zip(occupations)
            .map(|((p, label), occ)| Orbital::new([p[0], p[1], p[2]], label, occ))
            .collect();
        Ok(Model {
            lat,
            orbitals,
            hoppings,
        })
    }

    /// Same as [`Model::tb_model`] from a flat list of `(R, i, j, amplitude)` entries.
    /// With `add_cc` every entry also contributes its Hermitian partner.
    pub fn from_hop_list<I>(
        lat: Array2<f64>,
        orb: Array2<f64>,
        hop_list: I,
        add_cc: bool,
        occupations: Option<Vec<f64>>,
        labels: Option<Vec<String>>,
    ) -> Result<Model>
    where
        I: IntoIterator<Item = HoppingEntry>,
    {
        let table: HoppingTable = hop_list.into_iter().collect();
        let table = if add_cc {
            table.conjugate_completed()
        } else {
            table
        };
        Model::tb_model(lat, orb, table, occupations, labels)
    }

    /// Assembles a model whose parts are already known to be consistent.
    pub(crate) fn from_parts(
        lat: Array2<f64>,
        orbitals: Vec<Orbital>,
        hoppings: HoppingTable,
    ) -> Model {
        Model {
            lat,
            orbitals,
            hoppings,
        }
    }
}
