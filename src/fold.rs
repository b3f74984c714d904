//! Folding a model onto a smaller unit cell, the inverse of [`Model::supercell`].
//!
//! Orbitals that are related by a lattice vector of the new cell (and carry the same
//! label) become a single orbital, and the hoppings of every periodic repeat are
//! summed into the folded model. Before anything is built the relation between the
//! two cells is checked: the volume ratio, the number of orbitals per label and the
//! resulting occupation all have to be integral.
use crate::Model;
use crate::error::{Result, TbError};
use crate::hopping::{HoppingEntry, HoppingTable, LatticeVector};
use crate::math::{det3, inv3, is_near_integer, same_modulo_lattice, vec_dot_mat, wrap_unit};
use crate::orbital::Orbital;
use log::{debug, info, warn};
use ndarray::{ArrayBase, Data, Ix2};
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const OCCUPATION_TOLERANCE: f64 = 1e-6;

/// Parameters of [`Model::fold_model`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FoldOptions {
    /// Cartesian position of the new cell's origin.
    pub unit_cell_offset: [f64; 3],
    /// Labels deciding which orbitals may be merged; the model's own labels if `None`.
    pub orbital_labels: Option<Vec<String>>,
    /// Orbitals spanning the folded cell; by default every orbital inside the new cell.
    pub target_indices: Option<Vec<usize>>,
    /// Tolerance for all position comparisons, in fractional units of the new cell.
    /// The Hermiticity check reuses it for amplitudes.
    pub position_tolerance: f64,
    pub uc_volume_tolerance: f64,
    pub check_orbital_ratio: bool,
    pub check_uc_volume: bool,
    pub check_cc: bool,
}

impl Default for FoldOptions {
    fn default() -> Self {
        Self {
            unit_cell_offset: [0.0; 3],
            orbital_labels: None,
            target_indices: None,
            position_tolerance: 1e-6,
            uc_volume_tolerance: 1e-6,
            check_orbital_ratio: true,
            check_uc_volume: true,
            check_cc: true,
        }
    }
}

impl FoldOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_offset(mut self, offset: [f64; 3]) -> Self {
        self.unit_cell_offset = offset;
        self
    }
    pub fn with_orbital_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.orbital_labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }
    pub fn with_target_indices(mut self, indices: Vec<usize>) -> Self {
        self.target_indices = Some(indices);
        self
    }
    pub fn with_position_tolerance(mut self, tol: f64) -> Self {
        self.position_tolerance = tol;
        self
    }
    pub fn with_uc_volume_tolerance(mut self, tol: f64) -> Self {
        self.uc_volume_tolerance = tol;
        self
    }
    pub fn with_check_orbital_ratio(mut self, check: bool) -> Self {
        self.check_orbital_ratio = check;
        self
    }
    pub fn with_check_uc_volume(mut self, check: bool) -> Self {
        self.check_uc_volume = check;
        self
    }
    pub fn with_check_cc(mut self, check: bool) -> Self {
        self.check_cc = check;
        self
    }
}

/// Target orbitals sharing a label and a position modulo the new lattice.
#[derive(Debug, Clone)]
struct Cluster {
    /// Original orbital indices, the first one is the representative.
    members: Vec<usize>,
    label: String,
    /// Reduced position of the representative, in `[-tol, 1)`.
    position: [f64; 3],
}

fn partition(targets: &[usize], reduced: &[[f64; 3]], labels: &[String], tol: f64) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for &k in targets {
        match clusters
            .iter_mut()
            .find(|c| c.label == labels[k] && same_modulo_lattice(&reduced[k], &c.position, tol))
        {
            Some(cluster) => cluster.members.push(k),
            None => clusters.push(Cluster {
                members: vec![k],
                label: labels[k].clone(),
                position: reduced[k].map(|x| wrap_unit(x, tol)),
            }),
        }
    }
    clusters
}

fn check_orbital_ratio(labels: &[String], clusters: &[Cluster]) -> Result<()> {
    let mut total: BTreeMap<&str, usize> = BTreeMap::new();
    for label in labels.iter() {
        *total.entry(label.as_str()).or_insert(0) += 1;
    }
    let mut folded: BTreeMap<&str, usize> = BTreeMap::new();
    for cluster in clusters.iter() {
        *folded.entry(cluster.label.as_str()).or_insert(0) += 1;
    }
    let mut quotient: Option<usize> = None;
    for (label, &n_total) in total.iter() {
        let n_folded = folded.get(label).copied().unwrap_or(0);
        if n_folded == 0
            || n_total % n_folded != 0
            || quotient.is_some_and(|q| q != n_total / n_folded)
        {
            return Err(TbError::OrbitalNumberMismatch {
                label: label.to_string(),
                total: n_total,
                folded: n_folded,
            });
        }
        quotient = Some(n_total / n_folded);
    }
    Ok(())
}

impl Model {
    /// Folds the model onto `new_unit_cell` (rows are lattice vectors).
    ///
    /// The target orbitals are grouped by label and reduced position; each group becomes
    /// one orbital of the new model. Every other orbital is matched to the group it is a
    /// periodic image of, which tells where a hopping into it lands in the folded cell:
    ///
    /// $$\bm R'=\mathrm{round}\left(\bm x_j+\bm R\,L L'^{-1}-\bm x_m-(\bm q_{c'}-\bm q_c)\right)$$
    ///
    /// with $\bm x$ the positions reduced to the new cell and $\bm q$ the folded positions.
    /// Contributions landing on the same key are summed; when a group has several members
    /// their hoppings are averaged.
    pub fn fold_model<S: Data<Elem = f64>>(
        &self,
        new_unit_cell: &ArrayBase<S, Ix2>,
        options: &FoldOptions,
    ) -> Result<Model> {
        let norb = self.norb();
        let tol = options.position_tolerance;
        if !(tol > 0.0) {
            return Err(TbError::InvalidTolerance {
                name: "position_tolerance",
                value: tol,
            });
        }
        if !(options.uc_volume_tolerance > 0.0) {
            return Err(TbError::InvalidTolerance {
                name: "uc_volume_tolerance",
                value: options.uc_volume_tolerance,
            });
        }
        if new_unit_cell.nrows() != 3 || new_unit_cell.ncols() != 3 {
            return Err(TbError::DimensionMismatch {
                context: "new_unit_cell".to_string(),
                expected: 3,
                found: if new_unit_cell.nrows() != 3 {
                    new_unit_cell.nrows()
                } else {
                    new_unit_cell.ncols()
                },
            });
        }
        let new_lat = new_unit_cell.to_owned();
        let new_inv = inv3(&new_lat)?;
        let labels: Vec<String> = match &options.orbital_labels {
            Some(labels) if labels.len() != norb => {
                return Err(TbError::DimensionMismatch {
                    context: "orbital_labels".to_string(),
                    expected: norb,
                    found: labels.len(),
                });
            }
            Some(labels) => labels.clone(),
            None => self.labels().iter().map(|s| s.to_string()).collect(),
        };

        let offset = options.unit_cell_offset;
        let reduced: Vec<[f64; 3]> = self
            .cart_positions()
            .outer_iter()
            .map(|c| vec_dot_mat(&[c[0] - offset[0], c[1] - offset[1], c[2] - offset[2]], &new_inv))
            .collect();

        let targets: Vec<usize> = match &options.target_indices {
            Some(indices) => {
                let mut seen = BTreeSet::new();
                for &index in indices.iter() {
                    if index >= norb {
                        return Err(TbError::InvalidOrbitalIndex { index, norb });
                    }
                    if !seen.insert(index) {
                        return Err(TbError::DuplicateTargetIndex(index));
                    }
                }
                indices.clone()
            }
            // images near 0 and near 1 both qualify, `partition` merges them
            None => (0..norb)
                .filter(|&k| reduced[k].iter().all(|&x| x >= -tol && x < 1.0))
                .collect(),
        };
        if targets.is_empty() {
            return Err(TbError::NoTargetOrbitals);
        }

        let clusters = partition(&targets, &reduced, &labels, tol);
        let new_norb = clusters.len();
        debug!("{} target orbitals form {} folded orbitals", targets.len(), new_norb);

        let ratio = (self.volume() / det3(&new_lat)).abs();
        if options.check_uc_volume {
            let n_cells = ratio.round();
            if n_cells < 1.0
                || !is_near_integer(ratio, options.uc_volume_tolerance)
                || new_norb * (n_cells as usize) != norb
            {
                return Err(TbError::UnitCellVolumeMismatch {
                    ratio,
                    norb,
                    new_norb,
                });
            }
        }
        if options.check_orbital_ratio {
            check_orbital_ratio(&labels, &clusters)?;
        }
        let images: Vec<Option<usize>> = (0..norb)
            .into_par_iter()
            .map(|k| {
                clusters
                    .iter()
                    .position(|c| c.label == labels[k] && same_modulo_lattice(&reduced[k], &c.position, tol))
            })
            .collect();
        let unmatched = images.iter().filter(|c| c.is_none()).count();
        if unmatched > 0 {
            warn!(
                "{} of {} orbitals have no image in the folded cell, their hoppings and occupation are dropped",
                unmatched, norb
            );
        }

        let mut weights = vec![0.0; new_norb];
        for (orbital, image) in self.orbitals().iter().zip(images.iter()) {
            if let Some(c) = image {
                weights[*c] += orbital.occupation;
            }
        }
        let new_occupation = weights.iter().sum::<f64>() / ratio;
        if !is_near_integer(new_occupation, OCCUPATION_TOLERANCE) {
            return Err(TbError::FractionalOccupation(new_occupation));
        }

        let mut by_source: Vec<Vec<(LatticeVector, usize, Complex64)>> = vec![Vec::new(); norb];
        for (R, i, j, hop) in self.hoppings().iter() {
            by_source[i].push((R, j, hop));
        }
        let lat_to_new = self.lat().dot(&new_inv);

        let folded: Vec<Vec<HoppingEntry>> = clusters
            .par_iter()
            .enumerate()
            .map(|(c, cluster)| {
                let weight = 1.0 / cluster.members.len() as f64;
                let mut out = Vec::new();
                for &m in cluster.members.iter() {
                    for &(R, j, hop) in by_source[m].iter() {
                        let Some(c_j) = images[j] else {
                            continue;
                        };
                        let R_red = vec_dot_mat(&[R[0] as f64, R[1] as f64, R[2] as f64], &lat_to_new);
                        let mut new_R: LatticeVector = [0; 3];
                        for d in 0..3 {
                            let delta = reduced[j][d] + R_red[d]
                                - reduced[m][d]
                                - (clusters[c_j].position[d] - cluster.position[d]);
                            new_R[d] = delta.round() as isize;
                        }
                        out.push((new_R, c, c_j, hop * weight));
                    }
                }
                out
            })
            .collect();
        let mut new_hoppings = HoppingTable::new();
        for block in folded {
            new_hoppings.extend(block);
        }

        if options.check_cc {
            if let Some((r, i, j)) = new_hoppings.hermiticity_violation(tol) {
                return Err(TbError::HermiticityViolation { r, i, j });
            }
        }

        let new_orbitals: Vec<Orbital> = clusters
            .into_iter()
            .zip(weights)
            .map(|(cluster, w)| Orbital::new(cluster.position, cluster.label, w / ratio))
            .collect();
        info!(
            "folded {} orbitals into {} (volume ratio {:.6}, {} hoppings)",
            norb,
            new_norb,
            ratio,
            new_hoppings.len()
        );
        Ok(Model::from_parts(new_lat, new_orbitals, new_hoppings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::*;

    fn labels(s: &[&str]) -> Vec<String> {
        s.iter().map(|x| x.to_string()).collect()
    }

    fn square_dimer(add_cc: bool) -> Model {
        let lat = Array2::eye(3);
        let orb = arr2(&[[0.0, 0.0, 0.0], [0.5, 0.5, 0.0]]);
        let hops = vec![
            ([0, 0, 0], 0, 1, Complex64::new(0.1, 0.0)),
            ([1, 0, 0], 0, 0, Complex64::new(0.3, 0.0)),
            ([0, 1, 0], 1, 1, Complex64::new(-0.3, 0.0)),
        ];
        Model::from_hop_list(lat, orb, hops, add_cc, Some(vec![1.0, 0.0]), Some(labels(&["a", "b"]))).unwrap()
    }

    #[test]
    fn partition_merges_images_with_same_label() {
        let reduced = vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5], [1.0 - 1e-9, 1.0, 2.0], [0.0, 0.0, 1.0]];
        let labels = labels(&["a", "b", "a", "b"]);
        let clusters = partition(&[0, 1, 2, 3], &reduced, &labels, 1e-6);
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].members, vec![0, 2]);
        assert_eq!(clusters[1].members, vec![1]);
        assert_eq!(clusters[2].members, vec![3]);
        // a "b" at the origin is not an image of the "a" there
        assert_eq!(clusters[2].label, "b");
    }

    #[test]
    fn representative_position_is_wrapped() {
        let reduced = vec![[1.25, -0.5, 1.0 - 1e-9]];
        let clusters = partition(&[0], &reduced, &labels(&["a"]), 1e-6);
        let p = clusters[0].position;
        assert!((p[0] - 0.25).abs() < 1e-12);
        assert!((p[1] - 0.5).abs() < 1e-12);
        // already inside the cell, kept next to 1
        assert_eq!(p[2], 1.0 - 1e-9);
    }

    #[test]
    fn unmatched_orbitals_do_not_count_towards_occupation() {
        let lat = Array2::eye(3);
        let orb = arr2(&[[0.0, 0.0, 0.0], [0.5, 0.5, 0.0], [-0.01, 0.5, 0.0]]);
        let hops = vec![([0, 0, 0], 0, 1, Complex64::new(0.1, 0.0))];
        let model = Model::from_hop_list(
            lat,
            orb,
            hops,
            true,
            Some(vec![1.0, 0.0, 0.5]),
            Some(labels(&["a", "b", "c"])),
        )
        .unwrap();
        let options = FoldOptions::new()
            .with_check_orbital_ratio(false)
            .with_check_uc_volume(false);
        let folded = model.fold_model(&Array2::eye(3), &options).unwrap();
        assert_eq!(folded.norb(), 2);
        assert_eq!(folded.occupation(), 1.0);
    }

    #[test]
    fn orbital_ratio_requires_every_label() {
        let clusters = partition(&[1], &[[0.0; 3], [0.5; 3]], &labels(&["a", "b"]), 1e-6);
        let err = check_orbital_ratio(&labels(&["a", "b"]), &clusters).unwrap_err();
        assert!(err.to_string().contains("individual orbital numbers"));
    }

    #[test]
    fn folding_onto_same_cell_is_identity() {
        let model = square_dimer(true);
        let folded = model.fold_model(&Array2::eye(3), &FoldOptions::default()).unwrap();
        assert!(folded.approx_eq(&model, 1e-12));
    }

    #[test]
    fn non_hermitian_result_fails_cc_check() {
        let model = square_dimer(false);
        let err = model.fold_model(&Array2::eye(3), &FoldOptions::default()).unwrap_err();
        assert!(matches!(err, TbError::HermiticityViolation { .. }));
        assert!(err.to_string().contains("cc"));
        let options = FoldOptions::new().with_check_cc(false);
        assert!(model.fold_model(&Array2::eye(3), &options).is_ok());
    }

    #[test]
    fn invalid_options_are_rejected() {
        let model = square_dimer(true);
        let cell = Array2::<f64>::eye(3);
        let options = FoldOptions::new().with_orbital_labels(["a"]);
        assert!(matches!(
            model.fold_model(&cell, &options),
            Err(TbError::DimensionMismatch { .. })
        ));
        let options = FoldOptions::new().with_target_indices(vec![0, 0]);
        assert!(matches!(
            model.fold_model(&cell, &options),
            Err(TbError::DuplicateTargetIndex(0))
        ));
        let options = FoldOptions::new().with_target_indices(vec![2]);
        assert!(matches!(
            model.fold_model(&cell, &options),
            Err(TbError::InvalidOrbitalIndex { index: 2, norb: 2 })
        ));
        let options = FoldOptions::new().with_position_tolerance(0.0);
        assert!(matches!(
            model.fold_model(&cell, &options),
            Err(TbError::InvalidTolerance { .. })
        ));
        let options = FoldOptions::new().with_offset([0.7, 0.2, 0.3]);
        assert!(matches!(
            model.fold_model(&cell, &options),
            Err(TbError::NoTargetOrbitals)
        ));
    }

    #[test]
    fn non_integer_volume_ratio_is_rejected() {
        let model = square_dimer(true);
        let cell = arr2(&[[1.5, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let options = FoldOptions::new().with_check_orbital_ratio(false);
        let err = model.fold_model(&cell, &options).unwrap_err();
        assert!(err.to_string().contains("unit cell volume"));
    }

    #[test]
    fn merged_targets_average_their_hoppings() {
        // a two-site chain whose copies differ slightly: folding both copies averages them
        let lat = arr2(&[[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let orb = arr2(&[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]]);
        let hops = vec![
            ([0, 0, 0], 0, 0, Complex64::new(1.0, 0.0)),
            ([0, 0, 0], 1, 1, Complex64::new(3.0, 0.0)),
        ];
        let model = Model::from_hop_list(lat, orb, hops, false, None, Some(labels(&["s", "s"]))).unwrap();
        let options = FoldOptions::new().with_target_indices(vec![0, 1]);
        let folded = model.fold_model(&Array2::eye(3), &options).unwrap();
        assert_eq!(folded.norb(), 1);
        assert!((folded.hoppings().get([0, 0, 0], 0, 0) - Complex64::new(2.0, 0.0)).norm() < 1e-12);
    }
}
