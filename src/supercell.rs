//! 这个模块是用来扩胞的: 沿着三个晶格矢量方向分别扩大 nx, ny, nz 倍.
use crate::Model;
use crate::error::{Result, TbError};
use crate::hopping::{HoppingEntry, HoppingTable, LatticeVector};
use crate::orbital::Orbital;
use log::debug;
use rayon::prelude::*;

/// All translations `0 <= t < size`, `tx` outermost and `tz` innermost.
fn translations(size: [usize; 3]) -> Vec<[usize; 3]> {
    let mut out = Vec::with_capacity(size[0] * size[1] * size[2]);
    for tx in 0..size[0] {
        for ty in 0..size[1] {
            for tz in 0..size[2] {
                out.push([tx, ty, tz]);
            }
        }
    }
    out
}

#[inline(always)]
fn flat_index(t: [usize; 3], size: [usize; 3]) -> usize {
    (t[0] * size[1] + t[1]) * size[2] + t[2]
}

impl Model {
    /// Builds the `size[0] × size[1] × size[2]` supercell of the model.
    ///
    /// The new lattice vectors are $\bm a_d' = n_d\bm a_d$. Orbital `n` of the copy
    /// shifted by `t` gets index `flat(t)·norb + n` and position $(\bm p_n+\bm t)/\bm n$.
    /// A hopping $(\bm R,i,j)$ leaving copy $\bm t$ lands in copy
    /// $\bm t+\bm R=\bm n\bm q+\bm r$, so it becomes $(\bm q,(\bm t,i),(\bm r,j))$.
    pub fn supercell(&self, size: [usize; 3]) -> Result<Model> {
        if size.iter().any(|&n| n == 0) {
            return Err(TbError::InvalidSupercellSize(size));
        }
        let norb = self.norb();
        let cells = translations(size);

        let mut new_lat = self.lat().clone();
        for (d, mut row) in new_lat.outer_iter_mut().enumerate() {
            row *= size[d] as f64;
        }

        let mut new_orbitals = Vec::with_capacity(norb * cells.len());
        for t in cells.iter() {
            for orbital in self.orbitals().iter() {
                let mut position = [0.0; 3];
                for d in 0..3 {
                    position[d] = (orbital.position[d] + t[d] as f64) / size[d] as f64;
                }
                new_orbitals.push(Orbital::new(
                    position,
                    orbital.label.clone(),
                    orbital.occupation,
                ));
            }
        }

        let hops: Vec<HoppingEntry> = self.hoppings().iter().collect();
        let emitted: Vec<Vec<HoppingEntry>> = cells
            .par_iter()
            .map(|t| {
                let source = flat_index(*t, size) * norb;
                hops.iter()
                    .map(|&(R, i, j, hop)| {
                        let mut q: LatticeVector = [0; 3];
                        let mut r = [0usize; 3];
                        for d in 0..3 {
                            let shifted = t[d] as isize + R[d];
                            let n = size[d] as isize;
                            q[d] = shifted.div_euclid(n);
                            r[d] = shifted.rem_euclid(n) as usize;
                        }
                        (q, source + i, flat_index(r, size) * norb + j, hop)
                    })
                    .collect()
            })
            .collect();
        let mut new_hoppings = HoppingTable::new();
        for block in emitted {
            new_hoppings.extend(block);
        }
        debug!(
            "supercell {:?}: {} orbitals -> {}, {} hoppings -> {}",
            size,
            norb,
            new_orbitals.len(),
            self.hoppings().len(),
            new_hoppings.len()
        );
        Ok(Model::from_parts(new_lat, new_orbitals, new_hoppings))
    }
}
