//! Reading the Wannier90 real-space Hamiltonian `seedname_hr.dat`.
//!
//! The file is written by wannier90 with `write_hr = true` and looks like
//! ```text
//! written on 19Oct2026 at 12:00:00
//!           2
//!          19
//!     4    1    1    1    1    1    1    1    1    1    1    1    1    1    1
//!     1    1    1    4
//!    -1   -1    0    1    1   -0.001085    0.000000
//!    ...
//! ```
//! that is a comment line, the number of Wannier functions $N$, the number of lattice
//! vectors `nrpts`, the degeneracy of every lattice vector (15 per line) and then
//! `nrpts`$\times N^2$ records `R1 R2 R3 i j Re Im` with 1-based orbital indices.
//!
//! Only the hoppings are stored in the file, so the unit cell and the orbital positions
//! have to be given when building a [`Model`].
use crate::Model;
use crate::error::{Result, TbError};
use crate::hopping::{HoppingEntry, HoppingTable};
use log::{debug, info};
use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::str::FromStr;

const DEGENERACIES_PER_LINE: usize = 15;

/// Post-processing applied by [`Model::from_hr`] after reading the file.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct HrOptions {
    /// Drop every hopping with $|t|\le$ `h_cutoff`.
    pub h_cutoff: Option<f64>,
    /// Add the Hermitian partner of every hopping read from the file.
    pub add_cc: bool,
    /// Energy subtracted from every on-site term, usually the Fermi energy.
    pub zero_energy: f64,
    pub occupations: Option<Vec<f64>>,
    pub labels: Option<Vec<String>>,
}

impl HrOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_cutoff(mut self, h_cutoff: f64) -> Self {
        self.h_cutoff = Some(h_cutoff);
        self
    }
    pub fn with_add_cc(mut self, add_cc: bool) -> Self {
        self.add_cc = add_cc;
        self
    }
    pub fn with_zero_energy(mut self, zero_energy: f64) -> Self {
        self.zero_energy = zero_energy;
        self
    }
    pub fn with_occupations(mut self, occupations: Vec<f64>) -> Self {
        self.occupations = Some(occupations);
        self
    }
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }
}

/// Line source that remembers where it is, for error messages.
struct HrLines<'a, R> {
    lines: Lines<R>,
    line: usize,
    file: &'a str,
}

impl<'a, R: BufRead> HrLines<'a, R> {
    fn new(reader: R, file: &'a str) -> Self {
        HrLines {
            lines: reader.lines(),
            line: 0,
            file,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        match self.lines.next() {
            Some(line) => {
                self.line += 1;
                Ok(Some(line?))
            }
            None => Ok(None),
        }
    }

    /// Next line, which has to exist.
    fn required(&mut self, what: &str) -> Result<String> {
        self.next_line()?.ok_or_else(|| TbError::TruncatedFile {
            file: self.file.to_string(),
            message: format!("the file ends before {}", what),
        })
    }

    /// Next non-blank line, `None` at the end of the stream.
    fn next_record(&mut self) -> Result<Option<String>> {
        while let Some(line) = self.next_line()? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    fn error(&self, message: String) -> TbError {
        TbError::FileParse {
            file: self.file.to_string(),
            line: self.line,
            message,
        }
    }

    fn parse<T>(&self, token: &str, what: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        token
            .parse::<T>()
            .map_err(|e| self.error(format!("failed to parse {} '{}': {}", what, token, e)))
    }
}

fn parse_hr<R: BufRead>(reader: R, file: &str) -> Result<(usize, Vec<HoppingEntry>)> {
    let mut lines = HrLines::new(reader, file);
    lines.required("the header")?;
    let line = lines.required("the number of Wannier functions")?;
    let norb: usize = lines.parse(line.trim(), "the number of Wannier functions")?;
    let line = lines.required("the number of lattice vectors")?;
    let nrpts: usize = lines.parse(line.trim(), "the number of lattice vectors")?;

    let mut degeneracies: Vec<usize> = Vec::with_capacity(nrpts);
    for _ in 0..nrpts.div_ceil(DEGENERACIES_PER_LINE) {
        let line = lines.required("the end of the degeneracy block")?;
        for token in line.split_whitespace() {
            let deg: usize = lines.parse(token, "degeneracy")?;
            if deg == 0 {
                return Err(lines.error("degeneracy must be positive".to_string()));
            }
            degeneracies.push(deg);
        }
    }
    if degeneracies.len() != nrpts {
        return Err(TbError::DegeneracyCount {
            file: file.to_string(),
            expected: nrpts,
            found: degeneracies.len(),
        });
    }

    let block = norb * norb;
    let expected = nrpts * block;
    let mut entries: Vec<HoppingEntry> = Vec::with_capacity(expected);
    while let Some(line) = lines.next_record()? {
        let k = entries.len();
        if k >= expected {
            return Err(lines.error(format!("more than {} hopping records", expected)));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 7 {
            return Err(TbError::HoppingRecordFields {
                file: file.to_string(),
                line: lines.line,
                found: tokens.len(),
            });
        }
        let mut R = [0isize; 3];
        for d in 0..3 {
            R[d] = lines.parse(tokens[d], "lattice vector component")?;
        }
        let mut index = [0usize; 2];
        for (n, token) in tokens[3..5].iter().enumerate() {
            let i: usize = lines.parse(token, "orbital index")?;
            if i == 0 || i > norb {
                return Err(lines.error(format!("orbital index {} is outside 1..={}", i, norb)));
            }
            index[n] = i - 1;
        }
        let re: f64 = lines.parse(tokens[5], "real part")?;
        let im: f64 = lines.parse(tokens[6], "imaginary part")?;
        let amplitude = Complex64::new(re, im) / degeneracies[k / block] as f64;
        entries.push((R, index[0], index[1], amplitude));
    }
    if entries.len() < expected {
        return Err(TbError::TruncatedFile {
            file: file.to_string(),
            message: format!("expected {} hopping records, found {}", expected, entries.len()),
        });
    }
    debug!(
        "read {} hopping records for {} orbitals and {} lattice vectors from {}",
        entries.len(),
        norb,
        nrpts,
        file
    );
    Ok((norb, entries))
}

/// Reads `_hr.dat` content from any buffered source.
///
/// Returns the number of orbitals and every record as `(R, i, j, amplitude)` with
/// 0-based indices and the amplitude divided by the degeneracy of its lattice vector.
pub fn read_hr<R: BufRead>(reader: R) -> Result<(usize, Vec<HoppingEntry>)> {
    parse_hr(reader, "<stream>")
}

/// Same as [`read_hr`] for a file on disk; errors carry the file path.
pub fn read_hr_file<P: AsRef<Path>>(path: P) -> Result<(usize, Vec<HoppingEntry>)> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let file = File::open(path).map_err(|source| TbError::FileOpen {
        path: name.clone(),
        source,
    })?;
    parse_hr(BufReader::new(file), &name)
}

impl Model {
    /// Builds a model from `_hr.dat` content, `orb` holds the fractional position of each
    /// of the $N$ Wannier functions (one row per orbital).
    pub fn from_hr<R: BufRead>(
        reader: R,
        lat: Array2<f64>,
        orb: Array2<f64>,
        options: &HrOptions,
    ) -> Result<Model> {
        let (norb, entries) = read_hr(reader)?;
        Model::from_hr_entries(norb, entries, lat, orb, options)
    }

    /// Same as [`Model::from_hr`] reading from `path`.
    pub fn from_hr_file<P: AsRef<Path>>(
        path: P,
        lat: Array2<f64>,
        orb: Array2<f64>,
        options: &HrOptions,
    ) -> Result<Model> {
        let (norb, entries) = read_hr_file(&path)?;
        let model = Model::from_hr_entries(norb, entries, lat, orb, options)?;
        info!(
            "loaded {} orbitals and {} hoppings from {}",
            model.norb(),
            model.hoppings().len(),
            path.as_ref().display()
        );
        Ok(model)
    }

    fn from_hr_entries(
        norb: usize,
        entries: Vec<HoppingEntry>,
        lat: Array2<f64>,
        orb: Array2<f64>,
        options: &HrOptions,
    ) -> Result<Model> {
        if orb.nrows() != norb {
            return Err(TbError::DimensionMismatch {
                context: "orb rows".to_string(),
                expected: norb,
                found: orb.nrows(),
            });
        }
        let mut table: HoppingTable = entries.into_iter().collect();
        if let Some(cutoff) = options.h_cutoff {
            table = table.filtered(|t| t.norm() > cutoff);
        }
        if options.add_cc {
            table = table.conjugate_completed();
        }
        if options.zero_energy != 0.0 {
            for i in 0..norb {
                table.add([0, 0, 0], i, i, -options.zero_energy);
            }
        }
        Model::tb_model(
            lat,
            orb,
            table,
            options.occupations.clone(),
            options.labels.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::*;
    use std::io::{Cursor, Write};

    const TWO_VECTORS: &str = "\
test
1
2
1 2
0 0 0 1 1 2.0 0.0
1 0 0 1 1 4.0 0.0
";

    #[test]
    fn records_are_divided_by_degeneracy() {
        let (norb, entries) = read_hr(Cursor::new(TWO_VECTORS)).unwrap();
        assert_eq!(norb, 1);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ([0, 0, 0], 0, 0, Complex64::new(2.0, 0.0)));
        assert_eq!(entries[1], ([1, 0, 0], 0, 0, Complex64::new(2.0, 0.0)));
    }

    #[test]
    fn imaginary_part_is_divided_too() {
        let content = "c\n1\n1\n4\n0 0 0 1 1 2.0 -8.0\n";
        let (_, entries) = read_hr(Cursor::new(content)).unwrap();
        assert_eq!(entries[0].3, Complex64::new(0.5, -2.0));
    }

    #[test]
    fn degeneracies_span_several_lines() {
        let mut content = String::from("c\n1\n17\n");
        content.push_str(&"1 ".repeat(15));
        content.push_str("\n2 1\n");
        for n in 0..17 {
            content.push_str(&format!("{} 0 0 1 1 1.0 0.0\n", n as isize - 8));
        }
        let (_, entries) = read_hr(Cursor::new(content)).unwrap();
        assert_eq!(entries.len(), 17);
        assert_eq!(entries[15].3, Complex64::new(0.5, 0.0));
        assert_eq!(entries[16].3, Complex64::new(1.0, 0.0));
    }

    #[test]
    fn malformed_files_give_distinct_errors() {
        let wrong_count = "c\n1\n2\n1 2 3\n0 0 0 1 1 1.0 0.0\n1 0 0 1 1 1.0 0.0\n";
        assert!(matches!(
            read_hr(Cursor::new(wrong_count)),
            Err(TbError::DegeneracyCount { expected: 2, found: 3, .. })
        ));
        let short_record = "c\n1\n1\n1\n0 0 0 1 1 1.0\n";
        assert!(matches!(
            read_hr(Cursor::new(short_record)),
            Err(TbError::HoppingRecordFields { line: 5, found: 6, .. })
        ));
        let missing_record = "c\n1\n2\n1 1\n0 0 0 1 1 1.0 0.0\n";
        assert!(matches!(
            read_hr(Cursor::new(missing_record)),
            Err(TbError::TruncatedFile { .. })
        ));
        let no_header = "c\n1\n";
        assert!(matches!(
            read_hr(Cursor::new(no_header)),
            Err(TbError::TruncatedFile { .. })
        ));
        let bad_index = "c\n1\n1\n1\n0 0 0 2 1 1.0 0.0\n";
        assert!(matches!(
            read_hr(Cursor::new(bad_index)),
            Err(TbError::FileParse { line: 5, .. })
        ));
        let bad_number = "c\n1\n1\n1\n0 0 0 1 1 x 0.0\n";
        assert!(matches!(
            read_hr(Cursor::new(bad_number)),
            Err(TbError::FileParse { .. })
        ));
        let extra = "c\n1\n1\n1\n0 0 0 1 1 1.0 0.0\n1 0 0 1 1 1.0 0.0\n";
        assert!(matches!(
            read_hr(Cursor::new(extra)),
            Err(TbError::FileParse { .. })
        ));
    }

    fn two_orbital_hr() -> String {
        let mut content = String::from("c\n2\n1\n1\n");
        let values = [[0.5, 1.0], [1.0, 2.0]];
        for j in 0..2 {
            for i in 0..2 {
                content.push_str(&format!("0 0 0 {} {} {} 0.0\n", i + 1, j + 1, values[i][j]));
            }
        }
        content
    }

    #[test]
    fn cutoff_is_strict() {
        let lat = Array2::eye(3);
        let orb = arr2(&[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]]);
        let options = HrOptions::new().with_cutoff(0.5);
        let model = Model::from_hr(Cursor::new(two_orbital_hr()), lat, orb, &options).unwrap();
        assert_eq!(model.hoppings().len(), 3);
        assert_eq!(model.hoppings().get([0, 0, 0], 0, 0), Complex64::new(0.0, 0.0));
        assert_eq!(model.hoppings().get([0, 0, 0], 1, 1), Complex64::new(2.0, 0.0));
    }

    #[test]
    fn zero_energy_shifts_onsite_terms() {
        let lat = Array2::eye(3);
        let orb = arr2(&[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]]);
        let options = HrOptions::new().with_zero_energy(0.5).with_labels(["s", "p"]);
        let model = Model::from_hr(Cursor::new(two_orbital_hr()), lat, orb, &options).unwrap();
        assert_eq!(model.hoppings().get([0, 0, 0], 0, 0), Complex64::new(0.0, 0.0));
        assert_eq!(model.hoppings().get([0, 0, 0], 1, 1), Complex64::new(1.5, 0.0));
        assert_eq!(model.hoppings().get([0, 0, 0], 0, 1), Complex64::new(1.0, 0.0));
        assert_eq!(model.labels(), vec!["s", "p"]);
    }

    #[test]
    fn positions_must_match_orbital_count() {
        let orb = arr2(&[[0.0, 0.0, 0.0]]);
        let err = Model::from_hr(Cursor::new(two_orbital_hr()), Array2::eye(3), orb, &HrOptions::default());
        assert!(matches!(err, Err(TbError::DimensionMismatch { expected: 2, found: 1, .. })));
    }

    #[test]
    fn file_errors_carry_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "c\n1\n2\n1\n").unwrap();
        let path = file.path().display().to_string();
        match read_hr_file(file.path()) {
            Err(TbError::DegeneracyCount { file, .. }) => assert_eq!(file, path),
            other => panic!("unexpected result {:?}", other),
        }
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing_hr.dat");
        assert!(matches!(read_hr_file(&missing), Err(TbError::FileOpen { .. })));
    }
}
