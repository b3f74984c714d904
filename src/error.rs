//! src/error.rs
//! This module defines the error type shared by the whole crate.
//! Every fallible operation (parsing `_hr.dat` files, building models, expanding
//! and folding them) returns a `Result` instead of panicking on caller input.

use thiserror::Error;

/// The primary error type for all fallible operations in this library.
#[derive(Error, Debug)]
pub enum TbError {
    // --- I/O and Parsing Errors ---
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Unable to open '{path}'")]
    FileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse data from file '{file}' at line {line}: {message}")]
    FileParse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Wrong number of degeneracy entries in '{file}': expected {expected}, found {found}")]
    DegeneracyCount {
        file: String,
        expected: usize,
        found: usize,
    },

    #[error("Hopping record at line {line} of '{file}' has {found} fields, expected 7")]
    HoppingRecordFields {
        file: String,
        line: usize,
        found: usize,
    },

    #[error("File '{file}' is truncated: {message}")]
    TruncatedFile { file: String, message: String },

    // --- Invalid Input and Arguments ---
    #[error("Dimension mismatch for '{context}': expected {expected}, got {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("Orbital index {index} is out of range for a model with {norb} orbitals")]
    InvalidOrbitalIndex { index: usize, norb: usize },

    #[error("Invalid supercell size {0:?}: every multiplier must be >= 1")]
    InvalidSupercellSize([usize; 3]),

    #[error("The unit cell is singular (volume {volume})")]
    SingularUnitCell { volume: f64 },

    #[error("Target orbital index {0} appears more than once")]
    DuplicateTargetIndex(usize),

    #[error("Tolerance '{name}' must be positive, got {value}")]
    InvalidTolerance { name: &'static str, value: f64 },

    #[error("No orbital lies inside the new unit cell, nothing to fold")]
    NoTargetOrbitals,

    // --- Folding Consistency Errors ---
    #[error(
        "Inconsistent unit cell volume: the volume ratio {ratio} does not allow folding {norb} orbitals into {new_norb}"
    )]
    UnitCellVolumeMismatch {
        ratio: f64,
        norb: usize,
        new_norb: usize,
    },

    #[error(
        "The individual orbital numbers are inconsistent: label '{label}' occurs {total} times in the model but {folded} times in the folded unit cell"
    )]
    OrbitalNumberMismatch {
        label: String,
        total: usize,
        folded: usize,
    },

    #[error("The folded model would have a fractional occupation of {0}")]
    FractionalOccupation(f64),

    #[error(
        "The folded hoppings fail the cc check: the Hermitian partner of R={r:?}, ({i}, {j}) does not match"
    )]
    HermiticityViolation { r: [isize; 3], i: usize, j: usize },
}

/// A specialized `Result` type for this library's operations.
pub type Result<T> = std::result::Result<T, TbError>;
