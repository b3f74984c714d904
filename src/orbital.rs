use serde::{Deserialize, Serialize};
use std::fmt;

/// A basis orbital of the tight-binding model.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Orbital {
    /// Position in fractional coordinates of the owning unit cell.
    pub position: [f64; 3],
    /// Opaque label, only used to decide which orbitals may be merged when folding.
    pub label: String,
    /// Occupation weight; the weights sum to the model's electron count.
    pub occupation: f64,
}

impl Orbital {
    pub fn new(position: [f64; 3], label: impl Into<String>, occupation: f64) -> Orbital {
        Orbital {
            position,
            label: label.into(),
            occupation,
        }
    }
}

impl fmt::Display for Orbital {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Orbital {{ label: {}, position: {:?}, occupation: {} }}",
            self.label, self.position, self.occupation
        )
    }
}
