use std::fmt::{self, Display, Formatter};

/// Multiplication triple (a, b, c) with c = a*b in the engine's ring.
///
/// Triples are correlated randomness handed out by a dealer before the online
/// phase. Each triple masks exactly one multiplication; the engines take them
/// by value so a consumed triple cannot be offered twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeaverTriple {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl BeaverTriple {
    pub fn new(a: u32, b: u32, c: u32) -> Self {
        Self { a, b, c }
    }
}

impl Display for BeaverTriple {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.a, self.b, self.c)
    }
}

pub type TripleVec = Vec<BeaverTriple>;
