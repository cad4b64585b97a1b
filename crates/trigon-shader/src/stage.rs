use std::fmt;

/// One shader compilation unit within a program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
    Compute,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Vertex, StageKind::Fragment, StageKind::Compute];

    /// Parses a `#shader` marker keyword (`vertex`, `fragment`, `compute`).
    ///
    /// Matching is ASCII case-insensitive.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.keyword().eq_ignore_ascii_case(word))
    }

    /// The marker keyword for this stage.
    pub fn keyword(self) -> &'static str {
        match self {
            StageKind::Vertex   => "vertex",
            StageKind::Fragment => "fragment",
            StageKind::Compute  => "compute",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
