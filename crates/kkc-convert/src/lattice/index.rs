// Positions and ranges in the two coordinate spaces of a composing text

use kkc_core::ComposingText;

/// A position tagged with its coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LatticeIndex {
    /// Raw input element position.
    Input(usize),
    /// Rendered surface character position.
    Surface(usize),
}

impl LatticeIndex {
    pub fn is_zero(self) -> bool {
        matches!(self, LatticeIndex::Input(0) | LatticeIndex::Surface(0))
    }
}

/// A half-open span in one coordinate space. Ranges never mix spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LatticeRange {
    Input { start: usize, end: usize },
    Surface { start: usize, end: usize },
}

impl LatticeRange {
    /// The empty range at input position 0, used by root chains.
    pub const ZERO: LatticeRange = LatticeRange::Input { start: 0, end: 0 };

    pub fn count(self) -> usize {
        match self {
            LatticeRange::Input { start, end } | LatticeRange::Surface { start, end } => end - start,
        }
    }

    pub fn start(self) -> LatticeIndex {
        match self {
            LatticeRange::Input { start, .. } => LatticeIndex::Input(start),
            LatticeRange::Surface { start, .. } => LatticeIndex::Surface(start),
        }
    }

    pub fn end(self) -> LatticeIndex {
        match self {
            LatticeRange::Input { end, .. } => LatticeIndex::Input(end),
            LatticeRange::Surface { end, .. } => LatticeIndex::Surface(end),
        }
    }

    /// Concatenation of `self` and `other`, when both are in the same space
    /// and `other` starts where `self` ends.
    pub fn merged(self, other: LatticeRange) -> Option<LatticeRange> {
        match (self, other) {
            (LatticeRange::Input { start, end }, LatticeRange::Input { start: s2, end: e2 })
                if end == s2 =>
            {
                Some(LatticeRange::Input { start, end: e2 })
            }
            (LatticeRange::Surface { start, end }, LatticeRange::Surface { start: s2, end: e2 })
                if end == s2 =>
            {
                Some(LatticeRange::Surface { start, end: e2 })
            }
            _ => None,
        }
    }

    /// Shift by the delta of the range's own space.
    pub fn offset(self, input_delta: isize, surface_delta: isize) -> LatticeRange {
        match self {
            LatticeRange::Input { start, end } => LatticeRange::Input {
                start: start.saturating_add_signed(input_delta),
                end: end.saturating_add_signed(input_delta),
            },
            LatticeRange::Surface { start, end } => LatticeRange::Surface {
                start: start.saturating_add_signed(surface_delta),
                end: end.saturating_add_signed(surface_delta),
            },
        }
    }

    /// Whether the range ends at or before the given boundary of its space.
    pub fn ends_within(self, input_count: usize, surface_count: usize) -> bool {
        match self {
            LatticeRange::Input { end, .. } => end <= input_count,
            LatticeRange::Surface { end, .. } => end <= surface_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Dual indices
// ---------------------------------------------------------------------------

/// A boundary of the composing text seen from both spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DualIndex {
    pub input: Option<usize>,
    pub surface: Option<usize>,
}

impl DualIndex {
    pub const ZERO: DualIndex = DualIndex {
        input: Some(0),
        surface: Some(0),
    };

    pub fn is_zero(self) -> bool {
        self.surface == Some(0) || self.input == Some(0)
    }
}

/// Converts between the two spaces of one composing text.
#[derive(Debug, Clone)]
pub struct DualIndexMap {
    input_to_surface: Vec<Option<usize>>,
    surface_to_input: Vec<Option<usize>>,
}

impl DualIndexMap {
    pub fn new(text: &ComposingText) -> Self {
        let input_to_surface = (0..=text.input_count())
            .map(|i| text.surface_index(i))
            .collect();
        let surface_to_input = (0..=text.surface_count())
            .map(|s| text.input_index(s))
            .collect();
        Self {
            input_to_surface,
            surface_to_input,
        }
    }

    pub fn input_count(&self) -> usize {
        self.input_to_surface.len() - 1
    }

    pub fn surface_count(&self) -> usize {
        self.surface_to_input.len() - 1
    }

    pub fn dual(&self, index: LatticeIndex) -> DualIndex {
        match index {
            LatticeIndex::Input(i) => DualIndex {
                input: Some(i),
                surface: self.input_to_surface.get(i).copied().flatten(),
            },
            LatticeIndex::Surface(s) => DualIndex {
                input: self.surface_to_input.get(s).copied().flatten(),
                surface: Some(s),
            },
        }
    }

    /// Every start boundary in surface order: each surface position before
    /// the end, with its input counterpart where one exists.
    pub fn starts(&self) -> Vec<DualIndex> {
        (0..self.surface_count())
            .map(|s| self.dual(LatticeIndex::Surface(s)))
            .collect()
    }

    /// Whether `index` is the end of the text.
    pub fn is_terminal(&self, index: LatticeIndex) -> bool {
        self.dual(index).surface == Some(self.surface_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kkc_core::InputTable;

    #[test]
    fn merge_requires_same_space_and_touching_ends() {
        let a = LatticeRange::Input { start: 0, end: 2 };
        let b = LatticeRange::Input { start: 2, end: 5 };
        assert_eq!(a.merged(b), Some(LatticeRange::Input { start: 0, end: 5 }));
        assert_eq!(b.merged(a), None);
        let s = LatticeRange::Surface { start: 2, end: 3 };
        assert_eq!(a.merged(s), None);
    }

    #[test]
    fn offset_moves_only_own_space() {
        let r = LatticeRange::Surface { start: 3, end: 5 };
        assert_eq!(r.offset(-1, -2), LatticeRange::Surface { start: 1, end: 3 });
        let r = LatticeRange::Input { start: 3, end: 5 };
        assert_eq!(r.offset(-3, -1), LatticeRange::Input { start: 0, end: 2 });
        assert_eq!(r.count(), 2);
    }

    #[test]
    fn romaji_dual_indices() {
        let table = InputTable::default();
        let text = ComposingText::from_romaji(&table, "kya");
        let map = DualIndexMap::new(&text);
        assert_eq!(map.input_count(), 3);
        assert_eq!(map.surface_count(), 2);
        let starts = map.starts();
        assert_eq!(starts[0], DualIndex::ZERO);
        // Between き and ゃ there is no input boundary.
        assert_eq!(starts[1], DualIndex { input: None, surface: Some(1) });
        assert!(map.is_terminal(LatticeIndex::Input(3)));
        assert!(map.is_terminal(LatticeIndex::Surface(2)));
        assert!(!map.is_terminal(LatticeIndex::Input(2)));
    }
}
