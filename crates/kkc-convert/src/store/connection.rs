// Dense class-to-class cost matrices (connection and phrase bigram)

use std::path::Path;

use crate::ConvertError;

/// File name of the class connection matrix.
pub const CONNECTION_MATRIX_FILE: &str = "matrix.def";

/// File name of the phrase-class bigram matrix.
pub const PHRASE_MATRIX_FILE: &str = "phrase_matrix.def";

/// A dense `num_left x num_right` table of log-probability style costs.
///
/// Text format: a header line `num_left num_right`, then one
/// `left right cost` line per cell. Cells not listed are zero, and so is
/// every lookup outside the table.
#[derive(Debug, Clone, Default)]
pub struct CostMatrix {
    data: Vec<f32>,
    num_left: usize,
    num_right: usize,
}

impl CostMatrix {
    pub fn new(data: Vec<f32>, num_left: usize, num_right: usize) -> Self {
        debug_assert_eq!(data.len(), num_left * num_right);
        Self {
            data,
            num_left,
            num_right,
        }
    }

    /// Parse the text format. `path` is used for error messages only.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConvertError> {
        let invalid = |line: usize, reason: &'static str| ConvertError::InvalidMatrix {
            path: path.to_path_buf(),
            line,
            reason,
        };
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());
        let Some((header_line, header)) = lines.next() else {
            return Ok(Self::default());
        };
        let mut dims = header.split_whitespace().map(str::parse::<usize>);
        let (Some(Ok(num_left)), Some(Ok(num_right)), None) = (dims.next(), dims.next(), dims.next())
        else {
            return Err(invalid(header_line + 1, "expected `num_left num_right`"));
        };

        let mut data = vec![0.0f32; num_left * num_right];
        for (i, line) in lines {
            let mut cols = line.split_whitespace();
            let (Some(l), Some(r), Some(c), None) = (cols.next(), cols.next(), cols.next(), cols.next())
            else {
                return Err(invalid(i + 1, "expected `left right cost`"));
            };
            let (Ok(l), Ok(r), Ok(c)) = (l.parse::<usize>(), r.parse::<usize>(), c.parse::<f32>()) else {
                return Err(invalid(i + 1, "unparsable number"));
            };
            if l >= num_left || r >= num_right {
                return Err(invalid(i + 1, "class id outside the declared size"));
            }
            data[r * num_left + l] = c;
        }
        Ok(Self::new(data, num_left, num_right))
    }

    /// Load from a file; a missing file gives the empty (all-zero) matrix.
    pub fn load(path: &Path) -> Result<Self, ConvertError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} not found, using zero costs", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Cost of `left` followed by `right`.
    #[inline]
    pub fn cost(&self, left: u16, right: u16) -> f32 {
        let (l, r) = (left as usize, right as usize);
        if l < self.num_left && r < self.num_right {
            self.data[r * self.num_left + l]
        } else {
            0.0
        }
    }

    /// Set one cell, growing the table if needed. Used to assemble fixtures.
    pub fn set(&mut self, left: u16, right: u16, cost: f32) {
        let (l, r) = (left as usize, right as usize);
        if l >= self.num_left || r >= self.num_right {
            let num_left = self.num_left.max(l + 1);
            let num_right = self.num_right.max(r + 1);
            let mut data = vec![0.0f32; num_left * num_right];
            for rr in 0..self.num_right {
                for ll in 0..self.num_left {
                    data[rr * num_left + ll] = self.data[rr * self.num_left + ll];
                }
            }
            *self = Self::new(data, num_left, num_right);
        }
        self.data[r * self.num_left + l] = cost;
    }

    pub fn num_left(&self) -> usize {
        self.num_left
    }

    pub fn num_right(&self) -> usize {
        self.num_right
    }
}
