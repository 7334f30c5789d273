use nalgebra::Point3;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryStructure {
    Helix,
    Sheet,
}

#[derive(Debug, Error)]
#[error("Invalid secondary structure string")]
pub struct ParseSecondaryStructureError;

impl FromStr for SecondaryStructure {
    type Err = ParseSecondaryStructureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "helix" => Ok(SecondaryStructure::Helix),
            "sheet" => Ok(SecondaryStructure::Sheet),
            _ => Err(ParseSecondaryStructureError),
        }
    }
}

impl fmt::Display for SecondaryStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SecondaryStructure::Helix => "HELIX",
                SecondaryStructure::Sheet => "SHEET",
            }
        )
    }
}

/// An inclusive `[start, end]` index range into a chain's points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of points covered by the span.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }

    /// Shifts the bounds lying strictly after `anchor` by `delta` points.
    pub(crate) fn shift_after(&mut self, anchor: usize, delta: isize) {
        if self.start > anchor {
            self.start = self.start.saturating_add_signed(delta);
        }
        if self.end > anchor {
            self.end = self.end.saturating_add_signed(delta);
        }
    }
}

/// An ordered polyline extracted from the refined graph.
///
/// Points are physical positions; helix and sheet annotations index into
/// `points`. Helix fitting may change the number of points, in which case the
/// annotations after the fitted span are shifted accordingly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceChain {
    /// Ordered Ca positions.
    pub points: Vec<Point3<f64>>,
    /// Helix annotations.
    pub helices: Vec<Span>,
    /// Sheet annotations.
    pub sheets: Vec<Span>,
}

impl TraceChain {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self {
            points,
            helices: Vec::new(),
            sheets: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn spans(&self, kind: SecondaryStructure) -> &[Span] {
        match kind {
            SecondaryStructure::Helix => &self.helices,
            SecondaryStructure::Sheet => &self.sheets,
        }
    }

    pub fn spans_mut(&mut self, kind: SecondaryStructure) -> &mut Vec<Span> {
        match kind {
            SecondaryStructure::Helix => &mut self.helices,
            SecondaryStructure::Sheet => &mut self.sheets,
        }
    }

    /// Replaces the points of `span` with `replacement`, shifting every
    /// annotation bound after `span.start` by the resulting length change.
    ///
    /// Returns the length delta.
    pub fn splice(&mut self, span: Span, replacement: Vec<Point3<f64>>) -> isize {
        let end = (span.end + 1).min(self.points.len());
        let start = span.start.min(end);
        let delta = replacement.len() as isize - (end - start) as isize;
        self.points.splice(start..end, replacement);
        if delta != 0 {
            for s in self.helices.iter_mut().chain(self.sheets.iter_mut()) {
                s.shift_after(span.start, delta);
            }
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of(n: usize) -> TraceChain {
        TraceChain::new((0..n).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect())
    }

    #[test]
    fn span_len_is_inclusive() {
        assert_eq!(Span::new(3, 7).len(), 5);
        assert_eq!(Span::new(4, 4).len(), 1);
    }

    #[test]
    fn splice_shifts_later_annotations() {
        let mut chain = chain_of(20);
        chain.helices = vec![Span::new(2, 11), Span::new(14, 18)];
        chain.sheets = vec![Span::new(0, 1), Span::new(12, 13)];

        let replacement = vec![Point3::origin(); 8];
        let delta = chain.splice(Span::new(2, 11), replacement);

        assert_eq!(delta, -2);
        assert_eq!(chain.len(), 18);
        assert_eq!(chain.helices, vec![Span::new(2, 9), Span::new(12, 16)]);
        assert_eq!(chain.sheets, vec![Span::new(0, 1), Span::new(10, 11)]);
    }

    #[test]
    fn splice_with_equal_length_leaves_annotations_untouched() {
        let mut chain = chain_of(12);
        chain.helices = vec![Span::new(0, 11)];
        let delta = chain.splice(Span::new(0, 11), vec![Point3::origin(); 12]);
        assert_eq!(delta, 0);
        assert_eq!(chain.helices, vec![Span::new(0, 11)]);
    }

    #[test]
    fn secondary_structure_parses_case_insensitively() {
        assert_eq!(
            "Helix".parse::<SecondaryStructure>().unwrap(),
            SecondaryStructure::Helix
        );
        assert!("coil".parse::<SecondaryStructure>().is_err());
    }
}
