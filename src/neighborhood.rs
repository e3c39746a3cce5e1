//! Focal window shapes.
//!
//! A window is stored as a list of row spans relative to the centre cell so
//! focal sums can be taken from per-row prefix sums instead of visiting
//! every offset.

use crate::error::{Error, Result};

/// Window shape, distances in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    /// Cells whose centre lies between `inner` and `outer` cells from the
    /// processing cell, both bounds inclusive.
    Annulus { inner: usize, outer: usize },
    /// `width` x `height` block around the processing cell. For even sizes the
    /// extra row/column is on the upper left.
    Rectangle { width: usize, height: usize },
}

/// Contiguous run of window cells on one row: `dr`, and columns `c0..=c1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub dr: isize,
    pub c0: isize,
    pub c1: isize,
}

impl Span {
    pub fn len(&self) -> usize {
        (self.c1 - self.c0 + 1) as usize
    }
}

impl Neighborhood {
    /// Annulus with `0 < inner < outer`.
    pub fn annulus(inner: usize, outer: usize) -> Result<Self> {
        if inner == 0 {
            return Err(Error::invalid("inner_radius", inner, "must be a positive number of cells"));
        }
        if inner >= outer {
            return Err(Error::invalid(
                "outer_radius",
                outer,
                format!("must be greater than the inner radius ({inner})"),
            ));
        }
        Ok(Neighborhood::Annulus { inner, outer })
    }

    pub fn rectangle(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid(
                "neighborhood",
                format!("{width}x{height}"),
                "rectangle sides must be positive",
            ));
        }
        Ok(Neighborhood::Rectangle { width, height })
    }

    /// Square window of side `size`.
    pub fn square(size: usize) -> Result<Self> {
        Self::rectangle(size, size)
    }

    /// Row spans making up the window, top to bottom.
    pub fn spans(&self) -> Vec<Span> {
        match *self {
            Neighborhood::Rectangle { width, height } => {
                let (w, h) = (width as isize, height as isize);
                let c0 = -(w / 2);
                let c1 = c0 + w - 1;
                let r0 = -(h / 2);
                (r0..r0 + h).map(|dr| Span { dr, c0, c1 }).collect()
            }
            Neighborhood::Annulus { inner, outer } => {
                let (inner, outer) = (inner as i64, outer as i64);
                let mut spans = Vec::new();
                for dr in -outer..=outer {
                    let reach = isqrt(outer * outer - dr * dr) as isize;
                    let rem = inner * inner - dr * dr;
                    if rem <= 0 {
                        spans.push(Span { dr: dr as isize, c0: -reach, c1: reach });
                        continue;
                    }
                    // hole covers |dc| with dc^2 < rem
                    let hole = isqrt(rem - 1) as isize;
                    if hole < reach {
                        spans.push(Span { dr: dr as isize, c0: -reach, c1: -hole - 1 });
                        spans.push(Span { dr: dr as isize, c0: hole + 1, c1: reach });
                    }
                }
                spans
            }
        }
    }

    /// Number of cells in the window.
    pub fn cell_count(&self) -> usize {
        self.spans().iter().map(Span::len).sum()
    }

    /// Whether the offset `(dr, dc)` belongs to the window.
    pub fn contains(&self, dr: isize, dc: isize) -> bool {
        self.spans()
            .iter()
            .any(|s| s.dr == dr && (s.c0..=s.c1).contains(&dc))
    }
}

/// Largest `k` with `k * k <= n`.
fn isqrt(n: i64) -> i64 {
    if n <= 0 {
        return 0;
    }
    let mut k = (n as f64).sqrt() as i64;
    while k * k > n {
        k -= 1;
    }
    while (k + 1) * (k + 1) <= n {
        k += 1;
    }
    k
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annulus_requires_inner_below_outer() {
        assert!(Neighborhood::annulus(3, 3).is_err());
        assert!(Neighborhood::annulus(5, 2).is_err());
        assert!(Neighborhood::annulus(0, 2).is_err());
        assert!(Neighborhood::annulus(1, 2).is_ok());
    }

    #[test]
    fn annulus_matches_distance_rule() {
        let nbhd = Neighborhood::annulus(2, 4).unwrap();
        for dr in -5isize..=5 {
            for dc in -5isize..=5 {
                let d2 = dr * dr + dc * dc;
                assert_eq!(
                    nbhd.contains(dr, dc),
                    (4..=16).contains(&d2),
                    "offset ({dr}, {dc})"
                );
            }
        }
        assert!(!nbhd.contains(0, 0));
    }

    #[test]
    fn rectangle_spans() {
        let nbhd = Neighborhood::square(3).unwrap();
        assert_eq!(nbhd.cell_count(), 9);
        assert_eq!(nbhd.spans()[0], Span { dr: -1, c0: -1, c1: 1 });

        let even = Neighborhood::rectangle(4, 2).unwrap();
        assert_eq!(even.cell_count(), 8);
        assert_eq!(even.spans()[0], Span { dr: -1, c0: -2, c1: 1 });
    }

    #[test]
    fn isqrt_is_exact() {
        for n in 0..2000i64 {
            let k = isqrt(n);
            assert!(k * k <= n && (k + 1) * (k + 1) > n);
        }
    }
}
