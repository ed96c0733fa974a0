//! Scroll virtualization: mapping an oversized natural content height into a bounded virtual
//! scroll range the host's scrolling primitives stay well-behaved with.

/// Upper bound on the virtual scroll height, regardless of how tall the natural content is.
pub const MAX_SCROLL_HEIGHT: f64 = 10_000_000.0;

/// The viewport state reported by the collaborator, already in virtual scroll space.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub width: f64,
    pub height: f64,
}

/// Natural vs. virtual content geometry for a given row count and row height.
#[derive(Debug, Clone, Copy)]
pub struct ContentGeometry {
    pub natural_height: f64,
    pub virtual_height: f64,
    pub scroll_ratio: f64,
}

impl ContentGeometry {
    pub fn new(total_rows: usize, row_height: f64) -> Self {
        let natural_height = total_rows as f64 * row_height;
        if natural_height <= MAX_SCROLL_HEIGHT || natural_height == 0.0 {
            Self { natural_height, virtual_height: natural_height, scroll_ratio: 1.0 }
        } else {
            let virtual_height = MAX_SCROLL_HEIGHT;
            Self { natural_height, virtual_height, scroll_ratio: virtual_height / natural_height }
        }
    }

    /// Converts a virtual-space scroll position to natural space.
    pub fn effective_scroll_top(&self, scroll_top: f64) -> f64 {
        if self.scroll_ratio < 1.0 { scroll_top / self.scroll_ratio } else { scroll_top }
    }

    /// The row index whose top edge is at natural-space `display_y`, given a row height.
    pub fn row_index_at_natural_y(&self, natural_y: f64, row_height: f64) -> i64 {
        if row_height <= 0.0 {
            return 0;
        }
        (natural_y / row_height).floor() as i64
    }

    /// The virtual-space scroll position that would place row `r` at the top of the viewport.
    pub fn scroll_top_for_row(&self, row: i64, row_height: f64) -> f64 {
        row as f64 * row_height * self.scroll_ratio
    }

    /// The row index under a given viewport-space `y`, given the current virtual scroll offset.
    pub fn row_index_at_display_y(&self, viewport_y: f64, virtual_scroll_top: f64, row_height: f64) -> i64 {
        if row_height <= 0.0 || self.scroll_ratio <= 0.0 {
            return 0;
        }
        ((viewport_y + virtual_scroll_top / self.scroll_ratio) / row_height).floor() as i64
    }
}
