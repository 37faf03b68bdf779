// THEORY:
// The `Projection` module collapses a 2D ink mask into 1D profiles. A row profile
// answers "how much ink is on this line", which is all the divider engine needs to
// find full-width rules. A column profile answers "where does the content start and
// stop", which gives the page margins and the width a real divider has to span.
//
// Everything here is a pure function of the mask, O(width * height).

pub mod projection {
    use image::GrayImage;

    /// Count-weighted ink sum per row or per column (`ink samples * 255`).
    pub type ProjectionProfile = Vec<u64>;

    /// Horizontal ink extent of the document content.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Margins {
        /// First column holding any ink, scanning left to right.
        pub left: u32,
        /// Last column holding any ink, scanning right to left.
        pub right: u32,
    }

    impl Margins {
        /// `right - left`; zero when the margins are degenerate.
        pub fn content_width(&self) -> u32 {
            self.right.saturating_sub(self.left)
        }

        /// A crop between these margins would be empty or a single column.
        pub fn is_degenerate(&self) -> bool {
            self.left >= self.right
        }
    }

    /// Sum of mask samples along every row.
    pub fn row_profile(mask: &GrayImage) -> ProjectionProfile {
        let width = mask.width() as usize;
        if width == 0 {
            return vec![0; mask.height() as usize];
        }
        mask.as_raw()
            .chunks_exact(width)
            .map(|row| row.iter().map(|&v| v as u64).sum())
            .collect()
    }

    /// Sum of mask samples along every column.
    pub fn column_profile(mask: &GrayImage) -> ProjectionProfile {
        column_profile_in_rows(mask, 0, mask.height())
    }

    /// Column sums restricted to rows `[start_row, end_row)`.
    /// The divider engine uses this to measure how wide one band of rows is.
    pub fn column_profile_in_rows(mask: &GrayImage, start_row: u32, end_row: u32) -> ProjectionProfile {
        let width = mask.width() as usize;
        let mut profile = vec![0u64; width];
        if width == 0 {
            return profile;
        }
        let end_row = end_row.min(mask.height());
        if start_row >= end_row {
            return profile;
        }
        let start = start_row as usize * width;
        let end = end_row as usize * width;
        for row in mask.as_raw()[start..end].chunks_exact(width) {
            for (acc, &v) in profile.iter_mut().zip(row) {
                *acc += v as u64;
            }
        }
        profile
    }

    /// First and last inked entries of a column profile. `None` when the profile is blank.
    pub fn ink_extent(profile: &[u64]) -> Option<(u32, u32)> {
        let left = profile.iter().position(|&v| v > 0)?;
        let right = profile.iter().rposition(|&v| v > 0)?;
        Some((left as u32, right as u32))
    }

    /// Page margins from a column profile; `(0, width - 1)` for a blank page.
    pub fn margins(profile: &[u64]) -> Margins {
        match ink_extent(profile) {
            Some((left, right)) => Margins { left, right },
            None => Margins {
                left: 0,
                right: (profile.len() as u32).saturating_sub(1),
            },
        }
    }
}
