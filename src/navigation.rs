use std::ops::Range;

pub const DEFAULT_NUM_DAYS: usize = 2;
pub const DEFAULT_MIN_COLUMN_WIDTH: u16 = 40;

/// Which slice of the event's days is visible side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub num_days: usize,
    pub offset: usize,
    pub min_column_width: u16,
}

impl Default for Navigation {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_DAYS, DEFAULT_MIN_COLUMN_WIDTH)
    }
}

impl Navigation {
    pub fn new(num_days: usize, min_column_width: u16) -> Self {
        Self {
            num_days: num_days.max(1),
            offset: 0,
            min_column_width: min_column_width.max(1),
        }
    }

    pub fn scroll(&mut self, offset: usize, total_days: usize) {
        self.offset = offset.min(self.max_offset(total_days));
    }

    /// Recomputes how many day columns fit into `width` cells.
    pub fn resize(&mut self, width: u16, total_days: usize) {
        let fitting = usize::from(width / self.min_column_width).max(1);
        self.num_days = if total_days == 0 {
            fitting
        } else {
            fitting.min(total_days)
        };
        self.offset = self.offset.min(self.max_offset(total_days));
    }

    pub fn visible_range(&self, total_days: usize) -> Range<usize> {
        let start = self.offset.min(total_days);
        let end = (start + self.num_days).min(total_days);
        start..end
    }

    fn max_offset(&self, total_days: usize) -> usize {
        total_days.saturating_sub(self.num_days)
    }
}

#[cfg(test)]
mod tests {
    use super::Navigation;

    #[test]
    fn scroll_is_clamped_to_last_page() {
        let mut navigation = Navigation::new(2, 40);
        navigation.scroll(10, 5);
        assert_eq!(navigation.offset, 3);
        assert_eq!(navigation.visible_range(5), 3..5);
    }

    #[test]
    fn resize_fits_columns_and_keeps_offset_valid() {
        let mut navigation = Navigation::new(2, 40);
        navigation.scroll(3, 5);
        navigation.resize(130, 5);
        assert_eq!(navigation.num_days, 3);
        assert_eq!(navigation.offset, 2);

        navigation.resize(10, 5);
        assert_eq!(navigation.num_days, 1);
        assert_eq!(navigation.visible_range(5), 2..3);
    }
}
