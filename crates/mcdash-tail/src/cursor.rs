/// What a cursor learned from the latest size observation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    /// Nothing new past the cursor
    Unchanged,
    /// The file has bytes past the cursor
    Grown,
    /// The file is smaller than the cursor; it was rotated or truncated
    Rotated,
}

/// Per-subscription delivery position
///
/// Owned by exactly one tail loop. The offset only moves forward, except for
/// the reset to zero when a rotation is observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    offset: u64,
    rotations: u64,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `window` bytes before the end of a file of `size` bytes
    ///
    /// The window is a byte count, so the first delivered line may be a
    /// fragment.
    pub fn seeded(size: u64, window: u64) -> Self {
        Self {
            offset: size.saturating_sub(window),
            rotations: 0,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of rotations observed so far
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// Compare the current file size against the cursor
    ///
    /// On rotation the offset is reset to zero before returning.
    pub fn observe(&mut self, size: u64) -> Observation {
        if size < self.offset {
            self.offset = 0;
            self.rotations += 1;
            Observation::Rotated
        } else if size == self.offset {
            Observation::Unchanged
        } else {
            Observation::Grown
        }
    }

    /// Move to `new_offset`; never moves backwards
    pub fn advance(&mut self, new_offset: u64) {
        if new_offset > self.offset {
            self.offset = new_offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_window() {
        assert_eq!(Cursor::seeded(120_000, 50_000).offset(), 70_000);
        assert_eq!(Cursor::seeded(1_000, 50_000).offset(), 0);
        assert_eq!(Cursor::seeded(0, 50_000).offset(), 0);
    }

    #[test]
    fn test_observe_growth_and_no_change() {
        let mut cursor = Cursor::seeded(100, 0);
        assert_eq!(cursor.observe(100), Observation::Unchanged);
        assert_eq!(cursor.observe(150), Observation::Grown);
        assert_eq!(cursor.offset(), 100);
    }

    #[test]
    fn test_observe_rotation_resets_offset() {
        let mut cursor = Cursor::seeded(500, 0);
        assert_eq!(cursor.observe(100), Observation::Rotated);
        assert_eq!(cursor.offset(), 0);
        assert_eq!(cursor.rotations(), 1);
        // Once reset, the smaller file is ordinary growth
        assert_eq!(cursor.observe(100), Observation::Grown);
        assert_eq!(cursor.rotations(), 1);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut cursor = Cursor::new();
        cursor.advance(40);
        cursor.advance(25);
        assert_eq!(cursor.offset(), 40);
        cursor.advance(90);
        assert_eq!(cursor.offset(), 90);
    }
}
