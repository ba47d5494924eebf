//! Numbered SD card folders ("slots") and allocation of free ones

use std::collections::BTreeSet;

pub const MIN_SLOT: u16 = 1;
pub const MAX_SLOT: u16 = 9999;
/// Slot 1 holds the GDEMU menu by convention
pub const DEFAULT_STARTING_SLOT: u16 = 2;
pub const DEFAULT_SLOT_WIDTH: usize = 4;

/// Parse a device folder name. Only 1 to 4 ASCII digits in `1..=9999` qualify.
pub fn parse_slot(folder_name: &str) -> Option<u16> {
    if folder_name.is_empty()
        || folder_name.len() > 4
        || !folder_name.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    folder_name
        .parse::<u16>()
        .ok()
        .filter(|slot| (MIN_SLOT..=MAX_SLOT).contains(slot))
}

/// Zero-padded folder name for a slot
pub fn slot_folder_name(slot: u16, width: usize) -> String {
    format!("{:0width$}", slot, width = width)
}

/// Batch-local slot allocator. Allocated slots are remembered so one batch
/// never hands out the same slot twice; the device is not re-read.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    occupied: BTreeSet<u16>,
    starting_from: u16,
}

impl SlotAllocator {
    pub fn new(occupied: impl IntoIterator<Item = u16>, starting_from: u16) -> Self {
        Self {
            occupied: occupied.into_iter().collect(),
            starting_from: starting_from.max(MIN_SLOT),
        }
    }

    /// First slot in `[starting_from, 9999]` not in `occupied`
    pub fn find_available_slot(occupied: &BTreeSet<u16>, starting_from: u16) -> Option<u16> {
        (starting_from.max(MIN_SLOT)..=MAX_SLOT).find(|slot| !occupied.contains(slot))
    }

    /// Find a free slot and mark it used. `None` once the namespace is full.
    pub fn allocate(&mut self) -> Option<u16> {
        let slot = Self::find_available_slot(&self.occupied, self.starting_from)?;
        self.occupied.insert(slot);
        Some(slot)
    }

    pub fn is_occupied(&self, slot: u16) -> bool {
        self.occupied.contains(&slot)
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slot_folder_names() {
        assert_eq!(parse_slot("0001"), Some(1));
        assert_eq!(parse_slot("02"), Some(2));
        assert_eq!(parse_slot("9999"), Some(9999));
        assert_eq!(parse_slot("0000"), None);
        assert_eq!(parse_slot("10000"), None);
        assert_eq!(parse_slot("00042"), None);
        assert_eq!(parse_slot("+5"), None);
        assert_eq!(parse_slot(" 5"), None);
        assert_eq!(parse_slot("menu"), None);
        assert_eq!(parse_slot(""), None);
    }

    #[test]
    fn formats_fixed_width() {
        assert_eq!(slot_folder_name(2, 4), "0002");
        assert_eq!(slot_folder_name(42, 2), "42");
        assert_eq!(slot_folder_name(100, 2), "100");
    }

    #[test]
    fn skips_occupied_run() {
        let occupied: BTreeSet<u16> = [2, 3, 4, 5].into_iter().collect();
        assert_eq!(SlotAllocator::find_available_slot(&occupied, 2), Some(6));
    }

    #[test]
    fn fills_gap_below_occupied() {
        let occupied: BTreeSet<u16> = [3].into_iter().collect();
        assert_eq!(SlotAllocator::find_available_slot(&occupied, 2), Some(2));
    }

    #[test]
    fn full_namespace_is_not_found() {
        let occupied: BTreeSet<u16> = (2..=MAX_SLOT).collect();
        assert_eq!(SlotAllocator::find_available_slot(&occupied, 2), None);

        let mut allocator = SlotAllocator::new(9990..=MAX_SLOT, 9990);
        assert_eq!(allocator.allocate(), None);
    }

    #[test]
    fn never_returns_occupied_or_out_of_range() {
        let occupied: BTreeSet<u16> = (1..=MAX_SLOT).filter(|s| s % 7 != 0).collect();
        for start in [1u16, 2, 50, 9000, 9995] {
            if let Some(slot) = SlotAllocator::find_available_slot(&occupied, start) {
                assert!(!occupied.contains(&slot));
                assert!(slot >= start && slot <= MAX_SLOT);
            }
        }
    }

    #[test]
    fn allocations_within_a_batch_are_distinct() {
        let mut allocator = SlotAllocator::new([2, 4], DEFAULT_STARTING_SLOT);
        assert_eq!(allocator.allocate(), Some(3));
        assert_eq!(allocator.allocate(), Some(5));
        assert_eq!(allocator.allocate(), Some(6));
        assert!(allocator.is_occupied(3));
        assert_eq!(allocator.occupied_count(), 5);
    }
}
