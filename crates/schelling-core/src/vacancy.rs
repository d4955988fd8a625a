use crate::grid::Cell;
use rand::Rng;
use std::collections::HashMap;

/// Set of vacant cells with uniform random sampling.
///
/// Membership is backed by a slot map so removal is a swap-remove rather
/// than a linear scan, and sampling is a single index draw.
#[derive(Clone, Debug, Default)]
pub struct VacancySet {
    cells: Vec<Cell>,
    slots: HashMap<Cell, usize>,
}

impl VacancySet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.slots.contains_key(&cell)
    }

    /// Insert `cell`, returning false if it was already present.
    pub fn insert(&mut self, cell: Cell) -> bool {
        if self.slots.contains_key(&cell) {
            return false;
        }
        self.slots.insert(cell, self.cells.len());
        self.cells.push(cell);
        true
    }

    /// Remove `cell`, returning false if it was not present. The vacancy
    /// that previously sat in the last slot takes over the freed one.
    pub fn remove(&mut self, cell: Cell) -> bool {
        let Some(slot) = self.slots.remove(&cell) else {
            return false;
        };
        self.cells.swap_remove(slot);
        if let Some(&moved) = self.cells.get(slot) {
            self.slots.insert(moved, slot);
        }
        true
    }

    /// Draw a vacant cell uniformly at random, or `None` if none remain.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Cell> {
        if self.cells.is_empty() {
            return None;
        }
        Some(self.cells[rng.random_range(0..self.cells.len())])
    }

    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }
}

impl FromIterator<Cell> for VacancySet {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        let mut set = Self::default();
        for cell in iter {
            set.insert(cell);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;
    use std::collections::HashSet;

    fn cells(coords: &[(u32, u32)]) -> Vec<Cell> {
        coords.iter().map(|&(x, y)| Cell { x, y }).collect()
    }

    #[test]
    fn insert_is_idempotent() {
        let mut set = VacancySet::default();
        assert!(set.insert(Cell { x: 1, y: 2 }));
        assert!(!set.insert(Cell { x: 1, y: 2 }));
        assert_eq!(set.len(), 1);
        assert!(set.contains(Cell { x: 1, y: 2 }));
    }

    #[test]
    fn remove_keeps_slots_consistent() {
        let mut set: VacancySet = cells(&[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)])
            .into_iter()
            .collect();

        // Removing from the middle relocates the last entry into the gap.
        assert!(set.remove(Cell { x: 1, y: 0 }));
        assert!(!set.remove(Cell { x: 1, y: 0 }));
        assert_eq!(set.len(), 4);
        for cell in cells(&[(0, 0), (2, 0), (3, 0), (4, 0)]) {
            assert!(set.contains(cell), "missing {cell}");
        }

        // Every remaining member must still be removable.
        for cell in cells(&[(4, 0), (0, 0), (3, 0), (2, 0)]) {
            assert!(set.remove(cell), "failed to remove {cell}");
        }
        assert!(set.is_empty());
    }

    #[test]
    fn sample_returns_members_only() {
        let members = cells(&[(0, 0), (5, 3), (2, 7)]);
        let set: VacancySet = members.iter().copied().collect();
        let expected: HashSet<Cell> = members.into_iter().collect();

        let mut rng = ChaCha12Rng::seed_from_u64(9);
        for _ in 0..64 {
            let drawn = set.sample(&mut rng).unwrap();
            assert!(expected.contains(&drawn));
        }
    }

    #[test]
    fn sample_of_empty_set_is_none() {
        let set = VacancySet::default();
        let mut rng = ChaCha12Rng::seed_from_u64(9);
        assert_eq!(set.sample(&mut rng), None);
    }

    #[test]
    fn sample_is_deterministic_for_fixed_seed() {
        let set: VacancySet = cells(&[(0, 0), (1, 1), (2, 2), (3, 3)]).into_iter().collect();
        let mut rng_a = ChaCha12Rng::seed_from_u64(123);
        let mut rng_b = ChaCha12Rng::seed_from_u64(123);
        for _ in 0..32 {
            assert_eq!(set.sample(&mut rng_a), set.sample(&mut rng_b));
        }
    }
}
