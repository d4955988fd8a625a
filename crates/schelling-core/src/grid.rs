use crate::config::{SimConfig, SimConfigError};
use crate::vacancy::VacancySet;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{error::Error, fmt};

/// Agent group label, numbered from 1.
pub type Category = u32;

/// Grid coordinate with `0 <= x < width` and `0 <= y < height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
}

impl Cell {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Moore neighborhood: the eight surrounding cells, diagonals included.
const MOORE_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Read-only view of the occupied cells, handed to external collaborators
/// such as renderers. Agents are listed row-major, sorted by `(y, x)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub width: u32,
    pub height: u32,
    pub agents: Vec<(Cell, Category)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopulationError {
    Config(SimConfigError),
    CellOutOfBounds(Cell),
    DuplicateCell(Cell),
    CategoryOutOfRange { cell: Cell, category: Category },
    UnknownCell(Cell),
    InvalidRelocation { source: Cell, dest: Cell },
    NoVacantCell,
}

impl fmt::Display for PopulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopulationError::Config(e) => write!(f, "{}", e),
            PopulationError::CellOutOfBounds(cell) => {
                write!(f, "cell {cell} lies outside the grid")
            }
            PopulationError::DuplicateCell(cell) => {
                write!(f, "cell {cell} is assigned more than one agent")
            }
            PopulationError::CategoryOutOfRange { cell, category } => {
                write!(f, "category {category} at {cell} is outside 1..=nr_categories")
            }
            PopulationError::UnknownCell(cell) => {
                write!(f, "no agent occupies cell {cell}")
            }
            PopulationError::InvalidRelocation { source, dest } => write!(
                f,
                "relocation {source} -> {dest} needs an occupied source and a vacant destination"
            ),
            PopulationError::NoVacantCell => {
                write!(f, "no vacant cell is available for relocation")
            }
        }
    }
}

impl From<SimConfigError> for PopulationError {
    fn from(err: SimConfigError) -> Self {
        PopulationError::Config(err)
    }
}

impl Error for PopulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PopulationError::Config(e) => Some(e),
            _ => None,
        }
    }
}

/// Category assignment over a fixed rectangular grid.
///
/// Every cell is either occupied by exactly one agent or vacant; the two
/// sides partition the grid at every observable point. Relocation is the
/// only mutation.
#[derive(Clone, Debug)]
pub struct GridPopulation {
    width: u32,
    height: u32,
    nr_categories: u32,
    similarity_threshold: f64,
    occupied: HashMap<Cell, Category>,
    vacancies: VacancySet,
}

impl GridPopulation {
    /// Randomly populate a grid per `config`: `floor(empty_ratio * cells)`
    /// vacancies, the rest assigned categories round-robin so category
    /// counts differ by at most one.
    pub fn try_new<R: Rng + ?Sized>(
        config: &SimConfig,
        rng: &mut R,
    ) -> Result<Self, PopulationError> {
        config.validate()?;
        let total = config.total_cells()?;

        let mut cells = Vec::with_capacity(total);
        for y in 0..config.height {
            for x in 0..config.width {
                cells.push(Cell { x, y });
            }
        }
        cells.shuffle(rng);

        let nr_vacant = (config.empty_ratio * total as f64).floor() as usize;
        let vacancies: VacancySet = cells[..nr_vacant].iter().copied().collect();
        let occupied: HashMap<Cell, Category> = cells[nr_vacant..]
            .iter()
            .enumerate()
            .map(|(i, &cell)| (cell, (i % config.nr_categories as usize) as Category + 1))
            .collect();

        Ok(Self {
            width: config.width,
            height: config.height,
            nr_categories: config.nr_categories,
            similarity_threshold: config.similarity_threshold,
            occupied,
            vacancies,
        })
    }

    pub fn new<R: Rng + ?Sized>(config: &SimConfig, rng: &mut R) -> Self {
        Self::try_new(config, rng).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Build a population from an explicit agent layout; every remaining
    /// cell becomes vacant. `empty_ratio` and `seed` are ignored here.
    pub fn try_from_agents(
        config: &SimConfig,
        agents: Vec<(Cell, Category)>,
    ) -> Result<Self, PopulationError> {
        config.validate()?;
        let total = config.total_cells()?;

        let mut occupied = HashMap::with_capacity(agents.len());
        for (cell, category) in agents {
            if cell.x >= config.width || cell.y >= config.height {
                return Err(PopulationError::CellOutOfBounds(cell));
            }
            if !(1..=config.nr_categories).contains(&category) {
                return Err(PopulationError::CategoryOutOfRange { cell, category });
            }
            if occupied.insert(cell, category).is_some() {
                return Err(PopulationError::DuplicateCell(cell));
            }
        }

        let mut vacancies = VacancySet::with_capacity(total - occupied.len());
        for y in 0..config.height {
            for x in 0..config.width {
                let cell = Cell { x, y };
                if !occupied.contains_key(&cell) {
                    vacancies.insert(cell);
                }
            }
        }

        Ok(Self {
            width: config.width,
            height: config.height,
            nr_categories: config.nr_categories,
            similarity_threshold: config.similarity_threshold,
            occupied,
            vacancies,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn nr_categories(&self) -> u32 {
        self.nr_categories
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }

    pub fn vacant_count(&self) -> usize {
        self.vacancies.len()
    }

    pub fn category_at(&self, cell: Cell) -> Option<Category> {
        self.occupied.get(&cell).copied()
    }

    pub fn is_vacant(&self, cell: Cell) -> bool {
        self.vacancies.contains(cell)
    }

    /// Iterate over occupied cells in unspecified order.
    pub fn agents(&self) -> impl Iterator<Item = (Cell, Category)> + '_ {
        self.occupied.iter().map(|(&cell, &category)| (cell, category))
    }

    pub fn vacant_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.vacancies.iter()
    }

    /// Count same- and different-category agents among the in-bounds Moore
    /// neighbors of `cell`. Vacant neighbors contribute to neither count.
    fn neighbor_tally(&self, cell: Cell, category: Category) -> (u32, u32) {
        let mut similar = 0;
        let mut different = 0;
        for (dx, dy) in MOORE_OFFSETS {
            let Some(x) = cell.x.checked_add_signed(dx).filter(|&x| x < self.width) else {
                continue;
            };
            let Some(y) = cell.y.checked_add_signed(dy).filter(|&y| y < self.height) else {
                continue;
            };
            match self.occupied.get(&Cell { x, y }) {
                Some(&c) if c == category => similar += 1,
                Some(_) => different += 1,
                None => {}
            }
        }
        (similar, different)
    }

    /// An agent with no occupied neighbors counts as satisfied.
    fn satisfies_threshold(&self, similar: u32, different: u32) -> bool {
        let occupied = similar + different;
        if occupied == 0 {
            return true;
        }
        f64::from(similar) / f64::from(occupied) >= self.similarity_threshold
    }

    /// Whether the agent at `cell` tolerates its current neighborhood.
    ///
    /// Fails with [`PopulationError::UnknownCell`] if `cell` is vacant or
    /// out of bounds.
    pub fn try_is_satisfied(&self, cell: Cell) -> Result<bool, PopulationError> {
        let category = self
            .category_at(cell)
            .ok_or(PopulationError::UnknownCell(cell))?;
        let (similar, different) = self.neighbor_tally(cell, category);
        Ok(self.satisfies_threshold(similar, different))
    }

    pub fn is_satisfied(&self, cell: Cell) -> bool {
        self.try_is_satisfied(cell)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Move the agent at `source` into the vacant cell `dest`. A failed
    /// call leaves the population untouched.
    pub fn try_relocate(&mut self, source: Cell, dest: Cell) -> Result<(), PopulationError> {
        if !self.vacancies.contains(dest) {
            return Err(PopulationError::InvalidRelocation { source, dest });
        }
        let Some(category) = self.occupied.remove(&source) else {
            return Err(PopulationError::InvalidRelocation { source, dest });
        };
        self.vacancies.remove(dest);
        self.occupied.insert(dest, category);
        self.vacancies.insert(source);
        Ok(())
    }

    pub fn relocate(&mut self, source: Cell, dest: Cell) {
        self.try_relocate(source, dest)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Draw a vacant cell uniformly at random, or `None` if the grid is
    /// fully occupied.
    pub fn sample_vacancy<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Cell> {
        self.vacancies.sample(rng)
    }

    /// Number of agents currently satisfied with their neighborhood.
    pub fn satisfied_count(&self) -> usize {
        self.agents()
            .filter(|&(cell, category)| {
                let (similar, different) = self.neighbor_tally(cell, category);
                self.satisfies_threshold(similar, different)
            })
            .count()
    }

    /// Fraction of same-category links among all agent/occupied-neighbor
    /// links, aggregated over the whole population. Returns 1.0 when no
    /// agent has an occupied neighbor.
    pub fn similarity_ratio(&self) -> f64 {
        let mut similar_links: u64 = 0;
        let mut total_links: u64 = 0;
        for (cell, category) in self.agents() {
            let (similar, different) = self.neighbor_tally(cell, category);
            similar_links += u64::from(similar);
            total_links += u64::from(similar + different);
        }
        if total_links == 0 {
            return 1.0;
        }
        similar_links as f64 / total_links as f64
    }

    pub fn snapshot(&self) -> PopulationSnapshot {
        let mut agents: Vec<(Cell, Category)> = self.agents().collect();
        agents.sort_unstable_by_key(|&(cell, _)| (cell.y, cell.x));
        PopulationSnapshot {
            width: self.width,
            height: self.height,
            agents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;
    use std::collections::HashSet;

    fn config(
        width: u32,
        height: u32,
        empty_ratio: f64,
        similarity_threshold: f64,
        nr_categories: u32,
    ) -> SimConfig {
        SimConfig {
            width,
            height,
            empty_ratio,
            similarity_threshold,
            nr_categories,
            ..SimConfig::default()
        }
    }

    fn assert_partition(population: &GridPopulation) {
        let occupied: HashSet<Cell> = population.agents().map(|(cell, _)| cell).collect();
        let vacant: HashSet<Cell> = population.vacant_cells().collect();
        assert!(occupied.is_disjoint(&vacant));
        let total = population.width() as usize * population.height() as usize;
        assert_eq!(occupied.len() + vacant.len(), total);
        for y in 0..population.height() {
            for x in 0..population.width() {
                let cell = Cell::new(x, y);
                assert!(
                    occupied.contains(&cell) || vacant.contains(&cell),
                    "cell {cell} is neither occupied nor vacant"
                );
            }
        }
    }

    #[test]
    fn random_initialization_matches_requested_proportions() {
        // 10x10 at 0.3 empty and 2 categories: 30 vacant, 70 agents, 35/35.
        let config = config(10, 10, 0.3, 0.5, 2);
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let population = GridPopulation::try_new(&config, &mut rng).unwrap();

        assert_eq!(population.vacant_count(), 30);
        assert_eq!(population.occupied_count(), 70);
        let ones = population.agents().filter(|&(_, c)| c == 1).count();
        let twos = population.agents().filter(|&(_, c)| c == 2).count();
        assert_eq!((ones, twos), (35, 35));
        assert_partition(&population);
    }

    #[test]
    fn category_counts_differ_by_at_most_one() {
        let config = config(9, 7, 0.2, 0.4, 4);
        let mut rng = ChaCha12Rng::seed_from_u64(13);
        let population = GridPopulation::try_new(&config, &mut rng).unwrap();

        let mut counts = vec![0usize; config.nr_categories as usize];
        for (_, category) in population.agents() {
            counts[(category - 1) as usize] += 1;
        }
        let min = counts.iter().min().unwrap();
        let max = counts.iter().max().unwrap();
        assert!(max - min <= 1, "counts {counts:?}");
    }

    #[test]
    fn initialization_is_deterministic_for_fixed_seed() {
        let config = config(16, 12, 0.25, 0.4, 3);
        let a = GridPopulation::try_new(&config, &mut ChaCha12Rng::seed_from_u64(99)).unwrap();
        let b = GridPopulation::try_new(&config, &mut ChaCha12Rng::seed_from_u64(99)).unwrap();
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn invalid_configuration_is_rejected_before_building() {
        let config = config(10, 10, 1.0, 0.5, 2);
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let err = GridPopulation::try_new(&config, &mut rng).unwrap_err();
        assert_eq!(
            err,
            PopulationError::Config(SimConfigError::EmptyRatioOutOfRange(1.0))
        );
    }

    #[test]
    fn explicit_layouts_are_validated() {
        let config = config(3, 3, 0.0, 0.5, 2);

        let err = GridPopulation::try_from_agents(&config, vec![(Cell::new(3, 0), 1)]).unwrap_err();
        assert_eq!(err, PopulationError::CellOutOfBounds(Cell::new(3, 0)));

        let err = GridPopulation::try_from_agents(
            &config,
            vec![(Cell::new(0, 0), 1), (Cell::new(0, 0), 2)],
        )
        .unwrap_err();
        assert_eq!(err, PopulationError::DuplicateCell(Cell::new(0, 0)));

        let err = GridPopulation::try_from_agents(&config, vec![(Cell::new(0, 0), 0)]).unwrap_err();
        assert_eq!(
            err,
            PopulationError::CategoryOutOfRange {
                cell: Cell::new(0, 0),
                category: 0
            }
        );

        let err = GridPopulation::try_from_agents(&config, vec![(Cell::new(0, 0), 3)]).unwrap_err();
        assert_eq!(
            err,
            PopulationError::CategoryOutOfRange {
                cell: Cell::new(0, 0),
                category: 3
            }
        );
    }

    #[test]
    fn explicit_layout_fills_the_rest_with_vacancies() {
        let config = config(3, 2, 0.0, 0.5, 2);
        let population = GridPopulation::try_from_agents(
            &config,
            vec![(Cell::new(0, 0), 1), (Cell::new(2, 1), 2)],
        )
        .unwrap();
        assert_eq!(population.occupied_count(), 2);
        assert_eq!(population.vacant_count(), 4);
        assert!(population.is_vacant(Cell::new(1, 0)));
        assert_partition(&population);
    }

    #[test]
    fn isolated_agent_is_satisfied_at_any_threshold() {
        let config = config(5, 5, 0.0, 1.0, 2);
        let population =
            GridPopulation::try_from_agents(&config, vec![(Cell::new(2, 2), 1)]).unwrap();
        assert!(population.try_is_satisfied(Cell::new(2, 2)).unwrap());
        assert_eq!(population.satisfied_count(), 1);
    }

    #[test]
    fn threshold_comparison_is_inclusive() {
        // Two similar and two different neighbors: ratio exactly 0.5.
        let agents = vec![
            (Cell::new(1, 1), 1),
            (Cell::new(0, 1), 1),
            (Cell::new(2, 1), 1),
            (Cell::new(1, 0), 2),
            (Cell::new(1, 2), 2),
        ];

        let at_threshold = GridPopulation::try_from_agents(
            &config(3, 3, 0.0, 0.5, 2),
            agents.clone(),
        )
        .unwrap();
        assert!(at_threshold.try_is_satisfied(Cell::new(1, 1)).unwrap());

        let above_threshold = GridPopulation::try_from_agents(
            &config(3, 3, 0.0, 0.6, 2),
            agents,
        )
        .unwrap();
        assert!(!above_threshold.try_is_satisfied(Cell::new(1, 1)).unwrap());
    }

    #[test]
    fn vacant_neighbors_are_not_counted() {
        // One similar neighbor, five vacant ones: ratio 1.0.
        let config = config(4, 4, 0.0, 1.0, 2);
        let population = GridPopulation::try_from_agents(
            &config,
            vec![(Cell::new(1, 1), 1), (Cell::new(2, 1), 1)],
        )
        .unwrap();
        assert!(population.try_is_satisfied(Cell::new(1, 1)).unwrap());
        assert!(population.try_is_satisfied(Cell::new(2, 1)).unwrap());
    }

    #[test]
    fn corner_cells_see_a_clipped_neighborhood() {
        // 2x2 block in the corner: each agent sees exactly three neighbors.
        let config = config(3, 3, 0.0, 0.5, 2);
        let population = GridPopulation::try_from_agents(
            &config,
            vec![
                (Cell::new(0, 0), 1),
                (Cell::new(1, 0), 1),
                (Cell::new(0, 1), 2),
                (Cell::new(1, 1), 2),
            ],
        )
        .unwrap();

        // Corner agent: one similar, two different.
        assert!(!population.try_is_satisfied(Cell::new(0, 0)).unwrap());
        // 1/3 < 0.5 on every cell of this block.
        assert_eq!(population.satisfied_count(), 0);
        let expected = 4.0 / 12.0;
        assert!((population.similarity_ratio() - expected).abs() < 1e-12);
    }

    #[test]
    fn satisfaction_requires_an_occupied_cell() {
        let config = config(3, 3, 0.0, 0.5, 2);
        let population =
            GridPopulation::try_from_agents(&config, vec![(Cell::new(0, 0), 1)]).unwrap();
        let err = population.try_is_satisfied(Cell::new(1, 1)).unwrap_err();
        assert_eq!(err, PopulationError::UnknownCell(Cell::new(1, 1)));
    }

    #[test]
    fn relocation_moves_the_agent_and_preserves_the_partition() {
        let config = config(3, 3, 0.0, 0.5, 2);
        let mut population = GridPopulation::try_from_agents(
            &config,
            vec![(Cell::new(0, 0), 2), (Cell::new(1, 0), 1)],
        )
        .unwrap();

        population.try_relocate(Cell::new(0, 0), Cell::new(2, 2)).unwrap();

        assert_eq!(population.category_at(Cell::new(2, 2)), Some(2));
        assert_eq!(population.category_at(Cell::new(0, 0)), None);
        assert!(population.is_vacant(Cell::new(0, 0)));
        assert!(!population.is_vacant(Cell::new(2, 2)));
        assert_eq!(population.occupied_count(), 2);
        assert_eq!(population.vacant_count(), 7);
        assert_partition(&population);
    }

    #[test]
    fn relocation_rejects_illegal_endpoints() {
        let config = config(3, 3, 0.0, 0.5, 2);
        let mut population = GridPopulation::try_from_agents(
            &config,
            vec![(Cell::new(0, 0), 1), (Cell::new(1, 0), 2)],
        )
        .unwrap();
        let before = population.snapshot();

        // Occupied destination.
        let err = population
            .try_relocate(Cell::new(0, 0), Cell::new(1, 0))
            .unwrap_err();
        assert_eq!(
            err,
            PopulationError::InvalidRelocation {
                source: Cell::new(0, 0),
                dest: Cell::new(1, 0)
            }
        );

        // Vacant source.
        let err = population
            .try_relocate(Cell::new(2, 2), Cell::new(1, 1))
            .unwrap_err();
        assert_eq!(
            err,
            PopulationError::InvalidRelocation {
                source: Cell::new(2, 2),
                dest: Cell::new(1, 1)
            }
        );

        assert_eq!(population.snapshot(), before);
    }

    #[test]
    fn sample_vacancy_returns_none_on_a_full_grid() {
        let config = config(1, 2, 0.0, 0.5, 2);
        let population = GridPopulation::try_from_agents(
            &config,
            vec![(Cell::new(0, 0), 1), (Cell::new(0, 1), 2)],
        )
        .unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        assert_eq!(population.sample_vacancy(&mut rng), None);
    }

    #[test]
    fn uniform_block_is_fully_satisfied() {
        let config = config(2, 2, 0.0, 1.0, 1);
        let population = GridPopulation::try_from_agents(
            &config,
            vec![
                (Cell::new(0, 0), 1),
                (Cell::new(1, 0), 1),
                (Cell::new(0, 1), 1),
                (Cell::new(1, 1), 1),
            ],
        )
        .unwrap();
        assert_eq!(population.satisfied_count(), 4);
        assert_eq!(population.similarity_ratio(), 1.0);
    }

    #[test]
    fn similarity_ratio_without_links_is_one() {
        let config = config(5, 5, 0.0, 0.5, 2);
        let population = GridPopulation::try_from_agents(
            &config,
            vec![(Cell::new(0, 0), 1), (Cell::new(4, 4), 2)],
        )
        .unwrap();
        assert_eq!(population.similarity_ratio(), 1.0);
    }

    #[test]
    fn snapshot_lists_agents_row_major() {
        let config = config(4, 4, 0.0, 0.5, 2);
        let population = GridPopulation::try_from_agents(
            &config,
            vec![
                (Cell::new(3, 2), 1),
                (Cell::new(0, 0), 2),
                (Cell::new(2, 0), 1),
                (Cell::new(1, 3), 2),
            ],
        )
        .unwrap();
        let snapshot = population.snapshot();
        let cells: Vec<Cell> = snapshot.agents.iter().map(|&(cell, _)| cell).collect();
        assert_eq!(
            cells,
            vec![
                Cell::new(0, 0),
                Cell::new(2, 0),
                Cell::new(3, 2),
                Cell::new(1, 3)
            ]
        );
        assert_eq!(snapshot.width, 4);
        assert_eq!(snapshot.height, 4);
    }
}
