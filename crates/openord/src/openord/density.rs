use super::queue::FifoQueue;
use super::LayoutError;
use crate::Vec2;
use std::collections::HashMap;

/// Dimensions and tuning constants of the density field
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DensityConfig {
    /// Number of cells along each axis of the coarse grid
    pub grid_size: usize,

    /// Width and height of the world viewport, centered on the origin
    pub view_size: f64,

    /// Half-width of the falloff kernel, in cells
    pub radius: usize,

    /// Cells along each viewport edge that sample as `boundary_penalty`,
    /// widened to `radius` when smaller
    pub boundary: usize,

    /// Density reported inside the boundary margin
    pub boundary_penalty: f64,

    /// Numerator of the per-occupant fine density term
    pub fine_scale: f64,

    /// Regularizer added to the squared distance of the fine density term
    pub fine_epsilon: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            grid_size: 1000,
            view_size: 4000.0,
            radius: 10,
            boundary: 10,
            boundary_penalty: 1e4,
            fine_scale: 1e-4,
            fine_epsilon: 1e-50,
        }
    }
}

/// Per-run placement state of a graph node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Dense index of the node in its graph description
    pub index: usize,

    /// Current world position
    pub position: Vec2,

    /// Position the node was last inserted into the density field at
    pub sub_position: Vec2,

    /// Whether the node is pinned by an earlier layout
    pub fixed: bool,

    /// Energy of the last accepted position
    pub energy: f64,
}

impl Node {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            position: Vec2::zero(),
            sub_position: Vec2::zero(),
            fixed: false,
            energy: 0.0,
        }
    }
}

/// Node recorded in a fine-mode cell
#[derive(Debug, Clone, Copy, PartialEq)]
struct Occupant {
    index: usize,
    position: Vec2,
}

/// Two-resolution approximation of local node density
///
/// The coarse grid accumulates a falloff kernel per inserted node and is
/// sampled as the squared value of a single cell. Fine mode keeps the exact
/// occupants of each cell and sums an inverse square term over the 3x3
/// neighborhood of the sampled position.
#[derive(Debug, Clone)]
pub struct DensityField {
    config: DensityConfig,
    view_to_grid: f64,
    fall_off: Vec<f64>,
    density: Vec<f64>,
    // Fine occupancy only exists during the last stage and is much sparser
    // than the grid, so cells are allocated on first use.
    bins: HashMap<(usize, usize), FifoQueue<Occupant>>,
}

impl Default for DensityField {
    fn default() -> Self {
        Self::new(DensityConfig::default())
    }
}

impl DensityField {
    pub fn new(config: DensityConfig) -> Self {
        let radius = config.radius as i64;
        let r = config.radius as f64;
        let mut fall_off = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
        for i in -radius..=radius {
            for j in -radius..=radius {
                fall_off.push(((r - (i as f64).abs()) / r) * ((r - (j as f64).abs()) / r));
            }
        }

        Self {
            view_to_grid: config.grid_size as f64 / config.view_size,
            density: vec![0.0; config.grid_size * config.grid_size],
            bins: HashMap::new(),
            fall_off,
            config,
        }
    }

    pub fn config(&self) -> &DensityConfig {
        &self.config
    }

    /// Zero the coarse grid and empty every fine cell, keeping allocations
    pub fn reset(&mut self) {
        self.density.iter_mut().for_each(|d| *d = 0.0);
        self.bins.values_mut().for_each(FifoQueue::reset);
    }

    /// Map a world coordinate to its (possibly out of range) cell index
    fn cell(&self, coordinate: f64) -> i64 {
        ((coordinate + self.config.view_size / 2.0 + 0.5) * self.view_to_grid).floor() as i64
    }

    /// Cell covering `position`, if it lies on the grid
    fn cell_of(&self, position: Vec2) -> Result<(usize, usize), LayoutError> {
        let (x, y) = (self.cell(position.x), self.cell(position.y));
        let size = self.config.grid_size as i64;
        if !(0..size).contains(&x) || !(0..size).contains(&y) {
            return Err(LayoutError::OutOfBounds { x, y });
        }
        Ok((x as usize, y as usize))
    }

    /// Top-left cell of the kernel footprint centered on `position`
    fn kernel_origin(&self, position: Vec2) -> Result<(usize, usize), LayoutError> {
        let radius = self.config.radius as i64;
        let (x, y) = (self.cell(position.x), self.cell(position.y));
        let size = self.config.grid_size as i64;
        let fits = |c: i64| c - radius >= 0 && c + radius < size;
        if !fits(x) || !fits(y) {
            return Err(LayoutError::OutOfBounds { x, y });
        }
        Ok(((x - radius) as usize, (y - radius) as usize))
    }

    /// Accumulated coarse value of the cell at column `x`, row `y`
    pub fn coarse_value(&self, x: usize, y: usize) -> f64 {
        self.density[y * self.config.grid_size + x]
    }

    /// Indices of the fine occupants of the cell at column `x`, row `y`,
    /// oldest first
    pub fn occupants(&self, x: usize, y: usize) -> impl Iterator<Item = usize> + '_ {
        self.bins
            .get(&(x, y))
            .into_iter()
            .flat_map(|bin| bin.as_slice().iter().map(|occupant| occupant.index))
    }

    /// Density at `position`
    pub fn sample(&self, position: Vec2, fine: bool) -> f64 {
        let (x, y) = (self.cell(position.x), self.cell(position.y));
        // Never narrower than the kernel, so every unpenalized cell can be inserted
        let margin = self.config.boundary.max(self.config.radius) as i64;
        let upper = self.config.grid_size as i64 - margin;
        if x < margin || x >= upper || y < margin || y >= upper {
            return self.config.boundary_penalty;
        }
        let (x, y) = (x as usize, y as usize);

        if !fine {
            let d = self.coarse_value(x, y);
            return d * d;
        }

        let last = self.config.grid_size - 1;
        let mut density = 0.0;
        for cy in y.saturating_sub(1)..=(y + 1).min(last) {
            for cx in x.saturating_sub(1)..=(x + 1).min(last) {
                let Some(bin) = self.bins.get(&(cx, cy)) else {
                    continue;
                };
                for occupant in bin.as_slice() {
                    let d = position.distance_squared(occupant.position);
                    density += self.config.fine_scale / (d + self.config.fine_epsilon);
                }
            }
        }
        density
    }

    /// Record `node` at its current position
    pub fn insert(&mut self, node: &mut Node, fine: bool) -> Result<(), LayoutError> {
        if fine {
            self.fine_insert(node)
        } else {
            self.coarse_insert(node)
        }
    }

    fn fine_insert(&mut self, node: &mut Node) -> Result<(), LayoutError> {
        let cell = self.cell_of(node.position)?;
        node.sub_position = node.position;
        self.bins.entry(cell).or_default().enqueue(Occupant {
            index: node.index,
            position: node.position,
        });
        Ok(())
    }

    fn coarse_insert(&mut self, node: &mut Node) -> Result<(), LayoutError> {
        let origin = self.kernel_origin(node.position)?;
        node.sub_position = node.position;
        self.splat(origin, 1.0);
        Ok(())
    }

    /// Undo the last insertion of `node`
    ///
    /// Nothing is removed while the matching first insertion is still
    /// pending. Fine removal consumes the oldest occupant of the node's
    /// last-indexed cell, so callers must remove nodes of a cell in the order
    /// they were inserted.
    pub fn remove(
        &mut self,
        node: &Node,
        first_add: bool,
        fine_first_add: bool,
        fine: bool,
    ) -> Result<(), LayoutError> {
        if fine && !fine_first_add {
            self.fine_remove(node)
        } else if !first_add {
            self.coarse_remove(node)
        } else {
            Ok(())
        }
    }

    fn fine_remove(&mut self, node: &Node) -> Result<(), LayoutError> {
        let (x, y) = self.cell_of(node.sub_position)?;
        self.bins
            .get_mut(&(x, y))
            .and_then(|bin| bin.dequeue().ok())
            .ok_or(LayoutError::EmptyQueue { x, y })?;
        Ok(())
    }

    fn coarse_remove(&mut self, node: &Node) -> Result<(), LayoutError> {
        let origin = self.kernel_origin(node.sub_position)?;
        self.splat(origin, -1.0);
        Ok(())
    }

    fn splat(&mut self, (x, y): (usize, usize), sign: f64) {
        let width = 2 * self.config.radius + 1;
        let size = self.config.grid_size;
        for i in 0..width {
            let row = &mut self.density[(y + i) * size + x..(y + i) * size + x + width];
            for (cell, fall_off) in row.iter_mut().zip(&self.fall_off[i * width..(i + 1) * width]) {
                *cell += sign * fall_off;
            }
        }
    }
}
