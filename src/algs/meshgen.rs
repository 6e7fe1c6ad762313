//! Basic mesh generators for structured intervals and rectangles.
//!
//! Every rank generates the same global topology and keeps its own share:
//! cells are split into contiguous chunks by rank, each rank keeps its cells
//! and their closures, and every entity is owned by the lowest rank holding a
//! cell that touches it. No communication is needed since the generation is
//! deterministic.

use crate::algs::communicator::Communicator;
use crate::mesh_error::MeshBlocksError;
use crate::topology::cell_type::CellType;
use crate::topology::mesh::{Mesh, MeshBuilder};
use crate::topology::point::PointId;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Options for mesh generators.
#[derive(Clone, Debug)]
pub struct MeshGenOptions {
    /// Split cells across the ranks of the communicator. When false every
    /// rank holds the whole mesh and rank 0 owns every entity.
    pub distribute: bool,
}

impl Default for MeshGenOptions {
    fn default() -> Self {
        Self { distribute: true }
    }
}

fn invalid_mesh(message: impl Into<String>) -> MeshBlocksError {
    MeshBlocksError::InvalidMesh(message.into())
}

/// Global topology shared by all generators before distribution.
struct GlobalTopology {
    cell_type: CellType,
    gdim: usize,
    vertices: Vec<(PointId, Vec<f64>)>,
    /// Non-vertex entities in increasing dimension.
    entities: Vec<(PointId, usize, Vec<PointId>)>,
    /// Cells in generation order; partitioning follows this order.
    cells: Vec<PointId>,
}

impl GlobalTopology {
    fn closure(&self, cones: &HashMap<PointId, &[PointId]>, p: PointId) -> BTreeSet<PointId> {
        let mut out = BTreeSet::new();
        let mut stack = vec![p];
        while let Some(q) = stack.pop() {
            if out.insert(q) {
                if let Some(cone) = cones.get(&q) {
                    stack.extend_from_slice(cone);
                }
            }
        }
        out
    }

    fn distribute(
        self,
        options: &MeshGenOptions,
        comm: Arc<dyn Communicator>,
    ) -> Result<Mesh, MeshBlocksError> {
        let size = comm.size();
        let rank = comm.rank();
        let n_cells = self.cells.len();
        let cell_rank = |i: usize| -> usize {
            if options.distribute {
                // Inverse of the chunk bounds `r * n / size`.
                (0..size)
                    .rev()
                    .find(|&r| r * n_cells / size <= i)
                    .unwrap_or(0)
            } else {
                0
            }
        };

        let cones: HashMap<PointId, &[PointId]> = self
            .entities
            .iter()
            .map(|(p, _, cone)| (*p, cone.as_slice()))
            .collect();
        let mut owners: HashMap<PointId, usize> = HashMap::new();
        let mut local: BTreeSet<PointId> = BTreeSet::new();
        for (i, &cell) in self.cells.iter().enumerate() {
            let r = cell_rank(i);
            let keep = !options.distribute || r == rank;
            for q in self.closure(&cones, cell) {
                owners
                    .entry(q)
                    .and_modify(|o| *o = (*o).min(r))
                    .or_insert(r);
                if keep {
                    local.insert(q);
                }
            }
        }

        let mut builder = MeshBuilder::new(self.cell_type, self.gdim);
        for (p, x) in &self.vertices {
            if local.contains(p) {
                builder.add_vertex(*p, x)?;
            }
        }
        for (p, dim, cone) in &self.entities {
            if local.contains(p) {
                builder.add_entity(*p, *dim, cone)?;
            }
        }
        for p in &local {
            let owner = owners.get(p).copied().unwrap_or(0);
            builder.set_owner(*p, owner);
        }
        builder.build(comm)
    }
}

/// Generate `[a, b]` split into `n` segments.
///
/// Vertex `i` gets id `i + 1`, segment `i` gets id `n + 2 + i`.
pub fn interval_mesh(
    n: usize,
    bounds: [f64; 2],
    options: &MeshGenOptions,
    comm: Arc<dyn Communicator>,
) -> Result<Mesh, MeshBlocksError> {
    if n == 0 {
        return Err(invalid_mesh("n must be positive"));
    }
    let [a, b] = bounds;
    let h = (b - a) / n as f64;
    let vertex = |i: usize| PointId::new(i as u64 + 1);
    let mut vertices = Vec::with_capacity(n + 1);
    for i in 0..=n {
        vertices.push((vertex(i)?, vec![a + h * i as f64]));
    }
    let mut entities = Vec::with_capacity(n);
    let mut cells = Vec::with_capacity(n);
    for i in 0..n {
        let cell = PointId::new((n + 2 + i) as u64)?;
        entities.push((cell, 1, vec![vertex(i)?, vertex(i + 1)?]));
        cells.push(cell);
    }
    GlobalTopology {
        cell_type: CellType::Segment,
        gdim: 1,
        vertices,
        entities,
        cells,
    }
    .distribute(options, comm)
}

/// Generate a structured `nx`×`ny` quadrilateral mesh of `[min, max]`,
/// including all edges so that edge dofs can be numbered.
pub fn rectangle_mesh(
    nx: usize,
    ny: usize,
    min: [f64; 2],
    max: [f64; 2],
    options: &MeshGenOptions,
    comm: Arc<dyn Communicator>,
) -> Result<Mesh, MeshBlocksError> {
    if nx == 0 || ny == 0 {
        return Err(invalid_mesh("nx and ny must be positive"));
    }
    let dx = (max[0] - min[0]) / nx as f64;
    let dy = (max[1] - min[1]) / ny as f64;
    let mut next_id = 1u64;
    let mut fresh = || -> Result<PointId, MeshBlocksError> {
        let p = PointId::new(next_id)?;
        next_id += 1;
        Ok(p)
    };

    let row = nx + 1;
    let mut vertices = Vec::with_capacity(row * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            let x = vec![min[0] + dx * i as f64, min[1] + dy * j as f64];
            vertices.push((fresh()?, x));
        }
    }
    let v = |i: usize, j: usize| vertices[j * row + i].0;

    let mut entities = Vec::new();
    // Horizontal edge (i, j) joins (i, j)-(i+1, j); vertical joins (i, j)-(i, j+1).
    let mut horizontal = Vec::with_capacity(nx * (ny + 1));
    for j in 0..=ny {
        for i in 0..nx {
            let e = fresh()?;
            entities.push((e, 1, vec![v(i, j), v(i + 1, j)]));
            horizontal.push(e);
        }
    }
    let mut vertical = Vec::with_capacity(row * ny);
    for j in 0..ny {
        for i in 0..=nx {
            let e = fresh()?;
            entities.push((e, 1, vec![v(i, j), v(i, j + 1)]));
            vertical.push(e);
        }
    }
    let mut cells = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let cell = fresh()?;
            let cone = vec![
                horizontal[j * nx + i],
                vertical[j * row + i + 1],
                horizontal[(j + 1) * nx + i],
                vertical[j * row + i],
            ];
            entities.push((cell, 2, cone));
            cells.push(cell);
        }
    }
    GlobalTopology {
        cell_type: CellType::Quadrilateral,
        gdim: 2,
        vertices,
        entities,
        cells,
    }
    .distribute(options, comm)
}
