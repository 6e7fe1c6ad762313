//! Immutable, shared mesh topology and geometry.
//!
//! A [`Mesh`] stores every local entity (vertices, edges, faces, cells) as a
//! [`PointId`] together with its topological dimension and its *cone*: the
//! entities of lower dimension on its boundary, exactly as in a sieve. The
//! *closure* of an entity is the entity plus everything reachable through
//! cones. Vertices carry coordinates, every point carries an owner rank.
//!
//! Meshes are built once through [`MeshBuilder`] and then shared read-only
//! through `Arc<Mesh>` by every dof map and function space defined on them.
//! Identity is tracked with a process-unique [`MeshId`]; two meshes are the
//! same mesh only when their ids match.

use crate::algs::communicator::Communicator;
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshBlocksError;
use crate::topology::cell_type::CellType;
use crate::topology::ownership::PointOwnership;
use crate::topology::point::PointId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a constructed mesh.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

impl MeshId {
    fn fresh() -> Self {
        MeshId(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local part of a (possibly distributed) mesh.
#[derive(Debug)]
pub struct Mesh {
    id: MeshId,
    cell_type: CellType,
    gdim: usize,
    /// Entities per dimension, sorted by id.
    strata: Vec<Vec<PointId>>,
    dims: HashMap<PointId, usize>,
    cones: HashMap<PointId, Vec<PointId>>,
    /// Closure per entity, sorted by id, including the entity itself.
    closures: HashMap<PointId, Vec<PointId>>,
    coordinates: HashMap<PointId, Vec<f64>>,
    ownership: PointOwnership,
    comm: Arc<dyn Communicator>,
}

impl Mesh {
    /// Identity of this mesh instance.
    pub fn id(&self) -> MeshId {
        self.id
    }

    /// Shape of the cells.
    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Topological dimension (dimension of the cells).
    pub fn tdim(&self) -> usize {
        self.cell_type.dimension()
    }

    /// Geometric dimension (coordinates per vertex).
    pub fn gdim(&self) -> usize {
        self.gdim
    }

    /// Communicator the mesh is distributed over.
    pub fn comm(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    /// Local entities of dimension `dim`, sorted by id.
    pub fn entities(&self, dim: usize) -> Result<&[PointId], MeshBlocksError> {
        self.strata
            .get(dim)
            .map(Vec::as_slice)
            .ok_or(MeshBlocksError::InvalidEntityDimension {
                dim,
                tdim: self.tdim(),
            })
    }

    /// Local cells, sorted by id.
    pub fn cells(&self) -> &[PointId] {
        &self.strata[self.tdim()]
    }

    /// Number of local entities of dimension `dim` (0 for invalid dimensions).
    pub fn num_entities(&self, dim: usize) -> usize {
        self.strata.get(dim).map_or(0, Vec::len)
    }

    /// Whether `p` is a local entity.
    pub fn contains(&self, p: PointId) -> bool {
        self.dims.contains_key(&p)
    }

    /// Topological dimension of entity `p`.
    pub fn dimension_of(&self, p: PointId) -> Result<usize, MeshBlocksError> {
        self.dims
            .get(&p)
            .copied()
            .ok_or(MeshBlocksError::UnknownPoint(p))
    }

    /// Boundary entities of `p` one or more dimensions down, as added.
    pub fn cone(&self, p: PointId) -> Result<&[PointId], MeshBlocksError> {
        self.cones
            .get(&p)
            .map(Vec::as_slice)
            .ok_or(MeshBlocksError::UnknownPoint(p))
    }

    /// `p` and every entity reachable through cones, sorted by id.
    pub fn closure(&self, p: PointId) -> Result<&[PointId], MeshBlocksError> {
        self.closures
            .get(&p)
            .map(Vec::as_slice)
            .ok_or(MeshBlocksError::UnknownPoint(p))
    }

    /// Entities of dimension `dim` in the closure of `p`, sorted by id.
    pub fn closure_of_dim(&self, p: PointId, dim: usize) -> Result<Vec<PointId>, MeshBlocksError> {
        Ok(self
            .closure(p)?
            .iter()
            .copied()
            .filter(|q| self.dims.get(q) == Some(&dim))
            .collect())
    }

    /// Vertices of `p`, sorted by id.
    pub fn vertices(&self, p: PointId) -> Result<Vec<PointId>, MeshBlocksError> {
        self.closure_of_dim(p, 0)
    }

    /// Coordinates of vertex `v`.
    pub fn coordinates(&self, v: PointId) -> Result<&[f64], MeshBlocksError> {
        match self.coordinates.get(&v) {
            Some(x) => Ok(x),
            None => Err(match self.dims.get(&v) {
                Some(&found) => MeshBlocksError::EntityDimensionMismatch {
                    point: v,
                    expected: 0,
                    found,
                },
                None => MeshBlocksError::UnknownPoint(v),
            }),
        }
    }

    /// Average of the vertex coordinates of `p`.
    pub fn midpoint(&self, p: PointId) -> Result<Vec<f64>, MeshBlocksError> {
        let vertices = self.vertices(p)?;
        let mut mid = vec![0.0; self.gdim];
        for v in &vertices {
            for (m, x) in mid.iter_mut().zip(self.coordinates(*v)?) {
                *m += x;
            }
        }
        let n = vertices.len().max(1) as f64;
        mid.iter_mut().for_each(|m| *m /= n);
        Ok(mid)
    }

    /// Ownership table for all local points.
    pub fn ownership(&self) -> &PointOwnership {
        &self.ownership
    }

    /// Owning rank of `p`.
    pub fn owner(&self, p: PointId) -> Result<usize, MeshBlocksError> {
        self.ownership.owner_or_err(p)
    }

    /// Whether this rank owns `p`.
    pub fn is_owned(&self, p: PointId) -> bool {
        self.ownership.is_owned_by(p, self.comm.rank())
    }
}

impl DebugInvariants for Mesh {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Mesh");
    }

    fn validate_invariants(&self) -> Result<(), MeshBlocksError> {
        for (dim, stratum) in self.strata.iter().enumerate() {
            for &p in stratum {
                let found = self.dimension_of(p)?;
                if found != dim {
                    return Err(MeshBlocksError::EntityDimensionMismatch {
                        point: p,
                        expected: dim,
                        found,
                    });
                }
                if self.closure(p)?.binary_search(&p).is_err() {
                    return Err(MeshBlocksError::InvalidMesh(format!(
                        "closure of {p} does not contain itself"
                    )));
                }
                self.owner(p)?;
            }
        }
        Ok(())
    }
}

/// Incremental builder for a [`Mesh`].
///
/// Points must be added before they are referenced by a cone. Points without
/// an explicit owner are owned by the building rank.
#[derive(Clone, Debug)]
pub struct MeshBuilder {
    cell_type: CellType,
    gdim: usize,
    points: BTreeMap<PointId, (usize, Vec<PointId>)>,
    coordinates: HashMap<PointId, Vec<f64>>,
    owners: HashMap<PointId, usize>,
}

impl MeshBuilder {
    /// Start a mesh of `cell_type` cells embedded in `gdim` dimensions.
    pub fn new(cell_type: CellType, gdim: usize) -> Self {
        Self {
            cell_type,
            gdim,
            points: BTreeMap::new(),
            coordinates: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Add a vertex with its coordinates.
    pub fn add_vertex(&mut self, p: PointId, coords: &[f64]) -> Result<&mut Self, MeshBlocksError> {
        if coords.len() != self.gdim {
            return Err(MeshBlocksError::CoordinateDimension {
                point: p,
                expected: self.gdim,
                found: coords.len(),
            });
        }
        self.insert_point(p, 0, Vec::new())?;
        self.coordinates.insert(p, coords.to_vec());
        Ok(self)
    }

    /// Add an entity of dimension `dim >= 1` with the given cone.
    pub fn add_entity(
        &mut self,
        p: PointId,
        dim: usize,
        cone: &[PointId],
    ) -> Result<&mut Self, MeshBlocksError> {
        let tdim = self.cell_type.dimension();
        if dim == 0 || dim > tdim {
            return Err(MeshBlocksError::InvalidEntityDimension { dim, tdim });
        }
        for &q in cone {
            let (q_dim, _) = self
                .points
                .get(&q)
                .ok_or(MeshBlocksError::MissingPointInCone(q))?;
            if *q_dim >= dim {
                return Err(MeshBlocksError::ConeDimension {
                    entity: p,
                    entity_dim: dim,
                    point: q,
                    point_dim: *q_dim,
                });
            }
        }
        self.insert_point(p, dim, cone.to_vec())?;
        Ok(self)
    }

    /// Record the owning rank of `p`.
    pub fn set_owner(&mut self, p: PointId, rank: usize) -> &mut Self {
        self.owners.insert(p, rank);
        self
    }

    fn insert_point(
        &mut self,
        p: PointId,
        dim: usize,
        cone: Vec<PointId>,
    ) -> Result<(), MeshBlocksError> {
        if self.points.contains_key(&p) {
            return Err(MeshBlocksError::DuplicatePoint(p));
        }
        self.points.insert(p, (dim, cone));
        Ok(())
    }

    /// Freeze the topology into a [`Mesh`] on `comm`.
    pub fn build(self, comm: Arc<dyn Communicator>) -> Result<Mesh, MeshBlocksError> {
        let tdim = self.cell_type.dimension();
        let my_rank = comm.rank();
        let mut strata = vec![Vec::new(); tdim + 1];
        let mut dims = HashMap::with_capacity(self.points.len());
        let mut cones = HashMap::with_capacity(self.points.len());
        let max_id = self.points.keys().next_back().map_or(0, |p| p.get()) as usize;
        let mut ownership = PointOwnership::with_capacity(max_id);

        // BTreeMap iteration keeps every stratum sorted by id.
        for (&p, (dim, cone)) in &self.points {
            strata[*dim].push(p);
            dims.insert(p, *dim);
            cones.insert(p, cone.clone());
            let owner = self.owners.get(&p).copied().unwrap_or(my_rank);
            ownership.set_from_owner(p, owner, my_rank)?;
        }
        for &p in self.owners.keys() {
            if !dims.contains_key(&p) {
                return Err(MeshBlocksError::UnknownPoint(p));
            }
        }

        // Cones strictly decrease dimension, so closures can be built bottom-up.
        let mut closures: HashMap<PointId, Vec<PointId>> = HashMap::with_capacity(dims.len());
        for stratum in &strata {
            for &p in stratum {
                let mut closure = vec![p];
                for q in &cones[&p] {
                    closure.extend_from_slice(&closures[q]);
                }
                closure.sort_unstable();
                closure.dedup();
                closures.insert(p, closure);
            }
        }

        let mesh = Mesh {
            id: MeshId::fresh(),
            cell_type: self.cell_type,
            gdim: self.gdim,
            strata,
            dims,
            cones,
            closures,
            coordinates: self.coordinates,
            ownership,
            comm,
        };
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        mesh.debug_assert_invariants();
        log::debug!(
            "rank {my_rank}: built mesh {} with {} cells",
            mesh.id,
            mesh.cells().len()
        );
        Ok(mesh)
    }
}
