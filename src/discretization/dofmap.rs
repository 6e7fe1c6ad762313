//! Unrestricted scalar dof maps.
//!
//! A [`DofMap`] attaches `element.entity_dofs(dim)` consecutive dofs to every
//! local entity of dimension `dim` and numbers them:
//!
//! - **locally**: owned entities first (by dimension, then id), then ghost
//!   entities in the same order;
//! - **globally**: owned dofs are offset by the prefix sum of owned dof counts
//!   over lower ranks; ghost dofs take the global index their owner assigned.
//!
//! Ghost indices are resolved in two collective rounds: every rank publishes
//! the ghost entities it needs, then every owner publishes the first global
//! dof of each requested entity it owns.

use crate::algs::communicator::Communicator;
use crate::data::index_map::IndexMap;
use crate::discretization::element::FiniteElement;
use crate::mesh_error::MeshBlocksError;
use crate::topology::mesh::{Mesh, MeshId};
use crate::topology::point::PointId;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

/// One entity carrying dofs, with its local dof range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDofs {
    pub point: PointId,
    pub dim: usize,
    pub dofs: Range<usize>,
}

/// Local and global dof numbering of one scalar field.
#[derive(Debug)]
pub struct DofMap {
    mesh_id: MeshId,
    element_signature: String,
    /// Entities carrying dofs, in local dof order.
    entities: Vec<EntityDofs>,
    /// Local dof -> index into `entities`.
    dof_to_entity: Vec<usize>,
    entity_lookup: HashMap<PointId, usize>,
    cell_dofs: HashMap<PointId, Vec<usize>>,
    index_map: IndexMap,
}

impl DofMap {
    /// Number the dofs of `element` on `mesh`.
    ///
    /// Collective over the mesh communicator.
    pub fn build(mesh: &Mesh, element: &FiniteElement) -> Result<Self, MeshBlocksError> {
        if element.cell_type() != mesh.cell_type() {
            return Err(MeshBlocksError::UnsupportedElement(format!(
                "{element} on a mesh of {} cells",
                mesh.cell_type().as_str()
            )));
        }
        let tdim = mesh.tdim();
        for dim in 0..=tdim {
            if element.entity_dofs(dim) > 0 && !mesh.cells().is_empty() && mesh.num_entities(dim) == 0
            {
                return Err(MeshBlocksError::InvalidMesh(format!(
                    "{element} needs entities of dimension {dim}, the mesh has none"
                )));
            }
        }

        let mut entities = Vec::new();
        let mut ghost_entities = Vec::new();
        for dim in 0..=tdim {
            let n = element.entity_dofs(dim);
            if n == 0 {
                continue;
            }
            for &p in mesh.entities(dim)? {
                if mesh.is_owned(p) {
                    entities.push((p, dim, n));
                } else {
                    ghost_entities.push((p, dim, n));
                }
            }
        }
        let owned_entities = entities.len();
        entities.extend(ghost_entities);

        let mut numbered = Vec::with_capacity(entities.len());
        let mut dof_to_entity = Vec::new();
        let mut next = 0usize;
        for (idx, &(point, dim, n)) in entities.iter().enumerate() {
            numbered.push(EntityDofs {
                point,
                dim,
                dofs: next..next + n,
            });
            dof_to_entity.extend(std::iter::repeat(idx).take(n));
            next += n;
        }
        let size_owned = numbered[..owned_entities]
            .iter()
            .map(|e| e.dofs.len())
            .sum::<usize>();

        let comm = mesh.comm().as_ref();
        let (offset, size_global) = IndexMap::owned_offset(comm, size_owned)?;
        let first_global: HashMap<PointId, u64> = numbered[..owned_entities]
            .iter()
            .map(|e| (e.point, offset + e.dofs.start as u64))
            .collect();
        let resolved = resolve_ghost_entities(comm, &numbered[owned_entities..], &first_global)?;

        let mut ghosts = Vec::with_capacity(next - size_owned);
        let mut ghost_owners = Vec::with_capacity(next - size_owned);
        for e in &numbered[owned_entities..] {
            let owner = mesh.owner(e.point)?;
            let first = *resolved
                .get(&e.point)
                .ok_or(MeshBlocksError::UnresolvedGhost {
                    point: e.point,
                    owner,
                })?;
            for j in 0..e.dofs.len() {
                ghosts.push(first + j as u64);
                ghost_owners.push(owner);
            }
        }
        let index_map = IndexMap::new(offset, size_owned, size_global, ghosts, ghost_owners)?;

        let entity_lookup: HashMap<PointId, usize> = numbered
            .iter()
            .enumerate()
            .map(|(i, e)| (e.point, i))
            .collect();
        let mut cell_dofs = HashMap::with_capacity(mesh.cells().len());
        for &cell in mesh.cells() {
            let mut closure: Vec<(usize, PointId)> = mesh
                .closure(cell)?
                .iter()
                .map(|&q| mesh.dimension_of(q).map(|d| (d, q)))
                .collect::<Result<_, _>>()?;
            closure.sort_unstable();
            let mut dofs = Vec::with_capacity(element.space_dimension());
            for (_, q) in closure {
                if let Some(&i) = entity_lookup.get(&q) {
                    dofs.extend(numbered[i].dofs.clone());
                }
            }
            cell_dofs.insert(cell, dofs);
        }

        log::debug!(
            "rank {}: dof map for {element}: {size_owned} owned, {} ghosts, {size_global} global",
            comm.rank(),
            index_map.num_ghosts()
        );
        Ok(Self {
            mesh_id: mesh.id(),
            element_signature: element.signature(),
            entities: numbered,
            dof_to_entity,
            entity_lookup,
            cell_dofs,
            index_map,
        })
    }

    /// Identity of the mesh this dof map was built on.
    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    /// Signature of the element this dof map was built for.
    pub fn element_signature(&self) -> &str {
        &self.element_signature
    }

    /// Owned and ghost numbering.
    pub fn index_map(&self) -> &IndexMap {
        &self.index_map
    }

    /// Number of local (owned + ghost) dofs.
    pub fn num_local_dofs(&self) -> usize {
        self.dof_to_entity.len()
    }

    /// Number of dofs across all ranks.
    pub fn global_dimension(&self) -> u64 {
        self.index_map.size_global()
    }

    /// Entities carrying dofs, in local dof order.
    pub fn entities(&self) -> &[EntityDofs] {
        &self.entities
    }

    /// Entity carrying local dof `dof`.
    pub fn dof_entity(&self, dof: usize) -> Result<&EntityDofs, MeshBlocksError> {
        self.dof_to_entity
            .get(dof)
            .map(|&i| &self.entities[i])
            .ok_or(MeshBlocksError::DofOutOfBounds {
                index: dof,
                len: self.num_local_dofs(),
            })
    }

    /// Local dofs carried by `point` (empty range if none).
    pub fn entity_dofs(&self, point: PointId) -> Range<usize> {
        self.entity_lookup
            .get(&point)
            .map_or(0..0, |&i| self.entities[i].dofs.clone())
    }

    /// Local dofs of `cell`, ordered by closure entity (dimension, then id).
    pub fn cell_dofs(&self, cell: PointId) -> Result<&[usize], MeshBlocksError> {
        self.cell_dofs
            .get(&cell)
            .map(Vec::as_slice)
            .ok_or(MeshBlocksError::UnknownPoint(cell))
    }
}

/// Look up the first global dof of every ghost entity from its owner.
fn resolve_ghost_entities(
    comm: &dyn Communicator,
    ghosts: &[EntityDofs],
    owned_first: &HashMap<PointId, u64>,
) -> Result<HashMap<PointId, u64>, MeshBlocksError> {
    let requests: Vec<u64> = ghosts.iter().map(|e| e.point.get()).collect();
    let all_requests = comm.all_gather_varcount_u64(&requests)?;

    let mut replies = BTreeMap::new();
    for (rank, wanted) in all_requests.iter().enumerate() {
        if rank == comm.rank() {
            continue;
        }
        for &raw in wanted {
            let point = PointId::new(raw)?;
            if let Some(&first) = owned_first.get(&point) {
                replies.insert(raw, first);
            }
        }
    }
    let flat: Vec<u64> = replies.into_iter().flat_map(|(p, g)| [p, g]).collect();
    let all_replies = comm.all_gather_varcount_u64(&flat)?;

    let mut resolved = HashMap::with_capacity(ghosts.len());
    for reply in all_replies {
        for pair in reply.chunks_exact(2) {
            resolved.insert(PointId::new(pair[0])?, pair[1]);
        }
    }
    Ok(resolved)
}
