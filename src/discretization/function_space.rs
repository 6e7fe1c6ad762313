//! Scalar function spaces: a mesh, an element and the dof map tying them.

use crate::discretization::dofmap::DofMap;
use crate::discretization::element::FiniteElement;
use crate::mesh_error::MeshBlocksError;
use crate::topology::mesh::Mesh;
use std::fmt;
use std::sync::Arc;

/// One scalar field on a mesh. All parts are shared and immutable.
#[derive(Clone, Debug)]
pub struct FunctionSpace {
    mesh: Arc<Mesh>,
    element: Arc<FiniteElement>,
    dofmap: Arc<DofMap>,
}

impl FunctionSpace {
    /// Build the dof map of `element` on `mesh`.
    ///
    /// Collective over the mesh communicator.
    pub fn new(mesh: Arc<Mesh>, element: Arc<FiniteElement>) -> Result<Self, MeshBlocksError> {
        let dofmap = Arc::new(DofMap::build(&mesh, &element)?);
        Ok(Self {
            mesh,
            element,
            dofmap,
        })
    }

    /// Assemble a space from an existing dof map.
    ///
    /// # Errors
    /// [`MeshBlocksError::MeshMismatch`] if `dofmap` was built on another mesh,
    /// [`MeshBlocksError::ElementMismatch`] if it was built for another element.
    pub fn from_parts(
        mesh: Arc<Mesh>,
        element: Arc<FiniteElement>,
        dofmap: Arc<DofMap>,
    ) -> Result<Self, MeshBlocksError> {
        check_parts(0, &mesh, &element, &dofmap)?;
        Ok(Self {
            mesh,
            element,
            dofmap,
        })
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn element(&self) -> &Arc<FiniteElement> {
        &self.element
    }

    pub fn dofmap(&self) -> &Arc<DofMap> {
        &self.dofmap
    }

    /// Global number of dofs.
    pub fn dim(&self) -> u64 {
        self.dofmap.global_dimension()
    }

    /// Coordinates of every local dof, flattened with stride `gdim`, in
    /// local dof order.
    pub fn tabulate_dof_coordinates(&self) -> Result<Vec<f64>, MeshBlocksError> {
        let gdim = self.mesh.gdim();
        let mut out = Vec::with_capacity(self.dofmap.num_local_dofs() * gdim);
        for entity in self.dofmap.entities() {
            let points = self
                .element
                .entity_dof_coordinates(&self.mesh, entity.point, entity.dim)?;
            for x in points {
                out.extend(x);
            }
        }
        Ok(out)
    }
}

impl fmt::Display for FunctionSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FunctionSpace({}, {} dofs, mesh {})",
            self.element,
            self.dim(),
            self.mesh.id()
        )
    }
}

/// Check that `dofmap` belongs to `mesh` and `element`; `block` only labels errors.
pub(crate) fn check_parts(
    block: usize,
    mesh: &Mesh,
    element: &FiniteElement,
    dofmap: &DofMap,
) -> Result<(), MeshBlocksError> {
    if dofmap.mesh_id() != mesh.id() {
        return Err(MeshBlocksError::MeshMismatch {
            block,
            expected: mesh.id().get(),
            found: dofmap.mesh_id().get(),
        });
    }
    let signature = element.signature();
    if dofmap.element_signature() != signature {
        return Err(MeshBlocksError::ElementMismatch {
            block,
            element: signature,
            dofmap: dofmap.element_signature().to_string(),
        });
    }
    Ok(())
}
