//! MeshBlocksError: Unified error type for mesh-blocks public APIs
//!
//! Every fallible constructor and query in the crate reports failures through
//! this enum. All conditions are local and synchronous: construction either
//! succeeds completely or no object is returned.

use crate::topology::point::PointId;
use thiserror::Error;

/// Unified error type for mesh-blocks operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshBlocksError {
    /// Attempted to construct a PointId with a zero value (invalid).
    #[error("PointId must be non-zero (0 is reserved as invalid/sentinel)")]
    InvalidPointId,
    /// The same point was inserted twice into a mesh.
    #[error("Duplicate point {0} in mesh")]
    DuplicatePoint(PointId),
    /// A point appeared in a cone but wasn’t added to the mesh first.
    #[error("Topology error: point `{0}` found in cone but not in point set")]
    MissingPointInCone(PointId),
    /// A cone point does not have a strictly lower dimension than its entity.
    #[error("Topology error: cone of {entity} (dim {entity_dim}) contains {point} of dim {point_dim}")]
    ConeDimension {
        entity: PointId,
        entity_dim: usize,
        point: PointId,
        point_dim: usize,
    },
    /// A vertex was given coordinates of the wrong geometric dimension.
    #[error("Vertex {point} has {found} coordinates, expected {expected}")]
    CoordinateDimension {
        point: PointId,
        expected: usize,
        found: usize,
    },
    /// A point does not belong to the mesh.
    #[error("Point {0} is not an entity of the mesh")]
    UnknownPoint(PointId),
    /// A point is in the mesh but not of the requested dimension.
    #[error("Point {point} has dimension {found}, expected {expected}")]
    EntityDimensionMismatch {
        point: PointId,
        expected: usize,
        found: usize,
    },
    /// An entity dimension exceeds the topological dimension of the mesh.
    #[error("Invalid entity dimension {dim} for mesh of topological dimension {tdim}")]
    InvalidEntityDimension { dim: usize, tdim: usize },
    /// No ownership record exists for a point.
    #[error("Missing ownership for point {0}")]
    MissingOwnership(PointId),
    /// Mesh generator or builder arguments are unusable.
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
    /// An element is not defined for the given cell type or degree.
    #[error("Unsupported element: {0}")]
    UnsupportedElement(String),
    /// A block was supplied on a different mesh than block 0.
    #[error("Block {block} lives on mesh {found}, expected mesh {expected}")]
    MeshMismatch {
        block: usize,
        expected: u64,
        found: u64,
    },
    /// A dof map was built for a different element than the one supplied with it.
    #[error("Dof map of block {block} was built for element `{dofmap}`, got `{element}`")]
    ElementMismatch {
        block: usize,
        element: String,
        dofmap: String,
    },
    /// Parallel lists passed to a constructor disagree in length.
    #[error("Length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A block space needs at least one block.
    #[error("A block function space needs at least one block")]
    EmptyBlockList,
    /// A component index is outside the number of blocks.
    #[error("Component index {index} out of bounds for {len} blocks")]
    ComponentOutOfBounds { index: usize, len: usize },
    /// An empty component path was passed to sub-space extraction.
    #[error("Component path must contain at least one index")]
    EmptyComponent,
    /// A local dof index is out of range for its dof map.
    #[error("Dof {index} out of bounds for {len} local dofs")]
    DofOutOfBounds { index: usize, len: usize },
    /// Owner and ghost ranks disagree on whether a shared dof is active.
    #[error("Block {block}: ranks disagree on activity of global dof {global}")]
    InconsistentRestriction { block: usize, global: u64 },
    /// No owning rank published a global index for a ghost entity.
    #[error("Ghost point {point} has no global index published by rank {owner}")]
    UnresolvedGhost { point: PointId, owner: usize },
    /// The restricted/unrestricted correspondence is not a bijection.
    #[error("Broken dof correspondence: {0}")]
    BrokenCorrespondence(String),
    /// Communication failure reported by a communicator backend.
    #[error("Communication error: {0}")]
    CommError(String),
}
