//! Cell type metadata for mesh cells.

/// Reference cell shapes supported by the mesh and element layers.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize,
)]
pub enum CellType {
    /// 0D vertex.
    #[default]
    Vertex,
    /// 1D segment/edge.
    Segment,
    /// 2D simplex (triangle).
    Triangle,
    /// 2D tensor-product cell (quad).
    Quadrilateral,
    /// 3D simplex (tet).
    Tetrahedron,
    /// 3D tensor-product cell (hex).
    Hexahedron,
}

impl CellType {
    /// Returns the topological dimension of the cell.
    pub fn dimension(self) -> usize {
        match self {
            CellType::Vertex => 0,
            CellType::Segment => 1,
            CellType::Triangle | CellType::Quadrilateral => 2,
            CellType::Tetrahedron | CellType::Hexahedron => 3,
        }
    }

    /// True for simplices (vertex, segment, triangle, tetrahedron).
    pub fn is_simplex(self) -> bool {
        matches!(
            self,
            CellType::Vertex | CellType::Segment | CellType::Triangle | CellType::Tetrahedron
        )
    }

    /// The shape of this cell's sub-entities of dimension `dim`, if any.
    pub fn sub_entity_type(self, dim: usize) -> Option<CellType> {
        if dim > self.dimension() {
            return None;
        }
        Some(match dim {
            0 => CellType::Vertex,
            1 => CellType::Segment,
            2 if self == CellType::Hexahedron => CellType::Quadrilateral,
            2 if self == CellType::Quadrilateral => CellType::Quadrilateral,
            2 => CellType::Triangle,
            _ => self,
        })
    }

    /// Short lowercase name used in element signatures.
    pub fn as_str(self) -> &'static str {
        match self {
            CellType::Vertex => "vertex",
            CellType::Segment => "interval",
            CellType::Triangle => "triangle",
            CellType::Quadrilateral => "quadrilateral",
            CellType::Tetrahedron => "tetrahedron",
            CellType::Hexahedron => "hexahedron",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_entities_of_hexahedron() {
        let hex = CellType::Hexahedron;
        assert_eq!(hex.sub_entity_type(0), Some(CellType::Vertex));
        assert_eq!(hex.sub_entity_type(1), Some(CellType::Segment));
        assert_eq!(hex.sub_entity_type(2), Some(CellType::Quadrilateral));
        assert_eq!(hex.sub_entity_type(3), Some(CellType::Hexahedron));
        assert_eq!(hex.sub_entity_type(4), None);
    }

    #[test]
    fn tetrahedron_faces_are_triangles() {
        assert_eq!(
            CellType::Tetrahedron.sub_entity_type(2),
            Some(CellType::Triangle)
        );
        assert!(CellType::Tetrahedron.is_simplex());
        assert!(!CellType::Quadrilateral.is_simplex());
    }
}
