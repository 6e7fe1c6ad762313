//! Finite element descriptions: how many dofs live on each mesh entity.
//!
//! The block layer never evaluates basis functions; it only needs to know
//! the dof layout of an element (dofs per entity dimension) and where those
//! dofs sit geometrically. [`FiniteElement`] provides both for the Lagrange
//! family (continuous, dofs shared across cells) and the discontinuous
//! Lagrange family (every dof owned by its cell).

use crate::mesh_error::MeshBlocksError;
use crate::topology::cell_type::CellType;
use crate::topology::mesh::Mesh;
use crate::topology::point::PointId;
use std::fmt;

/// Element families supported by the dof layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ElementFamily {
    /// Continuous Lagrange (P_k on simplices, Q_k on tensor cells).
    Lagrange,
    /// Discontinuous Lagrange; all dofs are interior to the cell.
    DiscontinuousLagrange,
}

/// A scalar finite element on one cell type.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FiniteElement {
    family: ElementFamily,
    cell_type: CellType,
    degree: usize,
}

impl FiniteElement {
    /// Construct an element, validating degree and cell type.
    pub fn new(
        family: ElementFamily,
        cell_type: CellType,
        degree: usize,
    ) -> Result<Self, MeshBlocksError> {
        if cell_type == CellType::Vertex {
            return Err(MeshBlocksError::UnsupportedElement(
                "elements need a cell of dimension >= 1".to_string(),
            ));
        }
        if family == ElementFamily::Lagrange && degree == 0 {
            return Err(MeshBlocksError::UnsupportedElement(
                "continuous Lagrange needs degree >= 1; use DG0 instead".to_string(),
            ));
        }
        Ok(Self {
            family,
            cell_type,
            degree,
        })
    }

    /// Continuous Lagrange element of `degree`.
    pub fn lagrange(cell_type: CellType, degree: usize) -> Result<Self, MeshBlocksError> {
        Self::new(ElementFamily::Lagrange, cell_type, degree)
    }

    /// Discontinuous Lagrange element of `degree`.
    pub fn discontinuous_lagrange(
        cell_type: CellType,
        degree: usize,
    ) -> Result<Self, MeshBlocksError> {
        Self::new(ElementFamily::DiscontinuousLagrange, cell_type, degree)
    }

    /// Resolve an element from a short label such as `"p1"`, `"lagrange_p2"`,
    /// `"cg3"`, `"dg0"` or `"discontinuous_lagrange_p1"`.
    pub fn from_label(label: &str, cell_type: CellType) -> Result<Self, MeshBlocksError> {
        let normalized = label.to_lowercase();
        let (family, digits) = if let Some(rest) = normalized
            .strip_prefix("discontinuous_lagrange_p")
            .or_else(|| normalized.strip_prefix("dg"))
        {
            (ElementFamily::DiscontinuousLagrange, rest)
        } else if let Some(rest) = normalized
            .strip_prefix("lagrange_p")
            .or_else(|| normalized.strip_prefix("cg"))
            .or_else(|| normalized.strip_prefix('p'))
            .or_else(|| normalized.strip_prefix('q'))
        {
            (ElementFamily::Lagrange, rest)
        } else {
            return Err(MeshBlocksError::UnsupportedElement(format!(
                "unknown element label '{label}'"
            )));
        };
        if normalized.starts_with('q') && cell_type.is_simplex() {
            return Err(MeshBlocksError::UnsupportedElement(format!(
                "tensor-product label '{label}' on {} cells",
                cell_type.as_str()
            )));
        }
        let degree = digits.parse::<usize>().map_err(|_| {
            MeshBlocksError::UnsupportedElement(format!("no degree in element label '{label}'"))
        })?;
        Self::new(family, cell_type, degree)
    }

    /// Element family.
    pub fn family(&self) -> ElementFamily {
        self.family
    }

    /// Cell type the element is defined on.
    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Dofs attached to each entity of dimension `dim`.
    pub fn entity_dofs(&self, dim: usize) -> usize {
        let tdim = self.cell_type.dimension();
        match self.family {
            ElementFamily::DiscontinuousLagrange => {
                if dim == tdim {
                    full_count(self.cell_type, self.degree)
                } else {
                    0
                }
            }
            ElementFamily::Lagrange => self
                .cell_type
                .sub_entity_type(dim)
                .map_or(0, |shape| interior_count(shape, self.degree)),
        }
    }

    /// Total dofs on one cell.
    pub fn space_dimension(&self) -> usize {
        (0..=self.cell_type.dimension())
            .map(|dim| sub_entity_count(self.cell_type, dim) * self.entity_dofs(dim))
            .sum()
    }

    /// Stable textual identity, e.g. `Lagrange(triangle, 2)`.
    pub fn signature(&self) -> String {
        self.to_string()
    }

    /// Coordinates of the dofs carried by `entity` (of dimension `dim`).
    ///
    /// A single dof sits at the entity midpoint. Several dofs on a segment
    /// are spread evenly along it, from its lower-id vertex to its higher-id
    /// vertex: interior points for Lagrange, endpoints included for
    /// discontinuous Lagrange. Several dofs on higher-dimensional entities
    /// all report the entity midpoint.
    pub fn entity_dof_coordinates(
        &self,
        mesh: &Mesh,
        entity: PointId,
        dim: usize,
    ) -> Result<Vec<Vec<f64>>, MeshBlocksError> {
        let n = self.entity_dofs(dim);
        if n == 0 {
            return Ok(Vec::new());
        }
        let vertices = mesh.vertices(entity)?;
        if n == 1 || vertices.len() != 2 {
            let mid = mesh.midpoint(entity)?;
            return Ok(vec![mid; n]);
        }
        let a = mesh.coordinates(vertices[0])?;
        let b = mesh.coordinates(vertices[1])?;
        let (shift, denom) = match self.family {
            ElementFamily::Lagrange => (1.0, (n + 1) as f64),
            ElementFamily::DiscontinuousLagrange => (0.0, (n - 1) as f64),
        };
        Ok((0..n)
            .map(|j| {
                let t = (j as f64 + shift) / denom;
                a.iter().zip(b).map(|(xa, xb)| xa + t * (xb - xa)).collect()
            })
            .collect())
    }
}

impl fmt::Display for FiniteElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match self.family {
            ElementFamily::Lagrange => "Lagrange",
            ElementFamily::DiscontinuousLagrange => "DiscontinuousLagrange",
        };
        write!(f, "{family}({}, {})", self.cell_type.as_str(), self.degree)
    }
}

/// Dofs strictly inside one entity of `shape` for continuous Lagrange of degree `k`.
fn interior_count(shape: CellType, k: usize) -> usize {
    let m = k.saturating_sub(1);
    match shape {
        CellType::Vertex => 1,
        CellType::Segment => m,
        CellType::Triangle => m * m.saturating_sub(1) / 2,
        CellType::Quadrilateral => m * m,
        CellType::Tetrahedron => m * m.saturating_sub(1) * m.saturating_sub(2) / 6,
        CellType::Hexahedron => m * m * m,
    }
}

/// Dimension of the full polynomial space on `shape` (P_k or Q_k).
fn full_count(shape: CellType, k: usize) -> usize {
    match shape {
        CellType::Vertex => 1,
        CellType::Segment => k + 1,
        CellType::Triangle => (k + 1) * (k + 2) / 2,
        CellType::Quadrilateral => (k + 1) * (k + 1),
        CellType::Tetrahedron => (k + 1) * (k + 2) * (k + 3) / 6,
        CellType::Hexahedron => (k + 1) * (k + 1) * (k + 1),
    }
}

/// Sub-entities of dimension `dim` in one cell of `shape`.
fn sub_entity_count(shape: CellType, dim: usize) -> usize {
    let table: &[usize] = match shape {
        CellType::Vertex => &[1],
        CellType::Segment => &[2, 1],
        CellType::Triangle => &[3, 3, 1],
        CellType::Quadrilateral => &[4, 4, 1],
        CellType::Tetrahedron => &[4, 6, 4, 1],
        CellType::Hexahedron => &[8, 12, 6, 1],
    };
    table.get(dim).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lagrange_layouts_match_polynomial_dimensions() {
        for (cell, k, expected) in [
            (CellType::Segment, 1, 2),
            (CellType::Segment, 3, 4),
            (CellType::Triangle, 1, 3),
            (CellType::Triangle, 2, 6),
            (CellType::Triangle, 3, 10),
            (CellType::Quadrilateral, 2, 9),
            (CellType::Tetrahedron, 2, 10),
            (CellType::Tetrahedron, 4, 35),
            (CellType::Hexahedron, 2, 27),
        ] {
            let e = FiniteElement::lagrange(cell, k).unwrap();
            assert_eq!(e.space_dimension(), expected, "{e}");
        }
    }

    #[test]
    fn discontinuous_dofs_live_on_cells_only() {
        let e = FiniteElement::discontinuous_lagrange(CellType::Triangle, 1).unwrap();
        assert_eq!(e.entity_dofs(0), 0);
        assert_eq!(e.entity_dofs(2), 3);
        assert_eq!(e.space_dimension(), 3);
        let dg0 = FiniteElement::discontinuous_lagrange(CellType::Segment, 0).unwrap();
        assert_eq!(dg0.entity_dofs(1), 1);
    }

    #[test]
    fn labels_resolve_to_families() {
        let p2 = FiniteElement::from_label("lagrange_p2", CellType::Triangle).unwrap();
        assert_eq!(p2, FiniteElement::lagrange(CellType::Triangle, 2).unwrap());
        let dg1 = FiniteElement::from_label("DG1", CellType::Segment).unwrap();
        assert_eq!(dg1.family(), ElementFamily::DiscontinuousLagrange);
        assert_eq!(
            FiniteElement::from_label("q1", CellType::Quadrilateral)
                .unwrap()
                .signature(),
            "Lagrange(quadrilateral, 1)"
        );
        assert!(FiniteElement::from_label("nedelec1", CellType::Triangle).is_err());
        assert!(FiniteElement::from_label("p0", CellType::Triangle).is_err());
        assert!(FiniteElement::from_label("q1", CellType::Triangle).is_err());
    }
}
