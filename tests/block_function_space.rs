use mesh_blocks::prelude::*;
use std::sync::Arc;

/// DG1 (10 dofs) and P1 (6 dofs) on a 5-cell interval.
fn spaces() -> (Arc<Mesh>, Arc<FunctionSpace>, Arc<FunctionSpace>) {
    let mesh = Arc::new(
        interval_mesh(5, [0.0, 1.0], &MeshGenOptions::default(), Arc::new(NoComm)).unwrap(),
    );
    let dg1 = FiniteElement::discontinuous_lagrange(CellType::Segment, 1).unwrap();
    let p1 = FiniteElement::lagrange(CellType::Segment, 1).unwrap();
    let u = Arc::new(FunctionSpace::new(mesh.clone(), Arc::new(dg1)).unwrap());
    let v = Arc::new(FunctionSpace::new(mesh.clone(), Arc::new(p1)).unwrap());
    (mesh, u, v)
}

fn close(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-12)
}

#[test]
fn two_unrestricted_blocks() {
    let (_, u, v) = spaces();
    assert_eq!((u.dim(), v.dim()), (10, 6));
    let w = BlockFunctionSpace::new(vec![u, v]).unwrap();
    assert_eq!(w.dim(), 16);
    assert_eq!(w.sub(0).unwrap().dim(), 10);
    assert_eq!(w.sub(1).unwrap().dim(), 6);
    assert_eq!(w[1].dim(), 6);
    assert_eq!(w.extract_block_sub_space(&[0], true).unwrap().dim(), 10);
    assert!(w.component().is_empty());
}

#[test]
fn restricted_block_keeps_four_of_six_dofs() {
    let (mesh, u, v) = spaces();
    let left = MeshRestriction::from_cells(&mesh, mesh.cells()[..3].iter().copied()).unwrap();
    let w = BlockFunctionSpace::with_restrictions(vec![u, v], vec![None, Some(left)]).unwrap();
    assert_eq!(w.dim(), 14);

    let map = w.block_dofmap();
    assert_eq!(map.num_local_dofs(), 14);
    let pairs: Vec<(usize, usize)> = (0..14).map(|k| map.block_to_original(k).unwrap()).collect();
    let block0: Vec<usize> = pairs.iter().filter(|p| p.0 == 0).map(|p| p.1).collect();
    let block1: Vec<usize> = pairs.iter().filter(|p| p.0 == 1).map(|p| p.1).collect();
    assert_eq!(block0, (0..10).collect::<Vec<_>>());
    assert_eq!(block1, vec![0, 1, 2, 3]);
    assert_eq!(map.block_owned_range(1).unwrap(), 10..14);
    assert!(map.block_ghosts(1).unwrap().is_empty());

    // The scalar view and the unrestricted extraction still see every dof.
    assert_eq!(w.sub(1).unwrap().dim(), 6);
    assert_eq!(w.extract_block_sub_space(&[1], true).unwrap().dim(), 4);
    assert_eq!(w.extract_block_sub_space(&[1], false).unwrap().dim(), 6);
}

#[test]
fn dof_coordinates_follow_block_order() {
    let (mesh, u, v) = spaces();
    let left = MeshRestriction::from_cells(&mesh, mesh.cells()[..1].iter().copied()).unwrap();
    let w = BlockFunctionSpace::with_restrictions(vec![v, u], vec![Some(left), None]).unwrap();
    let x = w.tabulate_dof_coordinates().unwrap();
    assert_eq!(x.len(), 2 + 10);
    assert!(close(&x[..2], &[0.0, 0.2]));
    // DG1 dofs sit on both ends of each cell.
    assert!(close(&x[2..6], &[0.0, 0.2, 0.2, 0.4]));
}

#[test]
fn equality_and_containment_follow_root_and_path() {
    let (_, u, v) = spaces();
    let w = BlockFunctionSpace::new(vec![u.clone(), v.clone()]).unwrap();
    let other = BlockFunctionSpace::new(vec![u, v]).unwrap();
    assert_ne!(w.root_space_id(), other.root_space_id());
    assert!(w != other);

    let w1 = w.extract_block_sub_space(&[1], true).unwrap();
    let w1_full = w.extract_block_sub_space(&[1], false).unwrap();
    assert_eq!(*w1, *w1_full);
    assert_eq!(w1.root_space_id(), w.root_space_id());
    assert!(w.contains(&w));
    assert!(w.contains(&w1));
    assert!(!w1.contains(&w));
    assert!(!other.contains(&w1));

    let w10 = w1.extract_block_sub_space(&[0], true).unwrap();
    assert_eq!(w10.component(), &[1, 0]);
    assert!(w1.contains(&w10));
    assert!(w.contains(&w10));
    assert_eq!(*w10, *w.extract_block_sub_space(&[1, 0], true).unwrap());
}

#[test]
fn construction_errors() {
    let (mesh, u, v) = spaces();
    assert_eq!(
        BlockFunctionSpace::new(Vec::new()).unwrap_err(),
        MeshBlocksError::EmptyBlockList
    );

    let (_, foreign, _) = spaces();
    assert!(matches!(
        BlockFunctionSpace::new(vec![u.clone(), foreign]),
        Err(MeshBlocksError::MeshMismatch { block: 1, .. })
    ));

    assert!(matches!(
        BlockFunctionSpace::with_restrictions(vec![u.clone(), v.clone()], vec![None]),
        Err(MeshBlocksError::LengthMismatch { what: "restrictions", expected: 2, found: 1 })
    ));

    let elements = vec![u.element().clone(), v.element().clone()];
    assert!(matches!(
        BlockFunctionSpace::from_parts(mesh.clone(), elements.clone(), vec![u.dofmap().clone()]),
        Err(MeshBlocksError::LengthMismatch { what: "dofmaps", .. })
    ));
    assert!(matches!(
        BlockFunctionSpace::from_parts(
            mesh.clone(),
            elements.clone(),
            vec![v.dofmap().clone(), u.dofmap().clone()]
        ),
        Err(MeshBlocksError::ElementMismatch { block: 0, .. })
    ));

    let bad = MeshRestriction::new(vec![EntityMarkers::new(3, std::iter::empty())]);
    assert!(matches!(
        BlockFunctionSpace::from_parts_with_restrictions(
            mesh.clone(),
            elements.clone(),
            vec![u.dofmap().clone(), v.dofmap().clone()],
            vec![None, Some(bad)]
        ),
        Err(MeshBlocksError::InvalidEntityDimension { dim: 3, tdim: 1 })
    ));

    let w = BlockFunctionSpace::from_parts(
        mesh,
        elements,
        vec![u.dofmap().clone(), v.dofmap().clone()],
    )
    .unwrap();
    assert_eq!(w.dim(), 16);
    assert!(matches!(
        w.sub(2),
        Err(MeshBlocksError::ComponentOutOfBounds { index: 2, len: 2 })
    ));
}

#[test]
fn concurrent_extraction_builds_one_instance() {
    let (_, u, v) = spaces();
    let w = BlockFunctionSpace::new(vec![u, v]).unwrap();
    let extracted: Vec<Arc<BlockFunctionSpace>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| w.extract_block_sub_space(&[1, 0], true).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(extracted.iter().all(|s| Arc::ptr_eq(s, &extracted[0])));
    assert_eq!(w.cached_sub_spaces(true), 2);
}

#[test]
fn any_policy_widens_the_restriction() {
    let (mesh, _, v) = spaces();
    let vertices = mesh.entities(0).unwrap();
    let first = EntityMarkers::new(0, vertices[..2].iter().copied());
    let last = EntityMarkers::new(0, vertices[4..].iter().copied());
    let all = MeshRestriction::new(vec![first.clone(), last.clone()]);
    let any = all.clone().with_policy(RestrictionPolicy::Any);

    let w_all = BlockFunctionSpace::with_restrictions(vec![v.clone()], vec![Some(all)]).unwrap();
    let w_any = BlockFunctionSpace::with_restrictions(vec![v], vec![Some(any)]).unwrap();
    assert_eq!(w_all.dim(), 0);
    assert_eq!(w_any.dim(), 4);
}

#[test]
fn quadrilateral_blocks_with_edge_dofs() {
    let mesh = Arc::new(
        rectangle_mesh(
            2,
            2,
            [0.0, 0.0],
            [1.0, 1.0],
            &MeshGenOptions::default(),
            Arc::new(NoComm),
        )
        .unwrap(),
    );
    let q2 = Arc::new(FiniteElement::from_label("q2", CellType::Quadrilateral).unwrap());
    let dg0 = Arc::new(FiniteElement::from_label("dg0", CellType::Quadrilateral).unwrap());
    let u = Arc::new(FunctionSpace::new(mesh.clone(), q2).unwrap());
    let p = Arc::new(FunctionSpace::new(mesh.clone(), dg0).unwrap());
    assert_eq!(u.dim(), 25);

    let corner = MeshRestriction::from_cells(&mesh, mesh.cells()[..1].iter().copied()).unwrap();
    let w = BlockFunctionSpace::with_restrictions(vec![u, p], vec![Some(corner), None]).unwrap();
    assert_eq!(w.dim(), 9 + 4);
    let cell = mesh.cells()[0];
    assert_eq!(w.block_dofmap().cell_dofs(0, cell).unwrap().len(), 9);
    assert!(w.block_dofmap().cell_dofs(0, mesh.cells()[3]).unwrap().len() < 9);
    assert_eq!(w.tabulate_dof_coordinates().unwrap().len(), 2 * 13);
}
