use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

use mesh_blocks::algs::communicator::NoComm;
use mesh_blocks::algs::meshgen::{MeshGenOptions, rectangle_mesh};
use mesh_blocks::block::BlockDofMap;
use mesh_blocks::discretization::{DofMap, FiniteElement};
use mesh_blocks::topology::cell_type::CellType;
use mesh_blocks::topology::restriction::MeshRestriction;

fn bench_block_dofmap(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_dofmap");

    for &n in &[16usize, 32] {
        let mesh = rectangle_mesh(
            n,
            n,
            [0.0, 0.0],
            [1.0, 1.0],
            &MeshGenOptions::default(),
            Arc::new(NoComm),
        )
        .expect("mesh");
        let q2 = FiniteElement::lagrange(CellType::Quadrilateral, 2).expect("element");
        let q1 = FiniteElement::lagrange(CellType::Quadrilateral, 1).expect("element");
        let dofmaps = vec![
            Arc::new(DofMap::build(&mesh, &q2).expect("dofmap")),
            Arc::new(DofMap::build(&mesh, &q1).expect("dofmap")),
        ];
        let half = mesh.cells().len() / 2;
        let restriction =
            MeshRestriction::from_cells(&mesh, mesh.cells()[..half].iter().copied()).expect("restriction");

        group.bench_with_input(BenchmarkId::new("unrestricted", n), &n, |b, _| {
            b.iter(|| BlockDofMap::build(black_box(&mesh), &dofmaps, &[None, None]).expect("build"))
        });
        group.bench_with_input(BenchmarkId::new("restricted", n), &n, |b, _| {
            b.iter(|| {
                BlockDofMap::build(black_box(&mesh), &dofmaps, &[None, Some(restriction.clone())])
                    .expect("build")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_block_dofmap);
criterion_main!(benches);
