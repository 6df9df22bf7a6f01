use approx::assert_relative_eq;
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use strided_cpu::{
    compact, ewise_add, ewise_setitem, from_tiled, matmul, matmul_tiled, reduce_axis, reduce_max,
    reduce_sum, scalar_ge, scalar_mul, scalar_setitem, to_tiled, AlignedBuffer, IndexWalker,
    ReduceOp, StridedView, StridedViewMut, TILE,
};

fn random_buffer(rng: &mut StdRng, len: usize) -> AlignedBuffer {
    let mut buf = AlignedBuffer::new(len).unwrap();
    for x in buf.iter_mut() {
        *x = rng.gen_range(-1.0..1.0);
    }
    buf
}

fn make_matrix(rows: usize, cols: usize) -> AlignedBuffer {
    let data: Vec<f32> = (0..rows * cols).map(|i| i as f32).collect();
    AlignedBuffer::from_slice(&data).unwrap()
}

#[test]
fn test_walker_coverage_2x3() {
    let mut walker = IndexWalker::new(&[2, 3]);
    let mut seen = vec![];
    while walker.next().is_some() {
        seen.push(walker.current().to_vec());
    }
    assert_eq!(
        seen,
        vec![
            vec![0, 0],
            vec![0, 1],
            vec![0, 2],
            vec![1, 0],
            vec![1, 1],
            vec![1, 2],
        ]
    );
}

#[test]
fn test_elementwise_examples() {
    let a = AlignedBuffer::from_slice(&[1.0, 2.0, 3.0]).unwrap();
    let b = AlignedBuffer::from_slice(&[4.0, 5.0, 6.0]).unwrap();
    let mut out = AlignedBuffer::new(3).unwrap();

    ewise_add(&a, &b, &mut out).unwrap();
    assert_eq!(out.as_slice(), &[5.0, 7.0, 9.0]);
    scalar_mul(&a, 2.0, &mut out).unwrap();
    assert_eq!(out.as_slice(), &[2.0, 4.0, 6.0]);
    scalar_ge(&a, 2.0, &mut out).unwrap();
    assert_eq!(out.as_slice(), &[0.0, 1.0, 1.0]);
}

#[test]
fn test_compact_idempotent_on_compact_view() {
    let a = make_matrix(5, 7);
    let view = StridedView::compact(&a, &[5, 7]).unwrap();
    let out = compact(&view).unwrap();
    assert_eq!(out.as_slice(), a.as_slice());
}

#[test]
fn test_compact_transposed_matches_get() {
    let a = make_matrix(8, 5);
    let view = StridedView::compact(&a, &[8, 5]).unwrap();
    let t = view.permute(&[1, 0]).unwrap();
    let out = compact(&t).unwrap();

    for i in 0..5 {
        for j in 0..8 {
            assert_eq!(out[i * 8 + j], view.get(&[j, i]));
        }
    }
}

#[test]
fn test_setitem_into_submatrix() {
    // Write a 2x2 block into rows 1..3, cols 2..4 of a 4x5 matrix.
    let mut a = AlignedBuffer::new(20).unwrap();
    {
        let mut block = StridedViewMut::new(&mut a, &[2, 2], &[5, 1], 7).unwrap();
        ewise_setitem(&[1.0, 2.0, 3.0, 4.0], &mut block).unwrap();
    }
    assert_eq!(a[7], 1.0);
    assert_eq!(a[8], 2.0);
    assert_eq!(a[12], 3.0);
    assert_eq!(a[13], 4.0);
    assert_eq!(a.iter().filter(|&&x| x != 0.0).count(), 4);

    {
        // Fill the diagonal with -1.
        let mut diag = StridedViewMut::new(&mut a, &[4], &[6], 0).unwrap();
        scalar_setitem(4, -1.0, &mut diag).unwrap();
    }
    for i in 0..4 {
        assert_eq!(a[i * 6], -1.0);
    }
}

#[test]
fn test_naive_matmul_example() {
    let a = AlignedBuffer::from_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    let b = AlignedBuffer::from_slice(&[5.0, 6.0, 7.0, 8.0]).unwrap();
    let mut out = AlignedBuffer::new(4).unwrap();
    matmul(&a, &b, &mut out, 2, 2, 2).unwrap();
    assert_eq!(out.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
}

#[test]
fn test_tiled_matches_naive_random() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..6 {
        let m = TILE * rng.gen_range(1..=4);
        let n = TILE * rng.gen_range(1..=6);
        let p = TILE * rng.gen_range(1..=4);
        let a = random_buffer(&mut rng, m * n);
        let b = random_buffer(&mut rng, n * p);

        let mut expected = AlignedBuffer::new(m * p).unwrap();
        matmul(&a, &b, &mut expected, m, n, p).unwrap();

        let ta = to_tiled::<TILE>(&a, m, n).unwrap();
        let tb = to_tiled::<TILE>(&b, n, p).unwrap();
        let mut tout = AlignedBuffer::new(m * p).unwrap();
        matmul_tiled::<TILE>(&ta, &tb, &mut tout, m, n, p).unwrap();

        let mut out = AlignedBuffer::new(m * p).unwrap();
        from_tiled::<TILE>(&tout, &mut out, m, p).unwrap();

        for (&got, &want) in out.iter().zip(expected.iter()) {
            assert_relative_eq!(got, want, epsilon = 1e-5, max_relative = 1e-5);
        }
    }
}

#[test]
fn test_tiled_single_reduction_block_is_exact() {
    let mut rng = StdRng::seed_from_u64(7);
    let (m, n, p) = (2 * TILE, TILE, 3 * TILE);
    let a = random_buffer(&mut rng, m * n);
    let b = random_buffer(&mut rng, n * p);

    let mut expected = AlignedBuffer::new(m * p).unwrap();
    matmul(&a, &b, &mut expected, m, n, p).unwrap();

    let ta = to_tiled::<TILE>(&a, m, n).unwrap();
    let tb = to_tiled::<TILE>(&b, n, p).unwrap();
    let mut tout = AlignedBuffer::new(m * p).unwrap();
    matmul_tiled::<TILE>(&ta, &tb, &mut tout, m, n, p).unwrap();
    let mut out = AlignedBuffer::new(m * p).unwrap();
    from_tiled::<TILE>(&tout, &mut out, m, p).unwrap();

    assert_eq!(out.as_slice(), expected.as_slice());
}

#[test]
fn test_reduction_examples() {
    let a = AlignedBuffer::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let mut out = AlignedBuffer::new(2).unwrap();
    reduce_sum(&a, &mut out, 3).unwrap();
    assert_eq!(out.as_slice(), &[6.0, 15.0]);
    reduce_max(&a, &mut out, 3).unwrap();
    assert_eq!(out.as_slice(), &[3.0, 6.0]);
}

#[test]
fn test_reduce_axis_on_transposed_view() {
    let a = make_matrix(3, 4);
    let view = StridedView::compact(&a, &[3, 4]).unwrap();
    let t = view.permute(&[1, 0]).unwrap(); // shape [4, 3]

    // Sum over the transposed rows = column sums of the original.
    let out = reduce_axis(&t, 1, ReduceOp::Sum).unwrap();
    for (j, &got) in out.iter().enumerate() {
        let want: f32 = (0..3).map(|i| a[i * 4 + j]).sum();
        assert_relative_eq!(got, want, epsilon = 1e-6);
    }
}

// ============================================================================
// Properties
// ============================================================================

/// Arbitrary in-bounds view: (buffer length, shape, strides, offset).
fn view_strategy() -> impl Strategy<Value = (usize, Vec<usize>, Vec<isize>, usize)> {
    prop::collection::vec((0usize..4, -3isize..=3), 0..4).prop_flat_map(|axes| {
        let shape: Vec<usize> = axes.iter().map(|&(d, _)| d).collect();
        let strides: Vec<isize> = axes.iter().map(|&(_, s)| s).collect();
        let below: usize = axes
            .iter()
            .map(|&(d, s)| if s < 0 && d > 0 { (-s) as usize * (d - 1) } else { 0 })
            .sum();
        let above: usize = axes
            .iter()
            .map(|&(d, s)| if s > 0 && d > 0 { s as usize * (d - 1) } else { 0 })
            .sum();
        (0usize..3, 0usize..3).prop_map(move |(pad_lo, pad_hi)| {
            let offset = below + pad_lo;
            let len = offset + above + 1 + pad_hi;
            (len, shape.clone(), strides.clone(), offset)
        })
    })
}

proptest! {
    #[test]
    fn prop_compact_setitem_roundtrip((len, shape, strides, offset) in view_strategy()) {
        let mut data: Vec<f32> = (0..len).map(|i| i as f32).collect();
        let original = data.clone();

        let packed = {
            let view = StridedView::new(&data, &shape, &strides, offset).unwrap();
            compact(&view).unwrap()
        };
        prop_assert_eq!(packed.len(), shape.iter().product::<usize>());

        let mut target = StridedViewMut::new(&mut data, &shape, &strides, offset).unwrap();
        ewise_setitem(&packed, &mut target).unwrap();
        prop_assert_eq!(data, original);
    }

    #[test]
    fn prop_walker_visits_each_index_once(shape in prop::collection::vec(0usize..4, 0..4)) {
        let mut walker = IndexWalker::new(&shape);
        let mut seen: Vec<Vec<usize>> = vec![];
        while walker.next().is_some() {
            seen.push(walker.current().to_vec());
        }
        prop_assert_eq!(seen.len(), shape.iter().product::<usize>());
        // Strictly increasing in lexicographic order means no repeats and row-major order.
        prop_assert!(seen.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(seen.iter().all(|idx| idx.iter().zip(&shape).all(|(&i, &d)| i < d)));
    }
}
