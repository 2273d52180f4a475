use crate::geometry::{Triangulator, make_clockwise, signed_area};
use crate::test_util::{assert_approx, assert_slice_approx};

#[test]
fn triangulator_splits_rectangle_into_two_triangles() {
    let mut triangulator = Triangulator::default();

    let polygon = vec![0.0, 0.0, 100.0, 0.0, 100.0, 100.0, 0.0, 100.0];
    let triangles = triangulator.triangulate(&polygon);
    assert_eq!(triangles, vec![3, 0, 1, 3, 1, 2]);

    let polys = triangulator.decompose(&polygon, &triangles);
    assert_eq!(polys.len(), 1);
    assert_slice_approx(&polys[0], &[0.0, 100.0, 0.0, 0.0, 100.0, 0.0, 100.0, 100.0]);
}

#[test]
fn triangulator_ignores_degenerate_input() {
    let mut triangulator = Triangulator::new();
    assert!(triangulator.triangulate(&[]).is_empty());
    assert!(triangulator.triangulate(&[0.0, 0.0, 1.0, 1.0]).is_empty());
    assert_eq!(triangulator.triangulate(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]).len(), 3);
}

#[test]
fn triangulator_handles_concave_polygon() {
    let mut triangulator = Triangulator::new();
    // An "L" shape: 6 vertices, one reflex corner. Clip polygons are triangulated clockwise.
    let mut polygon = vec![0.0, 0.0, 2.0, 0.0, 2.0, 1.0, 1.0, 1.0, 1.0, 2.0, 0.0, 2.0];
    make_clockwise(&mut polygon);
    let triangles = triangulator.triangulate(&polygon);
    assert_eq!(triangles.len(), 12);

    // The triangles tile the polygon: their areas sum to the polygon's area (3).
    let mut area = 0.0;
    for tri in triangles.chunks_exact(3) {
        let p = |i: u16| [polygon[i as usize * 2], polygon[i as usize * 2 + 1]];
        let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
        area += ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs() * 0.5;
    }
    assert_approx(area, 3.0);

    let polys = triangulator.decompose(&polygon, &triangles);
    assert!(polys.len() >= 2, "concave polygon must split: {polys:?}");
}

#[test]
fn make_clockwise_reverses_counter_clockwise_polygons_only() {
    let mut ccw = vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    assert!(signed_area(&ccw) > 0.0);
    make_clockwise(&mut ccw);
    assert!(signed_area(&ccw) < 0.0);
    assert_eq!(ccw, vec![0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);

    let mut cw = ccw.clone();
    make_clockwise(&mut cw);
    assert_eq!(cw, ccw);
}
