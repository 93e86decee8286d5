//! Randomized checks for corner ordering and homographies

use docscan_core::geometry::{encloses, find_homography, order_corners, project, Point, Rect};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Quad with one corner jittered inside each image quadrant
fn random_quad(rng: &mut StdRng) -> [Point; 4] {
    let mut corner = |x: f64, y: f64| Point::new(x + rng.gen_range(-40.0..40.0), y + rng.gen_range(-40.0..40.0));
    [
        corner(100.0, 100.0),
        corner(500.0, 100.0),
        corner(500.0, 400.0),
        corner(100.0, 400.0),
    ]
}

#[test]
fn test_order_corners_ignores_input_order() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..500 {
        let quad = random_quad(&mut rng);
        let mut shuffled = quad;
        shuffled.shuffle(&mut rng);

        let ordered = order_corners(&shuffled);
        assert_eq!(ordered, quad, "shuffled {:?}", shuffled);
        assert_eq!(order_corners(&ordered), ordered);
    }
}

#[test]
fn test_homography_round_trips_corners() {
    let mut rng = StdRng::seed_from_u64(11);
    let target = [
        Point::new(0.0, 0.0),
        Point::new(400.0, 0.0),
        Point::new(400.0, 300.0),
        Point::new(0.0, 300.0),
    ];

    for _ in 0..200 {
        let quad = random_quad(&mut rng);
        let h = find_homography(&quad, &target).expect("non-degenerate quad");
        let back = find_homography(&target, &quad).expect("non-degenerate target");

        for (src, dst) in quad.iter().zip(target.iter()) {
            let p = project(&h, src).unwrap();
            assert!(p.distance(dst) < 1e-6, "{:?} -> {:?}", src, p);

            let q = project(&back, &p).unwrap();
            assert!(q.distance(src) < 1e-6);
        }
    }
}

#[test]
fn test_enclosing_survives_outward_growth() {
    let mut rng = StdRng::seed_from_u64(23);
    // Inside every quad random_quad can produce
    let hot = Rect::new(200, 150, 400, 300);

    for _ in 0..500 {
        let quad = random_quad(&mut rng);
        assert!(encloses(&quad, &hot), "{:?}", quad);

        let mut grow = || (rng.gen_range(0.0..80.0), rng.gen_range(0.0..80.0));
        let [tl, tr, br, bl] = quad;
        let ((a, b), (c, d), (e, f), (g, h)) = (grow(), grow(), grow(), grow());
        let grown = [
            Point::new(tl.x - a, tl.y - b),
            Point::new(tr.x + c, tr.y - d),
            Point::new(br.x + e, br.y + f),
            Point::new(bl.x - g, bl.y + h),
        ];
        assert!(encloses(&grown, &hot), "{:?} grown to {:?}", quad, grown);
    }
}
