//! Volume of the convex hull of 3D points, computed incrementally (quickhull).
use std::collections::HashMap;

use log::trace;
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

/// Distances below this fraction of the extent of the points are considered as zero.
const RELATIVE_EPSILON: f64 = 1e-9;
/// Variances below this fraction of the largest one mark a flat set of points.
const FLATNESS_TOLERANCE: f64 = 1e-14;

/// A triangular face of the hull, oriented outwards.
#[derive(Debug, Clone)]
struct Face {
    vertices: [usize; 3],
    normal: Vector3<f64>,
    offset: f64,
    /// The points above the face not yet on the hull.
    outside: Vec<usize>,
    alive: bool,
}

impl Face {
    fn new(points: &[Point3<f64>], vertices: [usize; 3]) -> Self {
        let [a, b, c] = vertices.map(|i| points[i]);
        let normal = (b - a).cross(&(c - a)).normalize();
        Face {
            vertices,
            normal,
            offset: normal.dot(&a.coords),
            outside: vec![],
            alive: true,
        }
    }

    /// The signed distance of a point to the plane of the face, positive outwards.
    fn distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.offset
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }
}

struct Hull<'a> {
    points: &'a [Point3<f64>],
    faces: Vec<Face>,
    /// The face on the left of each directed edge.
    edges: HashMap<(usize, usize), usize>,
    epsilon: f64,
    /// A point strictly inside the hull.
    centroid: Point3<f64>,
}

impl<'a> Hull<'a> {
    fn add_face(&mut self, face: Face) -> usize {
        let id = self.faces.len();
        for edge in face.edges() {
            self.edges.insert(edge, id);
        }
        self.faces.push(face);
        id
    }

    /// Assign each point to the first face it lies above, if any.
    fn assign(&mut self, candidates: impl Iterator<Item = usize>, faces: &[usize]) {
        for i in candidates {
            if let Some(&face_id) = faces
                .iter()
                .find(|&&f| self.faces[f].distance(&self.points[i]) > self.epsilon)
            {
                self.faces[face_id].outside.push(i);
            }
        }
    }

    /// Add the farthest outside point of a face to the hull.
    fn expand(&mut self, face_id: usize) -> Vec<usize> {
        let face = &self.faces[face_id];
        let apex = match face
            .outside
            .iter()
            .copied()
            .max_by(|&i, &j| face.distance(&self.points[i]).total_cmp(&face.distance(&self.points[j])))
        {
            Some(apex) => apex,
            None => return vec![],
        };
        let apex_point = self.points[apex];

        // Faces visible from the apex form a connected region, bounded by the horizon
        let mut visible = vec![face_id];
        let mut seen = vec![face_id];
        let mut horizon = vec![];
        let mut k = 0;
        while k < visible.len() {
            for (a, b) in self.faces[visible[k]].edges() {
                let Some(&neighbor) = self.edges.get(&(b, a)) else {
                    continue;
                };
                if seen.contains(&neighbor) {
                    continue;
                }
                if self.faces[neighbor].distance(&apex_point) > self.epsilon {
                    seen.push(neighbor);
                    visible.push(neighbor);
                } else {
                    horizon.push((a, b));
                }
            }
            k += 1;
        }

        let mut orphans = vec![];
        for &v in visible.iter() {
            let face = &mut self.faces[v];
            face.alive = false;
            orphans.extend(face.outside.drain(..).filter(|&i| i != apex));
            for edge in face.edges() {
                if self.edges.get(&edge) == Some(&v) {
                    self.edges.remove(&edge);
                }
            }
        }

        let new_faces = horizon
            .into_iter()
            .map(|(a, b)| {
                let face = Face::new(self.points, [a, b, apex]);
                self.add_face(face)
            })
            .collect::<Vec<usize>>();
        self.assign(orphans.into_iter(), &new_faces);
        new_faces
            .into_iter()
            .filter(|&f| !self.faces[f].outside.is_empty())
            .collect()
    }

    fn live_faces(&self) -> impl Iterator<Item = &Face> + '_ {
        self.faces.iter().filter(|face| face.alive)
    }

    /// The sum of the volumes of the tetrahedra joining the centroid to every face.
    fn volume(&self) -> f64 {
        self.live_faces()
            .map(|face| {
                let [a, b, c] = face.vertices.map(|i| self.points[i] - self.centroid);
                a.dot(&b.cross(&c)).abs() / 6.0
            })
            .sum()
    }
}

/// Returns the index of the point maximizing the given score, with its score.
fn argmax<F: Fn(&Point3<f64>) -> f64>(points: &[Point3<f64>], score: F) -> (usize, f64) {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, score(p)))
        .fold((0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best })
}

/// Map the points to unit variance along their principal axes.
/// Returns the mapped points and the factor scaling their volumes back, or `None` if the points are flat.
fn whiten(points: &[Point3<f64>]) -> Option<(Vec<Point3<f64>>, f64)> {
    let n = points.len() as f64;
    let mean = points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n;
    let covariance = points
        .iter()
        .map(|p| {
            let d = p.coords - mean;
            d * d.transpose()
        })
        .sum::<Matrix3<f64>>()
        / n;

    let eigen = SymmetricEigen::new(covariance);
    let largest = eigen.eigenvalues.max();
    if !(largest > 0.0) || eigen.eigenvalues.min() <= FLATNESS_TOLERANCE * largest {
        return None;
    }
    let deviations = eigen.eigenvalues.map(f64::sqrt);
    let transform =
        Matrix3::from_diagonal(&deviations.map(|d| 1.0 / d)) * eigen.eigenvectors.transpose();
    let whitened = points
        .iter()
        .map(|p| Point3::from(transform * (p.coords - mean)))
        .collect();
    Some((whitened, deviations.product()))
}

/// Build the convex hull of the points, or `None` if they do not span three dimensions.
fn quickhull(points: &[Point3<f64>]) -> Option<Hull<'_>> {
    if points.len() < 4 {
        return None;
    }
    let (lower, upper) = points.iter().fold(
        (Vector3::repeat(f64::INFINITY), Vector3::repeat(f64::NEG_INFINITY)),
        |(lo, hi), p| (lo.inf(&p.coords), hi.sup(&p.coords)),
    );
    let extent = (upper - lower).max();
    if !(extent > 0.0) {
        return None;
    }
    let epsilon = RELATIVE_EPSILON * extent;

    // Initial tetrahedron
    let (i0, _) = argmax(points, |p| -p.x);
    let p0 = points[i0];
    let (i1, d1) = argmax(points, |p| (p - p0).norm());
    let axis = (points[i1] - p0) / d1.max(f64::MIN_POSITIVE);
    let (i2, d2) = argmax(points, |p| axis.cross(&(p - p0)).norm());
    let plane = axis.cross(&(points[i2] - p0)).normalize();
    let (i3, d3) = argmax(points, |p| plane.dot(&(p - p0)).abs());
    if d1 <= epsilon || d2 <= epsilon || d3 <= epsilon {
        return None;
    }
    let simplex = [i0, i1, i2, i3];
    let centroid = Point3::from(simplex.iter().map(|&i| points[i].coords).sum::<Vector3<f64>>() / 4.0);

    let mut hull = Hull {
        points,
        faces: vec![],
        edges: HashMap::new(),
        epsilon,
        centroid,
    };
    for [a, b, c] in [[i0, i1, i2], [i0, i1, i3], [i0, i2, i3], [i1, i2, i3]] {
        let face = Face::new(points, [a, b, c]);
        let face = if face.distance(&centroid) > 0.0 {
            Face::new(points, [a, c, b])
        } else {
            face
        };
        hull.add_face(face);
    }
    hull.assign(
        (0..points.len()).filter(|i| !simplex.contains(i)),
        &[0, 1, 2, 3],
    );

    let mut pending = (0..4)
        .filter(|&f| !hull.faces[f].outside.is_empty())
        .collect::<Vec<usize>>();
    while let Some(face_id) = pending.pop() {
        if hull.faces[face_id].alive {
            pending.extend(hull.expand(face_id));
        }
    }
    Some(hull)
}

/// Returns the volume of the convex hull of the points.
/// The volume is zero if the points do not span three dimensions.
///
/// The hull is built on the whitened points, so that elongated clouds are as well conditioned as round ones.
pub fn convex_hull_volume(points: &[Point3<f64>]) -> f64 {
    if points.len() < 4 {
        return 0.0;
    }
    let Some((whitened, scale)) = whiten(points) else {
        trace!("Flat hull of {} points", points.len());
        return 0.0;
    };
    match quickhull(&whitened) {
        Some(hull) => hull.volume() * scale,
        None => {
            trace!("Degenerate hull of {} points", points.len());
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use nalgebra::Rotation3;
    use rand_chacha::ChaCha8Rng;
    use std::f64::consts::PI;

    fn cube(side: f64) -> Vec<Point3<f64>> {
        (0..8)
            .map(|i| {
                Point3::new(
                    side * (i & 1) as f64,
                    side * ((i >> 1) & 1) as f64,
                    side * ((i >> 2) & 1) as f64,
                )
            })
            .collect()
    }

    #[test]
    fn test_unit_cube() {
        assert_relative_eq!(convex_hull_volume(&cube(1.0)), 1.0, epsilon = 1e-12);
        assert_relative_eq!(convex_hull_volume(&cube(2.0)), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_interior_points_are_ignored() {
        let mut points = cube(1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..500 {
            points.push(Point3::new(rng.gen(), rng.gen(), rng.gen()));
        }
        // Duplicates and points on the faces
        points.extend(cube(1.0));
        points.push(Point3::new(0.5, 0.5, 1.0));
        points.push(Point3::new(0.0, 0.5, 0.5));
        assert_relative_eq!(convex_hull_volume(&points), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tetrahedron() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        assert_relative_eq!(convex_hull_volume(&points), 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sphere() {
        // Points on a sphere: the hull volume approaches the ball volume
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let points: Vec<Point3<f64>> = (0..4000)
            .map(|_| {
                let z: f64 = rng.gen_range(-1.0..1.0);
                let theta: f64 = rng.gen_range(0.0..2.0 * PI);
                let r = (1.0 - z * z).sqrt();
                Point3::new(r * theta.cos(), r * theta.sin(), z)
            })
            .collect();
        let volume = convex_hull_volume(&points);
        let ball = 4.0 / 3.0 * PI;
        assert!(volume < ball);
        assert!(volume > 0.97 * ball, "{} vs {}", volume, ball);
    }

    /// Points on the surface of an ellipsoid of the given radii, rotated off the axes.
    fn ellipsoid_surface(radii: [f64; 3], resolution: usize) -> Vec<Point3<f64>> {
        let rotation = Rotation3::from_euler_angles(0.3, -0.2, 0.5);
        let center = Vector3::new(500.0, -20.0, 3.0);
        let step = |end: f64, i: usize| end * i as f64 / (resolution - 1) as f64;
        (0..resolution)
            .flat_map(|i| (0..resolution).map(move |j| (step(2.0 * PI, i), step(PI, j))))
            .map(|(theta, phi)| {
                let local = Vector3::new(
                    radii[0] * theta.cos() * phi.sin(),
                    radii[1] * theta.sin() * phi.sin(),
                    radii[2] * phi.cos(),
                );
                Point3::from(rotation * local + center)
            })
            .collect()
    }

    #[test]
    fn test_elongated_ellipsoid() {
        let radii = [3000.0, 3.0, 0.3];
        let points = ellipsoid_surface(radii, 200);
        let ellipsoid = 4.0 / 3.0 * PI * radii.iter().product::<f64>();

        let volume = convex_hull_volume(&points);
        assert!(volume <= ellipsoid * (1.0 + 1e-9), "{} vs {}", volume, ellipsoid);
        assert!(volume > 0.99 * ellipsoid, "{} vs {}", volume, ellipsoid);

        // Every point lies below every face, and every face is oriented outwards
        let (whitened, _) = whiten(&points).unwrap();
        let hull = quickhull(&whitened).unwrap();
        for face in hull.live_faces() {
            assert!(face.distance(&hull.centroid) < 0.0);
            let highest = whitened
                .iter()
                .map(|p| face.distance(p))
                .fold(f64::NEG_INFINITY, f64::max);
            assert!(highest < 1e-6, "point {} above a face", highest);
        }
    }

    #[test]
    fn test_affine_invariance() {
        // Stretching the points stretches the volume by the same factor
        let points = ellipsoid_surface([1.0, 1.0, 1.0], 60);
        let stretched: Vec<Point3<f64>> = points
            .iter()
            .map(|p| Point3::new(1000.0 * p.x, p.y, 0.01 * p.z))
            .collect();
        assert_relative_eq!(
            convex_hull_volume(&stretched),
            10.0 * convex_hull_volume(&points),
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_degenerate() {
        assert_eq!(convex_hull_volume(&cube(1.0)[..3]), 0.0);
        let coplanar: Vec<Point3<f64>> = (0..20)
            .map(|i| Point3::new((i % 5) as f64, (i / 5) as f64, 2.0))
            .collect();
        assert_eq!(convex_hull_volume(&coplanar), 0.0);
        let collinear: Vec<Point3<f64>> = (0..20).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        assert_eq!(convex_hull_volume(&collinear), 0.0);
        assert_eq!(convex_hull_volume(&vec![Point3::new(1.0, 1.0, 1.0); 10]), 0.0);
    }
}
