//! Principal component analysis of 3D point clouds.
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

use crate::error::SpinalError;

/// The relative variance below which a direction is considered as missing.
const SINGULAR_TOLERANCE: f64 = 1e-14;

/// The principal components of a 3D point cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    /// The mean of the cloud.
    pub mean: Point3<f64>,
    /// The explained variances, in decreasing order.
    pub variances: Vector3<f64>,
    /// The unit principal components, one per row, in the same order as the variances.
    pub components: Matrix3<f64>,
}

impl Pca {
    /// Fit the principal components of the points.
    /// The covariance is normalized by `n - 1`.
    /// Returns an error if there are less than two points or if the points span less than three dimensions.
    pub fn fit(points: &[Point3<f64>]) -> Result<Pca, SpinalError> {
        if points.len() < 2 {
            return Err(SpinalError::EmptyInput(format!(
                "At least 2 points are required to fit a PCA, got {}",
                points.len()
            )));
        }
        let n = points.len() as f64;
        let mean = Point3::from(points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n);
        let covariance = points
            .iter()
            .map(|p| {
                let d = p - mean;
                d * d.transpose()
            })
            .sum::<Matrix3<f64>>()
            / (n - 1.0);

        let eigen = SymmetricEigen::new(covariance);
        let mut order = [0, 1, 2];
        order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));

        let variances = Vector3::from_fn(|i, _| eigen.eigenvalues[order[i]]);
        if !(variances[2] > SINGULAR_TOLERANCE * variances[0]) {
            return Err(SpinalError::SingularMatrix(format!(
                "The points span less than three dimensions (variances {:?})",
                variances.as_slice()
            )));
        }
        let components = Matrix3::from_fn(|i, j| eigen.eigenvectors[(j, order[i])]);

        Ok(Pca {
            mean,
            variances,
            components,
        })
    }

    /// The semi-axes spanning `scale` standard deviations along each component, one per row.
    pub fn semi_axes(&self, scale: f64) -> Matrix3<f64> {
        Matrix3::from_fn(|i, j| scale * self.variances[i].sqrt() * self.components[(i, j)])
    }

    /// The tips of the semi-axes and of their opposites, around the mean.
    pub fn axis_points(&self, scale: f64) -> Vec<Point3<f64>> {
        let semi_axes = self.semi_axes(scale);
        let tips = semi_axes.row_iter().map(|row| row.transpose()).collect::<Vec<Vector3<f64>>>();
        tips.iter()
            .map(|tip| self.mean + tip)
            .chain(tips.iter().map(|tip| self.mean - tip))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn test_fit_axis_aligned() {
        // Standard deviations 3, 2 and 1 along z, x and y
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let points: Vec<Point3<f64>> = (0..5000)
            .map(|_| {
                Point3::new(
                    2.0 * normal.sample(&mut rng) + 1.0,
                    normal.sample(&mut rng) - 1.0,
                    3.0 * normal.sample(&mut rng) + 5.0,
                )
            })
            .collect();
        let pca = Pca::fit(&points).unwrap();

        assert_relative_eq!(pca.mean, Point3::new(1.0, -1.0, 5.0), epsilon = 0.15);
        assert_relative_eq!(pca.variances[0], 9.0, max_relative = 0.1);
        assert_relative_eq!(pca.variances[1], 4.0, max_relative = 0.1);
        assert_relative_eq!(pca.variances[2], 1.0, max_relative = 0.1);
        assert_relative_eq!(pca.components[(0, 2)].abs(), 1.0, epsilon = 0.05);
        assert_relative_eq!(pca.components[(1, 0)].abs(), 1.0, epsilon = 0.05);
        assert_relative_eq!(pca.components[(2, 1)].abs(), 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_sample_covariance() {
        // The eight corners of a cube of side 2: variance 8 / 7 along each axis
        let points: Vec<Point3<f64>> = (0..8)
            .map(|i| {
                Point3::new(
                    if i & 1 == 0 { -1.0 } else { 1.0 },
                    if i & 2 == 0 { -1.0 } else { 1.0 },
                    if i & 4 == 0 { -1.0 } else { 1.0 },
                )
            })
            .collect();
        let pca = Pca::fit(&points).unwrap();
        assert_relative_eq!(pca.mean, Point3::origin());
        assert_relative_eq!(pca.variances, Vector3::repeat(8.0 / 7.0), epsilon = 1e-12);
        // The components are orthonormal
        assert_relative_eq!(
            pca.components * pca.components.transpose(),
            Matrix3::identity(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_axis_points() {
        let points: Vec<Point3<f64>> = (0..8)
            .map(|i| {
                Point3::new(
                    if i & 1 == 0 { -2.0 } else { 2.0 },
                    if i & 2 == 0 { -1.0 } else { 1.0 },
                    0.5 * if i & 4 == 0 { -1.0 } else { 1.0 } + 10.0,
                )
            })
            .collect();
        let pca = Pca::fit(&points).unwrap();
        let axis_points = pca.axis_points(3.0);
        assert_eq!(axis_points.len(), 6);

        // The first semi-axis spans 3 standard deviations along x
        let expected = 3.0 * (4.0_f64 * 8.0 / 7.0).sqrt();
        assert_relative_eq!((axis_points[0] - pca.mean).norm(), expected, epsilon = 1e-9);
        assert_relative_eq!((axis_points[3] - pca.mean).norm(), expected, epsilon = 1e-9);
        assert_relative_eq!(axis_points[0] + (axis_points[3] - pca.mean), pca.mean, epsilon = 1e-9);
    }

    #[test]
    fn test_fit_ill_conditioned() {
        // Corners of a box of sides 2000, 2 and 0.02: variance ratio of 1e-10
        let points: Vec<Point3<f64>> = (0..8)
            .map(|i| {
                Point3::new(
                    if i & 1 == 0 { -1000.0 } else { 1000.0 },
                    if i & 2 == 0 { -1.0 } else { 1.0 },
                    if i & 4 == 0 { -0.01 } else { 0.01 },
                )
            })
            .collect();
        let pca = Pca::fit(&points).unwrap();
        assert_relative_eq!(pca.variances[0], 1e6 * 8.0 / 7.0, max_relative = 1e-9);
        assert_relative_eq!(pca.variances[2], 1e-4 * 8.0 / 7.0, max_relative = 1e-6);

        let ellipsoid = crate::comparator::ellipsoid::Ellipsoid::from_pca(&pca, 3.0).unwrap();
        let expected = 27.0 * (pca.variances[0] * pca.variances[1] * pca.variances[2]).sqrt();
        assert_relative_eq!(ellipsoid.radii.product(), expected, max_relative = 1e-6);
    }

    #[test]
    fn test_fit_errors() {
        assert!(matches!(
            Pca::fit(&[Point3::origin()]),
            Err(SpinalError::EmptyInput(_))
        ));
        // Coplanar points
        let points: Vec<Point3<f64>> = (0..10)
            .map(|i| Point3::new(i as f64, (i * i) as f64, 0.0))
            .collect();
        assert!(matches!(
            Pca::fit(&points),
            Err(SpinalError::SingularMatrix(_))
        ));
    }
}
