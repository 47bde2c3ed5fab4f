//! Comparison of two feature clouds through the overlap of their PCA ellipsoids.
//!
//! Each cloud is summarized by the ellipsoid whose semi-axes span three standard deviations
//! along its principal components. The similarity of two clouds is the volume of the overlap
//! of their ellipsoids, relative to the volume of their union.
//!
//! # Examples
//!
//! ```rust
//! use nalgebra::Point3;
//! use rusty_spinal::comparator::Comparator;
//!
//! let cloud: Vec<Point3<f64>> = (0..27)
//!     .map(|i| Point3::new((i % 3) as f64, ((i / 3) % 3) as f64, (i / 9) as f64))
//!     .collect();
//! let shifted: Vec<Point3<f64>> = cloud.iter().map(|p| p + nalgebra::Vector3::new(100.0, 0.0, 0.0)).collect();
//!
//! let comparator = Comparator::new(24);
//! assert_eq!(comparator.compare(&cloud, &shifted).unwrap().similarity, 0.0);
//! ```
use log::{debug, info};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::SpinalError;
use crate::{AXIS_SCALE, SURFACE_RESOLUTION};

pub mod ellipsoid;
pub mod hull;
pub mod pca;

use ellipsoid::Ellipsoid;
use hull::convex_hull_volume;
use pca::Pca;

/// The outcome of the comparison of two clouds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// The overlap volume relative to the union volume, in `[0, 1]` up to the surface sampling.
    pub similarity: f64,
    /// The volume of the overlap.
    pub overlap_volume: f64,
    /// The volumes of both ellipsoids.
    pub volumes: [f64; 2],
    /// The number of surface points of either ellipsoid lying inside the other one.
    pub num_contained: usize,
    pub ellipsoids: [Ellipsoid; 2],
}

/// Compares point clouds through their PCA ellipsoids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparator {
    /// The number of angular samples (per angle) of the ellipsoid surfaces.
    resolution: usize,
    /// The number of standard deviations spanned by each semi-axis.
    scale: f64,
}

impl Default for Comparator {
    fn default() -> Self {
        Comparator::new(SURFACE_RESOLUTION)
    }
}

impl Comparator {
    /// Create a comparator sampling the ellipsoid surfaces on `resolution x resolution` grids.
    pub fn new(resolution: usize) -> Comparator {
        Comparator {
            resolution,
            scale: AXIS_SCALE,
        }
    }

    /// The PCA ellipsoid of a cloud.
    pub fn ellipsoid(&self, cloud: &[Point3<f64>]) -> Result<Ellipsoid, SpinalError> {
        let pca = Pca::fit(cloud)?;
        Ellipsoid::from_pca(&pca, self.scale)
    }

    /// Compare two clouds.
    /// Returns an error if either cloud has less than two points or spans less than three dimensions.
    pub fn compare(
        &self,
        cloud_1: &[Point3<f64>],
        cloud_2: &[Point3<f64>],
    ) -> Result<Comparison, SpinalError> {
        let ellipsoid_1 = self.ellipsoid(cloud_1)?;
        let ellipsoid_2 = self.ellipsoid(cloud_2)?;
        let volumes = [ellipsoid_1.volume(), ellipsoid_2.volume()];
        debug!("V: {} and {}", volumes[0], volumes[1]);

        let contained = ellipsoid_1
            .surface_points(self.resolution)
            .into_iter()
            .filter(|p| ellipsoid_2.contains(p))
            .chain(
                ellipsoid_2
                    .surface_points(self.resolution)
                    .into_iter()
                    .filter(|p| ellipsoid_1.contains(p)),
            )
            .collect::<Vec<Point3<f64>>>();

        let (overlap_volume, similarity) = if contained.is_empty() {
            info!("No intersection: 0 similarity");
            (0.0, 0.0)
        } else {
            let overlap_volume = convex_hull_volume(&contained);
            let similarity = overlap_volume / (volumes[0] + volumes[1] - overlap_volume);
            info!("PCA similarity: {}", similarity);
            (overlap_volume, similarity)
        };

        Ok(Comparison {
            similarity,
            overlap_volume,
            volumes,
            num_contained: contained.len(),
            ellipsoids: [ellipsoid_1, ellipsoid_2],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Normal};

    fn gaussian_cloud(seed: u64, mean: Vector3<f64>, std: Vector3<f64>) -> Vec<Point3<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..500)
            .map(|_| {
                Point3::from(
                    mean + std.component_mul(&Vector3::from_fn(|_, _| normal.sample(&mut rng))),
                )
            })
            .collect()
    }

    #[test]
    fn test_identical_clouds() {
        let cloud = gaussian_cloud(1, Vector3::new(10.0, 500.0, 4.0), Vector3::new(1.0, 50.0, 2.0));
        let comparison = Comparator::new(60).compare(&cloud, &cloud).unwrap();
        assert_relative_eq!(comparison.volumes[0], comparison.volumes[1]);
        assert_eq!(comparison.num_contained, 2 * 60 * 60);
        assert!(comparison.overlap_volume <= comparison.volumes[0]);
        assert!(comparison.similarity > 0.98, "{:?}", comparison.similarity);
        assert!(comparison.similarity <= 1.0);
    }

    #[test]
    fn test_disjoint_clouds() {
        let std = Vector3::new(1.0, 1.0, 1.0);
        let cloud_1 = gaussian_cloud(1, Vector3::zeros(), std);
        let cloud_2 = gaussian_cloud(2, Vector3::new(20.0, 0.0, 0.0), std);
        let comparison = Comparator::new(30).compare(&cloud_1, &cloud_2).unwrap();
        assert_eq!(comparison.similarity, 0.0);
        assert_eq!(comparison.overlap_volume, 0.0);
        assert_eq!(comparison.num_contained, 0);
    }

    #[test]
    fn test_partial_overlap() {
        let std = Vector3::new(1.0, 1.0, 1.0);
        let cloud_1 = gaussian_cloud(1, Vector3::zeros(), std);
        let cloud_2 = gaussian_cloud(2, Vector3::new(3.0, 0.0, 0.0), std);
        let comparator = Comparator::new(60);

        let partial = comparator.compare(&cloud_1, &cloud_2).unwrap().similarity;
        let identical = comparator.compare(&cloud_1, &cloud_1).unwrap().similarity;
        assert!(partial > 0.0);
        assert!(partial < identical);
        // Symmetric
        let reversed = comparator.compare(&cloud_2, &cloud_1).unwrap().similarity;
        assert_relative_eq!(partial, reversed, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_clouds() {
        let comparator = Comparator::default();
        let cloud = gaussian_cloud(1, Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0));
        assert!(matches!(
            comparator.compare(&cloud, &[Point3::origin()]),
            Err(SpinalError::EmptyInput(_))
        ));
        let flat: Vec<Point3<f64>> = cloud.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect();
        assert!(matches!(
            comparator.compare(&flat, &cloud),
            Err(SpinalError::SingularMatrix(_))
        ));
    }
}
