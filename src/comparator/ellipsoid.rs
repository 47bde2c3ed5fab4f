//! Ellipsoids in quadratic form, i.e., the points `x` such that `(x - c)^T A (x - c) <= 1`.
use std::f64::consts::PI;

use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::SpinalError;

use super::pca::Pca;

/// Points whose quadratic form exceeds 1 by less than this tolerance lie on the surface, hence inside.
pub const SURFACE_TOLERANCE: f64 = 1e-9;

/// Returns true if the point lies inside (or on) the ellipsoid of center `center` and matrix `a`.
pub fn contains(point: &Point3<f64>, center: &Point3<f64>, a: &Matrix3<f64>) -> bool {
    let d = point - center;
    d.dot(&(a * d)) <= 1.0 + SURFACE_TOLERANCE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub center: Point3<f64>,
    /// The semi-axis lengths.
    pub radii: Vector3<f64>,
    /// The orientation of the semi-axes, one per row.
    pub rotation: Matrix3<f64>,
    /// The matrix of the quadratic form.
    pub matrix_a: Matrix3<f64>,
}

impl Ellipsoid {
    /// Fit an ellipsoid to the points: its center is their mean and its matrix is
    /// the inverse of their (biased) covariance divided by the dimension.
    /// Returns an error if there is no point or if the covariance is singular.
    pub fn from_points(points: &[Point3<f64>]) -> Result<Ellipsoid, SpinalError> {
        if points.is_empty() {
            return Err(SpinalError::EmptyInput(
                "Cannot fit an ellipsoid without points".to_string(),
            ));
        }
        let n = points.len() as f64;
        let center = Point3::from(points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n);
        let second_moment = points
            .iter()
            .map(|p| p.coords * p.coords.transpose())
            .sum::<Matrix3<f64>>()
            / n;
        let covariance = second_moment - center.coords * center.coords.transpose();

        let matrix_a = covariance.try_inverse().ok_or_else(|| {
            SpinalError::SingularMatrix("The covariance of the points is not invertible".to_string())
        })? / 3.0;

        let svd = matrix_a.svd(true, true);
        let rotation = svd.v_t.ok_or_else(|| {
            SpinalError::SingularMatrix("The decomposition of the ellipsoid matrix failed".to_string())
        })?;
        let radii = svd.singular_values.map(|s| 1.0 / s.sqrt());

        Ok(Ellipsoid {
            center,
            radii,
            rotation,
            matrix_a,
        })
    }

    /// The ellipsoid whose semi-axes span `scale` standard deviations along each principal component.
    pub fn from_pca(pca: &Pca, scale: f64) -> Result<Ellipsoid, SpinalError> {
        Ellipsoid::from_points(&pca.axis_points(scale))
    }

    pub fn volume(&self) -> f64 {
        4.0 / 3.0 * PI * self.radii.product()
    }

    /// Returns true if the point lies inside (or on) the ellipsoid.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        contains(point, &self.center, &self.matrix_a)
    }

    /// Sample the surface on a `resolution x resolution` grid of spherical angles,
    /// with the polar angle in `[0, pi]` and the azimuth in `[0, 2 pi]`.
    pub fn surface_points(&self, resolution: usize) -> Vec<Point3<f64>> {
        let angles = |end: f64| -> Vec<f64> {
            match resolution {
                0 => vec![],
                1 => vec![0.0],
                _ => (0..resolution)
                    .map(|i| end * i as f64 / (resolution - 1) as f64)
                    .collect(),
            }
        };
        let phis = angles(PI);
        let thetas = angles(2.0 * PI);
        let to_world = self.rotation.transpose();

        let mut points = Vec::with_capacity(resolution * resolution);
        for theta in thetas.iter() {
            for phi in phis.iter() {
                let local = Vector3::new(
                    self.radii[0] * theta.cos() * phi.sin(),
                    self.radii[1] * theta.sin() * phi.sin(),
                    self.radii[2] * phi.cos(),
                );
                points.push(self.center + to_world * local);
            }
        }
        points
    }
}
