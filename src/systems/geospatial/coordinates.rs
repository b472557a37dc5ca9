use cgmath::{EuclideanSpace, Matrix3, Point3, Rad};

pub struct CoordinatesSystem {}

impl CoordinatesSystem {
    /// Maps a geographic coordinate onto a sphere centred at the origin.
    ///
    /// The polar axis is +Y. Longitude 0 on the equator lands on +X and
    /// longitude increases towards -Z, which keeps the scene right-handed
    /// with north up. The globe mesh, the marker and the camera rig all go
    /// through here so they agree on where a place is.
    pub fn project(lat: f64, lon: f64, radius: f64) -> Point3<f64> {
        let phi = (90.0 - lat).to_radians();
        let theta = (360.0 - lon).to_radians();

        let x = radius * phi.sin() * theta.cos();
        let y = radius * phi.cos();
        let z = radius * phi.sin() * theta.sin();

        Point3::new(x, y, z)
    }

    /// Rotation of the globe about its polar axis.
    pub fn spin_matrix(spin: Rad<f64>) -> Matrix3<f64> {
        Matrix3::from_angle_y(spin)
    }

    /// Projects a coordinate and carries it along with the globe's current spin.
    pub fn project_spun(lat: f64, lon: f64, radius: f64, spin: Rad<f64>) -> Point3<f64> {
        let local = CoordinatesSystem::project(lat, lon, radius);
        Point3::from_vec(CoordinatesSystem::spin_matrix(spin) * local.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cgmath::{InnerSpace, MetricSpace};

    const EPS: f64 = 1e-9;

    fn assert_point_eq(a: Point3<f64>, b: Point3<f64>) {
        assert_abs_diff_eq!(a.x, b.x, epsilon = EPS);
        assert_abs_diff_eq!(a.y, b.y, epsilon = EPS);
        assert_abs_diff_eq!(a.z, b.z, epsilon = EPS);
    }

    #[test]
    fn larger_radius_stays_on_the_same_ray() {
        for &(lat, lon) in &[
            (35.681, 139.767),
            (-33.857, 151.215),
            (48.858, 2.294),
            (0.0, -180.0),
            (-89.5, 12.0),
        ] {
            let surface = CoordinatesSystem::project(lat, lon, 2.0);
            let camera = CoordinatesSystem::project(lat, lon, 4.5);
            let scale = camera.to_vec().magnitude() / surface.to_vec().magnitude();
            assert_abs_diff_eq!(scale, 2.25, epsilon = EPS);
            assert_point_eq(camera, Point3::from_vec(surface.to_vec() * scale));
            assert!(surface.to_vec().dot(camera.to_vec()) > 0.0);
        }
    }

    #[test]
    fn points_lie_on_the_requested_radius() {
        let p = CoordinatesSystem::project(-12.3, 77.7, 3.0);
        assert_abs_diff_eq!(p.to_vec().magnitude(), 3.0, epsilon = EPS);
    }

    #[test]
    fn poles_ignore_longitude() {
        let north = CoordinatesSystem::project(90.0, 0.0, 2.0);
        let south = CoordinatesSystem::project(-90.0, 0.0, 2.0);
        assert_point_eq(north, Point3::new(0.0, 2.0, 0.0));
        assert_point_eq(south, Point3::new(0.0, -2.0, 0.0));
        for lon in [-180.0, -97.5, 0.0, 45.0, 179.9] {
            assert_point_eq(CoordinatesSystem::project(90.0, lon, 2.0), north);
            assert_point_eq(CoordinatesSystem::project(-90.0, lon, 2.0), south);
        }
    }

    #[test]
    fn reference_meridian_and_equator() {
        assert_point_eq(
            CoordinatesSystem::project(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 0.0),
        );
        assert_point_eq(
            CoordinatesSystem::project(0.0, 90.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        );
        // the antimeridian is reached from both sides
        assert_point_eq(
            CoordinatesSystem::project(0.0, 180.0, 1.0),
            CoordinatesSystem::project(0.0, -180.0, 1.0),
        );
    }

    #[test]
    fn small_steps_move_the_point_a_little() {
        let a = CoordinatesSystem::project(35.0, 139.0, 2.0);
        let b = CoordinatesSystem::project(35.001, 139.001, 2.0);
        assert!(a.distance(b) < 1e-4);
    }

    #[test]
    fn spin_turns_about_the_polar_axis() {
        let spun = CoordinatesSystem::project_spun(0.0, 0.0, 1.0, Rad(std::f64::consts::FRAC_PI_2));
        assert_point_eq(spun, Point3::new(0.0, 0.0, -1.0));
        let pole = CoordinatesSystem::project_spun(90.0, 0.0, 1.0, Rad(1.234));
        assert_point_eq(pole, Point3::new(0.0, 1.0, 0.0));
    }
}
