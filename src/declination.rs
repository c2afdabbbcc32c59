//! Geomagnetic declination and true-north correction
//!
//! The rotation sensor reports heading relative to magnetic north. To point
//! labels at real places the heading has to be rotated onto true north by the
//! local magnetic declination. Declination comes from a [`DeclinationModel`];
//! the crate ships [`MainField`], a synthesis of the International
//! Geomagnetic Reference Field through degree 13, and [`FixedDeclination`]
//! for callers that already know the value.

use tracing::trace;

use crate::math::normalize_degrees;
use crate::types::GeoPosition;

/// Mean radius of the geomagnetic reference sphere in meters.
const REFERENCE_RADIUS_M: f64 = 6_371_200.0;

/// WGS84 semi-major axis in meters.
const WGS84_A: f64 = 6_378_137.0;

/// WGS84 semi-minor axis in meters.
const WGS84_B: f64 = 6_356_752.314_245;

/// Epoch of the reference coefficients, as a decimal year.
const MODEL_EPOCH: f64 = 2020.0;

/// Years the secular variation is trusted for on either side of the epoch.
const MAX_EXTRAPOLATION_YEARS: f64 = 10.0;

const MILLIS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0 * 1000.0;

/// Highest spherical-harmonic degree carried by [`MainField`].
pub const MAX_DEGREE: usize = 13;

/// One Gauss coefficient pair with its secular variation.
struct Coefficient {
    n: usize,
    m: usize,
    g: f64,
    h: f64,
    g_rate: f64,
    h_rate: f64,
}

const fn coefficient(n: usize, m: usize, g: f64, h: f64, g_rate: f64, h_rate: f64) -> Coefficient {
    Coefficient {
        n,
        m,
        g,
        h,
        g_rate,
        h_rate,
    }
}

/// IGRF-13 main-field coefficients at 2020.0 (nT) and their 2020-2025
/// secular variation (nT/yr). Secular variation is only defined up to
/// degree 8.
const IGRF_2020: [Coefficient; 104] = [
    coefficient(1, 0, -29_404.8, 0.0, 5.7, 0.0),
    coefficient(1, 1, -1_450.9, 4_652.5, 7.4, -25.9),
    coefficient(2, 0, -2_499.6, 0.0, -11.0, 0.0),
    coefficient(2, 1, 2_982.0, -2_991.6, -7.0, -30.2),
    coefficient(2, 2, 1_677.0, -734.6, -2.1, -22.4),
    coefficient(3, 0, 1_363.2, 0.0, 2.2, 0.0),
    coefficient(3, 1, -2_381.2, -82.1, -5.9, 6.0),
    coefficient(3, 2, 1_236.2, 241.9, 3.1, -1.1),
    coefficient(3, 3, 525.7, -543.4, -12.0, 0.5),
    coefficient(4, 0, 903.0, 0.0, -1.2, 0.0),
    coefficient(4, 1, 809.5, 281.9, -1.6, -0.1),
    coefficient(4, 2, 86.3, -158.4, -5.9, 6.5),
    coefficient(4, 3, -309.4, 199.7, 5.2, 3.6),
    coefficient(4, 4, 48.0, -349.7, -5.1, -5.0),
    coefficient(5, 0, -234.3, 0.0, -0.3, 0.0),
    coefficient(5, 1, 363.2, 47.7, 0.5, 0.0),
    coefficient(5, 2, 187.8, 208.3, -0.6, 2.5),
    coefficient(5, 3, -140.7, -121.2, 0.2, -0.6),
    coefficient(5, 4, -151.2, 32.3, 1.3, 3.0),
    coefficient(5, 5, 13.5, 98.9, 0.9, 0.3),
    coefficient(6, 0, 66.0, 0.0, -0.5, 0.0),
    coefficient(6, 1, 65.5, -19.1, -0.3, 0.0),
    coefficient(6, 2, 72.9, 25.1, 0.4, -1.6),
    coefficient(6, 3, -121.5, 52.8, 1.3, -1.3),
    coefficient(6, 4, -36.2, -64.5, -1.4, 0.8),
    coefficient(6, 5, 13.5, 8.9, 0.0, 0.0),
    coefficient(6, 6, -64.7, 68.1, 0.9, 1.0),
    coefficient(7, 0, 80.6, 0.0, -0.1, 0.0),
    coefficient(7, 1, -76.7, -51.5, -0.2, 0.6),
    coefficient(7, 2, -8.2, -16.9, 0.0, 0.6),
    coefficient(7, 3, 56.5, 2.2, 0.7, -0.8),
    coefficient(7, 4, 15.8, 23.5, 0.1, -0.2),
    coefficient(7, 5, 6.4, -2.2, -0.5, -1.1),
    coefficient(7, 6, -7.2, -27.2, -0.8, 0.1),
    coefficient(7, 7, 9.8, -1.8, 0.8, 0.3),
    coefficient(8, 0, 23.7, 0.0, 0.0, 0.0),
    coefficient(8, 1, 9.7, 8.4, 0.1, -0.2),
    coefficient(8, 2, -17.6, -15.3, -0.1, 0.6),
    coefficient(8, 3, -0.5, 12.8, 0.4, -0.2),
    coefficient(8, 4, -21.1, -11.7, -0.1, 0.5),
    coefficient(8, 5, 15.3, 14.9, 0.4, -0.3),
    coefficient(8, 6, 13.7, 3.6, 0.3, -0.4),
    coefficient(8, 7, -16.5, -6.9, -0.1, 0.5),
    coefficient(8, 8, -0.3, 2.8, 0.4, 0.0),
    coefficient(9, 0, 5.4, 0.0, 0.0, 0.0),
    coefficient(9, 1, 8.8, -21.6, 0.0, 0.0),
    coefficient(9, 2, 3.1, 10.8, 0.0, 0.0),
    coefficient(9, 3, -3.3, 11.8, 0.0, 0.0),
    coefficient(9, 4, 0.7, -6.8, 0.0, 0.0),
    coefficient(9, 5, -13.3, -6.9, 0.0, 0.0),
    coefficient(9, 6, -0.1, 7.8, 0.0, 0.0),
    coefficient(9, 7, 8.7, 1.0, 0.0, 0.0),
    coefficient(9, 8, -9.1, -4.0, 0.0, 0.0),
    coefficient(9, 9, -10.5, 8.4, 0.0, 0.0),
    coefficient(10, 0, -1.9, 0.0, 0.0, 0.0),
    coefficient(10, 1, -6.3, 3.2, 0.0, 0.0),
    coefficient(10, 2, 0.1, -0.4, 0.0, 0.0),
    coefficient(10, 3, 0.5, 4.6, 0.0, 0.0),
    coefficient(10, 4, -0.5, 4.4, 0.0, 0.0),
    coefficient(10, 5, 1.8, -7.9, 0.0, 0.0),
    coefficient(10, 6, -0.7, -0.6, 0.0, 0.0),
    coefficient(10, 7, 2.1, -4.2, 0.0, 0.0),
    coefficient(10, 8, 2.4, -2.8, 0.0, 0.0),
    coefficient(10, 9, -1.8, -1.2, 0.0, 0.0),
    coefficient(10, 10, -3.6, -8.7, 0.0, 0.0),
    coefficient(11, 0, 3.1, 0.0, 0.0, 0.0),
    coefficient(11, 1, -1.5, -0.1, 0.0, 0.0),
    coefficient(11, 2, -2.3, 2.0, 0.0, 0.0),
    coefficient(11, 3, 2.0, -0.7, 0.0, 0.0),
    coefficient(11, 4, -0.8, -1.1, 0.0, 0.0),
    coefficient(11, 5, 0.6, 0.8, 0.0, 0.0),
    coefficient(11, 6, -0.7, -0.2, 0.0, 0.0),
    coefficient(11, 7, 0.2, -2.2, 0.0, 0.0),
    coefficient(11, 8, 1.7, -1.4, 0.0, 0.0),
    coefficient(11, 9, -0.2, -2.5, 0.0, 0.0),
    coefficient(11, 10, 0.4, -2.0, 0.0, 0.0),
    coefficient(11, 11, 3.5, -2.4, 0.0, 0.0),
    coefficient(12, 0, -1.9, 0.0, 0.0, 0.0),
    coefficient(12, 1, -0.2, -1.1, 0.0, 0.0),
    coefficient(12, 2, 0.4, 0.4, 0.0, 0.0),
    coefficient(12, 3, 1.2, 1.9, 0.0, 0.0),
    coefficient(12, 4, -0.8, -2.2, 0.0, 0.0),
    coefficient(12, 5, 0.9, 0.3, 0.0, 0.0),
    coefficient(12, 6, 0.1, 0.7, 0.0, 0.0),
    coefficient(12, 7, 0.5, -0.1, 0.0, 0.0),
    coefficient(12, 8, -0.3, 0.3, 0.0, 0.0),
    coefficient(12, 9, -0.4, 0.2, 0.0, 0.0),
    coefficient(12, 10, 0.2, -0.9, 0.0, 0.0),
    coefficient(12, 11, -0.9, -0.1, 0.0, 0.0),
    coefficient(12, 12, 0.0, 0.7, 0.0, 0.0),
    coefficient(13, 0, 0.0, 0.0, 0.0, 0.0),
    coefficient(13, 1, -0.9, -0.9, 0.0, 0.0),
    coefficient(13, 2, 0.4, 0.4, 0.0, 0.0),
    coefficient(13, 3, 0.5, 1.6, 0.0, 0.0),
    coefficient(13, 4, -0.5, -0.5, 0.0, 0.0),
    coefficient(13, 5, 1.0, -1.2, 0.0, 0.0),
    coefficient(13, 6, -0.2, -0.1, 0.0, 0.0),
    coefficient(13, 7, 0.8, 0.4, 0.0, 0.0),
    coefficient(13, 8, -0.1, -0.1, 0.0, 0.0),
    coefficient(13, 9, 0.3, 0.4, 0.0, 0.0),
    coefficient(13, 10, 0.1, 0.5, 0.0, 0.0),
    coefficient(13, 11, 0.5, -0.5, 0.0, 0.0),
    coefficient(13, 12, -0.1, -0.1, 0.0, 0.0),
    coefficient(13, 13, -0.4, -0.4, 0.0, 0.0),
];

type Table = [[f64; MAX_DEGREE + 1]; MAX_DEGREE + 1];

/// Geomagnetic field at one place and time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeomagneticField {
    /// Angle of magnetic north east of true north, degrees.
    pub declination: f32,
    /// Dip of the field below horizontal, degrees.
    pub inclination: f32,
    /// Total field strength, nanotesla.
    pub field_strength: f32,
}

/// Source of magnetic declination for a position
///
/// Implement this to plug in a higher-order field model.
pub trait DeclinationModel: Send + Sync {
    /// Field at the position and time carried by `position`.
    fn field_at(&self, position: &GeoPosition) -> GeomagneticField;
}

/// Spherical-harmonic model of the main geomagnetic field
///
/// Synthesizes the IGRF-13 coefficients up to [`MAX_DEGREE`] with linear
/// secular variation. Positions are geodetic (WGS84) and are converted to
/// geocentric coordinates before synthesis; the field is rotated back into
/// the local geodetic frame. Lower truncations trade accuracy for speed. A
/// degree-1 model is the tilted dipole.
///
/// # Example
/// ```
/// use heads_up_compass::{DeclinationModel, GeoPosition, MainField};
///
/// // San Francisco, early 2024: about 13 degrees east.
/// let fix = GeoPosition::new(37.77, -122.42, 0.0, 1_704_067_200_000);
/// let field = MainField::default().field_at(&fix);
/// assert!((field.declination - 12.9).abs() < 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainField {
    degree: usize,
}

impl MainField {
    /// Model truncated at `degree`, clamped to `1..=MAX_DEGREE`.
    pub fn with_degree(degree: usize) -> Self {
        Self {
            degree: degree.clamp(1, MAX_DEGREE),
        }
    }

    /// Tilted-dipole approximation.
    pub fn dipole() -> Self {
        Self::with_degree(1)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Years since the model epoch, clamped to the trusted window.
    fn years_from_epoch(timestamp_millis: i64) -> f64 {
        let year = 1970.0 + timestamp_millis as f64 / MILLIS_PER_YEAR;
        (year - MODEL_EPOCH).clamp(-MAX_EXTRAPOLATION_YEARS, MAX_EXTRAPOLATION_YEARS)
    }

    /// Geocentric radius (m) and latitude (rad) of a geodetic position.
    fn geocentric(latitude: f64, altitude: f64) -> (f64, f64) {
        let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
        let rho = (WGS84_A * cos_lat).hypot(WGS84_B * sin_lat);
        let z = sin_lat * (altitude + WGS84_B * WGS84_B / rho);
        let x = cos_lat * (altitude + WGS84_A * WGS84_A / rho);
        (x.hypot(z), z.atan2(x))
    }

    /// Schmidt semi-normalized Legendre functions and their colatitude
    /// derivatives.
    fn legendre(&self, sin_theta: f64, cos_theta: f64) -> (Table, Table) {
        let mut p = [[0.0; MAX_DEGREE + 1]; MAX_DEGREE + 1];
        let mut dp = [[0.0; MAX_DEGREE + 1]; MAX_DEGREE + 1];
        p[0][0] = 1.0;

        // Gauss-normalized recursion.
        for n in 1..=self.degree {
            for m in 0..=n {
                if n == m {
                    p[n][n] = sin_theta * p[n - 1][n - 1];
                    dp[n][n] = sin_theta * dp[n - 1][n - 1] + cos_theta * p[n - 1][n - 1];
                } else if n == 1 {
                    p[1][0] = cos_theta;
                    dp[1][0] = -sin_theta;
                } else {
                    let k = ((n - 1) * (n - 1) - m * m) as f64
                        / ((2 * n - 1) * (2 * n - 3)) as f64;
                    p[n][m] = cos_theta * p[n - 1][m] - k * p[n - 2][m];
                    dp[n][m] = cos_theta * dp[n - 1][m] - sin_theta * p[n - 1][m] - k * dp[n - 2][m];
                }
            }
        }

        // Gauss to Schmidt normalization.
        let mut scale = [[0.0; MAX_DEGREE + 1]; MAX_DEGREE + 1];
        scale[0][0] = 1.0;
        for n in 1..=self.degree {
            scale[n][0] = scale[n - 1][0] * (2 * n - 1) as f64 / n as f64;
            for m in 1..=n {
                let doubled = if m == 1 { 2.0 } else { 1.0 };
                scale[n][m] =
                    scale[n][m - 1] * ((n - m + 1) as f64 * doubled / (n + m) as f64).sqrt();
            }
        }
        for n in 1..=self.degree {
            for m in 0..=n {
                p[n][m] *= scale[n][m];
                dp[n][m] *= scale[n][m];
            }
        }

        (p, dp)
    }
}

impl Default for MainField {
    fn default() -> Self {
        Self::with_degree(MAX_DEGREE)
    }
}

impl DeclinationModel for MainField {
    fn field_at(&self, position: &GeoPosition) -> GeomagneticField {
        let dt = Self::years_from_epoch(position.timestamp_millis);

        let (radius, geocentric_latitude) = Self::geocentric(position.latitude, position.altitude);
        let colatitude = std::f64::consts::FRAC_PI_2 - geocentric_latitude;
        let longitude = position.longitude.to_radians();

        let (sin_theta, cos_theta) = colatitude.sin_cos();
        // P(n, m) for m > 0 carries a factor of sin(theta); keep the east
        // component finite at the geographic poles.
        let safe_sin_theta = sin_theta.abs().max(1e-10);
        let (p, dp) = self.legendre(sin_theta, cos_theta);

        // North, east and down components of B = -grad V.
        let mut north = 0.0;
        let mut east = 0.0;
        let mut down = 0.0;
        for c in IGRF_2020.iter().filter(|c| c.n <= self.degree) {
            let (n, m) = (c.n, c.m);
            let g = c.g + c.g_rate * dt;
            let h = c.h + c.h_rate * dt;
            let ratio = (REFERENCE_RADIUS_M / radius).powi(n as i32 + 2);
            let (sin_m_phi, cos_m_phi) = (m as f64 * longitude).sin_cos();
            let term = g * cos_m_phi + h * sin_m_phi;

            north += ratio * term * dp[n][m];
            east += ratio * m as f64 * (g * sin_m_phi - h * cos_m_phi) * p[n][m] / safe_sin_theta;
            down -= ratio * (n + 1) as f64 * term * p[n][m];
        }

        // Rotate from the geocentric frame into the geodetic one.
        let (sin_psi, cos_psi) = (position.latitude.to_radians() - geocentric_latitude).sin_cos();
        let (north, down) = (
            north * cos_psi + down * sin_psi,
            down * cos_psi - north * sin_psi,
        );

        let horizontal = north.hypot(east);
        let field = GeomagneticField {
            declination: east.atan2(north).to_degrees() as f32,
            inclination: down.atan2(horizontal).to_degrees() as f32,
            field_strength: horizontal.hypot(down) as f32,
        };

        trace!(
            latitude = position.latitude,
            longitude = position.longitude,
            degree = self.degree,
            declination = field.declination,
            "computed main field"
        );
        field
    }
}

/// Constant declination, for fixed installations and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDeclination(pub f32);

impl DeclinationModel for FixedDeclination {
    fn field_at(&self, _position: &GeoPosition) -> GeomagneticField {
        GeomagneticField {
            declination: self.0,
            inclination: 0.0,
            field_strength: 0.0,
        }
    }
}

/// True-north heading from a magnetic heading
///
/// `true = normalize(normalize(magnetic + declination) - arm_offset)`
///
/// # Example
/// ```
/// use heads_up_compass::true_heading;
///
/// assert_eq!(true_heading(350.0, 12.5, 6.0), 356.5);
/// assert_eq!(true_heading(3.0, -10.0, 6.0), 347.0);
/// ```
pub fn true_heading(magnetic_heading: f32, declination: f32, arm_offset: f32) -> f32 {
    normalize_degrees(normalize_degrees(magnetic_heading + declination) - arm_offset)
}

/// Caches the declination for the most recent position
///
/// The field is recomputed only when the position changes; without a position
/// the correction contributes nothing.
pub struct GeomagneticCorrector {
    model: Box<dyn DeclinationModel>,
    field: Option<GeomagneticField>,
}

impl GeomagneticCorrector {
    pub fn new(model: Box<dyn DeclinationModel>) -> Self {
        Self { model, field: None }
    }

    /// Recomputes the cached field for a new position.
    pub fn update(&mut self, position: &GeoPosition) -> GeomagneticField {
        let field = self.model.field_at(position);
        self.field = Some(field);
        field
    }

    /// Cached field, if a position has been seen.
    pub fn field(&self) -> Option<GeomagneticField> {
        self.field
    }

    /// Declination in degrees, zero when no position is known.
    pub fn declination(&self) -> f32 {
        self.field.map_or(0.0, |field| field.declination)
    }

    /// Corrects a magnetic heading onto true north and removes the mounting
    /// offset.
    pub fn correct(&self, magnetic_heading: f32, arm_offset: f32) -> f32 {
        true_heading(magnetic_heading, self.declination(), arm_offset)
    }
}

impl Default for GeomagneticCorrector {
    fn default() -> Self {
        Self::new(Box::new(MainField::default()))
    }
}

impl std::fmt::Debug for GeomagneticCorrector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeomagneticCorrector")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}
