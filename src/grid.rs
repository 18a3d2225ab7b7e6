use std::f64::consts::FRAC_PI_4;

use crate::error::ParseError;
use crate::helpers::{read_as, GribInt};

/// Earth radius for shape-of-earth 6 (sphere), as used by HRRR.
const EARTH_RADIUS_M: f64 = 6_371_229.0;

/// Per-axis cap on grid dimensions. HRRR CONUS is 1799 x 1059.
const MAX_GRID_DIM: u32 = 30_000;

/// The only scanning mode the projection supports: +i eastward,
/// +j northward, row-major. Other modes would need a different origin
/// computation and are rejected rather than silently mis-gridded.
const SUPPORTED_SCAN_MODE: u8 = 0x40;

/// Lambert conformal conic grid parameters from GDT 3.30.
///
/// Angles are degrees; `lo1` and `lov` keep the 0..360 wire convention
/// and are normalised on use. Spacings are metres.
#[derive(Debug, Clone, PartialEq)]
pub struct LambertGrid {
    pub ni: usize,
    pub nj: usize,
    pub la1: f64,
    pub lo1: f64,
    pub lov: f64,
    pub latin1: f64,
    pub latin2: f64,
    pub dx: f64,
    pub dy: f64,
    pub scan_mode: u8,
}

impl LambertGrid {
    /// Decodes the HRRR flavour of GDT 3.30 from a full section 3 slice
    /// (header included).
    ///
    /// HRRR uses a compact layout: the standard basic-angle/subdivisions
    /// pair is absent and a LaD field sits between the resolution flags
    /// and LoV. Template offsets, relative to the template data that
    /// starts at byte 14 of the section:
    ///
    ///   0      shape of earth (6)
    ///   1..15  radius/major/minor (zero for shape 6)
    ///   16..23 Ni, Nj
    ///   24..31 La1, Lo1 (microdegrees; Lo1 in 0..360)
    ///   32     resolution flags
    ///   33..36 LaD (informational, skipped)
    ///   37..40 LoV (microdegrees, 0..360)
    ///   41..48 Dx, Dy (millimetres)
    ///   49     projection centre flag
    ///   50     scanning mode
    ///   51..58 Latin1, Latin2 (microdegrees)
    pub(crate) fn from_sect3(sec: &[u8]) -> Result<Self, ParseError> {
        if sec.len() < 14 + 67 {
            return Err(ParseError::SectionTooShort {
                section: 3,
                length: sec.len(),
            });
        }
        let template = read_as!(u16, sec, 12);
        if template != 30 {
            return Err(ParseError::UnsupportedGridTemplate(template));
        }
        let g = &sec[14..];

        let ni = read_as!(u32, g, 16);
        let nj = read_as!(u32, g, 20);
        if ni < 1 || ni > MAX_GRID_DIM {
            return Err(ParseError::LimitExceeded {
                field: "Ni",
                value: u64::from(ni),
                max: u64::from(MAX_GRID_DIM),
            });
        }
        if nj < 1 || nj > MAX_GRID_DIM {
            return Err(ParseError::LimitExceeded {
                field: "Nj",
                value: u64::from(nj),
                max: u64::from(MAX_GRID_DIM),
            });
        }

        let la1 = f64::from(read_as!(u32, g, 24).as_grib_int()) / 1e6;
        let lo1 = f64::from(read_as!(u32, g, 28)) / 1e6;
        let lov = f64::from(read_as!(u32, g, 37)) / 1e6;
        let dx = f64::from(read_as!(u32, g, 41)) / 1e3;
        let dy = f64::from(read_as!(u32, g, 45)) / 1e3;
        let scan_mode = g[50];
        let latin1 = f64::from(read_as!(u32, g, 51).as_grib_int()) / 1e6;
        let latin2 = f64::from(read_as!(u32, g, 55).as_grib_int()) / 1e6;

        if scan_mode != SUPPORTED_SCAN_MODE {
            return Err(ParseError::UnsupportedScanMode(scan_mode));
        }

        Ok(Self {
            ni: ni as usize,
            nj: nj as usize,
            la1,
            lo1,
            lov,
            latin1,
            latin2,
            dx,
            dy,
            scan_mode,
        })
    }

    /// Total grid point count, computed in 64 bits.
    pub fn num_points(&self) -> u64 {
        self.ni as u64 * self.nj as u64
    }

    /// Cone constant n.
    fn n(&self) -> f64 {
        if self.latin1 == self.latin2 {
            return self.latin1.to_radians().sin();
        }
        let phi1 = self.latin1.to_radians();
        let phi2 = self.latin2.to_radians();
        (phi1.cos() / phi2.cos()).ln()
            / ((FRAC_PI_4 + phi2 / 2.0).tan() / (FRAC_PI_4 + phi1 / 2.0).tan()).ln()
    }

    fn big_f(&self) -> f64 {
        let n = self.n();
        let phi1 = self.latin1.to_radians();
        phi1.cos() * (FRAC_PI_4 + phi1 / 2.0).tan().powf(n) / n
    }

    /// Cone distance (metres) from the pole for a given latitude.
    fn rho(&self, lat_deg: f64) -> f64 {
        EARTH_RADIUS_M * self.big_f() / (FRAC_PI_4 + lat_deg.to_radians() / 2.0).tan().powf(self.n())
    }

    /// Projected coordinates of the grid origin (La1, Lo1).
    /// x is east-positive; y = -rho*cos(theta) so y is north-positive.
    fn ref_xy(&self) -> (f64, f64) {
        let n = self.n();
        let rho0 = self.rho(self.la1);
        let theta0 = n * (normalize_lon(self.lo1) - normalize_lon(self.lov)).to_radians();
        (rho0 * theta0.sin(), -rho0 * theta0.cos())
    }

    /// Maps (lat degrees N, lon degrees E signed) to the nearest grid
    /// indices. i increases eastward, j northward (scan mode 0x40).
    pub fn latlon_to_ij(&self, lat: f64, lon: f64) -> (i64, i64) {
        let n = self.n();
        let rho = self.rho(lat);
        let theta = n * (normalize_lon(lon) - normalize_lon(self.lov)).to_radians();
        let x = rho * theta.sin();
        let y = -rho * theta.cos();

        let (x0, y0) = self.ref_xy();
        let i = ((x - x0) / self.dx).round();
        let j = ((y - y0) / self.dy).round();
        (i as i64, j as i64)
    }

    /// Maps grid indices to (lat degrees N, lon degrees E signed).
    pub fn ij_to_latlon(&self, i: i64, j: i64) -> (f64, f64) {
        let n = self.n();
        let big_f = self.big_f();
        let (x0, y0) = self.ref_xy();

        let x = x0 + i as f64 * self.dx;
        let y = y0 + j as f64 * self.dy;

        let rho = (x * x + y * y).sqrt();
        if rho == 0.0 {
            return (90.0, normalize_lon(self.lov));
        }
        // x = rho*sin(theta), -y = rho*cos(theta)
        let theta = x.atan2(-y);
        let phi = 2.0 * (EARTH_RADIUS_M * big_f / rho).powf(1.0 / n).atan() - std::f64::consts::FRAC_PI_2;
        (phi.to_degrees(), normalize_lon(self.lov) + theta.to_degrees() / n)
    }

    /// Nearest-neighbour value at (lat, lon) from a flat row-major slice
    /// (index = j*Ni + i). NaN when the point falls outside the grid.
    pub fn lookup(&self, lat: f64, lon: f64, vals: &[f64]) -> f64 {
        if !lat.is_finite() || !lon.is_finite() {
            return f64::NAN;
        }
        let (i, j) = self.latlon_to_ij(lat, lon);
        if i < 0 || i >= self.ni as i64 || j < 0 || j >= self.nj as i64 {
            return f64::NAN;
        }
        let idx = j as usize * self.ni + i as usize;
        vals.get(idx).copied().unwrap_or(f64::NAN)
    }
}

/// Converts a 0..360 longitude to the -180..+180 convention. Values in
/// (180, 360] map to value - 360; values already in (-180, 180] pass
/// through unchanged.
pub fn normalize_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Grid constants of the real HRRR CONUS domain.
    fn hrrr_grid() -> LambertGrid {
        LambertGrid {
            ni: 1799,
            nj: 1059,
            la1: 21.138123,
            lo1: 237.280472,
            lov: 262.5,
            latin1: 38.5,
            latin2: 38.5,
            dx: 3000.0,
            dy: 3000.0,
            scan_mode: 0x40,
        }
    }

    fn sect3(ni: u32, nj: u32, scan_mode: u8) -> Vec<u8> {
        let mut sec = vec![0u8; 81];
        sec[0..4].copy_from_slice(&81u32.to_be_bytes());
        sec[4] = 3;
        sec[12..14].copy_from_slice(&30u16.to_be_bytes());
        let g = &mut sec[14..];
        g[16..20].copy_from_slice(&ni.to_be_bytes());
        g[20..24].copy_from_slice(&nj.to_be_bytes());
        g[24..28].copy_from_slice(&21_138_123u32.to_be_bytes());
        g[28..32].copy_from_slice(&237_280_472u32.to_be_bytes());
        g[37..41].copy_from_slice(&262_500_000u32.to_be_bytes());
        g[41..45].copy_from_slice(&3_000_000u32.to_be_bytes());
        g[45..49].copy_from_slice(&3_000_000u32.to_be_bytes());
        g[50] = scan_mode;
        g[51..55].copy_from_slice(&38_500_000u32.to_be_bytes());
        g[55..59].copy_from_slice(&38_500_000u32.to_be_bytes());
        sec
    }

    #[test]
    fn sect3_decodes_hrrr_parameters() {
        let grid = LambertGrid::from_sect3(&sect3(1799, 1059, 0x40)).unwrap();
        assert_eq!(grid.ni, 1799);
        assert_eq!(grid.nj, 1059);
        assert!((grid.la1 - 21.138123).abs() < 1e-9);
        assert!((grid.lo1 - 237.280472).abs() < 1e-9);
        assert!((grid.lov - 262.5).abs() < 1e-9);
        assert!((grid.latin1 - 38.5).abs() < 1e-9);
        assert_eq!(grid.dx, 3000.0);
        assert_eq!(grid.dy, 3000.0);
        assert_eq!(grid.scan_mode, 0x40);
    }

    #[test]
    fn sect3_rejects_unsupported_scan_modes() {
        for mode in [0x00u8, 0x80, 0xc0, 0x01] {
            assert_eq!(
                LambertGrid::from_sect3(&sect3(100, 100, mode)),
                Err(ParseError::UnsupportedScanMode(mode)),
                "mode 0x{mode:02X}"
            );
        }
    }

    #[test]
    fn sect3_rejects_invalid_dimensions() {
        for (ni, nj) in [(0u32, 100u32), (100, 0), (40_000, 100), (100, 40_000)] {
            assert!(
                matches!(
                    LambertGrid::from_sect3(&sect3(ni, nj, 0x40)),
                    Err(ParseError::LimitExceeded { .. })
                ),
                "{ni}x{nj}"
            );
        }
    }

    #[test]
    fn sect3_rejects_wrong_template() {
        let mut sec = sect3(100, 100, 0x40);
        sec[12..14].copy_from_slice(&0u16.to_be_bytes());
        assert_eq!(
            LambertGrid::from_sect3(&sec),
            Err(ParseError::UnsupportedGridTemplate(0))
        );
    }

    #[test]
    fn sect3_rejects_short_section() {
        assert!(LambertGrid::from_sect3(&[0u8; 80]).is_err());
    }

    #[test]
    fn normalize_lon_cases() {
        let cases = [
            (-97.5, -97.5),
            (180.0, 180.0),
            (181.0, -179.0),
            (262.5, -97.5),
            (237.280472, -122.719528),
            (360.0, 0.0),
            (270.0, -90.0),
            (0.0, 0.0),
            (90.0, 90.0),
            (-180.0, -180.0),
        ];
        for (input, want) in cases {
            assert!(
                (normalize_lon(input) - want).abs() < 1e-9,
                "normalize_lon({input})"
            );
        }
    }

    #[test]
    fn known_points_map_to_reference_indices() {
        // Expected indices verified against the herbie/cfgrib Python
        // reference, tolerance one cell.
        let g = hrrr_grid();
        let cases = [
            ("Vail Pass CO", 39.54, -106.19, 651i64, 579i64),
            ("Denver CO", 39.74, -104.98, 686, 584),
            ("Seattle WA", 47.61, -122.33, 278, 953),
        ];
        for (name, lat, lon, want_i, want_j) in cases {
            let (i, j) = g.latlon_to_ij(lat, lon);
            assert!(
                (i - want_i).abs() <= 1 && (j - want_j).abs() <= 1,
                "{name}: got ({i}, {j}), want ({want_i}, {want_j})"
            );
        }
    }

    #[test]
    fn forward_inverse_roundtrip_interior() {
        let g = hrrr_grid();
        let points = [
            (39.54, -106.19),
            (39.74, -104.98),
            (47.61, -122.33),
            (41.88, -87.63),
            (25.77, -80.19),
            (35.00, -100.00),
        ];
        // Nearest-neighbour rounding moves a point at most half a cell:
        // 1500 m is about 0.014 degrees of latitude.
        let tol = 0.02;
        for (lat, lon) in points {
            let (i, j) = g.latlon_to_ij(lat, lon);
            let (lat2, lon2) = g.ij_to_latlon(i, j);
            assert!(
                (lat2 - lat).abs() < tol && (lon2 - lon).abs() < tol,
                "({lat}, {lon}) -> ({i}, {j}) -> ({lat2}, {lon2})"
            );
        }
    }

    #[test]
    fn inverse_then_forward_is_exact() {
        // Rounding in the forward map makes the nearest-neighbour
        // roundtrip exact for every grid cell.
        let g = hrrr_grid();
        for j in (0..g.nj as i64).step_by(100) {
            for i in (0..g.ni as i64).step_by(100) {
                let (lat, lon) = g.ij_to_latlon(i, j);
                let (i2, j2) = g.latlon_to_ij(lat, lon);
                assert_eq!((i2, j2), (i, j), "roundtrip at ({i}, {j})");
            }
        }
    }

    #[test]
    fn origin_cell_maps_back_to_first_point() {
        let g = hrrr_grid();
        let (lat, lon) = g.ij_to_latlon(0, 0);
        assert!((lat - g.la1).abs() < 1e-3);
        assert!((lon - normalize_lon(g.lo1)).abs() < 1e-3);
    }

    #[test]
    fn lookup_outside_domain_returns_nan() {
        let g = hrrr_grid();
        let vals = vec![1.0; g.ni * g.nj];
        for (lat, lon) in [(0.0, -97.5), (85.0, -97.5), (39.0, 20.0), (39.0, -170.0)] {
            assert!(
                g.lookup(lat, lon, &vals).is_nan(),
                "({lat}, {lon}) should be outside the domain"
            );
        }
    }

    #[test]
    fn lookup_with_non_finite_coordinates_returns_nan() {
        let g = hrrr_grid();
        let vals = vec![1.0; g.ni * g.nj];
        assert!(g.lookup(f64::NAN, -104.98, &vals).is_nan());
        assert!(g.lookup(39.74, f64::INFINITY, &vals).is_nan());
    }

    #[test]
    fn lookup_returns_value_at_computed_index() {
        let g = hrrr_grid();
        let mut vals = vec![0.0; g.ni * g.nj];
        let (i, j) = g.latlon_to_ij(39.54, -106.19);
        let sentinel = 259.061798;
        vals[j as usize * g.ni + i as usize] = sentinel;
        assert_eq!(g.lookup(39.54, -106.19, &vals), sentinel);
    }
}
