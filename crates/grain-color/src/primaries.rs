//! Colour primaries and RGB/XYZ matrix generation.
//!
//! Each primary is a CIE xy chromaticity. The RGB to XYZ matrix is derived by
//! scaling the primaries' XYZ columns so that RGB (1, 1, 1) lands on the white
//! point with Y = 1.
//!
//! All colorimetries supported by the pipeline share the D65 white point, so
//! gamut conversion needs no chromatic adaptation.
//!
//! Matrices leave this module flattened **row-major**, the order the kernels
//! read them in.

use glam::{Mat3, Vec3};

/// RGB colour space primaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primaries {
    /// Red primary (x, y)
    pub r: (f32, f32),
    /// Green primary (x, y)
    pub g: (f32, f32),
    /// Blue primary (x, y)
    pub b: (f32, f32),
    /// White point (x, y)
    pub w: (f32, f32),
    /// Name
    pub name: &'static str,
}

/// D65 white point chromaticity.
pub const D65_XY: (f32, f32) = (0.31270, 0.32900);

/// BT.601 625-line (EBU Tech 3213) primaries.
pub const BT601_625: Primaries = Primaries {
    r: (0.640, 0.330),
    g: (0.290, 0.600),
    b: (0.150, 0.060),
    w: D65_XY,
    name: "BT.601-625",
};

/// BT.601 525-line (SMPTE C) primaries.
pub const BT601_525: Primaries = Primaries {
    r: (0.630, 0.340),
    g: (0.310, 0.595),
    b: (0.155, 0.070),
    w: D65_XY,
    name: "BT.601-525",
};

/// BT.709 / sRGB primaries.
pub const REC709: Primaries = Primaries {
    r: (0.6400, 0.3300),
    g: (0.3000, 0.6000),
    b: (0.1500, 0.0600),
    w: D65_XY,
    name: "BT.709",
};

/// BT.2020 / BT.2100 primaries.
pub const REC2020: Primaries = Primaries {
    r: (0.7080, 0.2920),
    g: (0.1700, 0.7970),
    b: (0.1310, 0.0460),
    w: D65_XY,
    name: "BT.2020",
};

fn xy_to_xyz(x: f32, y: f32) -> Vec3 {
    if y.abs() < 1e-10 {
        Vec3::ZERO
    } else {
        Vec3::new(x / y, 1.0, (1.0 - x - y) / y)
    }
}

fn inverse_or_identity(m: Mat3) -> Mat3 {
    if m.determinant().abs() < 1e-12 {
        Mat3::IDENTITY
    } else {
        m.inverse()
    }
}

/// RGB to XYZ matrix for a set of primaries.
pub fn rgb_to_xyz_matrix(p: &Primaries) -> Mat3 {
    let r = xy_to_xyz(p.r.0, p.r.1);
    let g = xy_to_xyz(p.g.0, p.g.1);
    let b = xy_to_xyz(p.b.0, p.b.1);
    let w = xy_to_xyz(p.w.0, p.w.1);

    let m = Mat3::from_cols(r, g, b);
    let s = inverse_or_identity(m) * w;
    Mat3::from_cols(r * s.x, g * s.y, b * s.z)
}

/// Matrix converting linear RGB in `src` primaries to linear RGB in `dst`.
pub fn rgb_to_rgb_matrix(src: &Primaries, dst: &Primaries) -> Mat3 {
    inverse_or_identity(rgb_to_xyz_matrix(dst)) * rgb_to_xyz_matrix(src)
}

/// Flatten a matrix to row-major order.
pub fn matrix_flatten(m: Mat3) -> [f32; 9] {
    m.transpose().to_cols_array()
}

/// Row-major gamut matrix from one colorimetry's primaries to another's.
pub fn gamut_matrix(src: &crate::ColSpec, dst: &crate::ColSpec) -> [f32; 9] {
    matrix_flatten(rgb_to_rgb_matrix(&src.primaries, &dst.primaries))
}
