//! Horizontal cylinder depth ↔ volume conversion.
//!
//! The tank is a circular cylinder lying on its side, partially filled to
//! depth `h` (0 ≤ h ≤ 2r).  Radius, length and depth are in millimetres;
//! volumes are in litres (1 L = 1e6 mm³).
//!
//! ```text
//!        ┌──────────── l ────────────┐
//!      ╭─┴─╮                         │
//!     │  r  │   A(h) = r²·acos((r-h)/r) − (r-h)·√(2rh − h²)
//!     │~~~~~│ ─┬─
//!      ╰───╯   h      V(h) = A(h) · l · 1e-6
//! ```
//!
//! There is no closed-form inverse, so [`depth_for_volume`] bisects.
//! Both functions are total: out-of-domain inputs saturate instead of
//! producing NaN.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// mm³ → L.
const MM3_TO_LITRES: f64 = 1e-6;

/// Bisection steps for [`depth_for_volume`].  2r / 2²⁶ is well below a
/// micrometre for any realistic tank.
pub const BISECTION_ITERATIONS: u32 = 26;

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Liquid volume (L) at depth `h` in a horizontal cylinder of radius `r`
/// and length `l` (all mm).
///
/// Returns 0 for `h ≤ 0` and the full-cylinder volume for `h ≥ 2r`.
pub fn volume_at(h: f64, r: f64, l: f64) -> f64 {
    if h <= 0.0 {
        return 0.0;
    }
    if h >= 2.0 * r {
        return full_volume(r, l);
    }
    let cos_arg = ((r - h) / r).clamp(-1.0, 1.0);
    let radicand = (2.0 * r * h - h * h).max(0.0);
    let area = r * r * cos_arg.acos() - (r - h) * radicand.sqrt();
    area.max(0.0) * l * MM3_TO_LITRES
}

/// Volume (L) of the completely full cylinder.
pub fn full_volume(r: f64, l: f64) -> f64 {
    core::f64::consts::PI * r * r * l * MM3_TO_LITRES
}

/// Depth (mm) at which the tank holds `target` litres.
///
/// Bisects `[0, 2r]` for [`BISECTION_ITERATIONS`] steps.  Targets below 0
/// converge to 0, targets above the full volume converge to `2r`.
pub fn depth_for_volume(target: f64, r: f64, l: f64) -> f64 {
    let mut low = 0.0;
    let mut high = 2.0 * r;
    for _ in 0..BISECTION_ITERATIONS {
        let mid = (low + high) / 2.0;
        if volume_at(mid, r, l) < target {
            low = mid;
        } else {
            high = mid;
        }
    }
    (low + high) / 2.0
}

// ---------------------------------------------------------------------------
// TankGeometry
// ---------------------------------------------------------------------------

/// Validated tank dimensions.  Replaced wholesale on configuration update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TankGeometry {
    pub radius_mm: f64,
    pub length_mm: f64,
}

/// Result of forcing a raw sensor depth into `[0, 2r]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampedDepth {
    pub raw_mm: f64,
    pub depth_mm: f64,
}

impl ClampedDepth {
    pub fn was_clamped(&self) -> bool {
        self.raw_mm != self.depth_mm
    }
}

impl TankGeometry {
    /// Build a geometry, rejecting non-positive or non-finite dimensions.
    pub fn new(radius_mm: f64, length_mm: f64) -> Result<Self, ConfigError> {
        let geometry = Self {
            radius_mm,
            length_mm,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if ok(self.radius_mm) && ok(self.length_mm) {
            Ok(())
        } else {
            Err(ConfigError::InvalidGeometry {
                radius_mm: self.radius_mm,
                length_mm: self.length_mm,
            })
        }
    }

    /// Depth of a completely full tank (the diameter).
    pub fn max_depth(&self) -> f64 {
        2.0 * self.radius_mm
    }

    pub fn volume_at(&self, depth_mm: f64) -> f64 {
        volume_at(depth_mm, self.radius_mm, self.length_mm)
    }

    pub fn depth_for_volume(&self, litres: f64) -> f64 {
        depth_for_volume(litres, self.radius_mm, self.length_mm)
    }

    /// Geometric capacity in litres.
    pub fn full_volume(&self) -> f64 {
        full_volume(self.radius_mm, self.length_mm)
    }

    /// Clamp a raw (finite) depth into `[0, 2r]`.
    pub fn clamp_depth(&self, raw_mm: f64) -> ClampedDepth {
        ClampedDepth {
            raw_mm,
            depth_mm: raw_mm.clamp(0.0, self.max_depth()),
        }
    }
}

impl Default for TankGeometry {
    /// 1.9 m diameter, 7 m long: roughly a 20 000 L diesel tank.
    fn default() -> Self {
        Self {
            radius_mm: 950.0,
            length_mm: 7000.0,
        }
    }
}
