//! Pipeline configuration, validation, and capability-driven fallback.

use serde::{Deserialize, Serialize};

use crate::caps::OitCaps;
use crate::error::{OitError, OitResult};

/// Maximum layer count an A-buffer slot may hold.
pub const MAX_LAYERS: u32 = 32;

/// The transparency algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Unsorted bounded per-slot buffer, sorted at resolve.
    Simple,
    /// Shared node pool with per-slot chains.
    LinkedList,
    /// Two-pass atomic-min depth sort plus a color pass.
    Loop,
    /// Single-pass variant of `Loop` over packed 64-bit words.
    Loop64,
    /// Critical-section top-K with a software spin lock.
    Spinlock,
    /// Critical-section top-K behind a platform serialization primitive.
    Interlock,
    /// Weighted blended OIT: approximate, lock-free, O(1) memory.
    Weighted,
}

/// Antialiasing modes, mirroring what the renderer's frame images support.
///
/// MSAA without sample shading stores one A-buffer array per pixel plus a
/// coverage mask per fragment; sample shading (SSAA) gives every sample its
/// own A-buffer array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AaMode {
    None,
    Msaa4x,
    Ssaa4x,
    Msaa8x,
    Ssaa8x,
}

impl AaMode {
    pub fn sample_count(self) -> u32 {
        match self {
            AaMode::None => 1,
            AaMode::Msaa4x | AaMode::Ssaa4x => 4,
            AaMode::Msaa8x | AaMode::Ssaa8x => 8,
        }
    }

    pub fn sample_shading(self) -> bool {
        matches!(self, AaMode::Ssaa4x | AaMode::Ssaa8x)
    }
}

/// Tunable weight heuristic for weighted blended OIT.
///
/// The weight shape follows the reference shader: opacity emphasized with a
/// cubic ramp, distance attenuated with another, clamped into a range that
/// keeps the accumulator well-conditioned. It is a heuristic, not a
/// contract; replace freely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WboitWeights {
    /// Scales raw depth into the [0, 1] range the falloff expects.
    pub depth_scale: f32,
    pub clamp_min: f32,
    pub clamp_max: f32,
}

impl Default for WboitWeights {
    fn default() -> Self {
        Self {
            depth_scale: 1.0,
            clamp_min: 1e-2,
            clamp_max: 3e3,
        }
    }
}

impl WboitWeights {
    /// Evaluate the weight of a fragment.
    pub fn weight(&self, depth: f32, alpha: f32) -> f32 {
        let z = (depth * self.depth_scale).clamp(0.0, 1.0);
        let a = (alpha * 10.0).min(1.0) + 0.01;
        let falloff = 1.0 - z * 0.9;
        (a * a * a * 1e8 * falloff * falloff * falloff).clamp(self.clamp_min, self.clamp_max)
    }
}

/// Full configuration surface of the transparency pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OitConfig {
    pub algorithm: Algorithm,
    pub width: u32,
    pub height: u32,
    /// Per-slot A-buffer capacity K. Zero degenerates to pure tail blending.
    /// Ignored as a storage bound by `LinkedList` and `Weighted`.
    pub layers: u32,
    /// Linked list only: average pool nodes allocated per pixel.
    pub allocated_per_pixel: u32,
    /// Composite overflow fragments immediately instead of discarding them.
    pub tail_blend: bool,
    /// Interlock only: serialize slot updates in submission order.
    pub interlock_ordered: bool,
    pub aa: AaMode,
    pub weights: WboitWeights,
    /// Substitute the documented fallback when a primitive is missing;
    /// when false, resolution rejects instead.
    pub allow_fallback: bool,
}

impl Default for OitConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Spinlock,
            width: 1024,
            height: 768,
            layers: 8,
            allocated_per_pixel: 10,
            tail_blend: true,
            interlock_ordered: true,
            aa: AaMode::None,
            weights: WboitWeights::default(),
            allow_fallback: true,
        }
    }
}

impl OitConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> OitResult<Self> {
        serde_json::from_str(text).map_err(OitError::config)
    }

    pub fn sample_count(&self) -> u32 {
        self.aa.sample_count()
    }

    pub fn sample_shading(&self) -> bool {
        self.aa.sample_shading()
    }

    /// Coverage masks are stored per fragment when multisampling without
    /// sample shading.
    pub fn coverage_shading(&self) -> bool {
        self.sample_count() > 1 && !self.sample_shading()
    }

    pub fn validate(&self) -> OitResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(OitError::config(format!(
                "target must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if self.layers > 0 && (!self.layers.is_power_of_two() || self.layers > MAX_LAYERS) {
            return Err(OitError::config(format!(
                "layers must be 0 or a power of two up to {MAX_LAYERS}, got {}",
                self.layers
            )));
        }
        if matches!(self.algorithm, Algorithm::Loop | Algorithm::Loop64) && self.sample_count() > 1
        {
            return Err(OitError::config(
                "the loop variants assume pixel granularity and do not support multisampling",
            ));
        }
        if self.algorithm == Algorithm::LinkedList && self.allocated_per_pixel == 0 {
            return Err(OitError::config(
                "linked list needs at least one pool node per pixel",
            ));
        }
        Ok(())
    }

    /// Resolve the requested algorithm against platform capabilities,
    /// substituting the documented fallback or rejecting.
    pub fn resolve_algorithm(&self, caps: &OitCaps) -> OitResult<Algorithm> {
        match self.algorithm {
            Algorithm::Loop64 if !caps.int64_atomics => {
                if !self.allow_fallback {
                    return Err(OitError::Unsupported {
                        algorithm: Algorithm::Loop64,
                        missing: "64-bit atomic min",
                    });
                }
                log::warn!("64-bit atomics unavailable; falling back from loop64 to loop");
                Ok(Algorithm::Loop)
            }
            Algorithm::Interlock if !caps.fragment_interlock => {
                if !self.allow_fallback {
                    return Err(OitError::Unsupported {
                        algorithm: Algorithm::Interlock,
                        missing: "a slot-scoped interlock primitive",
                    });
                }
                log::warn!("interlock primitive unavailable; falling back to spinlock");
                Ok(Algorithm::Spinlock)
            }
            other => Ok(other),
        }
    }
}
