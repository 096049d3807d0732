//! CPU model of order-independent transparency.
//!
//! Seven algorithms race per-fragment workers into shared per-pixel state
//! and then resolve it back-to-front: an unsorted bounded buffer, a shared
//! linked-list pool, two atomic-min sorted loops (32- and 64-bit), two
//! critical-section top-K variants (spin lock and platform interlock), and
//! weighted blended OIT. Host-side GPU work (buffers, render passes,
//! swapchain) is out of scope; fragments come from the caller and resolved
//! RGBA colors go back out.
//!
//! ```
//! use glam::Vec4;
//! use glassforge::{Fragment, OitConfig, OitRenderer};
//!
//! let config = OitConfig {
//!     width: 4,
//!     height: 4,
//!     ..OitConfig::default()
//! };
//! let mut renderer = OitRenderer::new(&config).unwrap();
//! renderer.begin_frame(Vec4::new(0.2, 0.2, 0.2, 0.2));
//! renderer.emit(1, 1, Fragment::new(Vec4::new(1.0, 0.0, 0.0, 0.5), 0.4));
//! renderer.emit(1, 1, Fragment::new(Vec4::new(0.0, 1.0, 0.0, 0.5), 0.2));
//! renderer.resolve();
//! let color = renderer.pixel(1, 1);
//! # assert!(color.x > 0.0);
//! ```

mod algorithms;
mod blend;
pub mod caps;
pub mod config;
pub mod error;
pub mod fragment;
mod stats;
pub mod target;

mod renderer;

pub use caps::OitCaps;
pub use config::{AaMode, Algorithm, OitConfig, WboitWeights, MAX_LAYERS};
pub use error::{OitError, OitResult};
pub use fragment::Fragment;
pub use renderer::OitRenderer;
pub use stats::FrameStats;
