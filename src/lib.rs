//! GPU-accelerated batch computation of the Adjusted Rand Index (ARI)
//! across many pairs of cluster partitions.
//!
//! Given a three-dimensional tensor of integer partition labels, shaped
//! `(F, P, N)` — `F` features, `P` partition variants per feature, `N`
//! objects — [`compute_ari`] scores every ordered pairing of `(feature-i
//! partition-m, feature-j partition-n)` for every unordered feature pair
//! `i < j` and every `(m, n)` combination of partition variants.
//!
//! The engine is batch-only: no streaming updates, no multi-device
//! scheduling, no automatic differentiation, and it assumes a modest label
//! alphabet (contingency storage is quadratic in the alphabet size).
//!
//! # Types
//!
//! - [`Context`] — pooled GPU context for buffer and pipeline management.
//! - [`Buffer`] — typed GPU buffer.
//! - [`Element`] — trait for GPU-compatible element types (`f32`, `i32`).
//! - [`Error`] — [`Error::InvalidInput`], [`Error::Device`],
//!   [`Error::ResourceExceeded`].
//!
//! # Example
//!
//! ```no_run
//! use ari_gpu::{compute_ari, Context};
//!
//! let ctx = Context::try_default()?;
//! // Two features, one partition variant each, four objects, identical
//! // partitions -> perfect agreement.
//! let parts = [0, 0, 1, 1, 0, 0, 1, 1];
//! let scores = compute_ari(&ctx, &parts, 2, 1, 4)?;
//! assert_eq!(scores, vec![1.0]);
//! # Ok::<(), ari_gpu::Error>(())
//! ```

#![warn(missing_docs)]

extern crate alloc;

pub mod error;

mod device;
mod driver;
mod element;
mod index;
mod kernel;
mod scratch;

pub use device::{Buffer, Context};
pub use driver::compute_ari;
pub use element::Element;
pub use error::Error;
