//! glassboost: the histogram engine behind an explainable boosting trainer.
//!
//! This crate implements the computational core of gradient boosting over
//! low-dimensional feature interactions: binning training cases into dense
//! N-dimensional contingency tables, in-place summed-area ("fast totals")
//! construction, `O(2^D)` hyper-rectangle totals, exhaustive pair split
//! search producing piecewise-constant model updates, and pair interaction
//! scoring.
//!
//! The boosting orchestrator, data I/O, and loss bookkeeping live above this
//! crate; what crosses the boundary is exactly a feature-combination
//! descriptor, a packed input view, residual/hessian/weight buffers, and the
//! reusable per-thread scratch.
//!
//! # Example
//!
//! ```
//! use glassboost::data::{Feature, FeatureCombination, PackedInput};
//! use glassboost::sampling::SamplingSet;
//! use glassboost::training::{
//!     train_pair, SegmentedRegion, TensorLayout, TrainingCache,
//! };
//!
//! let combination = FeatureCombination::pair(
//!     Feature::new(2, 0),
//!     Feature::new(2, 1),
//! ).unwrap();
//! let f0 = [0usize, 0, 1, 1];
//! let f1 = [0usize, 1, 0, 1];
//! let input = PackedInput::pack(&combination, &[&f0, &f1]).unwrap();
//!
//! let layout = TensorLayout::regression();
//! let residuals = [1.0, 1.0, -1.0, -1.0];
//! let sampling = SamplingSet::identity(4);
//! let mut cache = TrainingCache::new();
//! let mut update = SegmentedRegion::new(2, 1);
//!
//! train_pair(
//!     &combination, &layout, &input, &residuals, None, &sampling,
//!     &mut cache, &mut update,
//! ).unwrap();
//! assert_eq!(update.divisions(0), &[0]);
//! ```

pub mod data;
pub mod error;
pub mod sampling;
pub mod training;
pub mod utils;

pub use error::CoreError;
