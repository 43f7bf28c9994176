//! leqm-dsp: coefficient tables, M-weighting, K-weighting, and true-peak
//! estimation for the Leq(M) loudness engine.

pub mod coeffs;
pub mod kweight;
pub mod mweight;
pub mod truepeak;

pub use coeffs::{IirCoeffs, IirCoeffs2, KWeightCoeffs};
pub use kweight::KWeightFilter;
pub use mweight::FilterBank;
pub use truepeak::{OversampleFactor, TruePeakEstimator};
