//! Statistical inference: descriptive statistics feeding a Welch-test
//! comparison of the two variants.

pub mod descriptive;
pub mod inference;

pub use descriptive::{Descriptive, describe};
pub use inference::{
    ConfidenceInterval, DEFAULT_CONFIDENCE_LEVEL, InferenceOptions, MIN_SAMPLE_SIZE, Statistics,
    StatisticsBundle, WelchTest, compute_statistics, compute_statistics_with, confidence_interval,
    effect_size, meets_minimum_sample_size, welch_test,
};
