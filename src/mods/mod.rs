pub mod analyze;
pub mod batch;
pub mod decoder;
pub mod envelope;
pub mod export;
pub mod frame_math;
pub mod progress;
pub mod segments;
pub mod silence;
pub mod spectral;
pub mod types;
