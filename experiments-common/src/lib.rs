pub mod event;
pub mod experiment;
pub mod geo;
pub mod metrics;
pub mod project;
pub mod propagation;
pub mod segment;
pub mod segmenter;
pub mod treatment;
pub mod validation;
pub mod value;
