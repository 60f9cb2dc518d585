pub mod alerts;
pub mod baselines;
pub mod detector;
pub mod trends;
