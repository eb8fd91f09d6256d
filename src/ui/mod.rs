pub mod estimator;
pub mod panels;
pub mod plot;
