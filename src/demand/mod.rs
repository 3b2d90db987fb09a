pub mod distribution;
pub mod model;
