pub mod equations;
pub mod registry;
