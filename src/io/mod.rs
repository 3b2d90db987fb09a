pub mod answers;
pub mod extractor;
pub mod reporting;
pub mod store;
