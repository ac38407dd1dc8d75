pub mod aggregator;
pub mod proficiency;
pub mod repository;
