pub mod export;
pub mod generator;
