pub mod config;
pub mod detection;
pub mod draw;
pub mod errors;
pub mod geometry;
pub mod guidance;
pub mod stream;
