pub mod cli;
pub mod config;
pub mod delivery;
pub mod error;
pub mod orchestrator;
pub mod render;
pub mod report;
pub mod review;
pub mod sources;
pub mod timestamp;
pub mod wiki;
