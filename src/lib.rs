// lib.rs
pub mod communication;
pub mod config;
pub mod control_system;
pub mod data_structures;
pub mod engine;
pub mod error;
pub mod flow_analyzer;
pub mod global_variables;
pub mod monitoring;
pub mod shared_data;
pub mod simulation_engine;
pub mod vehicle_tracking;

pub use config::SystemConfig;
pub use control_system::SignalController;
pub use error::{Result, SignalError};
