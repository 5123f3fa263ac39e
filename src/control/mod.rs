pub mod axis;
pub mod pid;
pub mod telemetry;
pub mod tracker;
