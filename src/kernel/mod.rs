pub mod time;
pub mod telemetry;
pub mod cancel;
pub mod coordinator;
