pub mod config;
pub mod kernel;
pub mod loader;
pub mod services;

// Re-export specific items if needed for convenient access
pub use config::LoaderConfig;
pub use kernel::coordinator::{LoadCoordinator, LoadReport};
pub use kernel::telemetry::{ContextId, TelemetryRecord};
pub use loader::{AsyncLoader, LoadError, LoadOptions, LoadRequest, LoadResult};
