//! Transports consumed by `BundleLoader`.

pub mod http;
pub mod file;
pub mod stub;

pub use http::HttpTransport;
pub use file::FileTransport;
pub use stub::{StubResponse, StubTransport};
