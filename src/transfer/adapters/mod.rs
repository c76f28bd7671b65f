//! Backends - where transfers live (REST service, embedded store, test double)

pub mod traits;
pub mod http;
pub mod local;
pub mod mock;

pub use traits::TransferBackend;
pub use http::HttpBackend;
pub use local::LocalBackend;
pub use mock::MockBackend;
