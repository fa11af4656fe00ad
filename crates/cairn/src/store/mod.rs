/// Connection lifecycle.
pub mod connection;
/// Collection loading and persistence.
pub(crate) mod persistence;
/// Store implementation.
pub mod stor;
/// Store validation.
pub mod validation;

pub use connection::Connection;
pub use stor::Store;
