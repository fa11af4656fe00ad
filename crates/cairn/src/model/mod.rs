/// Model descriptor and construction.
pub mod descriptor;
/// Exact-match filters.
pub mod filter;
/// Live documents.
pub mod instance;
/// Reference population.
pub mod populate;
/// Lookups over cached collections.
pub mod queries;
/// Model tests.
pub mod tests;

pub use descriptor::Model;
pub use filter::Filter;
pub use instance::Instance;
