//! The four PBIX extraction strategies, in the order they run

pub mod binary_scan;
pub mod connections;
pub mod layout;
pub mod schema_json;

pub use binary_scan::BinaryScanStrategy;
pub use connections::ConnectionsStrategy;
pub use layout::LayoutStrategy;
pub use schema_json::SchemaJsonStrategy;
