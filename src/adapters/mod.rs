// Adapters layer: concrete implementations for external systems.

pub mod yahoo;

pub use yahoo::YahooClient;
