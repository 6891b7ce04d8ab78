// Display library - exposes all core modules for the binary and for testing

pub mod config;
pub mod display;
pub mod geometry;
pub mod model;
pub mod server;
pub mod services;
pub mod state;

// Re-export commonly used types
pub use model::ContentEntry;
pub use state::AppState;
