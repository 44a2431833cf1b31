// Library crate: the viewer core, its headless engine and the scripting layer.
// The binary only wires stdin/stdout to the command protocol.

pub mod bcf;
pub mod command;
pub mod engine;
pub mod error;
pub mod events;
pub mod fixtures;
pub mod harness;
pub mod models;
pub mod server;
pub mod state;
pub mod viewer;

pub use error::ViewerError;
pub use viewer::{BimViewer, ViewerOptions};
