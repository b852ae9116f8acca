//! Engine-facing half of the map session: the engine seam, the translation of
//! context layers into engine layers, view math and feature queries.

pub mod adapter;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod headless;
pub mod layer;
pub mod query;
pub mod raster;
pub mod symbology;
pub mod vector;
pub mod view;

pub use adapter::*;
pub use config::*;
pub use engine::*;
pub use fetch::*;
pub use headless::*;
pub use layer::*;
pub use query::*;
pub use view::*;
