//! The map session: binds a map context to an engine surface and reports
//! which features a click landed on.

pub mod error;
pub mod events;
pub mod session;

pub use error::*;
pub use events::*;
pub use session::*;
