//! GenFill: paint a mask over an image and have an image-edit service
//! regenerate the masked region.
//!
//! [`session::EditSession`] owns all editing state and is shared by the
//! desktop front end ([`app`]) and the headless one ([`cli`]).

#[macro_use]
pub mod logger;
pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod ops;
pub mod session;
pub mod settings;

pub use error::{EditError, Result};
pub use session::EditSession;
