//! idealist library
//!
//! Change log, per-user sync instructions and position ordering for shared
//! lists. The CRUD layer talks to the services in [`services`].

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod ordering;
pub mod services;
pub mod sync;

pub use app::AppState;
pub use error::{AppError, Result};
