pub mod backend;
pub mod errors;
pub mod factory;
pub mod local;
pub mod orchestrator;
pub mod remote;
pub mod url_index;

pub use errors::AppError;
pub use factory::{AppFactory, AppPaths};
pub use orchestrator::{Orchestrator, Source};
