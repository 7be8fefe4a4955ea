//! Dynamic route core: Store, Sandbox Host, Route Registry and the
//! framework-agnostic half of the catch-all Dispatcher.
//!
//! The HTTP transport, the CRUD Facade's request handlers, and `main` live
//! in the server binary crate; this library never depends on HTTP types.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod model;
pub mod registry;
pub mod sandbox;
pub mod store;

pub use config::Config;
pub use dispatch::{dispatch, DispatchOutcome, DispatchRequest};
pub use error::CoreError;
pub use generator::{Generator, NullGenerator};
pub use model::{Endpoint, HttpMethod, Language, Page, Project, RouteInfo};
pub use registry::Registry;
pub use sandbox::{DefaultSandboxHost, SandboxHost};
pub use store::{SqliteStore, Store};
