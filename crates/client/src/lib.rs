//! Network client for the coloração pessoal processing backend.
//!
//! The backend is a single webhook endpoint that accepts extraction and
//! classification jobs and is polled until each job reaches a terminal
//! status. File uploads go to a second, optional webhook.
//!
//! Layering, bottom up:
//!
//! - [`env`] / [`config`]: where endpoints and tuning come from.
//! - [`transport`]: one HTTP exchange (`reqwest` in production, scripted
//!   fakes in tests).
//! - [`decode`] / [`poll`]: reply normalisation and the poll state machine.
//! - [`api`]: authenticated submit and poll calls.
//! - [`service`] / [`upload`]: the user-facing workflows.

pub mod api;
pub mod config;
pub mod decode;
pub mod env;
pub mod error;
pub mod poll;
pub mod service;
pub mod transport;
pub mod upload;

pub use api::ApiClient;
pub use config::{ApiConfig, Endpoint};
pub use error::{ClientError, UploadError};
pub use service::ColoracaoService;
pub use upload::UploadService;
