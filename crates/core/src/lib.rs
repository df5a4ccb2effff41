//! Domain model and presentation logic for the coloração pessoal client.
//!
//! Everything here is pure (no network): response types, the region
//! catalogue, manual color validation, the derived intensity metric,
//! gauge/chart/overlay rendering, and the session store behind the
//! authentication gate.

pub mod chart;
pub mod classification;
pub mod colors;
pub mod error;
pub mod extraction;
pub mod gauge;
pub mod job;
pub mod overlay;
pub mod regions;
pub mod session;
pub mod types;
