//! Guided cloud report wizard.
//!
//! A session walks through provider, report type, credentials, resource or
//! billing-period selection and finally renders a PDF (or JSON) report.

pub mod catalog;
pub mod config;
pub mod error;
pub mod generate;
pub mod interactive;
pub mod model;
pub mod report;
pub mod selection;
pub mod session;
pub mod store;
pub mod wizard;

pub use error::{InsightsError, Result};
