//! A shared income and expense ledger for the projects of a foundation.
//!
//! Every admin reads and writes one shared document, a nested mapping of project → kind (income or
//! expenses) → year → transaction. The `aggregate` module derives totals from it, `mutation`
//! plans and applies changes, `mirror` holds each client's view of the document and `session`
//! ties them to the document store and the auth service in `api`.

pub mod aggregate;
pub mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod mirror;
pub mod model;
pub mod mutation;
pub mod session;
mod utils;


pub use api::Mode;
pub use config::{Config, DEFAULT_DOCUMENT_KEY, DEFAULT_PROJECT};
pub use error::{Error, ErrorType, Result};
