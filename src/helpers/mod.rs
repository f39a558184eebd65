//! Helper functions for templates and handlers
//!
//! Date formatting in the site timezone and URL building.

mod date;
mod url;

pub use date::*;
pub use url::*;
