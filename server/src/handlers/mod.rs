//! Request handlers for the quote endpoint.

mod quotes;

pub use quotes::*;
