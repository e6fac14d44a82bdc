//! Localisation
//!
//! - [`resolve`]: terminal error code → localised message
//! - [`Translations`]: label and error tables for one locale

mod resolver;
mod translations;

pub use resolver::resolve;
pub use translations::Translations;
