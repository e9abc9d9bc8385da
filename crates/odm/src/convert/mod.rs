//! Entity conversion.
//!
//! [`DocumentConverter`] turns mapped values into [`Document`]s and back, applying
//! custom converters, date formats, geo and range codecs and type hints.

mod codecs;
mod conversions;
mod converter;
mod document;

pub use conversions::{CustomConversions, FnConverter, PropertyValueConverter};
pub use converter::DocumentConverter;
pub use document::Document;
