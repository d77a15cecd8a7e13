//! Content parsing and serialization for the content sync layer
//!
//! Decodes entry files written as YAML, TOML, JSON or front-matter
//! documents into flat key/value records, and encodes them back.
//!
//! ```
//! use cms_content::{DecodeOptions, EncodeOptions, Format, decode_str, encode};
//! use serde_json::json;
//!
//! let options = DecodeOptions::for_extension("json");
//! let content = decode_str(r#"{"a": 1, "b": {"c": 2}}"#, &options).unwrap();
//! assert_eq!(content.get("b.c"), Some(&json!(2)));
//!
//! let text = encode(&content, &EncodeOptions::new(Format::Json)).unwrap();
//! assert_eq!(text, "{\n  \"a\": 1,\n  \"b\": {\n    \"c\": 2\n  }\n}\n");
//! ```

pub mod codec;
pub mod content;
pub mod error;
pub mod flatten;
pub mod format;
pub mod frontmatter;
pub mod handlers;

pub use codec::{DecodeOptions, EncodeOptions, decode, decode_str, encode, resolve_format};
pub use content::{BODY_KEY, ParsedContent};
pub use error::{Error, Result};
pub use format::{Delimiters, Format, FormatHandler, QuoteStyle};
