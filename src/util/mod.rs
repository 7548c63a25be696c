//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: scheme/host checks and IDNA conversion of feed sources
//! - **Text processing**: markup stripping, whitespace collapsing, entity
//!   decoding and character-based truncation of feed text
//!
//! # Examples
//!
//! ```
//! use rss_reader::util::{clean_text, validate_feed_url};
//!
//! // Validate a feed URL before any network activity
//! let url = validate_feed_url("https://example.com/feed.xml").unwrap();
//!
//! // Normalize a feed description
//! let text = clean_text("<p>Hello&nbsp;<b>world</b></p>");
//! assert_eq!(text, "Hello world");
//! ```

mod text;
mod url_validator;

pub use text::{
    clean_text, find_img_src, strip_control_chars, truncate_chars, MAX_TEXT_CHARS,
};
pub use url_validator::{validate_feed_url, UrlValidationError};
