//! Embedded-data extractor
//!
//! Pages on some forums ship their initial state as a script that assigns
//! object literals to global names:
//!
//! ```text
//! AoPS.bootstrap_data = { init_time: 1700000000, preload_cmty_data: { ... } };
//! AoPS.session = { id: "abc", user_id: 0 };
//! ```
//!
//! This module finds that script in an HTML document and turns it into a
//! [`BootstrapValue`] tree without executing any code.
//!
//! # Components
//!
//! - `lexer`: tokenizer and string-literal decoding
//! - `parser`: recursive-descent parser collecting top-level assignments
//! - `value`: the generic value tree and its accessors

mod lexer;
mod parser;
mod value;

pub use lexer::{decode_string_literal, ParseError};
pub use value::{BootstrapValue, Mapping, OpaqueKind, Scalar};

use scraper::{Html, Selector};

/// Parses a script source into a mapping of its top-level assignments
///
/// # Arguments
///
/// * `src` - The script source
///
/// # Returns
///
/// * `Ok(BootstrapValue::Mapping)` - One key per assigned dotted name
/// * `Err(ParseError)` - The script is not syntactically valid
pub fn parse_script(src: &str) -> Result<BootstrapValue, ParseError> {
    parser::parse_script(src).map(BootstrapValue::Mapping)
}

/// Extracts bootstrap data from the first script block containing `marker`
///
/// Returns `None` when no script contains the marker or when that script
/// fails to parse; a syntax error anywhere in the block discards the block.
pub fn extract_bootstrap(html: &str, marker: &str) -> Option<BootstrapValue> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").ok()?;

    let source = document
        .select(&selector)
        .map(|element| element.text().collect::<String>())
        .find(|text| text.contains(marker))?;

    match parse_script(&source) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Bootstrap script rejected: {}", e);
            None
        }
    }
}
