//! Text normalization collaborators
//!
//! - `tex`: math delimiter normalization applied before persistence
//! - `html_text`: tag-text extraction for HTML question pages

mod html_text;
mod tex;

pub use html_text::{comment_text, element_text, paragraph_text, unescape_html};
pub use tex::{
    convert_canonical_tex, replace_display_tex, replace_dollar_tex, replace_inline_tex,
    TexNormalizer,
};
