//! HTML preview rendering

use crate::Result;
use std::path::Path;

const DEFAULT_TEMPLATE: &str = "<!DOCTYPE html>\n\
<html>\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<title>Preview</title>\n\
</head>\n\
<body>\n\
<p><a href=\"{URL}\">{URL}</a></p>\n\
<div>{PREVIEW}</div>\n\
</body>\n\
</html>\n";

/// A preview template with `{PREVIEW}` and `{URL}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTemplate {
    source: String,
}

impl PreviewTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Loads a template from disk
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }

    /// Renders the preview; newlines in `text` become `</br>`
    pub fn render(&self, text: &str, url: &str) -> String {
        self.source
            .replace("{PREVIEW}", &text.replace('\n', "</br>"))
            .replace("{URL}", url)
    }
}

impl Default for PreviewTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}
