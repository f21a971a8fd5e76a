//! Document Configuration

/// Document compatibility mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompatMode {
    #[default]
    NoQuirks,
    Quirks,
}

impl CompatMode {
    /// Value reported by `document.compatMode`
    pub fn as_str(self) -> &'static str {
        match self {
            CompatMode::NoQuirks => "CSS1Compat",
            CompatMode::Quirks => "BackCompat",
        }
    }
}

/// Document configuration options
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Document URL
    pub url: String,

    /// MIME type of the document
    pub content_type: String,

    /// Character encoding name
    pub character_set: String,

    /// Compatibility mode
    pub compat_mode: CompatMode,
}

impl DocumentConfig {
    /// Whether the document is an HTML document
    pub fn is_html(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("text/html")
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
            content_type: "application/xml".to_string(),
            character_set: "UTF-8".to_string(),
            compat_mode: CompatMode::NoQuirks,
        }
    }
}
