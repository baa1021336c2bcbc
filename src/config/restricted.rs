use crate::config::SanitizerConfig;

lazy_static! {
    /// Inline formatting only: no links, no media, no attributes, comments shown as text.
    pub static ref RESTRICTED_CONFIG: SanitizerConfig = SanitizerConfig::empty()
        .elem(vec!["b", "em", "i", "strong", "u", "s", "code"])
        .escape_comments(true);
}
