use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use html5ever::LocalName;
use regex::Regex;

use crate::error::{Result, SanitizeError};
use crate::url_check::CheckedUrl;

pub mod default;
pub mod restricted;

pub use default::DEFAULT_CONFIG;
pub use restricted::RESTRICTED_CONFIG;

/// Subtrees deeper than this are replaced with a placeholder unless a config says otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Extra acceptance check applied to URL-bearing attributes after the scheme check passed.
pub type UrlValidator = Arc<dyn Fn(&CheckedUrl) -> bool + Send + Sync>;

/// Allow-list of elements and attributes.
///
/// An element is allowed iff it is a key of `allowed_elements`, even when it maps to an empty
/// attribute set. A config is built up front with the chainable methods below and is only read
/// while sanitizing, so one value can be shared between threads.
#[derive(Clone)]
pub struct SanitizerConfig {
    /// element => attribute => value pattern the attribute must match, if any
    pub allowed_elements: HashMap<LocalName, HashMap<LocalName, Option<Regex>>>,
    /// attributes allowed on every allowed element
    pub allowed_attributes: HashSet<LocalName>,
    /// skip URL validation of `href`, `src` and `poster` entirely
    pub allow_javascript_url: bool,
    pub validate_url: Option<UrlValidator>,
    /// turn comments into visible text instead of keeping them
    pub escape_comments: bool,
    /// wrap top level inline content in `<p>` elements
    pub wrap_text: bool,
    /// elements whose children are wrapped as if they were top level
    pub wrap_text_inside: HashSet<LocalName>,
    /// 0 disables the depth limit
    pub max_depth: usize,
}

fn normalize(name: &str) -> LocalName {
    LocalName::from(name.to_ascii_lowercase())
}

impl SanitizerConfig {
    /// A config that allows nothing at all.
    pub fn empty() -> SanitizerConfig {
        SanitizerConfig {
            allowed_elements: HashMap::new(),
            allowed_attributes: HashSet::new(),
            allow_javascript_url: false,
            validate_url: None,
            escape_comments: false,
            wrap_text: false,
            wrap_text_inside: HashSet::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn elem<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.allowed_elements
                .entry(normalize(name.as_ref()))
                .or_insert_with(HashMap::new);
        }
        self
    }

    /// Allows `elem` along with the given attributes on it.
    pub fn elem_attr<I, S>(mut self, elem: &str, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = self
            .allowed_elements
            .entry(normalize(elem))
            .or_insert_with(HashMap::new);
        for attr in attrs {
            allowed.entry(normalize(attr.as_ref())).or_insert(None);
        }
        self
    }

    /// Allows `attr` on `elem` only when its value matches `pattern`.
    pub fn elem_attr_match(mut self, elem: &str, attr: &str, pattern: Regex) -> Self {
        self.allowed_elements
            .entry(normalize(elem))
            .or_insert_with(HashMap::new)
            .insert(normalize(attr), Some(pattern));
        self
    }

    /// Like `elem_attr_match`, compiling the pattern first.
    pub fn elem_attr_pattern(self, elem: &str, attr: &str, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(SanitizeError::InvalidPattern)?;
        Ok(self.elem_attr_match(elem, attr, pattern))
    }

    pub fn global_attr<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_attributes
            .extend(attrs.into_iter().map(|attr| normalize(attr.as_ref())));
        self
    }

    /// Marks elements whose children get the same paragraph wrapping as top level content.
    pub fn wrap_text_inside<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.wrap_text_inside
            .extend(names.into_iter().map(|name| normalize(name.as_ref())));
        self
    }

    pub fn deny_elem<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.allowed_elements.remove(&normalize(name.as_ref()));
        }
        self
    }

    pub fn deny_elem_attr<I, S>(mut self, elem: &str, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(allowed) = self.allowed_elements.get_mut(&normalize(elem)) {
            for attr in attrs {
                allowed.remove(&normalize(attr.as_ref()));
            }
        }
        self
    }

    pub fn deny_global_attr<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for attr in attrs {
            self.allowed_attributes.remove(&normalize(attr.as_ref()));
        }
        self
    }

    pub fn escape_comments(mut self, escape: bool) -> Self {
        self.escape_comments = escape;
        self
    }

    pub fn wrap_text(mut self, wrap: bool) -> Self {
        self.wrap_text = wrap;
        self
    }

    pub fn allow_javascript_url(mut self, allow: bool) -> Self {
        self.allow_javascript_url = allow;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn validate_url<F>(mut self, validate: F) -> Self
    where
        F: Fn(&CheckedUrl) -> bool + Send + Sync + 'static,
    {
        self.validate_url = Some(Arc::new(validate));
        self
    }

    pub fn allows_element(&self, name: &LocalName) -> bool {
        self.allowed_elements.contains_key(name)
    }

    /// Whether `attr` may appear on `elem`, either through the element's own set or globally.
    pub fn allows_attribute(&self, elem: &LocalName, attr: &LocalName) -> bool {
        self.allowed_attributes.contains(attr)
            || self
                .allowed_elements
                .get(elem)
                .map_or(false, |allowed| allowed.contains_key(attr))
    }

    pub fn attribute_pattern(&self, elem: &LocalName, attr: &LocalName) -> Option<&Regex> {
        self.allowed_elements
            .get(elem)
            .and_then(|allowed| allowed.get(attr))
            .and_then(Option::as_ref)
    }

    pub fn is_wrap_root(&self, name: &LocalName) -> bool {
        self.wrap_text_inside.contains(name)
    }
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        DEFAULT_CONFIG.clone()
    }
}

impl fmt::Debug for SanitizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut elements = self
            .allowed_elements
            .keys()
            .map(|name| &**name)
            .collect::<Vec<&str>>();
        elements.sort();
        f.debug_struct("SanitizerConfig")
            .field("allowed_elements", &elements)
            .field("allowed_attributes", &self.allowed_attributes)
            .field("allow_javascript_url", &self.allow_javascript_url)
            .field("validate_url", &self.validate_url.is_some())
            .field("escape_comments", &self.escape_comments)
            .field("wrap_text", &self.wrap_text)
            .field("wrap_text_inside", &self.wrap_text_inside)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_config_allows_nothing() {
        let config = SanitizerConfig::empty();
        assert!(!config.allows_element(&local_name!("p")));
        assert!(!config.allows_attribute(&local_name!("p"), &local_name!("title")));
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn names_are_lowercased() {
        let config = SanitizerConfig::empty()
            .elem(vec!["P", "Custom-Element"])
            .global_attr(vec!["TITLE"]);
        assert!(config.allows_element(&local_name!("p")));
        assert!(config.allows_element(&LocalName::from("custom-element")));
        assert!(config.allows_attribute(&local_name!("p"), &local_name!("title")));
    }

    #[test]
    fn element_attributes_are_per_element() {
        let config = SanitizerConfig::empty()
            .elem_attr("a", vec!["href"])
            .elem(vec!["p"]);
        assert!(config.allows_attribute(&local_name!("a"), &local_name!("href")));
        assert!(!config.allows_attribute(&local_name!("p"), &local_name!("href")));
    }

    #[test]
    fn elem_attr_keeps_existing_pattern() {
        let config = SanitizerConfig::empty()
            .elem_attr_match("p", "title", Regex::new("or").unwrap())
            .elem_attr("p", vec!["title"]);
        let pattern = config
            .attribute_pattern(&local_name!("p"), &local_name!("title"))
            .unwrap();
        assert_eq!(pattern.as_str(), "or");
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let result = SanitizerConfig::empty().elem_attr_pattern("p", "title", "(");
        assert!(matches!(result, Err(SanitizeError::InvalidPattern(_))));
    }

    #[test]
    fn deny_operations_undo_allows() {
        let config = SanitizerConfig::default()
            .deny_elem(vec!["img"])
            .deny_elem_attr("a", vec!["href"])
            .deny_global_attr(vec!["title"]);
        assert!(!config.allows_element(&local_name!("img")));
        assert!(config.allows_element(&local_name!("a")));
        assert!(!config.allows_attribute(&local_name!("a"), &local_name!("href")));
        assert!(!config.allows_attribute(&local_name!("b"), &local_name!("title")));
    }

    #[test]
    fn deny_elem_attr_on_unknown_element_is_a_no_op() {
        let config = SanitizerConfig::empty().deny_elem_attr("p", vec!["title"]);
        assert!(!config.allows_element(&local_name!("p")));
    }

    #[test]
    fn wrap_roots() {
        let config = SanitizerConfig::empty().wrap_text_inside(vec!["BlockQuote"]);
        assert!(config.is_wrap_root(&local_name!("blockquote")));
        assert!(!config.is_wrap_root(&local_name!("div")));
    }
}
