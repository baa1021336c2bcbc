use url::{ParseError, Position, Url};

/// Attributes whose values are loaded or followed as URLs.
pub fn is_url_attribute(name: &html5ever::LocalName) -> bool {
    *name == local_name!("href") || *name == local_name!("src") || *name == local_name!("poster")
}

lazy_static! {
    // Relative values are resolved against this to check and normalize them.
    static ref RELATIVE_BASE: Url =
        Url::parse("http://relative.invalid/").expect("static base URL parses");
}

/// An attribute value that parsed as a URL.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckedUrl {
    Absolute(Url),
    /// No scheme. Holds the percent-encoded relative reference.
    Relative(String),
}

fn is_dot_segment(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        "." | ".." | "%2e" | ".%2e" | "%2e." | "%2e%2e"
    )
}

/// Serializes `resolved` back into the same kind of relative reference as `value`. A relative
/// path with dot segments is returned as written, since resolving it folds those segments into
/// the placeholder base.
fn relative_reference(value: &str, resolved: &Url) -> String {
    let reference = value
        .trim_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect::<String>();
    let slashes = reference
        .chars()
        .take_while(|&c| c == '/' || c == '\\')
        .count();

    if slashes >= 2 {
        format!("//{}", &resolved[Position::BeforeUsername..])
    } else if slashes == 1 {
        resolved[Position::BeforePath..].to_owned()
    } else if reference.starts_with('?') {
        resolved[Position::AfterPath..].to_owned()
    } else if reference.starts_with('#') {
        resolved[Position::AfterQuery..].to_owned()
    } else {
        let path = reference.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
        if path.split(|c: char| c == '/' || c == '\\').any(is_dot_segment) {
            value.to_owned()
        } else {
            let absolute = &resolved[Position::BeforePath..];
            absolute.strip_prefix('/').unwrap_or(absolute).to_owned()
        }
    }
}

impl CheckedUrl {
    pub fn parse(value: &str) -> Option<CheckedUrl> {
        match Url::parse(value) {
            Ok(url) => Some(CheckedUrl::Absolute(url)),
            Err(ParseError::RelativeUrlWithoutBase) => RELATIVE_BASE
                .join(value)
                .ok()
                .map(|resolved| CheckedUrl::Relative(relative_reference(value, &resolved))),
            Err(_) => None,
        }
    }

    /// Empty for relative URLs.
    pub fn scheme(&self) -> &str {
        match self {
            CheckedUrl::Absolute(url) => url.scheme(),
            CheckedUrl::Relative(_) => "",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CheckedUrl::Absolute(url) => url.as_str(),
            CheckedUrl::Relative(value) => value,
        }
    }
}

/// http, https, mailto, data and relative URLs.
pub fn safe_url_scheme(url: &CheckedUrl) -> bool {
    matches!(url.scheme(), "http" | "https" | "mailto" | "data" | "")
}
