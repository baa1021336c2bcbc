//! Sanitizes untrusted HTML fragments down to an allow-list of elements and attributes.
//!
//! ```
//! use htmlcleaner::{sanitize, DEFAULT_CONFIG};
//!
//! assert_eq!(
//!     sanitize(&DEFAULT_CONFIG, "<a href=\"javascript:alert(1)\" title=\"x\">hi</a><script>"),
//!     "<a title=\"x\">hi</a>&lt;script&gt;&lt;/script&gt;"
//! );
//! ```
#![warn(clippy::all)]
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate html5ever;
#[macro_use]
extern crate maplit;
extern crate typed_arena;

pub mod arena_dom;
pub mod config;
pub mod depth;
pub mod error;
pub mod preprocess;
mod repair;
pub mod sanitizer;
pub mod url_check;

pub use config::{SanitizerConfig, DEFAULT_CONFIG, RESTRICTED_CONFIG};
pub use error::{Result, SanitizeError};
pub use preprocess::preprocess;
pub use sanitizer::{render, Sanitizer};
pub use url_check::{safe_url_scheme, CheckedUrl};

/// Sanitizes `input` with a throwaway arena. Never fails.
pub fn sanitize(config: &SanitizerConfig, input: &str) -> String {
    let arena = typed_arena::Arena::new();
    Sanitizer::new(&arena, config).sanitize(input)
}

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    #[test]
    fn preprocess_then_sanitize() {
        let empty = SanitizerConfig::empty();
        let input = "<p>Hello</p>";
        assert_eq!(
            sanitize(&empty, &preprocess(&empty, input)),
            "&lt;p&gt;Hello&lt;/p&gt;"
        );

        let with_p = empty.elem(vec!["p"]);
        assert_eq!(sanitize(&with_p, &preprocess(&with_p, input)), input);
    }

    #[test]
    fn preprocessed_custom_elements() {
        let input = "<custom-element title=\"World\">Hello</custom-element>";
        let config = SanitizerConfig::empty().elem(vec!["custom-element"]);
        assert_eq!(
            sanitize(&config, &preprocess(&config, input)),
            "<custom-element>Hello</custom-element>"
        );
        let config = config.elem_attr("custom-element", vec!["title"]);
        assert_eq!(sanitize(&config, &preprocess(&config, input)), input);
    }

    #[test]
    fn restricted_preset() {
        assert_eq!(
            sanitize(
                &RESTRICTED_CONFIG,
                "<strong title=\"t\">hi</strong><!-- x --><a href=\"http://a/\">a</a>"
            ),
            "<strong>hi</strong>&lt;!-- x --&gt;&lt;a href=\"http://a/\"&gt;a&lt;/a&gt;"
        );
    }

    #[test]
    fn output_only_contains_allowed_elements() {
        let config = SanitizerConfig::empty().elem(vec!["b"]);
        let output = sanitize(
            &config,
            "<b><i>x</i><img src=x onerror=alert(1)><svg><script>y</script></svg></b>",
        );
        let arena = typed_arena::Arena::new();
        let sanitizer = Sanitizer::new(&arena, &config);
        let mut pending = sanitizer.parse(&output);
        while let Some(node) = pending.pop() {
            if let Some(name) = node.element_name() {
                assert_eq!(name.local, local_name!("b"));
                assert!(node.children().all(|child| child.element_name().is_none()));
            }
            pending.extend(node.children());
        }
    }

    #[test]
    fn one_config_shared_between_threads() {
        let config = Arc::new(SanitizerConfig::default().wrap_text(true));
        let handles = (0..4)
            .map(|i| {
                let config = Arc::clone(&config);
                thread::spawn(move || sanitize(&config, &format!("<b>{}</b><script>", i)))
            })
            .collect::<Vec<_>>();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(
                handle.join().unwrap(),
                format!("<p><b>{}</b>&lt;script&gt;&lt;/script&gt;</p>", i)
            );
        }
    }
}
