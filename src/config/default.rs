use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::config::{SanitizerConfig, DEFAULT_MAX_DEPTH};

lazy_static! {
    pub static ref DEFAULT_CONFIG: SanitizerConfig = SanitizerConfig {
        allowed_elements: hashmap! {
            local_name!("a") => hashmap! {
                local_name!("href") => None,
            },
            local_name!("img") => hashmap! {
                local_name!("src") => None,
                local_name!("alt") => None,
            },
            local_name!("video") => hashmap! {
                local_name!("src") => None,
                local_name!("poster") => None,
                local_name!("controls") => None,
            },
            local_name!("audio") => hashmap! {
                local_name!("src") => None,
                local_name!("controls") => None,
            },

            local_name!("b") => no_attributes(),
            local_name!("i") => no_attributes(),
            local_name!("u") => no_attributes(),
            local_name!("s") => no_attributes(),

            local_name!("em") => no_attributes(),
            local_name!("strong") => no_attributes(),
            local_name!("strike") => no_attributes(),

            local_name!("big") => no_attributes(),
            local_name!("small") => no_attributes(),
            local_name!("sup") => no_attributes(),
            local_name!("sub") => no_attributes(),

            local_name!("ins") => no_attributes(),
            local_name!("del") => no_attributes(),

            local_name!("abbr") => no_attributes(),
            local_name!("address") => no_attributes(),
            local_name!("cite") => no_attributes(),
            local_name!("q") => no_attributes(),

            local_name!("p") => no_attributes(),
            local_name!("blockquote") => no_attributes(),

            local_name!("pre") => no_attributes(),
            local_name!("code") => no_attributes(),
            local_name!("kbd") => no_attributes(),
            local_name!("tt") => no_attributes(),

            local_name!("details") => no_attributes(),
            local_name!("summary") => no_attributes(),
        },
        allowed_attributes: hashset! {
            local_name!("title"),
        },
        allow_javascript_url: false,
        validate_url: None,
        escape_comments: false,
        wrap_text: false,
        wrap_text_inside: HashSet::new(),
        max_depth: DEFAULT_MAX_DEPTH,
    };
}

fn no_attributes() -> HashMap<html5ever::LocalName, Option<Regex>> {
    HashMap::new()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn links_and_images_carry_minimal_attributes() {
        let a = &DEFAULT_CONFIG.allowed_elements[&local_name!("a")];
        assert_eq!(a.len(), 1);
        assert!(a.contains_key(&local_name!("href")));

        let img = &DEFAULT_CONFIG.allowed_elements[&local_name!("img")];
        assert_eq!(img.len(), 2);
        assert!(DEFAULT_CONFIG.allows_attribute(&local_name!("b"), &local_name!("title")));
    }

    #[test]
    fn structural_options_are_off() {
        assert!(!DEFAULT_CONFIG.escape_comments);
        assert!(!DEFAULT_CONFIG.wrap_text);
        assert!(!DEFAULT_CONFIG.allow_javascript_url);
        assert!(!DEFAULT_CONFIG.allows_element(&local_name!("script")));
        assert!(!DEFAULT_CONFIG.allows_element(&local_name!("div")));
    }
}
