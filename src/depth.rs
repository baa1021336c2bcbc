use tracing::debug;

use crate::arena_dom::{create_text, Arena, Ref};

/// Text left in place of a truncated subtree.
pub const OMITTED: &str = "[omitted]";

/// Truncates everything nested `max_depth` levels below `root`, where `root`'s children are
/// level 1. The first node reaching the limit is replaced with an [`OMITTED`] text node and the
/// siblings after it are removed. A `max_depth` of 0 leaves the tree alone.
///
/// Walks with an explicit stack so arbitrarily deep input can't overflow the call stack.
pub fn limit_depth<'arena>(arena: Arena<'arena>, root: Ref<'arena>, max_depth: usize) {
    limit_depth_below(arena, root, 0, max_depth)
}

/// Like [`limit_depth`] for a `root` that itself sits at level `root_depth` of a larger tree,
/// so its children are level `root_depth + 1`.
pub fn limit_depth_below<'arena>(
    arena: Arena<'arena>,
    root: Ref<'arena>,
    root_depth: usize,
    max_depth: usize,
) {
    if max_depth == 0 {
        return;
    }

    let mut stack = vec![(root.content_root(), root_depth)];
    while let Some((parent, depth)) = stack.pop() {
        let depth = depth + 1;
        let mut next = parent.first_child.get();
        while let Some(child) = next {
            if depth >= max_depth {
                debug!(depth, node = %child.data, "truncating deeply nested content");
                child.insert_before(create_text(arena, OMITTED));
                let mut doomed = Some(child);
                while let Some(node) = doomed {
                    doomed = node.next_sibling.get();
                    node.detach();
                }
                break;
            }
            next = child.next_sibling.get();
            stack.push((child.content_root(), depth));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::sanitizer::{render, Sanitizer};
    use crate::SanitizerConfig;

    fn limited(input: &str, max_depth: usize) -> String {
        let config = SanitizerConfig::empty();
        let arena = typed_arena::Arena::new();
        let sanitizer = Sanitizer::new(&arena, &config);
        let root = sanitizer.parse_root(input);
        limit_depth(&arena, root, max_depth);
        render(&root.children().collect::<Vec<_>>())
    }

    fn depth_of(node: Ref) -> usize {
        1 + node.children().map(depth_of).max().unwrap_or(0)
    }

    #[test]
    fn truncates_at_the_limit() {
        assert_eq!(
            limited("<b><i><u><s>x</s></u></i></b>", 3),
            "<b><i>[omitted]</i></b>"
        );
    }

    #[test]
    fn removes_siblings_after_the_truncation_point() {
        assert_eq!(limited("<b><i>a</i><u>b</u></b>c", 2), "<b>[omitted]</b>c");
    }

    #[test]
    fn top_level_truncation() {
        assert_eq!(limited("a<b>b</b>", 1), "[omitted]");
    }

    #[test]
    fn shallow_trees_are_untouched() {
        assert_eq!(limited("<b><i>x</i></b>", 4), "<b><i>x</i></b>");
        assert_eq!(limited("<b><i>x</i></b>", 3), "<b><i>[omitted]</i></b>");
    }

    #[test]
    fn zero_disables_the_limit() {
        let deep = "<b>".repeat(200);
        assert!(!limited(&deep, 0).contains(OMITTED));
    }

    #[test]
    fn nested_roots_count_their_own_depth() {
        let config = SanitizerConfig::empty();
        let arena = typed_arena::Arena::new();
        let sanitizer = Sanitizer::new(&arena, &config);
        let root = sanitizer.parse_root("<b><i>x</i></b>c");
        limit_depth_below(&arena, root, 1, 3);
        assert_eq!(
            render(&root.children().collect::<Vec<_>>()),
            "<b>[omitted]</b>c"
        );
    }

    #[test]
    fn bounds_pathological_nesting() {
        let config = SanitizerConfig::empty();
        let arena = typed_arena::Arena::new();
        let sanitizer = Sanitizer::new(&arena, &config);
        let root = sanitizer.parse_root(&"<span>".repeat(5000));
        limit_depth(&arena, root, 10);
        let deepest = root.children().map(depth_of).max().unwrap_or(0);
        assert_eq!(deepest, 10);
    }
}
