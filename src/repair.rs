use std::collections::HashSet;

use html5ever::LocalName;
use tracing::debug;

use crate::arena_dom::{create_element, NodeData, Ref};
use crate::depth::limit_depth_below;
use crate::sanitizer::{render_node, Sanitizer};

lazy_static! {
    /// Elements that end a run of inline content.
    static ref BLOCK_ELEMENTS: HashSet<LocalName> = hashset! {
        local_name!("address"),
        local_name!("article"),
        local_name!("aside"),
        local_name!("blockquote"),
        local_name!("center"),
        local_name!("dd"),
        local_name!("details"),
        local_name!("dialog"),
        local_name!("dir"),
        local_name!("div"),
        local_name!("dl"),
        local_name!("dt"),
        local_name!("fieldset"),
        local_name!("figcaption"),
        local_name!("figure"),
        local_name!("footer"),
        local_name!("form"),
        local_name!("h1"),
        local_name!("h2"),
        local_name!("h3"),
        local_name!("h4"),
        local_name!("h5"),
        local_name!("h6"),
        local_name!("header"),
        local_name!("hgroup"),
        local_name!("hr"),
        local_name!("li"),
        local_name!("listing"),
        local_name!("main"),
        local_name!("menu"),
        local_name!("nav"),
        local_name!("ol"),
        local_name!("p"),
        local_name!("plaintext"),
        local_name!("pre"),
        local_name!("section"),
        local_name!("summary"),
        local_name!("table"),
        local_name!("ul"),
        local_name!("xmp"),
    };
}

fn is_whitespace_text(node: Ref) -> bool {
    match node.data {
        NodeData::Text { ref contents } => {
            contents.borrow().chars().all(|c| c.is_ascii_whitespace())
        }
        _ => false,
    }
}

impl<'arena> Sanitizer<'arena> {
    /// Puts each `<li>` in `nodes` into its own `<ul>`. Does nothing if `ul` isn't allowed.
    ///
    /// `depth` is the level of the parent of `nodes`. The new list adds a level, so its
    /// contents are guarded again from there.
    pub(crate) fn wrap_list_items(
        &self,
        nodes: Vec<Ref<'arena>>,
        depth: usize,
    ) -> Vec<Ref<'arena>> {
        if !self.config.allows_element(&local_name!("ul")) {
            return nodes;
        }

        nodes
            .into_iter()
            .map(|node| {
                if node.is_element(&local_name!("li")) {
                    let list = create_element(self.arena, "ul");
                    list.append(node);
                    limit_depth_below(self.arena, list, depth + 1, self.config.max_depth);
                    list
                } else {
                    node
                }
            })
            .collect()
    }

    fn is_block(&self, node: Ref) -> bool {
        match node.element_name() {
            Some(name) => {
                BLOCK_ELEMENTS.contains(&name.local)
                    || name.local.contains('-')
                    || self.config.is_wrap_root(&name.local)
            }
            None => false,
        }
    }

    /// Groups runs of inline nodes between block elements into `<p>` elements. Does nothing if
    /// `p` isn't allowed. `depth` is the level of the parent of `nodes`, 0 at the top.
    pub(crate) fn wrap_text(&self, nodes: Vec<Ref<'arena>>, depth: usize) -> Vec<Ref<'arena>> {
        if !self.config.allows_element(&local_name!("p")) {
            return nodes;
        }

        let mut wrapped = Vec::with_capacity(nodes.len());
        let mut paragraph: Option<Ref<'arena>> = None;

        for node in nodes {
            if self.is_block(node) {
                if let Some(paragraph) = paragraph.take() {
                    wrapped.extend(self.flush_paragraph(paragraph, depth));
                }
                self.wrap_root_children(node, depth + 1);
                wrapped.push(node);
            } else if paragraph.is_none() && is_whitespace_text(node) {
                wrapped.push(node);
            } else {
                let arena = self.arena;
                paragraph
                    .get_or_insert_with(|| create_element(arena, "p"))
                    .append(node);
            }
        }

        if let Some(paragraph) = paragraph {
            wrapped.extend(self.flush_paragraph(paragraph, depth));
        }
        wrapped
    }

    fn wrap_root_children(&self, node: Ref<'arena>, depth: usize) {
        let is_root = node
            .element_name()
            .map_or(false, |name| self.config.is_wrap_root(&name.local));
        if !is_root {
            return;
        }

        let content = node.content_root();
        let children = content.children().collect::<Vec<_>>();
        for child in &children {
            child.detach();
        }
        for child in self.wrap_text(children, depth) {
            content.append(child);
        }
    }

    /// A paragraph can end up holding block content the parser nested inside inline elements.
    /// Round-tripping it through the parser splits that content into sibling paragraphs, which
    /// land at `depth + 1`.
    fn flush_paragraph(&self, paragraph: Ref<'arena>, depth: usize) -> Vec<Ref<'arena>> {
        let markup = render_node(paragraph);
        debug!(len = markup.len(), depth, "re-parsing wrapped paragraph");
        let root = self.parse_root(&markup);
        limit_depth_below(self.arena, root, depth, self.config.max_depth);
        let nodes = root
            .children()
            .map(|node| self.filter_node(node, depth + 1))
            .collect();
        self.wrap_list_items(nodes, depth)
    }
}
