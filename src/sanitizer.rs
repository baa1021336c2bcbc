use std::io::{Read, Write};

use html5ever::serialize::{SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{parse_fragment, serialize, Attribute, LocalName, QualName};
use tracing::debug;

use crate::arena_dom::{
    create_element_with_attrs, create_text, Arena, Node, NodeData, Ref, Sink,
};
use crate::config::SanitizerConfig;
use crate::depth::{limit_depth, OMITTED};
use crate::error::Result;
use crate::url_check::{is_url_attribute, safe_url_scheme, CheckedUrl};

/// Runs one config over trees allocated in one arena.
///
/// Every tree this hands out is a fresh allocation; the nodes passed in are never modified.
#[derive(Clone, Copy)]
pub struct Sanitizer<'arena> {
    pub(crate) arena: Arena<'arena>,
    pub(crate) config: &'arena SanitizerConfig,
}

impl<'arena> Sanitizer<'arena> {
    pub fn new(arena: Arena<'arena>, config: &'arena SanitizerConfig) -> Sanitizer<'arena> {
        Sanitizer { arena, config }
    }

    pub fn config(&self) -> &'arena SanitizerConfig {
        self.config
    }

    /// Parses `input` as the contents of a `<body>` and returns the element holding the result.
    pub fn parse_root(&self, input: &str) -> Ref<'arena> {
        let document = parse_fragment(
            Sink::new(self.arena),
            Default::default(),
            QualName::new(None, ns!(html), local_name!("body")),
            vec![],
        )
        .one(StrTendril::from(input));
        document.first_child.get().unwrap_or(document)
    }

    pub fn parse(&self, input: &str) -> Vec<Ref<'arena>> {
        self.parse_root(input).children().collect()
    }

    /// Parse, limit depth, filter, repair and render.
    pub fn sanitize(&self, input: &str) -> String {
        let root = self.parse_root(input);
        limit_depth(self.arena, root, self.config.max_depth);
        let nodes = root.children().collect::<Vec<_>>();
        render(&self.sanitize_nodes(&nodes))
    }

    pub fn sanitize_fragment(&self, input: &mut impl Read, output: &mut impl Write) -> Result<()> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        let sanitized = self.sanitize(&String::from_utf8_lossy(&bytes));
        output.write_all(sanitized.as_bytes())?;
        Ok(())
    }

    /// Filters every node, then wraps stray list items and, if configured, inline content.
    pub fn sanitize_nodes(&self, nodes: &[Ref<'arena>]) -> Vec<Ref<'arena>> {
        let filtered = nodes
            .iter()
            .map(|&node| self.sanitize_node(node))
            .collect::<Vec<_>>();
        let listed = self.wrap_list_items(filtered, 0);
        if self.config.wrap_text {
            self.wrap_text(listed, 0)
        } else {
            listed
        }
    }

    /// Filters a single node and its subtree. No structural repair.
    pub fn sanitize_node(&self, node: Ref<'arena>) -> Ref<'arena> {
        self.filter_node(node, 1)
    }

    fn alloc(&self, data: NodeData<'arena>) -> Ref<'arena> {
        self.arena.alloc(Node::new(data))
    }

    pub(crate) fn filter_node(&self, node: Ref<'arena>, depth: usize) -> Ref<'arena> {
        let max_depth = self.config.max_depth;
        let too_deep = max_depth != 0 && depth >= max_depth;

        match node.data {
            NodeData::Text { ref contents } => create_text(self.arena, &contents.borrow()),
            _ if too_deep => {
                debug!(depth, node = %node.data, "truncating deeply nested content");
                create_text(self.arena, OMITTED)
            }
            NodeData::Comment { ref contents } => {
                if self.config.escape_comments {
                    create_text(self.arena, &render_node(node))
                } else {
                    self.alloc(NodeData::Comment {
                        contents: contents.clone(),
                    })
                }
            }
            NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => {
                debug!(node = %node.data, "demoting to text");
                create_text(self.arena, &render_node(node))
            }
            NodeData::Document => {
                let document = self.alloc(NodeData::Document);
                for child in node.children() {
                    document.append(self.filter_node(child, depth));
                }
                document
            }
            NodeData::Element {
                ref name,
                ref attrs,
                ..
            } => {
                if name.ns != ns!(html) {
                    debug!(element = %name.local, ns = %name.ns, "demoting foreign element to text");
                    return create_text(self.arena, &render_node(node));
                }
                if !self.config.allows_element(&name.local) {
                    debug!(element = %name.local, "demoting disallowed element to text");
                    return create_text(self.arena, &unescape_html(&render_node(node)));
                }

                let children = node
                    .content_root()
                    .children()
                    .map(|child| self.filter_node(child, depth + 1))
                    .collect::<Vec<_>>();
                let kept = self.filter_attributes(&name.local, &attrs.borrow());

                if name.local == local_name!("img")
                    && !kept.iter().any(|attr| attr.name.local == local_name!("src"))
                {
                    debug!("removing image without a source");
                    return create_text(self.arena, "");
                }

                let element = create_element_with_attrs(self.arena, name.clone(), kept);
                for child in children {
                    element.append(child);
                }
                element
            }
        }
    }

    fn filter_attributes(&self, element: &LocalName, attrs: &[Attribute]) -> Vec<Attribute> {
        attrs
            .iter()
            .filter_map(|attr| self.filter_attribute(element, attr))
            .collect()
    }

    fn filter_attribute(&self, element: &LocalName, attr: &Attribute) -> Option<Attribute> {
        let name = &attr.name.local;
        if attr.name.ns != ns!() {
            debug!(element = %element, attribute = %name, "dropping namespaced attribute");
            return None;
        }
        if !self.config.allows_attribute(element, name) {
            debug!(element = %element, attribute = %name, "dropping disallowed attribute");
            return None;
        }

        let mut value = attr.value.clone();
        if is_url_attribute(name) && !self.config.allow_javascript_url {
            let url = CheckedUrl::parse(&value).filter(|url| {
                safe_url_scheme(url)
                    && self
                        .config
                        .validate_url
                        .as_ref()
                        .map_or(true, |validate| validate(url))
            });
            match url {
                Some(url) => value = StrTendril::from(url.as_str()),
                None => {
                    debug!(element = %element, attribute = %name, "dropping rejected URL");
                    return None;
                }
            }
        }

        if let Some(pattern) = self.config.attribute_pattern(element, name) {
            if !pattern.is_match(&value) {
                debug!(element = %element, attribute = %name, "dropping attribute not matching its pattern");
                return None;
            }
        }

        Some(Attribute {
            name: attr.name.clone(),
            value,
        })
    }
}

fn serialize_into(output: &mut Vec<u8>, node: Ref) {
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    // Writing into a Vec can't fail; an error here is a bug in the tree.
    if let Err(err) = serialize(&mut *output, node, opts) {
        panic!("failed to serialize node into memory: {}", err);
    }
}

/// Serializes a sequence of sibling nodes as markup.
pub fn render(nodes: &[Ref]) -> String {
    let mut output = Vec::new();
    for node in nodes {
        serialize_into(&mut output, node);
    }
    String::from_utf8_lossy(&output).into_owned()
}

pub fn render_node(node: Ref) -> String {
    render(&[node])
}

/// Reverses the escaping the serializer applies to text and attribute values.
pub fn unescape_html(escaped: &str) -> String {
    const ENTITIES: &[(&str, &str)] = &[
        ("&amp;", "&"),
        ("&nbsp;", "\u{a0}"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
    ];

    let mut output = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(at) = rest.find('&') {
        output.push_str(&rest[..at]);
        rest = &rest[at..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, decoded)) => {
                output.push_str(decoded);
                rest = &rest[entity.len()..];
            }
            None => {
                output.push('&');
                rest = &rest[1..];
            }
        }
    }
    output.push_str(rest);
    output
}
