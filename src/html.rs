//! Tolerant HTML documents.
//!
//! Parsing goes through html5ever (via `select`) which never fails: unclosed
//! elements and stray attributes are recovered the way browsers do. Nodes are
//! stored in document order, so "the next node" is simply the next index.

use select::document::Document;
use select::node::Node;
use select::predicate::{Any, Name, Predicate};

/// Parses a whole HTML page.
pub fn parse(html: &str) -> Document {
    Document::from(html)
}

/// First element named `tag` carrying every `(attribute, value)` pair.
pub fn find_element<'a>(
    document: &'a Document,
    tag: &str,
    attrs: &[(&str, &str)],
) -> Option<Node<'a>> {
    document
        .find(Name(tag))
        .find(|node| attrs.iter().all(|(k, v)| node.attr(k) == Some(*v)))
}

/// Index of the first node that comes after `node` and all its descendants.
pub fn subtree_end(node: &Node) -> usize {
    node.find(Any).last().map_or(node.index(), |last| last.index()) + 1
}

/// Matches a heading of the given level whose trimmed text is one of `texts`.
#[derive(Debug, Clone, Copy)]
pub struct Heading<'s> {
    pub level: u8,
    pub texts: &'s [&'s str],
}

impl Predicate for Heading<'_> {
    fn matches(&self, node: &Node) -> bool {
        let tag = match self.level {
            1 => "h1",
            2 => "h2",
            3 => "h3",
            4 => "h4",
            5 => "h5",
            _ => "h6",
        };
        node.name() == Some(tag) && self.texts.contains(&node.text().trim())
    }
}

/// Nodes following a starting node in document order.
///
/// The starting node's own descendants are not part of the sequence.
#[derive(Debug, Clone)]
pub struct Following<'a> {
    document: &'a Document,
    next: usize,
}

impl<'a> Following<'a> {
    pub fn after(document: &'a Document, node: &Node) -> Self {
        Self {
            document,
            next: subtree_end(node),
        }
    }

    /// Jumps over the descendants of `node`, which must be the last yielded node.
    pub fn skip_subtree(&mut self, node: &Node) {
        self.next = self.next.max(subtree_end(node));
    }
}

impl<'a> Iterator for Following<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Node<'a>> {
        let node = self.document.nth(self.next)?;
        self.next += 1;
        Some(node)
    }
}
