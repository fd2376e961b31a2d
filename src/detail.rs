//! Detail page of a single item.
//!
//! The page is a two column table of `label: value` rows followed by a free
//! form description living between an `<h2>Description</h2>` heading and the
//! next section heading.

use select::document::Document;
use select::node::Node;
use select::predicate::{Name, Predicate};

use crate::error::{Error, Result};
use crate::html::{self, Following, Heading};
use crate::record::Attributes;

pub const DESCRIPTION_HEADING: &str = "Description";

/// Section headings closing the description. "Quick Links" shows up first on
/// a few entries.
pub const STOP_HEADINGS: [&str; 3] = ["Admin", "Community", "Quick Links"];

const DESCRIPTION_START: Heading<'static> = Heading {
    level: 2,
    texts: &[DESCRIPTION_HEADING],
};

const DESCRIPTION_STOP: Heading<'static> = Heading {
    level: 2,
    texts: &STOP_HEADINGS,
};

pub fn parse(page: &str) -> Result<Attributes> {
    parse_document(&html::parse(page))
}

/// Full attribute mapping of a detail page, description included.
pub fn parse_document(document: &Document) -> Result<Attributes> {
    let mut attributes = attribute_table(document);
    attributes.set_description(description(document)?);
    Ok(attributes)
}

/// Every row with exactly two cells, later duplicates win.
pub fn attribute_table(document: &Document) -> Attributes {
    let mut attributes = Attributes::new();
    for row in document.find(Name("tr")) {
        let cells = row.find(Name("td")).collect::<Vec<_>>();
        let [label, value] = cells.as_slice() else {
            continue;
        };
        attributes.insert(cell_key(label), cell_value(value));
    }
    attributes
}

/// Label text with its trailing colons removed, whitespace is kept as is.
fn cell_key(cell: &Node) -> String {
    cell.text().trim_end_matches(':').to_string()
}

fn cell_value(cell: &Node) -> String {
    cell.find(Name("a"))
        .next()
        .and_then(|link| link.attr("href"))
        .map(str::to_string)
        .unwrap_or_else(|| cell.text())
}

/// Serialized markup between the description heading and the next section.
pub fn description(document: &Document) -> Result<String> {
    let heading = document
        .find(DESCRIPTION_START)
        .next()
        .ok_or_else(|| Error::structure(format!("no <h2>{DESCRIPTION_HEADING}</h2> heading")))?;
    Ok(DescriptionBlocks::after(document, &heading)
        .map(|node| node.html())
        .collect())
}

/// Top level nodes of a description, in document order.
///
/// Nodes are yielded whole, unless a stop heading is nested inside them in
/// which case their children are visited instead. The sequence ends on the
/// first stop heading or at the end of the document.
#[derive(Debug, Clone)]
pub struct DescriptionBlocks<'a> {
    following: Following<'a>,
    stopped: bool,
}

impl<'a> DescriptionBlocks<'a> {
    pub fn after(document: &'a Document, heading: &Node) -> Self {
        Self {
            following: Following::after(document, heading),
            stopped: false,
        }
    }
}

impl<'a> Iterator for DescriptionBlocks<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Node<'a>> {
        if self.stopped {
            return None;
        }
        while let Some(node) = self.following.next() {
            if DESCRIPTION_STOP.matches(&node) {
                self.stopped = true;
                return None;
            }
            if node.find(DESCRIPTION_STOP).next().is_none() {
                self.following.skip_subtree(&node);
                return Some(node);
            }
        }
        self.stopped = true;
        None
    }
}
