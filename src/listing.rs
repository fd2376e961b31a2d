//! Listing page: every item of the directory is an option of one selection
//! form, which submits to the detail page.

use std::slice;

use select::document::Document;
use select::predicate::Name;
use url::Url;

use crate::error::{Error, Result};
use crate::html;
use crate::record::Item;

/// `id` of the item selection form.
pub const SELECTION_FORM_ID: &str = "SelfSubmit";

/// Value of the "no selection" option.
pub const PLACEHOLDER_OPTION: &str = "Select";

/// Items in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemList {
    items: Vec<Item>,
}

impl ItemList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Item> {
        self.items.iter()
    }

    /// Case insensitive match on the identifier, or exact match on the detail URL.
    pub fn find(&self, query: &str) -> Option<&Item> {
        let lowered = query.to_lowercase();
        self.items
            .iter()
            .find(|item| item.id().to_lowercase() == lowered || item.db_url() == query)
    }
}

impl FromIterator<Item> for ItemList {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ItemList {
    type Item = &'a Item;
    type IntoIter = slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub fn parse(page: &str, page_url: &Url) -> Result<ItemList> {
    list_items(&html::parse(page), page_url)
}

/// Extracts `(identifier, detail URL)` pairs from the selection form.
///
/// Relative form targets are resolved against `page_url`.
pub fn list_items(document: &Document, page_url: &Url) -> Result<ItemList> {
    let form = html::find_element(document, "form", &[("id", SELECTION_FORM_ID)])
        .ok_or_else(|| Error::structure(format!("no form with id {SELECTION_FORM_ID:?}")))?;
    let action = form
        .attr("action")
        .ok_or_else(|| Error::structure(format!("form {SELECTION_FORM_ID:?} has no action")))?;
    let template = page_url
        .join(action)
        .map_err(|e| Error::structure(format!("form action {action:?} got: {e}")))?;

    let items = form
        .find(Name("option"))
        .map(|option| {
            option
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| option.text().trim().to_string())
        })
        .filter(|id| id != PLACEHOLDER_OPTION)
        .map(|id| {
            let mut db_url = template.clone();
            db_url.query_pairs_mut().append_pair("id", &id);
            Item::new(id, db_url.as_str())
        })
        .collect();

    Ok(items)
}
