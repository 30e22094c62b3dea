//! Document view over a fetched page
//!
//! Wraps a parsed `scraper::Html` together with the URL it was fetched from,
//! and offers the handful of queries the stage handlers need:
//! - first-match text extraction
//! - anchor discovery with link resolution
//! - list items joined from their child spans
//!
//! A `Document` is not `Send`; handlers build it, query it and drop it
//! without crossing an `.await`.

use crate::crawler::outcome::ExtractionGap;
use crate::url::{resolve_link, same_host};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Separator between the spans of one list item
pub const LIST_ITEM_JOINER: &str = ", ";

/// Parsed, queryable page
pub struct Document {
    html: Html,
    base_url: Url,
}

impl Document {
    /// Parses an HTML body fetched from `base_url`
    ///
    /// # Example
    ///
    /// ```
    /// use md_directory::crawler::Document;
    /// use url::Url;
    ///
    /// let base = Url::parse("https://example.com/directory/md").unwrap();
    /// let doc = Document::parse(r#"<h1 class="title"> Hi </h1>"#, &base);
    /// assert_eq!(doc.first_text(".title").unwrap(), Some("Hi".to_string()));
    /// ```
    pub fn parse(body: &str, base_url: &Url) -> Self {
        Self {
            html: Html::parse_document(body),
            base_url: base_url.clone(),
        }
    }

    /// Returns true if at least one element matches
    pub fn exists(&self, css: &str) -> Result<bool, ExtractionGap> {
        let selector = parse_selector(css)?;
        Ok(self.html.select(&selector).next().is_some())
    }

    /// Stripped text of the first matching element, if any
    pub fn first_text(&self, css: &str) -> Result<Option<String>, ExtractionGap> {
        let selector = parse_selector(css)?;
        Ok(self.html.select(&selector).next().map(element_text))
    }

    /// Stripped text of the first element matching `inner` below the first
    /// element matching `outer`
    ///
    /// `Ok(None)` when either level is missing.
    pub fn first_text_within(
        &self,
        outer: &str,
        inner: &str,
    ) -> Result<Option<String>, ExtractionGap> {
        let outer_selector = parse_selector(outer)?;
        let inner_selector = parse_selector(inner)?;

        Ok(self
            .html
            .select(&outer_selector)
            .next()
            .and_then(|section| section.select(&inner_selector).next())
            .map(element_text))
    }

    /// Raw `href` of the first anchor whose visible text equals `text`
    pub fn anchor_href_by_text(&self, text: &str) -> Result<Option<String>, ExtractionGap> {
        let selector = parse_selector("a[href]")?;
        let wanted = text.trim();

        Ok(self
            .html
            .select(&selector)
            .find(|anchor| element_text(*anchor) == wanted)
            .and_then(|anchor| anchor.value().attr("href"))
            .map(str::to_string))
    }

    /// Resolved targets of every anchor matching `css`, on the page's host
    ///
    /// Anchors without a usable href, or pointing at another host, are
    /// skipped. Document order is kept; duplicates are left to the frontier.
    pub fn links(&self, css: &str) -> Result<Vec<Url>, ExtractionGap> {
        let selector = parse_selector(css)?;
        Ok(self.resolve_anchors(self.html.select(&selector)))
    }

    /// Resolved targets of every anchor whose raw href contains `fragment`
    pub fn links_containing(&self, fragment: &str) -> Result<Vec<Url>, ExtractionGap> {
        let selector = parse_selector("a[href]")?;
        let anchors = self.html.select(&selector).filter(|anchor| {
            anchor
                .value()
                .attr("href")
                .is_some_and(|href| href.contains(fragment))
        });
        Ok(self.resolve_anchors(anchors))
    }

    /// One entry per element matching `item_css`: the stripped text of its
    /// descendants matching `child_css`, joined with `", "`
    ///
    /// An item without matching children yields an empty string.
    pub fn joined_items(
        &self,
        item_css: &str,
        child_css: &str,
    ) -> Result<Vec<String>, ExtractionGap> {
        let item_selector = parse_selector(item_css)?;
        let child_selector = parse_selector(child_css)?;

        Ok(self
            .html
            .select(&item_selector)
            .map(|item| {
                item.select(&child_selector)
                    .map(element_text)
                    .collect::<Vec<_>>()
                    .join(LIST_ITEM_JOINER)
            })
            .collect())
    }

    fn resolve_anchors<'a>(&self, anchors: impl Iterator<Item = ElementRef<'a>>) -> Vec<Url> {
        anchors
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter_map(|href| resolve_link(href, &self.base_url))
            .filter(|url| same_host(url, &self.base_url))
            .collect()
    }
}

/// Parses a CSS selector, reporting failures as an extraction gap
pub fn parse_selector(css: &str) -> Result<Selector, ExtractionGap> {
    Selector::parse(css).map_err(|e| ExtractionGap::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Text of an element: every text node trimmed, empty ones dropped,
/// the rest concatenated
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
