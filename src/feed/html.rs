//! HTML scanning for feed candidates.
//!
//! Collects `href` values in document order; resolution against the page's
//! base URL happens in the discovery step. Parsing follows the HTML5 rules
//! (html5ever via `scraper`), so unquoted attributes, character references
//! and script contents are handled the way a browser handles them.
use crate::config::FinderConfig;
use scraper::{ElementRef, Html};
use thiserror::Error;

/// Errors that can occur while interpreting a response body as HTML.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body contains NUL bytes, so it is binary rather than markup.
    #[error("response body is not text")]
    NotText,
}

/// Candidate hrefs found in one document, entity-decoded but not yet resolved.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScannedPage {
    /// `href` of the first `<base>` element that has one.
    pub base_href: Option<String>,
    /// `<link rel="alternate">` hrefs with a feed MIME type.
    pub feed_links: Vec<String>,
    /// `<a>` hrefs containing one of the anchor keywords.
    pub feedlike_anchors: Vec<String>,
}

/// Parses `body` and collects feed candidates according to `config`.
///
/// Invalid UTF-8 is replaced rather than rejected and malformed markup is
/// recovered the way browsers recover it; only binary content produces a
/// [`ParseError`].
pub fn scan_html(body: &[u8], config: &FinderConfig) -> Result<ScannedPage, ParseError> {
    if body.contains(&0) {
        return Err(ParseError::NotText);
    }

    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    let feed_types: Vec<String> = config
        .feed_types
        .iter()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    let keywords: Vec<String> = config
        .anchor_keywords
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let mut scanned = ScannedPage::default();

    // Pre-order traversal is document order
    let elements = document
        .tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| !in_template(el));

    for el in elements {
        match el.value().name() {
            "base" => {
                if scanned.base_href.is_none() {
                    scanned.base_href = attr(&el, "href").map(str::to_owned);
                }
            }
            "link" => {
                if let Some(href) = attr(&el, "href").filter(|_| is_feed_link(&el, &feed_types)) {
                    scanned.feed_links.push(href.to_owned());
                }
            }
            "a" => {
                if let Some(href) = attr(&el, "href") {
                    let lowered = href.to_lowercase();
                    if keywords.iter().any(|k| lowered.contains(k.as_str())) {
                        scanned.feedlike_anchors.push(href.to_owned());
                    }
                }
            }
            _ => {}
        }
    }

    tracing::debug!(
        links = scanned.feed_links.len(),
        anchors = scanned.feedlike_anchors.len(),
        base = scanned.base_href.as_deref().unwrap_or("-"),
        "Scanned HTML"
    );

    Ok(scanned)
}

/// `rel` must contain the `alternate` token and `type` must be a feed type.
fn is_feed_link(el: &ElementRef<'_>, feed_types: &[String]) -> bool {
    let is_alternate = attr(el, "rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("alternate"))
    });
    if !is_alternate {
        return false;
    }

    attr(el, "type").is_some_and(|ty| {
        // Drop parameters such as "; charset=utf-8"
        let essence = ty.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        feed_types.iter().any(|t| *t == essence)
    })
}

/// Inert `<template>` content is not part of the rendered page.
fn in_template(el: &ElementRef<'_>) -> bool {
    el.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|parent| parent.name() == "template")
    })
}

/// Attribute lookup; empty values count as absent.
fn attr<'a>(el: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name).filter(|value| !value.trim().is_empty())
}
