//! RSS 2.0 and Atom parsing into [`Article`]s.
//!
//! The document is read once with a namespace-aware reader into a small
//! element tree, classified by its root element into a [`FeedDocument`],
//! then mapped field by field. Only elements in the format's own namespace
//! are mapped (plus `dc:creator` and `content:encoded` for RSS), so
//! extension elements such as `itunes:title`, `media:title` or an item-level
//! `atom:link` never shadow the core fields. Text fields take all the text
//! under the element, markup included, so mixed or XHTML content reads as
//! plain text.
//!
//! SEC-002: `quick-xml` (0.37) never expands `<!ENTITY>` declarations; custom
//! entities (and HTML ones like `&nbsp;`) fail the parse instead of being
//! resolved.

use chrono::{DateTime, Utc};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;

use crate::storage::Article;

/// Title used for items that carry none
const UNTITLED: &str = "Untitled";

/// SEC-003: Deepest element nesting accepted in a feed document
const MAX_DEPTH: usize = 64;

const ATOM_NS: &[u8] = b"http://www.w3.org/2005/Atom";
const DUBLIN_CORE_NS: &[u8] = b"http://purl.org/dc/elements/1.1/";
const CONTENT_NS: &[u8] = b"http://purl.org/rss/1.0/modules/content/";

#[derive(Debug, Error)]
pub enum ParseError {
    /// Document is not well-formed XML
    #[error("XML parse error: {0}")]
    Xml(String),
    /// SEC-003: element nesting deeper than [`MAX_DEPTH`]
    #[error("Feed nesting depth exceeds maximum of {0} levels")]
    TooDeep(usize),
    /// Root element is neither `<rss>` with a `<channel>` nor `<feed>`
    #[error("Unsupported feed format (root element: {0:?})")]
    UnsupportedFormat(String),
}

impl From<AttrError> for ParseError {
    fn from(e: AttrError) -> Self {
        ParseError::Xml(e.to_string())
    }
}

/// Articles extracted from a feed, plus how many entries were dropped for
/// lacking a usable URL.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub articles: Vec<Article>,
    pub skipped: usize,
}

// ============================================================================
// Element tree
// ============================================================================

/// Namespaces the mapping cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    /// No namespace (core RSS 2.0)
    None,
    Atom,
    DublinCore,
    Content,
    Other,
}

impl Ns {
    fn resolve(result: &ResolveResult<'_>) -> Self {
        match result {
            ResolveResult::Unbound => Ns::None,
            ResolveResult::Bound(Namespace(uri)) => {
                if *uri == ATOM_NS {
                    Ns::Atom
                } else if *uri == DUBLIN_CORE_NS {
                    Ns::DublinCore
                } else if *uri == CONTENT_NS {
                    Ns::Content
                } else {
                    Ns::Other
                }
            }
            // Undeclared prefix; a few feeds use dc: and content: without xmlns
            ResolveResult::Unknown(prefix) => match prefix.as_slice() {
                b"dc" => Ns::DublinCore,
                b"content" => Ns::Content,
                _ => Ns::Other,
            },
        }
    }

    /// Atom elements, including documents that omit the Atom xmlns
    fn is_atom(self) -> bool {
        matches!(self, Ns::Atom | Ns::None)
    }
}

#[derive(Debug)]
enum Node {
    Text(String),
    Element(Element),
}

#[derive(Debug)]
struct Element {
    ns: Ns,
    /// Local name, prefix stripped
    name: String,
    /// Unprefixed attributes, by local name
    attrs: Vec<(String, String)>,
    nodes: Vec<Node>,
}

impl Element {
    fn open(ns: Ns, start: &BytesStart<'_>, reader: &NsReader<&[u8]>) -> Result<Self, ParseError> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            if attr.key.prefix().is_some() {
                continue;
            }
            let value = attr
                .decode_and_unescape_value(reader.decoder())
                .map_err(|e| xml_error(reader, e))?;
            attrs.push((
                String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned(),
                value.into_owned(),
            ));
        }

        Ok(Self {
            ns,
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            attrs,
            nodes: Vec::new(),
        })
    }

    fn children(&self) -> impl Iterator<Item = &Element> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    fn child(&self, ns: Ns, name: &str) -> Option<&Element> {
        self.children().find(|c| c.ns == ns && c.name == name)
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All text under this element, in document order
    fn text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => element.push_text(out),
            }
        }
    }

    fn trimmed_text(&self) -> Option<String> {
        non_blank(&self.text())
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn xml_error(reader: &NsReader<&[u8]>, e: quick_xml::Error) -> ParseError {
    ParseError::Xml(format!("{e} (at byte {})", reader.buffer_position()))
}

/// Read the whole document into a tree. `Ok(None)` when there is no root
/// element. Anything after the root element is ignored.
fn read_tree(xml: &str) -> Result<Option<Element>, ParseError> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let (ns, event) = match reader.read_resolved_event() {
            Ok((resolved, event)) => (Ns::resolve(&resolved), event),
            Err(e) => return Err(xml_error(&reader, e)),
        };

        match event {
            Event::Start(start) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(ParseError::TooDeep(MAX_DEPTH));
                }
                stack.push(Element::open(ns, &start, &reader)?);
            }
            Event::Empty(start) => {
                let element = Element::open(ns, &start, &reader)?;
                if let Some(root) = close(&mut stack, element) {
                    return Ok(Some(root));
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    ParseError::Xml(format!(
                        "unexpected closing tag (at byte {})",
                        reader.buffer_position()
                    ))
                })?;
                if let Some(root) = close(&mut stack, element) {
                    return Ok(Some(root));
                }
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| xml_error(&reader, e))?;
                    parent.nodes.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .nodes
                        .push(Node::Text(String::from_utf8_lossy(&data).into_owned()));
                }
            }
            Event::Eof if stack.is_empty() => return Ok(None),
            Event::Eof => {
                return Err(ParseError::Xml(format!(
                    "document ends inside <{}>",
                    stack.last().map(|e| e.name.as_str()).unwrap_or_default()
                )));
            }
            _ => {}
        }
    }
}

/// Attach a finished element to its parent, or hand it back as the root.
fn close(stack: &mut [Element], element: Element) -> Option<Element> {
    match stack.last_mut() {
        Some(parent) => {
            parent.nodes.push(Node::Element(element));
            None
        }
        None => Some(element),
    }
}

// ============================================================================
// Document shapes
// ============================================================================

/// A feed document, classified by its root element.
#[derive(Debug)]
pub enum FeedDocument {
    Rss(RssChannel),
    Atom(AtomFeed),
    /// Holds the local name of the root element (empty when there is none)
    Unrecognized(String),
}

#[derive(Debug, Default)]
pub struct RssChannel {
    items: Vec<RssItem>,
}

#[derive(Debug, Default)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    description: Option<String>,
    /// `content:encoded`
    content: Option<String>,
    author: Option<String>,
    /// `dc:creator`
    creator: Option<String>,
    pub_date: Option<String>,
    categories: Vec<String>,
}

/// Keep the first non-blank value among repeated elements
fn fill(slot: &mut Option<String>, element: &Element) {
    if slot.is_none() {
        *slot = element.trimmed_text();
    }
}

impl RssChannel {
    fn from_element(channel: &Element) -> Self {
        let items = channel
            .children()
            .filter(|c| c.ns == Ns::None && c.name == "item")
            .map(RssItem::from_element)
            .collect();
        Self { items }
    }
}

impl RssItem {
    fn from_element(item: &Element) -> Self {
        let mut out = Self::default();
        for child in item.children() {
            match (child.ns, child.name.as_str()) {
                (Ns::None, "title") => fill(&mut out.title, child),
                (Ns::None, "link") => fill(&mut out.link, child),
                (Ns::None, "guid") => fill(&mut out.guid, child),
                (Ns::None, "description") => fill(&mut out.description, child),
                (Ns::None, "author") => fill(&mut out.author, child),
                (Ns::None, "pubDate") => fill(&mut out.pub_date, child),
                (Ns::None, "category") => out.categories.extend(child.trimmed_text()),
                (Ns::Content, "encoded") => fill(&mut out.content, child),
                (Ns::DublinCore, "creator") => fill(&mut out.creator, child),
                _ => {}
            }
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct AtomFeed {
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Default)]
struct AtomEntry {
    id: Option<String>,
    title: Option<String>,
    /// Link targets in document order
    links: Vec<String>,
    updated: Option<String>,
    published: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    author: Option<String>,
    categories: Vec<String>,
}

impl AtomFeed {
    fn from_element(feed: &Element) -> Self {
        let entries = feed
            .children()
            .filter(|c| c.ns.is_atom() && c.name == "entry")
            .map(AtomEntry::from_element)
            .collect();
        Self { entries }
    }
}

impl AtomEntry {
    fn from_element(entry: &Element) -> Self {
        let mut out = Self::default();
        for child in entry.children().filter(|c| c.ns.is_atom()) {
            match child.name.as_str() {
                "id" => fill(&mut out.id, child),
                "title" => fill(&mut out.title, child),
                "updated" => fill(&mut out.updated, child),
                "published" => fill(&mut out.published, child),
                "summary" => fill(&mut out.summary, child),
                "content" => fill(&mut out.content, child),
                // `href` attribute, falling back to the element text
                "link" => out.links.extend(
                    child
                        .attr("href")
                        .and_then(non_blank)
                        .or_else(|| child.trimmed_text()),
                ),
                "author" if out.author.is_none() => {
                    out.author = child
                        .children()
                        .find(|c| c.ns.is_atom() && c.name == "name")
                        .and_then(Element::trimmed_text);
                }
                // `term` attribute, or the bare element text when there is none
                "category" => out.categories.extend(match child.attr("term") {
                    Some(term) => non_blank(term),
                    None => child.trimmed_text(),
                }),
                _ => {}
            }
        }
        out
    }
}

impl FeedDocument {
    /// Read and classify a feed document.
    pub fn from_xml(xml: &str) -> Result<Self, ParseError> {
        let Some(root) = read_tree(xml)? else {
            return Ok(FeedDocument::Unrecognized(String::new()));
        };

        let document = match (root.ns, root.name.as_str()) {
            (Ns::None, "rss") => match root.child(Ns::None, "channel") {
                Some(channel) => FeedDocument::Rss(RssChannel::from_element(channel)),
                None => FeedDocument::Unrecognized(root.name.clone()),
            },
            (ns, "feed") if ns.is_atom() => FeedDocument::Atom(AtomFeed::from_element(&root)),
            _ => FeedDocument::Unrecognized(root.name.clone()),
        };
        Ok(document)
    }
}

// ============================================================================
// Mapping
// ============================================================================

/// Parse RSS 2.0 or Atom XML into articles.
///
/// # Errors
///
/// - [`ParseError::Xml`] - Malformed XML; nothing is recovered
/// - [`ParseError::TooDeep`] - Elements nested beyond the safety limit
/// - [`ParseError::UnsupportedFormat`] - Neither an RSS channel nor an Atom feed
pub fn parse_feed(xml: &str) -> Result<ParseResult, ParseError> {
    match FeedDocument::from_xml(xml)? {
        FeedDocument::Rss(channel) => Ok(collect(channel.items.into_iter().map(rss_article))),
        FeedDocument::Atom(feed) => Ok(collect(feed.entries.into_iter().map(atom_article))),
        FeedDocument::Unrecognized(root) => Err(ParseError::UnsupportedFormat(root)),
    }
}

fn collect(items: impl Iterator<Item = Option<Article>>) -> ParseResult {
    let mut result = ParseResult::default();
    for item in items {
        match item {
            Some(article) => result.articles.push(article),
            None => result.skipped += 1,
        }
    }
    result
}

fn rss_article(item: RssItem) -> Option<Article> {
    let url = item.link?;
    let guid = item.guid.unwrap_or_else(|| url.clone());

    Some(Article {
        guid,
        title: item.title.unwrap_or_else(|| UNTITLED.to_string()),
        description: item.description.or(item.content),
        author: item.author.or(item.creator),
        published_at: item.pub_date.as_deref().and_then(parse_date),
        categories: item.categories,
        url,
    })
}

fn atom_article(entry: AtomEntry) -> Option<Article> {
    // First link wins, whatever its rel
    let url = entry.links.into_iter().next()?;
    let guid = entry.id.unwrap_or_else(|| url.clone());

    Some(Article {
        guid,
        title: entry.title.unwrap_or_else(|| UNTITLED.to_string()),
        description: entry.summary.or(entry.content),
        author: entry.author,
        published_at: entry
            .updated
            .or(entry.published)
            .as_deref()
            .and_then(parse_date),
        categories: entry.categories,
        url,
    })
}

/// Parse RFC 2822 (RSS) or RFC 3339 (Atom) dates; anything else is unknown.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc));
    match parsed {
        Ok(dt) => Some(dt),
        Err(e) => {
            tracing::debug!(date = %raw, error = %e, "Unparseable feed date");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const MINIMAL_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <link>https://example.com</link>
    <item>
      <title>Hello</title>
      <link>https://example.com/hello</link>
      <guid isPermaLink="false">hello-1</guid>
      <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
      <category>rust</category>
    </item>
  </channel>
</rss>"#;

    const MINIMAL_ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <entry>
    <id>urn:uuid:1225c695</id>
    <title type="html">Atom Entry</title>
    <link rel="alternate" href="https://example.com/atom-entry"/>
    <updated>2024-03-05T12:30:00Z</updated>
    <summary>Short summary</summary>
    <author><name>Ada</name></author>
    <category term="databases"/>
    <category term="sqlite"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_minimal_rss() {
        let result = parse_feed(MINIMAL_RSS).unwrap();
        assert_eq!(result.skipped, 0);
        assert_eq!(result.articles.len(), 1);

        let article = &result.articles[0];
        assert_eq!(article.guid, "hello-1");
        assert_eq!(article.url, "https://example.com/hello");
        assert_eq!(article.title, "Hello");
        assert_eq!(
            article.published_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(article.categories, vec!["rust".to_string()]);
    }

    #[test]
    fn test_parse_minimal_atom() {
        let result = parse_feed(MINIMAL_ATOM).unwrap();
        assert_eq!(result.articles.len(), 1);

        let article = &result.articles[0];
        assert_eq!(article.guid, "urn:uuid:1225c695");
        assert_eq!(article.url, "https://example.com/atom-entry");
        assert_eq!(article.title, "Atom Entry");
        assert_eq!(article.description.as_deref(), Some("Short summary"));
        assert_eq!(article.author.as_deref(), Some("Ada"));
        assert_eq!(
            article.categories,
            vec!["databases".to_string(), "sqlite".to_string()]
        );
        assert_eq!(
            article.published_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_rss_guid_falls_back_to_link() {
        let xml = r#"<rss version="2.0"><channel>
            <item><title>No guid</title><link>https://example.com/no-guid</link></item>
        </channel></rss>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(result.articles[0].guid, "https://example.com/no-guid");
        assert!(result.articles[0].published_at.is_none());
    }

    #[test]
    fn test_rss_multiple_items_and_categories() {
        let xml = r#"<rss version="2.0"><channel>
            <item><link>https://example.com/1</link><category>a</category><category>b</category></item>
            <item><link>https://example.com/2</link></item>
            <item><link>https://example.com/3</link></item>
        </channel></rss>"#;
        let result = parse_feed(xml).unwrap();
        let urls: Vec<&str> = result.articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3"
            ]
        );
        assert_eq!(result.articles[0].categories, vec!["a", "b"]);
        assert!(result.articles[1].categories.is_empty());
        assert_eq!(result.articles[1].title, "Untitled");
    }

    #[test]
    fn test_rss_item_without_link_is_skipped() {
        let xml = r#"<rss version="2.0"><channel>
            <item><title>Orphan</title><guid>orphan</guid></item>
            <item><title>Kept</title><link>https://example.com/kept</link></item>
        </channel></rss>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.articles[0].title, "Kept");
    }

    #[test]
    fn test_rss_cdata_description_and_creator() {
        let xml = r#"<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/"><channel>
            <item>
              <link>https://example.com/cdata</link>
              <description><![CDATA[<p>Rich <b>text</b></p>]]></description>
              <dc:creator>Grace</dc:creator>
            </item>
        </channel></rss>"#;
        let result = parse_feed(xml).unwrap();
        let article = &result.articles[0];
        assert_eq!(
            article.description.as_deref(),
            Some("<p>Rich <b>text</b></p>")
        );
        assert_eq!(article.author.as_deref(), Some("Grace"));
    }

    #[test]
    fn test_rss_invalid_date_is_unknown() {
        let xml = r#"<rss version="2.0"><channel>
            <item><link>https://example.com/d</link><pubDate>sometime last week</pubDate></item>
        </channel></rss>"#;
        let result = parse_feed(xml).unwrap();
        assert!(result.articles[0].published_at.is_none());
    }

    #[test]
    fn test_rss_empty_channel() {
        let xml = r#"<rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
        let result = parse_feed(xml).unwrap();
        assert!(result.articles.is_empty());
        assert_eq!(result.skipped, 0);
    }

    #[test]
    fn test_atom_first_link_wins() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <id>e1</id>
            <link rel="self" href="https://example.com/self"/>
            <link rel="alternate" href="https://example.com/alternate"/>
          </entry>
        </feed>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(result.articles[0].url, "https://example.com/self");
    }

    #[test]
    fn test_atom_link_text_and_bare_category() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <id>e2</id>
            <link>https://example.com/text-link</link>
            <category>plain</category>
          </entry>
        </feed>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(result.articles[0].url, "https://example.com/text-link");
        assert_eq!(result.articles[0].categories, vec!["plain"]);
    }

    #[test]
    fn test_atom_published_used_when_updated_missing() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <id>e3</id>
            <link href="https://example.com/e3"/>
            <published>2023-12-31T23:59:59+01:00</published>
          </entry>
        </feed>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(
            result.articles[0].published_at,
            Some(Utc.with_ymd_and_hms(2023, 12, 31, 22, 59, 59).unwrap())
        );
    }

    #[test]
    fn test_atom_entry_without_link_is_skipped() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry><id>no-link</id></entry>
        </feed>"#;
        let result = parse_feed(xml).unwrap();
        assert!(result.articles.is_empty());
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn test_unsupported_root_element() {
        let err = parse_feed("<html><body>Not a feed</body></html>").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(ref root) if root == "html"));
        assert!(err.to_string().contains("Unsupported feed format"));
    }

    #[test]
    fn test_rss_without_channel_is_unsupported() {
        let err = parse_feed(r#"<rss version="2.0"></rss>"#).unwrap_err();
        assert!(err.to_string().contains("Unsupported feed format"));
    }

    #[test]
    fn test_no_root_element_is_unsupported() {
        let err = parse_feed("just some text").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let err = parse_feed("<not valid xml").unwrap_err();
        assert!(matches!(err, ParseError::Xml(_)));
    }

    #[test]
    fn test_mismatched_tags_is_parse_error() {
        let err = parse_feed("<rss><channel><item></channel></rss>").unwrap_err();
        assert!(matches!(err, ParseError::Xml(_)));
    }

    #[test]
    fn test_document_classification() {
        assert!(matches!(
            FeedDocument::from_xml(MINIMAL_RSS).unwrap(),
            FeedDocument::Rss(_)
        ));
        assert!(matches!(
            FeedDocument::from_xml(MINIMAL_ATOM).unwrap(),
            FeedDocument::Atom(_)
        ));
        assert!(matches!(
            FeedDocument::from_xml("<opml/>").unwrap(),
            FeedDocument::Unrecognized(ref root) if root == "opml"
        ));
    }

    #[test]
    fn test_rss_extension_elements_do_not_shadow_core_fields() {
        let xml = r#"<rss version="2.0"
            xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
            xmlns:media="http://search.yahoo.com/mrss/"
            xmlns:atom="http://www.w3.org/2005/Atom"><channel>
            <item>
              <itunes:title>Ep 1 (itunes)</itunes:title>
              <title>Ep 1</title>
              <media:title>Ep 1 (media)</media:title>
              <atom:link href="https://example.com/ep1/self" rel="self"/>
              <link>https://example.com/ep1</link>
              <guid>ep1</guid>
            </item>
        </channel></rss>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.articles[0].title, "Ep 1");
        assert_eq!(result.articles[0].url, "https://example.com/ep1");
        assert_eq!(result.articles[0].guid, "ep1");
    }

    #[test]
    fn test_rss_undeclared_prefix_is_ignored() {
        let xml = r#"<rss version="2.0"><channel>
            <item><title>T</title><itunes:title>I</itunes:title><link>https://example.com/u</link></item>
        </channel></rss>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(result.articles[0].title, "T");
    }

    #[test]
    fn test_rss_content_encoded_used_without_description() {
        let xml = r#"<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/"><channel>
            <item>
              <link>https://example.com/c</link>
              <content:encoded><![CDATA[<p>Full body</p>]]></content:encoded>
            </item>
        </channel></rss>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(result.articles[0].description.as_deref(), Some("<p>Full body</p>"));
    }

    #[test]
    fn test_atom_mixed_content_summary_is_joined() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <id>m1</id>
            <link href="https://example.com/m1"/>
            <summary>a <b>b</b> c</summary>
          </entry>
        </feed>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(result.articles[0].description.as_deref(), Some("a b c"));
    }

    #[test]
    fn test_atom_xhtml_content_is_read_as_text() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <id>x1</id>
            <link href="https://example.com/x1"/>
            <content type="xhtml">
              <div xmlns="http://www.w3.org/1999/xhtml"><p>Hello <em>there</em></p></div>
            </content>
          </entry>
        </feed>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(result.articles[0].description.as_deref(), Some("Hello there"));
    }

    #[test]
    fn test_atom_ignores_foreign_namespace_title() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
          <entry>
            <media:title>Media</media:title>
            <title>Atom</title>
            <id>f1</id>
            <link href="https://example.com/f1"/>
          </entry>
        </feed>"#;
        let result = parse_feed(xml).unwrap();
        assert_eq!(result.articles[0].title, "Atom");
    }

    const PODCAST_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
     xmlns:content="http://purl.org/rss/1.0/modules/content/"
     xmlns:dc="http://purl.org/dc/elements/1.1/"
     xmlns:atom="http://www.w3.org/2005/Atom"
     xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Systems Hour</title>
    <link>https://podcast.example.com</link>
    <atom:link href="https://podcast.example.com/feed.xml" rel="self" type="application/rss+xml"/>
    <description>Weekly talk about systems programming</description>
    <language>en-us</language>
    <itunes:author>Systems Hour</itunes:author>
    <itunes:image href="https://podcast.example.com/cover.jpg"/>
    <itunes:category text="Technology"><itunes:category text="Software How-To"/></itunes:category>
    <item>
      <title>Episode 42: Lock-free queues</title>
      <itunes:title>Lock-free queues</itunes:title>
      <itunes:episode>42</itunes:episode>
      <link>https://podcast.example.com/episodes/42</link>
      <atom:link href="https://podcast.example.com/episodes/42.json" rel="alternate"/>
      <guid isPermaLink="false">systems-hour-42</guid>
      <pubDate>Wed, 05 Mar 2025 08:00:00 +0000</pubDate>
      <dc:creator><![CDATA[Grace H.]]></dc:creator>
      <category><![CDATA[concurrency]]></category>
      <category>rust</category>
      <description>We dig into &lt;code&gt;crossbeam&lt;/code&gt; &amp; friends.</description>
      <content:encoded><![CDATA[<p>Full show notes.</p>]]></content:encoded>
      <enclosure url="https://cdn.example.com/42.mp3" length="12345" type="audio/mpeg"/>
      <itunes:duration>00:58:12</itunes:duration>
      <media:title>Lock-free queues (media)</media:title>
    </item>
    <item>
      <title>Episode 41: Arenas</title>
      <itunes:title>Arenas</itunes:title>
      <link>https://podcast.example.com/episodes/41</link>
      <guid isPermaLink="false">systems-hour-41</guid>
      <pubDate>Wed, 26 Feb 2025 08:00:00 +0000</pubDate>
      <content:encoded><![CDATA[<p>Notes for 41.</p>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_realistic_podcast_rss() {
        let result = parse_feed(PODCAST_RSS).unwrap();
        assert_eq!(result.skipped, 0);
        assert_eq!(result.articles.len(), 2);

        let ep42 = &result.articles[0];
        assert_eq!(ep42.title, "Episode 42: Lock-free queues");
        assert_eq!(ep42.url, "https://podcast.example.com/episodes/42");
        assert_eq!(ep42.guid, "systems-hour-42");
        assert_eq!(ep42.author.as_deref(), Some("Grace H."));
        assert_eq!(ep42.categories, vec!["concurrency", "rust"]);
        assert_eq!(
            ep42.description.as_deref(),
            Some("We dig into <code>crossbeam</code> & friends.")
        );
        assert_eq!(
            ep42.published_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 5, 8, 0, 0).unwrap())
        );

        let ep41 = &result.articles[1];
        assert_eq!(ep41.title, "Episode 41: Arenas");
        assert_eq!(ep41.description.as_deref(), Some("<p>Notes for 41.</p>"));
        assert!(ep41.author.is_none());
    }

    const BLOG_ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xml:lang="en">
  <title type="text">Example Engineering</title>
  <subtitle>Notes from the storage team</subtitle>
  <link rel="alternate" type="text/html" href="https://blog.example.com/"/>
  <link rel="self" type="application/atom+xml" href="https://blog.example.com/atom.xml"/>
  <id>tag:blog.example.com,2025:feed</id>
  <updated>2025-04-02T09:15:00Z</updated>
  <author><name>Storage Team</name></author>
  <entry>
    <title type="html">WAL &amp;amp; checkpoints</title>
    <link rel="alternate" type="text/html" href="https://blog.example.com/2025/04/wal"/>
    <link rel="replies" type="application/atom+xml" href="https://blog.example.com/2025/04/wal/comments.xml"/>
    <link rel="edit" href="https://blog.example.com/api/posts/17"/>
    <id>tag:blog.example.com,2025:post-17</id>
    <published>2025-04-01T18:00:00-04:00</published>
    <updated>2025-04-02T09:15:00Z</updated>
    <author>
      <name>Ada L.</name>
      <uri>https://blog.example.com/authors/ada</uri>
    </author>
    <category term="sqlite" label="SQLite"/>
    <category term="durability"/>
    <content type="xhtml">
      <div xmlns="http://www.w3.org/1999/xhtml">
        <p>Write-ahead logging in <strong>practice</strong>.</p>
      </div>
    </content>
  </entry>
  <entry>
    <title>Untitled draft</title>
    <id>tag:blog.example.com,2025:post-16</id>
  </entry>
</feed>"#;

    #[test]
    fn test_realistic_blog_atom() {
        let result = parse_feed(BLOG_ATOM).unwrap();
        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.skipped, 1);

        let post = &result.articles[0];
        assert_eq!(post.guid, "tag:blog.example.com,2025:post-17");
        assert_eq!(post.url, "https://blog.example.com/2025/04/wal");
        assert_eq!(post.title, "WAL &amp; checkpoints");
        assert_eq!(post.author.as_deref(), Some("Ada L."));
        assert_eq!(post.categories, vec!["sqlite", "durability"]);
        assert_eq!(
            post.description.as_deref(),
            Some("Write-ahead logging in practice.")
        );
        assert_eq!(
            post.published_at,
            Some(Utc.with_ymd_and_hms(2025, 4, 2, 9, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_html_entity_error_reports_position() {
        let xml = r#"<rss version="2.0"><channel>
            <item><title>A&nbsp;B</title><link>https://example.com/n</link></item>
        </channel></rss>"#;
        let err = parse_feed(xml).unwrap_err();
        assert!(matches!(err, ParseError::Xml(_)));
        let message = err.to_string();
        assert!(message.contains("nbsp"), "{message}");
        assert!(message.contains("at byte"), "{message}");
    }

    #[test]
    fn test_truncated_document_is_parse_error() {
        let err = parse_feed(r#"<rss version="2.0"><channel><item>"#).unwrap_err();
        assert!(matches!(err, ParseError::Xml(_)));
    }

    // SEC-003
    #[test]
    fn test_excessive_nesting_rejected() {
        let xml = format!(
            "<rss><channel>{}{}</channel></rss>",
            "<x>".repeat(MAX_DEPTH),
            "</x>".repeat(MAX_DEPTH)
        );
        let err = parse_feed(&xml).unwrap_err();
        assert!(matches!(err, ParseError::TooDeep(MAX_DEPTH)));
    }
}
