use feed_rs::model::Entry;
use feed_rs::parser;
use xq_core::{Error, FeedDescriptor, Post, Result};

/// Parses a feed document and normalizes its entries in document order.
/// Entries without a title or link are dropped.
pub fn parse_feed(body: &[u8], feed: &FeedDescriptor) -> Result<Vec<Post>> {
    let document = parser::parse(body).map_err(|e| Error::Feed(format!("{}: {}", feed.xml_url, e)))?;
    Ok(document
        .entries
        .iter()
        .filter_map(|entry| normalize_entry(entry, feed))
        .collect())
}

pub fn normalize_entry(entry: &Entry, feed: &FeedDescriptor) -> Option<Post> {
    let title = entry.title.as_ref().map(|t| t.content.trim()).unwrap_or_default();
    let url = select_entry_link(entry);
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let content = entry_content(entry);
    Some(Post {
        title: title.to_string(),
        url,
        author: entry.authors.first().map(|p| p.name.clone()).unwrap_or_default(),
        published_at: entry.published.or(entry.updated),
        word_count: content.split_whitespace().count(),
        content,
        feed_title: feed.title.clone(),
        feed_url: feed.xml_url.clone(),
        category: feed.category.clone(),
    })
}

fn select_entry_link(entry: &Entry) -> String {
    let mut links = entry.links.iter().filter(|l| !l.href.trim().is_empty());
    let preferred = links.clone().find(|l| {
        l.rel.as_deref().map_or(true, |rel| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
    });
    preferred
        .or_else(|| links.next())
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default()
}

/// Full content body, then summary, then the first media description.
fn entry_content(entry: &Entry) -> String {
    entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .filter(|b| !b.is_empty())
        .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()).filter(|s| !s.is_empty()))
        .or_else(|| {
            entry
                .media
                .iter()
                .find_map(|m| m.description.as_ref().map(|d| d.content.clone()))
        })
        .unwrap_or_default()
}
