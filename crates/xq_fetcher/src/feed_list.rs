use std::path::Path;

use opml::{Outline, OPML};
use xq_core::{Error, FeedDescriptor, Result};

/// Reads the feed list. A missing or malformed file is a configuration error.
pub fn load_opml(path: &Path) -> Result<Vec<FeedDescriptor>> {
    let xml = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read feed list {}: {}", path.display(), e)))?;
    parse_opml(&xml)
}

/// Feeds in document order. Outlines without `xmlUrl` are categories and
/// contribute their name to the category path of everything below them.
pub fn parse_opml(xml: &str) -> Result<Vec<FeedDescriptor>> {
    let document = OPML::from_str(xml).map_err(|e| Error::Config(format!("Invalid OPML: {}", e)))?;
    let mut feeds = Vec::new();
    walk_outlines(&document.body.outlines, "", &mut feeds);
    Ok(feeds)
}

fn outline_name(outline: &Outline) -> String {
    if outline.text.is_empty() {
        outline.title.clone().unwrap_or_default()
    } else {
        outline.text.clone()
    }
}

fn walk_outlines(outlines: &[Outline], category: &str, feeds: &mut Vec<FeedDescriptor>) {
    for outline in outlines {
        match outline.xml_url.as_deref().filter(|u| !u.is_empty()) {
            Some(xml_url) => feeds.push(FeedDescriptor {
                title: outline_name(outline),
                xml_url: xml_url.to_string(),
                html_url: outline.html_url.clone().unwrap_or_default(),
                category: category.to_string(),
            }),
            None => {
                let name = outline_name(outline);
                let sub_category = if category.is_empty() {
                    name
                } else {
                    format!("{} / {}", category, name)
                };
                walk_outlines(&outline.outlines, &sub_category, feeds);
            }
        }
    }
}
