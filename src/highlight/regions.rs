//! Text regions of a rendered page and the provider abstraction the
//! highlighter works against.

use scraper::{Html, Node, Selector};
use thiserror::Error;

use super::HIGHLIGHT_CLASS;

/// Stable index of a text region within its page.
pub type RegionId = usize;

/// A leaf text node of a rendered page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    pub id: RegionId,
    pub text: String,
    /// Lower-case tag name of the enclosing element
    pub parent_tag: String,
    /// Currently wrapped by a highlight mark
    pub highlighted: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum RegionError {
    #[error("region {0} does not exist")]
    NotFound(RegionId),

    #[error("region {0} is already highlighted")]
    AlreadyMarked(RegionId),

    #[error("region {0} is not highlighted")]
    NotMarked(RegionId),
}

/// Access to a page's text regions.
///
/// `restore` must leave the region's text exactly as it was before `mark`.
pub trait TextRegionProvider {
    fn regions(&self) -> Vec<TextRegion>;

    fn mark(&mut self, id: RegionId) -> Result<(), RegionError>;

    fn restore(&mut self, id: RegionId) -> Result<(), RegionError>;

    /// Ids of all regions that currently carry a mark.
    fn marked(&self) -> Vec<RegionId>;

    fn scroll_into_view(&mut self, _id: RegionId) {}
}

#[derive(Debug, Clone)]
struct Region {
    text: String,
    parent_tag: String,
    marked: bool,
}

/// Highlightable view over a captured HTML document.
///
/// Regions are the text nodes under `<body>`, in document order. Text
/// already wrapped in a highlight-class element counts as marked.
#[derive(Debug, Clone, Default)]
pub struct HtmlPage {
    regions: Vec<Region>,
    focused: Option<RegionId>,
}

impl HtmlPage {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let body = Selector::parse("body").ok();

        let root = body
            .as_ref()
            .and_then(|selector| document.select(selector).next())
            .unwrap_or_else(|| document.root_element());

        let mut regions = Vec::new();
        for node in root.descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };

            let parent = node.parent().and_then(|p| p.value().as_element().cloned());
            let (parent_tag, marked) = match parent {
                Some(el) => (
                    el.name().to_lowercase(),
                    el.classes().any(|class| class == HIGHLIGHT_CLASS),
                ),
                None => (String::new(), false),
            };

            regions.push(Region {
                text: text.to_string(),
                parent_tag,
                marked,
            });
        }

        Self {
            regions,
            focused: None,
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Text of every marked region, in document order.
    pub fn marked_texts(&self) -> Vec<&str> {
        self.regions
            .iter()
            .filter(|r| r.marked)
            .map(|r| r.text.as_str())
            .collect()
    }

    #[cfg(test)]
    pub fn focused(&self) -> Option<RegionId> {
        self.focused
    }

    fn region_mut(&mut self, id: RegionId) -> Result<&mut Region, RegionError> {
        self.regions.get_mut(id).ok_or(RegionError::NotFound(id))
    }
}

impl TextRegionProvider for HtmlPage {
    fn regions(&self) -> Vec<TextRegion> {
        self.regions
            .iter()
            .enumerate()
            .map(|(id, r)| TextRegion {
                id,
                text: r.text.clone(),
                parent_tag: r.parent_tag.clone(),
                highlighted: r.marked,
            })
            .collect()
    }

    fn mark(&mut self, id: RegionId) -> Result<(), RegionError> {
        let region = self.region_mut(id)?;
        if region.marked {
            return Err(RegionError::AlreadyMarked(id));
        }
        region.marked = true;
        Ok(())
    }

    fn restore(&mut self, id: RegionId) -> Result<(), RegionError> {
        let region = self.region_mut(id)?;
        if !region.marked {
            return Err(RegionError::NotMarked(id));
        }
        region.marked = false;
        if self.focused == Some(id) {
            self.focused = None;
        }
        Ok(())
    }

    fn marked(&self) -> Vec<RegionId> {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.marked)
            .map(|(id, _)| id)
            .collect()
    }

    fn scroll_into_view(&mut self, id: RegionId) {
        self.focused = Some(id);
    }
}
