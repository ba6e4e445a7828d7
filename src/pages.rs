//! Captured page records and the helpers that name and classify them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Website category assigned at capture time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ecommerce,
    Social,
    News,
    Documentation,
    Video,
    #[serde(other)]
    General,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Ecommerce,
        Category::Social,
        Category::News,
        Category::Documentation,
        Category::Video,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ecommerce => "ecommerce",
            Category::Social => "social",
            Category::News => "news",
            Category::Documentation => "documentation",
            Category::Video => "video",
            Category::General => "general",
        }
    }

    /// URL/content fragments that vote for a category.
    fn patterns(&self) -> &'static [&'static str] {
        match self {
            Category::Ecommerce => &[
                "amazon", "ebay", "shopify", "shop", "cart", "product", "buy", "price", "store",
            ],
            Category::Social => &[
                "facebook", "twitter", "instagram", "linkedin", "reddit", "tiktok",
            ],
            Category::News => &["news", "article", "blog", "post", "medium"],
            Category::Documentation => &[
                "docs",
                "documentation",
                "api",
                "reference",
                "guide",
                "github",
            ],
            Category::Video => &["youtube", "vimeo", "video", "watch", "netflix"],
            Category::General => &[],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or(UnknownCategory(s))
    }
}

/// Category restriction for queries. `all` is the sentinel for "no filter".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn parse(value: Option<&str>) -> Result<Self, UnknownCategory> {
        match value.map(str::trim) {
            None | Some("") => Ok(CategoryFilter::All),
            Some(v) if v.eq_ignore_ascii_case("all") => Ok(CategoryFilter::All),
            Some(v) => v.parse().map(CategoryFilter::Only),
        }
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(c) => Some(*c),
        }
    }

    /// Documents with unknown category never pass a concrete filter.
    pub fn admits(&self, category: Option<Category>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => category == Some(*wanted),
        }
    }
}

/// How a vector was produced. Vectors of different methods are never compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMethod {
    #[default]
    Local,
    Remote,
}

/// Page text as handed over by the capturing side.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CapturedPage {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub favicon: Option<String>,
}

/// Stored under `meta_<hash>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub chunk_count: usize,
}

/// Stored under `chunk_<hash>_<index>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default)]
    pub method: EmbeddingMethod,
}

pub const URL_INDEX_KEY: &str = "urlIndex";
pub const CATEGORY_INDEX_KEY: &str = "categoryIndex";
pub const CHUNK_KEY_PREFIX: &str = "chunk_";
const META_KEY_PREFIX: &str = "meta_";

pub fn meta_key(url: &str) -> String {
    format!("{META_KEY_PREFIX}{}", url_hash(url))
}

pub fn chunk_key(url: &str, index: usize) -> String {
    format!("{CHUNK_KEY_PREFIX}{}_{index}", url_hash(url))
}

/// Prefix shared by every chunk key of one URL, trailing underscore included.
pub fn chunk_key_prefix(url: &str) -> String {
    format!("{CHUNK_KEY_PREFIX}{}_", url_hash(url))
}

/// Split `chunk_<hash>_<index>` back into its parts.
pub fn parse_chunk_key(key: &str) -> Option<(&str, usize)> {
    let rest = key.strip_prefix(CHUNK_KEY_PREFIX)?;
    let (hash, index) = rest.rsplit_once('_')?;
    Some((hash, index.parse().ok()?))
}

/// 32-bit rolling hash (`h = h * 31 + c` over UTF-16 units), absolute value in base 36.
///
/// Collisions are tolerated: every record also carries the full URL.
pub fn url_hash(url: &str) -> String {
    let hash = url.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32)
    });

    to_base36((hash as i64).unsigned_abs())
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// True when the URL contains any excluded fragment.
pub fn is_excluded(url: &str, excluded: &[String]) -> bool {
    excluded
        .iter()
        .any(|fragment| !fragment.is_empty() && url.contains(fragment.as_str()))
}

/// First category (in declaration order) with at least two pattern hits in
/// the URL or the content.
pub fn categorize(url: &str, content: &str) -> Category {
    let url = url.to_lowercase();
    let content = content.to_lowercase();

    Category::ALL
        .into_iter()
        .find(|category| {
            category
                .patterns()
                .iter()
                .filter(|p| url.contains(*p) || content.contains(*p))
                .count()
                >= 2
        })
        .unwrap_or(Category::General)
}

/// Host part of a URL, used in log lines.
pub fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}
