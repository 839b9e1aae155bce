//! Article list query: paging, sorting and filters.

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Date,
    Popularity,
    Title,
}

impl SortKey {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "date" => Some(Self::Date),
            "popularity" | "views" => Some(Self::Popularity),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Popularity => "popularity",
            Self::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Query state for the article list
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleFilters {
    /// Zero-based page index
    pub page: u32,
    pub size: u32,
    pub sort: SortKey,
    pub order: SortOrder,
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub author_id: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub published_only: bool,
    pub featured: Option<bool>,
    pub pinned: Option<bool>,
}

/// Keys accepted by [`ArticleFilters::set`]
pub const FILTER_KEYS: &[&str] = &[
    "sort", "order", "keyword", "category", "tags", "author", "from", "to", "published",
    "featured", "pinned", "size",
];

impl ArticleFilters {
    pub fn new(size: u32) -> Self {
        Self {
            page: 0,
            size,
            sort: SortKey::default(),
            order: SortOrder::default(),
            keyword: None,
            category: None,
            tags: None,
            author_id: None,
            date_from: None,
            date_to: None,
            published_only: true,
            featured: None,
            pinned: None,
        }
    }

    /// Back to defaults, keeping the page size
    pub fn reset(&mut self) {
        *self = Self::new(self.size);
    }

    /// Whether any filter differs from its default. Showing drafts only
    /// counts when logged in, since anonymous users only ever see
    /// published articles.
    pub fn has_active(&self, logged_in: bool) -> bool {
        self.keyword.is_some()
            || self.category.is_some()
            || self.tags.is_some()
            || self.author_id.is_some()
            || self.date_from.is_some()
            || self.date_to.is_some()
            || self.sort != SortKey::Date
            || self.order != SortOrder::Desc
            || self.featured.is_some()
            || self.pinned.is_some()
            || (logged_in && !self.published_only)
    }

    /// Query-string pairs for `GET /articles`. Unset values are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("size", self.size.to_string()),
            ("sort", self.sort.as_str().to_string()),
            ("order", self.order.as_str().to_string()),
        ];
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                pairs.push((key, v));
            }
        };
        push("keyword", self.keyword.clone());
        push("authorId", self.author_id.map(|id| id.to_string()));
        push("category", self.category.clone());
        push("tags", self.tags.clone());
        push("dateFrom", self.date_from.map(|d| d.to_string()));
        push("dateTo", self.date_to.map(|d| d.to_string()));
        push("publishedOnly", Some(self.published_only.to_string()));
        push("featured", self.featured.map(|b| b.to_string()));
        push("pinned", self.pinned.map(|b| b.to_string()));
        pairs
    }

    /// Set one filter from text. An empty value clears it. Any change sends
    /// the list back to the first page.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let text = || (!value.is_empty()).then(|| value.to_string());

        match key {
            "sort" => {
                self.sort = if value.is_empty() {
                    SortKey::default()
                } else {
                    SortKey::from_str(value)
                        .ok_or_else(|| anyhow!("sort must be date, popularity or title"))?
                }
            }
            "order" => {
                self.order = if value.is_empty() {
                    SortOrder::default()
                } else {
                    SortOrder::from_str(value).ok_or_else(|| anyhow!("order must be asc or desc"))?
                }
            }
            "keyword" => self.keyword = text(),
            "category" => self.category = text(),
            "tags" => self.tags = text(),
            "author" => {
                self.author_id = if value.is_empty() {
                    None
                } else {
                    Some(
                        value
                            .parse()
                            .map_err(|_| anyhow!("author must be a numeric user id"))?,
                    )
                }
            }
            "from" => self.date_from = parse_date(value)?,
            "to" => self.date_to = parse_date(value)?,
            "published" => self.published_only = parse_flag(value)?.unwrap_or(true),
            "featured" => self.featured = parse_flag(value)?,
            "pinned" => self.pinned = parse_flag(value)?,
            "size" => {
                let size: u32 = value
                    .parse()
                    .map_err(|_| anyhow!("size must be a positive number"))?;
                if size == 0 || size > crate::config::MAX_PAGE_SIZE {
                    bail!("size must be between 1 and {}", crate::config::MAX_PAGE_SIZE);
                }
                self.size = size;
            }
            _ => bail!("unknown filter '{}'. Known: {}", key, FILTER_KEYS.join(", ")),
        }

        self.page = 0;
        Ok(())
    }

    /// Non-default filters as (name, value) pairs, for display
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if self.sort != SortKey::Date || self.order != SortOrder::Desc {
            out.push((
                "sort",
                format!("{} {}", self.sort.as_str(), self.order.as_str()),
            ));
        }
        if let Some(k) = &self.keyword {
            out.push(("keyword", k.clone()));
        }
        if let Some(c) = &self.category {
            out.push(("category", c.clone()));
        }
        if let Some(t) = &self.tags {
            out.push(("tags", t.clone()));
        }
        if let Some(a) = self.author_id {
            out.push(("author", a.to_string()));
        }
        if let Some(d) = self.date_from {
            out.push(("from", d.to_string()));
        }
        if let Some(d) = self.date_to {
            out.push(("to", d.to_string()));
        }
        if !self.published_only {
            out.push(("published", "any".to_string()));
        }
        if let Some(f) = self.featured {
            out.push(("featured", f.to_string()));
        }
        if let Some(p) = self.pinned {
            out.push(("pinned", p.to_string()));
        }
        out
    }

    /// Move to the next page if there is one. Returns whether the page changed.
    pub fn next_page(&mut self, total_pages: u32) -> bool {
        if self.page + 1 < total_pages {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Jump to a one-based page number, clamped to the known page count
    pub fn goto_page(&mut self, number: u32, total_pages: u32) {
        let last = total_pages.max(1);
        self.page = number.clamp(1, last) - 1;
    }
}

fn parse_date(value: &str) -> Result<Option<NaiveDate>> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| anyhow!("dates must be YYYY-MM-DD, got '{}'", value))
}

/// Tri-state flag: empty or "any" clears it
fn parse_flag(value: &str) -> Result<Option<bool>> {
    match value.to_lowercase().as_str() {
        "" | "any" => Ok(None),
        "true" | "yes" | "on" | "1" => Ok(Some(true)),
        "false" | "no" | "off" | "0" => Ok(Some(false)),
        other => bail!("expected yes, no or any, got '{}'", other),
    }
}
