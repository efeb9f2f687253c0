//! Search request and response types shared by the API and the index backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::User;

/// A faceted search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchArgs {
    /// Free text query; empty matches everything.
    #[serde(default)]
    pub query: String,
    /// Field → accepted values (values of one field are OR-ed, fields AND-ed).
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,
    /// Fields to compute facet counts for.
    #[serde(default)]
    pub facets: Vec<String>,
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Sort key such as `date-updated-desc` or `year-desc`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    defaults::PAGE_SIZE
}

impl Default for SearchArgs {
    fn default() -> Self {
        Self {
            query: String::new(),
            filters: BTreeMap::new(),
            facets: Vec::new(),
            page: default_page(),
            page_size: default_page_size(),
            sort: None,
        }
    }
}

impl SearchArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Add a value to a field filter.
    pub fn with_filter(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters
            .entry(field.to_string())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_facets<I, S>(mut self, facets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facets = facets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> usize {
        self.page_size.clamp(1, defaults::MAX_PAGE_SIZE)
    }

    /// Zero-based offset of the first hit of the page.
    pub fn offset(&self) -> usize {
        self.page.max(1).saturating_sub(1).saturating_mul(self.limit())
    }

    /// Fail when the requested page ends past `MAX_RESULT_WINDOW`.
    pub fn check_window(&self) -> Result<()> {
        if self.offset().saturating_add(self.limit()) > defaults::MAX_RESULT_WINDOW {
            return Err(Error::InvalidInput(format!(
                "page {} is beyond the first {} results",
                self.page,
                defaults::MAX_RESULT_WINDOW
            )));
        }
        Ok(())
    }

    /// Build search arguments from raw query-string pairs.
    ///
    /// Recognised keys: `q`, `page`, `page_size`, `sort`, `facet` (repeatable)
    /// and `f[<field>]` (repeatable filter values).
    pub fn from_query_pairs(pairs: &[(String, String)]) -> Result<Self> {
        let mut args = SearchArgs::new();
        for (key, value) in pairs {
            match key.as_str() {
                "q" => args.query = value.trim().to_string(),
                "page" => {
                    args.page = value
                        .parse()
                        .map_err(|_| Error::InvalidInput(format!("invalid page '{}'", value)))?
                }
                "page_size" => {
                    args.page_size = value.parse().map_err(|_| {
                        Error::InvalidInput(format!("invalid page_size '{}'", value))
                    })?
                }
                "sort" if !value.is_empty() => args.sort = Some(value.clone()),
                "facet" if !value.is_empty() => args.facets.push(value.clone()),
                k if k.starts_with("f[") && k.ends_with(']') => {
                    let field = &k[2..k.len() - 1];
                    if field.is_empty() {
                        return Err(Error::InvalidInput("empty filter field".into()));
                    }
                    if !value.is_empty() {
                        args.filters
                            .entry(field.to_string())
                            .or_default()
                            .push(value.clone());
                    }
                }
                _ => {}
            }
        }
        args.check_window()?;
        Ok(args)
    }
}

/// Which records a search may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// Everything, including deleted records (curators).
    All,
    /// Non-deleted records the user owns or is credited on.
    Owner {
        user_id: String,
        person_id: Option<String>,
    },
    /// Public records only.
    Public,
}

impl SearchScope {
    /// Scope a backoffice user searches in.
    pub fn for_user(user: &User) -> Self {
        if user.can_curate() {
            SearchScope::All
        } else {
            SearchScope::Owner {
                user_id: user.id.clone(),
                person_id: user.person_id.clone(),
            }
        }
    }
}

/// One facet bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    pub value: String,
    pub count: u64,
}

/// Search response: matching record ids in rank order plus facet counts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchHits {
    pub total: u64,
    pub page: usize,
    pub page_size: usize,
    pub ids: Vec<Uuid>,
    pub facets: BTreeMap<String, Vec<FacetValue>>,
}

impl SearchHits {
    /// Number of pages needed for `total` hits.
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        (self.total as usize).div_ceil(self.page_size)
    }

    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages()
    }
}
