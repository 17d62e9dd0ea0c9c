//! Metadata store abstraction
//!
//! `MetadataStore` is the seam between the HTTP layer and the records
//! backend. `Repository` implements it over Postgres; `MemoryMetadataStore`
//! evaluates the same queries in-process for tests and local runs.

use crate::db::models::Paper;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;

/// Default number of records returned by search and list
pub const DEFAULT_LIMIT: u64 = 50;

/// Column a search can be sorted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum SortField {
    #[default]
    PublicationDate,
    Title,
    Authors,
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "publication_date" => Ok(SortField::PublicationDate),
            "title" => Ok(SortField::Title),
            "authors" => Ok(SortField::Authors),
            other => Err(format!(
                "unsupported sort_by '{}', expected one of: publication_date, title, authors",
                other
            )),
        }
    }
}

impl TryFrom<String> for SortField {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unsupported sort_order '{}', expected asc or desc", other)),
        }
    }
}

impl TryFrom<String> for SortOrder {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortField::PublicationDate => write!(f, "publication_date"),
            SortField::Title => write!(f, "title"),
            SortField::Authors => write!(f, "authors"),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// A filtered, sorted and capped read over `research_metadata`.
///
/// `text` matches any of title, authors, keywords, journal or department.
/// `department`, `journal` and `year` each narrow the result further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperQuery {
    pub text: Option<String>,
    pub department: Option<String>,
    pub journal: Option<String>,
    pub year: Option<i32>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub limit: u64,
}

impl Default for PaperQuery {
    fn default() -> Self {
        Self {
            text: None,
            department: None,
            journal: None,
            year: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PaperQuery {
    /// Inclusive publication date range for the year filter
    pub fn year_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let year = self.year?;
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
        Some((start, end))
    }

    /// Whether a record satisfies every filter of this query
    pub fn matches(&self, paper: &Paper) -> bool {
        if let Some(ref text) = self.text {
            let any = [
                &paper.title,
                &paper.authors,
                &paper.keywords,
                &paper.journal,
                &paper.department,
            ]
            .iter()
            .any(|field| contains_ignore_case(field, text));

            if !any {
                return false;
            }
        }

        if let Some(ref department) = self.department {
            if !contains_ignore_case(&paper.department, department) {
                return false;
            }
        }

        if let Some(ref journal) = self.journal {
            if !contains_ignore_case(&paper.journal, journal) {
                return false;
            }
        }

        if let Some((start, end)) = self.year_bounds() {
            if paper.publication_date < start || paper.publication_date > end {
                return false;
            }
        }

        true
    }

    /// Ordering of two records under this query's sort
    pub fn compare(&self, a: &Paper, b: &Paper) -> Ordering {
        let ordering = match self.sort_by {
            SortField::PublicationDate => a.publication_date.cmp(&b.publication_date),
            SortField::Title => a.title.cmp(&b.title),
            SortField::Authors => a.authors.cmp(&b.authors),
        };

        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Fields of a record about to be inserted; the store assigns `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPaper {
    pub title: String,
    pub authors: String,
    pub department: String,
    pub publication_date: NaiveDate,
    pub journal: String,
    pub keywords: String,
    pub file_url: String,
}

/// Trait for the structured-record backend
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record and return it with its assigned id
    async fn insert(&self, paper: NewPaper) -> Result<Paper>;

    /// Filtered, sorted, capped read
    async fn search(&self, query: &PaperQuery) -> Result<Vec<Paper>>;

    /// Records by publication date descending, skipping `offset`
    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<Paper>>;

    /// Single record by id
    async fn find_by_id(&self, id: i64) -> Result<Option<Paper>>;

    /// Check backend connectivity
    async fn ping(&self) -> Result<()>;
}

/// In-memory metadata store
#[derive(Default)]
pub struct MemoryMetadataStore {
    papers: RwLock<Vec<Paper>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.papers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.papers.read().await.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, paper: NewPaper) -> Result<Paper> {
        let mut papers = self.papers.write().await;
        let id = papers.iter().map(|p| p.id).max().unwrap_or(0) + 1;

        let record = Paper {
            id,
            title: paper.title,
            authors: paper.authors,
            department: paper.department,
            publication_date: paper.publication_date,
            journal: paper.journal,
            keywords: paper.keywords,
            file_url: paper.file_url,
        };

        papers.push(record.clone());
        Ok(record)
    }

    async fn search(&self, query: &PaperQuery) -> Result<Vec<Paper>> {
        let papers = self.papers.read().await;

        let mut results: Vec<Paper> = papers
            .iter()
            .filter(|paper| query.matches(paper))
            .cloned()
            .collect();

        results.sort_by(|a, b| query.compare(a, b));
        results.truncate(query.limit as usize);

        Ok(results)
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<Paper>> {
        let papers = self.papers.read().await;

        let mut results: Vec<Paper> = papers.clone();
        results.sort_by(|a, b| b.publication_date.cmp(&a.publication_date));

        Ok(results
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Paper>> {
        let papers = self.papers.read().await;
        Ok(papers.iter().find(|p| p.id == id).cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
