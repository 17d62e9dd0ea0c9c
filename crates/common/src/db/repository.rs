//! Repository pattern for database operations
//!
//! Translates metadata-store operations into SeaORM queries over the
//! `research_metadata` table.

use crate::db::models::*;
use crate::db::store::{MetadataStore, NewPaper, PaperQuery, SortField, SortOrder};
use crate::db::DbPool;
use crate::errors::Result;
use async_trait::async_trait;
use sea_orm::sea_query::{Condition, Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }
}

impl From<SortField> for PaperColumn {
    fn from(field: SortField) -> Self {
        match field {
            SortField::PublicationDate => PaperColumn::PublicationDate,
            SortField::Title => PaperColumn::Title,
            SortField::Authors => PaperColumn::Authors,
        }
    }
}

impl From<SortOrder> for Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

/// Escape LIKE wildcards so user input matches literally, then wrap in `%`
fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Case-insensitive substring match: `LOWER(column) LIKE '%term%'`
fn ilike(column: PaperColumn, term: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col((PaperEntity, column))))
        .like(LikeExpr::new(contains_pattern(term)).escape('\\'))
}

/// Build the SELECT for a search query
pub(crate) fn search_select(query: &PaperQuery) -> Select<PaperEntity> {
    let mut select = PaperEntity::find();

    if let Some(ref text) = query.text {
        select = select.filter(
            Condition::any()
                .add(ilike(PaperColumn::Title, text))
                .add(ilike(PaperColumn::Authors, text))
                .add(ilike(PaperColumn::Keywords, text))
                .add(ilike(PaperColumn::Journal, text))
                .add(ilike(PaperColumn::Department, text)),
        );
    }

    if let Some(ref department) = query.department {
        select = select.filter(ilike(PaperColumn::Department, department));
    }

    if let Some(ref journal) = query.journal {
        select = select.filter(ilike(PaperColumn::Journal, journal));
    }

    if let Some((start, end)) = query.year_bounds() {
        select = select
            .filter(PaperColumn::PublicationDate.gte(start))
            .filter(PaperColumn::PublicationDate.lte(end));
    }

    select
        .order_by(PaperColumn::from(query.sort_by), Order::from(query.sort_order))
        .limit(query.limit)
}

/// Build the SELECT for a page of records, newest publication first
pub(crate) fn list_select(offset: u64, limit: u64) -> Select<PaperEntity> {
    PaperEntity::find()
        .order_by_desc(PaperColumn::PublicationDate)
        .offset(offset)
        .limit(limit)
}

#[async_trait]
impl MetadataStore for Repository {
    async fn insert(&self, paper: NewPaper) -> Result<Paper> {
        let model = PaperActiveModel {
            title: Set(paper.title),
            authors: Set(paper.authors),
            department: Set(paper.department),
            publication_date: Set(paper.publication_date),
            journal: Set(paper.journal),
            keywords: Set(paper.keywords),
            file_url: Set(paper.file_url),
            ..Default::default()
        };

        model.insert(self.conn()).await.map_err(Into::into)
    }

    async fn search(&self, query: &PaperQuery) -> Result<Vec<Paper>> {
        search_select(query)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<Paper>> {
        list_select(offset, limit)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Paper>> {
        PaperEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
