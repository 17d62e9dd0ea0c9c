//! Research metadata entity, one row per uploaded paper

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "research_metadata")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub authors: String,

    #[sea_orm(column_type = "Text")]
    pub department: String,

    /// Serialized as `YYYY-MM-DD`
    pub publication_date: Date,

    #[sea_orm(column_type = "Text")]
    pub journal: String,

    #[sea_orm(column_type = "Text")]
    pub keywords: String,

    /// Public URL of the stored file
    #[sea_orm(column_type = "Text")]
    pub file_url: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
