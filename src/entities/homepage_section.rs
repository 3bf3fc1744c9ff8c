//! Homepage section entity - Admin-editable content blocks (hero, benefits, pricing...).
//!
//! `additional_data` holds a JSON object as text; its shape is owned by the
//! client that renders the section.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Homepage section database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "homepage_sections")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Section key (e.g. `"hero"`), unique
    #[sea_orm(unique)]
    pub key: String,
    /// Heading
    pub title: String,
    /// Optional sub-heading
    pub subtitle: Option<String>,
    /// Body text
    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,
    /// JSON object serialized as text
    #[sea_orm(column_type = "Text", nullable)]
    pub additional_data: Option<String>,
    /// Position on the page
    pub sort_order: i32,
    /// Hidden from the homepage when false
    pub is_active: bool,
    /// When the section was last edited
    pub updated_at: DateTimeUtc,
}

/// `HomepageSection` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
