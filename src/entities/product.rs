//! Product entity - Items offered in the catalog.
//!
//! Prices are stored in the store currency as `f64`; order items snapshot the
//! price at checkout so later edits never change historical totals.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product
    pub name: String,
    /// URL slug, unique
    #[sea_orm(unique)]
    pub slug: String,
    /// Long description shown on the detail page
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Unit price
    pub price: f64,
    /// Units in stock, never negative
    pub stock: i64,
    /// Category this product is listed under
    pub category_id: Option<i64>,
    /// SEO title
    pub meta_title: Option<String>,
    /// SEO description
    #[sea_orm(column_type = "Text", nullable)]
    pub meta_description: Option<String>,
    /// Path of the main image, relative to the upload root
    pub main_image: Option<String>,
    /// Hidden from the storefront when false
    pub is_active: bool,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to at most one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    /// One product has many gallery images
    #[sea_orm(has_many = "super::product_image::Entity")]
    Images,
    /// One product has many reviews
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::product_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
