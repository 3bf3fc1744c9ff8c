//! Product image entity - Gallery images attached to a product.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product image database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_images")]
pub struct Model {
    /// Unique identifier for the image
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning product
    pub product_id: i64,
    /// Stored path relative to the upload root
    pub path: String,
    /// Position in the gallery
    pub sort_order: i32,
    /// When the image was uploaded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ProductImage` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each image belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
