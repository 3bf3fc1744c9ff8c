//! Setting entity - Stores key-value pairs for store configuration.
//! Used for admin-editable values such as the shipping fee or store name
//! that override the defaults from `config.toml`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Setting database model - stores key-value configuration pairs
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Setting key (e.g., `"shipping_fee"`)
    #[sea_orm(unique)]
    pub key: String,
    /// Setting value stored as string
    pub value: String,
    /// When this setting was last modified
    pub updated_at: DateTimeUtc,
}

/// `Setting` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
