//! User entity - Registered customers and administrators.
//!
//! Authentication is handled outside this service; a user row carries the
//! profile data and the admin flag used by the admin panel.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Lowercased e-mail address, unique across users
    #[sea_orm(unique)]
    pub email: String,
    /// Optional mobile number (normalized)
    pub mobile: Option<String>,
    /// Whether the user can access the admin panel
    pub is_admin: bool,
    /// Deactivated users keep their history but cannot order
    pub is_active: bool,
    /// When the user was created
    pub created_at: DateTimeUtc,
    /// When the user was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user places many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    /// One user writes many reviews
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
    /// One user keeps many wishlist entries
    #[sea_orm(has_many = "super::wishlist::Entity")]
    Wishlists,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::wishlist::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wishlists.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
