//! Order tracking entity - Shipment details, one record per order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order tracking database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_trackings")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tracked order
    #[sea_orm(unique)]
    pub order_id: i64,
    /// Courier name
    pub courier: Option<String>,
    /// Courier tracking number
    pub tracking_number: Option<String>,
    /// Latest note shown to the customer
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
    /// When tracking was last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `OrderTracking` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each record belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
