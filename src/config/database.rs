//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.

use crate::entities::{
    CartItem, Category, HomepageSection, Order, OrderItem, OrderTracking, Product, ProductImage,
    Review, Setting, User, Wishlist,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
    sea_query::TableCreateStatement,
};
use tracing::{debug, info};

/// Default connection string used when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Creates the parent directory of a file-backed `SQLite` URL so `mode=rwc`
/// can create the database file. Other URLs are ignored.
pub fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {database_url}");
    Database::connect(database_url).await.map_err(Into::into)
}

fn table_for<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    statement
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// Existing tables are left untouched, so this is safe to run on every start.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let statements = [
        table_for(&schema, User),
        table_for(&schema, Category),
        table_for(&schema, Product),
        table_for(&schema, ProductImage),
        table_for(&schema, CartItem),
        table_for(&schema, Order),
        table_for(&schema, OrderItem),
        table_for(&schema, OrderTracking),
        table_for(&schema, Review),
        table_for(&schema, Wishlist),
        table_for(&schema, HomepageSection),
        table_for(&schema, Setting),
    ];

    for statement in &statements {
        db.execute(builder.build(statement)).await?;
    }

    info!("Database schema ready ({} tables)", statements.len());
    Ok(())
}
