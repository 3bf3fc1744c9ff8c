//! Core business logic - framework-agnostic catalog, cart, order and reporting operations.
//!
//! Every function takes a database connection and returns [`crate::errors::Result`];
//! the HTTP layer only translates requests and responses.

pub mod cart;
pub mod category;
pub mod csv_io;
pub mod customer;
pub mod homepage;
pub mod order;
pub mod pagination;
pub mod product;
pub mod product_image;
pub mod report;
pub mod review;
pub mod setting;
pub mod slug;
pub mod user;
pub mod wishlist;

/// Deserializes a nullable field of a partial update: absent stays `None`,
/// `null` becomes `Some(None)` and a value becomes `Some(Some(value))`.
/// Pair with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    <Option<T> as serde::Deserialize>::deserialize(deserializer).map(Some)
}
