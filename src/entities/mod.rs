//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod cart_item;
pub mod category;
pub mod homepage_section;
pub mod order;
pub mod order_item;
pub mod order_tracking;
pub mod product;
pub mod product_image;
pub mod review;
pub mod setting;
pub mod user;
pub mod wishlist;

// Re-export specific types to avoid conflicts
pub use cart_item::{Column as CartItemColumn, Entity as CartItem, Model as CartItemModel};
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use homepage_section::{
    Column as HomepageSectionColumn, Entity as HomepageSection, Model as HomepageSectionModel,
};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use order_item::{Column as OrderItemColumn, Entity as OrderItem, Model as OrderItemModel};
pub use order_tracking::{
    Column as OrderTrackingColumn, Entity as OrderTracking, Model as OrderTrackingModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use product_image::{
    Column as ProductImageColumn, Entity as ProductImage, Model as ProductImageModel,
};
pub use review::{Column as ReviewColumn, Entity as Review, Model as ReviewModel};
pub use setting::{Column as SettingColumn, Entity as Setting, Model as SettingModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
pub use wishlist::{Column as WishlistColumn, Entity as Wishlist, Model as WishlistModel};
