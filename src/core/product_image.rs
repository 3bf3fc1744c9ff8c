//! Product images - uploaded files, gallery rows and the product's main image.
//!
//! Uploaded files live under the configured upload directory as
//! `products/<timestamp>_<name>`; that relative path is what the gallery row
//! and `products.main_image` store.

use crate::{
    core::product::get_product_by_id,
    entities::{Product, ProductImage, product, product_image},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// Subdirectory of the upload root holding product images.
pub const UPLOAD_PREFIX: &str = "products";

/// Largest accepted image upload.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

fn is_safe_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Turns a client-supplied file name into a safe stored name.
///
/// Keeps `[A-Za-z0-9._-]`, drops any directory part and prefixes the
/// upload timestamp so repeated uploads of `photo.jpg` do not collide.
///
/// # Errors
/// Returns `Validation` when nothing usable is left of the name.
pub fn sanitize_upload_name(original: &str, timestamp: i64) -> Result<String> {
    let file_name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = file_name
        .chars()
        .filter(|&c| is_safe_name_char(c))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return Err(Error::validation("file", "File name is empty or invalid"));
    }
    Ok(format!("{timestamp}_{cleaned}"))
}

/// Location on disk of a stored upload path, or `None` when the path was not
/// produced by [`upload_image`] (external URLs, hand-entered paths).
#[must_use]
pub fn stored_file_path(upload_root: &Path, stored: &str) -> Option<PathBuf> {
    let name = stored.strip_prefix(UPLOAD_PREFIX)?.strip_prefix('/')?;
    let valid = !name.is_empty() && !name.starts_with('.') && name.chars().all(is_safe_name_char);
    valid.then(|| upload_root.join(UPLOAD_PREFIX).join(name))
}

fn check_image_file(file_name: &str, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(Error::validation("file", "The uploaded file is empty"));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(Error::validation(
            "file",
            format!("Images may not exceed {} MiB", MAX_UPLOAD_BYTES / (1024 * 1024)),
        ));
    }
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    if !extension.is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str())) {
        return Err(Error::validation(
            "file",
            "Only jpg, jpeg, png, gif and webp images are accepted",
        ));
    }
    Ok(())
}

/// Writes an uploaded image under `upload_root` and appends it to the
/// product's gallery.
///
/// # Errors
/// Returns `Validation` for an empty, oversized or non-image file or an
/// unusable name, `NotFound` for an unknown product, and `Io` when the file
/// cannot be written. Nothing is left on disk when the gallery insert fails.
pub async fn upload_image(
    db: &DatabaseConnection,
    upload_root: &Path,
    product_id: i64,
    original_name: &str,
    bytes: &[u8],
) -> Result<product_image::Model> {
    let file_name = sanitize_upload_name(original_name, chrono::Utc::now().timestamp_millis())?;
    check_image_file(&file_name, bytes)?;
    if get_product_by_id(db, product_id).await?.is_none() {
        return Err(Error::not_found("product", product_id));
    }

    let dir = upload_root.join(UPLOAD_PREFIX);
    tokio::fs::create_dir_all(&dir).await?;
    let target = dir.join(&file_name);
    tokio::fs::write(&target, bytes).await?;

    let stored = format!("{UPLOAD_PREFIX}/{file_name}");
    match add_image(db, product_id, stored).await {
        Ok(image) => {
            info!("Stored image {} for product {product_id}", image.path);
            Ok(image)
        }
        Err(e) => {
            if let Err(io) = tokio::fs::remove_file(&target).await {
                warn!("Failed to remove {} after a failed upload: {io}", target.display());
            }
            Err(e)
        }
    }
}

/// Deletes the file behind a stored upload path. Missing files and paths that
/// are not uploads are ignored; other failures are logged.
pub async fn discard_stored_file(upload_root: &Path, stored: &str) {
    let Some(path) = stored_file_path(upload_root, stored) else {
        return;
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => info!("Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {e}", path.display()),
    }
}

/// Images of a product in gallery order.
pub async fn images_for_product<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
) -> Result<Vec<product_image::Model>> {
    ProductImage::find()
        .filter(product_image::Column::ProductId.eq(product_id))
        .order_by_asc(product_image::Column::SortOrder)
        .order_by_asc(product_image::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn set_main_image_path<C: ConnectionTrait>(
    db: &C,
    product: product::Model,
    path: Option<String>,
) -> Result<product::Model> {
    let mut product: product::ActiveModel = product.into();
    product.main_image = Set(path);
    product.updated_at = Set(chrono::Utc::now());
    product.update(db).await.map_err(Into::into)
}

/// Appends an image to the gallery. The first image becomes the main image.
pub async fn add_image(
    db: &DatabaseConnection,
    product_id: i64,
    path: String,
) -> Result<product_image::Model> {
    if path.trim().is_empty() {
        return Err(Error::validation("path", "Image path cannot be empty"));
    }

    let txn = db.begin().await?;
    let product = get_product_by_id(&txn, product_id)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?;

    let existing = images_for_product(&txn, product_id).await?;
    let next_order = existing.last().map_or(0, |image| image.sort_order + 1);

    let image = product_image::ActiveModel {
        product_id: Set(product_id),
        path: Set(path.clone()),
        sort_order: Set(next_order),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if product.main_image.is_none() {
        set_main_image_path(&txn, product, Some(path)).await?;
    }

    txn.commit().await?;
    Ok(image)
}

/// Removes an image row and returns it; if it was the main image, the next
/// gallery image takes over. The file is left to [`delete_image`].
pub async fn remove_image(db: &DatabaseConnection, image_id: i64) -> Result<product_image::Model> {
    let txn = db.begin().await?;
    let image = ProductImage::find_by_id(image_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("image", image_id))?;
    let product_id = image.product_id;
    let removed_path = image.path.clone();
    image.clone().delete(&txn).await?;

    if let Some(product) = Product::find_by_id(product_id).one(&txn).await? {
        if product.main_image.as_deref() == Some(removed_path.as_str()) {
            let next = images_for_product(&txn, product_id)
                .await?
                .into_iter()
                .next()
                .map(|image| image.path);
            set_main_image_path(&txn, product, next).await?;
        }
    }

    txn.commit().await?;
    Ok(image)
}

/// Removes an image row together with its uploaded file.
pub async fn delete_image(db: &DatabaseConnection, upload_root: &Path, image_id: i64) -> Result<()> {
    let removed = remove_image(db, image_id).await?;
    discard_stored_file(upload_root, &removed.path).await;
    Ok(())
}

/// Rewrites gallery positions to match `ordered_ids`.
///
/// # Errors
/// Returns `Validation` unless `ordered_ids` is exactly the product's image set.
pub async fn reorder_images(
    db: &DatabaseConnection,
    product_id: i64,
    ordered_ids: &[i64],
) -> Result<Vec<product_image::Model>> {
    let txn = db.begin().await?;
    let current = images_for_product(&txn, product_id).await?;

    let current_ids: HashSet<i64> = current.iter().map(|image| image.id).collect();
    let requested: HashSet<i64> = ordered_ids.iter().copied().collect();
    if requested.len() != ordered_ids.len() || requested != current_ids {
        return Err(Error::validation(
            "image_ids",
            "Image ids must list every image of the product exactly once",
        ));
    }

    for (position, image) in ordered_ids.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| Error::validation("image_ids", "Too many images"))?;
        ProductImage::update_many()
            .col_expr(
                product_image::Column::SortOrder,
                sea_orm::sea_query::Expr::value(position),
            )
            .filter(product_image::Column::Id.eq(*image))
            .exec(&txn)
            .await?;
    }

    let reordered = images_for_product(&txn, product_id).await?;
    txn.commit().await?;
    Ok(reordered)
}

/// Makes one of the product's gallery images the main image.
pub async fn set_main_image(
    db: &DatabaseConnection,
    product_id: i64,
    image_id: i64,
) -> Result<product::Model> {
    let product = get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?;
    let image = ProductImage::find_by_id(image_id)
        .one(db)
        .await?
        .filter(|image| image.product_id == product_id)
        .ok_or_else(|| Error::not_found("image", image_id))?;

    set_main_image_path(db, product, Some(image.path)).await
}
