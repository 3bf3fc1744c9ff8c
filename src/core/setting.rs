//! Key-value store settings.
//!
//! Settings override defaults from `config.toml` at runtime; the admin panel
//! edits them without a restart.

use crate::{
    entities::{Setting, setting},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{debug, warn};

/// Key holding the flat shipping fee.
pub const SHIPPING_FEE_KEY: &str = "shipping_fee";

/// Retrieves a setting value, `None` if the key was never set.
pub async fn get_setting(db: &DatabaseConnection, key: &str) -> Result<Option<String>> {
    let value = Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?
        .map(|s| s.value);
    debug!("Setting '{key}': {value:?}");
    Ok(value)
}

/// Sets or updates a setting (upsert).
///
/// # Errors
/// Returns `Validation` for an empty key, or for a non-numeric or negative
/// `shipping_fee`.
pub async fn set_setting(db: &DatabaseConnection, key: &str, value: &str) -> Result<setting::Model> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::validation("key", "Key is required"));
    }
    let value = value.trim();
    if key == SHIPPING_FEE_KEY {
        let fee: f64 = value
            .parse()
            .map_err(|_| Error::validation("value", "Shipping fee must be a number"))?;
        if !fee.is_finite() || fee < 0.0 {
            return Err(Error::validation("value", "Shipping fee cannot be negative"));
        }
    }

    let existing = Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?;
    let now = chrono::Utc::now();

    let saved = match existing {
        Some(row) => {
            let mut model: setting::ActiveModel = row.into();
            model.value = Set(value.to_string());
            model.updated_at = Set(now);
            model.update(db).await?
        }
        None => {
            setting::ActiveModel {
                key: Set(key.to_string()),
                value: Set(value.to_string()),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };
    Ok(saved)
}

/// Every setting, ordered by key.
pub async fn all_settings(db: &DatabaseConnection) -> Result<Vec<setting::Model>> {
    Setting::find()
        .order_by_asc(setting::Column::Key)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The shipping fee to charge: the stored setting, else `default`.
///
/// An unparsable stored value is logged and ignored.
pub async fn shipping_fee(db: &DatabaseConnection, default: f64) -> Result<f64> {
    match get_setting(db, SHIPPING_FEE_KEY).await? {
        Some(raw) => match raw.parse::<f64>() {
            Ok(fee) if fee.is_finite() && fee >= 0.0 => Ok(fee),
            _ => {
                warn!("Ignoring invalid stored shipping fee '{raw}'");
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_set_and_get() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(get_setting(&db, "store_name").await?, None);

        set_setting(&db, "store_name", "Corner Shop").await?;
        set_setting(&db, "store_name", "Big Shop").await?;
        assert_eq!(get_setting(&db, "store_name").await?.as_deref(), Some("Big Shop"));
        assert_eq!(all_settings(&db).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_shipping_fee_fallback() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(shipping_fee(&db, 4.5).await?, 4.5);

        set_setting(&db, SHIPPING_FEE_KEY, "7.25").await?;
        assert_eq!(shipping_fee(&db, 4.5).await?, 7.25);

        assert!(set_setting(&db, SHIPPING_FEE_KEY, "-1").await.is_err());
        assert!(set_setting(&db, SHIPPING_FEE_KEY, "free").await.is_err());
        assert!(set_setting(&db, " ", "x").await.is_err());
        Ok(())
    }
}
