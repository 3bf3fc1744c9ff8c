//! Homepage sections - admin-editable content blocks keyed by name.
//!
//! Each section carries free text plus an `additional_data` JSON object whose
//! shape belongs to the client (benefit lists, pricing tiers, and so on).

use crate::{
    config::app::SectionSeed,
    entities::{HomepageSection, homepage_section},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, TryIntoModel, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Fields accepted when saving a section.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionInput {
    /// Heading
    pub title: String,
    /// Optional sub-heading
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Body text
    #[serde(default)]
    pub content: Option<String>,
    /// JSON object or null
    #[serde(default)]
    pub additional_data: Option<Value>,
    /// Position on the page
    #[serde(default)]
    pub sort_order: i32,
    /// Visible on the homepage
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// A section as served to clients, with `additional_data` decoded.
#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    /// Section key
    pub key: String,
    /// Heading
    pub title: String,
    /// Optional sub-heading
    pub subtitle: Option<String>,
    /// Body text
    pub content: Option<String>,
    /// Decoded JSON object, `null` when unset
    pub additional_data: Value,
    /// Position on the page
    pub sort_order: i32,
    /// Visible on the homepage
    pub is_active: bool,
}

impl TryFrom<homepage_section::Model> for SectionView {
    type Error = Error;

    fn try_from(model: homepage_section::Model) -> Result<Self> {
        let additional_data = match model.additional_data.as_deref() {
            Some(raw) => serde_json::from_str(raw)?,
            None => Value::Null,
        };
        Ok(Self {
            key: model.key,
            title: model.title,
            subtitle: model.subtitle,
            content: model.content,
            additional_data,
            sort_order: model.sort_order,
            is_active: model.is_active,
        })
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::validation(
            "key",
            "Key must be lowercase letters, digits, '-' or '_'",
        ))
    }
}

fn encode_additional_data(data: Option<Value>) -> Result<Option<String>> {
    match data {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Object(_)) => Ok(Some(serde_json::to_string(&value)?)),
        Some(_) => Err(Error::validation(
            "additional_data",
            "Additional data must be a JSON object",
        )),
    }
}

/// Looks up a section by key.
pub async fn get_section(
    db: &DatabaseConnection,
    key: &str,
) -> Result<Option<homepage_section::Model>> {
    HomepageSection::find()
        .filter(homepage_section::Column::Key.eq(key))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates or replaces the section stored under `key`.
///
/// # Errors
/// Returns `Validation` for a malformed key, an empty title or
/// `additional_data` that is not a JSON object.
pub async fn upsert_section(
    db: &DatabaseConnection,
    key: &str,
    input: SectionInput,
) -> Result<homepage_section::Model> {
    validate_key(key)?;
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(Error::validation("title", "Title is required"));
    }
    let additional_data = encode_additional_data(input.additional_data)?;

    let mut model: homepage_section::ActiveModel = match get_section(db, key).await? {
        Some(existing) => existing.into(),
        None => homepage_section::ActiveModel {
            key: Set(key.to_string()),
            ..Default::default()
        },
    };
    model.title = Set(title);
    model.subtitle = Set(input.subtitle);
    model.content = Set(input.content);
    model.additional_data = Set(additional_data);
    model.sort_order = Set(input.sort_order);
    model.is_active = Set(input.is_active);
    model.updated_at = Set(Utc::now());

    let saved = model.save(db).await?;
    let saved = saved.try_into_model()?;
    info!("Saved homepage section '{key}'");
    Ok(saved)
}

/// Sections ordered by `sort_order`, optionally only the visible ones.
pub async fn list_sections(
    db: &DatabaseConnection,
    active_only: bool,
) -> Result<Vec<homepage_section::Model>> {
    let mut query = HomepageSection::find();
    if active_only {
        query = query.filter(homepage_section::Column::IsActive.eq(true));
    }
    query
        .order_by_asc(homepage_section::Column::SortOrder)
        .order_by_asc(homepage_section::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Shows or hides a section.
pub async fn set_section_active(
    db: &DatabaseConnection,
    key: &str,
    is_active: bool,
) -> Result<homepage_section::Model> {
    let section = get_section(db, key)
        .await?
        .ok_or_else(|| Error::not_found("homepage section", key))?;
    let mut model: homepage_section::ActiveModel = section.into();
    model.is_active = Set(is_active);
    model.updated_at = Set(Utc::now());
    model.update(db).await.map_err(Into::into)
}

/// Deletes a section.
pub async fn delete_section(db: &DatabaseConnection, key: &str) -> Result<()> {
    let result = HomepageSection::delete_many()
        .filter(homepage_section::Column::Key.eq(key))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("homepage section", key));
    }
    Ok(())
}

/// Assigns `sort_order` by position in `keys` (first key gets 0).
///
/// # Errors
/// Returns `NotFound` if any key is unknown; nothing is changed in that case.
pub async fn reorder_sections(db: &DatabaseConnection, keys: &[String]) -> Result<()> {
    let txn = db.begin().await?;
    for (position, key) in keys.iter().enumerate() {
        let sort_order = i32::try_from(position)
            .map_err(|_| Error::validation("keys", "Too many sections"))?;
        let result = HomepageSection::update_many()
            .col_expr(homepage_section::Column::SortOrder, Expr::value(sort_order))
            .col_expr(homepage_section::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(homepage_section::Column::Key.eq(key.as_str()))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(Error::not_found("homepage section", key));
        }
    }
    txn.commit().await?;
    Ok(())
}

/// Inserts configured sections that do not exist yet. Existing sections are
/// left untouched. Returns the number inserted.
pub async fn seed_sections(db: &DatabaseConnection, seeds: &[SectionSeed]) -> Result<usize> {
    let mut inserted = 0;
    for seed in seeds {
        validate_key(&seed.key)?;
        if get_section(db, &seed.key).await?.is_some() {
            continue;
        }
        homepage_section::ActiveModel {
            key: Set(seed.key.clone()),
            title: Set(seed.title.clone()),
            subtitle: Set(None),
            content: Set(None),
            additional_data: Set(None),
            sort_order: Set(seed.sort_order),
            is_active: Set(true),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        inserted += 1;
    }
    if inserted > 0 {
        info!("Seeded {inserted} homepage section(s)");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;
    use serde_json::json;

    fn input(title: &str, sort_order: i32) -> SectionInput {
        SectionInput {
            title: title.to_string(),
            subtitle: None,
            content: None,
            additional_data: None,
            sort_order,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() -> Result<()> {
        let db = setup_test_db().await?;

        let mut hero = input("Welcome", 0);
        hero.additional_data = Some(json!({ "cta": "Shop now" }));
        let created = upsert_section(&db, "hero", hero).await?;

        let updated = upsert_section(&db, "hero", input("Hello again", 2)).await?;
        assert_eq!(created.id, updated.id);
        assert_eq!(updated.title, "Hello again");
        assert!(updated.additional_data.is_none());
        assert_eq!(list_sections(&db, false).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = upsert_section(&db, "Bad Key", input("x", 0)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { field, .. } if field == "key"));

        let mut array_data = input("Benefits", 0);
        array_data.additional_data = Some(json!(["a", "b"]));
        let result = upsert_section(&db, "benefits", array_data).await;
        assert!(
            matches!(result.unwrap_err(), Error::Validation { field, .. } if field == "additional_data")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_view_decodes_additional_data() -> Result<()> {
        let db = setup_test_db().await?;
        let mut pricing = input("Pricing", 0);
        pricing.additional_data = Some(json!({ "tiers": [1, 2] }));
        let model = upsert_section(&db, "pricing", pricing).await?;

        let view = SectionView::try_from(model)?;
        assert_eq!(view.additional_data["tiers"][1], 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_reorder_and_visibility() -> Result<()> {
        let db = setup_test_db().await?;
        upsert_section(&db, "hero", input("Hero", 0)).await?;
        upsert_section(&db, "faq", input("FAQ", 1)).await?;
        upsert_section(&db, "pricing", input("Pricing", 2)).await?;

        reorder_sections(&db, &["pricing".into(), "hero".into(), "faq".into()]).await?;
        let keys: Vec<String> = list_sections(&db, false).await?.into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec!["pricing", "hero", "faq"]);

        set_section_active(&db, "hero", false).await?;
        assert_eq!(list_sections(&db, true).await?.len(), 2);

        let result = reorder_sections(&db, &["faq".into(), "missing".into()]).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        let faq = get_section(&db, "faq").await?.unwrap();
        assert_eq!(faq.sort_order, 2);

        delete_section(&db, "faq").await?;
        assert!(delete_section(&db, "faq").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_never_overwrites() -> Result<()> {
        let db = setup_test_db().await?;
        upsert_section(&db, "hero", input("Custom hero", 5)).await?;

        let seeds = vec![
            SectionSeed {
                key: "hero".to_string(),
                title: "Default hero".to_string(),
                sort_order: 0,
            },
            SectionSeed {
                key: "benefits".to_string(),
                title: "Why us".to_string(),
                sort_order: 1,
            },
        ];
        assert_eq!(seed_sections(&db, &seeds).await?, 1);
        assert_eq!(seed_sections(&db, &seeds).await?, 0);
        assert_eq!(get_section(&db, "hero").await?.unwrap().title, "Custom hero");
        Ok(())
    }
}
