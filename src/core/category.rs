//! Category business logic - Handles the category tree.
//!
//! Categories form a tree through `parent_id`. The tree is small, so walks
//! load the adjacency list once and traverse it in memory.

use crate::{
    core::slug::slugify,
    entities::{Category, Product, category, product},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::info;

/// Fields accepted when creating or editing a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    /// Display name, slug is derived from it
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Parent category, `None` for a root
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// Position among siblings
    #[serde(default)]
    pub sort_order: i32,
    /// Whether the category is visible
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl CategoryInput {
    /// Input for an active root category with the given name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            parent_id: None,
            sort_order: 0,
            is_active: true,
        }
    }

    /// Same input placed under `parent_id`.
    #[must_use]
    pub const fn under(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// A partial category edit. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryChanges {
    /// New name, the slug follows it
    pub name: Option<String>,
    /// New description, `null` clears it
    #[serde(default, deserialize_with = "crate::core::nullable")]
    pub description: Option<Option<String>>,
    /// New parent, `null` makes the category a root
    #[serde(default, deserialize_with = "crate::core::nullable")]
    pub parent_id: Option<Option<i64>>,
    /// New position among siblings
    pub sort_order: Option<i32>,
    /// New visibility
    pub is_active: Option<bool>,
}

/// A category with its children, used for navigation menus.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    /// The category itself
    #[serde(flatten)]
    pub category: category::Model,
    /// Direct children, each with their own subtree
    pub children: Vec<CategoryNode>,
}

fn validated_name_and_slug(name: &str) -> Result<(String, String)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "Category name cannot be empty"));
    }
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(Error::validation(
            "name",
            "Category name must contain letters or digits",
        ));
    }
    Ok((name.to_string(), slug))
}

async fn ensure_slug_free<C: ConnectionTrait>(
    db: &C,
    slug: &str,
    except_id: Option<i64>,
) -> Result<()> {
    let mut query = Category::find().filter(category::Column::Slug.eq(slug));
    if let Some(id) = except_id {
        query = query.filter(category::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!(
            "A category with slug '{slug}' already exists"
        )));
    }
    Ok(())
}

/// Retrieves all categories ordered by position, then name.
pub async fn list_categories(db: &DatabaseConnection) -> Result<Vec<category::Model>> {
    Category::find()
        .order_by_asc(category::Column::SortOrder)
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a category by its unique ID.
pub async fn get_category_by_id<C: ConnectionTrait>(
    db: &C,
    category_id: i64,
) -> Result<Option<category::Model>> {
    Category::find_by_id(category_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a category by slug.
pub async fn get_category_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<Option<category::Model>> {
    Category::find()
        .filter(category::Column::Slug.eq(slug))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a category. The slug is derived from the name and must be unique.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or has no letters/digits (`Validation`)
/// - The derived slug is already taken (`Conflict`)
/// - The parent category does not exist (`Validation`)
pub async fn create_category<C: ConnectionTrait>(
    db: &C,
    input: CategoryInput,
) -> Result<category::Model> {
    let (name, slug) = validated_name_and_slug(&input.name)?;
    ensure_slug_free(db, &slug, None).await?;

    if let Some(parent_id) = input.parent_id {
        if get_category_by_id(db, parent_id).await?.is_none() {
            return Err(Error::validation(
                "parent_id",
                format!("Parent category {parent_id} does not exist"),
            ));
        }
    }

    let now = chrono::Utc::now();
    let model = category::ActiveModel {
        name: Set(name),
        slug: Set(slug),
        description: Set(input.description),
        parent_id: Set(input.parent_id),
        sort_order: Set(input.sort_order),
        is_active: Set(input.is_active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created = model.insert(db).await?;
    info!("Created category '{}' ({})", created.name, created.slug);
    Ok(created)
}

/// Applies a partial edit, re-deriving the slug on rename and validating a
/// new parent.
///
/// # Errors
/// Returns an error if:
/// - The category does not exist (`NotFound`)
/// - The new name is invalid or its slug is taken by another category
/// - The new parent is the category itself or one of its descendants (`Validation`)
pub async fn update_category(
    db: &DatabaseConnection,
    category_id: i64,
    changes: CategoryChanges,
) -> Result<category::Model> {
    let existing = get_category_by_id(db, category_id)
        .await?
        .ok_or_else(|| Error::not_found("category", category_id))?;
    let mut model: category::ActiveModel = existing.into();

    if let Some(name) = changes.name {
        let (name, slug) = validated_name_and_slug(&name)?;
        ensure_slug_free(db, &slug, Some(category_id)).await?;
        model.name = Set(name);
        model.slug = Set(slug);
    }
    if let Some(description) = changes.description {
        model.description = Set(description);
    }
    if let Some(parent_id) = changes.parent_id {
        if let Some(parent_id) = parent_id {
            if get_category_by_id(db, parent_id).await?.is_none() {
                return Err(Error::validation(
                    "parent_id",
                    format!("Parent category {parent_id} does not exist"),
                ));
            }
            if descendant_ids(db, category_id).await?.contains(&parent_id) {
                return Err(Error::validation(
                    "parent_id",
                    "A category cannot be moved under itself or one of its descendants",
                ));
            }
        }
        model.parent_id = Set(parent_id);
    }
    if let Some(sort_order) = changes.sort_order {
        model.sort_order = Set(sort_order);
    }
    if let Some(is_active) = changes.is_active {
        model.is_active = Set(is_active);
    }
    model.updated_at = Set(chrono::Utc::now());

    model.update(db).await.map_err(Into::into)
}

/// Deletes a category that has neither products nor child categories.
///
/// # Errors
/// Returns `NotFound` for an unknown id and `Conflict` when products or
/// children still reference the category.
pub async fn delete_category(db: &DatabaseConnection, category_id: i64) -> Result<()> {
    let existing = get_category_by_id(db, category_id)
        .await?
        .ok_or_else(|| Error::not_found("category", category_id))?;

    let product_count = Product::find()
        .filter(product::Column::CategoryId.eq(category_id))
        .count(db)
        .await?;
    if product_count > 0 {
        return Err(Error::conflict(format!(
            "Category '{}' still has {product_count} product(s)",
            existing.name
        )));
    }

    let child_count = Category::find()
        .filter(category::Column::ParentId.eq(category_id))
        .count(db)
        .await?;
    if child_count > 0 {
        return Err(Error::conflict(format!(
            "Category '{}' still has {child_count} subcategory(ies)",
            existing.name
        )));
    }

    existing.delete(db).await?;
    info!("Deleted category {category_id}");
    Ok(())
}

/// Builds the full category tree, roots first, siblings by position then name.
pub async fn category_tree(db: &DatabaseConnection) -> Result<Vec<CategoryNode>> {
    let all = list_categories(db).await?;

    let mut children: HashMap<Option<i64>, Vec<category::Model>> = HashMap::new();
    for category in all {
        children.entry(category.parent_id).or_default().push(category);
    }

    fn build(
        parent: Option<i64>,
        children: &mut HashMap<Option<i64>, Vec<category::Model>>,
    ) -> Vec<CategoryNode> {
        let level = children.remove(&parent).unwrap_or_default();
        level
            .into_iter()
            .map(|category| {
                let id = category.id;
                CategoryNode {
                    category,
                    children: build(Some(id), children),
                }
            })
            .collect()
    }

    Ok(build(None, &mut children))
}

/// Returns the chain of categories from the root down to `category_id` (inclusive).
///
/// # Errors
/// Returns `NotFound` if `category_id` does not exist.
pub async fn ancestors(db: &DatabaseConnection, category_id: i64) -> Result<Vec<category::Model>> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(category_id);

    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        let Some(category) = get_category_by_id(db, id).await? else {
            if id == category_id {
                return Err(Error::not_found("category", category_id));
            }
            break;
        };
        current = category.parent_id;
        chain.push(category);
    }

    chain.reverse();
    Ok(chain)
}

/// Returns `category_id` and the ids of all categories below it.
pub async fn descendant_ids<C: ConnectionTrait>(db: &C, category_id: i64) -> Result<Vec<i64>> {
    let edges: Vec<(i64, Option<i64>)> = Category::find()
        .select_only()
        .column(category::Column::Id)
        .column(category::Column::ParentId)
        .into_tuple()
        .all(db)
        .await?;

    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for (id, parent_id) in edges {
        if let Some(parent_id) = parent_id {
            children.entry(parent_id).or_default().push(id);
        }
    }

    let mut result = vec![category_id];
    let mut seen: HashSet<i64> = HashSet::from([category_id]);
    let mut queue = VecDeque::from([category_id]);
    while let Some(id) = queue.pop_front() {
        for &child in children.get(&id).into_iter().flatten() {
            if seen.insert(child) {
                result.push(child);
                queue.push_back(child);
            }
        }
    }

    Ok(result)
}

/// Finds a category by name ignoring case, used by the CSV importer.
pub async fn find_category_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<category::Model>> {
    let wanted = name.trim().to_lowercase();
    let slug = slugify(&wanted);
    let by_slug = Category::find()
        .filter(category::Column::Slug.eq(slug))
        .all(db)
        .await?;
    Ok(by_slug
        .into_iter()
        .find(|category| category.name.to_lowercase() == wanted))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_category_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_category(&db, CategoryInput::named("   ")).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { field, .. } if field == "name"));

        let result = create_category(&db, CategoryInput::named("!!!")).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_category(&db, CategoryInput::named("Home & Garden")).await?;
        assert_eq!(first.slug, "home-garden");

        let result = create_category(&db, CategoryInput::named("home garden")).await;
        assert!(matches!(result.unwrap_err(), Error::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_with_missing_parent() -> Result<()> {
        let db = setup_test_db().await?;
        let result = create_category(&db, CategoryInput::named("Orphan").under(42)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { field, .. } if field == "parent_id"));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_category_with_products_fails() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Drinks").await?;
        create_test_product(&db, "Cola", Some(category.id)).await?;

        let result = delete_category(&db, category.id).await;
        assert!(matches!(result.unwrap_err(), Error::Conflict { .. }));
        assert!(get_category_by_id(&db, category.id).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_category_with_children_fails() -> Result<()> {
        let db = setup_test_db().await?;
        let parent = create_test_category(&db, "Clothing").await?;
        create_category(&db, CategoryInput::named("Shirts").under(parent.id)).await?;

        let result = delete_category(&db, parent.id).await;
        assert!(matches!(result.unwrap_err(), Error::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_empty_category() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Seasonal").await?;
        delete_category(&db, category.id).await?;
        assert!(get_category_by_id(&db, category.id).await?.is_none());

        let result = delete_category(&db, category.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_tree_ancestors_and_descendants() -> Result<()> {
        let db = setup_test_db().await?;
        let root = create_test_category(&db, "Electronics").await?;
        let phones = create_category(&db, CategoryInput::named("Phones").under(root.id)).await?;
        let cases = create_category(&db, CategoryInput::named("Cases").under(phones.id)).await?;
        let other = create_test_category(&db, "Books").await?;

        let tree = category_tree(&db).await?;
        assert_eq!(tree.len(), 2);
        let electronics = tree.iter().find(|n| n.category.id == root.id).unwrap();
        assert_eq!(electronics.children.len(), 1);
        assert_eq!(electronics.children[0].children[0].category.id, cases.id);

        let chain = ancestors(&db, cases.id).await?;
        let names: Vec<&str> = chain.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Electronics", "Phones", "Cases"]);

        let mut ids = descendant_ids(&db, root.id).await?;
        ids.sort_unstable();
        assert_eq!(ids, vec![root.id, phones.id, cases.id]);
        assert_eq!(descendant_ids(&db, other.id).await?, vec![other.id]);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_rejects_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let root = create_test_category(&db, "Garden").await?;
        let child = create_category(&db, CategoryInput::named("Tools").under(root.id)).await?;

        let move_under = |parent: i64| CategoryChanges {
            parent_id: Some(Some(parent)),
            ..Default::default()
        };
        let result = update_category(&db, root.id, move_under(child.id)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { field, .. } if field == "parent_id"));

        let result = update_category(&db, root.id, move_under(root.id)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_renames_and_reslugs() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Snacks").await?;
        let rename = CategoryChanges {
            name: Some("Sweet Snacks".to_string()),
            ..Default::default()
        };
        let updated = update_category(&db, category.id, rename).await?;
        assert_eq!(updated.slug, "sweet-snacks");
        assert!(get_category_by_slug(&db, "sweet-snacks").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_update_keeps_visibility_and_order() -> Result<()> {
        let db = setup_test_db().await?;
        let root = create_test_category(&db, "Outdoor").await?;
        let mut input = CategoryInput::named("Tents").under(root.id);
        input.sort_order = 4;
        input.is_active = false;
        let tents = create_category(&db, input).await?;

        let changes: CategoryChanges =
            serde_json::from_str(r#"{"description":"Shelter for camping"}"#).unwrap();
        let updated = update_category(&db, tents.id, changes).await?;
        assert_eq!(updated.description.as_deref(), Some("Shelter for camping"));
        assert_eq!(updated.sort_order, 4);
        assert!(!updated.is_active);
        assert_eq!(updated.parent_id, Some(root.id));
        assert_eq!(updated.slug, "tents");

        let changes: CategoryChanges = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        let promoted = update_category(&db, tents.id, changes).await?;
        assert_eq!(promoted.parent_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_find_category_by_name_ignores_case() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Kitchen").await?;
        let found = find_category_by_name(&db, "  KITCHEN ").await?.unwrap();
        assert_eq!(found.id, category.id);
        assert!(find_category_by_name(&db, "Bathroom").await?.is_none());
        Ok(())
    }
}
