//! Product CSV import and export.
//!
//! The column layout is fixed so a file exported here can be edited in a
//! spreadsheet and imported back: rows with an existing `ID` update that
//! product, everything else creates a new one.

use crate::{
    core::{
        category::{self, CategoryInput},
        product::{self, ProductInput},
    },
    entities::{Category, Product, category as category_entity, product as product_entity},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, TransactionTrait, prelude::*};
use serde::Serialize;
use std::{
    collections::HashMap,
    io::{Read, Write},
};
use tracing::{info, warn};

/// Column headers, in file order.
pub const COLUMNS: [&str; 10] = [
    "ID",
    "Name",
    "Price",
    "Description",
    "Category",
    "Category ID",
    "Stock",
    "Meta Description",
    "Meta Title",
    "Main Image",
];

/// A row that was skipped during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based line in the file (the header is line 1)
    pub line: u64,
    /// Why the row was skipped
    pub message: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    /// New products
    pub created: u64,
    /// Existing products overwritten
    pub updated: u64,
    /// Rows skipped because of errors
    pub skipped: u64,
    /// One entry per skipped row
    pub errors: Vec<RowError>,
}

/// Writes every product, ordered by id. Returns the number of rows written.
pub async fn export_products<W: Write>(db: &DatabaseConnection, writer: W) -> Result<usize> {
    let categories: HashMap<i64, String> = Category::find()
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let products = Product::find()
        .order_by_asc(product_entity::Column::Id)
        .all(db)
        .await?;

    let mut out = csv::Writer::from_writer(writer);
    out.write_record(COLUMNS)?;
    for p in &products {
        let category_name = p
            .category_id
            .and_then(|id| categories.get(&id))
            .map_or("", String::as_str);
        out.write_record([
            p.id.to_string().as_str(),
            p.name.as_str(),
            format!("{:.2}", p.price).as_str(),
            p.description.as_str(),
            category_name,
            p.category_id.map(|id| id.to_string()).unwrap_or_default().as_str(),
            p.stock.to_string().as_str(),
            p.meta_description.as_deref().unwrap_or_default(),
            p.meta_title.as_deref().unwrap_or_default(),
            p.main_image.as_deref().unwrap_or_default(),
        ])?;
    }
    out.flush()?;

    info!("Exported {} product(s) to CSV", products.len());
    Ok(products.len())
}

fn check_header(header: &csv::StringRecord) -> Result<()> {
    let matches = header.len() == COLUMNS.len()
        && header
            .iter()
            .zip(COLUMNS)
            .all(|(got, want)| got.trim().eq_ignore_ascii_case(want));
    if matches {
        Ok(())
    } else {
        Err(Error::Csv {
            line: 1,
            message: format!("Header must be: {}", COLUMNS.join(", ")),
        })
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// One parsed data row, before category resolution.
struct ParsedRow {
    id: Option<i64>,
    name: String,
    price: f64,
    description: String,
    category_name: Option<String>,
    category_id: Option<i64>,
    stock: i64,
    meta_description: Option<String>,
    meta_title: Option<String>,
    main_image: Option<String>,
}

fn parse_row(record: &csv::StringRecord) -> std::result::Result<ParsedRow, String> {
    let field = |index: usize| record.get(index).unwrap_or_default().trim();

    let id = match field(0) {
        "" => None,
        raw => Some(raw.parse::<i64>().map_err(|_| format!("ID '{raw}' is not a number"))?),
    };
    let name = field(1);
    if name.is_empty() {
        return Err("Name is required".to_string());
    }
    let price = match field(2) {
        "" => return Err("Price is required".to_string()),
        raw => raw
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p >= 0.0)
            .ok_or_else(|| format!("Price '{raw}' must be a non-negative number"))?,
    };
    let category_id = match field(5) {
        "" => None,
        raw => Some(
            raw.parse::<i64>()
                .map_err(|_| format!("Category ID '{raw}' is not a number"))?,
        ),
    };
    let stock = match field(6) {
        "" => 0,
        raw => raw
            .parse::<i64>()
            .ok()
            .filter(|s| *s >= 0)
            .ok_or_else(|| format!("Stock '{raw}' must be a non-negative integer"))?,
    };

    Ok(ParsedRow {
        id,
        name: name.to_string(),
        price,
        description: field(3).to_string(),
        category_name: optional(field(4)),
        category_id,
        stock,
        meta_description: optional(field(7)),
        meta_title: optional(field(8)),
        main_image: optional(field(9)),
    })
}

/// Resolves the row's category: an existing `Category ID` wins, then the
/// `Category` name (case-insensitive), and an unknown name creates a root
/// category.
async fn resolve_category<C: ConnectionTrait>(
    txn: &C,
    row: &ParsedRow,
    cache: &mut HashMap<String, i64>,
) -> Result<Option<i64>> {
    if let Some(id) = row.category_id {
        if category::get_category_by_id(txn, id).await?.is_some() {
            return Ok(Some(id));
        }
    }
    let Some(name) = row.category_name.as_deref() else {
        return Ok(None);
    };

    let cache_key = name.to_lowercase();
    if let Some(id) = cache.get(&cache_key) {
        return Ok(Some(*id));
    }
    let found: category_entity::Model = match category::find_category_by_name(txn, name).await? {
        Some(existing) => existing,
        None => {
            info!("Creating category '{name}' from CSV import");
            category::create_category(txn, CategoryInput::named(name)).await?
        }
    };
    cache.insert(cache_key, found.id);
    Ok(Some(found.id))
}

enum RowOutcome {
    Created,
    Updated,
}

async fn import_row<C: ConnectionTrait>(
    txn: &C,
    row: ParsedRow,
    cache: &mut HashMap<String, i64>,
) -> Result<RowOutcome> {
    let category_id = resolve_category(txn, &row, cache).await?;
    let existing = match row.id {
        Some(id) => product::get_product_by_id(txn, id).await?,
        None => None,
    };

    let mut input = ProductInput::new(&row.name, row.price, row.stock).in_category(category_id);
    input.description = row.description;
    input.meta_title = row.meta_title;
    input.meta_description = row.meta_description;
    input.main_image = row.main_image;

    match existing {
        Some(current) => {
            input.is_active = current.is_active;
            if input.main_image.is_none() {
                input.main_image = current.main_image;
            }
            product::update_product(txn, current.id, input.into()).await?;
            Ok(RowOutcome::Updated)
        }
        None => {
            product::create_product(txn, input).await?;
            Ok(RowOutcome::Created)
        }
    }
}

/// Imports products from CSV.
///
/// The whole import runs in one transaction. Rows that fail to parse or
/// validate are skipped and reported; database failures abort the import.
///
/// # Errors
/// Returns `Csv` if the header does not match [`COLUMNS`].
pub async fn import_products<R: Read>(db: &DatabaseConnection, reader: R) -> Result<ImportSummary> {
    let mut input = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    check_header(input.headers()?)?;

    let txn = db.begin().await?;
    let mut summary = ImportSummary::default();
    let mut cache = HashMap::new();

    for (index, record) in input.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let (line, parsed) = match record {
            Ok(record) => {
                let line = record.position().map_or(fallback_line, csv::Position::line);
                (line, parse_row(&record))
            }
            Err(e) => (fallback_line, Err(e.to_string())),
        };

        let outcome = match parsed {
            Ok(row) => match import_row(&txn, row, &mut cache).await {
                Ok(outcome) => Ok(outcome),
                Err(e @ (Error::Database(_) | Error::Io(_))) => return Err(e),
                Err(e) => Err(e.to_string()),
            },
            Err(message) => Err(message),
        };

        match outcome {
            Ok(RowOutcome::Created) => summary.created += 1,
            Ok(RowOutcome::Updated) => summary.updated += 1,
            Err(message) => {
                warn!("Skipping CSV line {line}: {message}");
                summary.skipped += 1;
                summary.errors.push(RowError { line, message });
            }
        }
    }

    txn.commit().await?;
    info!(
        "CSV import: {} created, {} updated, {} skipped",
        summary.created, summary.updated, summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::PaginatorTrait;

    const HEADER: &str =
        "ID,Name,Price,Description,Category,Category ID,Stock,Meta Description,Meta Title,Main Image\n";

    #[tokio::test]
    async fn test_export_writes_header_and_rows() -> Result<()> {
        let db = setup_test_db().await?;
        let books = create_test_category(&db, "Books").await?;
        create_custom_product(&db, "Atlas, Large", 12.5, 3, Some(books.id)).await?;
        create_test_product(&db, "Pen", None).await?;

        let mut out = Vec::new();
        assert_eq!(export_products(&db, &mut out).await?, 2);
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), HEADER.trim_end());
        let first = lines.next().unwrap();
        assert!(first.contains("\"Atlas, Large\""));
        assert!(first.contains(",12.50,"));
        assert!(first.contains(",Books,"));
        Ok(())
    }

    #[tokio::test]
    async fn test_export_then_import_updates_instead_of_duplicating() -> Result<()> {
        let db = setup_test_db().await?;
        let books = create_test_category(&db, "Books").await?;
        create_custom_product(&db, "Atlas", 12.5, 3, Some(books.id)).await?;
        create_test_product(&db, "Pen", None).await?;

        let mut out = Vec::new();
        export_products(&db, &mut out).await?;
        let summary = import_products(&db, out.as_slice()).await?;

        assert_eq!(summary.created, 0);
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(Product::find().count(&db).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_import_creates_and_resolves_categories() -> Result<()> {
        let db = setup_test_db().await?;
        let books = create_test_category(&db, "Books").await?;
        let csv = format!(
            "{HEADER}\
             ,Novel,9.99,A story,books,,4,,,\n\
             ,Poster,5,,Art,,,,,\n\
             ,Map,3,,,{},1,,,\n",
            books.id
        );

        let summary = import_products(&db, csv.as_bytes()).await?;
        assert_eq!(summary.created, 3);

        let novel = Product::find()
            .filter(product_entity::Column::Name.eq("Novel"))
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(novel.category_id, Some(books.id));
        assert_eq!(novel.stock, 4);

        let art = category::find_category_by_name(&db, "art").await?.unwrap();
        let poster = Product::find()
            .filter(product_entity::Column::Name.eq("Poster"))
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(poster.category_id, Some(art.id));
        assert_eq!(poster.stock, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_rows_are_skipped() -> Result<()> {
        let db = setup_test_db().await?;
        let csv = format!(
            "{HEADER}\
             ,Good,1,,,,1,,,\n\
             ,,1,,,,1,,,\n\
             ,NoPrice,,,,,1,,,\n\
             ,Cheap,-3,,,,1,,,\n\
             ,Fractional,2,,,,1.5,,,\n"
        );

        let summary = import_products(&db, csv.as_bytes()).await?;
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 4);
        let lines: Vec<u64> = summary.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6]);
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_header_is_fatal() -> Result<()> {
        let db = setup_test_db().await?;
        let result = import_products(&db, "Name,Price\nPen,1\n".as_bytes()).await;
        assert!(matches!(result.unwrap_err(), Error::Csv { line: 1, .. }));

        let lowercase = HEADER.to_lowercase();
        assert!(import_products(&db, lowercase.as_bytes()).await.is_ok());
        Ok(())
    }
}
