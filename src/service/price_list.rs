//! CSV price-list import and export.
//!
//! Header names are matched case-insensitively against a small alias table so
//! sheets exported from other tools load without editing.

use crate::db::models::PriceList;
use crate::db::products::{self, NewProduct, NewQuality};
use crate::db::Db;
use crate::domain::{Money, Quality, Quantity};
use crate::error::{AppError, AppResult};
use serde::Serialize;
use tracing::{info, warn};

pub const EXPORT_FILE_NAME: &str = "current_products_list.csv";

pub const HEADER: [&str; 6] = [
    "Product Name",
    "Quality",
    "Retail Price",
    "Wholesale Price",
    "Broker Price",
    "Stock Quantity",
];

const REQUIRED: [(&str, &[&str]); 5] = [
    (
        "Product Name",
        &["product name", "product", "name", "item name", "item"],
    ),
    ("Quality", &["quality", "grade", "variant", "type"]),
    ("Retail Price", &["retail price", "retail", "mrp", "price"]),
    (
        "Wholesale Price",
        &["wholesale price", "wholesale", "bulk price"],
    ),
    (
        "Broker Price",
        &["broker price", "broker", "agent price", "distributor price"],
    ),
];

const STOCK_ALIASES: &[&str] = &["stock quantity", "stock", "stock (kg)"];

/// Column positions of a parsed header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub product: usize,
    pub quality: usize,
    pub retail: usize,
    pub wholesale: usize,
    pub broker: usize,
    pub stock: Option<usize>,
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| h == alias))
}

/// Resolves each required column, or names the first one that is missing.
pub fn resolve_columns(raw_headers: &csv::StringRecord) -> Result<Columns, String> {
    let headers: Vec<String> = raw_headers
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut found = [0usize; 5];
    for (slot, (standard, aliases)) in found.iter_mut().zip(REQUIRED) {
        *slot = find_column(&headers, aliases).ok_or_else(|| {
            let columns: Vec<&str> = raw_headers.iter().map(str::trim).collect();
            format!(
                "Missing required column: {standard}. Columns found: {}",
                columns.join(", ")
            )
        })?;
    }
    let [product, quality, retail, wholesale, broker] = found;
    Ok(Columns {
        product,
        quality,
        retail,
        wholesale,
        broker,
        stock: find_column(&headers, STOCK_ALIASES),
    })
}

/// One data row of a price list.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub product_name: String,
    pub quality: NewQuality,
}

/// Parses one record; `Ok(None)` for rows without a product name.
pub fn parse_row(record: &csv::StringRecord, cols: &Columns) -> Result<Option<PriceRow>, String> {
    let field = |i: usize| record.get(i).unwrap_or_default().trim();
    let product_name = field(cols.product);
    if product_name.is_empty() {
        return Ok(None);
    }

    let quality_text = field(cols.quality);
    let quality: Quality = quality_text.parse().map_err(|_| {
        format!(
            "Invalid quality '{quality_text}' for product '{product_name}'. \
             Expected premium, standard or economy."
        )
    })?;

    let price = |i: usize| {
        Money::parse(field(i)).ok_or_else(|| {
            format!("Invalid price value for product '{product_name}'. Prices must be numbers.")
        })
    };
    let row = NewQuality {
        quality,
        retail_price: price(cols.retail)?,
        wholesale_price: price(cols.wholesale)?,
        broker_price: price(cols.broker)?,
        // Unreadable stock counts as empty.
        stock_quantity: cols
            .stock
            .and_then(|i| Quantity::parse(field(i)))
            .unwrap_or_default(),
    };
    row.validate()
        .map_err(|e| format!("Product '{product_name}': {e}"))?;

    Ok(Some(PriceRow {
        product_name: product_name.to_string(),
        quality: row,
    }))
}

/// Parses a whole CSV document into rows, failing on the first bad row.
pub fn parse_price_list(data: &[u8]) -> AppResult<Vec<PriceRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);
    let cols = resolve_columns(reader.headers()?).map_err(AppError::Validation)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(row) = parse_row(&record, &cols).map_err(AppError::Validation)? {
            rows.push(row);
        }
    }
    if rows.is_empty() {
        return Err(AppError::validation(
            "No valid product data found in the file. Please check the format and try again.",
        ));
    }
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub message: String,
    pub price_list: PriceList,
    pub rows_processed: i64,
    pub products_created: i64,
}

/// Records the upload, then applies every row in one transaction.
///
/// A failed import leaves the upload recorded as unprocessed and the catalogue untouched.
pub async fn import(
    db: &Db,
    file_name: &str,
    uploaded_by: Option<i64>,
    data: &[u8],
) -> AppResult<ImportOutcome> {
    let file_name = if file_name.trim().is_empty() {
        "price_list.csv"
    } else {
        file_name.trim()
    };
    let price_list_id = {
        let mut conn = db.acquire().await?;
        products::insert_price_list(&mut conn, file_name, uploaded_by).await?
    };

    let rows = match parse_price_list(data) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(price_list_id, error = %e, "price list rejected");
            return Err(e);
        }
    };

    let mut tx = db.begin().await?;
    let mut products_created = 0;
    for row in &rows {
        let product_id = match products::find_product_by_name(&mut tx, &row.product_name).await? {
            Some(product) => product.id,
            None => {
                products_created += 1;
                products::insert_product(
                    &mut tx,
                    &NewProduct {
                        name: row.product_name.clone(),
                        description: None,
                        image_url: None,
                    },
                )
                .await?
            }
        };
        products::upsert_quality(&mut tx, product_id, &row.quality).await?;
    }
    let rows_processed = rows.len() as i64;
    products::mark_price_list_processed(&mut tx, price_list_id, rows_processed).await?;
    let price_list = products::find_price_list(&mut tx, price_list_id)
        .await?
        .ok_or(AppError::NotFound("Price list"))?;
    tx.commit().await?;

    info!(
        price_list_id,
        rows_processed, products_created, "price list processed"
    );
    Ok(ImportOutcome {
        message: "Price list uploaded and processed successfully!".to_string(),
        price_list,
        rows_processed,
        products_created,
    })
}

fn quality_label(quality: Quality) -> String {
    let text = quality.as_str();
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// The current catalogue in the import format.
pub async fn export(db: &Db) -> AppResult<Vec<u8>> {
    let mut conn = db.acquire().await?;
    let listings = products::all_listings(&mut conn).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for l in &listings {
        writer.write_record([
            l.product_name.clone(),
            quality_label(l.quality.quality),
            l.quality.retail_price.to_string(),
            l.quality.wholesale_price.to_string(),
            l.quality.broker_price.to_string(),
            l.quality.stock.to_string(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("flush price list export: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(csv_text: &str) -> AppResult<Vec<PriceRow>> {
        parse_price_list(csv_text.as_bytes())
    }

    #[test]
    fn aliases_are_case_insensitive() {
        let parsed = rows(
            "Item, GRADE ,MRP,Bulk Price,Agent Price,Stock\n\
             Almonds,Premium,950.00,900,850.5,12.5\n",
        )
        .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].product_name, "Almonds");
        assert_eq!(parsed[0].quality.quality, Quality::Premium);
        assert_eq!(parsed[0].quality.broker_price, Money(85_050));
        assert_eq!(parsed[0].quality.stock_quantity, Quantity(12_500));
    }

    #[test]
    fn missing_column_lists_found_columns() {
        let err = rows("Product Name,Quality,Retail Price\nA,premium,1\n").unwrap_err();
        let AppError::Validation(message) = err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(
            message,
            "Missing required column: Wholesale Price. Columns found: Product Name, Quality, Retail Price"
        );
    }

    #[test]
    fn blank_names_are_skipped_and_empty_sheets_rejected() {
        let parsed = rows(
            "Product Name,Quality,Retail Price,Wholesale Price,Broker Price\n\
             ,premium,1,1,1\n\
             Cashew,economy,500,450,400\n",
        )
        .unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(rows("Product Name,Quality,Retail Price,Wholesale Price,Broker Price\n").is_err());
    }

    #[test]
    fn bad_price_names_the_product() {
        let err = rows(
            "Product Name,Quality,Retail Price,Wholesale Price,Broker Price\n\
             Pista,standard,abc,1,1\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid price value for product 'Pista'"));
    }

    #[test]
    fn unknown_quality_is_rejected() {
        let err = rows(
            "Product Name,Quality,Retail Price,Wholesale Price,Broker Price\n\
             Pista,gold,1,1,1\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid quality 'gold'"));
    }

    #[test]
    fn quality_labels_are_capitalized() {
        assert_eq!(quality_label(Quality::Economy), "Economy");
    }
}
