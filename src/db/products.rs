use super::models::{Page, PriceList, Product, ProductQuality, QualityListing};
use super::{contains_pattern, inserted_id};
use crate::domain::{Money, Quality, Quantity, now_text};
use serde::Deserialize;
use sqlx::{Any, AnyConnection, QueryBuilder};

const PRODUCT_COLUMNS: &str = "id, name, description, image_url, created_at, updated_at";
const QUALITY_COLUMNS: &str = "pq.id, pq.product_id, pq.quality, pq.retail_price, \
     pq.wholesale_price, pq.broker_price, pq.stock_grams, pq.created_at, pq.updated_at";

pub const PRODUCTS_PER_PAGE: i64 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewQuality {
    pub quality: Quality,
    pub retail_price: Money,
    pub wholesale_price: Money,
    pub broker_price: Money,
    #[serde(default)]
    pub stock_quantity: Quantity,
}

impl NewQuality {
    pub fn validate(&self) -> Result<(), String> {
        for (label, price) in [
            ("Retail price", self.retail_price),
            ("Wholesale price", self.wholesale_price),
            ("Broker price", self.broker_price),
        ] {
            if price.is_negative() {
                return Err(format!("{label} cannot be negative."));
            }
        }
        if self.stock_quantity.is_negative() {
            return Err("Stock quantity cannot be negative.".to_string());
        }
        Ok(())
    }
}

/// Sort keys accepted by the product listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Name,
    Quality,
    RetailPrice,
    WholesalePrice,
    BrokerPrice,
    Stock,
}

impl ProductSort {
    fn column(self) -> &'static str {
        match self {
            ProductSort::Name => "p.name",
            ProductSort::Quality => "pq.quality",
            ProductSort::RetailPrice => "pq.retail_price",
            ProductSort::WholesalePrice => "pq.wholesale_price",
            ProductSort::BrokerPrice => "pq.broker_price",
            ProductSort::Stock => "pq.stock_grams",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub query: Option<String>,
    pub quality_filter: Option<Quality>,
    #[serde(default)]
    pub sort_by: ProductSort,
    /// `asc` (default) or `desc`.
    pub sort_order: Option<String>,
    pub page: Option<i64>,
}

impl ProductFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Any>) {
        qb.push(" WHERE 1 = 1");
        if let Some(q) = self.query.as_deref().filter(|q| !q.trim().is_empty()) {
            let pattern = contains_pattern(q);
            qb.push(" AND (LOWER(p.name) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(COALESCE(p.description, '')) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(quality) = self.quality_filter {
            qb.push(" AND pq.quality = ").push_bind(quality.as_str());
        }
    }
}

pub async fn insert_product(
    conn: &mut AnyConnection,
    product: &NewProduct,
) -> Result<i64, sqlx::Error> {
    let now = now_text();
    let res = sqlx::query(
        "INSERT INTO products (name, description, image_url, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(product.name.trim())
    .bind(product.description.as_deref())
    .bind(product.image_url.as_deref())
    .bind(now.as_str())
    .bind(now.as_str())
    .execute(&mut *conn)
    .await?;
    inserted_id(conn, &res).await
}

pub async fn find_product(
    conn: &mut AnyConnection,
    id: i64,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Exact, case-insensitive name match.
pub async fn find_product_by_name(
    conn: &mut AnyConnection,
    name: &str,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE LOWER(name) = ? ORDER BY id LIMIT 1"
    ))
    .bind(name.trim().to_lowercase())
    .fetch_optional(&mut *conn)
    .await
}

pub async fn delete_product(conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Products whose name contains `q`, at most `limit`.
pub async fn search_products(
    conn: &mut AnyConnection,
    q: &str,
    limit: i64,
) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE LOWER(name) LIKE ? ORDER BY name LIMIT ?"
    ))
    .bind(contains_pattern(q))
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
}

pub async fn qualities_of(
    conn: &mut AnyConnection,
    product_id: i64,
) -> Result<Vec<ProductQuality>, sqlx::Error> {
    sqlx::query_as::<_, ProductQuality>(&format!(
        "SELECT {QUALITY_COLUMNS} FROM product_qualities pq \
         WHERE pq.product_id = ? ORDER BY pq.quality"
    ))
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn find_quality(
    conn: &mut AnyConnection,
    id: i64,
) -> Result<Option<ProductQuality>, sqlx::Error> {
    sqlx::query_as::<_, ProductQuality>(&format!(
        "SELECT {QUALITY_COLUMNS} FROM product_qualities pq WHERE pq.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Quality variant joined with its product.
pub async fn find_listing(
    conn: &mut AnyConnection,
    quality_id: i64,
) -> Result<Option<QualityListing>, sqlx::Error> {
    sqlx::query_as::<_, QualityListing>(&format!(
        "SELECT {QUALITY_COLUMNS}, p.name AS product_name, p.description AS product_description \
         FROM product_qualities pq JOIN products p ON p.id = pq.product_id WHERE pq.id = ?"
    ))
    .bind(quality_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn find_quality_of(
    conn: &mut AnyConnection,
    product_id: i64,
    quality: Quality,
) -> Result<Option<ProductQuality>, sqlx::Error> {
    sqlx::query_as::<_, ProductQuality>(&format!(
        "SELECT {QUALITY_COLUMNS} FROM product_qualities pq \
         WHERE pq.product_id = ? AND pq.quality = ?"
    ))
    .bind(product_id)
    .bind(quality.as_str())
    .fetch_optional(&mut *conn)
    .await
}

pub async fn insert_quality(
    conn: &mut AnyConnection,
    product_id: i64,
    q: &NewQuality,
) -> Result<i64, sqlx::Error> {
    let now = now_text();
    let res = sqlx::query(
        r"
        INSERT INTO product_qualities
            (product_id, quality, retail_price, wholesale_price, broker_price, stock_grams,
             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(product_id)
    .bind(q.quality.as_str())
    .bind(q.retail_price.paise())
    .bind(q.wholesale_price.paise())
    .bind(q.broker_price.paise())
    .bind(q.stock_quantity.grams())
    .bind(now.as_str())
    .bind(now.as_str())
    .execute(&mut *conn)
    .await?;
    inserted_id(conn, &res).await
}

/// Inserts the variant or replaces prices and stock of the existing one.
pub async fn upsert_quality(
    conn: &mut AnyConnection,
    product_id: i64,
    q: &NewQuality,
) -> Result<i64, sqlx::Error> {
    match find_quality_of(conn, product_id, q.quality).await? {
        Some(existing) => {
            sqlx::query(
                r"
                UPDATE product_qualities
                SET retail_price = ?, wholesale_price = ?, broker_price = ?, stock_grams = ?,
                    updated_at = ?
                WHERE id = ?
                ",
            )
            .bind(q.retail_price.paise())
            .bind(q.wholesale_price.paise())
            .bind(q.broker_price.paise())
            .bind(q.stock_quantity.grams())
            .bind(now_text())
            .bind(existing.id)
            .execute(&mut *conn)
            .await?;
            Ok(existing.id)
        }
        None => insert_quality(conn, product_id, q).await,
    }
}

pub async fn delete_quality(conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM product_qualities WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn set_stock(
    conn: &mut AnyConnection,
    quality_id: i64,
    stock: Quantity,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE product_qualities SET stock_grams = ?, updated_at = ? WHERE id = ?")
        .bind(stock.grams())
        .bind(now_text())
        .bind(quality_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Filtered, sorted page of quality variants with product data.
pub async fn list_qualities(
    conn: &mut AnyConnection,
    filter: &ProductFilter,
) -> Result<Page<QualityListing>, sqlx::Error> {
    let mut count_qb: QueryBuilder<'_, Any> = QueryBuilder::new(
        "SELECT COUNT(*) FROM product_qualities pq JOIN products p ON p.id = pq.product_id",
    );
    filter.push_where(&mut count_qb);
    let (total,): (i64,) = count_qb.build_query_as().fetch_one(&mut *conn).await?;

    let (page, offset) = Page::<QualityListing>::bounds(filter.page, PRODUCTS_PER_PAGE, total);
    let direction = match filter.sort_order.as_deref() {
        Some(o) if o.eq_ignore_ascii_case("desc") => "DESC",
        _ => "ASC",
    };

    let mut qb: QueryBuilder<'_, Any> = QueryBuilder::new(format!(
        "SELECT {QUALITY_COLUMNS}, p.name AS product_name, p.description AS product_description \
         FROM product_qualities pq JOIN products p ON p.id = pq.product_id"
    ));
    filter.push_where(&mut qb);
    qb.push(format!(
        " ORDER BY {} {direction}, pq.id ASC LIMIT ",
        filter.sort_by.column()
    ))
    .push_bind(PRODUCTS_PER_PAGE)
    .push(" OFFSET ")
    .push_bind(offset);

    let items = qb
        .build_query_as::<QualityListing>()
        .fetch_all(&mut *conn)
        .await?;
    Ok(Page::new(items, page, PRODUCTS_PER_PAGE, total))
}

/// Every variant with its product, ordered by product name then quality.
pub async fn all_listings(conn: &mut AnyConnection) -> Result<Vec<QualityListing>, sqlx::Error> {
    sqlx::query_as::<_, QualityListing>(&format!(
        "SELECT {QUALITY_COLUMNS}, p.name AS product_name, p.description AS product_description \
         FROM product_qualities pq JOIN products p ON p.id = pq.product_id \
         ORDER BY p.name, pq.quality"
    ))
    .fetch_all(&mut *conn)
    .await
}

pub async fn insert_price_list(
    conn: &mut AnyConnection,
    file_name: &str,
    uploaded_by: Option<i64>,
) -> Result<i64, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO price_lists (file_name, uploaded_by, uploaded_at, processed, rows_processed) \
         VALUES (?, ?, ?, 0, 0)",
    )
    .bind(file_name)
    .bind(uploaded_by)
    .bind(now_text())
    .execute(&mut *conn)
    .await?;
    inserted_id(conn, &res).await
}

pub async fn mark_price_list_processed(
    conn: &mut AnyConnection,
    id: i64,
    rows: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE price_lists SET processed = 1, rows_processed = ? WHERE id = ?")
        .bind(rows)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn find_price_list(
    conn: &mut AnyConnection,
    id: i64,
) -> Result<Option<PriceList>, sqlx::Error> {
    sqlx::query_as::<_, PriceList>(
        "SELECT id, file_name, uploaded_by, uploaded_at, processed, rows_processed \
         FROM price_lists WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}
