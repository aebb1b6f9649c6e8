use crate::db::models::{Page, Product, ProductQuality, QualityListing};
use crate::db::patch::{ProductPatch, QualityPatch};
use crate::db::products::{self, NewProduct, NewQuality, ProductFilter};
use crate::db::Db;
use crate::domain::{Money, PriceTier, Quantity};
use crate::error::{AppError, AppResult};
use serde::Serialize;
use tracing::info;

pub const SEARCH_LIMIT: i64 = 10;

/// Minimum query length for the billing screen's product search.
pub const BILLING_MIN_QUERY: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ProductWithQualities {
    #[serde(flatten)]
    pub product: Product,
    pub qualities: Vec<ProductQuality>,
}

pub async fn list(db: &Db, filter: &ProductFilter) -> AppResult<Page<QualityListing>> {
    let mut conn = db.acquire().await?;
    Ok(products::list_qualities(&mut conn, filter).await?)
}

pub async fn detail(db: &Db, id: i64) -> AppResult<ProductWithQualities> {
    let mut conn = db.acquire().await?;
    let product = products::find_product(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    Ok(ProductWithQualities {
        qualities: products::qualities_of(&mut conn, id).await?,
        product,
    })
}

fn check_name(name: &str) -> AppResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Product name is required."));
    }
    if name.chars().count() > 100 {
        return Err(AppError::validation(
            "Product name must be at most 100 characters.",
        ));
    }
    Ok(())
}

pub async fn create_product(db: &Db, form: &NewProduct) -> AppResult<Product> {
    check_name(&form.name)?;
    let mut conn = db.acquire().await?;
    let id = products::insert_product(&mut conn, form).await?;
    info!(product_id = id, name = %form.name.trim(), "product created");
    products::find_product(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

pub async fn update_product(db: &Db, id: i64, patch: &ProductPatch) -> AppResult<Product> {
    if let Some(name) = &patch.name {
        check_name(name)?;
    }
    let mut conn = db.acquire().await?;
    if !patch.apply(&mut conn, id).await? {
        return Err(AppError::NotFound("Product"));
    }
    products::find_product(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

/// Deletes a product and, through the foreign key, its qualities.
pub async fn delete_product(db: &Db, id: i64) -> AppResult<()> {
    let mut conn = db.acquire().await?;
    if !products::delete_product(&mut conn, id).await? {
        return Err(AppError::NotFound("Product"));
    }
    info!(product_id = id, "product deleted");
    Ok(())
}

pub async fn add_quality(db: &Db, product_id: i64, form: &NewQuality) -> AppResult<ProductQuality> {
    form.validate().map_err(AppError::Validation)?;
    let mut tx = db.begin().await?;
    products::find_product(&mut tx, product_id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    if products::find_quality_of(&mut tx, product_id, form.quality)
        .await?
        .is_some()
    {
        return Err(AppError::conflict(format!(
            "Product already has a {} quality variant.",
            form.quality
        )));
    }
    let id = products::insert_quality(&mut tx, product_id, form).await?;
    let quality = products::find_quality(&mut tx, id)
        .await?
        .ok_or(AppError::NotFound("Product quality"))?;
    tx.commit().await?;
    Ok(quality)
}

pub async fn update_quality(db: &Db, id: i64, patch: &QualityPatch) -> AppResult<ProductQuality> {
    let prices = [
        patch.retail_price,
        patch.wholesale_price,
        patch.broker_price,
    ];
    if prices.iter().flatten().any(|p| p.is_negative()) {
        return Err(AppError::validation("Prices cannot be negative."));
    }
    if patch.stock_quantity.is_some_and(Quantity::is_negative) {
        return Err(AppError::validation("Stock quantity cannot be negative."));
    }
    let mut conn = db.acquire().await?;
    if !patch.apply(&mut conn, id).await? {
        return Err(AppError::NotFound("Product quality"));
    }
    products::find_quality(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Product quality"))
}

pub async fn delete_quality(db: &Db, id: i64) -> AppResult<()> {
    let mut conn = db.acquire().await?;
    if !products::delete_quality(&mut conn, id).await? {
        return Err(AppError::NotFound("Product quality"));
    }
    Ok(())
}

/// Name search with every hit's qualities. `min_len` guards short queries.
pub async fn search(db: &Db, q: &str, min_len: usize) -> AppResult<Vec<ProductWithQualities>> {
    let q = q.trim();
    if q.is_empty() || q.chars().count() < min_len {
        return Ok(Vec::new());
    }
    let mut conn = db.acquire().await?;
    let found = products::search_products(&mut conn, q, SEARCH_LIMIT).await?;
    let mut out = Vec::with_capacity(found.len());
    for product in found {
        out.push(ProductWithQualities {
            qualities: products::qualities_of(&mut conn, product.id).await?,
            product,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TierPrice {
    pub price: Money,
    pub stock: Quantity,
}

pub async fn price_for(db: &Db, quality_id: i64, tier: PriceTier) -> AppResult<TierPrice> {
    let mut conn = db.acquire().await?;
    let quality = products::find_quality(&mut conn, quality_id)
        .await?
        .ok_or(AppError::NotFound("Product quality"))?;
    Ok(TierPrice {
        price: quality.price_for(tier),
        stock: quality.stock,
    })
}
