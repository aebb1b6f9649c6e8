use crate::error::AppResult;
use crate::server::guards::CurrentUser;
use crate::server::routes::{CSV_CONTENT_TYPE, attachment};
use crate::server::router::AppState;
use crate::service::reports::{
    self, CreditQuery, CreditReport, CsvExport, CustomerQuery, CustomerReport, ProductQuery,
    ProductReport, SalesQuery, SalesReport,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    response::Response,
    routing::get,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ReportLink {
    name: &'static str,
    title: &'static str,
    path: &'static str,
    export: &'static str,
}

static REPORTS: [ReportLink; 4] = [
    ReportLink {
        name: "sales",
        title: "Sales Report",
        path: "/reports/sales",
        export: "/reports/export/sales",
    },
    ReportLink {
        name: "products",
        title: "Product Sales Report",
        path: "/reports/products",
        export: "/reports/export/products",
    },
    ReportLink {
        name: "customers",
        title: "Customer Summary",
        path: "/reports/customers",
        export: "/reports/export/customers",
    },
    ReportLink {
        name: "credit",
        title: "Credit Overview",
        path: "/reports/credit",
        export: "/reports/export/credit",
    },
];

async fn index(_user: CurrentUser) -> Json<&'static [ReportLink]> {
    Json(REPORTS.as_slice())
}

async fn sales(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<SalesQuery>,
) -> AppResult<Json<SalesReport>> {
    Ok(Json(reports::sales(&state.db, &query).await?))
}

async fn products(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ProductReport>> {
    Ok(Json(reports::products(&state.db, &query).await?))
}

async fn customers(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<CustomerReport>> {
    Ok(Json(reports::customers(&state.db, &query).await?))
}

async fn credit(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<CreditQuery>,
) -> AppResult<Json<CreditReport>> {
    Ok(Json(reports::credit(&state.db, &query).await?))
}

fn csv_response(export: CsvExport) -> Response {
    attachment(CSV_CONTENT_TYPE, &export.file_name, export.body)
}

async fn export_sales(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<SalesQuery>,
) -> AppResult<Response> {
    Ok(csv_response(reports::export_sales(&state.db, &query).await?))
}

async fn export_products(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ProductQuery>,
) -> AppResult<Response> {
    Ok(csv_response(
        reports::export_products(&state.db, &query).await?,
    ))
}

async fn export_customers(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Response> {
    Ok(csv_response(
        reports::export_customers(&state.db, &query).await?,
    ))
}

async fn export_credit(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<CreditQuery>,
) -> AppResult<Response> {
    Ok(csv_response(reports::export_credit(&state.db, &query).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports/", get(index))
        .route("/reports/sales", get(sales))
        .route("/reports/products", get(products))
        .route("/reports/customers", get(customers))
        .route("/reports/credit", get(credit))
        .route("/reports/export/sales", get(export_sales))
        .route("/reports/export/products", get(export_products))
        .route("/reports/export/customers", get(export_customers))
        .route("/reports/export/credit", get(export_credit))
}
