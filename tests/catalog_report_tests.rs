mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{As, Reply, TestApp};
use dryfruits::config::BasicConfig;
use serde_json::json;

async fn upload(app: &TestApp, who: As<'_>, file_name: &str, csv: &str) -> Reply {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/products/price-list/upload?file_name={file_name}"))
        .header(header::CONTENT_TYPE, "text/csv");
    if let As::Cookie(cookie) = who {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.raw(builder.body(Body::from(csv.to_string())).unwrap())
        .await
}

#[tokio::test]
async fn price_list_upload_creates_and_updates_the_catalogue() {
    let app = common::app("price-list").await;

    let sheet = "Item,Grade,MRP,Bulk Price,Agent Price,Stock\n\
                 Almonds,Premium,950,900,850,12.5\n\
                 Almonds,Economy,600,550,500,\n\
                 Cashews,standard,1100,1000,950,4\n";
    let reply = upload(&app, app.admin(), "march.csv", sheet).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    let outcome = reply.json();
    assert_eq!(outcome["rows_processed"], 3);
    assert_eq!(outcome["products_created"], 2);
    assert_eq!(outcome["price_list"]["file_name"], "march.csv");
    assert_eq!(outcome["price_list"]["processed"], true);

    // A second sheet updates the existing quality in place.
    let reply = upload(
        &app,
        app.admin(),
        "april.csv",
        "Product Name,Quality,Retail Price,Wholesale Price,Broker Price\n\
         Almonds,premium,975,925,875\n",
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    assert_eq!(reply.json()["products_created"], 0);

    let page = app
        .get("/products/?query=almonds&quality_filter=premium", app.admin())
        .await
        .json();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["retail_price"], "975.00");
    assert_eq!(page["items"][0]["product_name"], "Almonds");

    let reply = app.get("/products/price-list/template", app.admin()).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"current_products_list.csv\""
    );
    let text = reply.text();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("Product Name,Quality,Retail Price,Wholesale Price,Broker Price,Stock Quantity")
    );
    assert!(text.contains("Cashews,Standard,1100.00,1000.00,950.00,4.000"));
}

#[tokio::test]
async fn bad_price_lists_are_rejected_whole() {
    let app = common::app("price-list-bad").await;

    let reply = upload(
        &app,
        app.admin(),
        "short.csv",
        "Product Name,Quality,Retail Price\nAlmonds,premium,900\n",
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let message = reply.json()["error"]["message"].as_str().unwrap().to_string();
    assert!(message.starts_with("Missing required column: Wholesale Price."), "{message}");

    // The first row is valid but the second is not; nothing is applied.
    let reply = upload(
        &app,
        app.admin(),
        "mixed.csv",
        "Product Name,Quality,Retail Price,Wholesale Price,Broker Price\n\
         Walnuts,premium,900,850,800\n\
         Raisins,gold,300,250,200\n",
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let page = app.get("/products/?query=walnuts", app.admin()).await.json();
    assert_eq!(page["total"], 0);

    let uploads = app.get("/admin/price_lists/", app.admin()).await.json();
    assert_eq!(uploads["total"], 2);
    assert!(
        uploads["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|u| u["processed"] == 0)
    );

    // Executives may read the catalogue but not replace it.
    app.create_user("exec@example.com", "exec-pass-1", "executive")
        .await;
    let exec = app.login("exec@example.com", "exec-pass-1").await;
    let reply = upload(
        &app,
        As::Cookie(&exec),
        "x.csv",
        "Product Name,Quality,Retail Price,Wholesale Price,Broker Price\nA,premium,1,1,1\n",
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn oversized_price_lists_are_refused() {
    let app = common::app_with(
        "price-list-limit",
        BasicConfig {
            upload_limit_bytes: 64,
            ..BasicConfig::default()
        },
    )
    .await;

    let sheet = format!(
        "Product Name,Quality,Retail Price,Wholesale Price,Broker Price\n{}",
        "Almonds,premium,900,850,800\n".repeat(10)
    );
    let reply = upload(&app, app.admin(), "big.csv", &sheet).await;
    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
    let page = app.get("/products/?query=almonds", app.admin()).await.json();
    assert_eq!(page["total"], 0);

    let mut request = Request::builder()
        .method("POST")
        .uri("/products/price-list/upload?file_name=big.csv")
        .header(header::CONTENT_TYPE, "text/csv")
        .header(header::CONTENT_LENGTH, sheet.len());
    if let As::Cookie(cookie) = app.admin() {
        request = request.header(header::COOKIE, cookie);
    }
    let reply = app.raw(request.body(Body::from(sheet)).unwrap()).await;
    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn quality_variants_are_unique_per_product() {
    let app = common::app("quality-unique").await;
    let product = app
        .post("/products/", app.admin(), json!({ "name": "Figs" }))
        .await
        .json();
    let quality = json!({
        "quality": "economy",
        "retail_price": "400",
        "wholesale_price": "350",
        "broker_price": "300",
    });
    let uri = format!("/products/{}/qualities", product["id"]);
    assert_eq!(
        app.post(&uri, app.admin(), quality.clone()).await.status,
        StatusCode::CREATED
    );
    assert_eq!(
        app.post(&uri, app.admin(), quality).await.status,
        StatusCode::CONFLICT
    );

    let reply = app
        .post("/products/", app.admin(), json!({ "name": "   " }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(
            "DELETE",
            &format!("/products/{}", product["id"]),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = app
        .get(&format!("/products/{}", product["id"]), app.admin())
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

/// Sells 1.5 kg of premium almonds for cash and 1 kg on credit.
async fn some_sales(app: &TestApp) {
    upload(
        app,
        app.admin(),
        "seed.csv",
        "Product Name,Quality,Retail Price,Wholesale Price,Broker Price,Stock Quantity\n\
         Almonds,premium,800,700,650,50\n",
    )
    .await;
    let product = app
        .get("/products/search?q=almonds", app.admin())
        .await
        .json();
    let product_id = product[0]["id"].as_i64().unwrap();
    let quality_id = product[0]["qualities"][0]["id"].as_i64().unwrap();
    let customer = app
        .post(
            "/customers/",
            app.admin(),
            json!({ "name": "Kiran Mart", "phone": "9000000001", "credit_limit": "5000" }),
        )
        .await
        .json();

    for (quantity, payment_type) in [("1.5", "cash"), ("1", "credit")] {
        app.post(
            "/billing/cart/add",
            app.admin(),
            json!({ "product_id": product_id, "quality_id": quality_id, "quantity": quantity }),
        )
        .await;
        let reply = app
            .post(
                "/billing/checkout",
                app.admin(),
                json!({ "customer_id": customer["id"], "payment_type": payment_type }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    }
}

#[tokio::test]
async fn reports_summarize_sales() {
    let app = common::app("reports").await;
    some_sales(&app).await;

    let dashboard = app.get("/", app.admin()).await.json();
    assert_eq!(dashboard["total_bills"], 2);
    assert_eq!(dashboard["total_customers"], 1);
    assert_eq!(dashboard["pending_payments"], "800.00");

    let index = app.get("/reports/", app.admin()).await.json();
    assert_eq!(index.as_array().unwrap().len(), 4);

    let sales = app.get("/reports/sales", app.admin()).await.json();
    assert_eq!(sales["totals"]["bills"], 2);
    assert_eq!(sales["totals"]["total_sales"], "2000.00");
    assert_eq!(sales["totals"]["total_cash"], "1200.00");
    assert_eq!(sales["totals"]["total_credit"], "800.00");

    let products = app.get("/reports/products", app.admin()).await.json();
    assert_eq!(products["rows"][0]["product"], "Almonds");
    assert_eq!(products["rows"][0]["quantity_sold"], "2.500");
    assert_eq!(products["total_revenue"], "2000.00");

    let customers = app.get("/reports/customers", app.admin()).await.json();
    assert_eq!(customers["rows"][0]["total_orders"], 2);
    assert_eq!(customers["rows"][0]["pending_payment"], "800.00");

    let credit = app.get("/reports/credit", app.admin()).await.json();
    assert_eq!(credit["total_invoices"], 1);
    assert_eq!(credit["total_due"], "800.00");

    let reply = app.get("/reports/export/credit", app.admin()).await;
    assert_eq!(reply.status, StatusCode::OK);
    let disposition = reply.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("Credit_Overview_Report_"), "{disposition}");
    let text = reply.text();
    assert!(text.starts_with("Invoice #,Customer,Phone,"));
    assert!(text.contains("Kiran Mart"));

    let reply = app.get("/reports/export/sales", app.admin()).await;
    assert!(reply.text().lines().last().unwrap().starts_with("Total,2,2000.00"));

    let reply = app.get("/reports/sales?quick_filter=bogus", app.admin()).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_panel_lists_and_deletes_records() {
    let app = common::app("admin-panel").await;
    some_sales(&app).await;

    let users = app.get("/admin/users/", app.admin()).await.json();
    assert_eq!(users["total"], 1);
    assert_eq!(users["items"][0]["email"], common::ADMIN_EMAIL);
    assert!(users["items"][0].get("password_hash").is_none());

    let invoices = app.get("/admin/invoices/?page=9", app.admin()).await.json();
    assert_eq!(invoices["page"], 1, "out-of-range pages clamp");
    assert_eq!(invoices["total"], 2);
    let id = invoices["items"][0]["id"].as_i64().unwrap();

    let reply = app
        .get(&format!("/admin/invoices/{id}"), app.admin())
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app
        .send("DELETE", &format!("/admin/invoices/{id}"), app.admin(), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    let reply = app
        .get(&format!("/admin/invoices/{id}"), app.admin())
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.get("/admin/schema_migrations/", app.admin()).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
