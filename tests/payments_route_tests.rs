mod common;

use axum::http::StatusCode;
use common::TestApp;
use dryfruits::service::overdue_sweeper::{self, OverdueSweeperHandle};
use serde_json::{Value, json};
use std::time::Duration;

/// Customer plus an issued credit invoice for one kilogram at ₹800.
async fn issued_invoice(app: &TestApp, payment_due_date: Option<&str>) -> (i64, i64) {
    let product = app
        .post("/products/", app.admin(), json!({ "name": "Pistachios" }))
        .await
        .json();
    let quality = app
        .post(
            &format!("/products/{}/qualities", product["id"]),
            app.admin(),
            json!({
                "quality": "standard",
                "retail_price": "800",
                "wholesale_price": "750",
                "broker_price": "700",
                "stock_quantity": "25",
            }),
        )
        .await
        .json();
    let customer = app
        .post(
            "/customers/",
            app.admin(),
            json!({
                "name": "Asha Stores",
                "phone": "9900011122",
                "customer_type": "wholesale",
                "credit_limit": "10000",
            }),
        )
        .await;
    assert_eq!(customer.status, StatusCode::CREATED, "{}", customer.text());
    let customer_id = customer.json()["id"].as_i64().unwrap();

    let mut draft = json!({ "customer_id": customer_id, "payment_type": "credit" });
    if let Some(date) = payment_due_date {
        draft["payment_due_date"] = Value::from(date);
    }
    let reply = app.post("/billing/invoices", app.admin(), draft).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    let invoice_id = reply.json()["id"].as_i64().unwrap();

    let reply = app
        .post(
            &format!("/billing/invoices/{invoice_id}/items"),
            app.admin(),
            json!({ "product_quality_id": quality["id"], "quantity": "1" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());

    let reply = app
        .send(
            "POST",
            &format!("/billing/invoices/{invoice_id}/issue"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    let invoice = reply.json();
    assert_eq!(invoice["status"], "pending_payment");
    assert_eq!(invoice["total"], "800.00");

    (customer_id, invoice_id)
}

async fn pay(app: &TestApp, invoice_id: i64, amount: &str) -> common::Reply {
    app.post(
        &format!("/payments/invoice/{invoice_id}/payment"),
        app.admin(),
        json!({ "amount": amount, "payment_method": "upi", "reference_number": " UTR123 " }),
    )
    .await
}

#[tokio::test]
async fn payments_settle_the_invoice() {
    let app = common::app("payments-settle").await;
    let (customer_id, invoice_id) = issued_invoice(&app, None).await;

    let reply = pay(&app, invoice_id, "300").await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    let body = reply.json();
    assert_eq!(body["invoice"]["status"], "partially_paid");
    assert_eq!(body["invoice"]["amount_paid"], "300.00");
    assert_eq!(body["payment"]["reference_number"], "UTR123");
    let first_payment = body["payment"]["id"].as_i64().unwrap();

    let reply = pay(&app, invoice_id, "600").await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);

    let reply = pay(&app, invoice_id, "0").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = pay(&app, invoice_id, "500").await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json()["invoice"]["status"], "paid");

    let reply = pay(&app, invoice_id, "1").await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    // Cancelling a completed payment re-opens the balance.
    let reply = app
        .send(
            "POST",
            &format!("/payments/payment/{first_payment}/cancel"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "cancelled");
    let detail = app
        .get(&format!("/billing/invoices/{invoice_id}"), app.admin())
        .await
        .json();
    assert_eq!(detail["status"], "partially_paid");
    assert_eq!(detail["amount_paid"], "500.00");
    assert_eq!(detail["amount_due"], "300.00");
    assert_eq!(detail["payments"].as_array().unwrap().len(), 2);

    // Completed payments are not editable.
    let reply = app
        .send(
            "PUT",
            &format!("/payments/payment/{first_payment}"),
            app.admin(),
            Some(json!({ "notes": "late" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let history = app
        .get(
            &format!("/payments/customer/{customer_id}/history"),
            app.admin(),
        )
        .await
        .json();
    assert_eq!(history["total_invoiced"], "800.00");
    assert_eq!(history["total_paid"], "500.00");
    assert_eq!(history["total_pending"], "300.00");

    let all = app.get("/payments/all?status=completed", app.admin()).await.json();
    assert_eq!(all["total"], 1);
    assert_eq!(all["total_amount"], "500.00");
}

#[tokio::test]
async fn pending_payments_can_be_edited_without_settling() {
    let app = common::app("payments-pending").await;
    let (_, invoice_id) = issued_invoice(&app, None).await;

    let reply = app
        .post(
            &format!("/payments/invoice/{invoice_id}/payment"),
            app.admin(),
            json!({ "amount": "200", "payment_method": "cheque", "status": "pending" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    let body = reply.json();
    assert_eq!(body["invoice"]["status"], "pending_payment");
    let payment_id = body["payment"]["id"].as_i64().unwrap();

    let reply = app
        .send(
            "PUT",
            &format!("/payments/payment/{payment_id}"),
            app.admin(),
            Some(json!({ "amount": "900" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);

    let reply = app
        .send(
            "PUT",
            &format!("/payments/payment/{payment_id}"),
            app.admin(),
            Some(json!({ "amount": "250", "notes": "post-dated" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    assert_eq!(reply.json()["amount"], "250.00");

    let detail = app
        .get(&format!("/payments/payment/{payment_id}"), app.admin())
        .await
        .json();
    assert_eq!(detail["customer_name"], "Asha Stores");
    assert_eq!(detail["notes"], "post-dated");

    // The cheque clears: the payment now counts towards the invoice.
    let reply = app
        .send(
            "POST",
            &format!("/payments/payment/{payment_id}/complete"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    let body = reply.json();
    assert_eq!(body["payment"]["status"], "completed");
    assert_eq!(body["invoice"]["status"], "partially_paid");
    assert_eq!(body["invoice"]["amount_paid"], "250.00");

    let reply = app
        .send(
            "POST",
            &format!("/payments/payment/{payment_id}/complete"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn pending_payments_cannot_complete_past_the_balance() {
    let app = common::app("payments-complete-cap").await;
    let (_, invoice_id) = issued_invoice(&app, None).await;

    let reply = app
        .post(
            &format!("/payments/invoice/{invoice_id}/payment"),
            app.admin(),
            json!({ "amount": "600", "payment_method": "cheque", "status": "pending" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    let pending_id = reply.json()["payment"]["id"].as_i64().unwrap();

    let reply = pay(&app, invoice_id, "500").await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let reply = app
        .send(
            "POST",
            &format!("/payments/payment/{pending_id}/complete"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    let detail = app
        .get(&format!("/billing/invoices/{invoice_id}"), app.admin())
        .await
        .json();
    assert_eq!(detail["amount_paid"], "500.00");
}

#[tokio::test]
async fn cancelling_a_payment_keeps_a_manual_settlement() {
    let app = common::app("payments-manual-settle").await;
    let (_, invoice_id) = issued_invoice(&app, None).await;

    let reply = pay(&app, invoice_id, "300").await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let payment_id = reply.json()["payment"]["id"].as_i64().unwrap();

    let reply = app
        .send(
            "POST",
            &format!("/billing/invoices/{invoice_id}/mark-paid"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    assert_eq!(reply.json()["amount_paid"], "800.00");

    let reply = app
        .send(
            "POST",
            &format!("/payments/payment/{payment_id}/cancel"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    // Only the cancelled ₹300 is re-opened; the manual ₹500 stays settled.
    let detail = app
        .get(&format!("/billing/invoices/{invoice_id}"), app.admin())
        .await
        .json();
    assert_eq!(detail["status"], "partially_paid");
    assert_eq!(detail["amount_paid"], "500.00");
    assert_eq!(detail["amount_due"], "300.00");
}

#[tokio::test]
async fn reminders_and_the_pending_list() {
    let app = common::app("payments-reminders").await;
    let (_, invoice_id) = issued_invoice(&app, Some("2099-12-31")).await;

    let reply = app
        .post(
            &format!("/payments/invoice/{invoice_id}/reminder"),
            app.admin(),
            json!({ "reminder_type": "whatsapp", "notes": "second notice" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    let reminder = reply.json();
    assert_eq!(reminder["status"], "sent");
    assert!(reminder["sent_at"].is_string());

    let reply = app
        .post(
            "/payments/bulk-reminder",
            app.admin(),
            json!({ "invoice_ids": [invoice_id], "reminder_type": "sms" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json()["message"], "Reminders sent to 1 customers.");

    let reply = app
        .post(
            "/payments/bulk-reminder",
            app.admin(),
            json!({ "invoice_ids": [], "reminder_type": "sms" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let pending = app.get("/payments/?query=asha", app.admin()).await.json();
    assert_eq!(pending["total"], 1);
    assert_eq!(pending["items"][0]["amount_due"], "800.00");
    assert_eq!(pending["summary"]["total_pending"], "800.00");
    assert_eq!(pending["summary"]["overdue_count"], 0);

    let detail = app
        .get(&format!("/billing/invoices/{invoice_id}"), app.admin())
        .await
        .json();
    assert_eq!(detail["reminders"].as_array().unwrap().len(), 2);

    pay(&app, invoice_id, "800").await;
    let reply = app
        .post(
            &format!("/payments/invoice/{invoice_id}/reminder"),
            app.admin(),
            json!({ "reminder_type": "email" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn sweeper_flags_invoices_past_their_due_date() {
    let app = common::app("overdue-sweep").await;
    let (_, late) = issued_invoice(&app, Some("2020-01-01")).await;

    let flagged = overdue_sweeper::sweep_once(&app.db).await.unwrap();
    assert_eq!(flagged, 1);
    let detail = app
        .get(&format!("/billing/invoices/{late}"), app.admin())
        .await
        .json();
    assert_eq!(detail["status"], "overdue");

    // Already overdue: nothing left to flag.
    assert_eq!(overdue_sweeper::sweep_once(&app.db).await.unwrap(), 0);

    let pending = app
        .get("/payments/?overdue_status=overdue", app.admin())
        .await
        .json();
    assert_eq!(pending["summary"]["overdue_count"], 1);

    // Payments still settle an overdue invoice.
    let reply = pay(&app, late, "800").await;
    assert_eq!(reply.json()["invoice"]["status"], "paid");
}

#[tokio::test]
async fn sweeper_actor_runs_on_start_and_on_demand() {
    let app = common::app("overdue-actor").await;
    let (_, late) = issued_invoice(&app, Some("2021-06-30")).await;

    let sweeper = OverdueSweeperHandle::spawn(app.db.clone(), Duration::from_secs(3600))
        .await
        .unwrap();
    sweeper.sweep_now().unwrap();

    let mut status = Value::Null;
    for _ in 0..50 {
        status = app
            .get(&format!("/billing/invoices/{late}"), app.admin())
            .await
            .json()["status"]
            .clone();
        if status == "overdue" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(status, "overdue");
    sweeper.stop();
}
