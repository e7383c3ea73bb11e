mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

use settlement_api::entities::{order, order_group, payment_transaction};

use common::{body_json, captured_event, TestApp};

/// Checkout a two-product cart and return (group_id, order ids).
async fn committed_group(app: &TestApp) -> (Uuid, Vec<Uuid>) {
    app.seed_shipping(dec!(0), dec!(0)).await;
    let first = app.seed_product("First", None, dec!(100)).await;
    let second = app.seed_product("Second", None, dec!(200)).await;
    app.seed_cart_line(app.user_id, first.id, 1).await;
    app.seed_cart_line(app.user_id, second.id, 1).await;
    let address = app.seed_address(app.user_id).await;

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/checkout/buy",
            Some(json!({ "address_id": address.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let group_id: Uuid = body["data"]["order_group_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let orders = order::Entity::find()
        .filter(order::Column::OrderGroupId.eq(group_id))
        .all(&*app.state.db)
        .await
        .unwrap();
    let ids = orders.iter().map(|o| o.id).collect();
    (group_id, ids)
}

#[tokio::test]
async fn cancelling_a_group_cascades_and_abandons_pending_payment() {
    let app = TestApp::new().await;
    let (group_id, _) = committed_group(&app).await;

    let response = app
        .request_as_user(
            Method::PATCH,
            "/api/v1/orders/cancel",
            Some(json!({ "order_group_id": group_id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["already_cancelled"], false);

    let db = &*app.state.db;
    let group = order_group::Entity::find_by_id(group_id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.status, "cancelled");

    let orders = order::Entity::find().all(db).await.unwrap();
    assert!(orders.iter().all(|o| o.order_status == "cancelled"));

    let txn = payment_transaction::Entity::find()
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(txn.payment_status, "cancelled");
}

#[tokio::test]
async fn recancelling_is_an_idempotent_success() {
    let app = TestApp::new().await;
    let (group_id, _) = committed_group(&app).await;

    for expected_already in [false, true, true] {
        let response = app
            .request_as_user(
                Method::PATCH,
                "/api/v1/orders/cancel",
                Some(json!({ "order_group_id": group_id })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["already_cancelled"], expected_already);
    }
}

#[tokio::test]
async fn shipped_orders_refuse_cancellation() {
    let app = TestApp::new().await;
    let (group_id, order_ids) = committed_group(&app).await;
    let db = &*app.state.db;

    // Settle the payment, then simulate fulfilment moving everything on.
    let txn = payment_transaction::Entity::find()
        .one(db)
        .await
        .unwrap()
        .unwrap();
    let response = app
        .deliver_webhook(&captured_event(&txn.gateway_order_id))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    order::Entity::update_many()
        .col_expr(order::Column::OrderStatus, Expr::value("shipped"))
        .exec(db)
        .await
        .unwrap();
    order_group::Entity::update_many()
        .col_expr(order_group::Column::Status, Expr::value("shipped"))
        .filter(order_group::Column::Id.eq(group_id))
        .exec(db)
        .await
        .unwrap();

    let response = app
        .request_as_user(
            Method::PATCH,
            "/api/v1/orders/cancel",
            Some(json!({ "order_group_id": group_id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_as_user(
            Method::PATCH,
            "/api/v1/orders/cancel-item",
            Some(json!({ "order_id": order_ids[0] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancelling_the_last_active_line_cancels_the_group() {
    let app = TestApp::new().await;
    let (group_id, order_ids) = committed_group(&app).await;
    assert_eq!(order_ids.len(), 2);

    let response = app
        .request_as_user(
            Method::PATCH,
            "/api/v1/orders/cancel-item",
            Some(json!({ "order_id": order_ids[0] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let db = &*app.state.db;
    let group = order_group::Entity::find_by_id(group_id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.status, "pending", "one line still active");

    let response = app
        .request_as_user(
            Method::PATCH,
            "/api/v1/orders/cancel-item",
            Some(json!({ "order_id": order_ids[1] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let group = order_group::Entity::find_by_id(group_id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.status, "cancelled");
}

#[tokio::test]
async fn other_users_cannot_view_or_cancel() {
    let app = TestApp::new().await;
    let (group_id, order_ids) = committed_group(&app).await;
    let stranger = Uuid::new_v4();

    let response = app
        .request(
            Method::PATCH,
            "/api/v1/orders/cancel",
            Some(json!({ "order_group_id": group_id })),
            Some(stranger),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_ids[0]),
            None,
            Some(stranger),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The stranger's own views are simply empty.
    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(stranger))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn order_views_return_committed_records() {
    let app = TestApp::new().await;
    let (group_id, order_ids) = committed_group(&app).await;

    let response = app
        .request_as_user(Method::GET, "/api/v1/orders", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let response = app
        .request_as_user(
            Method::GET,
            &format!("/api/v1/order-groups/{group_id}"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["status"], "pending");

    let response = app
        .request_as_user(
            Method::GET,
            &format!("/api/v1/orders/{}", order_ids[0]),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}
