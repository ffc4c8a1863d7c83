//! Round trips against a running API.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`sams-cli migrate`)
//! - The API running (`cargo run -p sams-api`)
//! - A staff account in `SAMS_TEST_USERNAME` / `SAMS_TEST_PASSWORD`
//!   (create one with `sams-cli user create -r manager`)
//! - At least one active service type for the invoice tests
//!
//! Each test creates its own floor, apartment, amenity or asset under a
//! per-run tag, so runs do not collide.
//!
//! Run with: cargo test -p sams-integration-tests -- --ignored

use chrono::{Days, Local, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use sams_integration_tests::live_base_url;

/// Client that keeps the session cookie between requests.
fn cookie_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Log in with the test account and return the signed-in client.
async fn staff_client() -> Client {
    let username = std::env::var("SAMS_TEST_USERNAME").expect("SAMS_TEST_USERNAME not set");
    let password = std::env::var("SAMS_TEST_PASSWORD").expect("SAMS_TEST_PASSWORD not set");

    let client = cookie_client();
    let resp = client
        .post(format!("{}/api/auth/login", live_base_url()))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK, "login failed for {username}");
    client
}

/// Distinct per run; used for codes and numbers that must be unique.
fn run_tag() -> String {
    Utc::now().format("%d%H%M%S%3f").to_string()
}

fn days_from_today(days: u64) -> NaiveDate {
    Local::now()
        .date_naive()
        .checked_add_days(Days::new(days))
        .expect("date in range")
}

/// POST `body` and return the created entity.
async fn create(client: &Client, path: &str, body: &Value) -> Value {
    let resp = client
        .post(format!("{}{path}", live_base_url()))
        .json(body)
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(resp.status(), StatusCode::CREATED, "POST {path} was not created");
    resp.json().await.expect("Invalid JSON")
}

fn id_of(entity: &Value) -> String {
    entity["id"].as_str().expect("entity id").to_owned()
}

/// A fresh floor with one apartment; returns the apartment id.
async fn fresh_apartment(client: &Client) -> String {
    let tag = run_tag();
    let floor_number = i32::try_from(Utc::now().timestamp_millis() % 1_000_000_000)
        .expect("floor number fits");
    let floor = create(
        client,
        "/api/floors",
        &json!({ "floorNumber": floor_number, "name": format!("Tầng thử {tag}") }),
    )
    .await;
    let apartment = create(
        client,
        "/api/apartments",
        &json!({ "floorId": id_of(&floor), "number": format!("T{tag}"), "areaM2": "60" }),
    )
    .await;
    id_of(&apartment)
}

async fn invoice_count(client: &Client, apartment_id: &str) -> i64 {
    let page: Value = client
        .get(format!("{}/api/invoices", live_base_url()))
        .query(&[("apartmentId", apartment_id)])
        .send()
        .await
        .expect("Failed to list invoices")
        .json()
        .await
        .expect("Invalid JSON");
    page["total"].as_i64().expect("page total")
}

async fn any_service_type(client: &Client) -> String {
    let services: Value = client
        .get(format!("{}/api/service-types", live_base_url()))
        .send()
        .await
        .expect("Failed to list service types")
        .json()
        .await
        .expect("Invalid JSON");
    let first = services
        .as_array()
        .and_then(|list| list.first())
        .expect("at least one service type is configured");
    id_of(first)
}

fn vn_date(iso: &Value) -> String {
    NaiveDate::parse_from_str(iso.as_str().expect("date string"), "%Y-%m-%d")
        .expect("ISO date")
        .format("%d/%m/%Y")
        .to_string()
}

// ============================================================================
// Session
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API and test credentials"]
async fn test_login_me_logout() {
    let client = staff_client().await;
    let base_url = live_base_url();

    let me: Value = client
        .get(format!("{base_url}/api/auth/me"))
        .send()
        .await
        .expect("Failed to fetch current user")
        .json()
        .await
        .expect("Invalid JSON");
    assert!(me["username"].is_string());
    assert!(me["role"].is_string());

    let resp = client
        .post(format!("{base_url}/api/auth/logout"))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .get(format!("{base_url}/api/auth/me"))
        .send()
        .await
        .expect("Failed to fetch current user");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API and database"]
async fn test_wrong_password_is_rejected() {
    let resp = cookie_client()
        .post(format!("{}/api/auth/login", live_base_url()))
        .json(&json!({ "username": "khong-ton-tai", "password": "sai-mat-khau" }))
        .send()
        .await
        .expect("Failed to send login");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Tickets
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API and test credentials"]
async fn test_ticket_lifecycle() {
    let client = staff_client().await;
    let base_url = live_base_url();

    let resp = client
        .post(format!("{base_url}/api/tickets"))
        .json(&json!({
            "category": "Bảo trì",
            "priority": "Khẩn cấp",
            "subject": "Kiểm tra thang máy sảnh B",
            "scope": "Tòa nhà",
        }))
        .send()
        .await
        .expect("Failed to create ticket");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let ticket: Value = resp.json().await.expect("Invalid JSON");
    let id = ticket["id"].as_str().expect("ticket id").to_owned();
    assert_eq!(ticket["status"], "Mới tạo");

    // Skipping a step is refused
    let resp = client
        .patch(format!("{base_url}/api/tickets/{id}/status"))
        .json(&json!({ "status": "Hoàn thành" }))
        .send()
        .await
        .expect("Failed to change status");
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = client
        .patch(format!("{base_url}/api/tickets/{id}/status"))
        .json(&json!({ "status": "Đã tiếp nhận" }))
        .send()
        .await
        .expect("Failed to change status");
    assert_eq!(resp.status(), StatusCode::OK);

    // The status change leaves an automatic comment
    let comments: Value = client
        .get(format!("{base_url}/api/tickets/{id}/comments"))
        .send()
        .await
        .expect("Failed to list comments")
        .json()
        .await
        .expect("Invalid JSON");
    assert!(!comments.as_array().expect("comment list").is_empty());

    let resp = client
        .delete(format!("{base_url}/api/tickets/{id}"))
        .send()
        .await
        .expect("Failed to delete ticket");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

// ============================================================================
// Invoices
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API and test credentials"]
async fn test_invoice_configuration_round_trip() {
    let client = staff_client().await;
    let base_url = live_base_url();

    let config: Value = client
        .get(format!("{base_url}/api/invoice-configuration"))
        .send()
        .await
        .expect("Failed to read configuration")
        .json()
        .await
        .expect("Invalid JSON");
    assert!(config["generationDayOfMonth"].is_number());

    let resp = client
        .put(format!("{base_url}/api/invoice-configuration"))
        .json(&json!({
            "generationDayOfMonth": 0,
            "dueDaysAfterIssue": 10,
            "isEnabled": true,
        }))
        .send()
        .await
        .expect("Failed to update configuration");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API, test credentials and a service type"]
async fn test_second_manual_invoice_in_a_month_is_a_conflict() {
    let client = staff_client().await;
    let base_url = live_base_url();
    let apartment_id = fresh_apartment(&client).await;
    let service_type_id = any_service_type(&client).await;
    let issue = days_from_today(0);
    let body = json!({
        "apartmentId": apartment_id,
        "issueDate": issue,
        "dueDate": days_from_today(10),
        "details": [{ "serviceTypeId": service_type_id, "quantity": "1", "unitPrice": "100000" }],
    });

    create(&client, "/api/invoices", &body).await;

    let resp = client
        .post(format!("{base_url}/api/invoices"))
        .json(&body)
        .send()
        .await
        .expect("Failed to create invoice");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let error: Value = resp.json().await.expect("Invalid JSON");
    let message = error["error"].as_str().expect("error message");
    assert!(message.starts_with("Căn hộ đã có hóa đơn"), "{message}");
    assert_eq!(invoice_count(&client, &apartment_id).await, 1);
}

#[tokio::test]
#[ignore = "Requires running API, test credentials and a service type"]
async fn test_failed_detail_insert_leaves_no_invoice() {
    let client = staff_client().await;
    let base_url = live_base_url();
    let apartment_id = fresh_apartment(&client).await;
    let service_type_id = any_service_type(&client).await;

    // The header totals are zero; the quantity does not fit the detail column.
    let resp = client
        .post(format!("{base_url}/api/invoices"))
        .json(&json!({
            "apartmentId": apartment_id,
            "issueDate": days_from_today(0),
            "dueDate": days_from_today(10),
            "details": [
                { "serviceTypeId": service_type_id, "quantity": "1", "unitPrice": "0" },
                { "serviceTypeId": service_type_id, "quantity": "10000000000000000", "unitPrice": "0" },
            ],
        }))
        .send()
        .await
        .expect("Failed to send invoice");
    assert!(resp.status().is_server_error(), "status {}", resp.status());
    assert_eq!(invoice_count(&client, &apartment_id).await, 0);

    // An oversized amount is rejected before anything is written.
    let resp = client
        .post(format!("{base_url}/api/invoices"))
        .json(&json!({
            "apartmentId": apartment_id,
            "issueDate": days_from_today(0),
            "dueDate": days_from_today(10),
            "details": [{
                "serviceTypeId": service_type_id,
                "quantity": "10000000000000000",
                "unitPrice": "10000000000000000",
            }],
        }))
        .send()
        .await
        .expect("Failed to send invoice");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(invoice_count(&client, &apartment_id).await, 0);
}

// ============================================================================
// Bookings
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API and test credentials"]
async fn test_overlapping_booking_for_the_same_resident() {
    let client = staff_client().await;
    let base_url = live_base_url();
    let tag = run_tag();

    let me: Value = client
        .get(format!("{base_url}/api/auth/me"))
        .send()
        .await
        .expect("Failed to fetch current user")
        .json()
        .await
        .expect("Invalid JSON");
    let apartment_id = fresh_apartment(&client).await;
    let resident = create(
        &client,
        "/api/residents",
        &json!({ "fullName": format!("Cư dân thử {tag}"), "userId": me["id"] }),
    )
    .await;
    let resp = client
        .post(format!("{base_url}/api/residents/{}/apartments", id_of(&resident)))
        .json(&json!({ "apartmentId": apartment_id, "isPrimary": true }))
        .send()
        .await
        .expect("Failed to link apartment");
    assert!(resp.status().is_success());

    let amenity = create(
        &client,
        "/api/amenities",
        &json!({ "code": format!("GYM-{tag}"), "name": format!("Phòng gym {tag}") }),
    )
    .await;
    let amenity_id = id_of(&amenity);
    let package = create(
        &client,
        &format!("/api/amenities/{amenity_id}/packages"),
        &json!({ "name": "Gói 1 tháng", "monthCount": 1, "price": 300_000 }),
    )
    .await;
    let booking_body = json!({
        "amenityId": amenity_id,
        "packageId": id_of(&package),
        "apartmentId": apartment_id,
        "userId": me["id"],
    });

    let first = create(&client, "/api/bookings", &booking_body).await;
    assert_eq!(first["userId"], me["id"]);

    let resp = client
        .post(format!("{base_url}/api/bookings"))
        .json(&booking_body)
        .send()
        .await
        .expect("Failed to send booking");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let error: Value = resp.json().await.expect("Invalid JSON");
    let expected = format!(
        "Bạn đang sử dụng Phòng gym {tag} trong khoảng thời gian {} - {}.",
        vn_date(&first["startDate"]),
        vn_date(&first["endDate"])
    );
    assert_eq!(error["error"], expected.as_str());

    // Re-saving the booking does not collide with itself
    let resp = client
        .put(format!("{base_url}/api/bookings/{}", id_of(&first)))
        .json(&json!({ "packageId": id_of(&package), "notes": "đổi ghi chú" }))
        .send()
        .await
        .expect("Failed to update booking");
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Maintenance
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API and test credentials"]
async fn test_schedule_update_cannot_overlap_another() {
    let client = staff_client().await;
    let base_url = live_base_url();
    let tag = run_tag();

    let asset = create(
        &client,
        "/api/assets",
        &json!({ "code": format!("ELV-{tag}"), "name": format!("Thang máy {tag}") }),
    )
    .await;
    let asset_id = id_of(&asset);
    let window = |start: u64, end: u64| {
        json!({
            "assetId": asset_id,
            "startDate": days_from_today(start),
            "endDate": days_from_today(end),
        })
    };

    create(&client, "/api/maintenance-schedules", &window(10, 12)).await;
    let second = create(&client, "/api/maintenance-schedules", &window(20, 22)).await;
    let second_url = format!("{base_url}/api/maintenance-schedules/{}", id_of(&second));

    let resp = client
        .put(&second_url)
        .json(&window(11, 13))
        .send()
        .await
        .expect("Failed to update schedule");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: Value = resp.json().await.expect("Invalid JSON");
    let message = error["error"].as_str().expect("error message");
    assert!(message.starts_with("Lịch bảo trì trùng với lịch đã có"), "{message}");

    // Keeping its own window is not an overlap
    let resp = client
        .put(&second_url)
        .json(&window(20, 22))
        .send()
        .await
        .expect("Failed to update schedule");
    assert_eq!(resp.status(), StatusCode::OK);
}
