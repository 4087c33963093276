use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, FixedOffset, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use cinestay_api::{app, ApiSettings, AppState};
use cinestay_core::booking::{booking_code, Booking, BookingStatus, PaymentStatus};
use cinestay_core::catalog::{Branch, ComboPackage, MenuCategory, MenuItem, Room, RoomType};
use cinestay_core::lock::{SmartLock, TokenStatus, UnlockReceipt};
use cinestay_core::payment::{PaymentGateway, PaymentLink};
use cinestay_core::repository::{BookingRepository, ComboRepository, MenuRepository, RoomRepository};
use cinestay_pay2s::{IpnPayload, Pay2sVerifier};
use cinestay_shared::Masked;
use cinestay_store::app_config::{BookingRules, CronConfig};
use cinestay_store::{MemoryStore, Repositories};

const PARTNER_CODE: &str = "CINESTAY";
const ACCESS_KEY: &str = "access-key";
const SECRET_KEY: &str = "secret-key";
const CRON_SECRET: &str = "cron-secret";

// ============================================================================
// Doubles
// ============================================================================

struct StubGateway {
    fail: bool,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment_link(
        &self,
        booking: &Booking,
    ) -> Result<PaymentLink, Box<dyn std::error::Error + Send + Sync>> {
        if self.fail {
            return Err("gateway timed out".into());
        }
        Ok(PaymentLink {
            booking_id: booking.id,
            order_id: booking.code.clone(),
            request_id: format!("req-{}", booking.code),
            amount: booking.total_amount,
            pay_url: format!("https://pay.test/{}", booking.code),
            qr_code: None,
            expires_at: booking.expires_at,
        })
    }
}

#[derive(Default)]
struct StubLock {
    opened: Mutex<Vec<String>>,
}

#[async_trait]
impl SmartLock for StubLock {
    async fn unlock(&self, lock_id: &str) -> Result<UnlockReceipt, Box<dyn std::error::Error + Send + Sync>> {
        self.opened.lock().unwrap().push(lock_id.to_string());
        Ok(UnlockReceipt {
            lock_id: lock_id.to_string(),
            unlocked_at: Utc::now(),
        })
    }

    async fn token_status(&self) -> Result<TokenStatus, Box<dyn std::error::Error + Send + Sync>> {
        Ok(TokenStatus {
            cached: true,
            expires_at: Some(Utc::now() + Duration::days(1)),
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    lock: Arc<StubLock>,
    room: Room,
    combo: ComboPackage,
}

struct Options {
    development: bool,
    cron_secret: Option<&'static str>,
    failing_gateway: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            development: true,
            cron_secret: None,
            failing_gateway: false,
        }
    }
}

async fn test_app(options: Options) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();

    let branch = Branch {
        id: Uuid::new_v4(),
        name: "CineStay Thao Dien".to_string(),
        address: "8 Thao Dien, Thu Duc".to_string(),
        is_active: true,
    };
    let room_type = RoomType {
        id: Uuid::new_v4(),
        name: "Deluxe".to_string(),
        description: Some("Projector and sofa bed".to_string()),
        capacity: 2,
        price_per_hour: 150_000,
        amenities: vec!["projector".to_string(), "netflix".to_string()],
        is_active: true,
    };
    let room = Room {
        id: Uuid::new_v4(),
        branch_id: branch.id,
        room_type_id: room_type.id,
        name: "D201".to_string(),
        lock_id: Some("4455667".to_string()),
        is_active: true,
    };
    let combo = ComboPackage {
        id: Uuid::new_v4(),
        name: "Three hours".to_string(),
        code: "NIGHT3H".to_string(),
        description: None,
        duration_minutes: 180,
        price: 399_000,
        display_order: 1,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let popcorn = MenuItem {
        id: Uuid::new_v4(),
        name: "Popcorn".to_string(),
        category: MenuCategory::Snack,
        price: 25_000,
        description: None,
        is_available: true,
        created_at: now,
        updated_at: now,
    };

    store.insert_branch(&branch).await.unwrap();
    store.insert_room_type(&room_type).await.unwrap();
    store.insert_room(&room).await.unwrap();
    store.insert_combo(&combo).await.unwrap();
    store.insert_menu_item(&popcorn).await.unwrap();

    let lock = Arc::new(StubLock::default());
    let settings = ApiSettings {
        development: options.development,
        cron_secret: options.cron_secret.map(str::to_string),
        cron: CronConfig::default(),
        rules: BookingRules::default(),
        cors_origins: Vec::new(),
    };
    let state = AppState::new(
        Repositories::from_memory(store.clone()),
        Arc::new(StubGateway { fail: options.failing_gateway }),
        lock.clone(),
        Pay2sVerifier::new(PARTNER_CODE, ACCESS_KEY, SECRET_KEY),
        settings,
    );

    TestApp {
        router: app(state),
        store,
        lock,
        room,
        combo,
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Check out the seeded room with the seeded combo, starting `hours_ahead` from now.
    async fn checkout(&self, hours_ahead: i64) -> (StatusCode, Value) {
        let start = Utc::now() + Duration::hours(hours_ahead);
        self.json(
            Method::POST,
            "/api/bookings",
            json!({
                "roomId": self.room.id,
                "startTime": start.to_rfc3339(),
                "comboId": self.combo.id,
                "customerName": "Tran Thi B",
                "customerPhone": "0901234567",
            }),
        )
        .await
    }

    async fn ipn(&self, payload: &IpnPayload) -> (StatusCode, Value) {
        self.json(Method::POST, "/api/payment/ipn", serde_json::to_value(payload).unwrap())
            .await
    }

    async fn stored(&self, id: Uuid) -> Booking {
        self.store.get_booking(id).await.unwrap().unwrap()
    }
}

fn ipn_payload(order_id: &str, amount: i64, trans_id: &str, result_code: i32) -> IpnPayload {
    IpnPayload {
        partner_code: PARTNER_CODE.to_string(),
        access_key: ACCESS_KEY.to_string(),
        amount: amount.to_string(),
        order_id: order_id.to_string(),
        order_info: format!("Thanh toan {}", order_id),
        order_type: "pay2s".to_string(),
        pay_type: "qr".to_string(),
        request_id: format!("req-{}", order_id),
        response_time: "1718000000000".to_string(),
        result_code: result_code.to_string(),
        trans_id: trans_id.to_string(),
        ..Default::default()
    }
}

fn signed(payload: IpnPayload) -> IpnPayload {
    payload.sign_with(SECRET_KEY).unwrap()
}

fn booking_id(body: &Value) -> Uuid {
    body["data"]["id"].as_str().unwrap().parse().unwrap()
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_duplicate_combo_code_is_rejected() {
    let app = test_app(Options::default()).await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/admin/combos",
            json!({ "name": "Again", "code": "night3h", "durationMinutes": 120, "price": 250000 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("NIGHT3H"));

    let (status, body) = app
        .json(
            Method::POST,
            "/api/admin/combos",
            json!({ "name": "Afternoon", "code": "day2h", "duration_minutes": 120, "price": 250000 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["code"], json!("DAY2H"));
}

#[tokio::test]
async fn test_combo_validation_and_not_found() {
    let app = test_app(Options::default()).await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/admin/combos",
            json!({ "name": "Free", "code": "FREE", "durationMinutes": 60, "price": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(Method::POST, "/api/admin/combos", json!({ "name": "No code" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = Uuid::new_v4();
    let (status, _) = app
        .json(Method::PUT, &format!("/api/admin/combos/{}", missing), json!({ "price": 1 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/api/admin/combos/{}", missing))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_menu_category_is_rejected() {
    let app = test_app(Options::default()).await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/admin/menu-items",
            json!({ "name": "Ice cream", "category": "dessert", "price": 30000 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (status, _) = app.get("/api/menu-items?category=beer").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/menu-items?category=snack").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_writes_invalidate_public_listing() {
    let app = test_app(Options::default()).await;

    let (_, body) = app.get("/api/combos").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/admin/combos",
            json!({ "name": "Quick", "code": "QUICK1H", "durationMinutes": 60, "price": 120000, "displayOrder": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get("/api/combos").await;
    let codes: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["QUICK1H", "NIGHT3H"]);
}

#[tokio::test]
async fn test_branch_rooms_and_room_type_lookups() {
    let app = test_app(Options::default()).await;

    let (status, body) = app.get(&format!("/api/branches/{}/rooms", app.room.branch_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], json!("D201"));

    let (status, _) = app.get(&format!("/api/branches/{}/rooms", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&format!("/api/room-types/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/admin/rooms",
            json!({ "branchId": Uuid::new_v4(), "roomTypeId": app.room.room_type_id, "name": "X1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Checkout and payments
// ============================================================================

#[tokio::test]
async fn test_overlapping_checkout_conflicts() {
    let app = test_app(Options::default()).await;

    let (status, body) = app.checkout(24).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], json!("pending"));
    assert_eq!(body["data"]["paymentStatus"], json!("unpaid"));
    assert_eq!(body["data"]["totalAmount"], json!(399_000));

    // One hour later still overlaps the three-hour combo
    let (status, body) = app.checkout(25).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));

    let (status, _) = app.checkout(27).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_checkout_validation() {
    let app = test_app(Options::default()).await;

    let (status, body) = app.json(Method::POST, "/api/bookings", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("roomId"));

    let (status, _) = app
        .json(Method::POST, "/api/bookings", json!({ "roomId": "not-a-uuid" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/bookings",
            json!({
                "roomId": app.room.id,
                "startTime": (Utc::now() + Duration::hours(3)).to_rfc3339(),
                "comboId": app.combo.id,
                "customerName": "A",
                "customerPhone": "12-34",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_availability_lists_booked_slots() {
    let app = test_app(Options::default()).await;
    let (_, body) = app.checkout(48).await;
    let start: chrono::DateTime<Utc> = body["data"]["startTime"].as_str().unwrap().parse().unwrap();

    let local = start.with_timezone(&FixedOffset::east_opt(7 * 3600).unwrap());
    let date = local.format("%Y-%m-%d").to_string();

    let (status, body) = app
        .get(&format!("/api/rooms/{}/availability?date={}", app.room.id, date))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["data"]["booked"].as_array().unwrap().is_empty());

    let (status, _) = app
        .get(&format!("/api/rooms/{}/availability?date=17-10-2026", app.room.id))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_status_of_unknown_booking_is_not_found() {
    let app = test_app(Options::default()).await;

    let (status, body) = app.get(&format!("/api/payment/status/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_create_payment_link() {
    let app = test_app(Options::default()).await;
    let (_, body) = app.checkout(24).await;
    let code = body["data"]["code"].as_str().unwrap().to_string();

    let (status, body) = app
        .json(Method::POST, "/api/payment/create", json!({ "booking_code": code }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payUrl"], json!(format!("https://pay.test/{}", code)));

    let (status, _) = app
        .json(Method::POST, "/api/payment/create", json!({ "bookingCode": "CS00000000" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payment_breaker_opens_after_repeated_gateway_failures() {
    let app = test_app(Options {
        failing_gateway: true,
        ..Default::default()
    })
    .await;
    let (_, body) = app.checkout(24).await;
    let code = body["data"]["code"].as_str().unwrap().to_string();

    for _ in 0..5 {
        let (status, _) = app
            .json(Method::POST, "/api/payment/create", json!({ "bookingCode": code }))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    let (status, _) = app
        .json(Method::POST, "/api/payment/create", json!({ "bookingCode": code }))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// IPN
// ============================================================================

#[tokio::test]
async fn test_ipn_confirms_booking_and_is_idempotent() {
    let app = test_app(Options::default()).await;
    let (_, body) = app.checkout(24).await;
    let id = booking_id(&body);
    let code = body["data"]["code"].as_str().unwrap().to_string();

    let payload = signed(ipn_payload(&code, 399_000, "TX-1001", 0));
    let (status, body) = app.ipn(&payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"], json!("processed"));
    assert_eq!(body["data"]["effect"], json!("confirmed"));
    assert_eq!(body["data"]["bookingId"], json!(id.to_string()));

    let (_, body) = app.get(&format!("/api/payment/status/{}", id)).await;
    assert_eq!(body["data"]["status"], json!("confirmed"));
    assert_eq!(body["data"]["paymentStatus"], json!("paid"));
    assert_eq!(body["data"]["paymentTransactionId"], json!("TX-1001"));

    // Redelivery
    let (status, body) = app.ipn(&payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"], json!("duplicate"));

    // A failure report after the money arrived changes nothing
    let (status, body) = app.ipn(&signed(ipn_payload(&code, 399_000, "TX-1002", 99))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["effect"], json!("ignored"));
    assert_eq!(app.stored(id).await.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_ipn_with_bad_signature_is_unauthorized() {
    let app = test_app(Options::default()).await;
    let (_, body) = app.checkout(24).await;
    let id = booking_id(&body);
    let code = body["data"]["code"].as_str().unwrap().to_string();

    let mut payload = signed(ipn_payload(&code, 399_000, "TX-2001", 0));
    payload.amount = "1000".to_string();
    let (status, body) = app.ipn(&payload).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let mut wrong_partner = ipn_payload(&code, 399_000, "TX-2002", 0);
    wrong_partner.partner_code = "SOMEONE".to_string();
    let (status, _) = app.ipn(&signed(wrong_partner)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let booking = app.stored(id).await;
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.payment_status, PaymentStatus::Unpaid);
}

#[tokio::test]
async fn test_ipn_amount_mismatch_and_unknown_order() {
    let app = test_app(Options::default()).await;
    let (_, body) = app.checkout(24).await;
    let id = booking_id(&body);
    let code = body["data"]["code"].as_str().unwrap().to_string();

    let (status, _) = app.ipn(&signed(ipn_payload(&code, 1_000, "TX-3001", 0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stored(id).await.payment_status, PaymentStatus::Unpaid);

    let (status, _) = app.ipn(&signed(ipn_payload("CSFFFFFFFF", 1_000, "TX-3002", 0))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(Method::POST, "/api/payment/ipn", json!({ "partnerCode": PARTNER_CODE }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_late_payment_on_cancelled_booking_requires_refund() {
    let app = test_app(Options::default()).await;
    let (_, body) = app.checkout(24).await;
    let id = booking_id(&body);
    let code = body["data"]["code"].as_str().unwrap().to_string();

    let (status, body) = app
        .json(
            Method::PATCH,
            &format!("/api/admin/bookings/{}/status", id),
            json!({ "status": "cancelled", "reason": "customer called" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("cancelled"));

    let (status, body) = app.ipn(&signed(ipn_payload(&code, 399_000, "TX-4001", 0))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["effect"], json!("refund_required"));
    assert_eq!(app.stored(id).await.payment_status, PaymentStatus::RefundRequired);

    // Cancelled bookings cannot be confirmed again
    let (status, _) = app
        .json(
            Method::PATCH,
            &format!("/api/admin/bookings/{}/status", id),
            json!({ "status": "confirmed" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pending_transfer_blocks_a_second_payment_link() {
    let app = test_app(Options::default()).await;
    let (_, body) = app.checkout(24).await;
    let id = booking_id(&body);
    let code = body["data"]["code"].as_str().unwrap().to_string();

    let (status, body) = app.ipn(&signed(ipn_payload(&code, 399_000, "TX-5001", 7000))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"], json!("processed"));
    assert_eq!(body["data"]["effect"], json!("marked_pending"));

    let (_, body) = app.get(&format!("/api/payment/status/{}", id)).await;
    assert_eq!(body["data"]["status"], json!("pending"));
    assert_eq!(body["data"]["paymentStatus"], json!("pending"));

    // The transfer is in flight, a second link could charge the guest twice
    let (status, _) = app
        .json(Method::POST, "/api/payment/create", json!({ "bookingCode": code }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Once the bank reports failure the guest may try again
    let (_, body) = app.ipn(&signed(ipn_payload(&code, 399_000, "TX-5002", 99))).await;
    assert_eq!(body["data"]["effect"], json!("marked_failed"));
    let (status, _) = app
        .json(Method::POST, "/api/payment/create", json!({ "bookingCode": code }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

/// Next `event:` chunk of a server-sent event body, skipping keep-alives.
async fn next_event(body: &mut Body) -> String {
    loop {
        let frame = tokio::time::timeout(std::time::Duration::from_secs(5), body.frame())
            .await
            .expect("no event within 5s")
            .expect("stream ended")
            .unwrap();
        if let Ok(data) = frame.into_data() {
            let text = String::from_utf8(data.to_vec()).unwrap();
            if text.contains("event:") {
                return text;
            }
        }
    }
}

#[tokio::test]
async fn test_payment_stream_sends_status_then_payment_events() {
    let app = test_app(Options::default()).await;
    let (_, body) = app.checkout(24).await;
    let id = booking_id(&body);
    let code = body["data"]["code"].as_str().unwrap().to_string();

    let resp = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/payment/stream/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    let mut stream = resp.into_body();

    let first = next_event(&mut stream).await;
    assert!(first.contains("event: status"), "{}", first);
    assert!(first.contains(&code), "{}", first);
    assert!(first.contains("\"paymentStatus\":\"unpaid\""), "{}", first);

    // Another booking's payment is not forwarded to this stream
    let (_, other) = app.checkout(48).await;
    let other_code = other["data"]["code"].as_str().unwrap().to_string();
    let (_, body) = app.ipn(&signed(ipn_payload(&other_code, 399_000, "TX-6000", 0))).await;
    assert_eq!(body["data"]["effect"], json!("confirmed"));

    let (_, body) = app.ipn(&signed(ipn_payload(&code, 399_000, "TX-6001", 0))).await;
    assert_eq!(body["data"]["effect"], json!("confirmed"));

    let update = next_event(&mut stream).await;
    assert!(update.contains("event: payment"), "{}", update);
    assert!(update.contains("\"kind\":\"confirmed\""), "{}", update);
    assert!(update.contains(&code), "{}", update);
    assert!(!update.contains(&other_code), "{}", update);
    assert!(update.contains("TX-6001"), "{}", update);
}

#[tokio::test]
async fn test_payment_stream_of_unknown_booking_is_not_found() {
    let app = test_app(Options::default()).await;
    let (status, _) = app.get(&format!("/api/payment/stream/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Admin bookings
// ============================================================================

#[tokio::test]
async fn test_admin_booking_status_updates() {
    let app = test_app(Options::default()).await;
    let (_, body) = app.checkout(24).await;
    let id = booking_id(&body);
    let uri = format!("/api/admin/bookings/{}/status", id);

    let (status, _) = app.json(Method::PATCH, &uri, json!({ "status": "completed" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.json(Method::PATCH, &uri, json!({ "reason": "no status" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stored(id).await.status, BookingStatus::Pending);

    let (status, body) = app.json(Method::PATCH, &uri, json!({ "status": "confirmed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("confirmed"));
    assert_eq!(app.stored(id).await.status, BookingStatus::Confirmed);

    let (status, _) = app
        .json(
            Method::PATCH,
            &format!("/api/admin/bookings/{}/status", Uuid::new_v4()),
            json!({ "status": "confirmed" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/admin/bookings?status=confirmed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], json!(id.to_string()));
}

// ============================================================================
// Cron
// ============================================================================

#[tokio::test]
async fn test_cron_status_requires_bearer_outside_development() {
    let app = test_app(Options {
        development: false,
        cron_secret: Some(CRON_SECRET),
        ..Default::default()
    })
    .await;

    let (status, _) = app.get("/api/cron/status").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Request::builder()
                .uri("/api/cron/status")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Request::builder()
                .uri("/api/cron/status")
                .header(header::AUTHORIZATION, format!("Bearer {}", CRON_SECRET))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["jobs"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_cron_without_configured_secret_rejects_everyone() {
    let app = test_app(Options {
        development: false,
        cron_secret: None,
        ..Default::default()
    })
    .await;

    let (status, _) = app
        .send(
            Request::builder()
                .uri("/api/cron/status")
                .header(header::AUTHORIZATION, "Bearer anything")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_status_open_in_development() {
    let app = test_app(Options::default()).await;
    let (status, body) = app.get("/api/cron/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn test_expire_job_cancels_overdue_unpaid_booking() {
    let app = test_app(Options::default()).await;
    let now = Utc::now();
    let id = Uuid::new_v4();
    let overdue = Booking {
        id,
        code: booking_code(id),
        room_id: app.room.id,
        branch_id: app.room.branch_id,
        combo_id: None,
        customer_name: "Le Van C".to_string(),
        customer_phone: Masked("0912345678".to_string()),
        customer_email: None,
        start_time: now + Duration::hours(5),
        end_time: now + Duration::hours(7),
        items: Vec::new(),
        total_amount: 300_000,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        payment_transaction_id: None,
        paid_at: None,
        expires_at: now - Duration::minutes(1),
        cancel_reason: None,
        note: None,
        created_at: now - Duration::minutes(16),
        updated_at: now - Duration::minutes(16),
    };
    assert!(app.store.insert_if_slot_free(&overdue).await.unwrap());

    let (status, body) = app
        .json(Method::POST, "/api/cron/run/expire-unpaid-bookings", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lastOutcome"]["affected"], json!(1));
    assert_eq!(body["data"]["runs"], json!(1));

    let booking = app.stored(id).await;
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(booking.cancel_reason.as_deref(), Some("payment_timeout"));

    let (status, _) = app.json(Method::POST, "/api/cron/run/reindex", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Locks
// ============================================================================

#[tokio::test]
async fn test_guest_unlock_for_running_paid_booking() {
    let app = test_app(Options::default()).await;
    let now = Utc::now();
    let id = Uuid::new_v4();
    let running = Booking {
        id,
        code: booking_code(id),
        room_id: app.room.id,
        branch_id: app.room.branch_id,
        combo_id: Some(app.combo.id),
        customer_name: "Pham D".to_string(),
        customer_phone: Masked("0987654321".to_string()),
        customer_email: None,
        start_time: now - Duration::minutes(5),
        end_time: now + Duration::minutes(175),
        items: Vec::new(),
        total_amount: 399_000,
        status: BookingStatus::Confirmed,
        payment_status: PaymentStatus::Paid,
        payment_transaction_id: Some("TX-5001".to_string()),
        paid_at: Some(now - Duration::hours(1)),
        expires_at: now - Duration::minutes(45),
        cancel_reason: None,
        note: None,
        created_at: now - Duration::hours(1),
        updated_at: now - Duration::hours(1),
    };
    assert!(app.store.insert_if_slot_free(&running).await.unwrap());

    let (status, body) = app
        .json(Method::POST, &format!("/api/bookings/{}/unlock", running.code), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lockId"], json!("4455667"));
    assert_eq!(*app.lock.opened.lock().unwrap(), vec!["4455667".to_string()]);

    // An unpaid booking far in the future cannot open the door
    let (_, body) = app.checkout(24).await;
    let code = body["data"]["code"].as_str().unwrap().to_string();
    let (status, _) = app
        .json(Method::POST, &format!("/api/bookings/{}/unlock", code), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_lock_routes() {
    let app = test_app(Options::default()).await;

    let (status, body) = app.get("/api/admin/locks/token").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cached"], json!(true));
    assert!(body["data"].get("accessToken").is_none());

    let (status, _) = app
        .json(Method::POST, "/api/admin/locks/998877/unlock", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(*app.lock.opened.lock().unwrap(), vec!["998877".to_string()]);
}
