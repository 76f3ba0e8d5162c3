#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde::Deserialize;
use serde_json::Value;
use tower::ServiceExt;

use lms_api::{
    ApiState, AuthConfig,
    config::Environment,
    error::ApiError,
    middleware::security_headers::apply_security_headers,
    notify::{Notification, Notifier},
    payment::{CreatedIntent, Metadata, PaymentGateway, PaymentIntent, STATUS_SUCCEEDED},
    router,
};

pub const JWT_SECRET: &str = "test_jwt_secret_minimum_32_characters_long";
pub const PASSWORD: &str = "Password123";

/// Notifier that keeps every message so tests can read the OTPs it carried
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Notification)>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn fail_next_sends(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// The most recent OTP sent to `recipient`
    pub fn last_otp(&self, recipient: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|(to, _)| to == recipient)
            .find_map(|(_, n)| n.otp().map(str::to_string))
    }

    pub fn count(&self, recipient: &str, kind: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, n)| to == recipient && n.kind() == kind)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), ApiError> {
        if *self.failing.lock().unwrap() {
            return Err(ApiError::Email("smtp unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), notification.clone()));
        Ok(())
    }
}

/// In-memory payment provider. Intents start unpaid; tests settle them.
#[derive(Default)]
pub struct ScriptedGateway {
    intents: Mutex<HashMap<String, PaymentIntent>>,
}

impl ScriptedGateway {
    pub fn succeed(&self, intent_id: &str) {
        if let Some(intent) = self.intents.lock().unwrap().get_mut(intent_id) {
            intent.status = STATUS_SUCCEEDED.to_string();
        }
    }

    /// Register an intent directly, bypassing `create_intent`
    pub fn insert(&self, intent: PaymentIntent) {
        self.intents
            .lock()
            .unwrap()
            .insert(intent.id.clone(), intent);
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        _description: &str,
        metadata: &Metadata,
    ) -> Result<CreatedIntent, ApiError> {
        let id = format!("pi_{}", uuid::Uuid::new_v4().simple());
        self.insert(PaymentIntent {
            id: id.clone(),
            status: "requires_payment_method".to_string(),
            amount,
            currency: currency.to_string(),
            metadata: metadata.clone(),
        });

        Ok(CreatedIntent {
            client_secret: format!("{id}_secret"),
            id,
            currency: currency.to_string(),
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ApiError> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| ApiError::ExternalService(format!("No such payment_intent: {intent_id}")))
    }
}

/// Everything a test needs: state, its fakes and a way to make requests
pub struct TestContext {
    pub state: ApiState,
    pub notifier: Arc<RecordingNotifier>,
    pub payments: Arc<ScriptedGateway>,
}

impl TestContext {
    pub fn app(&self) -> Router {
        apply_security_headers(
            router::router().with_state(self.state.clone()),
            self.state.environment,
        )
    }

    pub fn client(&self) -> TestClient {
        TestClient::new(self.app())
    }

    pub fn token_for(&self, user: &db::TestUser) -> String {
        jwt::create_test_token(user)
    }
}

pub struct TestStateBuilder {
    environment: Environment,
    otp_expiry_minutes: i64,
}

impl TestStateBuilder {
    pub fn new() -> Self {
        Self {
            environment: Environment::Development,
            otp_expiry_minutes: 5,
        }
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Connects to `TEST_DATABASE_URL` and migrates it.
    ///
    /// Returns `None` when the variable is unset so database tests are
    /// skipped on machines without Postgres.
    pub async fn build(self) -> Option<TestContext> {
        let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping database test");
            return None;
        };

        let pool = lms_db::create_pool(&database_url, 10)
            .await
            .expect("Failed to connect to test database");
        lms_db::ensure_db_and_migrate(&database_url, &pool)
            .await
            .expect("Failed to migrate test database");

        let notifier = Arc::new(RecordingNotifier::default());
        let payments = Arc::new(ScriptedGateway::default());

        let state = ApiState {
            pool,
            auth: AuthConfig {
                jwt_secret: JWT_SECRET.to_string(),
                jwt_expiry_hours: 1,
                refresh_token_expiry_days: 7,
            },
            otp_expiry_minutes: self.otp_expiry_minutes,
            bcrypt_cost: 4,
            environment: self.environment,
            payment_currency: "usd".to_string(),
            payments: payments.clone(),
            notifier: notifier.clone(),
        };

        Some(TestContext {
            state,
            notifier,
            payments,
        })
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper to make requests to the test app
pub struct TestClient {
    router: Router,
    client_ip: String,
}

impl TestClient {
    /// Each client gets its own address so rate limit buckets are not
    /// shared between tests running in parallel.
    pub fn new(router: Router) -> Self {
        let bytes = uuid::Uuid::new_v4().into_bytes();
        Self {
            router,
            client_ip: format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2]),
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", &self.client_ip);

        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(json).expect("Failed to serialize body"))
            }
            None => Body::empty(),
        };

        let mut request = builder.body(body).expect("Failed to build request");
        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);
        request.extensions_mut().insert(ConnectInfo(peer));

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            body,
            headers,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, None, token).await
    }

    pub async fn post(&self, uri: &str, body: &Value, token: Option<&str>) -> TestResponse {
        self.send(Method::POST, uri, Some(body), token).await
    }

    pub async fn patch(&self, uri: &str, body: &Value, token: Option<&str>) -> TestResponse {
        self.send(Method::PATCH, uri, Some(body), token).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::DELETE, uri, None, token).await
    }
}

/// Test response wrapper
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
    pub headers: HeaderMap,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON response")
    }

    /// `data` of a success envelope
    pub fn data(&self) -> Value {
        self.json::<Value>()["data"].clone()
    }

    pub fn detail(&self) -> String {
        self.json::<Value>()["detail"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
    }
}

/// Direct database seeding, for state a test is not itself exercising
pub mod db {
    use lms_db::models::Role;
    use sqlx::PgPool;
    use uuid::Uuid;

    #[derive(Debug, Clone)]
    pub struct TestUser {
        pub id: Uuid,
        pub email: String,
        pub role: Role,
    }

    pub async fn create_user(pool: &PgPool, role: Role) -> anyhow::Result<TestUser> {
        let email = super::test_data::unique_email(role.as_str());
        let username = super::test_data::unique_username(role.as_str());
        let password_hash = bcrypt::hash(super::PASSWORD, 4)?;

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO users (username, email, password_hash, full_name, role, is_verified)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING id
            "#,
        )
        .bind(&username)
        .bind(&email)
        .bind(&password_hash)
        .bind(format!("Test {}", role.as_str()))
        .bind(role)
        .fetch_one(pool)
        .await?;

        Ok(TestUser { id, email, role })
    }

    pub async fn create_category(pool: &PgPool) -> anyhow::Result<Uuid> {
        let (id,): (Uuid,) =
            sqlx::query_as("INSERT INTO categories (title) VALUES ($1) RETURNING id")
                .bind(super::test_data::unique_username("category"))
                .fetch_one(pool)
                .await?;
        Ok(id)
    }

    pub async fn create_course(
        pool: &PgPool,
        instructor_id: Uuid,
        price: f64,
    ) -> anyhow::Result<Uuid> {
        let category_id = create_category(pool).await?;
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO courses (title, price, category_id, instructor_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(super::test_data::unique_username("course"))
        .bind(price)
        .bind(category_id)
        .bind(instructor_id)
        .fetch_one(pool)
        .await?;
        Ok(id)
    }

    pub async fn create_lesson(
        pool: &PgPool,
        course_id: Uuid,
        sequence_number: i32,
    ) -> anyhow::Result<Uuid> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO lessons (course_id, title, sequence_number)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(course_id)
        .bind(format!("Lesson {sequence_number}"))
        .bind(sequence_number)
        .fetch_one(pool)
        .await?;
        Ok(id)
    }

    pub async fn enroll(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> anyhow::Result<Uuid> {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO enrollments (user_id, course_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(pool)
        .await?;
        Ok(id)
    }

    pub async fn deactivate_enrollment(pool: &PgPool, enrollment_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE enrollments SET is_active = FALSE WHERE id = $1")
            .bind(enrollment_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Backdate the stored OTP so that it is past its expiry
    pub async fn age_otp(pool: &PgPool, email: &str, minutes: i64) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET otp_created_at = NOW() - make_interval(mins => $2) WHERE email = $1",
        )
        .bind(email)
        .bind(minutes as i32)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove users and, through cascades, their courses and enrollments
    pub async fn delete_users(pool: &PgPool, ids: &[Uuid]) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(ids)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete_user_by_email(pool: &PgPool, email: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(pool)
            .await?;
        Ok(())
    }
}

/// JWT test helpers
pub mod jwt {
    use lms_api::auth::jwt::generate_jwt_token;

    use super::db::TestUser;

    pub fn create_test_token(user: &TestUser) -> String {
        generate_jwt_token(user.id, &user.email, user.role, super::JWT_SECRET, 1)
            .expect("Failed to generate test JWT token")
    }
}

/// Test data helpers
pub mod test_data {
    /// Generate a unique email for test isolation
    pub fn unique_email(base: &str) -> String {
        let uuid = uuid::Uuid::new_v4();
        format!("{}+{}@example.com", base, &uuid.to_string()[..8])
    }

    /// Generate a unique username for test isolation
    pub fn unique_username(base: &str) -> String {
        let uuid = uuid::Uuid::new_v4();
        format!("{}_{}", base, &uuid.to_string()[..8])
    }
}
