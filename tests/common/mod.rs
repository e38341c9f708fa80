#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use marketplace_api::{
    auth::{AuthConfig, AuthService, AuthUser},
    config::AppConfig,
    db::DbPool,
    entities::user::UserRole,
    events::{Event, EventSender},
    handlers::AppServices,
    migrator::Migrator,
    notifications::{Mailer, NotificationError},
    services::accounts::RegisterInput,
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Captured outbound message: (to, subject, body).
pub type SentMail = (String, String, String);

/// Mailer that records every message for assertions.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .await
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "integration_test_secret_key_that_is_at_least_64_characters_long!!"
            .to_string(),
        jwt_expiration: 1800,
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "development".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: false,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        event_channel_capacity: 16,
        mail_from: "orders@test.local".to_string(),
    }
}

/// Service stack wired against a fresh in-memory SQLite database.
pub struct TestContext {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
    pub mailer: Arc<RecordingMailer>,
    _event_rx: mpsc::Receiver<Event>,
}

impl TestContext {
    pub async fn new() -> Self {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        // A single pooled connection keeps every session on the same
        // in-memory database.
        opt.max_connections(1).sqlx_logging(false);

        let db = Database::connect(opt).await.expect("connect to sqlite");
        Migrator::up(&db, None).await.expect("run migrations");
        let db = Arc::new(db);

        let (event_tx, event_rx) = mpsc::channel(1024);
        let event_sender = Arc::new(EventSender::new(event_tx));

        let auth = Arc::new(AuthService::new(AuthConfig::new(
            "integration_test_secret_key_that_is_at_least_64_characters_long!!".to_string(),
            Duration::from_secs(1800),
        )));

        let mailer = Arc::new(RecordingMailer::default());
        let mailer_dyn: Arc<dyn Mailer> = mailer.clone();
        let services = AppServices::new(db.clone(), event_sender, auth.clone(), mailer_dyn);

        Self {
            db,
            services,
            auth,
            mailer,
            _event_rx: event_rx,
        }
    }

    /// Builds the full HTTP router with the auth middleware applied, as
    /// `main` wires it, for request-level tests.
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            db: self.db.clone(),
            config: test_config(),
            event_sender: EventSender::new(mpsc::channel(16).0),
            services: self.services.clone(),
            auth: self.auth.clone(),
        });

        Router::new()
            .nest("/api/v1", marketplace_api::api_v1_routes())
            .layer(axum::middleware::from_fn_with_state(
                self.auth.clone(),
                marketplace_api::auth::authenticate,
            ))
            .with_state(state)
    }

    /// Registers an account and returns the request principal for it.
    pub async fn register(&self, username: &str, role: UserRole) -> AuthUser {
        let account = self
            .services
            .accounts
            .register(RegisterInput {
                username: username.to_string(),
                name: format!("{} name", username),
                email: format!("{}@example.com", username),
                phone: "5550100".to_string(),
                role,
                password: "correct-horse-battery".to_string(),
            })
            .await
            .expect("register account");

        AuthUser {
            user_id: account.id,
            username: account.username,
            name: account.name,
            email: account.email,
            role: account.role,
        }
    }

    /// Creates a product owned by the given vendor principal.
    pub async fn seed_product(
        &self,
        vendor: &AuthUser,
        name: &str,
        price: Decimal,
    ) -> Uuid {
        let created = self
            .services
            .catalog
            .create_product(
                vendor,
                marketplace_api::services::catalog::CreateProductInput {
                    name: name.to_string(),
                    description: String::new(),
                    price,
                    available: true,
                },
            )
            .await
            .expect("create product");
        created.id
    }

    /// Puts (product, quantity) into the shopper's cart.
    pub async fn add_to_cart(&self, shopper: &AuthUser, product_id: Uuid, quantity: i32) {
        self.services
            .cart
            .add(
                shopper,
                marketplace_api::services::carts::AddToCartInput {
                    product_id,
                    quantity,
                },
            )
            .await
            .expect("add to cart");
    }

    /// Drives an order to `delivered` through the admin transition chain.
    pub async fn deliver_order(&self, admin: &AuthUser, order_id: Uuid) {
        for status in ["processing", "shipped", "delivered"] {
            self.services
                .orders
                .update_status(admin, order_id, status)
                .await
                .expect("advance order status");
        }
    }
}
