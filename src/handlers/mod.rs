pub mod auth;
pub mod carts;
pub mod common;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;
pub mod vendor_orders;
pub mod wishlists;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::notifications::Mailer;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<crate::services::AccountService>,
    pub catalog: Arc<crate::services::CatalogService>,
    pub cart: Arc<crate::services::CartService>,
    pub wishlist: Arc<crate::services::WishlistService>,
    pub orders: Arc<crate::services::OrderService>,
    pub reviews: Arc<crate::services::ReviewService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<crate::auth::AuthService>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let accounts = Arc::new(crate::services::AccountService::new(
            db.clone(),
            auth_service,
            event_sender.clone(),
        ));
        let catalog = Arc::new(crate::services::CatalogService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let cart = Arc::new(crate::services::CartService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let wishlist = Arc::new(crate::services::WishlistService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(crate::services::OrderService::new(
            db.clone(),
            event_sender.clone(),
            mailer,
        ));
        let reviews = Arc::new(crate::services::ReviewService::new(db, event_sender));

        Self {
            accounts,
            catalog,
            cart,
            wishlist,
            orders,
            reviews,
        }
    }
}
