pub mod accounts;
pub mod carts;
pub mod catalog;
pub mod orders;
pub mod reviews;
pub mod wishlists;

pub use accounts::AccountService;
pub use carts::CartService;
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use reviews::ReviewService;
pub use wishlists::WishlistService;
