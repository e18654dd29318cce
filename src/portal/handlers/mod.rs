pub mod app_site_association;
pub use self::app_site_association::app_site_association;

pub mod health;
pub use self::health::health;
