pub mod catalog;
pub mod coupon;
pub mod event;
pub mod order;
pub mod payment;
pub mod referral;
pub mod settings;
pub mod user;

pub use catalog::{Plan, Server, ServerLoad};
pub use coupon::Coupon;
pub use event::Event;
pub use order::{Order, Trial};
pub use payment::Payment;
pub use referral::Referral;
pub use settings::{RenewalMethod, StoreSettings};
pub use user::User;
