pub mod coupon_repo;
pub mod event_repo;
pub mod order_repo;
pub mod payment_repo;
pub mod plan_repo;
pub mod referral_repo;
pub mod server_repo;
pub mod settings_repo;
pub mod trial_repo;
pub mod user_repo;

pub use coupon_repo::CouponRepository;
pub use event_repo::EventRepository;
pub use order_repo::OrderRepository;
pub use payment_repo::PaymentRepository;
pub use plan_repo::PlanRepository;
pub use referral_repo::{ReferralRepository, ReferralStats};
pub use server_repo::ServerRepository;
pub use settings_repo::SettingsRepository;
pub use trial_repo::TrialRepository;
pub use user_repo::UserRepository;
