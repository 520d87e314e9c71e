pub mod balancer;
pub mod coupon_service;
pub mod provision;
pub mod referral_service;
pub mod renewal;
pub mod stats_service;
pub mod store_service;
pub mod subscription_service;
pub mod wallet_service;
