use serde::Serialize;

use pasaj_db::models::{Plan, RenewalMethod, StoreSettings};

/// Snapshot of a subscription's remote state, fetched fresh right before
/// the renewal decision.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Standing {
    pub remaining_days: i64,
    pub remaining_gb: f64,
    pub current_usage_gb: f64,
    pub usage_limit_gb: f64,
    pub package_days: i64,
}

impl Standing {
    /// Out of days or out of traffic. Either alone counts.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_days <= 0 || self.remaining_gb <= 0.0
    }
}

/// The numbers a renewal writes back to the panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenewalParams {
    pub usage_limit_gb: f64,
    pub package_days: i64,
    pub reset_usage: bool,
}

impl RenewalParams {
    fn fresh(plan: &Plan) -> Self {
        Self {
            usage_limit_gb: plan.size_gb,
            package_days: plan.days as i64,
            reset_usage: true,
        }
    }
}

/// The advanced method only sells a renewal near exhaustion. Crossing
/// either threshold is enough to unlock it.
pub fn advanced_gate_open(standing: &Standing, settings: &StoreSettings) -> bool {
    standing.remaining_days <= settings.advanced_renewal_days
        || standing.remaining_gb <= settings.advanced_renewal_usage_gb
}

/// Computes what the renewal should set on the panel. Exhausted
/// subscriptions always restart fresh from the plan; what happens to a
/// subscription renewed early depends on the configured method.
pub fn compute(method: RenewalMethod, standing: &Standing, plan: &Plan) -> RenewalParams {
    if standing.is_exhausted() {
        return RenewalParams::fresh(plan);
    }

    match method {
        // The new period starts now, so leftover traffic carries over but
        // leftover days are burned: elapsed days of the old package count
        // against the new one.
        RenewalMethod::Default => RenewalParams {
            usage_limit_gb: standing.usage_limit_gb + plan.size_gb,
            package_days: plan.days as i64 + (standing.package_days - standing.remaining_days),
            reset_usage: false,
        },
        // Paid-up-front renewal: a clean restart regardless of what is left.
        RenewalMethod::Advanced => RenewalParams::fresh(plan),
        // Leftover traffic and the full old window both carry over.
        RenewalMethod::Fair => RenewalParams {
            usage_limit_gb: standing.usage_limit_gb + plan.size_gb,
            package_days: plan.days as i64 + standing.package_days,
            reset_usage: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn plan(size_gb: f64, days: i32) -> Plan {
        Plan {
            id: 1,
            name: "Gold".to_string(),
            size_gb,
            days,
            price: 1_000_000,
            server_id: 1,
            active: true,
            description: None,
            created_at: Utc::now(),
        }
    }

    fn standing(remaining_days: i64, remaining_gb: f64, limit_gb: f64, package_days: i64) -> Standing {
        Standing {
            remaining_days,
            remaining_gb,
            current_usage_gb: limit_gb - remaining_gb,
            usage_limit_gb: limit_gb,
            package_days,
        }
    }

    #[test]
    fn default_method_stacks_limit_and_burns_elapsed_days() {
        // 10 of 30 days remain on a 50 GB package; renewing with 30 GB / 30 d.
        let params = compute(
            RenewalMethod::Default,
            &standing(10, 20.0, 50.0, 30),
            &plan(30.0, 30),
        );
        assert_eq!(
            params,
            RenewalParams {
                usage_limit_gb: 80.0,
                package_days: 50,
                reset_usage: false,
            }
        );
    }

    #[test]
    fn exhausted_subscription_restarts_fresh_under_every_method() {
        let empty = standing(0, 5.0, 50.0, 30);
        let drained = standing(12, 0.0, 50.0, 30);
        let p = plan(30.0, 30);
        let fresh = RenewalParams {
            usage_limit_gb: 30.0,
            package_days: 30,
            reset_usage: true,
        };

        for method in [RenewalMethod::Default, RenewalMethod::Advanced, RenewalMethod::Fair] {
            assert_eq!(compute(method, &empty, &p), fresh);
            assert_eq!(compute(method, &drained, &p), fresh);
        }
    }

    #[test]
    fn advanced_method_restarts_fresh_even_midterm() {
        let params = compute(
            RenewalMethod::Advanced,
            &standing(25, 40.0, 50.0, 30),
            &plan(30.0, 30),
        );
        assert!(params.reset_usage);
        assert_eq!(params.usage_limit_gb, 30.0);
        assert_eq!(params.package_days, 30);
    }

    #[test]
    fn fair_method_keeps_the_whole_old_window() {
        let params = compute(
            RenewalMethod::Fair,
            &standing(10, 20.0, 50.0, 30),
            &plan(30.0, 30),
        );
        assert_eq!(
            params,
            RenewalParams {
                usage_limit_gb: 80.0,
                package_days: 60,
                reset_usage: false,
            }
        );
    }

    #[test]
    fn advanced_gate_opens_on_either_threshold() {
        let settings = StoreSettings {
            advanced_renewal_days: 3,
            advanced_renewal_usage_gb: 3.0,
            ..StoreSettings::default()
        };

        // Plenty of both: locked.
        assert!(!advanced_gate_open(&standing(10, 20.0, 50.0, 30), &settings));
        // Days low, traffic plentiful: open.
        assert!(advanced_gate_open(&standing(2, 20.0, 50.0, 30), &settings));
        // Traffic low, days plentiful: open.
        assert!(advanced_gate_open(&standing(10, 1.5, 50.0, 30), &settings));
        // Exactly at the threshold: open.
        assert!(advanced_gate_open(&standing(3, 20.0, 50.0, 30), &settings));
    }
}
