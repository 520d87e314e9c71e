use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which renewal state machine the store runs. Stored as 1/2/3 in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenewalMethod {
    Default,
    Advanced,
    Fair,
}

impl RenewalMethod {
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => Self::Advanced,
            3 => Self::Fair,
            _ => Self::Default,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Default => 1,
            Self::Advanced => 2,
            Self::Fair => 3,
        }
    }
}

/// Business knobs, loaded from the settings table in one read.
/// Missing or unparseable rows fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub renewal_method: RenewalMethod,
    pub advanced_renewal_days: i64,
    pub advanced_renewal_usage_gb: f64,
    pub trial_enabled: bool,
    pub trial_days: i64,
    pub trial_size_gb: f64,
    pub purchase_enabled: bool,
    pub renewal_enabled: bool,
    /// Smallest accepted wallet top-up, in Rials.
    pub min_deposit: i64,
    /// Referral commission percentage.
    pub referral_rate: i64,
    pub reminder_days: i64,
    pub reminder_usage_gb: f64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            renewal_method: RenewalMethod::Default,
            advanced_renewal_days: 3,
            advanced_renewal_usage_gb: 3.0,
            trial_enabled: true,
            trial_days: 1,
            trial_size_gb: 1.0,
            purchase_enabled: true,
            renewal_enabled: true,
            min_deposit: 10_000,
            referral_rate: 10,
            reminder_days: 3,
            reminder_usage_gb: 3.0,
        }
    }
}

impl StoreSettings {
    pub fn from_rows(rows: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let int = |key: &str, fallback: i64| -> i64 {
            rows.get(key).and_then(|v| v.parse().ok()).unwrap_or(fallback)
        };
        let float = |key: &str, fallback: f64| -> f64 {
            rows.get(key).and_then(|v| v.parse().ok()).unwrap_or(fallback)
        };
        let flag = |key: &str, fallback: bool| -> bool {
            rows.get(key).and_then(|v| v.parse().ok()).unwrap_or(fallback)
        };

        Self {
            renewal_method: RenewalMethod::from_code(int(
                "renewal_method",
                defaults.renewal_method.code(),
            )),
            advanced_renewal_days: int("advanced_renewal_days", defaults.advanced_renewal_days),
            advanced_renewal_usage_gb: float(
                "advanced_renewal_usage_gb",
                defaults.advanced_renewal_usage_gb,
            ),
            trial_enabled: flag("trial_enabled", defaults.trial_enabled),
            trial_days: int("trial_days", defaults.trial_days),
            trial_size_gb: float("trial_size_gb", defaults.trial_size_gb),
            purchase_enabled: flag("purchase_enabled", defaults.purchase_enabled),
            renewal_enabled: flag("renewal_enabled", defaults.renewal_enabled),
            min_deposit: int("min_deposit", defaults.min_deposit),
            referral_rate: int("referral_rate", defaults.referral_rate),
            reminder_days: int("reminder_days", defaults.reminder_days),
            reminder_usage_gb: float("reminder_usage_gb", defaults.reminder_usage_gb),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_fall_back_to_defaults() {
        let settings = StoreSettings::from_rows(&HashMap::new());
        assert_eq!(settings.renewal_method, RenewalMethod::Default);
        assert_eq!(settings.min_deposit, 10_000);
        assert_eq!(settings.referral_rate, 10);
    }

    #[test]
    fn rows_override_defaults_and_garbage_is_ignored() {
        let mut rows = HashMap::new();
        rows.insert("renewal_method".to_string(), "2".to_string());
        rows.insert("trial_size_gb".to_string(), "0.5".to_string());
        rows.insert("min_deposit".to_string(), "not-a-number".to_string());

        let settings = StoreSettings::from_rows(&rows);
        assert_eq!(settings.renewal_method, RenewalMethod::Advanced);
        assert_eq!(settings.trial_size_gb, 0.5);
        assert_eq!(settings.min_deposit, 10_000);
    }

    #[test]
    fn unknown_method_code_maps_to_default() {
        assert_eq!(RenewalMethod::from_code(0), RenewalMethod::Default);
        assert_eq!(RenewalMethod::from_code(99), RenewalMethod::Default);
        assert_eq!(RenewalMethod::from_code(3), RenewalMethod::Fair);
    }
}
