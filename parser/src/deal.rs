use serde::Deserialize;
use serde::Serialize;

/// One structured offer extracted from the assistant text. Only `name` is
/// guaranteed; every other field defaults to absent or empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub name: String,

    /// Digits-and-dot string as extracted, e.g. "9.99". Kept as text so no
    /// precision is lost before display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coupons: Vec<Coupon>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cashback: Vec<Cashback>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cashback {
    pub platform: String,
    pub amount: String,
}

/// Derived discount, computed at full precision. Rounding to display
/// precision happens at render time, not here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Savings {
    pub amount: f64,
    pub percentage: f64,
}

impl Deal {
    /// Returns the discount when both prices are present, numeric, and the
    /// original is actually higher than the current one.
    pub fn savings(&self) -> Option<Savings> {
        let current: f64 = self.current_price.as_deref()?.parse().ok()?;
        let original: f64 = self.original_price.as_deref()?.parse().ok()?;
        if original <= current {
            return None;
        }
        let amount = original - current;
        Some(Savings {
            amount,
            percentage: amount / original * 100.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn deal_with_prices(current: Option<&str>, original: Option<&str>) -> Deal {
        Deal {
            name: "Widget".to_string(),
            current_price: current.map(str::to_string),
            original_price: original.map(str::to_string),
            ..Deal::default()
        }
    }

    #[test]
    fn savings_computed_at_full_precision() {
        let deal = deal_with_prices(Some("9.99"), Some("19.99"));
        let savings = deal.savings().expect("savings should be present");

        // Rounding is the renderer's job.
        assert_eq!("10.00", format!("{:.2}", savings.amount));
        assert_eq!("50.0", format!("{:.1}", savings.percentage));
        assert!(savings.percentage > 50.0);
    }

    #[test]
    fn no_savings_without_both_prices() {
        assert_eq!(None, deal_with_prices(Some("9.99"), None).savings());
        assert_eq!(None, deal_with_prices(None, Some("19.99")).savings());
        assert_eq!(None, deal_with_prices(None, None).savings());
    }

    #[test]
    fn no_savings_when_original_is_not_higher() {
        assert_eq!(None, deal_with_prices(Some("19.99"), Some("19.99")).savings());
        assert_eq!(None, deal_with_prices(Some("29.99"), Some("19.99")).savings());
    }

    #[test]
    fn non_numeric_prices_yield_no_savings() {
        assert_eq!(None, deal_with_prices(Some("free"), Some("19.99")).savings());
    }

    #[test]
    fn deal_round_trips_through_json() -> anyhow::Result<()> {
        let deal = Deal {
            name: "Widget".to_string(),
            current_price: Some("9.99".to_string()),
            original_price: Some("19.99".to_string()),
            coupons: vec![Coupon {
                code: "SAVE20".to_string(),
                description: "Extra 20% off".to_string(),
            }],
            cashback: vec![Cashback {
                platform: "Rakuten".to_string(),
                amount: "5%".to_string(),
            }],
            steps: vec!["Apply the coupon at checkout".to_string()],
            ..Deal::default()
        };

        let json = serde_json::to_value(&deal)?;
        // Absent fields are omitted from the wire shape entirely.
        assert_eq!(None, json.get("description"));
        assert_eq!(None, json.get("product_link"));
        assert_eq!(None, json.get("expiration"));

        let restored: Deal = serde_json::from_value(json)?;
        assert_eq!(deal, restored);
        Ok(())
    }
}
