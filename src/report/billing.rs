use serde::{Deserialize, Serialize};

use crate::model::{BillingPeriod, CloudProvider, DataOrigin};

// ======================================================
// DATA MODEL
// ======================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub category:     String,
    pub description:  String,
    /// Integer cents so the total is exact.
    pub amount_cents: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSection {
    pub period:      BillingPeriod,
    pub year:        String,
    pub month:       String,
    pub month_name:  String,
    pub currency:    String,
    pub items:       Vec<LineItem>,
    pub total_cents: u64,
    pub origin:      DataOrigin,
}

impl BillingSection {
    /// Recompute the total from the line items.
    pub fn items_sum(&self) -> u64 {
        self.items.iter().map(|i| i.amount_cents).sum()
    }
}

// ======================================================
// SAMPLE BREAKDOWN
// ======================================================

/// (category, description, base amount in cents)
const AWS_CATEGORIES: &[(&str, &str, u64)] = &[
    ("Compute",       "EC2 instance hours",           184_250),
    ("Database",      "RDS instance hours and IOPS",  96_480),
    ("Storage",       "S3 and EBS volumes",           31_775),
    ("Networking",    "Data transfer and NAT gateway", 22_190),
    ("Monitoring",    "CloudWatch metrics and logs",   6_415),
    ("Support",       "Business support plan",        10_000),
];

const AZURE_CATEGORIES: &[(&str, &str, u64)] = &[
    ("Compute",       "Virtual machine hours",          162_830),
    ("Database",      "Azure SQL Database vCores",        88_120),
    ("Storage",       "Managed disks and blob storage",   27_340),
    ("Networking",    "Bandwidth and load balancer",      18_905),
    ("Monitoring",    "Azure Monitor and Log Analytics",   5_260),
];

/// Deterministic month-to-month variation between 100% and 114% of the base.
fn period_factor(period: BillingPeriod) -> u64 {
    100 + (period.month as u64 * 7 + (period.year as u64 % 10) * 3) % 15
}

/// Placeholder cost breakdown for a billing period. There is no billing
/// backend, so the section is always marked as sample data.
pub fn sample_billing(provider: CloudProvider, period: BillingPeriod) -> BillingSection {
    let categories = match provider {
        CloudProvider::Aws   => AWS_CATEGORIES,
        CloudProvider::Azure => AZURE_CATEGORIES,
    };
    let factor = period_factor(period);

    let items: Vec<LineItem> = categories
        .iter()
        .map(|(category, description, base)| LineItem {
            category:     category.to_string(),
            description:  description.to_string(),
            amount_cents: base * factor / 100,
        })
        .collect();

    let total_cents = items.iter().map(|i| i.amount_cents).sum();

    BillingSection {
        period,
        year:       period.year_label(),
        month:      period.month_label(),
        month_name: period.month_name().to_string(),
        currency:   "USD".to_string(),
        items,
        total_cents,
        origin:     DataOrigin::Sample,
    }
}

/// `123456` -> `$1,234.56`
pub fn format_cents(cents: u64) -> String {
    let dollars = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${}.{:02}", grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_the_sum_of_line_items() {
        for provider in [CloudProvider::Aws, CloudProvider::Azure] {
            for month in 1..=12 {
                let period = BillingPeriod::new(2025, month).unwrap();
                let section = sample_billing(provider, period);
                assert!(!section.items.is_empty());
                assert_eq!(section.total_cents, section.items_sum());
            }
        }
    }

    #[test]
    fn period_labels_keep_leading_zeroes() {
        let section = sample_billing(CloudProvider::Aws, BillingPeriod::new(2025, 3).unwrap());
        assert_eq!(section.year, "2025");
        assert_eq!(section.month, "03");
        assert_eq!(section.month_name, "March");
        assert_eq!(section.origin, DataOrigin::Sample);
    }

    #[test]
    fn providers_have_their_own_categories() {
        let period = BillingPeriod::new(2024, 11).unwrap();
        let aws = sample_billing(CloudProvider::Aws, period);
        let azure = sample_billing(CloudProvider::Azure, period);
        assert!(aws.items.iter().any(|i| i.description.contains("EC2")));
        assert!(azure.items.iter().any(|i| i.description.contains("Virtual machine")));
    }

    #[test]
    fn cents_are_formatted_with_grouping() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(123_456), "$1,234.56");
        assert_eq!(format_cents(100_000_000), "$1,000,000.00");
    }
}
