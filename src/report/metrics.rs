use serde::{Deserialize, Serialize};

use crate::model::{DataOrigin, ReportFrequency};

// ======================================================
// DATA MODEL
// ======================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Network,
}

impl MetricKind {
    pub fn title(&self) -> &'static str {
        match self {
            MetricKind::Cpu     => "CPU Utilization",
            MetricKind::Memory  => "Memory Usage",
            MetricKind::Network => "Network Throughput",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Cpu     => "%",
            MetricKind::Memory  => "GB",
            MetricKind::Network => "MB",
        }
    }

    pub fn style(&self) -> ChartStyle {
        match self {
            MetricKind::Cpu | MetricKind::Network => ChartStyle::Line,
            MetricKind::Memory                    => ChartStyle::Bar,
        }
    }

    /// Fixed upper bound of the value axis, if the metric has one.
    pub fn axis_max(&self) -> Option<f64> {
        match self {
            MetricKind::Cpu => Some(100.0),
            _               => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartStyle {
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricChart {
    pub metric:       MetricKind,
    pub title:        String,
    pub unit:         String,
    pub style:        ChartStyle,
    pub buckets:      Vec<String>,
    pub values:       Vec<f64>,
    pub origin:       DataOrigin,
    pub origin_label: String,
}

impl MetricChart {
    pub fn peak(&self) -> f64 {
        self.values.iter().cloned().fold(0.0, f64::max)
    }

    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSection {
    pub frequency: ReportFrequency,
    pub charts:    Vec<MetricChart>,
}

// ======================================================
// BUCKETS
// ======================================================

pub fn bucket_labels(frequency: ReportFrequency) -> Vec<String> {
    let labels: &[&str] = match frequency {
        ReportFrequency::Daily => &["00-04", "04-08", "08-12", "12-16", "16-20", "20-24"],
        ReportFrequency::Weekly => &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
        ReportFrequency::Monthly => &["Week 1", "Week 2", "Week 3", "Week 4"],
    };
    labels.iter().map(|l| l.to_string()).collect()
}

fn sample_series(metric: MetricKind, frequency: ReportFrequency) -> Vec<f64> {
    let values: &[f64] = match (metric, frequency) {
        (MetricKind::Cpu, ReportFrequency::Daily)       => &[22.0, 18.0, 54.0, 71.0, 63.0, 38.0],
        (MetricKind::Cpu, ReportFrequency::Weekly)      => &[65.0, 59.0, 80.0, 81.0, 56.0, 55.0, 40.0],
        (MetricKind::Cpu, ReportFrequency::Monthly)     => &[58.0, 63.0, 71.0, 49.0],
        (MetricKind::Memory, ReportFrequency::Daily)    => &[8.0, 7.0, 12.0, 15.0, 14.0, 10.0],
        (MetricKind::Memory, ReportFrequency::Weekly)   => &[12.0, 19.0, 15.0, 17.0, 14.0, 13.0, 11.0],
        (MetricKind::Memory, ReportFrequency::Monthly)  => &[13.0, 15.0, 16.0, 12.0],
        (MetricKind::Network, ReportFrequency::Daily)   => &[30.0, 22.0, 95.0, 140.0, 118.0, 60.0],
        (MetricKind::Network, ReportFrequency::Weekly)  => &[120.0, 98.0, 143.0, 160.0, 110.0, 87.0, 64.0],
        (MetricKind::Network, ReportFrequency::Monthly) => &[640.0, 710.0, 820.0, 590.0],
    };
    values.to_vec()
}

// ======================================================
// SECTION
// ======================================================

/// Placeholder metric charts. No telemetry collaborator exists, so every
/// series is sample data and is labelled as such.
pub fn sample_metrics(frequency: ReportFrequency) -> MetricsSection {
    let origin = DataOrigin::Sample;
    let charts = [MetricKind::Cpu, MetricKind::Memory, MetricKind::Network]
        .into_iter()
        .map(|metric| MetricChart {
            metric,
            title:        metric.title().to_string(),
            unit:         metric.unit().to_string(),
            style:        metric.style(),
            buckets:      bucket_labels(frequency),
            values:       sample_series(metric, frequency),
            origin,
            origin_label: origin.label().to_string(),
        })
        .collect();

    MetricsSection { frequency, charts }
}
