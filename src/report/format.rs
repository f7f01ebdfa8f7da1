//! Formatted terminal output for statistics, trend buckets and fail ratios.
//!
//! We keep formatting code in one place so:
//! - the statistics code stays clean and testable
//! - output changes are localized

use crate::domain::{AggregationMode, FailRatio, OverallStatistics, Product, TrendBucket};

/// Header block with the distribution summary and control limits.
pub fn format_statistics(product_id: &str, stats: &OverallStatistics) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== yt - Yield Overview ({product_id}) ===\n"));
    out.push_str(&format!(
        "Wafers: n={} | days={}\n",
        stats.count,
        stats.daily_trends.len()
    ));
    out.push_str(&format!(
        "Yield: avg={:.2}% std={:.2} min={:.2}% max={:.2}%\n",
        stats.average, stats.std_dev, stats.min, stats.max
    ));
    out.push_str(&format!(
        "Limits: UCL={:.2}% LCL={:.2}% | target={:.2}%\n",
        stats.ucl, stats.lcl, stats.target
    ));

    out.push_str("\nHistogram:\n");
    let peak = stats.histogram.counts.iter().copied().max().unwrap_or(0);
    for (idx, count) in stats.histogram.counts.iter().enumerate() {
        let lo = stats.histogram.bins.get(idx).copied().unwrap_or(f64::NAN);
        let hi = stats.histogram.bins.get(idx + 1).copied().unwrap_or(f64::NAN);
        out.push_str(
            format!("{lo:>6.1}-{hi:<6.1} {count:>5} {}\n", bar(*count, peak, 40)).trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Trend table: one line per bucket.
pub fn format_trend(buckets: &[TrendBucket], mode: AggregationMode, target: Option<f64>) -> String {
    let mut out = String::new();

    out.push_str(
        format!(
            "{:<16} {:>8} {:>7} {:>5} {:<12} {}\n",
            mode.axis_label(),
            "yield",
            "wafers",
            "days",
            "lot",
            "bins"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<16} {:-<8} {:-<7} {:-<5} {:-<12} {:-<4}\n", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for b in buckets {
        let flag = match target {
            Some(t) if b.mean_yield < t => "!",
            _ => " ",
        };
        let bins: Vec<String> = b
            .bin_stats
            .iter()
            .map(|(name, pct)| format!("{name}={pct:.2}"))
            .collect();
        out.push_str(
            format!(
                "{:<16} {:>7.2}{flag} {:>7} {:>5} {:<12} {}\n",
                truncate(&b.date, 16),
                b.mean_yield,
                b.wafer_count,
                b.day_count,
                truncate(b.lot_id.as_deref().unwrap_or(""), 12),
                bins.join(" "),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Fail-ratio list (the pie legend).
pub fn format_fail_ratios(ratios: &[FailRatio]) -> String {
    if ratios.is_empty() {
        return "No fail data available\n".to_string();
    }

    let mut out = String::new();
    out.push_str(format!("{:<20} {:>7} {:>7} {:<8}\n", "bin", "count", "ratio", "color").trim_end());
    out.push('\n');
    for r in ratios {
        out.push_str(
            format!(
                "{:<20} {:>7} {:>6}% {:<8}\n",
                truncate(&r.name, 20),
                r.count,
                r.ratio,
                r.color
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

pub fn format_products(products: &[Product]) -> String {
    let mut out = String::new();
    for p in products {
        let mark = if p.active { "*" } else { " " };
        out.push_str(&format!("{mark} {:<16} {}\n", p.id, p.name));
    }
    out
}

fn bar(count: u64, peak: u64, width: usize) -> String {
    if peak == 0 {
        return String::new();
    }
    let len = ((count as f64 / peak as f64) * width as f64).round() as usize;
    "#".repeat(len)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Histogram;
    use std::collections::BTreeMap;

    fn stats() -> OverallStatistics {
        OverallStatistics {
            average: 94.0,
            std_dev: 3.27,
            min: 90.0,
            max: 98.0,
            ucl: 103.8,
            lcl: 84.2,
            target: 95.0,
            histogram: Histogram {
                counts: vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 3],
                bins: (0..=10).map(|i| i as f64 * 10.0).collect(),
            },
            count: 3,
            daily_trends: Vec::new(),
        }
    }

    #[test]
    fn statistics_block_mentions_limits() {
        let text = format_statistics("PRODUCT-A", &stats());
        assert!(text.contains("PRODUCT-A"));
        assert!(text.contains("UCL=103.80%"));
        assert!(text.contains("LCL=84.20%"));
        assert!(text.lines().any(|l| l.starts_with("  90.0-100.0") && l.ends_with(&"#".repeat(40))));
    }

    #[test]
    fn trend_rows_flag_buckets_below_target() {
        let buckets = vec![
            TrendBucket {
                date: "2024-W01".to_string(),
                lot_id: None,
                mean_yield: 93.0,
                wafer_count: 6,
                day_count: 3,
                bin_stats: BTreeMap::from([("3_Open".to_string(), 3.0)]),
            },
            TrendBucket {
                date: "2024-W02".to_string(),
                lot_id: None,
                mean_yield: 97.0,
                wafer_count: 2,
                day_count: 1,
                bin_stats: BTreeMap::new(),
            },
        ];
        let text = format_trend(&buckets, AggregationMode::Weekly, Some(95.0));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Weekly"));
        assert!(lines[2].contains("93.00!"));
        assert!(lines[2].ends_with("3_Open=3.00"));
        assert!(lines[3].contains("97.00 "));
    }

    #[test]
    fn empty_fail_ratios_message() {
        assert_eq!(format_fail_ratios(&[]), "No fail data available\n");
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("LOT-20240101-A", 8), "LOT-202.");
        assert_eq!(truncate("short", 8), "short");
    }
}
