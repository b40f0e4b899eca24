//! Structured-data summaries of a campaign dataset.

use crate::dataset::{CampaignDataset, Column};
use insight_core::{AppError, AppResult};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

/// Turns a dataset into prompt-ready text.
pub trait DatasetSummarizer: Send + Sync {
    fn summarize(&self, dataset: &CampaignDataset) -> AppResult<String>;
}

/// Describe-style table: one row per column.
///
/// Numeric and date columns report count, mean, min and max; text columns
/// report count, unique and the most frequent value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescribeSummarizer;

fn fmt_number(value: f64) -> String {
    format!("{:.6}", value)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn describe_numbers(values: &[Option<f64>]) -> [String; 6] {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return ["0".into(), "".into(), "".into(), "".into(), "".into(), "".into()];
    }

    let mean = present.iter().sum::<f64>() / present.len() as f64;
    let min = present.iter().copied().fold(f64::INFINITY, f64::min);
    let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    [
        present.len().to_string(),
        String::new(),
        String::new(),
        fmt_number(mean),
        fmt_number(min),
        fmt_number(max),
    ]
}

fn describe_text(values: &[Option<String>]) -> [String; 6] {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for value in values.iter().flatten() {
        let count = counts.entry(value.as_str()).or_insert(0);
        if *count == 0 {
            first_seen.push(value.as_str());
        }
        *count += 1;
    }

    // Most frequent, earliest seen on ties
    let top = first_seen
        .iter()
        .copied()
        .fold(None::<(&str, usize)>, |best, value| {
            let count = counts.get(value).copied().unwrap_or(0);
            match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((value, count)),
            }
        })
        .map(|(value, _)| value.to_string())
        .unwrap_or_default();

    [
        values.iter().flatten().count().to_string(),
        counts.len().to_string(),
        top,
        String::new(),
        String::new(),
        String::new(),
    ]
}

fn describe_dates(values: &[Option<chrono::NaiveDate>]) -> [String; 6] {
    let present: Vec<_> = values.iter().flatten().collect();
    let min = present.iter().min().map(|d| d.to_string()).unwrap_or_default();
    let max = present.iter().max().map(|d| d.to_string()).unwrap_or_default();
    [
        present.len().to_string(),
        String::new(),
        String::new(),
        String::new(),
        min,
        max,
    ]
}

impl DatasetSummarizer for DescribeSummarizer {
    fn summarize(&self, dataset: &CampaignDataset) -> AppResult<String> {
        if dataset.names().is_empty() {
            return Err(AppError::Dataset("Dataset has no columns".to_string()));
        }

        let header = ["column", "count", "unique", "top", "mean", "min", "max"];
        let mut rows: Vec<[String; 7]> = Vec::new();

        for (name, column) in dataset.columns() {
            let stats = match column {
                Column::Number(values) => describe_numbers(values),
                Column::Text(values) => describe_text(values),
                Column::Date(values) => describe_dates(values),
            };
            let [count, unique, top, mean, min, max] = stats;
            rows.push([name.to_string(), count, unique, top, mean, min, max]);
        }

        let widths: Vec<usize> = (0..header.len())
            .map(|i| {
                rows.iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(header[i].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        let _ = writeln!(out, "rows: {}", dataset.len());
        let line = |cells: Vec<&str>| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };
        let _ = writeln!(out, "{}", line(header.to_vec()));
        for row in &rows {
            let _ = writeln!(out, "{}", line(row.iter().map(String::as_str).collect()));
        }

        Ok(out.trim_end().to_string())
    }
}

/// Run a summarizer on the blocking pool, bounded by `limit`.
///
/// Panics inside the summarizer and timeouts both come back as `Err`.
pub async fn summarize_with_timeout(
    summarizer: Arc<dyn DatasetSummarizer>,
    dataset: Arc<CampaignDataset>,
    limit: Duration,
) -> AppResult<String> {
    let task = tokio::task::spawn_blocking(move || summarizer.summarize(&dataset));

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(AppError::Dataset(format!("Summarizer task failed: {}", e))),
        Err(_) => Err(AppError::Dataset(format!(
            "Summarizer timed out after {:?}",
            limit
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
campaign_id,channel,clicks,impressions
C1,Email,100,1000
C2,Email,50,1000
C3,Social,30,600
";

    struct SlowSummarizer;

    impl DatasetSummarizer for SlowSummarizer {
        fn summarize(&self, _dataset: &CampaignDataset) -> AppResult<String> {
            std::thread::sleep(Duration::from_millis(500));
            Ok("late".to_string())
        }
    }

    fn dataset() -> CampaignDataset {
        CampaignDataset::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_describe_reports_every_column() {
        let summary = DescribeSummarizer.summarize(&dataset()).unwrap();

        assert!(summary.starts_with("rows: 3"));
        for name in ["campaign_id", "channel", "clicks", "impressions", "ctr"] {
            assert!(summary.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_describe_statistics() {
        let summary = DescribeSummarizer.summarize(&dataset()).unwrap();
        let clicks = summary.lines().find(|l| l.starts_with("clicks")).unwrap();
        let channel = summary.lines().find(|l| l.starts_with("channel")).unwrap();

        // count, mean, min, max
        let cells: Vec<&str> = clicks.split_whitespace().collect();
        assert_eq!(cells, vec!["clicks", "3", "60", "30", "100"]);

        let cells: Vec<&str> = channel.split_whitespace().collect();
        assert_eq!(cells, vec!["channel", "3", "2", "Email"]);
    }

    #[test]
    fn test_fmt_number() {
        assert_eq!(fmt_number(60.0), "60");
        assert_eq!(fmt_number(0.05), "0.05");
        assert_eq!(fmt_number(1.0 / 3.0), "0.333333");
    }

    #[tokio::test]
    async fn test_summarize_with_timeout_returns_summary() {
        let summary = summarize_with_timeout(
            Arc::new(DescribeSummarizer),
            Arc::new(dataset()),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(summary.contains("clicks"));
    }

    #[tokio::test]
    async fn test_summarize_with_timeout_expires() {
        let result = summarize_with_timeout(
            Arc::new(SlowSummarizer),
            Arc::new(dataset()),
            Duration::from_millis(20),
        )
        .await;
        assert!(result.is_err());
    }
}
