//! Campaign CSV loading and cleaning.
//!
//! Cleaning steps, in order:
//! 1. column names trimmed, lower-cased, spaces replaced by `_`
//! 2. `date` parsed; unparsable values become missing
//! 3. money columns stripped to digits, `.` and `-` (empty becomes 0)
//! 4. known numeric columns coerced; invalid values become missing
//! 5. `ctr` derived from `clicks / impressions` when absent
//! 6. rows with an empty `campaign_id` dropped

use chrono::NaiveDate;
use insight_core::{AppError, AppResult};
use std::io::Read;
use std::path::{Component, Path};

const MONEY_COLUMNS: [&str; 1] = ["acquisition_cost"];

const NUMERIC_COLUMNS: [&str; 5] = [
    "conversion_rate",
    "roi",
    "clicks",
    "impressions",
    "engagement_score",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Typed column values; `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<Option<String>>),
    Number(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::Number(v) => v.len(),
            Column::Date(v) => v.len(),
        }
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        fn filter<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut row = 0;
            values.retain(|_| {
                let kept = keep.get(row).copied().unwrap_or(true);
                row += 1;
                kept
            });
        }
        match self {
            Column::Text(v) => filter(v, keep),
            Column::Number(v) => filter(v, keep),
            Column::Date(v) => filter(v, keep),
        }
    }
}

/// A cleaned campaign table.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignDataset {
    names: Vec<String>,
    columns: Vec<Column>,
}

/// `Total Spend ` → `total_spend`
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// `$16,174.00` → `16174.00`
pub fn sanitize_money(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn build_column(name: &str, raw: &[String]) -> Column {
    if name == "date" {
        return Column::Date(raw.iter().map(|v| parse_date(v)).collect());
    }

    if MONEY_COLUMNS.contains(&name) {
        return Column::Number(
            raw.iter()
                .map(|v| {
                    let cleaned = sanitize_money(v);
                    if cleaned.is_empty() {
                        Some(0.0)
                    } else {
                        parse_number(&cleaned)
                    }
                })
                .collect(),
        );
    }

    if NUMERIC_COLUMNS.contains(&name) {
        return Column::Number(raw.iter().map(|v| parse_number(v)).collect());
    }

    // Untyped columns are numeric only when every present value parses
    let present: Vec<&String> = raw.iter().filter(|v| !v.trim().is_empty()).collect();
    if !present.is_empty() && present.iter().all(|v| parse_number(v).is_some()) {
        Column::Number(raw.iter().map(|v| parse_number(v)).collect())
    } else {
        Column::Text(raw.iter().map(|v| non_empty(v)).collect())
    }
}

impl CampaignDataset {
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            AppError::Dataset(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Self::from_reader(file)
    }

    /// Load `file_name` from `dir`, refusing names that leave the directory.
    pub fn from_dir(dir: &Path, file_name: &str) -> AppResult<Self> {
        let relative = Path::new(file_name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if file_name.trim().is_empty() || !plain {
            return Err(AppError::Dataset(format!("Invalid dataset name: {}", file_name)));
        }
        Self::from_path(&dir.join(relative))
    }

    pub fn from_reader<R: Read>(reader: R) -> AppResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let names: Vec<String> = reader
            .headers()
            .map_err(|e| AppError::Dataset(format!("Failed to read CSV header: {}", e)))?
            .iter()
            .map(normalize_column_name)
            .collect();

        if names.is_empty() || names.iter().all(|n| n.is_empty()) {
            return Err(AppError::Dataset("CSV has no columns".to_string()));
        }

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for record in reader.records() {
            let record =
                record.map_err(|e| AppError::Dataset(format!("Failed to read CSV row: {}", e)))?;
            for (index, values) in raw.iter_mut().enumerate() {
                values.push(record.get(index).unwrap_or("").to_string());
            }
        }

        let mut columns: Vec<Column> = names
            .iter()
            .zip(&raw)
            .map(|(name, values)| build_column(name, values))
            .collect();
        let mut names = names;

        if !names.iter().any(|n| n == "ctr") {
            let ctr = {
                let clicks = Self::numbers_in(&names, &columns, "clicks");
                let impressions = Self::numbers_in(&names, &columns, "impressions");
                clicks.zip(impressions).map(|(clicks, impressions)| {
                    clicks
                        .iter()
                        .zip(impressions)
                        .map(|(c, i)| match (c, i) {
                            (Some(c), Some(i)) if *i != 0.0 => Some(c / i),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                })
            };
            if let Some(ctr) = ctr {
                names.push("ctr".to_string());
                columns.push(Column::Number(ctr));
            }
        }

        let mut dataset = Self { names, columns };
        dataset.drop_rows_without_campaign_id();

        tracing::debug!(
            "Loaded campaign dataset: {} rows, {} columns",
            dataset.len(),
            dataset.names.len()
        );

        Ok(dataset)
    }

    fn numbers_in<'a>(
        names: &[String],
        columns: &'a [Column],
        name: &str,
    ) -> Option<&'a Vec<Option<f64>>> {
        let index = names.iter().position(|n| n == name)?;
        match &columns[index] {
            Column::Number(values) => Some(values),
            _ => None,
        }
    }

    fn drop_rows_without_campaign_id(&mut self) {
        let Some(index) = self.names.iter().position(|n| n == "campaign_id") else {
            return;
        };

        let keep: Vec<bool> = match &self.columns[index] {
            Column::Text(values) => values.iter().map(Option::is_some).collect(),
            Column::Number(values) => values.iter().map(Option::is_some).collect(),
            Column::Date(values) => values.iter().map(Option::is_some).collect(),
        };

        if keep.iter().all(|k| *k) {
            return;
        }
        for column in &mut self.columns {
            column.retain_rows(&keep);
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        let index = self.names.iter().position(|n| n == name)?;
        self.columns.get(index)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
Campaign ID,Date,Channel,Acquisition Cost,Clicks,Impressions,ROI
C1,2024-01-05,Email,\"$16,174.00\",120,4000,2.5
C2,01/20/2024,Social,$500,abc,1000,1.1
,2024-02-01,Email,$10,5,50,0.2
C4,not a date,Display,,30,0,
";

    fn numbers(dataset: &CampaignDataset, name: &str) -> Vec<Option<f64>> {
        match dataset.column(name) {
            Some(Column::Number(values)) => values.clone(),
            other => panic!("expected numeric column {}, got {:?}", name, other),
        }
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("  Acquisition Cost "), "acquisition_cost");
        assert_eq!(normalize_column_name("ROI"), "roi");
    }

    #[test]
    fn test_sanitize_money() {
        assert_eq!(sanitize_money("$16,174.00"), "16174.00");
        assert_eq!(sanitize_money("-$5"), "-5");
        assert_eq!(sanitize_money("n/a"), "");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 20);
        assert_eq!(parse_date("2024-01-20"), expected);
        assert_eq!(parse_date("01/20/2024"), expected);
        assert_eq!(parse_date("20-01-2024"), expected);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_clean_sample() {
        let dataset = CampaignDataset::from_reader(SAMPLE.as_bytes()).unwrap();

        // Row with empty campaign_id dropped
        assert_eq!(dataset.len(), 3);
        assert_eq!(
            dataset.names(),
            &[
                "campaign_id",
                "date",
                "channel",
                "acquisition_cost",
                "clicks",
                "impressions",
                "roi",
                "ctr"
            ]
        );

        assert_eq!(
            numbers(&dataset, "acquisition_cost"),
            vec![Some(16174.0), Some(500.0), Some(0.0)]
        );
        assert_eq!(numbers(&dataset, "clicks"), vec![Some(120.0), None, Some(30.0)]);
        assert_eq!(numbers(&dataset, "ctr"), vec![Some(0.03), None, None]);
        assert_eq!(numbers(&dataset, "roi"), vec![Some(2.5), Some(1.1), None]);

        match dataset.column("date") {
            Some(Column::Date(values)) => {
                assert_eq!(values[1], NaiveDate::from_ymd_opt(2024, 1, 20));
                assert_eq!(values[2], None);
            }
            other => panic!("expected date column, got {:?}", other),
        }
    }

    #[test]
    fn test_existing_ctr_is_kept() {
        let csv = "campaign_id,clicks,impressions,ctr\nC1,1,10,0.5\n";
        let dataset = CampaignDataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(numbers(&dataset, "ctr"), vec![Some(0.5)]);
    }

    #[test]
    fn test_untyped_numeric_column_is_inferred() {
        let csv = "campaign_id,budget,channel\nC1,100,Email\nC2,,Social\n";
        let dataset = CampaignDataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(numbers(&dataset, "budget"), vec![Some(100.0), None]);
        assert!(matches!(dataset.column("channel"), Some(Column::Text(_))));
    }

    #[test]
    fn test_from_dir_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        assert!(CampaignDataset::from_dir(temp.path(), "../secrets.csv").is_err());
        assert!(CampaignDataset::from_dir(temp.path(), "/etc/passwd").is_err());
        assert!(CampaignDataset::from_dir(temp.path(), "").is_err());
    }

    #[test]
    fn test_from_dir_loads_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("campaigns.csv"), SAMPLE).unwrap();

        let dataset = CampaignDataset::from_dir(temp.path(), "campaigns.csv").unwrap();
        assert_eq!(dataset.len(), 3);
    }

    #[test]
    fn test_missing_file_is_dataset_error() {
        let err = CampaignDataset::from_path(Path::new("/nonexistent/c.csv")).unwrap_err();
        assert_eq!(err.kind(), "dataset");
    }
}
