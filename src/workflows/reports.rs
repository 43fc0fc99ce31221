//! Aggregations over pipeline and activity records. Absent amounts are
//! counted in `missing_amount` and left out of every sum.

use super::scan_query;
use crate::error::CrmError;
use crate::gateway::Gateway;
use crate::pipeline::{Pipeline, PipelineStateMachine, Stage};
use crate::resources::tasks::{self, TaskQuery, COMPLETED_STATUS, OPEN_STATUS};
use crate::resources::{calls, events, records_from_envelope, DEFAULT_PAGE_SIZE};
use crate::shared::fs_atomic::{atomic_write_file_with_mode, SHARED_FILE_MODE};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

const UNKNOWN: &str = "Unknown";
pub const FALLBACK_PROBABILITY: f64 = 50.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bucket {
    pub count: u64,
    pub value: f64,
    pub missing_amount: u64,
}

impl Bucket {
    fn add(&mut self, amount: Option<f64>) {
        self.count += 1;
        match amount {
            Some(amount) => self.value += amount,
            None => self.missing_amount += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub total_count: u64,
    pub total_value: f64,
    pub missing_amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_stage: Option<BTreeMap<String, Bucket>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_owner: Option<BTreeMap<String, Bucket>>,
    pub generated_at: String,
}

pub fn summarize_pipelines(
    pipelines: &[Pipeline],
    by_stage: bool,
    by_owner: bool,
    now: DateTime<Utc>,
) -> PipelineReport {
    let mut total = Bucket::default();
    let mut stages: BTreeMap<String, Bucket> = BTreeMap::new();
    let mut owners: BTreeMap<String, Bucket> = BTreeMap::new();
    for pipeline in pipelines {
        total.add(pipeline.amount);
        if by_stage {
            let stage = pipeline.stage.as_deref().unwrap_or(UNKNOWN);
            stages.entry(stage.to_string()).or_default().add(pipeline.amount);
        }
        if by_owner {
            let owner = pipeline.owner_name.as_deref().unwrap_or(UNKNOWN);
            owners.entry(owner.to_string()).or_default().add(pipeline.amount);
        }
    }
    PipelineReport {
        total_count: total.count,
        total_value: total.value,
        missing_amount: total.missing_amount,
        by_stage: by_stage.then_some(stages),
        by_owner: by_owner.then_some(owners),
        generated_at: now.to_rfc3339(),
    }
}

pub fn pipeline_report(
    gateway: &Gateway,
    by_stage: bool,
    by_owner: bool,
    now: DateTime<Utc>,
) -> Result<PipelineReport, CrmError> {
    let pipelines = PipelineStateMachine::new(gateway).list_pipelines(&scan_query())?;
    Ok(summarize_pipelines(&pipelines, by_stage, by_owner, now))
}

/// Win probability assumed for a stage when the record carries none.
pub fn default_stage_probability(stage: &str) -> f64 {
    match stage {
        "Prospecting" => 10.0,
        "Qualification" => 25.0,
        "Needs Analysis" => 40.0,
        "Value Proposition" => 50.0,
        "Id. Decision Makers" => 60.0,
        "Proposal/Price Quote" => 70.0,
        "Negotiation/Review" => 80.0,
        "Closed Won" => 100.0,
        "Closed Lost" => 0.0,
        _ => FALLBACK_PROBABILITY,
    }
}

/// Validates a `YYYY-MM` month label.
pub fn parse_month(raw: &str) -> Result<String, CrmError> {
    let trimmed = raw.trim();
    let valid = trimmed.len() == 7
        && NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d").is_ok();
    if !valid {
        return Err(CrmError::InvalidArgument(format!(
            "month `{raw}` must use the form YYYY-MM"
        )));
    }
    Ok(trimmed.to_string())
}

fn in_month(pipeline: &Pipeline, month: Option<&str>) -> bool {
    match month {
        Some(month) => pipeline.closing_month() == Some(month),
        None => true,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForecastBucket {
    pub count: u64,
    pub value: f64,
    pub weighted_value: f64,
    pub probability: f64,
    pub missing_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub month: String,
    pub total_pipeline_value: f64,
    pub weighted_forecast: f64,
    pub missing_amount: u64,
    pub by_stage: BTreeMap<String, ForecastBucket>,
    pub generated_at: String,
}

/// Weighted forecast; with `month`, only pipelines closing in that month.
pub fn build_forecast(pipelines: &[Pipeline], month: Option<&str>, now: DateTime<Utc>) -> Forecast {
    let mut forecast = Forecast {
        month: month
            .map(str::to_string)
            .unwrap_or_else(|| now.format("%Y-%m").to_string()),
        total_pipeline_value: 0.0,
        weighted_forecast: 0.0,
        missing_amount: 0,
        by_stage: BTreeMap::new(),
        generated_at: now.to_rfc3339(),
    };
    for pipeline in pipelines.iter().filter(|p| in_month(p, month)) {
        let stage = pipeline.stage.as_deref().unwrap_or(UNKNOWN);
        let probability = pipeline
            .probability
            .unwrap_or_else(|| default_stage_probability(stage));
        let bucket = forecast
            .by_stage
            .entry(stage.to_string())
            .or_insert_with(|| ForecastBucket {
                probability,
                ..ForecastBucket::default()
            });
        bucket.count += 1;
        match pipeline.amount {
            Some(amount) => {
                let weighted = amount * probability / 100.0;
                bucket.value += amount;
                bucket.weighted_value += weighted;
                forecast.total_pipeline_value += amount;
                forecast.weighted_forecast += weighted;
            }
            None => {
                bucket.missing_amount += 1;
                forecast.missing_amount += 1;
            }
        }
    }
    forecast
}

pub fn forecast(
    gateway: &Gateway,
    month: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Forecast, CrmError> {
    let month = month.map(parse_month).transpose()?;
    let pipelines = PipelineStateMachine::new(gateway).list_pipelines(&scan_query())?;
    Ok(build_forecast(&pipelines, month.as_deref(), now))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub period: String,
    pub owner: String,
    pub total_deals: u64,
    pub won_deals: u64,
    pub lost_deals: u64,
    pub open_deals: u64,
    pub total_value: f64,
    pub won_value: f64,
    pub win_rate: f64,
    /// Mean over deals that carry an amount.
    pub average_deal_size: f64,
    pub missing_amount: u64,
    pub generated_at: String,
}

pub fn build_performance(
    pipelines: &[Pipeline],
    owner: Option<&str>,
    month: Option<&str>,
    now: DateTime<Utc>,
) -> PerformanceReport {
    let mut report = PerformanceReport {
        period: month
            .map(str::to_string)
            .unwrap_or_else(|| now.format("%Y-%m").to_string()),
        owner: owner.unwrap_or("All").to_string(),
        total_deals: 0,
        won_deals: 0,
        lost_deals: 0,
        open_deals: 0,
        total_value: 0.0,
        won_value: 0.0,
        win_rate: 0.0,
        average_deal_size: 0.0,
        missing_amount: 0,
        generated_at: now.to_rfc3339(),
    };
    let selected = pipelines
        .iter()
        .filter(|p| owner.map_or(true, |owner| p.owner_email.as_deref() == Some(owner)))
        .filter(|p| in_month(p, month));
    for pipeline in selected {
        report.total_deals += 1;
        match pipeline.amount {
            Some(amount) => report.total_value += amount,
            None => report.missing_amount += 1,
        }
        match pipeline.known_stage() {
            Some(Stage::ClosedWon) => {
                report.won_deals += 1;
                if let Some(amount) = pipeline.amount {
                    report.won_value += amount;
                }
            }
            Some(Stage::ClosedLost) => report.lost_deals += 1,
            _ => report.open_deals += 1,
        }
    }
    if report.total_deals > 0 {
        report.win_rate = report.won_deals as f64 / report.total_deals as f64 * 100.0;
    }
    let priced = report.total_deals - report.missing_amount;
    if priced > 0 {
        report.average_deal_size = report.total_value / priced as f64;
    }
    report
}

pub fn performance(
    gateway: &Gateway,
    owner: Option<&str>,
    month: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PerformanceReport, CrmError> {
    let month = month.map(parse_month).transpose()?;
    let pipelines = PipelineStateMachine::new(gateway).list_pipelines(&scan_query())?;
    Ok(build_performance(&pipelines, owner, month.as_deref(), now))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivitySections {
    pub calls: bool,
    pub tasks: bool,
    pub events: bool,
}

impl ActivitySections {
    pub fn all() -> Self {
        Self {
            calls: true,
            tasks: true,
            events: true,
        }
    }

    /// No section selected means every section.
    pub fn or_all(self) -> Self {
        if self == Self::default() {
            Self::all()
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityCounts {
    pub calls: usize,
    pub tasks_open: usize,
    pub tasks_completed: usize,
    pub meetings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityReport {
    pub user: String,
    pub week: String,
    pub activities: ActivityCounts,
    pub details: Map<String, Value>,
    pub generated_at: String,
}

pub fn activity(
    gateway: &Gateway,
    user: &str,
    week: Option<&str>,
    sections: ActivitySections,
    now: DateTime<Utc>,
) -> Result<ActivityReport, CrmError> {
    let sections = sections.or_all();
    let mut counts = ActivityCounts::default();
    let mut details = Map::new();
    let as_array = |records: Vec<crate::resources::Record>| {
        Value::Array(records.into_iter().map(|r| r.into_value()).collect())
    };

    if sections.calls {
        let calls = records_from_envelope(&calls::list(gateway, None, None, DEFAULT_PAGE_SIZE)?);
        counts.calls = calls.len();
        details.insert("calls".to_string(), as_array(calls));
    }
    if sections.tasks {
        let by_status = |status: &str| -> Result<_, CrmError> {
            let query = TaskQuery {
                status: status.to_string(),
                ..TaskQuery::default()
            };
            Ok(records_from_envelope(&tasks::list(gateway, &query)?))
        };
        let open = by_status(OPEN_STATUS)?;
        let completed = by_status(COMPLETED_STATUS)?;
        counts.tasks_open = open.len();
        counts.tasks_completed = completed.len();
        let mut task_details = Map::new();
        task_details.insert("open".to_string(), as_array(open));
        task_details.insert("completed".to_string(), as_array(completed));
        details.insert("tasks".to_string(), Value::Object(task_details));
    }
    if sections.events {
        let events = records_from_envelope(&events::list(gateway, None, None, DEFAULT_PAGE_SIZE)?);
        counts.meetings = events.len();
        details.insert("events".to_string(), as_array(events));
    }

    Ok(ActivityReport {
        user: user.to_string(),
        week: week
            .map(str::to_string)
            .unwrap_or_else(|| now.format("%Y-%W").to_string()),
        activities: counts,
        details,
        generated_at: now.to_rfc3339(),
    })
}

/// Flat table form of a report for CSV export.
pub trait CsvReport {
    fn csv_header(&self) -> &'static [&'static str];
    fn csv_rows(&self) -> Vec<Vec<String>>;
}

fn bucket_row(group: &str, name: &str, bucket: &Bucket) -> Vec<String> {
    vec![
        group.to_string(),
        name.to_string(),
        bucket.count.to_string(),
        bucket.value.to_string(),
        bucket.missing_amount.to_string(),
    ]
}

impl CsvReport for PipelineReport {
    fn csv_header(&self) -> &'static [&'static str] {
        &["Group", "Name", "Count", "Value", "Missing Amount"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        for (group, buckets) in [("Stage", &self.by_stage), ("Owner", &self.by_owner)] {
            for (name, bucket) in buckets.iter().flatten() {
                rows.push(bucket_row(group, name, bucket));
            }
        }
        let total = Bucket {
            count: self.total_count,
            value: self.total_value,
            missing_amount: self.missing_amount,
        };
        rows.push(bucket_row("Total", "All", &total));
        rows
    }
}

impl CsvReport for Forecast {
    fn csv_header(&self) -> &'static [&'static str] {
        &[
            "Stage",
            "Count",
            "Value",
            "Probability",
            "Weighted Value",
            "Missing Amount",
        ]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        let mut rows: Vec<Vec<String>> = self
            .by_stage
            .iter()
            .map(|(stage, bucket)| {
                vec![
                    stage.clone(),
                    bucket.count.to_string(),
                    bucket.value.to_string(),
                    bucket.probability.to_string(),
                    bucket.weighted_value.to_string(),
                    bucket.missing_amount.to_string(),
                ]
            })
            .collect();
        let count: u64 = self.by_stage.values().map(|bucket| bucket.count).sum();
        rows.push(vec![
            "Total".to_string(),
            count.to_string(),
            self.total_pipeline_value.to_string(),
            String::new(),
            self.weighted_forecast.to_string(),
            self.missing_amount.to_string(),
        ]);
        rows
    }
}

impl CsvReport for PerformanceReport {
    fn csv_header(&self) -> &'static [&'static str] {
        &["Metric", "Value"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        [
            ("Total Deals", self.total_deals.to_string()),
            ("Won Deals", self.won_deals.to_string()),
            ("Lost Deals", self.lost_deals.to_string()),
            ("Open Deals", self.open_deals.to_string()),
            ("Total Value", self.total_value.to_string()),
            ("Won Value", self.won_value.to_string()),
            ("Win Rate %", format!("{:.2}", self.win_rate)),
            ("Average Deal Size", format!("{:.2}", self.average_deal_size)),
            ("Missing Amount", self.missing_amount.to_string()),
        ]
        .into_iter()
        .map(|(metric, value)| vec![metric.to_string(), value])
        .collect()
    }
}

/// Writes the header and rows of `report`; returns the data row count.
pub fn write_csv<R: CsvReport, W: Write>(report: &R, output: W) -> Result<usize, CrmError> {
    let mut writer = csv::Writer::from_writer(output);
    writer
        .write_record(report.csv_header())
        .map_err(|err| CrmError::csv("header write", err))?;
    let rows = report.csv_rows();
    for row in &rows {
        writer
            .write_record(row)
            .map_err(|err| CrmError::csv("row write", err))?;
    }
    writer
        .flush()
        .map_err(|err| CrmError::csv("flush", err.into()))?;
    Ok(rows.len())
}

/// Replaces `path` with the CSV form of `report`.
pub fn export_csv<R: CsvReport>(report: &R, path: &Path) -> Result<usize, CrmError> {
    let mut buffer = Vec::new();
    let rows = write_csv(report, &mut buffer)?;
    atomic_write_file_with_mode(path, &buffer, SHARED_FILE_MODE)
        .map_err(|err| CrmError::io(path, err))?;
    tracing::info!(path = %path.display(), rows, "report exported");
    Ok(rows)
}
