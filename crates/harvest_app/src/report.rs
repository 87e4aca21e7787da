//! Plain-text summaries of each run, printed to stdout.

use harvest_core::{EmailReport, ExtractStats, RetrieveStats, SubmitStats};
use harvest_engine::{PipelineEvent, ProgressSink};
use harvest_logging::{harvest_debug, harvest_info};

pub fn submit_summary(stats: &SubmitStats) -> String {
    let mut lines = vec![
        stats.message.clone(),
        format!("  queries:          {}", stats.total_queries),
        format!("  batches:          {}", stats.total_batches),
        format!("  jobs recorded:    {}", stats.successful_jobs),
        format!("  already known:    {}", stats.duplicate_jobs),
        format!("  failed batches:   {}", stats.failed_batches),
    ];
    if !stats.submitted_ids.is_empty() {
        lines.push(format!("  job ids:          {}", stats.submitted_ids.join(", ")));
    }
    lines.join("\n")
}

pub fn retrieve_summary(stats: &RetrieveStats) -> String {
    [
        stats.message.clone(),
        format!("  pending jobs:     {}", stats.total),
        format!("  stored:           {}", stats.successful),
        format!("  already stored:   {}", stats.duplicates),
        format!("  still running:    {}", stats.running),
        format!("  no data:          {}", stats.skipped),
        format!("  poll errors:      {}", stats.poll_errors),
        format!("  store errors:     {}", stats.db_errors),
    ]
    .join("\n")
}

pub fn extract_summary(stats: &ExtractStats) -> String {
    [
        stats.message.clone(),
        format!("  responses:        {}", stats.total),
        format!("  marked:           {}", stats.successful),
        format!("  left unmarked:    {}", stats.failed),
        format!("  emails found:     {}", stats.emails_found),
        format!("  new emails:       {}", stats.emails_saved),
        format!("  known emails:     {}", stats.duplicate_emails),
    ]
    .join("\n")
}

pub fn email_listing(report: &EmailReport) -> String {
    let mut lines: Vec<String> = report
        .emails
        .iter()
        .map(|email| {
            format!(
                "{}\t{}",
                email.address,
                email.created_at.format("%Y-%m-%d %H:%M:%S")
            )
        })
        .collect();
    lines.push(report.message.clone());
    lines.join("\n")
}

/// Forwards pipeline progress to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Progress(progress) => match progress.total {
                Some(total) => {
                    harvest_debug!("{}/{} {}", progress.position, total, progress.item)
                }
                None => harvest_debug!("#{} {}", progress.position, progress.item),
            },
            PipelineEvent::StageFinished { stage } => harvest_info!("Stage {} finished", stage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use harvest_core::EmailRecord;

    #[test]
    fn listing_ends_with_message() {
        let report = EmailReport::new(vec![EmailRecord {
            address: "a@b.com".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap(),
        }]);
        assert_eq!(
            email_listing(&report),
            "a@b.com\t2024-05-01 07:00:00\nFound 1 emails"
        );
    }
}
