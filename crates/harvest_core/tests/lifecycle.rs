use harvest_core::{
    ExtractStats, JobRecord, JobStatus, MarkOutcome, PollOutcome, RetrieveStats, SubmitStats,
    WriteOutcome,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    harvest_logging::initialize_for_tests();
}

#[test]
fn job_status_only_moves_forward() {
    init_logging();
    let job = JobRecord::pending("s_1");
    assert_eq!(job.status, JobStatus::Pending);
    assert!(!job.status.is_terminal());
    let advanced = job.status.advance();
    assert_eq!(advanced, JobStatus::Processed);
    assert_eq!(advanced.advance(), JobStatus::Processed);
    assert_eq!("processed".parse::<JobStatus>().unwrap(), JobStatus::Processed);
    assert!("done".parse::<JobStatus>().is_err());
}

#[test]
fn retrieve_tally_separates_duplicates_from_faults() {
    init_logging();
    let mut stats = RetrieveStats::new(4);
    stats.record_mark(WriteOutcome::Created, MarkOutcome::Updated);
    stats.record_mark(WriteOutcome::Duplicate, MarkOutcome::Updated);
    stats.record_mark(WriteOutcome::Created, MarkOutcome::NotFound);
    stats.record_db_error();
    let stats = stats.finish();

    assert_eq!(stats.successful, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.db_errors, 1);
    assert_eq!(stats.message, "Processed 2/4 jobs successfully");
}

#[test]
fn aborted_tallies_are_zero_with_message() {
    let submit = SubmitStats::aborted("store unreachable");
    assert_eq!(submit.total_batches, 0);
    assert_eq!(submit.message, "store unreachable");

    let retrieve = RetrieveStats::aborted("store unreachable");
    assert_eq!(
        retrieve,
        RetrieveStats {
            message: "store unreachable".to_string(),
            ..RetrieveStats::default()
        }
    );

    let extract = ExtractStats::aborted("boom");
    assert_eq!(extract.total, 0);
    assert_eq!(extract.emails_saved, 0);
}

#[test]
fn extract_tally_counts_each_email_outcome() {
    let mut stats = ExtractStats::default();
    stats.total = 1;
    stats.record_email(Some(WriteOutcome::Created));
    stats.record_email(Some(WriteOutcome::Duplicate));
    stats.record_email(None);
    stats.record_mark(Some(MarkOutcome::Updated));
    let stats = stats.finish();
    assert_eq!(stats.emails_found, 3);
    assert_eq!(stats.emails_saved, 1);
    assert_eq!(stats.duplicate_emails, 1);
    assert_eq!(stats.db_errors, 1);
    assert_eq!(stats.message, "Processed 1/1 responses, saved 1 new emails");
}

#[test]
fn poll_outcome_labels() {
    assert_eq!(PollOutcome::Running.label(), "running");
    assert_eq!(PollOutcome::NoData.label(), "no data");
}
