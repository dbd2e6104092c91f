mod common;

use std::time::Duration;

use common::{CountingSource, OfflineSource, RejectingSink, sample_lakes, sample_reports, table};
use lakehouse_kb::KbError;
use lakehouse_kb::io::{LocalWorkbook, SheetsBackend};
use lakehouse_kb::loader::{Loader, Severity};
use lakehouse_kb::model::{LakeEntry, TableSet};
use lakehouse_kb::source::{Backend, TableSink, TableSource};
use lakehouse_kb::sync::KnowledgeBase;
use lakehouse_kb::writer::Writer;
use tempfile::tempdir;

#[test]
fn failing_remote_write_lands_in_local_workbook() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("LakeHouse.xlsx");
    let writer = Writer::new(
        Box::new(SheetsBackend::new(common::BrokenSheets, "Lakes", "Reports")),
        Box::new(LocalWorkbook::new(&path)),
    );

    let backend = writer
        .write(&sample_lakes(), &sample_reports())
        .expect("fallback write");

    assert_eq!(backend, Backend::Local);
    let stored = LocalWorkbook::new(&path).fetch().expect("local workbook read");
    assert_eq!(stored, TableSet::new(sample_lakes(), sample_reports()));
}

#[test]
fn successful_remote_write_leaves_local_workbook_alone() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("LakeHouse.xlsx");
    let remote = SheetsBackend::new(common::FakeSheets::default(), "Lakes", "Reports");
    let writer = Writer::new(Box::new(remote), Box::new(LocalWorkbook::new(&path)));

    let backend = writer
        .write(&sample_lakes(), &sample_reports())
        .expect("remote write");

    assert_eq!(backend, Backend::SheetsApi);
    assert!(!path.exists());
}

#[test]
fn write_fails_when_both_backends_fail() {
    let temp_dir = tempdir().expect("temporary directory");
    let blocker = temp_dir.path().join("not-a-directory");
    std::fs::write(&blocker, "occupied").expect("blocker written");
    let writer = Writer::new(
        Box::new(RejectingSink),
        Box::new(LocalWorkbook::new(blocker.join("LakeHouse.xlsx"))),
    );

    let error = writer
        .write(&sample_lakes(), &sample_reports())
        .expect_err("both backends fail");

    match &error {
        KbError::WriteFailed { remote, local } => {
            assert!(matches!(**remote, KbError::RemoteApi { status: 403, .. }));
            assert!(matches!(**local, KbError::LocalWrite { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(error.remedy().is_some_and(|hint| hint.contains("Excel")));
}

#[test]
fn local_only_writer_skips_remote() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("LakeHouse.xlsx");
    let writer = Writer::local_only(Box::new(LocalWorkbook::new(&path)));

    let backend = writer
        .write(&sample_lakes(), &sample_reports())
        .expect("local write");

    assert_eq!(backend, Backend::Local);
    assert!(path.exists());
}

#[test]
fn failing_source_degrades_to_empty_result() {
    let mut loader = Loader::default();

    let result = loader.load(&OfflineSource);

    assert!(result.lake_names.is_empty());
    assert!(result.report_names.is_empty());
    assert!(result.lakes.is_none());
    assert!(result.reports.is_none());
    assert_eq!(result.backend, None);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].severity, Severity::Error);
    assert!(result.diagnostics[0].remedy.is_some());
    assert!(loader.cache().is_empty());

    let temp_dir = tempdir().expect("temporary directory");
    let local = LocalWorkbook::new(temp_dir.path().join("LakeHouse.xlsx"));
    local
        .store(&TableSet::new(sample_lakes(), sample_reports()))
        .expect("workbook written");

    let healthy = loader.load(&local);
    assert_eq!(healthy.backend, Some(Backend::Local));
    assert_eq!(healthy.lake_names, vec!["Sales", "Finance"]);
    assert_eq!(healthy.report_names, vec!["Revenue dashboard", "Ledger audit"]);
}

#[test]
fn loads_within_ttl_hit_the_backend_once() {
    let source = CountingSource::new("counting", TableSet::new(sample_lakes(), sample_reports()));
    let mut loader = Loader::default();

    let first = loader.load(&source);
    let second = loader.load(&source);

    assert_eq!(source.fetches.get(), 1);
    assert_eq!(first, second);

    loader.invalidate();
    let third = loader.load(&source);
    assert_eq!(source.fetches.get(), 2);
    assert_eq!(third, first);
}

#[test]
fn expired_entries_are_refetched() {
    let source = CountingSource::new("counting", TableSet::new(sample_lakes(), sample_reports()));
    let mut loader = Loader::with_ttl(Duration::ZERO);

    loader.load(&source);
    loader.load(&source);

    assert_eq!(source.fetches.get(), 2);
}

#[test]
fn cache_is_scoped_by_source_identity() {
    let first = CountingSource::new("one", TableSet::new(sample_lakes(), sample_reports()));
    let second = CountingSource::new("two", TableSet::default());
    let mut loader = Loader::default();

    loader.load(&first);
    let other = loader.load(&second);

    assert_eq!(first.fetches.get(), 1);
    assert_eq!(second.fetches.get(), 1);
    assert!(other.lake_names.is_empty());
}

#[test]
fn load_first_falls_through_to_local_workbook() {
    let temp_dir = tempdir().expect("temporary directory");
    let local = LocalWorkbook::new(temp_dir.path().join("LakeHouse.xlsx"));
    local
        .store(&TableSet::new(sample_lakes(), sample_reports()))
        .expect("workbook written");
    let empty_remote = CountingSource::new("empty", TableSet::default());
    let mut loader = Loader::default();

    let sources: [&dyn TableSource; 3] = [&OfflineSource, &empty_remote, &local];
    let result = loader.load_first(&sources);

    assert_eq!(result.backend, Some(Backend::Local));
    assert_eq!(result.lakes, Some(sample_lakes()));
    assert_eq!(result.diagnostics.len(), 3);
    assert_eq!(result.diagnostics[0].severity, Severity::Error);
    assert_eq!(result.diagnostics[1].severity, Severity::Warning);
    assert_eq!(result.diagnostics[2].severity, Severity::Info);
    assert_eq!(result.diagnostics[2].backend, Some(Backend::Local));
}

#[test]
fn first_source_success_carries_no_fallback_note() {
    let remote = CountingSource::new("remote", TableSet::new(sample_lakes(), sample_reports()));
    let mut loader = Loader::default();

    let sources: [&dyn TableSource; 2] = [&remote, &OfflineSource];
    let result = loader.load_first(&sources);

    assert_eq!(result.backend, Some(Backend::SheetsExport));
    assert!(result.diagnostics.is_empty());
}

#[test]
fn load_first_reports_every_failure_when_nothing_loads() {
    let mut loader = Loader::default();

    let sources: [&dyn TableSource; 2] = [&OfflineSource, &OfflineSource];
    let result = loader.load_first(&sources);

    assert!(result.lakes.is_none());
    assert_eq!(result.diagnostics.len(), 2);
}

fn session(dir: &std::path::Path, remote: Box<dyn TableSink>) -> (KnowledgeBase, std::path::PathBuf) {
    let path = dir.join("LakeHouse.xlsx");
    let seed = CountingSource::new("remote", TableSet::new(sample_lakes(), sample_reports()));
    let kb = KnowledgeBase::new(
        vec![Box::new(seed)],
        Box::new(LocalWorkbook::new(&path)),
        Writer::new(remote, Box::new(LocalWorkbook::new(&path))),
        Loader::default(),
    );
    (kb, path)
}

#[test]
fn session_sees_its_own_fallback_write() {
    let temp_dir = tempdir().expect("temporary directory");
    let (mut kb, _path) = session(temp_dir.path(), Box::new(RejectingSink));

    let before = kb.load();
    assert_eq!(before.backend, Some(Backend::SheetsExport));

    let mut entry = LakeEntry::new("Marketing");
    entry.folder = Some("Raw".into());
    entry.element = Some("campaigns".into());
    let backend = kb.add_lake_entry(&entry).expect("record saved");
    assert_eq!(backend, Backend::Local);

    let after = kb.load();
    assert_eq!(after.backend, Some(Backend::Local));
    assert_eq!(after.lake_names, vec!["Sales", "Finance", "Marketing"]);
    assert_eq!(after.reports, Some(sample_reports()));

    kb.refresh();
    assert_eq!(kb.load().backend, Some(Backend::SheetsExport));
}

#[test]
fn add_rejects_records_without_required_fields() {
    let temp_dir = tempdir().expect("temporary directory");
    let (mut kb, path) = session(temp_dir.path(), Box::new(RejectingSink));

    let error = kb
        .add_lake_entry(&LakeEntry::new("Marketing"))
        .expect_err("folder is required");

    assert!(matches!(error, KbError::MissingField(ref field) if field == "Folder"));
    assert!(!path.exists());
}

#[test]
fn push_replaces_lakes_and_keeps_reports() {
    let temp_dir = tempdir().expect("temporary directory");
    let (mut kb, path) = session(temp_dir.path(), Box::new(RejectingSink));
    let csv_path = temp_dir.path().join("edited.csv");
    std::fs::write(&csv_path, "LakeHouse,Folder,Element\nOps,Logs,events\n").expect("csv written");

    let backend = kb.replace_lakes_from_csv(&csv_path).expect("table saved");

    assert_eq!(backend, Backend::Local);
    let stored = LocalWorkbook::new(&path).fetch().expect("local workbook read");
    assert_eq!(stored.lakes, table(&["LakeHouse", "Folder", "Element"], &[&["Ops", "Logs", "events"]]));
    assert_eq!(stored.reports, sample_reports());
}

#[test]
fn export_writes_date_stamped_csv() {
    let temp_dir = tempdir().expect("temporary directory");
    let (mut kb, _path) = session(temp_dir.path(), Box::new(RejectingSink));

    let exported = kb.export_lakes(temp_dir.path()).expect("csv exported");

    let name = exported
        .file_name()
        .and_then(|name| name.to_str())
        .expect("file name");
    assert!(name.starts_with("lakes_data_"));
    assert!(name.ends_with(".csv"));
    let body = std::fs::read_to_string(&exported).expect("csv read");
    assert!(body.starts_with("LakeHouse,Folder,Element,URL,"));
    assert_eq!(body.lines().count(), 4);
}
