#[path = "common/mod.rs"]
mod common;

use common::*;
use logtally::{collect_partials, CalendarRange, CounterArray, LineLayout, TallyError, Transport};
use std::fs;
use std::path::Path;

/// The reference scenario: three visits to /a on one day, one to /b the next day and a
/// malformed short line. The report keeps first-seen path order and drops the bad line.
#[test]
fn reference_scenario_writes_expected_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_log(
        dir.path(),
        "access.log",
        &[
            visit("/a", "2021-03-01"),
            visit("/a", "2021-03-01"),
            "short line".to_string(),
            visit("/b", "2021-03-02"),
            visit("/a", "2021-03-01"),
        ],
    );
    let output = dir.path().join("report.json");

    let summary = quiet().workers(2).run(&input, &output).unwrap();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "{\"/a\":{\"2021-03-01\":3},\"/b\":{\"2021-03-02\":1}}\n"
    );
    assert_eq!(summary.paths, 2);
    assert_eq!(summary.visits, 4);
    assert!(!dir.path().join("report.json.inprogress").exists());
}

/// Paths are emitted in the order they were first seen, not sorted.
#[test]
fn paths_keep_first_seen_order() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_log(
        dir.path(),
        "access.log",
        &[
            visit("/z", "2022-01-02"),
            visit("/a", "2022-01-01"),
            visit("/z", "2022-01-01"),
            visit("/m", "2022-01-01"),
        ],
    );

    let json = quiet().workers(3).count(&input).unwrap().to_json_string(false).unwrap();
    assert_eq!(
        json,
        "{\"/z\":{\"2022-01-01\":1,\"2022-01-02\":1},\"/a\":{\"2022-01-01\":1},\"/m\":{\"2022-01-01\":1}}"
    );
}

/// A path seen only on dates outside the calendar still gets an (empty) entry.
#[test]
fn path_outside_calendar_has_empty_entry() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_log(
        dir.path(),
        "access.log",
        &[visit("/old", "2019-05-05"), visit("/new", "2026-12-31"), visit("/old", "2027-01-01")],
    );

    let report = quiet().workers(1).count(&input).unwrap();
    assert_eq!(report.to_json_string(false).unwrap(), "{\"/old\":{},\"/new\":{\"2026-12-31\":1}}");
    assert_eq!(report.total(), 1);
}

/// 2024-02-29 is a real day; 2023-02-29 is not and is silently skipped.
#[test]
fn leap_day_is_counted_and_impossible_day_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_log(
        dir.path(),
        "access.log",
        &[visit("/leap", "2024-02-29"), visit("/leap", "2023-02-29")],
    );

    let report = quiet().count(&input).unwrap();
    assert_eq!(report.visits("/leap", "2024-02-29"), 1);
    assert_eq!(report.visits("/leap", "2023-02-29"), 0);
    assert_eq!(report.to_json_string(false).unwrap(), "{\"/leap\":{\"2024-02-29\":1}}");
}

/// A line of exactly prefix + delimiter + datetime bytes is counted (empty path);
/// one byte shorter is ignored.
#[test]
fn minimum_length_line_is_counted_one_shorter_is_not() {
    let dir = tempfile::tempdir().unwrap();
    let exact = line("", "2021-03-01T10:00:00+00:00");
    assert_eq!(exact.len(), LineLayout::default().min_line_len());
    let short = exact[..exact.len() - 1].to_string();
    let input = write_log(dir.path(), "access.log", &[exact, short]);

    let report = quiet().count(&input).unwrap();
    assert_eq!(report.catalog.len(), 1);
    assert_eq!(report.to_json_string(false).unwrap(), "{\"\":{\"2021-03-01\":1}}");
}

/// Worker count only changes parallelism: every partition yields the same report, and the
/// sum of all counters equals the number of lines with a known path and date.
#[test]
fn worker_count_does_not_change_result() {
    let dir = tempfile::tempdir().unwrap();
    let (lines, counted) = synthetic_log(6_000, 7);
    let input = write_log(dir.path(), "access.log", &lines);

    let baseline = quiet().workers(1).io_read_buffer(8 * 1024).count(&input).unwrap();
    assert_eq!(baseline.total(), counted);
    let expected = baseline.to_json_string(false).unwrap();

    for workers in [2, 3, 4, 7, 16] {
        let report = quiet().workers(workers).io_read_buffer(8 * 1024).count(&input).unwrap();
        assert_eq!(report.total(), counted, "workers={workers}");
        assert_eq!(report.to_json_string(false).unwrap(), expected, "workers={workers}");
    }
}

/// Spilled handoff produces the same report as in-memory handoff and leaves nothing behind.
#[test]
fn spill_transport_matches_in_memory_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let (lines, counted) = synthetic_log(3_000, 11);
    let input = write_log(dir.path(), "access.log", &lines);
    let spill = dir.path().join("spill");

    let in_memory = quiet().workers(4).count(&input).unwrap();
    let spilled = quiet().workers(4).spill_dir(&spill).count(&input).unwrap();

    assert_eq!(spilled.total(), counted);
    assert_eq!(spilled.counts, in_memory.counts);
    assert_eq!(fs::read_dir(&spill).unwrap().count(), 0);
}

/// Path strings are JSON-escaped.
#[test]
fn path_strings_are_escaped() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_log(dir.path(), "access.log", &[visit("/say/\"hi\"\\", "2022-02-02")]);

    let json = quiet().count(&input).unwrap().to_json_string(false).unwrap();
    assert_eq!(json, "{\"/say/\\\"hi\\\"\\\\\":{\"2022-02-02\":1}}");
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["/say/\"hi\"\\"]["2022-02-02"], 1);
}

#[test]
fn pretty_report_is_indented() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_log(
        dir.path(),
        "access.log",
        &[visit("/a", "2021-03-01"), visit("/gone", "2018-01-01")],
    );
    let output = dir.path().join("report.json");

    quiet().pretty(true).run(&input, &output).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "{\n  \"/a\": {\n    \"2021-03-01\": 1\n  },\n  \"/gone\": {}\n}\n"
    );
}

/// A final line without a trailing newline is not counted, and its path is not discovered.
#[test]
fn unterminated_final_line_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = Vec::new();
    bytes.extend_from_slice(visit("/a", "2021-03-01").as_bytes());
    bytes.push(b'\n');
    bytes.extend_from_slice(visit("/a", "2021-03-01").as_bytes());
    bytes.push(b'\n');
    bytes.extend_from_slice(visit("/tail", "2021-03-01").as_bytes());
    let input = write_raw(dir.path(), "access.log", &bytes);

    for workers in [1, 2, 3] {
        let report = quiet().workers(workers).count(&input).unwrap();
        assert_eq!(report.visits("/a", "2021-03-01"), 2, "workers={workers}");
        assert_eq!(report.catalog.offset_of(b"/tail"), None, "workers={workers}");
        assert_eq!(report.total(), 2, "workers={workers}");
    }
}

/// Lines longer than the read buffer are still counted exactly once.
#[test]
fn lines_longer_than_read_buffer_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    let long_path = format!("/{}", "x".repeat(20_000));
    let input = write_log(
        dir.path(),
        "access.log",
        &[
            visit("/a", "2021-03-01"),
            visit(&long_path, "2021-03-01"),
            visit("/a", "2021-03-02"),
            visit(&long_path, "2021-03-02"),
        ],
    );

    for workers in [1, 2] {
        let report = quiet().workers(workers).io_read_buffer(8 * 1024).count(&input).unwrap();
        assert_eq!(report.visits(&long_path, "2021-03-01"), 1, "workers={workers}");
        assert_eq!(report.visits(&long_path, "2021-03-02"), 1, "workers={workers}");
        assert_eq!(report.total(), 4, "workers={workers}");
    }
}

#[test]
fn empty_input_writes_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_raw(dir.path(), "access.log", b"");
    let output = dir.path().join("report.json");

    let summary = quiet().workers(4).run(&input, &output).unwrap();
    assert_eq!(summary.paths, 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), "{}\n");
}

/// More workers than lines: trailing ranges are empty and tally nothing.
#[test]
fn more_workers_than_lines() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_log(
        dir.path(),
        "access.log",
        &[visit("/a", "2021-03-01"), visit("/b", "2021-03-01"), visit("/a", "2021-03-01")],
    );

    let report = quiet().workers(16).count(&input).unwrap();
    assert_eq!(report.to_json_string(false).unwrap(), "{\"/a\":{\"2021-03-01\":2},\"/b\":{\"2021-03-01\":1}}");
}

#[test]
fn custom_layout_and_calendar() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_log(
        dir.path(),
        "access.log",
        &[
            "http://x.io/p 2027-01-01 10:00:00".to_string(),
            "http://x.io/p 2026-12-31 10:00:00".to_string(),
        ],
    );

    let report = quiet()
        .layout(LineLayout::new("http://x.io".len(), "2027-01-01 10:00:00".len()))
        .calendar(CalendarRange::new(2027, 2027))
        .count(&input)
        .unwrap();
    assert_eq!(report.dates.len(), 365);
    assert_eq!(report.to_json_string(false).unwrap(), "{\"/p\":{\"2027-01-01\":1}}");
}

#[test]
fn missing_input_is_an_open_error() {
    let err = quiet().count(Path::new("/definitely/not/here/access.log")).unwrap_err();
    match err.downcast_ref::<TallyError>() {
        Some(TallyError::Io { stage, .. }) => assert_eq!(*stage, "open"),
        other => panic!("expected open error, got {other:?}"),
    }
}

#[test]
fn invalid_options_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_log(dir.path(), "access.log", &[visit("/a", "2021-03-01")]);

    let err = quiet().calendar(CalendarRange::new(2026, 2020)).count(&input).unwrap_err();
    assert!(matches!(err.downcast_ref::<TallyError>(), Some(TallyError::Config(_))));

    let err = quiet().layout(LineLayout::new(19, 5)).count(&input).unwrap_err();
    assert!(matches!(err.downcast_ref::<TallyError>(), Some(TallyError::Config(_))));
}

/// A path that is not valid UTF-8 cannot be emitted as a JSON key.
#[test]
fn non_utf8_path_fails_serialization() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = PREFIX.as_bytes().to_vec();
    bytes.extend_from_slice(&[b'/', 0xff, 0xfe]);
    bytes.extend_from_slice(b",2021-03-01T10:00:00+00:00\n");
    let input = write_raw(dir.path(), "access.log", &bytes);
    let output = dir.path().join("report.json");

    let err = quiet().run(&input, &output).unwrap_err();
    assert!(matches!(err.downcast_ref::<TallyError>(), Some(TallyError::Serialization(_))));
    assert!(!output.exists());
    assert!(!dir.path().join("report.json.inprogress").exists());
}

/// One failed unit fails the whole run: nothing is merged and every spilled partial from
/// the units that did finish is removed.
#[test]
fn failed_unit_discards_every_spilled_partial() {
    let dir = tempfile::tempdir().unwrap();
    let spill = dir.path().join("spill");
    fs::create_dir_all(&spill).unwrap();
    let transport = Transport::Spill { dir: spill.clone() };

    let results = vec![
        transport.send(0, CounterArray::from_vec(vec![1, 2])),
        transport.send(1, CounterArray::from_vec(vec![3, 4])),
        Err(TallyError::Worker { worker: 2, reason: "range unreadable".into() }.into()),
        transport.send(3, CounterArray::from_vec(vec![5, 6])),
    ];
    assert_eq!(fs::read_dir(&spill).unwrap().count(), 3);

    let err = collect_partials(&transport, results, 2).unwrap_err();
    assert!(matches!(err.downcast_ref::<TallyError>(), Some(TallyError::Worker { worker: 2, .. })));
    assert_eq!(fs::read_dir(&spill).unwrap().count(), 0);
}

/// A partial that fails to unpack aborts the merge and the remaining spill files are removed.
#[test]
fn unreadable_partial_discards_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let spill = dir.path().join("spill");
    fs::create_dir_all(&spill).unwrap();
    let transport = Transport::Spill { dir: spill.clone() };

    let first = transport.send(0, CounterArray::from_vec(vec![1, 2])).unwrap();
    let second = transport.send(1, CounterArray::from_vec(vec![3, 4])).unwrap();
    let third = transport.send(2, CounterArray::from_vec(vec![5, 6])).unwrap();
    if let logtally::Handoff::Spilled { path, .. } = &second {
        fs::remove_file(path).unwrap();
    }

    let err = collect_partials(&transport, vec![Ok(first), Ok(second), Ok(third)], 2).unwrap_err();
    assert!(matches!(err.downcast_ref::<TallyError>(), Some(TallyError::Worker { worker: 1, .. })));
    assert_eq!(fs::read_dir(&spill).unwrap().count(), 0);
}
