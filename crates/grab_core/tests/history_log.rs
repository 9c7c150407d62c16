use chrono::{TimeZone, Utc};
use grab_core::{DownloadResult, HistoryEntry, HistoryLog, MediaDescriptor, HISTORY_CAPACITY};

fn entry(n: i64) -> HistoryEntry {
    let result = DownloadResult::single(
        format!("https://www.instagram.com/p/post{n}/"),
        vec![MediaDescriptor::new(format!("https://cdn.test/{n}.jpg"), false)],
    );
    let created = Utc
        .timestamp_millis_opt(1_700_000_000_000 + n * 1000)
        .single()
        .expect("valid timestamp");
    HistoryEntry::completed(&result, created)
}

#[test]
fn newest_entry_is_first() {
    let mut log = HistoryLog::new();
    log.push_front(entry(1));
    log.push_front(entry(2));

    let urls: Vec<_> = log.entries().iter().map(|e| e.source_url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://www.instagram.com/p/post2/",
            "https://www.instagram.com/p/post1/"
        ]
    );
}

#[test]
fn never_exceeds_capacity_and_evicts_oldest() {
    let mut log = HistoryLog::new();
    for n in 0..HISTORY_CAPACITY as i64 {
        log.push_front(entry(n));
    }
    assert_eq!(log.len(), HISTORY_CAPACITY);
    assert_eq!(
        log.entries().last().unwrap().source_url,
        "https://www.instagram.com/p/post0/"
    );

    log.push_front(entry(50));
    assert_eq!(log.len(), HISTORY_CAPACITY);
    assert_eq!(
        log.entries().first().unwrap().source_url,
        "https://www.instagram.com/p/post50/"
    );
    assert_eq!(
        log.entries().last().unwrap().source_url,
        "https://www.instagram.com/p/post1/"
    );
    assert!(log
        .entries()
        .iter()
        .all(|e| e.source_url != "https://www.instagram.com/p/post0/"));
}

#[test]
fn colliding_ids_stay_strictly_ordered() {
    let mut log = HistoryLog::new();
    let first = entry(5);
    let mut second = entry(5);
    second.source_url = "https://www.instagram.com/p/other/".to_string();

    log.push_front(first.clone());
    log.push_front(second);

    let ids: Vec<_> = log.entries().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![first.id + 1, first.id]);
    assert!(log.get(first.id + 1).is_some());
}

#[test]
fn restore_truncates_oversized_input() {
    let entries: Vec<_> = (0..60).rev().map(entry).collect();
    let log = HistoryLog::from_entries(entries);
    assert_eq!(log.len(), HISTORY_CAPACITY);
    assert_eq!(
        log.entries()[0].source_url,
        "https://www.instagram.com/p/post59/"
    );
}

#[test]
fn clear_empties_the_log() {
    let mut log = HistoryLog::new();
    log.push_front(entry(1));
    log.clear();
    assert!(log.is_empty());
}

#[test]
fn maximal_stored_id_does_not_overflow() {
    let mut stored = entry(1);
    stored.id = i64::MAX;
    let mut log = HistoryLog::from_entries(vec![stored]);

    let pushed = log.push_front(entry(2)).clone();
    assert_eq!(pushed.id, i64::MAX);
    assert_eq!(pushed.source_url, "https://www.instagram.com/p/post2/");
    assert_eq!(log.len(), 2);
}
