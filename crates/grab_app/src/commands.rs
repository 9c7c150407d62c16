use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use grab_core::{
    is_valid_source_url, parse_url_list, should_offer_archive, ArchiveEstimate, ArchiveMsg,
    DownloadResult, HistoryEntry, MediaDescriptor,
};
use grab_engine::{
    archive_subject, ensure_output_dir, ApiConfig, ArchiveBuilder, ArchiveError, ArchiveEvent,
    ArchiveSettings, ArchiveSummary, FetchSettings, HistoryStore, IndividualSummary,
    MediaFetcher, ScrapeClient, ScrapeSettings,
};
use grab_logging::{grab_info, grab_warn};

use crate::cli::{GetArgs, HistoryArgs, SourceArgs};
use crate::progress::TerminalProgress;

pub async fn resolve(args: SourceArgs, data_dir: &Path) -> Result<()> {
    let result = resolve_sources(&args, data_dir).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.source_url);
    for (position, item) in result.items.iter().enumerate() {
        println!("{:>3}. {:<5} {}", position + 1, item.kind().label(), item.media_url);
    }
    Ok(())
}

pub async fn get(args: GetArgs, data_dir: &Path) -> Result<()> {
    let result = resolve_sources(&args.source, data_dir).await?;
    ensure_output_dir(&args.out)?;

    let fetcher = MediaFetcher::new(&FetchSettings::default())?;
    let builder = ArchiveBuilder::new(
        Arc::new(fetcher),
        ArchiveSettings::default_with_output(args.out.clone()),
    );
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| archive_subject(&result.source_url));

    match save_media(&builder, &result.items, &name, args.individual).await? {
        Saved::Archive(summary) => {
            println!("{}", summary.archive_path.display());
            Ok(())
        }
        Saved::Individual(summary) => report_individual(&summary, result.items.len()),
    }
}

/// What a download job left on disk.
#[derive(Debug)]
enum Saved {
    Archive(ArchiveSummary),
    Individual(IndividualSummary),
}

/// Packs `items` into one archive when that is worthwhile, otherwise saves
/// them one by one. A failed archive write falls back to saving the already
/// fetched items individually.
async fn save_media(
    builder: &ArchiveBuilder,
    items: &[MediaDescriptor],
    name: &str,
    individual: bool,
) -> Result<Saved> {
    let progress = TerminalProgress::new();
    let sink = |event: ArchiveEvent| progress.on_event(event);

    if individual || !should_offer_archive(items) {
        let summary = builder.save_individually(items, &sink).await;
        return Ok(Saved::Individual(summary));
    }

    let estimate = ArchiveEstimate::for_items(items);
    eprintln!(
        "Packing {} images and {} videos, estimated {}",
        estimate.images, estimate.videos, estimate
    );

    match builder.build_archive(items, name, &sink).await {
        Ok(summary) => {
            progress.apply(ArchiveMsg::Finished {
                downloaded: summary.downloaded_count,
                total: summary.total_count,
                file_name: summary.archive_file_name.clone(),
            });
            Ok(Saved::Archive(summary))
        }
        Err(err @ ArchiveError::AssemblyFailed { .. }) => {
            progress.apply(ArchiveMsg::Failed {
                message: err.to_string(),
            });
            eprintln!("{}", err.remediation());
            grab_warn!("Falling back to individual downloads: {}", err);

            let recovered = err.into_recovered();
            let mut summary = builder.save_fetched(&recovered);
            // Items never fetched stay skipped.
            let fetched_positions: Vec<usize> =
                recovered.iter().map(|media| media.source_index).collect();
            summary.skipped.extend(
                (1..=items.len()).filter(|position| !fetched_positions.contains(position)),
            );
            summary.skipped.sort_unstable();
            Ok(Saved::Individual(summary))
        }
        Err(err) => {
            progress.apply(ArchiveMsg::Failed {
                message: err.to_string(),
            });
            bail!("{err}\n{}", err.remediation())
        }
    }
}

pub fn history(args: HistoryArgs, data_dir: &Path) -> Result<()> {
    let mut store = HistoryStore::open(data_dir);
    if args.clear {
        store.clear();
        println!("Download history cleared");
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(store.entries())?);
        return Ok(());
    }
    if store.entries().is_empty() {
        println!("No downloads yet");
    }
    for entry in store.entries() {
        println!("{}", history_line(entry));
    }
    Ok(())
}

fn history_line(entry: &HistoryEntry) -> String {
    format!(
        "{}  {}  {:>3} items  {}",
        entry.id,
        entry.created_at.format("%Y-%m-%d %H:%M"),
        entry.items.len(),
        entry.source_url
    )
}

/// Validates the requested URLs, resolves them and records every resolved
/// source in the history.
async fn resolve_sources(args: &SourceArgs, data_dir: &Path) -> Result<DownloadResult> {
    let urls = collect_urls(args)?;

    let config = ApiConfig::from_env();
    if let Err(err) = config.validate() {
        bail!("{err}\n{}", err.remediation());
    }
    let client = ScrapeClient::new(&config, ScrapeSettings::default())?;
    let mut history = HistoryStore::open(data_dir);

    if let [url] = urls.as_slice() {
        return match client.resolve(url).await {
            Ok(result) => {
                history.append(&result);
                Ok(result)
            }
            Err(err) => bail!("{err}\n{}", err.remediation()),
        };
    }

    eprintln!("Resolving {} URLs...", urls.len());
    let outcome = match client
        .resolve_batch(&urls, |result| {
            history.append(result);
        })
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => bail!("{err}\n{}", err.remediation()),
    };

    let summary = outcome.summary();
    match outcome.result {
        Some(result) => {
            if let Some(summary) = summary {
                eprintln!("{summary}");
            }
            Ok(result)
        }
        None => bail!(summary.unwrap_or_else(|| "No URLs could be resolved".to_string())),
    }
}

fn collect_urls(args: &SourceArgs) -> Result<Vec<String>> {
    let mut candidates: Vec<String> = args.urls.iter().map(|url| url.trim().to_string()).collect();
    if let Some(path) = &args.from_file {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading URL list {}", path.display()))?;
        candidates.extend(parse_url_list(&raw));
    }

    let (valid, invalid) = split_valid(candidates);
    for url in &invalid {
        eprintln!("Skipping invalid URL: {url}");
    }
    if valid.is_empty() {
        bail!("Please enter a valid Instagram post, reel or story URL");
    }
    grab_info!("{} URLs accepted, {} rejected", valid.len(), invalid.len());
    Ok(valid)
}

fn split_valid(candidates: Vec<String>) -> (Vec<String>, Vec<String>) {
    candidates
        .into_iter()
        .filter(|url| !url.is_empty())
        .partition(|url| is_valid_source_url(url))
}

fn report_individual(summary: &IndividualSummary, total: usize) -> Result<()> {
    for path in &summary.saved {
        println!("{}", path.display());
    }
    if summary.saved.is_empty() {
        bail!("None of the {total} media files could be downloaded");
    }
    if !summary.skipped.is_empty() {
        eprintln!(
            "Saved {} of {total} files; skipped items {:?}",
            summary.saved.len(),
            summary.skipped
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use grab_engine::{FetchOutcome, MediaPayload, MediaSource, StrategyKind};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    fn source_args(urls: &[&str], from_file: Option<PathBuf>) -> SourceArgs {
        SourceArgs {
            urls: urls.iter().map(|url| url.to_string()).collect(),
            from_file,
            json: false,
        }
    }

    #[test]
    fn invalid_urls_are_dropped() {
        let (valid, invalid) = split_valid(vec![
            "https://www.instagram.com/p/ABC/".to_string(),
            "https://example.com/p/ABC/".to_string(),
            String::new(),
        ]);
        assert_eq!(valid, vec!["https://www.instagram.com/p/ABC/"]);
        assert_eq!(invalid, vec!["https://example.com/p/ABC/"]);
    }

    #[test]
    fn urls_are_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("urls.txt");
        fs::write(
            &list,
            "https://instagram.com/reel/XYZ/\n\n  https://instagr.am/p/Q1/  \nnot-a-url\n",
        )
        .unwrap();

        let urls = collect_urls(&source_args(
            &["https://www.instagram.com/p/ABC/"],
            Some(list),
        ))
        .unwrap();
        assert_eq!(
            urls,
            vec![
                "https://www.instagram.com/p/ABC/",
                "https://instagram.com/reel/XYZ/",
                "https://instagr.am/p/Q1/",
            ]
        );
    }

    #[test]
    fn no_valid_url_is_an_error() {
        let err = collect_urls(&source_args(&["https://example.com"], None)).unwrap_err();
        assert!(err.to_string().contains("valid Instagram"));
    }

    #[test]
    fn history_lines_show_count_and_source() {
        let result = DownloadResult::single(
            "https://www.instagram.com/p/ABC/",
            vec![
                MediaDescriptor::new("https://cdn.example/a.jpg", false),
                MediaDescriptor::new("https://cdn.example/b.mp4", true),
            ],
        );
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let entry = HistoryEntry::completed(&result, created);
        assert_eq!(
            history_line(&entry),
            format!(
                "{}  2024-03-01 09:30    2 items  https://www.instagram.com/p/ABC/",
                entry.id
            )
        );
    }

    /// Answers from a fixed table and counts every request.
    #[derive(Default)]
    struct StubSource {
        bodies: HashMap<String, &'static [u8]>,
        requests: Mutex<usize>,
    }

    impl StubSource {
        fn serving(bodies: &[(&str, &'static [u8])]) -> Self {
            Self {
                bodies: bodies
                    .iter()
                    .map(|(url, body)| (url.to_string(), *body))
                    .collect(),
                requests: Mutex::new(0),
            }
        }

        fn requests(&self) -> usize {
            *self.requests.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl MediaSource for StubSource {
        async fn fetch_media(&self, url: &str) -> FetchOutcome {
            *self.requests.lock().unwrap() += 1;
            match self.bodies.get(url) {
                Some(&body) => FetchOutcome::Success(MediaPayload {
                    bytes: Bytes::from_static(body),
                    content_type: None,
                    via: StrategyKind::Direct,
                }),
                None => FetchOutcome::Failure,
            }
        }
    }

    fn quiet_settings(dir: &Path) -> ArchiveSettings {
        ArchiveSettings {
            inter_item_delay: Duration::ZERO,
            individual_delay: Duration::ZERO,
            ..ArchiveSettings::default_with_output(dir.to_path_buf())
        }
    }

    fn three_photos() -> Vec<MediaDescriptor> {
        vec![
            MediaDescriptor::new("https://cdn.test/1.jpg", false),
            MediaDescriptor::new("https://cdn.test/2.jpg", false),
            MediaDescriptor::new("https://cdn.test/3.jpg", false),
        ]
    }

    #[tokio::test]
    async fn failed_archive_falls_back_to_individual_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(StubSource::serving(&[
            ("https://cdn.test/1.jpg", b"first photo"),
            ("https://cdn.test/3.jpg", b"third photo"),
        ]));
        let settings = ArchiveSettings {
            max_archive_bytes: 4,
            ..quiet_settings(dir.path())
        };
        let builder = ArchiveBuilder::new(source.clone(), settings);

        let saved = save_media(&builder, &three_photos(), "instagram_ABC", false)
            .await
            .unwrap();

        let summary = match saved {
            Saved::Individual(summary) => summary,
            other => panic!("expected individual files, got {other:?}"),
        };
        assert_eq!(
            summary.saved,
            vec![
                dir.path().join("instagram_image_1.jpg"),
                dir.path().join("instagram_image_3.jpg"),
            ]
        );
        assert_eq!(summary.skipped, vec![2]);
        assert_eq!(
            fs::read(dir.path().join("instagram_image_3.jpg")).unwrap(),
            b"third photo"
        );
        assert_eq!(source.requests(), 3);
    }

    #[tokio::test]
    async fn nothing_fetched_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ArchiveBuilder::new(
            Arc::new(StubSource::default()),
            quiet_settings(dir.path()),
        );

        let err = save_media(&builder, &three_photos(), "instagram_ABC", false)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to download any media files (3 attempted)"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn several_items_become_one_archive() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(StubSource::serving(&[
            ("https://cdn.test/1.jpg", b"one"),
            ("https://cdn.test/2.jpg", b"two"),
            ("https://cdn.test/3.jpg", b"three"),
        ]));
        let builder = ArchiveBuilder::new(source, quiet_settings(dir.path()));

        let saved = save_media(&builder, &three_photos(), "instagram_ABC", false)
            .await
            .unwrap();

        let summary = match saved {
            Saved::Archive(summary) => summary,
            other => panic!("expected an archive, got {other:?}"),
        };
        assert_eq!(summary.downloaded_count, 3);
        assert!(summary.archive_path.is_file());
    }
}
