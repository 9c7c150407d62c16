use grab_core::{extract_post_id, MediaKind};

const DEFAULT_SUBJECT: &str = "instagram_media";
const URL_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "gif", "heic", "mp4", "mov", "avi", "webm",
];

/// Archive subject for a source URL: `instagram_{id}`, or a generic name.
pub fn archive_subject(source_url: &str) -> String {
    match extract_post_id(source_url) {
        Some(id) => format!("instagram_{}", sanitize_subject(&id)),
        None => DEFAULT_SUBJECT.to_string(),
    }
}

/// `{subject}_{date}_{count}items.zip`
pub fn archive_file_name(subject: &str, date: &str, count: usize) -> String {
    format!("{}_{date}_{count}items.zip", sanitize_subject(subject))
}

/// `{image|video}_{index:02}.{ext}`; `index` is 1-based.
pub fn archive_entry_name(kind: MediaKind, index: usize, extension: &str) -> String {
    format!("{}_{index:02}.{extension}", kind.label())
}

/// `instagram_{image|video}_{index}.{ext}`; `index` is 1-based.
pub fn individual_file_name(kind: MediaKind, index: usize, extension: &str) -> String {
    format!("instagram_{}_{index}.{extension}", kind.label())
}

/// Extension for a payload: declared content type, then URL suffix, then the
/// default for its kind.
pub fn media_extension(content_type: Option<&str>, url: &str, kind: MediaKind) -> String {
    content_type
        .and_then(extension_from_content_type)
        .map(str::to_string)
        .or_else(|| extension_from_url(url))
        .unwrap_or_else(|| kind.default_extension().to_string())
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        other if other.starts_with("video/") => Some("mp4"),
        _ => None,
    }
}

fn extension_from_url(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let last = path.rsplit('/').next()?;
    let (_, extension) = last.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    URL_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// File-system safe subject: forbidden characters become `_`, runs of `_`
/// collapse, at most 80 characters.
pub fn sanitize_subject(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();

    let mut compacted = String::with_capacity(replaced.len());
    let mut prev_underscore = false;
    for c in replaced.trim_matches(&['_', ' ', '.'][..]).chars() {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }

    if compacted.is_empty() {
        return DEFAULT_SUBJECT.to_string();
    }
    compacted.chars().take(80).collect()
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' | '\0'..='\u{1F}'
    )
}
