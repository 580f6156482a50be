use crate::lyrics::{LyricIndex, LyricLine};

/// Parsed LRC file: ID-tag metadata plus time-sorted lyric lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LrcFile {
    pub metadata: LrcMetadata,
    pub lyrics: LyricIndex,
}

/// LRC metadata from ID tags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LrcMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub author: Option<String>,
    /// Track length in seconds from the `[length:]` tag
    pub length: Option<f64>,
    pub offset_ms: i64, // can be negative
}

impl LrcFile {
    /// Parse LRC text.
    ///
    /// Unknown tags and lines without a leading timestamp are skipped, so text
    /// with no timed lines yields an empty index. Lines repeated under several
    /// timestamps (`[00:05.00][00:15.00]chorus`) produce one entry per timestamp.
    /// Word-timing tags from enhanced LRC (`<00:05.10>`) are removed from the text.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut metadata = LrcMetadata::default();
        let mut lines = Vec::new();

        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some((tag, value)) = parse_id_tag(line) {
                match tag.to_lowercase().as_str() {
                    "ti" => metadata.title = Some(value),
                    "ar" => metadata.artist = Some(value),
                    "al" => metadata.album = Some(value),
                    "au" => metadata.author = Some(value),
                    "length" => metadata.length = parse_timestamp(&value),
                    "offset" => {
                        if let Ok(offset) = value.parse::<i64>() {
                            metadata.offset_ms = offset;
                        }
                    }
                    _ => {}
                }
                continue;
            }

            if let Some(parsed) = parse_lyric_line(line) {
                lines.extend(parsed);
            }
        }

        // Positive offsets make lyrics appear sooner
        if metadata.offset_ms != 0 {
            let shift = offset_secs(metadata.offset_ms);
            for line in &mut lines {
                line.timestamp = (line.timestamp - shift).max(0.0);
            }
        }

        Self {
            metadata,
            lyrics: LyricIndex::from_unsorted(lines),
        }
    }

    /// Consume the file, keeping only the lyric index
    #[must_use]
    pub fn into_index(self) -> LyricIndex {
        self.lyrics
    }
}

#[allow(clippy::cast_precision_loss)]
fn offset_secs(offset_ms: i64) -> f64 {
    offset_ms as f64 / 1000.0
}

/// Parse an ID tag like `[ti:Title]` or `[ar:Artist]`
fn parse_id_tag(line: &str) -> Option<(String, String)> {
    if !line.starts_with('[') {
        return None;
    }

    let end = line.find(']')?;
    let content = &line[1..end];
    let colon = content.find(':')?;
    let tag = &content[..colon];

    // Timestamps look like tags with a numeric name
    if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some((tag.to_string(), content[colon + 1..].trim().to_string()))
}

/// Parse `[00:12.34]Hello` or `[00:12.34][00:15.67]Same lyrics`
fn parse_lyric_line(line: &str) -> Option<Vec<LyricLine>> {
    let mut remaining = line;
    let mut timestamps = Vec::new();

    while remaining.starts_with('[') {
        let Some(end) = remaining.find(']') else {
            break;
        };
        let Some(time) = parse_timestamp(&remaining[1..end]) else {
            break;
        };
        timestamps.push(time);
        remaining = &remaining[end + 1..];
    }

    if timestamps.is_empty() {
        return None;
    }

    let text = strip_word_tags(remaining);
    Some(
        timestamps
            .into_iter()
            .map(|t| LyricLine::new(t, text.clone()))
            .collect(),
    )
}

/// Parse `mm:ss.xx`, `mm:ss:xx` (hundredths) or `mm:ss` into seconds
fn parse_timestamp(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.trim().split(':').collect();

    let seconds = match parts.as_slice() {
        [minutes, seconds] => {
            let minutes: u32 = minutes.parse().ok()?;
            let seconds: f64 = seconds.parse().ok()?;
            f64::from(minutes) * 60.0 + seconds
        }
        [minutes, seconds, hundredths] => {
            let minutes: u32 = minutes.parse().ok()?;
            let seconds: u32 = seconds.parse().ok()?;
            let hundredths: u32 = hundredths.parse().ok()?;
            f64::from(minutes) * 60.0 + f64::from(seconds) + f64::from(hundredths) / 100.0
        }
        _ => return None,
    };

    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

/// Remove `<mm:ss.xx>` word-timing tags and collapse whitespace
fn strip_word_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) if parse_timestamp(&rest[open + 1..open + close]).is_some() => {
                out.push(' ');
                rest = &rest[open + close + 1..];
            }
            _ => {
                out.push('<');
                rest = &rest[open + 1..];
            }
        }
    }
    out.push_str(rest);

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
