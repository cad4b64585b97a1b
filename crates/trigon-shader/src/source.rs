use std::path::Path;

use crate::error::BuildError;
use crate::stage::StageKind;

/// Directive that opens a stage section: `#shader vertex`.
pub const MARKER: &str = "#shader";

// ── ShaderSource ──────────────────────────────────────────────────────────

/// Per-stage source text split out of one shader file.
///
/// Entries keep the order in which their first marker appeared. Each stage
/// occurs at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderSource {
    stages: Vec<(StageKind, String)>,
}

impl ShaderSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source text of `kind`, if a section for it was declared.
    pub fn get(&self, kind: StageKind) -> Option<&str> {
        self.stages
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, text)| text.as_str())
    }

    pub fn contains(&self, kind: StageKind) -> bool {
        self.get(kind).is_some()
    }

    /// Iterates `(stage, text)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (StageKind, &str)> + '_ {
        self.stages.iter().map(|(k, text)| (*k, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Appends `text` to the buffer of `kind`, creating it on first use.
    pub fn push_str(&mut self, kind: StageKind, text: &str) {
        self.buffer_mut(kind).push_str(text);
    }

    fn buffer_mut(&mut self, kind: StageKind) -> &mut String {
        let idx = match self.stages.iter().position(|(k, _)| *k == kind) {
            Some(idx) => idx,
            None => {
                self.stages.push((kind, String::new()));
                self.stages.len() - 1
            }
        };
        &mut self.stages[idx].1
    }
}

impl FromIterator<(StageKind, String)> for ShaderSource {
    fn from_iter<I: IntoIterator<Item = (StageKind, String)>>(iter: I) -> Self {
        let mut source = ShaderSource::new();
        for (kind, text) in iter {
            source.push_str(kind, &text);
        }
        source
    }
}

// ── Splitter ──────────────────────────────────────────────────────────────

/// What a single input line means to the splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line<'s> {
    /// `#shader <known stage>`
    Marker(StageKind),
    /// `#shader` with a missing or unrecognised stage word.
    UnknownMarker(&'s str),
    Body,
}

fn classify(line: &str) -> Line<'_> {
    let Some(rest) = line.trim_start().strip_prefix(MARKER) else {
        return Line::Body;
    };
    // `#shaderfoo` is body text, not a marker.
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Line::Body;
    }
    let word = rest.split_whitespace().next().unwrap_or("");
    match StageKind::from_keyword(word) {
        Some(kind) => Line::Marker(kind),
        None => Line::UnknownMarker(word),
    }
}

/// Splits a multi-section shader file into per-stage source text.
///
/// Body lines are copied verbatim with their terminator (`\n` or `\r\n`); a
/// last line without one gets `\n`. Marker lines are never copied. Lines
/// outside any known section are dropped. A repeated marker continues the
/// existing buffer for that stage.
pub fn split(text: &str) -> ShaderSource {
    let mut source = ShaderSource::new();
    let mut current: Option<StageKind> = None;
    let mut discarded = 0usize;

    for (idx, raw) in text.split_inclusive('\n').enumerate() {
        match classify(raw) {
            Line::Marker(kind) => {
                current = Some(kind);
                // Declares the stage even if no body follows.
                source.buffer_mut(kind);
            }
            Line::UnknownMarker(word) => {
                log::warn!(
                    "line {}: unrecognised shader stage {:?}; discarding section",
                    idx + 1,
                    word
                );
                current = None;
            }
            Line::Body => match current {
                Some(kind) => {
                    let buf = source.buffer_mut(kind);
                    buf.push_str(raw);
                    if !raw.ends_with('\n') {
                        buf.push('\n');
                    }
                }
                None => discarded += 1,
            },
        }
    }

    if discarded > 0 {
        log::debug!("discarded {} line(s) outside any shader section", discarded);
    }

    source
}

/// Reads `path` and splits it with [`split`].
pub fn load_file(path: impl AsRef<Path>) -> Result<ShaderSource, BuildError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("loaded shader source {} ({} bytes)", path.display(), text.len());
    Ok(split(&text))
}
