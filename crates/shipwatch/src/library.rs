use std::{
    collections::{HashMap, HashSet},
    fmt::Write as _,
    io::Write as _,
    path::Path,
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{LibraryError, LibraryParseErrorKind};
use crate::matcher::SNAPSHOT_PREFIX;
use crate::parser::is_marker;

/// The library as shared between the pipeline (readers) and corrections (writer).
pub type SharedLibrary = Arc<RwLock<SignatureLibrary>>;

/// One ship and the room-code markers that identify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name: String,
    tokens: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Signature {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tokens: Vec::new(),
            counts: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Markers in load order, duplicates kept.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.counts.contains_key(marker)
    }

    /// How many times `marker` is listed in this signature.
    pub fn count(&self, marker: &str) -> usize {
        self.counts.get(marker).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn push(&mut self, token: String) {
        *self.counts.entry(token.clone()).or_insert(0) += 1;
        self.tokens.push(token);
    }

    fn extend(&mut self, tokens: impl IntoIterator<Item = String>) {
        for token in tokens {
            self.push(token);
        }
    }

    fn clear(&mut self) {
        self.tokens.clear();
        self.counts.clear();
    }
}

/// Result of [`SignatureLibrary::relabel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelabelOutcome {
    /// The wrong ship was removed and its markers merged into the target.
    Relabeled {
        moved_tokens: usize,
        created_target: bool,
    },
    /// Both names resolve to the same ship; nothing changed.
    Unchanged,
    /// The wrong ship is not in the library; nothing changed.
    NotFound,
}

impl RelabelOutcome {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Relabeled { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryStats {
    pub ships: usize,
    pub tokens: usize,
    pub distinct_tokens: usize,
}

/// A trimmed line of the signature file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LibraryLine<'a> {
    Blank,
    Header(&'a str),
    Marker(&'a str),
}

impl<'a> LibraryLine<'a> {
    fn classify(raw: &'a str) -> Self {
        let line = raw.trim();
        if line.is_empty() {
            Self::Blank
        } else if is_marker(line) {
            Self::Marker(line)
        } else {
            Self::Header(line)
        }
    }
}

/// Ship signatures keyed by name, in load order.
///
/// Iteration order matters: the matcher breaks score ties in favour of the
/// ship that appears first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureLibrary {
    ships: Vec<Signature>,
}

impl SignatureLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and parses the signature file at `path`.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LibraryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let library = Self::parse(&String::from_utf8_lossy(&bytes))?;
        debug!(path = %path.display(), ships = library.len(), "loaded signature library");
        Ok(library)
    }

    /// Parses signature file text.
    ///
    /// A header line names a ship and starts (or resets) its marker list; marker
    /// lines append to the most recent header. A marker with no preceding
    /// header is an error.
    pub fn parse(text: &str) -> Result<Self, LibraryError> {
        let mut library = Self::new();
        let mut current: Option<usize> = None;

        for (idx, raw) in text.lines().enumerate() {
            match LibraryLine::classify(raw) {
                LibraryLine::Blank => {}
                LibraryLine::Header(name) => {
                    let slot = match library.position(name) {
                        Some(existing) => {
                            library.ships[existing].clear();
                            existing
                        }
                        None => {
                            library.ships.push(Signature::new(name));
                            library.ships.len() - 1
                        }
                    };
                    current = Some(slot);
                }
                LibraryLine::Marker(marker) => {
                    let Some(slot) = current else {
                        return Err(LibraryError::Parse {
                            line_number: idx + 1,
                            kind: LibraryParseErrorKind::OrphanMarker {
                                marker: marker.to_string(),
                            },
                        });
                    };
                    library.ships[slot].push(marker.to_string());
                }
            }
        }

        Ok(library)
    }

    /// Renders the library in its on-disk format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for ship in &self.ships {
            let _ = writeln!(out, "{}", ship.name);
            for token in &ship.tokens {
                let _ = writeln!(out, "{token}");
            }
            out.push('\n');
        }
        out
    }

    /// Rewrites the file at `path` with the current contents.
    ///
    /// The new content goes to a temporary file next to `path` which is then
    /// renamed over it, so readers never see a partial file.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), LibraryError> {
        let path = path.as_ref();
        let write_err = |source: std::io::Error| LibraryError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(self.render().as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|err| write_err(err.error))?;

        debug!(path = %path.display(), ships = self.len(), "persisted signature library");
        Ok(())
    }

    /// Adds a ship, replacing the markers of an existing ship with the same name.
    pub fn insert<I, S>(&mut self, name: &str, tokens: I) -> Result<(), LibraryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_ship_name(name)?;
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if let Some(bad) = tokens.iter().find(|token| !is_marker(token)) {
            return Err(LibraryError::InvalidMarker {
                marker: bad.clone(),
            });
        }

        let slot = match self.position(name) {
            Some(existing) => {
                self.ships[existing].clear();
                existing
            }
            None => {
                self.ships.push(Signature::new(name));
                self.ships.len() - 1
            }
        };

        self.ships[slot].extend(tokens);
        Ok(())
    }

    /// Moves every marker of `wrong` onto `correct` and removes `wrong`.
    ///
    /// `correct` is created at the end of the library if it does not exist.
    /// Either name may carry the `(S) ` display prefix the matcher adds.
    pub fn relabel(&mut self, wrong: &str, correct: &str) -> Result<RelabelOutcome, LibraryError> {
        let Some(from) = self.resolve(wrong.trim()) else {
            return Ok(RelabelOutcome::NotFound);
        };

        let correct = correct.trim();
        let target = self.resolve(correct);
        if target == Some(from) {
            return Ok(RelabelOutcome::Unchanged);
        }

        let target_name = correct.strip_prefix(SNAPSHOT_PREFIX).unwrap_or(correct);
        if target.is_none() {
            validate_ship_name(target_name)?;
        }

        let removed = self.ships.remove(from);
        let moved_tokens = removed.tokens.len();

        // Indices after `from` shifted left by one.
        let target = target.map(|idx| if idx > from { idx - 1 } else { idx });
        let created_target = match target {
            Some(idx) => {
                self.ships[idx].extend(removed.tokens);
                false
            }
            None => {
                let mut ship = Signature::new(target_name);
                ship.extend(removed.tokens);
                self.ships.push(ship);
                true
            }
        };

        Ok(RelabelOutcome::Relabeled {
            moved_tokens,
            created_target,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Signature> {
        self.position(name).map(|idx| &self.ships[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.ships.iter()
    }

    pub fn len(&self) -> usize {
        self.ships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }

    pub fn stats(&self) -> LibraryStats {
        let distinct: HashSet<&str> = self
            .ships
            .iter()
            .flat_map(|ship| ship.tokens.iter().map(String::as_str))
            .collect();
        LibraryStats {
            ships: self.ships.len(),
            tokens: self.ships.iter().map(Signature::len).sum(),
            distinct_tokens: distinct.len(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.ships.iter().position(|ship| ship.name == name)
    }

    fn resolve(&self, name: &str) -> Option<usize> {
        self.position(name).or_else(|| {
            name.strip_prefix(SNAPSHOT_PREFIX)
                .and_then(|bare| self.position(bare))
        })
    }
}

/// Checks that `name` can be written as a header line and read back as one.
pub fn validate_ship_name(name: &str) -> Result<(), LibraryError> {
    let reason = if name.trim().is_empty() {
        Some("name must not be empty")
    } else if name != name.trim() {
        Some("name must not start or end with whitespace")
    } else if name.contains(['\n', '\r']) {
        Some("name must be a single line")
    } else if is_marker(name) {
        Some("name must not be a room marker")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(LibraryError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Carrack
room_engineering
room_medbay
room_engineering

Aurora
room_cockpit
room_bunk

";

    fn names(library: &SignatureLibrary) -> Vec<&str> {
        library.iter().map(Signature::name).collect()
    }

    #[test]
    fn parses_headers_and_markers_in_order() {
        let library = SignatureLibrary::parse(SAMPLE).unwrap();
        assert_eq!(names(&library), vec!["Carrack", "Aurora"]);
        assert_eq!(
            library.get("Carrack").unwrap().tokens(),
            ["room_engineering", "room_medbay", "room_engineering"]
        );
        assert!(library.get("Aurora").unwrap().contains("room_bunk"));
        assert_eq!(library.get("Carrack").unwrap().count("room_engineering"), 2);
        assert_eq!(library.get("Carrack").unwrap().count("room_bunk"), 0);
    }

    #[test]
    fn tolerates_whitespace_and_missing_separators() {
        let text = "  Cutlass Black \r\n\troom_cargo\r\n\n\n Aurora\nroom_bunk";
        let library = SignatureLibrary::parse(text).unwrap();
        assert_eq!(names(&library), vec!["Cutlass Black", "Aurora"]);
        assert_eq!(library.get("Cutlass Black").unwrap().tokens(), ["room_cargo"]);
    }

    #[test]
    fn repeated_header_resets_tokens_but_keeps_position() {
        let text = "A\nroom_1\n\nB\nroom_2\n\nA\nroom_3\n";
        let library = SignatureLibrary::parse(text).unwrap();
        assert_eq!(names(&library), vec!["A", "B"]);
        assert_eq!(library.get("A").unwrap().tokens(), ["room_3"]);
    }

    #[test]
    fn orphan_marker_is_a_parse_error() {
        let err = SignatureLibrary::parse("\n\nroom_bridge\nCarrack\n").unwrap_err();
        match err {
            LibraryError::Parse { line_number, kind } => {
                assert_eq!(line_number, 3);
                assert_eq!(
                    kind,
                    LibraryParseErrorKind::OrphanMarker {
                        marker: "room_bridge".to_string()
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn header_without_markers_is_kept() {
        let library = SignatureLibrary::parse("Empty\n\nFull\nroom_a\n").unwrap();
        assert!(library.get("Empty").unwrap().is_empty());
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn render_round_trips() {
        let library = SignatureLibrary::parse(SAMPLE).unwrap();
        let rendered = library.render();
        assert_eq!(rendered, SAMPLE);
        assert_eq!(SignatureLibrary::parse(&rendered).unwrap(), library);
    }

    #[test]
    fn relabel_merges_and_removes() {
        let mut library = SignatureLibrary::parse(SAMPLE).unwrap();
        let outcome = library.relabel("Aurora", "Carrack").unwrap();
        assert_eq!(
            outcome,
            RelabelOutcome::Relabeled {
                moved_tokens: 2,
                created_target: false
            }
        );
        assert!(library.get("Aurora").is_none());
        assert_eq!(
            library.get("Carrack").unwrap().tokens(),
            [
                "room_engineering",
                "room_medbay",
                "room_engineering",
                "room_cockpit",
                "room_bunk"
            ]
        );
    }

    #[test]
    fn relabel_creates_missing_target_at_end() {
        let mut library = SignatureLibrary::parse(SAMPLE).unwrap();
        let outcome = library.relabel("Carrack", "Polaris").unwrap();
        assert_eq!(
            outcome,
            RelabelOutcome::Relabeled {
                moved_tokens: 3,
                created_target: true
            }
        );
        assert_eq!(names(&library), vec!["Aurora", "Polaris"]);
    }

    #[test]
    fn relabel_into_earlier_ship_after_removal_shift() {
        let mut library = SignatureLibrary::parse("A\nroom_a\n\nB\nroom_b\n\nC\nroom_c\n").unwrap();
        library.relabel("A", "C").unwrap();
        assert_eq!(names(&library), vec!["B", "C"]);
        assert_eq!(library.get("C").unwrap().tokens(), ["room_c", "room_a"]);
        assert_eq!(library.get("B").unwrap().tokens(), ["room_b"]);
    }

    #[test]
    fn relabel_unknown_ship_is_not_found() {
        let mut library = SignatureLibrary::parse(SAMPLE).unwrap();
        let before = library.clone();
        assert_eq!(
            library.relabel("Idris", "Carrack").unwrap(),
            RelabelOutcome::NotFound
        );
        assert_eq!(library, before);
    }

    #[test]
    fn relabel_accepts_display_prefix() {
        let mut library = SignatureLibrary::parse(SAMPLE).unwrap();
        let outcome = library.relabel("(S) Aurora", "(S) Carrack").unwrap();
        assert!(outcome.is_mutation());
        assert_eq!(names(&library), vec!["Carrack"]);
    }

    #[test]
    fn relabel_onto_itself_is_unchanged() {
        let mut library = SignatureLibrary::parse(SAMPLE).unwrap();
        assert_eq!(
            library.relabel("Aurora", "(S) Aurora").unwrap(),
            RelabelOutcome::Unchanged
        );
        assert_eq!(names(&library), vec!["Carrack", "Aurora"]);
    }

    #[test]
    fn relabel_rejects_names_that_would_corrupt_the_file() {
        let mut library = SignatureLibrary::parse(SAMPLE).unwrap();
        for bad in ["", "room_bridge"] {
            let err = library.relabel("Aurora", bad).unwrap_err();
            assert!(matches!(err, LibraryError::InvalidName { .. }), "{bad:?}");
        }
        assert!(library.get("Aurora").is_some());
    }

    #[test]
    fn stats_count_ships_and_tokens() {
        let library = SignatureLibrary::parse(SAMPLE).unwrap();
        assert_eq!(
            library.stats(),
            LibraryStats {
                ships: 2,
                tokens: 5,
                distinct_tokens: 4
            }
        );
    }

    #[test]
    fn insert_rejects_non_marker_tokens() {
        let mut library = SignatureLibrary::new();
        let err = library.insert("Carrack", ["room_a", "not a marker"]).unwrap_err();
        assert!(matches!(err, LibraryError::InvalidMarker { .. }));
        assert!(library.is_empty());
        library.insert("Carrack", ["room_a", "room_a"]).unwrap();
        assert_eq!(library.get("Carrack").unwrap().len(), 2);
    }

    #[test]
    fn persist_then_load_reproduces_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shiptypes.txt");
        let library = SignatureLibrary::parse(SAMPLE).unwrap();
        library.persist(&path).unwrap();
        assert_eq!(SignatureLibrary::load(&path).unwrap(), library);
    }

    #[test]
    fn load_replaces_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shiptypes.txt");
        std::fs::write(&path, b"Carr\xffack\nroom_a\n").unwrap();
        let library = SignatureLibrary::load(&path).unwrap();
        assert_eq!(names(&library), vec!["Carr\u{fffd}ack"]);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SignatureLibrary::load(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, LibraryError::Read { .. }));
    }
}
