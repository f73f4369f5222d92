use indexmap::IndexMap;
use log::{debug, trace};

use super::model::{Record, Value, METADATA_KEY};
use crate::error::{Error, Result};

/// Lowest level a `# ... Done` line can ascend to.
///
/// Only an annotated header (`# ...` followed by `<...>`) reopens level 0,
/// so once inside a section a `Done` line stops at level 1.
pub const DONE_LEVEL_FLOOR: usize = 1;

const SECTION_MARKER: &str = "# ";
const SECTION_END: &str = "Done";
const SECTION_BEGIN: &str = "Begin ";

/// Decoder configuration.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Floor applied when a `Done` line ascends one level.
    pub done_floor: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            done_floor: DONE_LEVEL_FLOOR,
        }
    }
}

/// Turns save file text into a [`Record`].
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

/// Decode with the default configuration.
pub fn decode(text: &str) -> Result<Record> {
    Decoder::new().decode(text)
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Line<'a> {
    SectionEnd,
    SectionStart(&'a str),
    Entry(&'a str, &'a str),
    Other,
}

fn classify(line: &str) -> Line<'_> {
    if let Some(rest) = line.strip_prefix(SECTION_MARKER) {
        if line.ends_with(SECTION_END) {
            return Line::SectionEnd;
        }
        let name = rest.strip_prefix(SECTION_BEGIN).unwrap_or(rest);
        return Line::SectionStart(name.trim());
    }
    if line.matches('=').count() == 1 {
        if let Some((key, value)) = line.split_once('=') {
            return Line::Entry(key, value);
        }
    }
    Line::Other
}

/// `<...>` line directly under a header: marks a new top-level section.
fn is_annotation(line: &str) -> bool {
    line.starts_with('<') && line.ends_with('>')
}

// ---------------------------------------------------------------------------
// Cursor – arena of open sections plus the parent stack
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Slot {
    Scalar(String),
    Section(usize),
}

#[derive(Debug, Default)]
struct Node {
    entries: IndexMap<String, Slot>,
}

/// Transient decode state.
///
/// `stack[d]` is the arena index of the section writes at level `d` land
/// in. `stack[d + 1]` exists only while the last key of `stack[d]` holds a
/// section, which is what "write into the most recent child" means.
struct Cursor {
    nodes: Vec<Node>,
    stack: Vec<usize>,
    level: usize,
}

impl Cursor {
    fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            stack: vec![0],
            level: 0,
        }
    }

    fn open_section(&mut self, line: usize, name: &str) -> Result<()> {
        let id = self.nodes.len();
        self.nodes.push(Node::default());
        self.insert(line, name, Slot::Section(id))?;
        self.level += 1;
        debug!("line {line}: opened section '{name}', level now {}", self.level);
        Ok(())
    }

    fn insert(&mut self, line: usize, key: &str, slot: Slot) -> Result<()> {
        let level = self.level;
        let Some(&parent) = self.stack.get(level) else {
            return Err(Error::Nesting { line, level });
        };
        let section = match &slot {
            Slot::Section(id) => Some(*id),
            Slot::Scalar(_) => None,
        };

        let entries = &mut self.nodes[parent].entries;
        let (index, _) = entries.insert_full(key.to_string(), slot);

        // Overwriting an earlier key keeps its position and leaves the
        // chain of most recent children untouched.
        if index + 1 == entries.len() {
            self.stack.truncate(level + 1);
            if let Some(id) = section {
                self.stack.push(id);
            }
        }
        Ok(())
    }

    /// Fold the arena into a tree. Children always sit at higher indices
    /// than their parent, so walking backwards builds them first.
    fn into_record(self) -> Record {
        let mut built: Vec<Option<Record>> = Vec::with_capacity(self.nodes.len());
        built.resize_with(self.nodes.len(), || None);

        for (id, node) in self.nodes.into_iter().enumerate().rev() {
            let record: Record = node
                .entries
                .into_iter()
                .map(|(key, slot)| {
                    let value = match slot {
                        Slot::Scalar(s) => Value::Scalar(s),
                        Slot::Section(child) => {
                            Value::Nested(built[child].take().unwrap_or_default())
                        }
                    };
                    (key, value)
                })
                .collect();
            built[id] = Some(record);
        }

        built
            .into_iter()
            .next()
            .flatten()
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a whole save file.
    ///
    /// Single forward pass. Structure comes only from line markers:
    /// * `# ... Done` ascends one level (never below `done_floor`)
    /// * `# [Begin ]name` opens a section at the current level and descends;
    ///   when the next line is a `<...>` annotation it is skipped and the
    ///   section is opened at level 0
    /// * `key=value` (exactly one `=`) is written at the current level
    /// * anything else is ignored
    ///
    /// Afterwards empty top-level sections are dropped and top-level
    /// scalars are gathered under [`METADATA_KEY`].
    pub fn decode(&self, text: &str) -> Result<Record> {
        let mut cursor = Cursor::new();
        let mut lines = text.lines().enumerate().peekable();

        while let Some((i, line)) = lines.next() {
            let line_no = i + 1;
            match classify(line) {
                Line::SectionEnd => {
                    cursor.level = cursor.level.saturating_sub(1).max(self.config.done_floor);
                    debug!("line {line_no}: section closed, level now {}", cursor.level);
                }
                Line::SectionStart(name) => {
                    if lines.next_if(|(_, next)| is_annotation(next)).is_some() {
                        debug!("line {line_no}: annotated header, resetting to level 0");
                        cursor.level = 0;
                    }
                    cursor.open_section(line_no, name)?;
                }
                Line::Entry(key, value) => {
                    trace!("line {line_no}: {key}={value} at level {}", cursor.level);
                    cursor.insert(line_no, key, Slot::Scalar(value.to_string()))?;
                }
                Line::Other => {}
            }
        }

        finish(cursor.into_record())
    }
}

/// Drop empty top-level sections and move top-level scalars under
/// `METADATA`, which becomes the first key. Nested empty sections stay.
///
/// A populated top-level section named `METADATA` would collide with the
/// scalar map and is rejected with [`Error::ReservedKey`].
fn finish(root: Record) -> Result<Record> {
    let mut metadata = Record::new();
    let mut sections = Vec::new();

    for (key, value) in root {
        match value {
            Value::Scalar(_) => {
                metadata.insert(key, value);
            }
            _ if value.is_empty_record() => {
                debug!("dropping empty section '{key}'");
            }
            Value::Nested(_) if key == METADATA_KEY => {
                return Err(Error::ReservedKey { key });
            }
            Value::Nested(_) => sections.push((key, value)),
        }
    }

    let mut record = Record::with_capacity(sections.len() + 1);
    if metadata.is_empty() && sections.is_empty() {
        return Ok(record);
    }
    record.insert(METADATA_KEY.to_string(), Value::Nested(metadata));
    record.extend(sections);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section<'a>(record: &'a Record, key: &str) -> &'a Record {
        record
            .get(key)
            .and_then(Value::as_record)
            .unwrap_or_else(|| panic!("missing section {key}"))
    }

    fn keys(record: &Record) -> Vec<&str> {
        record.keys().map(String::as_str).collect()
    }

    #[test]
    fn classify_lines() {
        assert_eq!(classify("# Trace Done"), Line::SectionEnd);
        assert_eq!(classify("# Begin Trace"), Line::SectionStart("Trace"));
        assert_eq!(classify("# Setup"), Line::SectionStart("Setup"));
        assert_eq!(classify("Model=MS2723B"), Line::Entry("Model", "MS2723B"));
        assert_eq!(classify("a=b=c"), Line::Other);
        assert_eq!(classify("#Setup"), Line::Other);
        assert_eq!(classify(""), Line::Other);
    }

    #[test]
    fn begin_token_is_a_token_not_a_character_set() {
        // "Trace" ends in 'e', which must survive.
        assert_eq!(classify("# Begin Trace"), Line::SectionStart("Trace"));
        assert_eq!(classify("# Beginning"), Line::SectionStart("Beginning"));
    }

    #[test]
    fn metadata_only() {
        let record = decode("Model=MS2723B\nFreq=Unknown\n").unwrap();
        assert_eq!(keys(&record), vec![METADATA_KEY]);
        let meta = section(&record, METADATA_KEY);
        assert_eq!(meta.get("Model"), Some(&Value::from("MS2723B")));
        assert_eq!(meta.get("Freq"), Some(&Value::from("Unknown")));
    }

    #[test]
    fn nested_trace_section() {
        let text = "Model=MS2723B\n# Begin Trace\nP_0=-42.1 , 100.0 MHz\nP_1=-40.3 , 100.1 MHz\n# Trace Done\n";
        let record = decode(text).unwrap();
        assert_eq!(keys(&record), vec![METADATA_KEY, "Trace"]);
        let trace = section(&record, "Trace");
        assert_eq!(keys(trace), vec!["P_0", "P_1"]);
        assert_eq!(trace.get("P_1"), Some(&Value::from("-40.3 , 100.1 MHz")));
    }

    #[test]
    fn entry_without_parent_is_a_nesting_error() {
        let err = decode("# Trace Done\nA=B\n").unwrap_err();
        assert!(matches!(err, Error::Nesting { line: 2, level: 1 }));
    }

    #[test]
    fn done_stops_at_level_one() {
        // After "Done" the next header still nests inside Outer.
        let text = "# Begin Outer\nA=1\n# Outer Done\n# Begin Inner\nB=2\n";
        let record = decode(text).unwrap();
        assert_eq!(keys(&record), vec![METADATA_KEY, "Outer"]);
        let outer = section(&record, "Outer");
        assert_eq!(keys(outer), vec!["A", "Inner"]);
        assert_eq!(section(outer, "Inner").get("B"), Some(&Value::from("2")));
    }

    #[test]
    fn done_floor_zero_returns_to_root() {
        let decoder = Decoder::with_config(DecoderConfig { done_floor: 0 });
        let text = "# Begin Outer\nA=1\n# Outer Done\n# Begin Inner\nB=2\n";
        let record = decoder.decode(text).unwrap();
        assert_eq!(keys(&record), vec![METADATA_KEY, "Outer", "Inner"]);
    }

    #[test]
    fn annotation_resets_to_root() {
        let text = "\
# Begin Setup
<Setup>
# Begin Deep
# Begin Deeper
X=1
# Begin Trace
<Trace>
P_0=-1 , 2 MHz
";
        let record = decode(text).unwrap();
        assert_eq!(keys(&record), vec![METADATA_KEY, "Setup", "Trace"]);
        let deeper = section(section(section(&record, "Setup"), "Deep"), "Deeper");
        assert_eq!(keys(deeper), vec!["X"]);
        assert_eq!(keys(section(&record, "Trace")), vec!["P_0"]);
    }

    #[test]
    fn annotation_line_is_consumed() {
        let record = decode("# Begin Trace\n<a=b>\nP_0=1 , 2 Hz\n").unwrap();
        assert_eq!(keys(section(&record, "Trace")), vec!["P_0"]);
    }

    #[test]
    fn empty_sections_are_pruned() {
        let text = "# Begin Empty\n<x>\n# Begin Full\n<y>\nA=1\n";
        let record = decode(text).unwrap();
        assert_eq!(keys(&record), vec![METADATA_KEY, "Full"]);
    }

    #[test]
    fn nested_empty_sections_are_kept() {
        let text = "# Begin Setup\n<s>\n# Begin Empty\n# Empty Done\nA=1\n";
        let record = decode(text).unwrap();
        let setup = section(&record, "Setup");
        assert_eq!(keys(setup), vec!["Empty", "A"]);
        assert!(section(setup, "Empty").is_empty());
    }

    #[test]
    fn section_named_metadata_is_rejected() {
        let text = "Model=MS2723B\n# Begin METADATA\n<m>\nSerial=123\n# METADATA Done\n";
        let err = decode(text).unwrap_err();
        assert!(matches!(err, Error::ReservedKey { ref key } if key == METADATA_KEY));
    }

    #[test]
    fn empty_section_named_metadata_is_just_pruned() {
        let record = decode("Model=MS2723B\n# Begin METADATA\n<m>\n").unwrap();
        assert_eq!(keys(section(&record, METADATA_KEY)), vec!["Model"]);
    }

    #[test]
    fn metadata_goes_first_even_when_written_last() {
        let text = "# Begin Trace\n<t>\nP_0=1 , 2 Hz\n# Begin Info\n<i>\nA=1\n# Info Done\n";
        let record = decode(text).unwrap();
        assert_eq!(keys(&record), vec![METADATA_KEY, "Trace", "Info"]);
        assert!(section(&record, METADATA_KEY).is_empty());
    }

    #[test]
    fn late_top_level_scalars_join_metadata() {
        let text = "A=1\n# Begin S\n<s>\nB=2\n# Begin T\n<t>\nC=3\n";
        let record = decode(text).unwrap();
        assert_eq!(keys(&record), vec![METADATA_KEY, "S", "T"]);
        let meta = section(&record, METADATA_KEY);
        assert_eq!(keys(meta), vec!["A"]);
    }

    #[test]
    fn header_as_last_line_opens_an_empty_section() {
        let record = decode("A=1\n# Begin Tail").unwrap();
        assert_eq!(keys(&record), vec![METADATA_KEY]);
    }

    #[test]
    fn overwritten_key_keeps_its_slot() {
        let text = "# Begin S\n<s>\nA=1\nB=2\nA=3\n";
        let record = decode(text).unwrap();
        let s = section(&record, "S");
        assert_eq!(keys(s), vec!["A", "B"]);
        assert_eq!(s.get("A"), Some(&Value::from("3")));
    }

    #[test]
    fn scalar_after_section_blocks_deeper_writes() {
        // Once a scalar is the most recent key there is no child to write into.
        let mut cursor = Cursor::new();
        cursor.open_section(1, "S").unwrap();
        cursor.level = 0;
        cursor.insert(2, "A", Slot::Scalar("1".into())).unwrap();
        cursor.level = 1;
        let err = cursor.insert(3, "B", Slot::Scalar("2".into())).unwrap_err();
        assert!(matches!(err, Error::Nesting { line: 3, level: 1 }));
    }

    #[test]
    fn crlf_line_endings() {
        let text = "Model=MS2723B\r\n# Begin Trace\r\nP_0=-1 , 2 MHz\r\n# Trace Done\r\n";
        let record = decode(text).unwrap();
        assert_eq!(keys(&record), vec![METADATA_KEY, "Trace"]);
    }

    #[test]
    fn empty_input_gives_empty_record() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("just text\n\n").unwrap().is_empty());
    }
}
