//! Loading and querying the network whitelist.

use std::collections::BTreeMap;
use std::path::Path;

use cell_coverage_models::Plmn;

use crate::WhitelistError;
use crate::delimiter::{Delimiter, detect_delimiter};

/// Which rows of the reference dataset count as supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistOptions {
    /// Group tags accepted by the device profile. Compared ignoring case
    /// and whitespace.
    pub accepted_groups: Vec<String>,
    /// Header name of the identifier column. When both column names are
    /// set and found in the header row, rows are read by column; otherwise
    /// every cell of each row is scanned.
    pub identifier_column: Option<String>,
    /// Header name of the group column.
    pub group_column: Option<String>,
}

impl Default for WhitelistOptions {
    fn default() -> Self {
        Self {
            accepted_groups: vec!["US 2".to_string(), "EU 2".to_string()],
            identifier_column: None,
            group_column: None,
        }
    }
}

/// Counters from a load.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Delimiter the dataset was parsed with.
    pub delimiter: Delimiter,
    /// Data rows read (header excluded when columns are named).
    pub rows_read: u64,
    /// Rows with no usable identifier or no accepted group.
    pub rows_skipped: u64,
    /// Distinct identifiers in the whitelist.
    pub entries: usize,
}

/// How identifier and group are located within a row.
#[derive(Debug, Clone, Copy)]
enum RowLayout {
    Columns { identifier: usize, group: usize },
    Scan,
}

/// Canonical identifiers of supported networks, each with the group tag it
/// was listed under.
#[derive(Debug, Clone, Default)]
pub struct PlmnWhitelist {
    entries: BTreeMap<Plmn, String>,
    stats: LoadStats,
}

impl PlmnWhitelist {
    /// A whitelist that supports nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a whitelist directly from canonical identifiers.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (Plmn, String)>) -> Self {
        let mut map = BTreeMap::new();
        for (plmn, group) in entries {
            map.entry(plmn).or_insert(group);
        }
        let stats = LoadStats {
            entries: map.len(),
            ..LoadStats::default()
        };
        Self {
            entries: map,
            stats,
        }
    }

    /// Reads and parses the dataset at `path`.
    ///
    /// # Errors
    ///
    /// * [`WhitelistError::Io`] if the file cannot be read.
    /// * [`WhitelistError::Csv`] if the header row cannot be parsed.
    pub fn from_path(path: &Path, options: &WhitelistOptions) -> Result<Self, WhitelistError> {
        log::info!("Loading whitelist from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| WhitelistError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_text(&text, options)
    }

    /// Parses delimited text.
    ///
    /// The delimiter is detected from the text. Rows without a 5 or 6 digit
    /// identifier or an accepted group are skipped. An empty result is not
    /// an error here; see [`Self::ensure_populated`].
    ///
    /// # Errors
    ///
    /// Returns [`WhitelistError::Csv`] if the header row cannot be parsed
    /// when column names are configured.
    pub fn from_text(text: &str, options: &WhitelistOptions) -> Result<Self, WhitelistError> {
        let delimiter = detect_delimiter(text);
        log::info!("Detected whitelist delimiter: {delimiter}");

        let accepted: Vec<String> = options
            .accepted_groups
            .iter()
            .map(|g| normalize_group(g))
            .filter(|g| !g.is_empty())
            .collect();

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter.as_byte())
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let mut records = reader.records();

        let mut layout = RowLayout::Scan;
        if let (Some(id_name), Some(group_name)) =
            (&options.identifier_column, &options.group_column)
            && let Some(header) = records.next()
        {
            let header = header?;
            let find = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));
            if let (Some(identifier), Some(group)) = (find(id_name), find(group_name)) {
                log::debug!("Reading whitelist by column: {id_name}={identifier}, {group_name}={group}");
                layout = RowLayout::Columns { identifier, group };
            } else {
                log::warn!(
                    "Whitelist header lacks '{id_name}' or '{group_name}'; scanning rows instead"
                );
            }
        }

        let mut entries = BTreeMap::new();
        let mut rows_read = 0u64;
        let mut rows_skipped = 0u64;

        for result in records {
            rows_read += 1;
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    log::trace!("Skipping malformed whitelist row: {e}");
                    rows_skipped += 1;
                    continue;
                }
            };

            let matched = match layout {
                RowLayout::Columns { identifier, group } => {
                    match (record.get(identifier), record.get(group)) {
                        (Some(id), Some(group)) if is_accepted_group(group, &accepted) => {
                            Plmn::canonicalize(id).map(|plmn| (plmn, group))
                        }
                        _ => None,
                    }
                }
                RowLayout::Scan => scan_row(&record, &accepted),
            };

            if let Some((plmn, group)) = matched {
                entries.entry(plmn).or_insert_with(|| group.to_string());
            } else {
                rows_skipped += 1;
            }
        }

        let stats = LoadStats {
            delimiter,
            rows_read,
            rows_skipped,
            entries: entries.len(),
        };

        log::info!(
            "Loaded {} PLMNs from {rows_read} rows ({rows_skipped} skipped)",
            entries.len()
        );
        if entries.is_empty() {
            log::warn!(
                "Whitelist ended up empty; check the dataset structure and group values {:?}",
                options.accepted_groups
            );
        }

        Ok(Self { entries, stats })
    }

    /// Whether `plmn` is on the whitelist.
    #[must_use]
    pub fn is_supported(&self, plmn: &Plmn) -> bool {
        self.entries.contains_key(plmn)
    }

    /// Whether the network with numeric codes `mcc`/`mnc` is on the
    /// whitelist.
    #[must_use]
    pub fn is_supported_parts(&self, mcc: u16, mnc: u16) -> bool {
        Plmn::from_parts(mcc, mnc).is_some_and(|plmn| self.is_supported(&plmn))
    }

    /// Group tag `plmn` was listed under.
    #[must_use]
    pub fn group_of(&self, plmn: &Plmn) -> Option<&str> {
        self.entries.get(plmn).map(String::as_str)
    }

    /// Number of whitelisted identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is whitelisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters from the load that built this whitelist.
    #[must_use]
    pub const fn stats(&self) -> &LoadStats {
        &self.stats
    }

    /// Entries in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&Plmn, &str)> {
        self.entries.iter().map(|(plmn, group)| (plmn, group.as_str()))
    }

    /// Returns `self` if at least one identifier is whitelisted.
    ///
    /// # Errors
    ///
    /// Returns [`WhitelistError::Empty`] for an empty whitelist.
    pub fn ensure_populated(&self) -> Result<&Self, WhitelistError> {
        if self.is_empty() {
            return Err(WhitelistError::Empty {
                rows_read: self.stats.rows_read,
            });
        }
        Ok(self)
    }
}

/// Finds the first all-digit 5-6 character cell and the first cell that
/// is an accepted group.
fn scan_row<'a>(record: &'a csv::StringRecord, accepted: &[String]) -> Option<(Plmn, &'a str)> {
    let identifier = record
        .iter()
        .find(|cell| (5..=6).contains(&cell.len()) && cell.bytes().all(|b| b.is_ascii_digit()))?;
    let group = record.iter().find(|cell| is_accepted_group(cell, accepted))?;
    Some((Plmn::canonicalize(identifier)?, group))
}

/// Whole-cell match after normalization, so `US 21` is not `US 2`.
fn is_accepted_group(cell: &str, accepted: &[String]) -> bool {
    let normalized = normalize_group(cell);
    accepted.iter().any(|g| *g == normalized)
}

/// Uppercases and strips whitespace so `us 2`, `US2` and `US  2` compare
/// equal.
fn normalize_group(group: &str) -> String {
    group
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn plmn(s: &str) -> Plmn {
        Plmn::canonicalize(s).unwrap()
    }

    const TSV: &str = "Operator\tMCCMNC\tIMSI Provider\n\
                       AT&T\t310410\tUS 2\n\
                       T-Mobile\t31026\tus2\n\
                       Vodafone DE\t26202\tEU  2\n\
                       Other\t310999\tUS 1\n\
                       \t\t\n\
                       Broken\t31\tUS 2\n";

    #[test]
    fn scans_rows_for_identifier_and_group() {
        let wl = PlmnWhitelist::from_text(TSV, &WhitelistOptions::default()).unwrap();

        assert_eq!(wl.stats().delimiter, Delimiter::Tab);
        assert_eq!(wl.len(), 3);
        assert!(wl.is_supported(&plmn("310410")));
        assert!(wl.is_supported(&plmn("310026")));
        assert!(wl.is_supported(&plmn("262002")));
        assert!(!wl.is_supported(&plmn("310999")));
        assert_eq!(wl.group_of(&plmn("262002")), Some("EU  2"));
    }

    #[test]
    fn five_digit_identifier_is_padded() {
        let wl = PlmnWhitelist::from_text("31026,US 2\n", &WhitelistOptions::default()).unwrap();
        assert!(wl.is_supported_parts(310, 26));
        assert!(wl.is_supported(&plmn("310026")));
        assert!(!wl.is_supported(&plmn("310260")));
    }

    #[test]
    fn numeric_parts_lookup() {
        let wl = PlmnWhitelist::from_text("310410,US 2\n", &WhitelistOptions::default()).unwrap();
        assert!(wl.is_supported_parts(310, 410));
        assert!(!wl.is_supported_parts(310, 260));
        assert!(!wl.is_supported_parts(1000, 410));
    }

    #[test]
    fn counts_skipped_rows() {
        let wl = PlmnWhitelist::from_text(TSV, &WhitelistOptions::default()).unwrap();
        let stats = wl.stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.rows_read - stats.rows_skipped, 3);
        assert!(stats.rows_skipped >= 3);
    }

    #[test]
    fn duplicate_rows_keep_first_group() {
        let text = "310410,US 2\n310410,EU 2\n";
        let wl = PlmnWhitelist::from_text(text, &WhitelistOptions::default()).unwrap();
        assert_eq!(wl.len(), 1);
        assert_eq!(wl.group_of(&plmn("310410")), Some("US 2"));
    }

    #[test]
    fn reads_named_columns() {
        let text = "mccmnc,note,group\n310410,see US 2 docs,US 1\n310260,,US 2\n";
        let options = WhitelistOptions {
            identifier_column: Some("MCCMNC".to_string()),
            group_column: Some("Group".to_string()),
            ..WhitelistOptions::default()
        };
        let wl = PlmnWhitelist::from_text(text, &options).unwrap();

        assert_eq!(wl.len(), 1);
        assert!(wl.is_supported(&plmn("310260")));
        assert!(!wl.is_supported(&plmn("310410")));
        assert_eq!(wl.stats().rows_read, 2);
    }

    #[test]
    fn group_tags_match_whole_cells_in_both_layouts() {
        let rows = "310410,US 21\n310260,BUS 2 Networks\n310120,us 2\n";
        let scanned = PlmnWhitelist::from_text(rows, &WhitelistOptions::default()).unwrap();

        let options = WhitelistOptions {
            identifier_column: Some("id".to_string()),
            group_column: Some("group".to_string()),
            ..WhitelistOptions::default()
        };
        let by_column = PlmnWhitelist::from_text(&format!("id,group\n{rows}"), &options).unwrap();

        for wl in [&scanned, &by_column] {
            assert_eq!(wl.len(), 1);
            assert!(wl.is_supported(&plmn("310120")));
            assert!(!wl.is_supported(&plmn("310410")));
            assert!(!wl.is_supported(&plmn("310260")));
        }
    }

    #[test]
    fn missing_named_columns_falls_back_to_scan() {
        let text = "a,b\n310410,US 2\n";
        let options = WhitelistOptions {
            identifier_column: Some("MCCMNC".to_string()),
            group_column: Some("Group".to_string()),
            ..WhitelistOptions::default()
        };
        let wl = PlmnWhitelist::from_text(text, &options).unwrap();
        assert!(wl.is_supported(&plmn("310410")));
    }

    #[test]
    fn custom_groups() {
        let options = WhitelistOptions {
            accepted_groups: vec!["Tier A".to_string()],
            ..WhitelistOptions::default()
        };
        let wl = PlmnWhitelist::from_text("310410,TIERA\n310260,US 2\n", &options).unwrap();
        assert_eq!(wl.len(), 1);
        assert!(wl.is_supported(&plmn("310410")));
    }

    #[test]
    fn empty_whitelist_is_reported() {
        let wl = PlmnWhitelist::from_text("310410,US 1\n", &WhitelistOptions::default()).unwrap();
        assert!(wl.is_empty());
        assert!(matches!(
            wl.ensure_populated(),
            Err(WhitelistError::Empty { rows_read: 1 })
        ));
        assert!(PlmnWhitelist::empty().ensure_populated().is_err());
    }

    #[test]
    fn from_entries_builds_directly() {
        let wl = PlmnWhitelist::from_entries([(plmn("310410"), "US 2".to_string())]);
        assert!(wl.is_supported(&plmn("310410")));
        assert_eq!(wl.stats().entries, 1);
        assert!(wl.ensure_populated().is_ok());
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!(
            "cell_coverage_whitelist_{}.csv",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "MCCMNC,Group").unwrap();
        writeln!(file, "310410,US 2").unwrap();
        drop(file);

        let wl = PlmnWhitelist::from_path(&path, &WhitelistOptions::default()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(wl.len(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PlmnWhitelist::from_path(
            Path::new("/nonexistent/whitelist.csv"),
            &WhitelistOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, WhitelistError::Io { .. }));
    }
}
