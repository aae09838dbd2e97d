//! Loading versioned rule files into validated guidelines.
//!
//! Layout on disk:
//!
//! ```text
//! <data_dir>/<year>/offenses/*.json
//! <data_dir>/<year>/chapter3-adjustments.json
//! ```
//!
//! Each offense file maps section codes to guideline records. A record that
//! fails to convert or validate is kept aside as a [`RejectedGuideline`];
//! the rest of the book still loads.

mod normalizer;
mod parser;

use crate::workflows::offense_level::domain::{
    Adjustment, AdjustmentScope, EngineError, GuidelineYear, OffenseCode,
};
use crate::workflows::offense_level::Guideline;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use normalizer::normalize_offense_code;

const OFFENSES_DIR: &str = "offenses";
const CHAPTER_THREE_FILE: &str = "chapter3-adjustments.json";
const CHAPTER_THREE_CITATION: &str = "Chapter Three";

#[derive(Debug)]
pub enum RuleBookError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        origin: String,
        source: serde_json::Error,
    },
    NoEditions {
        dir: PathBuf,
    },
    InvalidYear {
        name: String,
    },
    UnsupportedQuestionType {
        offense: OffenseCode,
        year: GuidelineYear,
        id: String,
        kind: String,
    },
    MissingEffect {
        offense: OffenseCode,
        year: GuidelineYear,
        id: String,
        field: &'static str,
    },
    /// A level effect this loader cannot apply faithfully.
    UnsupportedEffect {
        offense: OffenseCode,
        year: GuidelineYear,
        id: String,
        detail: String,
    },
    Malformed(EngineError),
    UnknownGuideline {
        year: GuidelineYear,
        offense: OffenseCode,
    },
}

impl std::fmt::Display for RuleBookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleBookError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            RuleBookError::Json { origin, source } => {
                write!(f, "invalid rule data in {}: {}", origin, source)
            }
            RuleBookError::NoEditions { dir } => {
                write!(f, "no guideline year directories found in {}", dir.display())
            }
            RuleBookError::InvalidYear { name } => {
                write!(f, "'{}' is not a valid guideline year", name)
            }
            RuleBookError::UnsupportedQuestionType {
                offense,
                year,
                id,
                kind,
            } => write!(
                f,
                "§{} ({}): '{}' has unsupported type '{}'",
                offense, year, id, kind
            ),
            RuleBookError::MissingEffect {
                offense,
                year,
                id,
                field,
            } => write!(f, "§{} ({}): '{}' is missing {}", offense, year, id, field),
            RuleBookError::UnsupportedEffect {
                offense,
                year,
                id,
                detail,
            } => write!(f, "§{} ({}): '{}' {}", offense, year, id, detail),
            RuleBookError::Malformed(err) => write!(f, "{}", err),
            RuleBookError::UnknownGuideline { year, offense } => {
                write!(f, "no {} guideline is loaded for §{}", year, offense)
            }
        }
    }
}

impl std::error::Error for RuleBookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuleBookError::Io { source, .. } => Some(source),
            RuleBookError::Json { source, .. } => Some(source),
            RuleBookError::Malformed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EngineError> for RuleBookError {
    fn from(err: EngineError) -> Self {
        Self::Malformed(err)
    }
}

/// A guideline that failed to load, with the reason it was set aside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedGuideline {
    pub year: GuidelineYear,
    pub offense: OffenseCode,
    pub reason: String,
}

/// Listing entry for one loaded edition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuidelineSummary {
    pub year: GuidelineYear,
    pub offense: OffenseCode,
    pub title: String,
    pub citation: String,
    pub questions: usize,
    pub characteristics: usize,
    pub chapter_adjustments: usize,
}

impl GuidelineSummary {
    fn of(guideline: &Guideline) -> Self {
        Self {
            year: guideline.year(),
            offense: guideline.offense().clone(),
            title: guideline.title().to_string(),
            citation: guideline.citation().to_string(),
            questions: guideline.questions().len(),
            characteristics: guideline.characteristics().len(),
            chapter_adjustments: guideline.chapter_adjustments().len(),
        }
    }
}

/// Every loaded edition, keyed by offense and then year.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    editions: BTreeMap<OffenseCode, BTreeMap<GuidelineYear, Arc<Guideline>>>,
    rejected: Vec<RejectedGuideline>,
}

impl RuleBook {
    pub fn builder() -> RuleBookBuilder {
        RuleBookBuilder::default()
    }

    /// Load every `<year>` directory under `dir`. Directories whose names
    /// are not all digits are ignored.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, RuleBookError> {
        let dir = dir.as_ref();
        let mut builder = Self::builder();
        let mut found = false;

        for (year, year_dir) in year_dirs(dir)? {
            found = true;
            info!(year, dir = %year_dir.display(), "loading guideline year");

            let chapter_three = year_dir.join(CHAPTER_THREE_FILE);
            if chapter_three.is_file() {
                builder = builder.chapter_three_reader(
                    year,
                    &chapter_three.display().to_string(),
                    open(&chapter_three)?,
                )?;
            } else {
                warn!(
                    year,
                    "no {} found; chapter three adjustments will be empty", CHAPTER_THREE_FILE
                );
            }

            let offenses_dir = year_dir.join(OFFENSES_DIR);
            if !offenses_dir.is_dir() {
                warn!(year, "no offenses directory found");
                continue;
            }
            for path in json_files(&offenses_dir)? {
                debug!(year, file = %path.display(), "reading offense file");
                let origin = path.display().to_string();
                builder = builder.offenses_reader(year, &origin, open(&path)?)?;
            }
        }

        if !found {
            return Err(RuleBookError::NoEditions {
                dir: dir.to_path_buf(),
            });
        }

        let book = builder.build();
        info!(
            editions = book.len(),
            rejected = book.rejected.len(),
            "rule book loaded"
        );
        Ok(book)
    }

    pub fn guideline(
        &self,
        year: GuidelineYear,
        offense: &OffenseCode,
    ) -> Result<Arc<Guideline>, RuleBookError> {
        self.editions
            .get(offense)
            .and_then(|years| years.get(&year))
            .cloned()
            .ok_or_else(|| RuleBookError::UnknownGuideline {
                year,
                offense: offense.clone(),
            })
    }

    /// All loaded years for one offense; empty when the offense is unknown.
    pub fn editions(&self, offense: &OffenseCode) -> BTreeMap<GuidelineYear, Arc<Guideline>> {
        self.editions.get(offense).cloned().unwrap_or_default()
    }

    pub fn years(&self) -> BTreeSet<GuidelineYear> {
        self.editions
            .values()
            .flat_map(|years| years.keys().copied())
            .collect()
    }

    pub fn offenses(&self, year: GuidelineYear) -> Vec<&OffenseCode> {
        self.editions
            .iter()
            .filter(|(_, years)| years.contains_key(&year))
            .map(|(offense, _)| offense)
            .collect()
    }

    pub fn summaries(&self) -> Vec<GuidelineSummary> {
        let mut summaries: Vec<_> = self
            .editions
            .values()
            .flat_map(|years| years.values())
            .map(|guideline| GuidelineSummary::of(guideline))
            .collect();
        summaries.sort_by(|a, b| a.year.cmp(&b.year).then_with(|| a.offense.cmp(&b.offense)));
        summaries
    }

    pub fn rejected(&self) -> &[RejectedGuideline] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.editions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.editions.is_empty()
    }
}

/// Collects rule files for any number of years, then validates them.
///
/// Chapter three adjustments are shared by every offense of the same year,
/// so conversion waits for [`RuleBookBuilder::build`].
#[derive(Debug, Default)]
pub struct RuleBookBuilder {
    chapter_three: BTreeMap<GuidelineYear, Vec<Adjustment>>,
    offenses: Vec<(GuidelineYear, String, parser::OffenseRecord)>,
}

impl RuleBookBuilder {
    /// Chapter three records must all convert; one bad record fails the year.
    pub fn chapter_three_reader<R: Read>(
        mut self,
        year: GuidelineYear,
        origin: &str,
        reader: R,
    ) -> Result<Self, RuleBookError> {
        let file = parser::parse_chapter_three(origin, reader)?;
        let offense = OffenseCode::from(CHAPTER_THREE_CITATION);
        let adjustments = file
            .adjustments
            .into_iter()
            .map(|record| {
                record.into_adjustment(
                    AdjustmentScope::ChapterWide,
                    CHAPTER_THREE_CITATION,
                    &offense,
                    year,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(year, count = adjustments.len(), "chapter three adjustments read");
        self.chapter_three.insert(year, adjustments);
        Ok(self)
    }

    pub fn offenses_reader<R: Read>(
        mut self,
        year: GuidelineYear,
        origin: &str,
        reader: R,
    ) -> Result<Self, RuleBookError> {
        let file = parser::parse_offense_file(origin, reader)?;
        self.offenses
            .extend(file.into_iter().map(|(key, record)| (year, key, record)));
        Ok(self)
    }

    pub fn build(self) -> RuleBook {
        let mut book = RuleBook::default();

        for (year, key, record) in self.offenses {
            let offense = record.offense_code(&key);
            let chapter_adjustments = self.chapter_three.get(&year).cloned().unwrap_or_default();

            let loaded = record
                .into_draft(&key, year, chapter_adjustments)
                .and_then(|draft| Guideline::new(draft).map_err(RuleBookError::from));

            match loaded {
                Ok(guideline) => {
                    let years = book.editions.entry(offense.clone()).or_default();
                    if years.contains_key(&year) {
                        warn!(%offense, year, "duplicate guideline; keeping the first definition");
                        book.rejected.push(RejectedGuideline {
                            year,
                            offense,
                            reason: "defined more than once for this year".to_string(),
                        });
                        continue;
                    }
                    years.insert(year, Arc::new(guideline));
                }
                Err(err) => {
                    warn!(%offense, year, error = %err, "guideline rejected");
                    book.rejected.push(RejectedGuideline {
                        year,
                        offense,
                        reason: err.to_string(),
                    });
                }
            }
        }

        book
    }
}

fn open(path: &Path) -> Result<fs::File, RuleBookError> {
    fs::File::open(path).map_err(|source| RuleBookError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, RuleBookError> {
    let io_err = |source| RuleBookError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    paths.sort();
    Ok(paths)
}

fn year_dirs(dir: &Path) -> Result<Vec<(GuidelineYear, PathBuf)>, RuleBookError> {
    let mut years = Vec::new();
    for path in read_dir(dir)? {
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let year = name.parse::<GuidelineYear>().map_err(|_| RuleBookError::InvalidYear {
            name: name.to_string(),
        })?;
        years.push((year, path));
    }
    Ok(years)
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, RuleBookError> {
    Ok(read_dir(dir)?
        .into_iter()
        .filter(|path| {
            path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("json")
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::offense_level::domain::{AnswerSheet, AnswerValue, StructuralDefect};
    use crate::workflows::offense_level::evaluate;
    use std::io::Cursor;

    const CHAPTER_THREE: &str = r#"{ "adjustments": [
        { "id": "ch3_obstruction", "text": "Did the defendant obstruct justice?", "type": "yesno",
          "reference": "§3C1.1", "yesEffect": { "adjustment": 2 },
          "noEffect": { "adjustment": 0 } },
        { "id": "ch3_acceptance", "text": "Acceptance of responsibility?", "type": "select",
          "reference": "§3E1.1", "options": [
            { "id": "none", "label": "None", "adjustment": 0 },
            { "id": "three_level", "label": "3 levels", "adjustment": -3 } ] }
    ] }"#;

    const OFFENSES: &str = r#"{
        "2B1.1": { "title": "Theft", "baseOffenseQuestions": [
            { "id": "base_1", "text": "Statutory maximum 20 years or more?", "type": "yesno",
              "yesResult": { "baseLevel": 7 }, "noResult": { "baseLevel": 6 } } ] },
        "2B1.5": { "title": "Cultural Heritage", "baseOffenseQuestions": [
            { "id": "base_1", "text": "Loop?", "type": "yesno",
              "yesNext": "base_2", "noResult": { "baseLevel": 8 } } ] }
    }"#;

    fn book() -> RuleBook {
        RuleBook::builder()
            .chapter_three_reader(2025, "chapter3", Cursor::new(CHAPTER_THREE))
            .expect("chapter three")
            .offenses_reader(2025, "2B.json", Cursor::new(OFFENSES))
            .expect("offenses")
            .build()
    }

    #[test]
    fn rejected_guidelines_do_not_block_siblings() {
        let book = book();

        assert_eq!(book.len(), 1);
        let theft = book.guideline(2025, &"2B1.1".into()).expect("theft loaded");
        assert_eq!(theft.chapter_adjustments().len(), 2);
        assert_eq!(theft.chapter_adjustments()[0].citation, "§3C1.1");

        assert_eq!(book.rejected().len(), 1);
        let rejected = &book.rejected()[0];
        assert_eq!(rejected.offense.as_str(), "2B1.5");
        assert!(rejected.reason.contains("base_2"));
    }

    #[test]
    fn malformed_guidelines_keep_their_defect() {
        let err = RuleBook::builder()
            .offenses_reader(2025, "2B.json", Cursor::new(OFFENSES))
            .expect("offenses")
            .build()
            .guideline(2025, &"2B1.5".into())
            .expect_err("rejected");

        assert!(matches!(err, RuleBookError::UnknownGuideline { .. }));

        let draft = parser::parse_offense_file("2B.json", Cursor::new(OFFENSES))
            .expect("parse")
            .remove("2B1.5")
            .expect("record")
            .into_draft("2B1.5", 2025, Vec::new())
            .expect("draft");
        assert!(matches!(
            Guideline::new(draft),
            Err(EngineError::MalformedGuideline {
                defect: StructuralDefect::DanglingEdge { .. },
                ..
            })
        ));
    }

    #[test]
    fn lookups_by_year_and_offense() {
        let book = RuleBook::builder()
            .offenses_reader(2024, "2B.json", Cursor::new(OFFENSES))
            .expect("2024")
            .offenses_reader(2025, "2B.json", Cursor::new(OFFENSES))
            .expect("2025")
            .build();

        assert_eq!(book.years().into_iter().collect::<Vec<_>>(), vec![2024, 2025]);
        assert_eq!(book.editions(&"2B1.1".into()).len(), 2);
        assert!(book.editions(&"9Z9.9".into()).is_empty());
        assert_eq!(
            book.offenses(2024).into_iter().map(OffenseCode::as_str).collect::<Vec<_>>(),
            vec!["2B1.1"]
        );
        assert_eq!(book.summaries().len(), 2);
        assert_eq!(book.summaries()[0].year, 2024);
    }

    #[test]
    fn chapter_three_records_must_all_convert() {
        let json =
            r#"{ "adjustments": [ { "id": "ch3_role", "text": "Role?", "type": "yesno" } ] }"#;

        let err = RuleBook::builder()
            .chapter_three_reader(2025, "chapter3", Cursor::new(json))
            .expect_err("missing yes effect");

        assert!(matches!(err, RuleBookError::MissingEffect { field: "yesEffect", .. }));
    }

    #[test]
    fn loads_year_directories_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let year_dir = dir.path().join("2025");
        fs::create_dir_all(year_dir.join(OFFENSES_DIR)).expect("create offenses dir");
        fs::create_dir_all(dir.path().join("drafts")).expect("create ignored dir");
        fs::write(year_dir.join(CHAPTER_THREE_FILE), CHAPTER_THREE).expect("write chapter three");
        fs::write(year_dir.join(OFFENSES_DIR).join("2B.json"), OFFENSES).expect("write offenses");
        fs::write(year_dir.join(OFFENSES_DIR).join("notes.txt"), "ignored").expect("write notes");

        let book = RuleBook::from_dir(dir.path()).expect("load");

        assert_eq!(book.years().into_iter().collect::<Vec<_>>(), vec![2025]);
        assert_eq!(book.len(), 1);
        assert_eq!(book.rejected().len(), 1);
    }

    #[test]
    fn missing_chapter_three_file_leaves_adjustments_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let offenses = dir.path().join("2024").join(OFFENSES_DIR);
        fs::create_dir_all(&offenses).expect("create offenses dir");
        fs::write(offenses.join("2B.json"), OFFENSES).expect("write offenses");

        let book = RuleBook::from_dir(dir.path()).expect("load");

        let theft = book.guideline(2024, &"2B1.1".into()).expect("theft");
        assert!(theft.chapter_adjustments().is_empty());
    }

    #[test]
    fn directory_without_years_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");

        let err = RuleBook::from_dir(dir.path()).expect_err("no years");

        assert!(matches!(err, RuleBookError::NoEditions { .. }));
    }

    #[test]
    fn missing_directory_propagates_io_errors() {
        let err = RuleBook::from_dir("./does-not-exist").expect_err("io error");

        match err {
            RuleBookError::Io { .. } => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn oversized_year_directory_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("99999")).expect("create year dir");

        let err = RuleBook::from_dir(dir.path()).expect_err("invalid year");

        assert!(matches!(err, RuleBookError::InvalidYear { name } if name == "99999"));
    }

    fn level_rule_book(yes_effect: &str) -> RuleBook {
        let json = format!(
            r#"{{ "2K9.1": {{ "title": "Firearms", "baseOffenseQuestions": [
                {{ "id": "base_1", "text": "Prohibited person?", "type": "yesno",
                  "yesResult": {{ "baseLevel": 14 }}, "noResult": {{ "baseLevel": 12 }} }} ],
              "specificOffenseCharacteristics": [
                {{ "id": "soc_felony", "text": "Used in another felony?", "type": "yesno",
                  "yesEffect": {yes_effect}, "noEffect": {{ "adjustment": 0 }} }} ] }} }}"#
        );
        RuleBook::builder()
            .offenses_reader(2025, "2K.json", Cursor::new(json))
            .expect("offenses")
            .build()
    }

    fn total_with_felony(book: &RuleBook) -> Option<i32> {
        let guideline = book.guideline(2025, &"2K9.1".into()).expect("loaded");
        let mut answers = AnswerSheet::default();
        answers.base.insert("base_1".into(), false);
        answers
            .adjustments
            .insert("soc_felony".into(), AnswerValue::Flag(true));
        evaluate(&guideline, &answers).total()
    }

    #[test]
    fn minimum_level_effects_raise_the_total() {
        let book = level_rule_book(r#"{ "adjustment": 4, "minimumLevel": 18 }"#);

        assert!(book.rejected().is_empty());
        assert_eq!(total_with_felony(&book), Some(18));
    }

    #[test]
    fn set_level_effects_replace_the_total() {
        let book = level_rule_book(r#"{ "setLevel": 30 }"#);

        assert!(book.rejected().is_empty());
        assert_eq!(total_with_felony(&book), Some(30));
    }

    #[test]
    fn effects_with_unrecognized_keys_are_rejected() {
        let book = level_rule_book(r#"{ "adjustment": 4, "maximumLevel": 20 }"#);

        assert!(book.is_empty());
        assert_eq!(book.rejected().len(), 1);
        assert!(book.rejected()[0].reason.contains("maximumLevel"));
    }

    #[test]
    fn set_level_with_an_adjustment_is_rejected() {
        let book = level_rule_book(r#"{ "adjustment": 2, "setLevel": 30 }"#);

        assert!(book.is_empty());
        assert!(book.rejected()[0].reason.contains("setLevel"));
    }

    #[test]
    fn chapter_three_no_effects_must_not_move_the_level() {
        let json = r#"{ "adjustments": [ { "id": "ch3_role", "text": "Minor role?",
            "type": "yesno", "yesEffect": { "adjustment": -2 },
            "noEffect": { "adjustment": 2 } } ] }"#;

        let err = RuleBook::builder()
            .chapter_three_reader(2025, "chapter3", Cursor::new(json))
            .expect_err("no effect moves the level");

        assert!(matches!(err, RuleBookError::UnsupportedEffect { id, .. } if id == "ch3_role"));
    }

    #[test]
    fn select_options_cannot_carry_level_rules() {
        let json = r#"{ "adjustments": [ { "id": "ch3_role", "text": "Role?", "type": "select",
            "options": [ { "id": "leader", "label": "Leader", "setLevel": 30 } ] } ] }"#;

        let err = RuleBook::builder()
            .chapter_three_reader(2025, "chapter3", Cursor::new(json))
            .expect_err("option with a fixed level");

        assert!(err.to_string().contains("leader"));
    }
}
