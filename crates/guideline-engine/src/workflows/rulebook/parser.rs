use super::normalizer::{normalize_citation, normalize_offense_code};
use super::RuleBookError;
use crate::workflows::offense_level::domain::{
    Adjustment, AdjustmentId, AdjustmentKind, AdjustmentOption, AdjustmentScope, DecisionNode,
    EdgeTarget, GuidelineYear, Level, NodeId, OffenseCode, OptionId,
};
use crate::workflows::offense_level::GuidelineDraft;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;

/// Every decision tree in a rule file starts here.
pub(crate) const ROOT_QUESTION: &str = "base_1";

/// `{ "2B1.1": { ... }, "2B1.5": { ... } }`
pub(crate) type OffenseFile = BTreeMap<String, OffenseRecord>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OffenseRecord {
    title: String,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    pdf_reference: Option<String>,
    #[serde(default)]
    base_offense_questions: Vec<QuestionRecord>,
    #[serde(default)]
    specific_offense_characteristics: Vec<AdjustmentRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionRecord {
    id: String,
    text: String,
    #[serde(rename = "type", default = "yes_no_type")]
    kind: String,
    #[serde(default)]
    yes_next: Option<String>,
    #[serde(default)]
    no_next: Option<String>,
    #[serde(default)]
    yes_result: Option<ResultRecord>,
    #[serde(default)]
    no_result: Option<ResultRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultRecord {
    base_level: Level,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdjustmentRecord {
    id: String,
    text: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    options: Vec<OptionRecord>,
    #[serde(default)]
    yes_effect: Option<EffectRecord>,
    #[serde(default)]
    no_effect: Option<EffectRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionRecord {
    #[serde(default)]
    id: Option<String>,
    label: String,
    #[serde(default)]
    adjustment: Level,
    #[serde(default)]
    minimum_level: Option<Level>,
    #[serde(default)]
    set_level: Option<Level>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EffectRecord {
    #[serde(default)]
    adjustment: Level,
    #[serde(default)]
    description: String,
    #[serde(default)]
    minimum_level: Option<Level>,
    #[serde(default)]
    set_level: Option<Level>,
    /// Keys outside the schema. Any entry rejects the guideline.
    #[serde(flatten)]
    unrecognized: BTreeMap<String, serde_json::Value>,
}

/// `{ "adjustments": [ ... ] }`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChapterThreeFile {
    #[serde(default)]
    pub(crate) adjustments: Vec<AdjustmentRecord>,
}

fn yes_no_type() -> String {
    "yesno".to_string()
}

pub(crate) fn parse_offense_file<R: Read>(
    origin: &str,
    reader: R,
) -> Result<OffenseFile, RuleBookError> {
    serde_json::from_reader(reader).map_err(|source| RuleBookError::Json {
        origin: origin.to_string(),
        source,
    })
}

pub(crate) fn parse_chapter_three<R: Read>(
    origin: &str,
    reader: R,
) -> Result<ChapterThreeFile, RuleBookError> {
    serde_json::from_reader(reader).map_err(|source| RuleBookError::Json {
        origin: origin.to_string(),
        source,
    })
}

impl OffenseRecord {
    /// Key under which the record was filed, unless it names its own section.
    pub(crate) fn offense_code(&self, key: &str) -> OffenseCode {
        let code = self.section.as_deref().unwrap_or(key);
        OffenseCode::new(normalize_offense_code(code))
    }

    pub(crate) fn into_draft(
        self,
        key: &str,
        year: GuidelineYear,
        chapter_adjustments: Vec<Adjustment>,
    ) -> Result<GuidelineDraft, RuleBookError> {
        let offense = self.offense_code(key);
        let citation = format!("§{offense}");

        let questions = self
            .base_offense_questions
            .into_iter()
            .map(|question| question.into_node(&offense, year))
            .collect::<Result<Vec<_>, _>>()?;

        let characteristics = self
            .specific_offense_characteristics
            .into_iter()
            .map(|record| {
                record.into_adjustment(AdjustmentScope::SpecificOffense, &citation, &offense, year)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GuidelineDraft {
            offense,
            year,
            title: self.title.trim().to_string(),
            citation,
            reference: self.pdf_reference,
            root: NodeId::from(ROOT_QUESTION),
            questions,
            characteristics,
            chapter_adjustments,
        })
    }
}

impl QuestionRecord {
    fn into_node(
        self,
        offense: &OffenseCode,
        year: GuidelineYear,
    ) -> Result<DecisionNode, RuleBookError> {
        if !self.kind.eq_ignore_ascii_case("yesno") {
            return Err(RuleBookError::UnsupportedQuestionType {
                offense: offense.clone(),
                year,
                id: self.id,
                kind: self.kind,
            });
        }

        let missing = |field: &'static str| RuleBookError::MissingEffect {
            offense: offense.clone(),
            year,
            id: self.id.clone(),
            field,
        };
        let yes = edge(self.yes_next.as_deref(), self.yes_result.as_ref())
            .ok_or_else(|| missing("yesNext/yesResult"))?;
        let no = edge(self.no_next.as_deref(), self.no_result.as_ref())
            .ok_or_else(|| missing("noNext/noResult"))?;

        Ok(DecisionNode {
            id: NodeId::new(self.id),
            prompt: self.text,
            yes,
            no,
        })
    }
}

/// Unknown keys, or a fixed level combined with anything that would move
/// the level relative to it, have no unambiguous reading.
fn check_effect(field: &str, effect: &EffectRecord) -> Result<(), String> {
    if let Some(key) = effect.unrecognized.keys().next() {
        return Err(format!("{field} has unrecognized key '{key}'"));
    }
    if effect.set_level.is_some() && (effect.minimum_level.is_some() || effect.adjustment != 0) {
        return Err(format!(
            "{field} combines setLevel with adjustment or minimumLevel"
        ));
    }
    Ok(())
}

/// A `*Next` reference wins over a `*Result`; a record carrying both is
/// treated as pointing at the next question.
fn edge(next: Option<&str>, result: Option<&ResultRecord>) -> Option<EdgeTarget> {
    match (next, result) {
        (Some(id), _) => Some(EdgeTarget::node(id)),
        (None, Some(result)) => Some(EdgeTarget::level(
            result.base_level,
            result.description.clone(),
        )),
        (None, None) => None,
    }
}

impl AdjustmentRecord {
    pub(crate) fn into_adjustment(
        self,
        scope: AdjustmentScope,
        default_citation: &str,
        offense: &OffenseCode,
        year: GuidelineYear,
    ) -> Result<Adjustment, RuleBookError> {
        let unsupported = |detail: String| RuleBookError::UnsupportedEffect {
            offense: offense.clone(),
            year,
            id: self.id.clone(),
            detail,
        };

        let kind = match self.kind.to_ascii_lowercase().as_str() {
            "select" => {
                let mut options = Vec::with_capacity(self.options.len());
                for (index, option) in self.options.into_iter().enumerate() {
                    let id = option
                        .id
                        .unwrap_or_else(|| format!("option_{}", index + 1));
                    if option.minimum_level.is_some() || option.set_level.is_some() {
                        return Err(unsupported(format!(
                            "option '{id}' uses minimumLevel/setLevel, which only yes/no \
                             characteristics support"
                        )));
                    }
                    options.push(AdjustmentOption {
                        id: OptionId::new(id),
                        label: option.label,
                        delta: option.adjustment,
                    });
                }
                AdjustmentKind::MultiSelect { options }
            }
            "yesno" => {
                let effect = self.yes_effect.ok_or_else(|| RuleBookError::MissingEffect {
                    offense: offense.clone(),
                    year,
                    id: self.id.clone(),
                    field: "yesEffect",
                })?;
                check_effect("yesEffect", &effect).map_err(&unsupported)?;
                if let Some(no_effect) = &self.no_effect {
                    check_effect("noEffect", no_effect).map_err(&unsupported)?;
                    if no_effect.adjustment != 0
                        || no_effect.minimum_level.is_some()
                        || no_effect.set_level.is_some()
                    {
                        return Err(unsupported(
                            "noEffect must leave the offense level unchanged".to_string(),
                        ));
                    }
                }
                AdjustmentKind::Binary {
                    delta: effect.adjustment,
                    description: effect.description,
                    minimum_level: effect.minimum_level,
                    set_level: effect.set_level,
                }
            }
            _ => {
                return Err(RuleBookError::UnsupportedQuestionType {
                    offense: offense.clone(),
                    year,
                    id: self.id,
                    kind: self.kind,
                })
            }
        };

        let citation = self
            .reference
            .as_deref()
            .map(normalize_citation)
            .filter(|reference| !reference.is_empty())
            .unwrap_or_else(|| default_citation.to_string());

        Ok(Adjustment {
            id: AdjustmentId::new(self.id),
            prompt: self.text,
            citation,
            scope,
            kind,
        })
    }
}
