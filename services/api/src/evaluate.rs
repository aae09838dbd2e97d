use crate::infra::{apply_data_dir, read_json, RuleState};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use guideline_engine::config::AppConfig;
use guideline_engine::error::AppError;
use guideline_engine::telemetry;
use guideline_engine::workflows::offense_level::{
    compare_years, Comparison, DecisionTrail, Evaluation, GuidelineSession, GuidelineYear,
    OffenseCode, PresentationMode, ReviewProgress, SessionRecord, YearAnswers,
};
use guideline_engine::workflows::rulebook::normalize_offense_code;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum ModeArg {
    Wizard,
    #[default]
    Checklist,
}

impl From<ModeArg> for PresentationMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Wizard => PresentationMode::Wizard,
            ModeArg::Checklist => PresentationMode::Checklist,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct GuidelinesArgs {
    /// Only list editions from this Guidelines Manual year
    #[arg(long)]
    pub(crate) year: Option<GuidelineYear>,
    /// Override the rule data directory
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Guidelines Manual year (e.g. 2025)
    #[arg(long)]
    pub(crate) year: GuidelineYear,
    /// Chapter Two offense guideline (e.g. 2B1.1)
    #[arg(long)]
    pub(crate) offense: String,
    /// Saved session record (JSON) with answers, dismissals, and flags
    #[arg(long)]
    pub(crate) answers: Option<PathBuf>,
    /// Presentation mode used to replay the answers
    #[arg(long, value_enum, default_value_t = ModeArg::Checklist)]
    pub(crate) mode: ModeArg,
    /// Print the decision trail after the breakdown
    #[arg(long)]
    pub(crate) trail: bool,
    /// Write the decision trail as CSV to this path
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Date stamped on the decision trail (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) prepared_on: Option<NaiveDate>,
    /// Override the rule data directory
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct CompareArgs {
    /// Chapter Two offense guideline (e.g. 2K2.1)
    #[arg(long)]
    pub(crate) offense: String,
    /// Answers to apply to every edition (JSON, optionally partitioned by year)
    #[arg(long)]
    pub(crate) answers: Option<PathBuf>,
    /// Override the rule data directory
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

fn load_rules(data_dir: Option<PathBuf>) -> Result<RuleState, AppError> {
    let mut config = AppConfig::load()?;
    apply_data_dir(&mut config.rules, data_dir);
    telemetry::init_for_cli(&config.telemetry)?;
    RuleState::load(&config.rules)
}

pub(crate) fn run_guidelines(args: GuidelinesArgs) -> Result<(), AppError> {
    let rules = load_rules(args.data_dir)?;
    for line in guideline_listing(&rules, args.year) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        year,
        offense,
        answers,
        mode,
        trail,
        csv,
        prepared_on,
        data_dir,
    } = args;

    let rules = load_rules(data_dir)?;
    let record: SessionRecord = match answers {
        Some(path) => read_json(&path)?,
        None => SessionRecord::default(),
    };

    let offense = OffenseCode::new(normalize_offense_code(&offense));
    let guideline = rules.book.guideline(year, &offense)?;
    let session = GuidelineSession::restore(guideline, mode.into(), &record)?;

    println!(
        "{} (Guidelines Manual {}, {:?} mode)",
        offense,
        year,
        PresentationMode::from(mode)
    );
    if let Some(evaluation) = session.evaluation() {
        for line in evaluation_lines(&evaluation) {
            println!("{line}");
        }
    }
    println!("{}", progress_line(session.review_progress()));

    if !trail && csv.is_none() {
        return Ok(());
    }

    let Some(mut decision_trail) = DecisionTrail::from_session(&session) else {
        return Ok(());
    };
    if let Some(date) = prepared_on {
        decision_trail = decision_trail.with_prepared_on(date);
    }

    if trail {
        println!("\nDecision trail");
        println!("{}", decision_trail.render());
    }
    if let Some(path) = csv {
        let file = File::create(&path)?;
        decision_trail.write_csv(BufWriter::new(file))?;
        info!(
            path = %path.display(),
            entries = decision_trail.entries.len(),
            "decision trail exported"
        );
    }

    Ok(())
}

pub(crate) fn run_compare(args: CompareArgs) -> Result<(), AppError> {
    let rules = load_rules(args.data_dir)?;
    if !rules.one_book_rule {
        return Err(AppError::OneBookRuleDisabled);
    }

    let answers: YearAnswers = match args.answers {
        Some(path) => read_json(&path)?,
        None => YearAnswers::default(),
    };
    let offense = OffenseCode::new(normalize_offense_code(&args.offense));
    let comparison = compare_years(&offense, &rules.book.editions(&offense), &answers)?;

    for line in comparison_lines(&comparison) {
        println!("{line}");
    }
    Ok(())
}

fn guideline_listing(rules: &RuleState, year: Option<GuidelineYear>) -> Vec<String> {
    let in_year = |candidate: GuidelineYear| year.map_or(true, |wanted| wanted == candidate);
    let mut lines = Vec::new();

    for summary in rules.book.summaries() {
        if !in_year(summary.year) {
            continue;
        }
        lines.push(format!(
            "{} {} {} ({} questions, {} characteristics, {} chapter three adjustments)",
            summary.year,
            summary.citation,
            summary.title,
            summary.questions,
            summary.characteristics,
            summary.chapter_adjustments
        ));
    }

    let rejected: Vec<_> = rules
        .book
        .rejected()
        .iter()
        .filter(|entry| in_year(entry.year))
        .collect();
    if !rejected.is_empty() {
        lines.push("Rejected:".to_string());
        for entry in rejected {
            lines.push(format!("- {} {}: {}", entry.year, entry.offense, entry.reason));
        }
    }

    lines
}

fn evaluation_lines(evaluation: &Evaluation) -> Vec<String> {
    match evaluation {
        Evaluation::Pending { at } => {
            vec![format!("Total offense level: pending (question {at} unanswered)")]
        }
        Evaluation::Complete(breakdown) => {
            let mut lines = vec![format!(
                "Base offense level: {} ({})",
                breakdown.base_level, breakdown.base_description
            )];
            for line in &breakdown.lines {
                lines.push(format!(
                    "  {:+} {} {}",
                    line.delta, line.citation, line.label
                ));
            }
            lines.push(format!("Total offense level: {}", breakdown.total));
            lines
        }
    }
}

fn progress_line(progress: ReviewProgress) -> String {
    format!(
        "Reviewed {}/{} adjustments",
        progress.reviewed, progress.total
    )
}

fn comparison_lines(comparison: &Comparison) -> Vec<String> {
    let mut lines = vec![format!("Year comparison for {}", comparison.offense)];
    for outcome in &comparison.outcomes {
        lines.push(format!(
            "- {}: total {} (base {}, adjustments {:+})",
            outcome.year,
            outcome.breakdown.total,
            outcome.breakdown.base_level,
            outcome.breakdown.adjustment_sum()
        ));
    }
    for pending in &comparison.pending {
        lines.push(format!(
            "- {}: pending (question {} unanswered)",
            pending.year, pending.at
        ));
    }
    lines.push(format!(
        "Selected edition: {} (total {})",
        comparison.selected.year, comparison.selected.breakdown.total
    ));
    lines
}
