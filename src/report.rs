use crate::calc;
use crate::model::{AiReport, AppData, Cycle};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{error, info};

pub const NO_GRADES_PLACEHOLDER: &str = "Aucune note saisie";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    #[serde(rename = "bienveillant")]
    Bienveillant,
    #[default]
    #[serde(rename = "neutre")]
    Neutre,
    #[serde(rename = "structuré")]
    Structure,
}

impl Tone {
    fn instruction(self) -> &'static str {
        match self {
            Tone::Bienveillant => "Très encourageant, chaleureux et protecteur",
            Tone::Neutre => "Professionnel, équilibré et bienveillant",
            Tone::Structure => "Précis, analytique, factuel et rigoureux",
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("student not found: {0}")]
    UnknownStudent(String),
    #[error("Données insuffisantes pour générer une synthèse.")]
    InsufficientData,
    #[error("no report generator configured")]
    Unavailable,
    #[error("Impossible de générer le rapport IA pour le moment.")]
    GenerationFailed { detail: String },
}

impl ReportError {
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::UnknownStudent(_) => "not_found",
            ReportError::InsufficientData => "insufficient_data",
            ReportError::Unavailable => "generator_unavailable",
            ReportError::GenerationFailed { .. } => "generation_failed",
        }
    }
}

/// Everything the text generator gets to see about one student and cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub student_name: String,
    /// Non-empty weekly comments in week order.
    pub comments: Vec<String>,
    pub academic_results: String,
    pub tone: Tone,
}

pub fn prepare_request(
    data: &AppData,
    student_id: &str,
    cycle: Cycle,
    tone: Tone,
) -> Result<ReportRequest, ReportError> {
    let student = data
        .student(student_id)
        .ok_or_else(|| ReportError::UnknownStudent(student_id.to_string()))?;

    let comments: Vec<String> = calc::weekly_comments_for(data, student_id, cycle)
        .into_iter()
        .filter(|c| !c.is_empty())
        .collect();
    let tallies = calc::tier_tallies(data, student_id);

    if comments.is_empty() && tallies.is_empty() {
        return Err(ReportError::InsufficientData);
    }

    Ok(ReportRequest {
        student_name: student.display_name(),
        comments,
        academic_results: if tallies.is_empty() {
            NO_GRADES_PLACEHOLDER.to_string()
        } else {
            tallies
        },
        tone,
    })
}

pub fn build_prompt(req: &ReportRequest) -> String {
    let weekly: Vec<String> = req
        .comments
        .iter()
        .enumerate()
        .map(|(i, c)| format!("Semaine {}: {}", i + 1, c))
        .collect();

    format!(
        "Rédige un commentaire de bulletin scolaire (primaire) pour l'élève {name}.\n\
         \n\
         1. Suivi hebdomadaire :\n{weekly}\n\
         \n\
         2. Résultats par matière :\n{results}\n\
         \n\
         Ton : {tone}.\n\
         Un seul paragraphe fluide, à la troisième personne, sans liste à puces. \
         Synthétise les réussites et les efforts, puis propose des axes d'amélioration \
         formulés positivement.\n",
        name = req.student_name,
        weekly = weekly.join("\n"),
        results = req.academic_results,
        tone = req.tone.instruction(),
    )
}

/// External text generator. Opaque: one request in, one paragraph out.
pub trait ReportGenerator {
    fn generate(&self, req: &ReportRequest) -> anyhow::Result<String>;
}

/// Runs a command, writes the prompt to its stdin and reads the paragraph from stdout.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a command line on whitespace. `None` for a blank line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl ReportGenerator for CommandGenerator {
    fn generate(&self, req: &ReportRequest) -> anyhow::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.program))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("generator stdin unavailable"))?;
            stdin
                .write_all(build_prompt(req).as_bytes())
                .context("failed to send prompt")?;
        }

        let output = child
            .wait_with_output()
            .context("failed to wait for generator")?;
        if !output.status.success() {
            return Err(anyhow!(
                "generator exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        let text = String::from_utf8(output.stdout).context("generator output is not utf-8")?;
        Ok(text.trim().to_string())
    }
}

/// Checks the data, asks the generator once and wraps the result as a report
/// stamped with `generated_at`. Nothing is retried.
pub fn draft_report(
    data: &AppData,
    generator: Option<&dyn ReportGenerator>,
    student_id: &str,
    cycle: Cycle,
    tone: Tone,
    generated_at: String,
) -> Result<AiReport, ReportError> {
    let req = prepare_request(data, student_id, cycle, tone)?;
    let generator = generator.ok_or(ReportError::Unavailable)?;

    let content = generator.generate(&req).map_err(|e| {
        error!(student_id, cycle = cycle.get(), error = %format!("{e:#}"), "report generation failed");
        ReportError::GenerationFailed {
            detail: format!("{e:#}"),
        }
    })?;
    info!(student_id, cycle = cycle.get(), chars = content.len(), "report drafted");

    Ok(AiReport {
        student_id: student_id.to_string(),
        cycle,
        content,
        generated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activity, Difficulty, Evaluation, Student, Subject, Week, WeeklyComment};
    use std::cell::RefCell;

    struct Recording {
        seen: RefCell<Vec<ReportRequest>>,
        reply: Result<String, String>,
    }

    impl Recording {
        fn replying(text: &str) -> Self {
            Self {
                seen: RefCell::new(Vec::new()),
                reply: Ok(text.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                seen: RefCell::new(Vec::new()),
                reply: Err("quota exceeded".to_string()),
            }
        }
    }

    impl ReportGenerator for Recording {
        fn generate(&self, req: &ReportRequest) -> anyhow::Result<String> {
            self.seen.borrow_mut().push(req.clone());
            self.reply.clone().map_err(|e| anyhow!(e))
        }
    }

    fn cycle(n: u8) -> Cycle {
        Cycle::try_from(n).expect("cycle")
    }

    fn data() -> AppData {
        AppData {
            students: vec![Student {
                id: "s1".into(),
                first_name: "Léa".into(),
                last_name: "Martin".into(),
                observations: String::new(),
                birth_date: None,
                parent_phones: None,
            }],
            activities: vec![Activity {
                id: "a1".into(),
                title: "Calcul".into(),
                date: "2025-09-10".into(),
                subject: Subject::Mathematiques,
                domain: String::new(),
                difficulty: Difficulty::try_from(1).expect("difficulty"),
                description: String::new(),
                objective: None,
                competencies: String::new(),
                material: None,
            }],
            weekly_comments: vec![
                WeeklyComment {
                    student_id: "s1".into(),
                    cycle: cycle(1),
                    week: Week::try_from(5).expect("week"),
                    content: "plus autonome".into(),
                },
                WeeklyComment {
                    student_id: "s1".into(),
                    cycle: cycle(1),
                    week: Week::try_from(2).expect("week"),
                    content: "distraite".into(),
                },
                WeeklyComment {
                    student_id: "s1".into(),
                    cycle: cycle(1),
                    week: Week::try_from(3).expect("week"),
                    content: String::new(),
                },
            ],
            ..AppData::default()
        }
    }

    #[test]
    fn request_orders_comments_by_week_and_drops_empty_ones() {
        let req = prepare_request(&data(), "s1", cycle(1), Tone::Bienveillant).expect("request");
        assert_eq!(req.student_name, "Léa Martin");
        assert_eq!(req.comments, vec!["distraite", "plus autonome"]);
        assert_eq!(req.academic_results, NO_GRADES_PLACEHOLDER);
    }

    #[test]
    fn grades_alone_are_enough() {
        let mut d = data();
        d.evaluations.push(Evaluation {
            student_id: "s1".into(),
            activity_id: "a1".into(),
            is_present: true,
            grade: 9.0,
            comment: String::new(),
        });
        let req = prepare_request(&d, "s1", cycle(2), Tone::Neutre).expect("request");
        assert!(req.comments.is_empty());
        assert_eq!(req.academic_results, "Mathématiques: 1x Acquis");
    }

    #[test]
    fn insufficient_data_never_reaches_the_generator() {
        let gen = Recording::replying("unused");
        let err = draft_report(&data(), Some(&gen as &dyn ReportGenerator), "s1", cycle(3), Tone::Neutre, "now".into())
            .unwrap_err();
        assert_eq!(err.code(), "insufficient_data");
        assert_eq!(
            err.to_string(),
            "Données insuffisantes pour générer une synthèse."
        );
        assert!(gen.seen.borrow().is_empty());
    }

    #[test]
    fn generated_text_becomes_the_report() {
        let gen = Recording::replying("Léa progresse avec régularité.");
        let report = draft_report(
            &data(),
            Some(&gen as &dyn ReportGenerator),
            "s1",
            cycle(1),
            Tone::Structure,
            "2025-12-01T10:00:00.000Z".into(),
        )
        .expect("draft");
        assert_eq!(report.content, "Léa progresse avec régularité.");
        assert_eq!(report.cycle, cycle(1));
        assert_eq!(gen.seen.borrow().len(), 1);
        assert_eq!(gen.seen.borrow()[0].tone, Tone::Structure);
    }

    #[test]
    fn generator_failure_is_reported_once_with_generic_message() {
        let gen = Recording::failing();
        let err = draft_report(&data(), Some(&gen as &dyn ReportGenerator), "s1", cycle(1), Tone::Neutre, "now".into())
            .unwrap_err();
        assert_eq!(err.code(), "generation_failed");
        assert_eq!(
            err.to_string(),
            "Impossible de générer le rapport IA pour le moment."
        );
        assert_eq!(gen.seen.borrow().len(), 1);
    }

    #[test]
    fn missing_generator_and_unknown_student() {
        let err = draft_report(&data(), None, "s1", cycle(1), Tone::Neutre, "now".into())
            .unwrap_err();
        assert_eq!(err.code(), "generator_unavailable");
        let err = prepare_request(&data(), "ghost", cycle(1), Tone::Neutre).unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn prompt_carries_name_comments_results_and_tone() {
        let req = prepare_request(&data(), "s1", cycle(1), Tone::Bienveillant).expect("request");
        let prompt = build_prompt(&req);
        assert!(prompt.contains("Léa Martin"));
        assert!(prompt.contains("Semaine 1: distraite"));
        assert!(prompt.contains("Semaine 2: plus autonome"));
        assert!(prompt.contains(NO_GRADES_PLACEHOLDER));
        assert!(prompt.contains("chaleureux"));
    }

    #[cfg(unix)]
    #[test]
    fn command_generator_pipes_prompt_through_stdin() {
        let gen = CommandGenerator::from_command_line("cat").expect("command");
        let req = prepare_request(&data(), "s1", cycle(1), Tone::Neutre).expect("request");
        let out = gen.generate(&req).expect("generate");
        assert_eq!(out, build_prompt(&req).trim());

        let failing = CommandGenerator::from_command_line("false").expect("command");
        assert!(failing.generate(&req).is_err());
        assert!(CommandGenerator::from_command_line("   ").is_none());
    }
}
