use serde::{Deserialize, Serialize};
use std::fmt;

pub const CYCLE_COUNT: u8 = 3;
pub const WEEKS_PER_CYCLE: u8 = 13;
pub const GRADE_MAX: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub observations: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_phones: Option<String>,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Key used by every alphabetical ordering: last name first.
    pub fn sort_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }

    pub fn matches_search(&self, term: &str) -> bool {
        self.display_name()
            .to_lowercase()
            .contains(&term.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    #[serde(rename = "mathématiques")]
    Mathematiques,
    #[serde(rename = "français")]
    Francais,
    #[serde(rename = "lecture")]
    Lecture,
    #[serde(rename = "écriture")]
    Ecriture,
    #[serde(rename = "sciences")]
    Sciences,
    #[serde(rename = "éveil")]
    Eveil,
    #[serde(rename = "sport")]
    Sport,
    #[serde(rename = "arts")]
    Arts,
}

impl Subject {
    /// Display order used by dashboards and exports.
    pub const ALL: [Subject; 8] = [
        Subject::Mathematiques,
        Subject::Francais,
        Subject::Lecture,
        Subject::Ecriture,
        Subject::Sciences,
        Subject::Eveil,
        Subject::Sport,
        Subject::Arts,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Subject::Mathematiques => "mathématiques",
            Subject::Francais => "français",
            Subject::Lecture => "lecture",
            Subject::Ecriture => "écriture",
            Subject::Sciences => "sciences",
            Subject::Eveil => "éveil",
            Subject::Sport => "sport",
            Subject::Arts => "arts",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Subject::Mathematiques => "Mathématiques",
            Subject::Francais => "Français",
            Subject::Lecture => "Lecture",
            Subject::Ecriture => "Écriture",
            Subject::Sciences => "Sciences",
            Subject::Eveil => "Éveil",
            Subject::Sport => "Sport",
            Subject::Arts => "Arts",
        }
    }

    /// Suggested domains offered when creating an activity. Domain stays free text.
    pub fn domain_suggestions(self) -> &'static [&'static str] {
        match self {
            Subject::Mathematiques => &[
                "Calcul mental",
                "Numération",
                "Géométrie",
                "Mesures",
                "Résolution de problèmes",
            ],
            Subject::Francais => &["Grammaire", "Conjugaison", "Orthographe", "Vocabulaire"],
            Subject::Lecture => &["Compréhension", "Fluidité", "Lecture à voix haute"],
            Subject::Ecriture => &["Graphisme", "Production d'écrits", "Copie"],
            Subject::Sciences => &["Vivant", "Matière", "Objets techniques"],
            Subject::Eveil => &["Histoire", "Géographie", "Vivre ensemble"],
            Subject::Sport => &["Coordination", "Esprit d'équipe", "Endurance"],
            Subject::Arts => &["Arts plastiques", "Musique", "Théâtre"],
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&v) {
            Ok(Difficulty(v))
        } else {
            Err(format!("difficulty must be in 1..=5, got {v}"))
        }
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> u8 {
        d.0
    }
}

/// School trimester, 1..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Cycle(u8);

impl Cycle {
    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Cycle> {
        (1..=CYCLE_COUNT).map(Cycle)
    }
}

impl TryFrom<u8> for Cycle {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if (1..=CYCLE_COUNT).contains(&v) {
            Ok(Cycle(v))
        } else {
            Err(format!("cycle must be in 1..={CYCLE_COUNT}, got {v}"))
        }
    }
}

impl Default for Cycle {
    fn default() -> Self {
        Cycle(1)
    }
}

impl From<Cycle> for u8 {
    fn from(c: Cycle) -> u8 {
        c.0
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Week index inside a cycle, 1..=13.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Week(u8);

impl Week {
    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Week> {
        (1..=WEEKS_PER_CYCLE).map(Week)
    }
}

impl TryFrom<u8> for Week {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if (1..=WEEKS_PER_CYCLE).contains(&v) {
            Ok(Week(v))
        } else {
            Err(format!("week must be in 1..={WEEKS_PER_CYCLE}, got {v}"))
        }
    }
}

impl From<Week> for u8 {
    fn from(w: Week) -> u8 {
        w.0
    }
}

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub date: String,
    pub subject: Subject,
    #[serde(default)]
    pub domain: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default)]
    pub competencies: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub student_id: String,
    pub activity_id: String,
    pub is_present: bool,
    /// Out of 10. Meaningless when the student was absent.
    pub grade: f64,
    #[serde(default)]
    pub comment: String,
}

impl Evaluation {
    pub fn key(&self) -> EvaluationKey {
        EvaluationKey {
            student_id: self.student_id.clone(),
            activity_id: self.activity_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyComment {
    pub student_id: String,
    pub cycle: Cycle,
    pub week: Week,
    pub content: String,
}

impl WeeklyComment {
    pub fn key(&self) -> WeeklyCommentKey {
        WeeklyCommentKey {
            student_id: self.student_id.clone(),
            cycle: self.cycle,
            week: self.week,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiReport {
    pub student_id: String,
    pub cycle: Cycle,
    pub content: String,
    pub generated_at: String,
}

impl AiReport {
    pub fn key(&self) -> ReportKey {
        ReportKey {
            student_id: self.student_id.clone(),
            cycle: self.cycle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvaluationKey {
    pub student_id: String,
    pub activity_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WeeklyCommentKey {
    pub student_id: String,
    pub cycle: Cycle,
    pub week: Week,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub student_id: String,
    pub cycle: Cycle,
}

/// Storage row id for records that have no id of their own.
pub trait RowKey {
    fn row_id(&self) -> String;
}

impl RowKey for EvaluationKey {
    fn row_id(&self) -> String {
        format!("{}_{}", self.student_id, self.activity_id)
    }
}

impl RowKey for WeeklyCommentKey {
    fn row_id(&self) -> String {
        format!("{}_{}_{}", self.student_id, self.cycle, self.week)
    }
}

impl RowKey for ReportKey {
    fn row_id(&self) -> String {
        format!("{}_{}", self.student_id, self.cycle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradeTier {
    Insuffisant,
    Fragile,
    Acquis,
}

impl GradeTier {
    pub fn for_grade(grade: f64) -> GradeTier {
        if grade < 5.0 {
            GradeTier::Insuffisant
        } else if grade <= 7.0 {
            GradeTier::Fragile
        } else {
            GradeTier::Acquis
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GradeTier::Insuffisant => "Insuffisant",
            GradeTier::Fragile => "Fragile",
            GradeTier::Acquis => "Acquis",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppData {
    pub students: Vec<Student>,
    pub activities: Vec<Activity>,
    pub evaluations: Vec<Evaluation>,
    pub weekly_comments: Vec<WeeklyComment>,
    pub ai_reports: Vec<AiReport>,
    pub notes: Vec<Note>,
}

impl AppData {
    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn weekly_comment(&self, key: &WeeklyCommentKey) -> Option<&WeeklyComment> {
        self.weekly_comments.iter().find(|c| c.key() == *key)
    }

    pub fn report(&self, key: &ReportKey) -> Option<&AiReport> {
        self.ai_reports.iter().find(|r| r.key() == *key)
    }
}
