use crate::model::{
    Activity, AiReport, AppData, Cycle, Evaluation, GradeTier, ReportKey, Student, Subject, Week,
    WeeklyCommentKey,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Half-up rounding to one decimal: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Whole-number value shown on compact badges.
pub fn badge_value(avg: f64) -> i64 {
    (avg + 0.5).floor() as i64
}

fn qualifying<'a>(
    data: &'a AppData,
    student_id: &'a str,
    subject: Option<Subject>,
) -> impl Iterator<Item = &'a Evaluation> + 'a {
    data.evaluations.iter().filter(move |e| {
        if e.student_id != student_id || !e.is_present {
            return false;
        }
        match subject {
            None => true,
            Some(s) => data.activity(&e.activity_id).map(|a| a.subject) == Some(s),
        }
    })
}

/// Unweighted mean of present grades, rounded to one decimal.
///
/// `None` means no qualifying evaluation, which is distinct from an average of 0.
pub fn student_average(data: &AppData, student_id: &str, subject: Option<Subject>) -> Option<f64> {
    let mut count: usize = 0;
    let mut sum: f64 = 0.0;
    for e in qualifying(data, student_id, subject) {
        count += 1;
        sum += e.grade;
    }
    if count == 0 {
        return None;
    }
    Some(round_off_1_decimal(sum / count as f64))
}

pub fn global_average(data: &AppData, student_id: &str) -> Option<f64> {
    student_average(data, student_id, None)
}

/// Per-subject tier counts, one line per subject with data:
/// `Mathématiques: 2x Acquis, 1x Fragile`.
pub fn tier_tallies(data: &AppData, student_id: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for subject in Subject::ALL {
        let mut counts: Vec<(GradeTier, usize)> = Vec::new();
        for e in qualifying(data, student_id, Some(subject)) {
            let tier = GradeTier::for_grade(e.grade);
            match counts.iter_mut().find(|(t, _)| *t == tier) {
                Some((_, n)) => *n += 1,
                None => counts.push((tier, 1)),
            }
        }
        if counts.is_empty() {
            continue;
        }
        let parts: Vec<String> = counts
            .iter()
            .map(|(tier, n)| format!("{}x {}", n, tier.label()))
            .collect();
        lines.push(format!("{}: {}", subject.label(), parts.join(", ")));
    }
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageCell {
    pub average: Option<f64>,
    pub badge: Option<i64>,
    pub tier: Option<GradeTier>,
}

impl AverageCell {
    pub fn from_average(average: Option<f64>) -> Self {
        Self {
            average,
            badge: average.map(badge_value),
            tier: average.map(GradeTier::for_grade),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCell {
    pub subject: Subject,
    pub label: &'static str,
    #[serde(flatten)]
    pub cell: AverageCell,
}

fn subject_cells(data: &AppData, student_id: &str) -> Vec<SubjectCell> {
    Subject::ALL
        .into_iter()
        .map(|subject| SubjectCell {
            subject,
            label: subject.label(),
            cell: AverageCell::from_average(student_average(data, student_id, Some(subject))),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOption {
    #[default]
    #[serde(rename = "alpha-asc")]
    AlphaAsc,
    #[serde(rename = "alpha-desc")]
    AlphaDesc,
    #[serde(rename = "grade-asc")]
    GradeAsc,
    #[serde(rename = "grade-desc")]
    GradeDesc,
}

fn compare_names(a: &Student, b: &Student) -> Ordering {
    a.sort_name()
        .to_lowercase()
        .cmp(&b.sort_name().to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRow {
    pub student_id: String,
    pub display_name: String,
    pub global: AverageCell,
    pub report: Option<String>,
    pub subjects: Vec<SubjectCell>,
}

/// Dashboard rows for one cycle. The cycle only selects which report is shown;
/// averages cover every evaluation on record.
pub fn synthesis_rows(
    data: &AppData,
    cycle: Cycle,
    search: &str,
    sort: SortOption,
) -> Vec<SynthesisRow> {
    let mut students: Vec<&Student> = data
        .students
        .iter()
        .filter(|s| s.matches_search(search))
        .collect();

    match sort {
        SortOption::AlphaAsc => students.sort_by(|a, b| compare_names(a, b)),
        SortOption::AlphaDesc => students.sort_by(|a, b| compare_names(b, a)),
        SortOption::GradeAsc | SortOption::GradeDesc => {
            // Students without data sort as -1.
            let key = |s: &Student| global_average(data, &s.id).unwrap_or(-1.0);
            students.sort_by(|a, b| {
                let ord = key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal);
                if sort == SortOption::GradeAsc {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
    }

    students
        .into_iter()
        .map(|s| SynthesisRow {
            student_id: s.id.clone(),
            display_name: s.display_name(),
            global: AverageCell::from_average(global_average(data, &s.id)),
            report: data
                .report(&ReportKey {
                    student_id: s.id.clone(),
                    cycle,
                })
                .map(|r| r.content.clone()),
            subjects: subject_cells(data, &s.id),
        })
        .collect()
}

pub fn search_students<'a>(data: &'a AppData, search: &str) -> Vec<&'a Student> {
    data.students
        .iter()
        .filter(|s| s.matches_search(search))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileActivity {
    pub activity: Activity,
    pub evaluation: Option<Evaluation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSubject {
    #[serde(flatten)]
    pub summary: SubjectCell,
    pub activities: Vec<ProfileActivity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student: Student,
    pub cycle: Cycle,
    pub report: Option<AiReport>,
    pub global: AverageCell,
    pub subjects: Vec<ProfileSubject>,
}

fn compare_dates_desc(a: &str, b: &str) -> Ordering {
    let pa = NaiveDate::parse_from_str(a, "%Y-%m-%d").ok();
    let pb = NaiveDate::parse_from_str(b, "%Y-%m-%d").ok();
    match (pa, pb) {
        (Some(x), Some(y)) => y.cmp(&x),
        _ => b.cmp(a),
    }
}

pub fn student_profile(data: &AppData, student: &Student, cycle: Cycle) -> StudentProfile {
    let subjects = subject_cells(data, &student.id)
        .into_iter()
        .map(|summary| {
            let mut activities: Vec<ProfileActivity> = data
                .activities
                .iter()
                .filter(|a| a.subject == summary.subject)
                .map(|a| ProfileActivity {
                    activity: a.clone(),
                    evaluation: data
                        .evaluations
                        .iter()
                        .find(|e| e.activity_id == a.id && e.student_id == student.id)
                        .cloned(),
                })
                .collect();
            activities.sort_by(|x, y| compare_dates_desc(&x.activity.date, &y.activity.date));
            ProfileSubject {
                summary,
                activities,
            }
        })
        .collect();

    StudentProfile {
        student: student.clone(),
        cycle,
        report: data
            .report(&ReportKey {
                student_id: student.id.clone(),
                cycle,
            })
            .cloned(),
        global: AverageCell::from_average(global_average(data, &student.id)),
        subjects,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyGridRow {
    pub student_id: String,
    pub display_name: String,
    pub initials: String,
    /// One entry per week, empty when nothing was written.
    pub weeks: Vec<String>,
}

pub fn weekly_comments_for(data: &AppData, student_id: &str, cycle: Cycle) -> Vec<String> {
    Week::all()
        .map(|week| {
            data.weekly_comment(&WeeklyCommentKey {
                student_id: student_id.to_string(),
                cycle,
                week,
            })
            .map(|c| c.content.clone())
                .unwrap_or_default()
        })
        .collect()
}

pub fn weekly_grid(data: &AppData, cycle: Cycle, ascending: bool) -> Vec<WeeklyGridRow> {
    let mut students: Vec<&Student> = data.students.iter().collect();
    if ascending {
        students.sort_by(|a, b| compare_names(a, b));
    } else {
        students.sort_by(|a, b| compare_names(b, a));
    }
    students
        .into_iter()
        .map(|s| WeeklyGridRow {
            student_id: s.id.clone(),
            display_name: s.display_name(),
            initials: s
                .first_name
                .chars()
                .take(1)
                .chain(s.last_name.chars().take(1))
                .collect(),
            weeks: weekly_comments_for(data, &s.id, cycle),
        })
        .collect()
}
