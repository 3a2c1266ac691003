//! Job posts, their weekly shifts, and search filters.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{CompanyId, JobPostId, UserId};
use crate::error::AppError;

/// Publication state of a job post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPostStatus {
    /// Not yet visible.
    Draft,
    /// Listed and accepting applications.
    Active,
    /// Temporarily hidden.
    Paused,
    /// No longer accepting applications.
    Closed,
}

text_enum!(JobPostStatus {
    Draft => "DRAFT",
    Active => "ACTIVE",
    Paused => "PAUSED",
    Closed => "CLOSED",
});

/// A weekly time slot worked in the position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobShift {
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: u8,
    /// Shift start, `HH:MM:SS`.
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    /// Shift end, `HH:MM:SS`.
    #[schema(value_type = String, example = "13:00:00")]
    pub end_time: NaiveTime,
    /// Optional remark.
    #[serde(default)]
    pub notes: Option<String>,
}

impl JobShift {
    fn validate(&self) -> Result<(), AppError> {
        if self.day_of_week > 6 {
            return Err(AppError::invalid("shift day_of_week must be between 0 and 6"));
        }
        if self.start_time >= self.end_time {
            return Err(AppError::invalid("shift start_time must be before end_time"));
        }
        Ok(())
    }
}

/// Fields describing the position, used on create.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct JobPostDraft {
    /// Position title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Candidate requirements.
    #[serde(default)]
    pub requirements: Option<String>,
    /// Benefits offered.
    #[serde(default)]
    pub benefits: Option<String>,
    /// Lower salary bound.
    #[serde(default)]
    pub salary_min: Option<f64>,
    /// Upper salary bound.
    #[serde(default)]
    pub salary_max: Option<f64>,
    /// `hour`, `month`, …
    #[serde(default)]
    pub salary_period: Option<String>,
    /// Work location.
    #[serde(default)]
    pub location: Option<String>,
    /// `part-time`, `remote`, …
    #[serde(default)]
    pub work_type: Option<String>,
    /// Job category.
    #[serde(default)]
    pub category: Option<String>,
    /// Openings; defaults to 1.
    #[serde(default)]
    pub number_of_positions: Option<i32>,
    /// Last day to apply.
    #[serde(default)]
    pub application_deadline: Option<DateTime<Utc>>,
    /// Weekly shifts.
    #[serde(default)]
    pub shifts: Vec<JobShift>,
    /// Required skill names.
    #[serde(default)]
    pub required_skills: Vec<String>,
}

impl JobPostDraft {
    /// Normalizes and validates a draft before it is stored.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for missing title or
    /// description, inverted salary bounds, a non-positive number of
    /// positions, a deadline in the past, or an invalid shift.
    pub fn validated(mut self, now: DateTime<Utc>) -> Result<Self, AppError> {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        if self.title.is_empty() {
            return Err(AppError::invalid("title is required"));
        }
        if self.title.chars().count() > 200 {
            return Err(AppError::invalid("title must be at most 200 characters"));
        }
        if self.description.is_empty() {
            return Err(AppError::invalid("description is required"));
        }
        check_salary(self.salary_min, self.salary_max)?;
        if self.number_of_positions.is_some_and(|n| n < 1) {
            return Err(AppError::invalid("number_of_positions must be at least 1"));
        }
        if self.application_deadline.is_some_and(|d| d <= now) {
            return Err(AppError::invalid("application_deadline must be in the future"));
        }
        for shift in &self.shifts {
            shift.validate()?;
        }
        self.required_skills = normalize_skills(self.required_skills);
        Ok(self)
    }
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct JobPostPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New requirements.
    pub requirements: Option<String>,
    /// New benefits.
    pub benefits: Option<String>,
    /// New lower salary bound.
    pub salary_min: Option<f64>,
    /// New upper salary bound.
    pub salary_max: Option<f64>,
    /// New salary period.
    pub salary_period: Option<String>,
    /// New location.
    pub location: Option<String>,
    /// New work type.
    pub work_type: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// New number of openings.
    pub number_of_positions: Option<i32>,
    /// New deadline.
    pub application_deadline: Option<DateTime<Utc>>,
    /// Replaces all shifts when present.
    pub shifts: Option<Vec<JobShift>>,
    /// Replaces all required skills when present.
    pub required_skills: Option<Vec<String>>,
}

/// A stored job post.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobPost {
    /// Row id.
    pub id: JobPostId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Owning company's name, resolved on read.
    pub company_name: String,
    /// Owning company's logo, resolved on read.
    pub company_logo_url: Option<String>,
    /// User who created the post.
    pub created_by: UserId,
    /// Position title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Candidate requirements.
    pub requirements: Option<String>,
    /// Benefits offered.
    pub benefits: Option<String>,
    /// Lower salary bound.
    pub salary_min: Option<f64>,
    /// Upper salary bound.
    pub salary_max: Option<f64>,
    /// Salary period.
    pub salary_period: Option<String>,
    /// Work location.
    pub location: Option<String>,
    /// Work type.
    pub work_type: Option<String>,
    /// Category.
    pub category: Option<String>,
    /// Openings.
    pub number_of_positions: i32,
    /// Last day to apply.
    pub application_deadline: Option<DateTime<Utc>>,
    /// Publication state.
    pub status: JobPostStatus,
    /// Detail page views.
    pub view_count: i64,
    /// Applications received.
    pub application_count: i64,
    /// Weekly shifts.
    pub shifts: Vec<JobShift>,
    /// Required skill names.
    pub required_skills: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobPost {
    /// Applies a partial update after validating the merged result.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] when the merged post is invalid.
    pub fn apply(&mut self, patch: JobPostPatch, now: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(AppError::invalid("title is required"));
            }
            self.title = title;
        }
        if let Some(description) = patch.description {
            let description = description.trim().to_string();
            if description.is_empty() {
                return Err(AppError::invalid("description is required"));
            }
            self.description = description;
        }
        let salary_min = patch.salary_min.or(self.salary_min);
        let salary_max = patch.salary_max.or(self.salary_max);
        check_salary(salary_min, salary_max)?;
        if let Some(n) = patch.number_of_positions {
            if n < 1 {
                return Err(AppError::invalid("number_of_positions must be at least 1"));
            }
            self.number_of_positions = n;
        }
        if let Some(shifts) = patch.shifts {
            for shift in &shifts {
                shift.validate()?;
            }
            self.shifts = shifts;
        }
        if let Some(skills) = patch.required_skills {
            self.required_skills = normalize_skills(skills);
        }
        self.salary_min = salary_min;
        self.salary_max = salary_max;
        if patch.requirements.is_some() {
            self.requirements = patch.requirements;
        }
        if patch.benefits.is_some() {
            self.benefits = patch.benefits;
        }
        if patch.salary_period.is_some() {
            self.salary_period = patch.salary_period;
        }
        if patch.location.is_some() {
            self.location = patch.location;
        }
        if patch.work_type.is_some() {
            self.work_type = patch.work_type;
        }
        if patch.category.is_some() {
            self.category = patch.category;
        }
        if patch.application_deadline.is_some() {
            self.application_deadline = patch.application_deadline;
        }
        self.updated_at = Some(now);
        Ok(())
    }

    /// Whether a student may still apply at `now`.
    #[must_use]
    pub fn accepts_applications(&self, now: DateTime<Utc>) -> bool {
        self.status == JobPostStatus::Active
            && self.application_deadline.is_none_or(|deadline| deadline > now)
    }
}

/// Search filter for active job posts. Every field is optional and all
/// present fields must match.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct JobSearch {
    /// Substring over title, description and requirements.
    #[serde(default, alias = "searchTerm", alias = "q")]
    pub term: Option<String>,
    /// Substring over location.
    #[serde(default)]
    pub location: Option<String>,
    /// Exact category (case-insensitive).
    #[serde(default)]
    pub category: Option<String>,
    /// Exact work type (case-insensitive).
    #[serde(default, alias = "workType")]
    pub work_type: Option<String>,
    /// Posts whose upper bound reaches at least this value.
    #[serde(default, alias = "minSalary")]
    pub salary_min: Option<f64>,
    /// Posts whose lower bound does not exceed this value.
    #[serde(default, alias = "maxSalary")]
    pub salary_max: Option<f64>,
}

impl JobSearch {
    /// Evaluates the filter against a post. Only active posts match.
    #[must_use]
    pub fn matches(&self, post: &JobPost) -> bool {
        if post.status != JobPostStatus::Active {
            return false;
        }
        if let Some(term) = non_blank(self.term.as_deref()) {
            let term = term.to_lowercase();
            let hit = [
                Some(&post.title),
                Some(&post.description),
                post.requirements.as_ref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        if let Some(location) = non_blank(self.location.as_deref()) {
            let location = location.to_lowercase();
            if !post
                .location
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains(&location))
            {
                return false;
            }
        }
        if let Some(category) = non_blank(self.category.as_deref())
            && !post
                .category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(category))
        {
            return false;
        }
        if let Some(work_type) = non_blank(self.work_type.as_deref())
            && !post
                .work_type
                .as_deref()
                .is_some_and(|w| w.eq_ignore_ascii_case(work_type))
        {
            return false;
        }
        if let Some(min) = self.salary_min
            && post.salary_max.or(post.salary_min).is_some_and(|s| s < min)
        {
            return false;
        }
        if let Some(max) = self.salary_max
            && post.salary_min.or(post.salary_max).is_some_and(|s| s > max)
        {
            return false;
        }
        true
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn check_salary(min: Option<f64>, max: Option<f64>) -> Result<(), AppError> {
    if min.is_some_and(|m| m < 0.0) || max.is_some_and(|m| m < 0.0) {
        return Err(AppError::invalid("salary must not be negative"));
    }
    if let (Some(min), Some(max)) = (min, max)
        && min > max
    {
        return Err(AppError::invalid("salary_min must not exceed salary_max"));
    }
    Ok(())
}

fn normalize_skills(skills: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(skills.len());
    for skill in skills {
        let skill = skill.trim();
        if !skill.is_empty() && !out.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
            out.push(skill.to_string());
        }
    }
    out
}
