//! Domain records.
//!
//! Every stored row is one of the typed models below. [`Record`] is the closed
//! sum over them that storage backends dispatch on; [`NewRecord`] is the
//! matching set of insert drafts (no id, no timestamps).

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::CoreError;
use crate::id::ResourceId;
use crate::resource::ResourceType;
use crate::validation::ValidationErrors;

const BLANK: &str = "can't be blank";

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn is_blank_opt(value: Option<&str>) -> bool {
    value.is_none_or(is_blank)
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Student,
    Instructor,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            other => Err(CoreError::invalid_resource(format!("unknown role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    MultipleChoiceSingle,
    MultipleChoiceMultiple,
    RatingScale,
    Emoji,
}

impl QuestionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::MultipleChoiceSingle => "multiple_choice_single",
            QuestionType::MultipleChoiceMultiple => "multiple_choice_multiple",
            QuestionType::RatingScale => "rating_scale",
            QuestionType::Emoji => "emoji",
        }
    }

    /// Whether answers are given through `selected_options` rather than free text.
    pub const fn uses_options(self) -> bool {
        !matches!(self, QuestionType::Text)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: ResourceId,
    pub institution_id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn is_instructor(&self) -> bool {
        self.role == Role::Instructor
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: ResourceId,
    pub institution_id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub access_code: String,
    pub is_active: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Evaluation {
    pub const ACCESS_CODE_LEN: usize = 8;
    const ACCESS_CODE_CHARSET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Random 8-character code over `A-Z0-9`.
    pub fn generate_access_code() -> String {
        let mut rng = rand::thread_rng();
        (0..Self::ACCESS_CODE_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..Self::ACCESS_CODE_CHARSET.len());
                char::from(Self::ACCESS_CODE_CHARSET[idx])
            })
            .collect()
    }

    pub fn is_valid_access_code(code: &str) -> bool {
        code.len() == Self::ACCESS_CODE_LEN
            && code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: ResourceId,
    pub institution_id: ResourceId,
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationQuestion {
    pub id: ResourceId,
    pub evaluation_id: ResourceId,
    pub question_id: ResourceId,
    pub position: u32,
    #[serde(default)]
    pub is_modified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: ResourceId,
    pub user_id: ResourceId,
    pub evaluation_question_id: ResourceId,
    #[serde(default)]
    pub answer_text: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Checks an answer's content against the type of the question it answers.
pub fn validate_answer(
    question_type: QuestionType,
    answer_text: Option<&str>,
    selected_options: &[String],
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if is_blank_opt(answer_text) && selected_options.is_empty() {
        errors.add_base("Must provide an answer");
    }
    if question_type.uses_options() {
        if selected_options.is_empty() {
            errors.add("selected_options", "is required for this question type");
        }
    } else if is_blank_opt(answer_text) {
        errors.add("answer_text", "is required for text questions");
    }
    errors
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Any stored row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Institution(Institution),
    User(User),
    Evaluation(Evaluation),
    Question(Question),
    EvaluationQuestion(EvaluationQuestion),
    Answer(Answer),
}

impl Record {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Record::Institution(_) => ResourceType::Institution,
            Record::User(_) => ResourceType::User,
            Record::Evaluation(_) => ResourceType::Evaluation,
            Record::Question(_) => ResourceType::Question,
            Record::EvaluationQuestion(_) => ResourceType::EvaluationQuestion,
            Record::Answer(_) => ResourceType::Answer,
        }
    }

    pub fn id(&self) -> ResourceId {
        match self {
            Record::Institution(r) => r.id,
            Record::User(r) => r.id,
            Record::Evaluation(r) => r.id,
            Record::Question(r) => r.id,
            Record::EvaluationQuestion(r) => r.id,
            Record::Answer(r) => r.id,
        }
    }

    /// Value of the foreign key column pointing at `target`, if this type has one.
    pub fn foreign_key(&self, target: ResourceType) -> Option<ResourceId> {
        use ResourceType as T;
        match (self, target) {
            (Record::User(r), T::Institution) => Some(r.institution_id),
            (Record::Evaluation(r), T::Institution) => Some(r.institution_id),
            (Record::Question(r), T::Institution) => Some(r.institution_id),
            (Record::EvaluationQuestion(r), T::Evaluation) => Some(r.evaluation_id),
            (Record::EvaluationQuestion(r), T::Question) => Some(r.question_id),
            (Record::Answer(r), T::User) => Some(r.user_id),
            (Record::Answer(r), T::EvaluationQuestion) => Some(r.evaluation_question_id),
            _ => None,
        }
    }

    pub fn deleted_at(&self) -> Option<OffsetDateTime> {
        match self {
            Record::Evaluation(r) => r.deleted_at,
            Record::Question(r) => r.deleted_at,
            _ => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }

    /// Sets or clears the soft-delete marker. Returns `false` for types without one.
    pub fn set_deleted_at(&mut self, at: Option<OffsetDateTime>) -> bool {
        match self {
            Record::Evaluation(r) => r.deleted_at = at,
            Record::Question(r) => r.deleted_at = at,
            _ => return false,
        }
        true
    }

    pub fn created_at(&self) -> OffsetDateTime {
        match self {
            Record::Institution(r) => r.created_at,
            Record::User(r) => r.created_at,
            Record::Evaluation(r) => r.created_at,
            Record::Question(r) => r.created_at,
            Record::EvaluationQuestion(r) => r.created_at,
            Record::Answer(r) => r.created_at,
        }
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        match self {
            Record::Institution(r) => r.updated_at = now,
            Record::User(r) => r.updated_at = now,
            Record::Evaluation(r) => r.updated_at = now,
            Record::Question(r) => r.updated_at = now,
            Record::EvaluationQuestion(r) => r.updated_at = now,
            Record::Answer(r) => r.updated_at = now,
        }
    }

    /// Single-record attribute checks. Cross-record checks (foreign keys,
    /// uniqueness, answer shape vs. question type) happen elsewhere.
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        match self {
            Record::Institution(r) => {
                if is_blank(&r.name) {
                    errors.add("name", BLANK);
                }
            }
            Record::User(r) => {
                if is_blank(&r.name) {
                    errors.add("name", BLANK);
                }
                if r.role == Role::Instructor && is_blank_opt(r.email.as_deref()) {
                    errors.add("email", BLANK);
                }
            }
            Record::Evaluation(r) => {
                if is_blank(&r.name) {
                    errors.add("name", BLANK);
                }
                if !Evaluation::is_valid_access_code(&r.access_code) {
                    errors.add("access_code", "is invalid");
                }
            }
            Record::Question(r) => {
                if is_blank(&r.question_text) {
                    errors.add("question_text", BLANK);
                }
            }
            Record::EvaluationQuestion(r) => {
                if r.position == 0 {
                    errors.add("position", "must be greater than 0");
                }
            }
            Record::Answer(r) => {
                if is_blank_opt(r.answer_text.as_deref()) && r.selected_options.is_empty() {
                    errors.add_base("Must provide an answer");
                }
            }
        }
        errors
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Parses a serialized row of `resource_type`.
    pub fn from_json(
        resource_type: ResourceType,
        value: serde_json::Value,
    ) -> Result<Self, CoreError> {
        Ok(match resource_type {
            ResourceType::Institution => Record::Institution(serde_json::from_value(value)?),
            ResourceType::User => Record::User(serde_json::from_value(value)?),
            ResourceType::Evaluation => Record::Evaluation(serde_json::from_value(value)?),
            ResourceType::Question => Record::Question(serde_json::from_value(value)?),
            ResourceType::EvaluationQuestion => {
                Record::EvaluationQuestion(serde_json::from_value(value)?)
            }
            ResourceType::Answer => Record::Answer(serde_json::from_value(value)?),
        })
    }

    /// Copy of this row with `attributes` written over its columns.
    ///
    /// `id`, timestamps and `deleted_at` are never overwritten.
    pub fn merged(
        &self,
        attributes: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, CoreError> {
        let mut json = self.to_json();
        if let serde_json::Value::Object(columns) = &mut json {
            for (name, value) in attributes {
                if !IMMUTABLE_COLUMNS.contains(&name.as_str()) {
                    columns.insert(name.clone(), value.clone());
                }
            }
        }
        let mut merged = Record::from_json(self.resource_type(), json)?;
        if let (Record::User(merged), Record::User(current)) = (&mut merged, self) {
            merged.password_hash = current.password_hash.clone();
        }
        Ok(merged)
    }
}

const IMMUTABLE_COLUMNS: &[&str] = &["id", "created_at", "updated_at", "deleted_at"];

/// Typed access to a [`Record`] variant.
pub trait Model: Sized {
    const RESOURCE_TYPE: ResourceType;

    fn id(&self) -> ResourceId;
    fn into_record(self) -> Record;
    fn from_record(record: Record) -> Option<Self>;
    fn from_record_ref(record: &Record) -> Option<&Self>;
}

macro_rules! impl_model {
    ($model:ident) => {
        impl Model for $model {
            const RESOURCE_TYPE: ResourceType = ResourceType::$model;

            fn id(&self) -> ResourceId {
                self.id
            }

            fn into_record(self) -> Record {
                Record::$model(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$model(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_record_ref(record: &Record) -> Option<&Self> {
                match record {
                    Record::$model(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$model> for Record {
            fn from(model: $model) -> Self {
                Record::$model(model)
            }
        }
    };
}

impl_model!(Institution);
impl_model!(User);
impl_model!(Evaluation);
impl_model!(Question);
impl_model!(EvaluationQuestion);
impl_model!(Answer);

// ---------------------------------------------------------------------------
// Insert drafts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewInstitution {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub institution_id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(skip)]
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewEvaluation {
    pub institution_id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Generated by storage when absent.
    #[serde(default)]
    pub access_code: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewQuestion {
    pub institution_id: ResourceId,
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewEvaluationQuestion {
    pub evaluation_id: ResourceId,
    pub question_id: ResourceId,
    /// Storage assigns the next free position when absent.
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub is_modified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAnswer {
    pub user_id: ResourceId,
    pub evaluation_question_id: ResourceId,
    #[serde(default)]
    pub answer_text: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<String>,
}

/// A row to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewRecord {
    Institution(NewInstitution),
    User(NewUser),
    Evaluation(NewEvaluation),
    Question(NewQuestion),
    EvaluationQuestion(NewEvaluationQuestion),
    Answer(NewAnswer),
}

impl NewRecord {
    /// Builds the draft for `resource_type` from a JSON object of its columns.
    pub fn from_json(
        resource_type: ResourceType,
        value: serde_json::Value,
    ) -> Result<Self, CoreError> {
        Ok(match resource_type {
            ResourceType::Institution => NewRecord::Institution(serde_json::from_value(value)?),
            ResourceType::User => NewRecord::User(serde_json::from_value(value)?),
            ResourceType::Evaluation => NewRecord::Evaluation(serde_json::from_value(value)?),
            ResourceType::Question => NewRecord::Question(serde_json::from_value(value)?),
            ResourceType::EvaluationQuestion => {
                NewRecord::EvaluationQuestion(serde_json::from_value(value)?)
            }
            ResourceType::Answer => NewRecord::Answer(serde_json::from_value(value)?),
        })
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            NewRecord::Institution(_) => ResourceType::Institution,
            NewRecord::User(_) => ResourceType::User,
            NewRecord::Evaluation(_) => ResourceType::Evaluation,
            NewRecord::Question(_) => ResourceType::Question,
            NewRecord::EvaluationQuestion(_) => ResourceType::EvaluationQuestion,
            NewRecord::Answer(_) => ResourceType::Answer,
        }
    }

    /// Materializes the draft. Missing access codes and positions must have
    /// been filled in by the caller; otherwise they fall back to an empty code
    /// and position 1 and are caught by [`Record::validate`].
    pub fn into_record(self, id: ResourceId, now: OffsetDateTime) -> Record {
        match self {
            NewRecord::Institution(d) => Record::Institution(Institution {
                id,
                name: d.name,
                description: d.description,
                created_at: now,
                updated_at: now,
            }),
            NewRecord::User(d) => Record::User(User {
                id,
                institution_id: d.institution_id,
                name: d.name,
                email: d.email,
                role: d.role,
                password_hash: d.password_hash,
                created_at: now,
                updated_at: now,
            }),
            NewRecord::Evaluation(d) => Record::Evaluation(Evaluation {
                id,
                institution_id: d.institution_id,
                name: d.name,
                description: d.description,
                access_code: d.access_code.unwrap_or_default(),
                is_active: d.is_active,
                deleted_at: None,
                created_at: now,
                updated_at: now,
            }),
            NewRecord::Question(d) => Record::Question(Question {
                id,
                institution_id: d.institution_id,
                question_text: d.question_text,
                question_type: d.question_type,
                options: d.options,
                deleted_at: None,
                created_at: now,
                updated_at: now,
            }),
            NewRecord::EvaluationQuestion(d) => Record::EvaluationQuestion(EvaluationQuestion {
                id,
                evaluation_id: d.evaluation_id,
                question_id: d.question_id,
                position: d.position.unwrap_or(1),
                is_modified: d.is_modified,
                created_at: now,
                updated_at: now,
            }),
            NewRecord::Answer(d) => Record::Answer(Answer {
                id,
                user_id: d.user_id,
                evaluation_question_id: d.evaluation_question_id,
                answer_text: d.answer_text,
                selected_options: d.selected_options,
                created_at: now,
                updated_at: now,
            }),
        }
    }
}

macro_rules! impl_new_record_from {
    ($draft:ident => $variant:ident) => {
        impl From<$draft> for NewRecord {
            fn from(draft: $draft) -> Self {
                NewRecord::$variant(draft)
            }
        }
    };
}

impl_new_record_from!(NewInstitution => Institution);
impl_new_record_from!(NewUser => User);
impl_new_record_from!(NewEvaluation => Evaluation);
impl_new_record_from!(NewQuestion => Question);
impl_new_record_from!(NewEvaluationQuestion => EvaluationQuestion);
impl_new_record_from!(NewAnswer => Answer);

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn id(n: u64) -> ResourceId {
        ResourceId::new(n)
    }

    #[test]
    fn access_codes_are_eight_uppercase_alphanumerics() {
        for _ in 0..50 {
            let code = Evaluation::generate_access_code();
            assert!(Evaluation::is_valid_access_code(&code), "bad code {code}");
        }
        assert!(!Evaluation::is_valid_access_code("abcd1234"));
        assert!(!Evaluation::is_valid_access_code("ABC"));
    }

    #[test]
    fn foreign_keys_are_exposed_per_type() {
        let record = NewRecord::from(NewAnswer {
            user_id: id(4),
            evaluation_question_id: id(9),
            answer_text: Some("fine".into()),
            selected_options: vec![],
        })
        .into_record(id(1), now());

        assert_eq!(record.foreign_key(ResourceType::User), Some(id(4)));
        assert_eq!(record.foreign_key(ResourceType::EvaluationQuestion), Some(id(9)));
        assert_eq!(record.foreign_key(ResourceType::Institution), None);
    }

    #[test]
    fn soft_delete_only_applies_to_evaluations_and_questions() {
        let mut institution = NewRecord::from(NewInstitution {
            name: "Acme".into(),
            description: None,
        })
        .into_record(id(1), now());
        assert!(!institution.set_deleted_at(Some(now())));
        assert!(!institution.is_deleted());

        let mut question = NewRecord::from(NewQuestion {
            institution_id: id(1),
            question_text: "How was it?".into(),
            question_type: QuestionType::Text,
            options: vec![],
        })
        .into_record(id(2), now());
        assert!(question.set_deleted_at(Some(now())));
        assert!(question.is_deleted());
    }

    #[test]
    fn record_validation() {
        let instructor = NewRecord::from(NewUser {
            institution_id: id(1),
            name: "Dana".into(),
            email: None,
            role: Role::Instructor,
            password_hash: None,
        })
        .into_record(id(1), now());
        assert_eq!(instructor.validate().get("email"), Some(&[BLANK.to_string()][..]));

        let eq = NewRecord::from(NewEvaluationQuestion {
            evaluation_id: id(1),
            question_id: id(1),
            position: Some(0),
            is_modified: false,
        })
        .into_record(id(1), now());
        assert!(eq.validate().get("position").is_some());
    }

    #[test]
    fn answer_validation_by_question_type() {
        let errors = validate_answer(QuestionType::Text, None, &[]);
        assert_eq!(
            errors.full_messages(),
            vec![
                "Must provide an answer".to_string(),
                "Answer text is required for text questions".to_string()
            ]
        );

        let errors = validate_answer(QuestionType::RatingScale, Some("5"), &[]);
        assert_eq!(
            errors.full_messages(),
            vec!["Selected options is required for this question type".to_string()]
        );

        assert!(validate_answer(QuestionType::Emoji, None, &["smile".into()]).is_empty());
        assert!(validate_answer(QuestionType::Text, Some("ok"), &[]).is_empty());
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: id(1),
            institution_id: id(1),
            name: "Dana".into(),
            email: Some("dana@example.edu".into()),
            role: Role::Instructor,
            password_hash: Some("secret-hash".into()),
            created_at: now(),
            updated_at: now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "instructor");
    }

    #[test]
    fn merged_keeps_identity_columns() {
        let record = NewRecord::from(NewEvaluationQuestion {
            evaluation_id: id(1),
            question_id: id(2),
            position: Some(1),
            is_modified: false,
        })
        .into_record(id(7), now());
        let patch = serde_json::json!({"id": 99, "position": 4, "is_modified": true});
        let merged = record.merged(patch.as_object().unwrap()).unwrap();
        assert_eq!(merged.id(), id(7));
        assert_eq!(merged.created_at(), record.created_at());
        match merged {
            Record::EvaluationQuestion(link) => {
                assert_eq!(link.position, 4);
                assert!(link.is_modified);
            }
            other => panic!("unexpected {other:?}"),
        }

        let bad = serde_json::json!({"position": "first"});
        assert!(record.merged(bad.as_object().unwrap()).is_err());
    }

    #[test]
    fn drafts_from_json() {
        let draft = NewRecord::from_json(
            ResourceType::EvaluationQuestion,
            serde_json::json!({"evaluation_id": 1, "question_id": 2}),
        )
        .unwrap();
        assert_eq!(
            draft,
            NewRecord::EvaluationQuestion(NewEvaluationQuestion {
                evaluation_id: id(1),
                question_id: id(2),
                position: None,
                is_modified: false,
            })
        );

        let user = NewRecord::from_json(
            ResourceType::User,
            serde_json::json!({"institution_id": 1, "name": "Ana", "password_hash": "x"}),
        )
        .unwrap();
        match user {
            NewRecord::User(user) => {
                assert_eq!(user.role, Role::Student);
                assert!(user.password_hash.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn typed_conversions() {
        let record = NewRecord::from(NewInstitution {
            name: "Acme".into(),
            description: None,
        })
        .into_record(id(5), now());
        assert!(Institution::from_record_ref(&record).is_some());
        assert!(User::from_record_ref(&record).is_none());
        let inst = Institution::from_record(record).unwrap();
        assert_eq!(inst.id(), id(5));
    }
}
