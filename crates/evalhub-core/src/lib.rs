//! # evalhub-core
//!
//! Core types shared by every EvalHub crate:
//!
//! - [`ResourceType`] and [`ResourceId`] - the closed set of resource kinds and their identifiers
//! - [`model`] - domain records (institutions, users, evaluations, questions, answers)
//! - [`hierarchy`] - the declarative parent graph and join-resource registry
//! - [`ResolvedChain`] - a validated target resource together with its ancestors
//! - [`Principal`] - an authenticated actor
//!
//! Nothing in this crate performs I/O. Storage lives behind `evalhub-storage`,
//! resolution and HTTP handling live in `evalhub-server`.

pub mod chain;
pub mod error;
pub mod hierarchy;
pub mod id;
pub mod model;
pub mod principal;
pub mod resource;
pub mod validation;

pub use chain::ResolvedChain;
pub use error::{CoreError, Result};
pub use hierarchy::{HierarchyConfig, HierarchyDeclaration, HierarchyError, JoinDescriptor};
pub use id::ResourceId;
pub use model::{
    Answer, Evaluation, EvaluationQuestion, Institution, Model, NewAnswer, NewEvaluation,
    NewEvaluationQuestion, NewInstitution, NewQuestion, NewRecord, NewUser, Question,
    QuestionType, Record, Role, User, validate_answer,
};
pub use principal::Principal;
pub use resource::{ResourceRef, ResourceType};
pub use validation::ValidationErrors;
