//! Role and tenant access policy.
//!
//! Predicates are total over `(principal, resolved chain)`. The `require_*`
//! guards turn a negative decision into [`AuthError::Forbidden`] with a fixed
//! message. Guards run after authentication and after resolution, so a
//! resource the caller cannot see has already surfaced as 404.

use evalhub_core::{Answer, Principal, ResolvedChain, Role};

use crate::AuthResult;
use crate::error::AuthError;

pub const INSTRUCTOR_REQUIRED: &str = "Instructor access required";
pub const NO_EVALUATION_ACCESS: &str = "You don't have access to this evaluation";
pub const NO_EVALUATION_MANAGEMENT: &str = "You don't have permission to manage this evaluation";
pub const OWN_ANSWERS_ONLY: &str = "You can only access your own answers";
pub const SAME_INSTITUTION_ONLY: &str = "You can only access resources from your institution";

const BASE_PERMISSIONS: &[&str] = &["view_evaluations", "submit_answers", "view_own_answers"];

const INSTRUCTOR_PERMISSIONS: &[&str] = &[
    "create_evaluations",
    "edit_evaluations",
    "delete_evaluations",
    "create_questions",
    "edit_questions",
    "delete_questions",
    "view_all_answers",
    "manage_users",
    "view_analytics",
];

pub fn is_instructor(principal: &Principal) -> bool {
    principal.role == Role::Instructor
}

pub fn is_student(principal: &Principal) -> bool {
    principal.role == Role::Student
}

/// The chain's institution node is the principal's institution.
pub fn same_tenant(principal: &Principal, chain: &ResolvedChain) -> bool {
    chain.institution_id() == Some(principal.institution_id)
}

pub fn can_access(principal: &Principal, chain: &ResolvedChain) -> bool {
    same_tenant(principal, chain)
}

pub fn can_manage(principal: &Principal, chain: &ResolvedChain) -> bool {
    can_access(principal, chain) && is_instructor(principal)
}

pub fn owns_or_is_instructor(principal: &Principal, answer: &Answer) -> bool {
    answer.user_id == principal.id || is_instructor(principal)
}

/// Capability strings reported to clients at sign-in.
pub fn permissions_for(role: Role) -> Vec<&'static str> {
    let mut permissions = BASE_PERMISSIONS.to_vec();
    if role == Role::Instructor {
        permissions.extend_from_slice(INSTRUCTOR_PERMISSIONS);
    }
    permissions
}

fn deny(principal: &Principal, message: &'static str) -> AuthError {
    tracing::debug!(
        principal_id = %principal.id,
        role = %principal.role,
        reason = message,
        "access denied"
    );
    AuthError::forbidden(message)
}

pub fn require_instructor(principal: &Principal) -> AuthResult<()> {
    if is_instructor(principal) {
        Ok(())
    } else {
        Err(deny(principal, INSTRUCTOR_REQUIRED))
    }
}

pub fn require_same_tenant(principal: &Principal, chain: &ResolvedChain) -> AuthResult<()> {
    if same_tenant(principal, chain) {
        Ok(())
    } else {
        Err(deny(principal, SAME_INSTITUTION_ONLY))
    }
}

pub fn require_access(principal: &Principal, chain: &ResolvedChain) -> AuthResult<()> {
    if can_access(principal, chain) {
        Ok(())
    } else {
        Err(deny(principal, NO_EVALUATION_ACCESS))
    }
}

pub fn require_management(principal: &Principal, chain: &ResolvedChain) -> AuthResult<()> {
    if can_manage(principal, chain) {
        Ok(())
    } else {
        Err(deny(principal, NO_EVALUATION_MANAGEMENT))
    }
}

pub fn require_ownership(principal: &Principal, answer: &Answer) -> AuthResult<()> {
    if owns_or_is_instructor(principal, answer) {
        Ok(())
    } else {
        Err(deny(principal, OWN_ANSWERS_ONLY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalhub_core::{
        NewAnswer, NewEvaluation, NewInstitution, NewRecord, Record, ResourceId,
    };
    use time::OffsetDateTime;

    fn id(n: u64) -> ResourceId {
        ResourceId::new(n)
    }

    fn record(draft: impl Into<NewRecord>, row_id: u64) -> Record {
        draft.into().into_record(id(row_id), OffsetDateTime::now_utc())
    }

    fn evaluation_chain(institution: u64) -> ResolvedChain {
        let inst = record(
            NewInstitution {
                name: "Acme".into(),
                description: None,
            },
            institution,
        );
        let eval = record(
            NewEvaluation {
                institution_id: id(institution),
                name: "Midterm".into(),
                description: None,
                is_active: true,
                access_code: Some("ABCD1234".into()),
            },
            50,
        );
        ResolvedChain::new(eval, vec![inst])
    }

    fn answer_by(user: u64) -> Answer {
        let rec = record(
            NewAnswer {
                user_id: id(user),
                evaluation_question_id: id(9),
                answer_text: Some("ok".into()),
                selected_options: vec![],
            },
            77,
        );
        match rec {
            Record::Answer(answer) => answer,
            _ => unreachable!(),
        }
    }

    #[test]
    fn can_manage_truth_table() {
        let chain = evaluation_chain(1);
        let cases = [
            (Role::Instructor, 1, true),
            (Role::Instructor, 2, false),
            (Role::Student, 1, false),
            (Role::Student, 2, false),
        ];
        for (role, institution, expected) in cases {
            let principal = Principal::new(id(5), id(institution), role);
            assert_eq!(can_manage(&principal, &chain), expected, "{role} @ {institution}");
            assert_eq!(require_management(&principal, &chain).is_ok(), expected);
        }
    }

    #[test]
    fn access_is_tenant_scoped() {
        let chain = evaluation_chain(1);
        let local = Principal::new(id(5), id(1), Role::Student);
        let foreign = Principal::new(id(6), id(2), Role::Instructor);
        assert!(can_access(&local, &chain));
        assert!(!can_access(&foreign, &chain));
        let err = require_access(&foreign, &chain).unwrap_err();
        assert_eq!(err.to_string(), NO_EVALUATION_ACCESS);
        let err = require_same_tenant(&foreign, &chain).unwrap_err();
        assert_eq!(err.to_string(), SAME_INSTITUTION_ONLY);
    }

    #[test]
    fn ownership() {
        let answer = answer_by(5);
        let author = Principal::new(id(5), id(1), Role::Student);
        let other = Principal::new(id(6), id(1), Role::Student);
        let instructor = Principal::new(id(7), id(1), Role::Instructor);
        assert!(owns_or_is_instructor(&author, &answer));
        assert!(owns_or_is_instructor(&instructor, &answer));
        assert!(!owns_or_is_instructor(&other, &answer));
        assert_eq!(
            require_ownership(&other, &answer).unwrap_err().to_string(),
            OWN_ANSWERS_ONLY
        );
    }

    #[test]
    fn roles_and_permissions() {
        let student = Principal::new(id(1), id(1), Role::Student);
        assert!(is_student(&student));
        assert!(!is_instructor(&student));
        assert!(require_instructor(&student).is_err());

        assert_eq!(permissions_for(Role::Student), BASE_PERMISSIONS.to_vec());
        let instructor = permissions_for(Role::Instructor);
        assert_eq!(instructor.len(), 12);
        assert!(instructor.contains(&"manage_users"));
    }
}
