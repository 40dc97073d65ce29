use serde::{Deserialize, Serialize};

use crate::id::ResourceId;
use crate::model::{Role, User};

/// The authenticated actor behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: ResourceId,
    pub institution_id: ResourceId,
    pub role: Role,
}

impl Principal {
    pub const fn new(id: ResourceId, institution_id: ResourceId, role: Role) -> Self {
        Self {
            id,
            institution_id,
            role,
        }
    }

    pub fn is_instructor(&self) -> bool {
        self.role == Role::Instructor
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.institution_id, user.role)
    }
}
