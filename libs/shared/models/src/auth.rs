use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is calling, as established by the identity layer upstream of this
/// engine. The engine never authenticates; it only authorizes against the
/// id and role handed to it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: Uuid,
    pub role: ActorRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Doctor,
    Patient,
}

impl ActorContext {
    pub fn doctor(actor_id: Uuid) -> Self {
        Self {
            actor_id,
            role: ActorRole::Doctor,
        }
    }

    pub fn patient(actor_id: Uuid) -> Self {
        Self {
            actor_id,
            role: ActorRole::Patient,
        }
    }

    pub fn is_doctor(&self) -> bool {
        self.role == ActorRole::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == ActorRole::Patient
    }
}
