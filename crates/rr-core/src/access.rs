//! Ownership gating: admins see everything, everyone else sees their own.

use crate::models::{Incident, IncidentFilter, User};

/// Which incidents a user may read or mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentScope {
    All,
    OwnedBy(i64),
}

impl IncidentScope {
    pub fn for_user(user: &User) -> Self {
        if user.is_admin() {
            IncidentScope::All
        } else {
            IncidentScope::OwnedBy(user.id)
        }
    }

    /// Owner restriction to push down into repository queries.
    pub fn owner(&self) -> Option<i64> {
        match self {
            IncidentScope::All => None,
            IncidentScope::OwnedBy(id) => Some(*id),
        }
    }

    /// Narrows `filter` to this scope.
    pub fn restrict(&self, mut filter: IncidentFilter) -> IncidentFilter {
        filter.owner = self.owner();
        filter
    }
}

pub fn can_access(user: &User, incident: &Incident) -> bool {
    user.is_admin() || incident.user_id == user.id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, IncidentStatus, IncidentType, Role, SyncStatus};
    use chrono::Utc;

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: format!("user{}@example.org", id),
            password_hash: String::new(),
            role,
            phone_number: String::new(),
            name: None,
            token: None,
            is_active: true,
            date_joined: Utc::now(),
        }
    }

    fn incident_of(owner: i64) -> Incident {
        Incident {
            id: 1,
            title: "t".into(),
            description: "d".into(),
            incident_type: IncidentType::Fire,
            status: IncidentStatus::Pending,
            latitude: None,
            longitude: None,
            photo: Attachment::default(),
            voice_note: Attachment::default(),
            sync_status: SyncStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            user_id: owner,
        }
    }

    #[test]
    fn owner_and_admin_pass_others_fail() {
        let incident = incident_of(1);
        assert!(can_access(&user(1, Role::Citizen), &incident));
        assert!(!can_access(&user(2, Role::Citizen), &incident));
        assert!(can_access(&user(3, Role::Admin), &incident));
    }

    #[test]
    fn scope_restricts_filters() {
        let citizen = IncidentScope::for_user(&user(5, Role::Citizen));
        assert_eq!(citizen.restrict(IncidentFilter::default()).owner, Some(5));

        let admin = IncidentScope::for_user(&user(6, Role::Admin));
        let filter = IncidentFilter {
            owner: Some(99),
            ..Default::default()
        };
        assert_eq!(admin.restrict(filter).owner, None);
    }
}
