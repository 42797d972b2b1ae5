//! The rules deciding which callers may perform which actions on organisations.
//!
//! Roles grant actions through a static table. Update and delete are additionally open to the
//! owner of the record being acted on.

use std::collections::BTreeSet;

use error_stack::Report;

use super::{AuthInfo, ADMIN_ROLE, GUEST_ROLE, USER_ROLE};
use crate::{models::organisation::OrganisationPopulated, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    fn allows_owner(&self) -> bool {
        matches!(self, Action::Update | Action::Delete)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// The actions a role may perform on organisations.
#[derive(Debug)]
pub struct RoleGrant {
    pub role: &'static str,
    /// `None` grants every action
    pub actions: Option<&'static [Action]>,
}

pub const GRANTS: &[RoleGrant] = &[
    RoleGrant {
        role: GUEST_ROLE,
        actions: Some(&[Action::List, Action::Read]),
    },
    RoleGrant {
        role: USER_ROLE,
        actions: Some(&[Action::List, Action::Create, Action::Read]),
    },
    RoleGrant {
        role: ADMIN_ROLE,
        actions: None,
    },
];

/// The roles held by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    /// Anonymous callers are guests. Every authenticated caller holds `user` in addition to
    /// their own roles.
    pub fn for_caller(caller: Option<&AuthInfo>) -> RoleSet {
        let roles = match caller {
            None => BTreeSet::from([GUEST_ROLE.to_string()]),
            Some(info) => info
                .roles
                .iter()
                .cloned()
                .chain(std::iter::once(USER_ROLE.to_string()))
                .collect(),
        };

        RoleSet(roles)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    fn grants(&self, action: Action) -> bool {
        GRANTS
            .iter()
            .filter(|grant| self.contains(grant.role))
            .any(|grant| match grant.actions {
                None => true,
                Some(actions) => actions.contains(&action),
            })
    }
}

/// Decide whether a caller holding `roles` may perform `action`. `owner_match` must only be true
/// when an authenticated caller owns the target record.
pub fn authorize(action: Action, owner_match: bool, roles: &RoleSet) -> Decision {
    if roles.grants(action) || (owner_match && action.allows_owner()) {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Check that the caller may perform `action`, on `target` if the action has one.
pub fn check(
    action: Action,
    caller: Option<&AuthInfo>,
    target: Option<&OrganisationPopulated>,
) -> Result<(), Report<Error>> {
    let roles = RoleSet::for_caller(caller);
    let owner_match = target
        .map(|target| target.is_owned_by(caller.map(|info| info.user_id)))
        .unwrap_or(false);

    match authorize(action, owner_match, &roles) {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(Report::new(Error::Forbidden)
            .attach_printable(format!("action: {action}"))
            .attach_printable(format!("roles: {:?}", roles.0))),
    }
}

/// Check an action that records who performed it, returning the caller's identity. Anonymous
/// callers are refused even if a role grants the action.
pub fn check_authenticated(
    action: Action,
    caller: Option<&AuthInfo>,
) -> Result<&AuthInfo, Report<Error>> {
    check(action, caller, None)?;
    caller.ok_or_else(|| {
        Report::new(Error::Forbidden).attach_printable(format!("action {action} needs a caller"))
    })
}
