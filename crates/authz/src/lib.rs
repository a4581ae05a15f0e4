//! Ownership policy for owned resources.
//!
//! The policy is a pure decision over `(actor, action, owner)`. Handlers call
//! [`check_view`] before touching storage and [`check_object`] once the
//! instance is loaded; [`authorize`] combines both.

use std::fmt;

/// Operation requested against an owned resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Retrieve,
    Update,
    Delete,
}

impl Action {
    /// Reads never require ownership.
    pub fn is_read(self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }

    /// Listing is the only operation open to anonymous callers.
    pub fn requires_authentication(self) -> bool {
        !matches!(self, Action::List)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::List => "list",
            Action::Create => "create",
            Action::Retrieve => "retrieve",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No credential was presented for an operation that needs one.
    Unauthenticated,
    /// Valid credential, but the actor does not own the instance.
    Forbidden,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// View-level rule: is an actor required for this action at all?
pub fn check_view<U>(actor: Option<&U>, action: Action) -> Decision {
    if actor.is_none() && action.requires_authentication() {
        tracing::debug!(%action, "anonymous caller rejected");
        return Decision::Unauthenticated;
    }
    Decision::Allow
}

/// Object-level rule: only the owner may mutate an instance.
pub fn check_object<U: PartialEq>(actor: Option<&U>, action: Action, owner: &U) -> Decision {
    if action.is_read() {
        return Decision::Allow;
    }
    match actor {
        None => Decision::Unauthenticated,
        Some(actor) if actor == owner => Decision::Allow,
        Some(_) => {
            tracing::debug!(%action, "non-owner mutation rejected");
            Decision::Forbidden
        }
    }
}

/// Full decision for `actor` performing `action`, on an instance owned by
/// `owner` when one exists.
pub fn authorize<U: PartialEq>(actor: Option<&U>, action: Action, owner: Option<&U>) -> Decision {
    match check_view(actor, action) {
        Decision::Allow => {}
        denied => return denied,
    }
    match owner {
        Some(owner) => check_object(actor, action, owner),
        None => Decision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: u64 = 1;
    const OTHER: u64 = 2;

    #[test]
    fn anonymous_may_only_list() {
        assert_eq!(authorize::<u64>(None, Action::List, None), Decision::Allow);
        assert_eq!(
            authorize::<u64>(None, Action::Create, None),
            Decision::Unauthenticated
        );
        for action in [Action::Retrieve, Action::Update, Action::Delete] {
            assert_eq!(
                authorize(None, action, Some(&OWNER)),
                Decision::Unauthenticated,
                "{action}"
            );
        }
    }

    #[test]
    fn authenticated_caller_may_create() {
        assert_eq!(
            authorize(Some(&OTHER), Action::Create, None),
            Decision::Allow
        );
    }

    #[test]
    fn only_owner_mutates() {
        for action in [Action::Update, Action::Delete] {
            assert_eq!(
                authorize(Some(&OWNER), action, Some(&OWNER)),
                Decision::Allow
            );
            assert_eq!(
                authorize(Some(&OTHER), action, Some(&OWNER)),
                Decision::Forbidden
            );
        }
    }

    #[test]
    fn non_owner_may_read() {
        assert_eq!(
            authorize(Some(&OTHER), Action::Retrieve, Some(&OWNER)),
            Decision::Allow
        );
        assert_eq!(
            check_object(Some(&OTHER), Action::List, &OWNER),
            Decision::Allow
        );
    }

    #[test]
    fn unauthenticated_and_forbidden_are_distinct() {
        let anonymous = authorize(None, Action::Delete, Some(&OWNER));
        let stranger = authorize(Some(&OTHER), Action::Delete, Some(&OWNER));
        assert_ne!(anonymous, stranger);
        assert!(!anonymous.is_allowed());
        assert!(!stranger.is_allowed());
    }
}
