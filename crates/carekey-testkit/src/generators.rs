//! Proptest generators for property-based testing.

use proptest::prelude::*;

use carekey_core::{
    AccessAction, AccessGrant, AccessScope, DataCategory, FacilityId, GrantId, OwnerId,
    ProfessionalId, SessionToken, MAX_DURATION_SECS, MIN_DURATION_SECS,
};

/// Generate a random OwnerId.
pub fn owner_id() -> impl Strategy<Value = OwnerId> {
    any::<[u8; 32]>().prop_map(OwnerId::from_bytes)
}

/// Generate a random ProfessionalId.
pub fn professional_id() -> impl Strategy<Value = ProfessionalId> {
    any::<[u8; 32]>().prop_map(ProfessionalId::from_bytes)
}

/// Generate a random FacilityId.
pub fn facility_id() -> impl Strategy<Value = FacilityId> {
    any::<[u8; 32]>().prop_map(FacilityId::from_bytes)
}

/// Generate a random GrantId.
pub fn grant_id() -> impl Strategy<Value = GrantId> {
    any::<[u8; 32]>().prop_map(GrantId::from_bytes)
}

/// Generate a concrete (non-wildcard) data category.
pub fn concrete_category() -> impl Strategy<Value = DataCategory> {
    prop::sample::select(DataCategory::CONCRETE.to_vec())
}

/// Generate any data category, wildcard included.
pub fn category() -> impl Strategy<Value = DataCategory> {
    prop_oneof![
        Just(DataCategory::All),
        concrete_category(),
    ]
}

/// Generate an access action.
pub fn action() -> impl Strategy<Value = AccessAction> {
    prop_oneof![
        Just(AccessAction::Read),
        Just(AccessAction::Write),
        Just(AccessAction::Append),
        Just(AccessAction::Share),
    ]
}

/// Generate a duration inside the accepted bounds.
pub fn duration_secs() -> impl Strategy<Value = u32> {
    MIN_DURATION_SECS..=MAX_DURATION_SECS
}

/// Generate a justification that passes validation.
pub fn justification() -> impl Strategy<Value = String> {
    "[a-z]{8,24}( [a-z]{1,12}){0,4}".prop_map(String::from)
}

/// Generate a reasonable issuance timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 4
}

/// Generate a valid scope.
pub fn scope() -> impl Strategy<Value = AccessScope> {
    (
        prop::collection::btree_set(category(), 1..4),
        prop::collection::btree_set(action(), 1..4),
        duration_secs(),
        justification(),
    )
        .prop_map(|(categories, actions, duration, justification)| {
            AccessScope::new(categories, actions, duration, &justification)
                .expect("generated scope is valid")
        })
}

/// Generate a grant issued at a generated timestamp.
pub fn grant() -> impl Strategy<Value = AccessGrant> {
    (
        owner_id(),
        professional_id(),
        facility_id(),
        scope(),
        any::<[u8; 32]>(),
        timestamp(),
    )
        .prop_map(|(owner, professional, facility, scope, token, issued_at)| {
            AccessGrant::issue(
                owner,
                professional,
                facility,
                scope,
                SessionToken::from_bytes(token),
                issued_at,
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_expiry_arithmetic(grant in grant()) {
            prop_assert_eq!(
                grant.expires_at_ms,
                grant.issued_at_ms + i64::from(grant.scope.duration_secs()) * 1000
            );
        }

        #[test]
        fn prop_grant_valid_until_strictly_past_expiry(grant in grant()) {
            prop_assert!(grant.is_valid(grant.expires_at_ms));
            prop_assert!(!grant.is_valid(grant.expires_at_ms + 1));
        }

        #[test]
        fn prop_scope_covers_its_own_categories(scope in scope()) {
            for category in scope.categories() {
                if *category != DataCategory::All {
                    prop_assert!(scope.covers_category(*category));
                }
            }
        }

        #[test]
        fn prop_wildcard_scope_covers_everything(
            actions in prop::collection::btree_set(action(), 1..4),
            duration in duration_secs(),
            justification in justification(),
            probe in concrete_category(),
        ) {
            let scope = AccessScope::new(
                [DataCategory::All],
                actions,
                duration,
                &justification,
            ).unwrap();
            prop_assert!(scope.covers_category(probe));
        }

        #[test]
        fn prop_containment_is_monotone(scope in scope(), probe in concrete_category()) {
            // A covered single category is still covered inside any
            // superset of touched categories that the scope covers.
            if scope.covers_category(probe) {
                prop_assert!(scope.covers_categories([probe].iter()));
            }
        }

        #[test]
        fn prop_write_satisfied_by_append_holder(scope in scope()) {
            if scope.actions().contains(&AccessAction::Append) {
                prop_assert!(scope.covers_action(AccessAction::Write));
            }
        }
    }
}
