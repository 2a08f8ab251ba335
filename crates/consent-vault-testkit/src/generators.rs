//! Proptest generators for property-based testing.

use proptest::prelude::*;

use consent_vault_core::{
    Attribute, AttributeSet, ConsentState, PolicyExpression, PrincipalId, SubjectConsent, HOUR_MS,
};

/// A fixed reference instant for generated timelines.
pub const NOW: i64 = 1_736_870_400_000;

/// Generate a principal id.
pub fn principal() -> impl Strategy<Value = PrincipalId> {
    (1i64..=1_000_000).prop_map(PrincipalId::new)
}

/// Generate a catalog-style attribute name. Never starts with `owner:`.
pub fn attribute_name() -> impl Strategy<Value = String> {
    "[A-Z][A-Za-z ]{0,23}".prop_map(String::from)
}

/// Generate an attribute.
pub fn attribute() -> impl Strategy<Value = Attribute> {
    attribute_name().prop_filter_map("non-empty", |name| Attribute::new(name).ok())
}

/// Generate an attribute set of up to `max` attributes.
pub fn attribute_set(max: usize) -> impl Strategy<Value = AttributeSet> {
    prop::collection::vec(attribute(), 0..=max).prop_map(|attrs| attrs.into_iter().collect())
}

/// Generate a field value.
pub fn plaintext() -> impl Strategy<Value = String> {
    ".{0,128}".prop_map(String::from)
}

/// Generate a consent state.
pub fn consent_state() -> impl Strategy<Value = ConsentState> {
    prop_oneof![
        Just(ConsentState::Active),
        Just(ConsentState::NotAccepted),
        Just(ConsentState::Revoked),
        Just(ConsentState::Expired),
        Just(ConsentState::RevocationPending),
    ]
}

/// Generate a consent with timestamps within two days of [`NOW`].
pub fn subject_consent() -> impl Strategy<Value = SubjectConsent> {
    (
        attribute_name(),
        consent_state(),
        prop::option::of(-48 * HOUR_MS..=48 * HOUR_MS),
        prop::option::of(-48 * HOUR_MS..=0i64),
    )
        .prop_map(|(title, state, expires, requested)| SubjectConsent {
            title,
            state,
            expires_at: expires.map(|offset| NOW + offset),
            revocation_requested_at: requested.map(|offset| NOW + offset),
        })
}

/// A subject with its consent history.
#[derive(Debug, Clone)]
pub struct ScenarioParams {
    pub subject: PrincipalId,
    pub consents: Vec<SubjectConsent>,
}

impl Arbitrary for ScenarioParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (principal(), prop::collection::vec(subject_consent(), 0..8))
            .prop_map(|(subject, consents)| ScenarioParams { subject, consents })
            .boxed()
    }
}

/// Generate a policy of an owner literal plus up to `max_extra` attributes.
pub fn policy(max_extra: usize) -> impl Strategy<Value = PolicyExpression> {
    (principal(), prop::collection::vec(attribute(), 0..=max_extra)).prop_filter_map(
        "valid policy",
        |(subject, extra)| {
            PolicyExpression::any_of(std::iter::once(Attribute::owner(subject)).chain(extra)).ok()
        },
    )
}
