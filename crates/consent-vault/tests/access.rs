//! End-to-end write/read paths through the vault over an in-memory store.

use std::sync::Arc;

use consent_vault::store::{AttributeStore, FieldStore};
use consent_vault::{
    AccessOutcome, Attribute, AttributeSet, PolicyConstructionError, PrincipalId, ResolveError,
    Vault, VaultConfig, VaultError,
};
use consent_vault_core::{ConsentState, CoreError, PolicyCatalogEntry, HOUR_MS, MINUTE_MS};
use consent_vault_crypto::{FieldCipher, Keyring};
use consent_vault_store::MemoryStore;
use consent_vault_testkit::{catalog, FaultyStore, TestFixture, MARKETING, NOW, RESEARCH};

const SUBJECT: PrincipalId = PrincipalId(7);
const BOB: PrincipalId = PrincipalId(42);
const CAROL: PrincipalId = PrincipalId(43);

async fn setup() -> (TestFixture, Vault<MemoryStore>) {
    let fixture = TestFixture::new().await;
    let vault = Vault::new(
        Arc::clone(&fixture.keyring),
        Arc::clone(&fixture.store),
        &VaultConfig::default(),
    );
    (fixture, vault)
}

fn granted(value: &str) -> AccessOutcome {
    AccessOutcome::Granted(value.to_string())
}

fn literal_set(policy: &consent_vault::PolicyExpression) -> Vec<String> {
    policy.to_attribute_set().names()
}

#[tokio::test]
async fn no_consent_baseline() {
    let (_fixture, vault) = setup().await;
    vault.assign_attributes(BOB, ["Marketing"]).await.unwrap();

    let policy = vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100")], NOW)
        .await
        .unwrap();
    assert_eq!(policy.to_string(), "owner:7");

    assert_eq!(
        vault.open_field_at(SUBJECT, SUBJECT, "phone", NOW).await.unwrap(),
        granted("555-0100")
    );
    assert_eq!(
        vault.open_field_at(BOB, SUBJECT, "phone", NOW).await.unwrap(),
        AccessOutcome::NotAuthorized
    );
}

#[tokio::test]
async fn active_consents_compose_disjunction() {
    let (fixture, vault) = setup().await;
    fixture.grant(SUBJECT, MARKETING, NOW + HOUR_MS).await.unwrap();
    fixture.grant(SUBJECT, RESEARCH, NOW + HOUR_MS).await.unwrap();

    let policy = vault.policy_builder().build_at(SUBJECT, NOW).await.unwrap();

    assert_eq!(literal_set(&policy), vec!["Marketing", "Research", "owner:7"]);
    assert_eq!(policy.literals()[0], Attribute::owner(SUBJECT));
}

#[tokio::test]
async fn grace_window_boundaries() {
    let (fixture, vault) = setup().await;
    let consent = fixture.grant(SUBJECT, RESEARCH, NOW + HOUR_MS).await.unwrap();
    let builder = vault.policy_builder();

    fixture
        .request_revocation(consent, SUBJECT, RESEARCH, NOW - (24 * HOUR_MS - MINUTE_MS))
        .await
        .unwrap();
    assert_eq!(
        builder.build_at(SUBJECT, NOW).await.unwrap().to_string(),
        "owner:7 OR Research"
    );

    fixture
        .request_revocation(consent, SUBJECT, RESEARCH, NOW - (24 * HOUR_MS + MINUTE_MS))
        .await
        .unwrap();
    assert_eq!(builder.build_at(SUBJECT, NOW).await.unwrap().to_string(), "owner:7");

    // Exactly 24h old is already outside the window.
    fixture
        .request_revocation(consent, SUBJECT, RESEARCH, NOW - 24 * HOUR_MS)
        .await
        .unwrap();
    assert_eq!(builder.build_at(SUBJECT, NOW).await.unwrap().to_string(), "owner:7");
}

#[tokio::test]
async fn configured_grace_window_applies() {
    let fixture = TestFixture::new().await;
    let vault = Vault::new(
        Arc::clone(&fixture.keyring),
        Arc::clone(&fixture.store),
        &VaultConfig::default().with_grace_hours(1),
    );
    let consent = fixture.grant(SUBJECT, RESEARCH, NOW + HOUR_MS).await.unwrap();
    fixture
        .request_revocation(consent, SUBJECT, RESEARCH, NOW - 2 * HOUR_MS)
        .await
        .unwrap();

    assert_eq!(
        vault.policy_builder().build_at(SUBJECT, NOW).await.unwrap().to_string(),
        "owner:7"
    );
}

#[tokio::test]
async fn owner_reads_after_consent_lapses() {
    let (fixture, vault) = setup().await;
    let consent = fixture.grant(SUBJECT, MARKETING, NOW + HOUR_MS).await.unwrap();

    let policy = vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100")], NOW)
        .await
        .unwrap();
    assert_eq!(policy.to_string(), "owner:7 OR Marketing");

    // Past the expiry, by the clock.
    assert_eq!(
        vault
            .open_field_at(SUBJECT, SUBJECT, "phone", NOW + 2 * HOUR_MS)
            .await
            .unwrap(),
        granted("555-0100")
    );

    // And after the sweeper marks it expired.
    fixture
        .transition(consent, SUBJECT, MARKETING, ConsentState::Expired, None)
        .await
        .unwrap();
    assert_eq!(
        vault.open_field_at(SUBJECT, SUBJECT, "phone", NOW).await.unwrap(),
        granted("555-0100")
    );
}

#[tokio::test]
async fn owner_denied_for_fields_not_sealed_for_them() {
    let (fixture, vault) = setup().await;

    // Sealed for another subject, stored under this one.
    let other_policy = vault.policy_builder().build_at(PrincipalId(8), NOW).await.unwrap();
    let foreign_subject = vault.cipher().seal("555-0199", &other_policy).unwrap();
    fixture
        .store
        .put_field(SUBJECT, "phone", foreign_subject)
        .await
        .unwrap();
    assert_eq!(
        vault.open_field_at(SUBJECT, SUBJECT, "phone", NOW).await.unwrap(),
        AccessOutcome::NotAuthorized
    );

    // Sealed for this subject under another key pair.
    let own_policy = vault.policy_builder().build_at(SUBJECT, NOW).await.unwrap();
    let other_cipher = FieldCipher::new(Arc::new(Keyring::generate()));
    let foreign_key = other_cipher.seal("555-0100", &own_policy).unwrap();
    fixture
        .store
        .put_field(SUBJECT, "email", foreign_key)
        .await
        .unwrap();
    assert_eq!(
        vault.open_field_at(SUBJECT, SUBJECT, "email", NOW).await.unwrap(),
        AccessOutcome::NotAuthorized
    );
}

#[tokio::test]
async fn third_party_gated_by_attributes() {
    let (fixture, vault) = setup().await;
    fixture.grant(SUBJECT, MARKETING, NOW + HOUR_MS).await.unwrap();
    vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100")], NOW)
        .await
        .unwrap();

    vault.assign_attributes(BOB, ["Marketing"]).await.unwrap();
    vault.assign_attributes(CAROL, ["Research"]).await.unwrap();

    assert_eq!(
        vault.open_field_at(BOB, SUBJECT, "phone", NOW).await.unwrap(),
        granted("555-0100")
    );
    assert_eq!(
        vault.open_field_at(CAROL, SUBJECT, "phone", NOW).await.unwrap(),
        AccessOutcome::NotAuthorized
    );

    // Access follows the assignment without re-encryption.
    vault.clear_attributes(BOB).await.unwrap();
    assert_eq!(
        vault.open_field_at(BOB, SUBJECT, "phone", NOW).await.unwrap(),
        AccessOutcome::NotAuthorized
    );
    vault.assign_attributes(CAROL, ["Research", "Marketing"]).await.unwrap();
    assert_eq!(
        vault.open_field_at(CAROL, SUBJECT, "phone", NOW).await.unwrap(),
        granted("555-0100")
    );
}

#[tokio::test]
async fn reseal_after_revocation_excludes_attribute() {
    let (fixture, vault) = setup().await;
    let consent = fixture.grant(SUBJECT, MARKETING, NOW + HOUR_MS).await.unwrap();
    vault.assign_attributes(BOB, ["Marketing"]).await.unwrap();

    fixture
        .transition(consent, SUBJECT, MARKETING, ConsentState::Revoked, None)
        .await
        .unwrap();
    let policy = vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100")], NOW)
        .await
        .unwrap();

    assert_eq!(policy.to_string(), "owner:7");
    assert_eq!(
        vault.open_field_at(BOB, SUBJECT, "phone", NOW).await.unwrap(),
        AccessOutcome::NotAuthorized
    );
}

#[tokio::test]
async fn corrupt_field_is_not_authorized_and_audited() {
    let (fixture, vault) = setup().await;
    vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100")], NOW)
        .await
        .unwrap();

    let mut bytes = fixture
        .store
        .get_field(SUBJECT, "phone")
        .await
        .unwrap()
        .unwrap()
        .to_vec();
    bytes[0] ^= 0xFF;
    assert!(FieldCipher::deserialize(&bytes).is_err());
    fixture
        .store
        .put_field(SUBJECT, "phone", bytes.into())
        .await
        .unwrap();

    assert_eq!(
        vault.open_field_at(SUBJECT, SUBJECT, "phone", NOW).await.unwrap(),
        AccessOutcome::NotAuthorized
    );
    let events = fixture.store.access_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, "corrupt ciphertext");
    assert!(!events[0].success);
}

#[tokio::test]
async fn every_attempt_audited_once() {
    let (fixture, vault) = setup().await;
    fixture.grant(SUBJECT, MARKETING, NOW + HOUR_MS).await.unwrap();
    vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100"), ("email", "j@example.com")], NOW)
        .await
        .unwrap();
    vault.assign_attributes(BOB, ["Marketing"]).await.unwrap();

    let attempts = [
        (SUBJECT, "phone", true),
        (BOB, "phone", true),
        (CAROL, "phone", false),
        (BOB, "email", true),
        (CAROL, "email", false),
    ];
    for (requester, field, _) in attempts {
        vault.open_field_at(requester, SUBJECT, field, NOW).await.unwrap();
    }

    // A missing field is not an attempt.
    assert!(matches!(
        vault.open_field_at(BOB, SUBJECT, "address", NOW).await,
        Err(VaultError::FieldNotFound { .. })
    ));

    let events = fixture.store.access_events().await.unwrap();
    assert_eq!(events.len(), attempts.len());
    for (event, (requester, field, success)) in events.iter().zip(attempts) {
        assert_eq!(event.requester, requester);
        assert_eq!(event.subject, SUBJECT);
        assert_eq!(event.field.as_deref(), Some(field));
        assert_eq!(event.success, success);
        assert_eq!(event.at, NOW);
    }
}

#[tokio::test]
async fn record_sealed_under_one_policy() {
    let (fixture, vault) = setup().await;
    fixture.grant(SUBJECT, MARKETING, NOW + HOUR_MS).await.unwrap();
    vault.assign_attributes(BOB, ["Marketing"]).await.unwrap();

    vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100"), ("email", "j@example.com")], NOW)
        .await
        .unwrap();
    assert_eq!(
        fixture.store.list_fields(SUBJECT).await.unwrap(),
        vec!["email", "phone"]
    );

    let outcomes = vault
        .open_record(BOB, SUBJECT, &["phone", "address", "email"])
        .await;
    let fields: Vec<&str> = outcomes.iter().map(|(field, _)| field.as_str()).collect();
    assert_eq!(fields, vec!["phone", "address", "email"]);
    assert_eq!(outcomes[0].1.as_ref().unwrap(), &granted("555-0100"));
    assert!(matches!(outcomes[1].1, Err(VaultError::FieldNotFound { .. })));
    assert_eq!(outcomes[2].1.as_ref().unwrap(), &granted("j@example.com"));

    // The missing field is not an attempt; the other two are.
    assert_eq!(fixture.store.access_events().await.unwrap().len(), 2);

    assert_eq!(vault.erase_subject(SUBJECT).await.unwrap(), 2);
    assert!(matches!(
        vault.open_field(SUBJECT, SUBJECT, "phone").await,
        Err(VaultError::FieldNotFound { .. })
    ));
}

#[tokio::test]
async fn assignments_are_versioned() {
    let (fixture, vault) = setup().await;

    let first = vault.assign_attributes(BOB, ["Marketing"]).await.unwrap();
    let second = vault.assign_attributes(BOB, ["Marketing", "Research"]).await.unwrap();
    assert_eq!((first.version, second.version), (1, 2));

    let current = vault.attributes_of(BOB).await.unwrap().unwrap();
    assert_eq!(current.attributes, AttributeSet::from_names(["Research", "Marketing"]).unwrap());
    assert!(fixture
        .store
        .holds(BOB, &Attribute::new("Research").unwrap())
        .await
        .unwrap());

    assert!(vault.clear_attributes(BOB).await.unwrap());
    assert!(vault.attributes_of(BOB).await.unwrap().is_none());
    assert!(matches!(
        vault.assign_attributes(BOB, [""]).await,
        Err(VaultError::InvalidAttribute(_))
    ));
}

#[tokio::test]
async fn owner_literals_cannot_be_granted() {
    let (fixture, vault) = setup().await;
    vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100")], NOW)
        .await
        .unwrap();

    assert!(matches!(
        vault.assign_attributes(BOB, ["Marketing", "owner:7"]).await,
        Err(VaultError::InvalidAttribute(CoreError::ReservedAttribute(_)))
    ));
    assert!(vault.attributes_of(BOB).await.unwrap().is_none());
    assert_eq!(
        vault.open_field_at(BOB, SUBJECT, "phone", NOW).await.unwrap(),
        AccessOutcome::NotAuthorized
    );

    // A catalog title in the owner namespace cannot widen a policy.
    fixture
        .store
        .put_policy(&PolicyCatalogEntry {
            policy_id: 99,
            title: "owner:8".into(),
            valid_until: i64::MAX,
        })
        .await
        .unwrap();
    fixture.grant(SUBJECT, 99, NOW + HOUR_MS).await.unwrap();

    assert!(matches!(
        vault.seal_record_at(SUBJECT, &[("email", "j@example.com")], NOW).await,
        Err(VaultError::PolicyConstruction(PolicyConstructionError::InvalidTitle { .. }))
    ));
    assert!(fixture.store.get_field(SUBJECT, "email").await.unwrap().is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborator failures
// ─────────────────────────────────────────────────────────────────────────────

async fn faulty_vault() -> (Arc<FaultyStore>, Vault<FaultyStore>) {
    let store = Arc::new(FaultyStore::new());
    for entry in catalog() {
        store.inner.put_policy(&entry).await.unwrap();
    }
    let vault = Vault::new(
        Arc::new(Keyring::generate()),
        Arc::clone(&store),
        &VaultConfig::default(),
    );
    (store, vault)
}

#[tokio::test]
async fn consent_failure_is_a_service_error() {
    let (store, vault) = faulty_vault().await;
    vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100")], NOW)
        .await
        .unwrap();

    store.fail_consents(true);
    assert!(matches!(
        vault.seal_record_at(SUBJECT, &[("email", "x")], NOW).await,
        Err(VaultError::PolicyConstruction(_))
    ));
    assert!(matches!(
        vault.open_field_at(SUBJECT, SUBJECT, "phone", NOW).await,
        Err(VaultError::Resolve(ResolveError::PolicyConstruction(_)))
    ));

    let events = store.inner.access_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(!events[0].success);
}

#[tokio::test]
async fn attribute_store_failure_is_a_service_error() {
    let (store, vault) = faulty_vault().await;
    vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100")], NOW)
        .await
        .unwrap();

    store.fail_attributes(true);
    assert!(matches!(
        vault.open_field_at(BOB, SUBJECT, "phone", NOW).await,
        Err(VaultError::Resolve(ResolveError::AttributeStore(_)))
    ));
    assert_eq!(store.inner.access_events().await.unwrap().len(), 1);
}

#[tokio::test]
async fn audit_failure_does_not_change_outcome() {
    let (store, vault) = faulty_vault().await;
    vault
        .seal_record_at(SUBJECT, &[("phone", "555-0100")], NOW)
        .await
        .unwrap();

    store.fail_audit(true);
    assert_eq!(
        vault.open_field_at(SUBJECT, SUBJECT, "phone", NOW).await.unwrap(),
        granted("555-0100")
    );
    assert_eq!(
        vault.open_field_at(BOB, SUBJECT, "phone", NOW).await.unwrap(),
        AccessOutcome::NotAuthorized
    );
    assert!(store.inner.access_events().await.unwrap().is_empty());
}
