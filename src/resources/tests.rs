//! Unit tests for resource declarations.

use std::collections::BTreeSet;

use rstest::{fixture, rstest};

use super::compute::{self, SERVER_NAME, SERVER_OUTPUTS};
use super::credential::{self, KEY_PAIR_NAME, key_name_for};
use super::database::{self, DATABASE_OUTPUTS, DATABASE_TAG_NAME, DatabaseSpec};
use super::network::{self, ANYWHERE, INGRESS_PORTS, SECURITY_GROUP_NAME};
use super::*;
use crate::config::{Configuration, StackSettings};
use crate::engine::{KeyPairHandle, Output, ResourceKind, ResourceRef};
use crate::stack::StackError;
use crate::tags::{NAME_TAG, TagSet};
use crate::test_support::{EngineCall, EngineOperation, RecordingEngine};

const EMAIL: &str = "alice@example.com";
const PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2E alice@laptop";

#[fixture]
fn config() -> Configuration {
    Configuration::from_settings(&StackSettings::new(EMAIL, PUBLIC_KEY))
        .expect("valid settings")
}

#[fixture]
fn tags(config: Configuration) -> TagSet {
    TagSet::base(&config)
}

fn security_group_id() -> Output {
    ResourceRef::new(ResourceKind::SecurityGroup, SECURITY_GROUP_NAME).output("id")
}

fn key_pair() -> KeyPairHandle {
    KeyPairHandle::new(
        ResourceRef::new(ResourceKind::KeyPair, KEY_PAIR_NAME),
        key_name_for(EMAIL),
    )
}

#[rstest]
fn standard_security_group_opens_five_tcp_ports(tags: TagSet) {
    let spec = SecurityGroupSpec::standard(&tags);

    let ports = spec
        .ingress
        .iter()
        .map(|rule| (rule.from_port, rule.to_port, rule.protocol))
        .collect::<Vec<_>>();
    let expected = INGRESS_PORTS
        .iter()
        .map(|(port, _)| (i32::from(*port), i32::from(*port), Protocol::Tcp))
        .collect::<Vec<_>>();
    assert_eq!(ports, expected);
    assert!(spec.ingress.iter().all(TrafficRule::is_world_open));
    assert!(spec.validate().is_ok());
}

#[rstest]
fn standard_security_group_allows_all_egress(tags: TagSet) {
    let spec = SecurityGroupSpec::standard(&tags);

    let [rule] = spec.egress.as_slice() else {
        panic!("expected exactly one egress rule, got {:?}", spec.egress);
    };
    assert!(rule.covers_all_ports());
    assert_eq!(rule.cidr_blocks, BTreeSet::from([ANYWHERE.to_owned()]));
}

#[rstest]
fn security_group_carries_base_tags_without_name(tags: TagSet) {
    let spec = SecurityGroupSpec::standard(&tags);
    assert_eq!(spec.tags, tags);
    assert_eq!(spec.tags.get(NAME_TAG), None);
}

#[rstest]
#[case::above_range(70_000, 70_000)]
#[case::negative_tcp(-1, -1)]
#[case::inverted(443, 80)]
fn tcp_rule_with_bad_ports_is_rejected(tags: TagSet, #[case] from: i32, #[case] to: i32) {
    let mut spec = SecurityGroupSpec::standard(&tags);
    let mut rule = TrafficRule::tcp_from_anywhere(443, "HTTPS");
    rule.from_port = from;
    rule.to_port = to;
    spec.ingress.push(rule);

    let err = spec.validate().expect_err("bad port range");
    assert!(
        matches!(err, ValidationError::PortRange { from_port, to_port, .. } if from_port == from && to_port == to),
        "unexpected error: {err}"
    );
}

#[rstest]
fn all_protocol_rule_must_span_every_port(tags: TagSet) {
    let mut spec = SecurityGroupSpec::standard(&tags);
    let mut rule = TrafficRule::allow_all("partial");
    rule.from_port = 0;
    rule.to_port = 1024;
    spec.egress = vec![rule];

    assert_eq!(
        spec.validate(),
        Err(ValidationError::ProtocolPorts {
            resource: SECURITY_GROUP_NAME.to_owned(),
            rule: String::from("partial"),
        })
    );
}

#[rstest]
#[case::not_an_address("everywhere")]
#[case::prefix_too_long("10.0.0.0/33")]
#[case::missing_prefix("10.0.0.0")]
fn rule_with_bad_cidr_is_rejected(tags: TagSet, #[case] cidr: &str) {
    let mut spec = SecurityGroupSpec::standard(&tags);
    let mut rule = TrafficRule::tcp_from_anywhere(443, "HTTPS");
    rule.cidr_blocks = BTreeSet::from([cidr.to_owned()]);
    spec.ingress.push(rule);

    let err = spec.validate().expect_err("bad cidr");
    assert!(
        matches!(&err, ValidationError::Cidr { cidr: found, .. } if found == cidr),
        "unexpected error: {err}"
    );
}

#[rstest]
#[case("0.0.0.0/0", true)]
#[case("10.1.0.0/16", true)]
#[case("::/0", true)]
#[case("2001:db8::/129", false)]
#[case("10.1.0.0/x", false)]
fn cidr_validation(#[case] block: &str, #[case] expected: bool) {
    assert_eq!(is_valid_cidr(block), expected);
}

#[rstest]
#[tokio::test]
async fn security_group_is_declared_once(tags: TagSet) {
    let engine = RecordingEngine::new();
    let handle = network::create(&engine, &tags).await.expect("declared");

    assert_eq!(handle.resource.name, SECURITY_GROUP_NAME);
    assert_eq!(engine.count(EngineOperation::SecurityGroup), 1);
    assert_eq!(engine.calls().len(), 1);
}

#[rstest]
fn key_pair_is_named_after_operator(config: Configuration, tags: TagSet) {
    let spec = KeyPairSpec::for_operator(&config, &tags);

    assert_eq!(spec.key_name, "alice@example.com-keypair-for-pulumi");
    assert_eq!(spec.public_key, PUBLIC_KEY);
    assert_eq!(spec.tags.get(NAME_TAG), Some("alice@example.com-key-pair"));
    assert_eq!(spec.tags.len(), tags.len() + 1);
}

#[rstest]
#[case::unknown_type("rsa AAAAB3Nza")]
#[case::no_body("ssh-ed25519")]
#[case::whitespace("   ")]
fn malformed_public_key_is_rejected(config: Configuration, tags: TagSet, #[case] key: &str) {
    let mut spec = KeyPairSpec::for_operator(&config, &tags);
    spec.public_key = key.to_owned();

    let err = spec.validate().expect_err("malformed key");
    assert!(
        matches!(err, ValidationError::PublicKey { .. }),
        "unexpected error: {err}"
    );
}

#[rstest]
#[tokio::test]
async fn credential_rejects_bad_key_before_engine_call(tags: TagSet) {
    let config = Configuration::from_settings(&StackSettings::new(EMAIL, "not-a-key"))
        .expect("non-empty values pass configuration");
    let engine = RecordingEngine::new();

    let err = credential::create(&engine, &config, &tags)
        .await
        .expect_err("malformed key");

    assert!(matches!(err, StackError::Validation(ValidationError::PublicKey { .. })));
    assert!(engine.calls().is_empty());
}

#[rstest]
fn instance_spec_references_key_pair_and_group(tags: TagSet) {
    let group = security_group_id();
    let spec = InstanceSpec::new(&tags.with_name(SERVER_NAME), &key_pair(), &[group.clone()]);

    assert_eq!(spec.key_name, key_name_for(EMAIL));
    assert_eq!(spec.vpc_security_group_ids, vec![group.clone()]);
    assert_eq!(
        spec.dependencies(),
        BTreeSet::from([group.resource, key_pair().resource])
    );
    assert_eq!(spec.tags.get(NAME_TAG), Some(SERVER_NAME));
}

#[rstest]
fn instance_without_security_group_is_rejected(tags: TagSet) {
    let spec = InstanceSpec::new(&tags, &key_pair(), &[]);
    assert_eq!(
        spec.validate(),
        Err(ValidationError::MissingSecurityGroup {
            resource: SERVER_NAME.to_owned(),
        })
    );
}

#[rstest]
#[tokio::test]
async fn compute_publishes_three_outputs(tags: TagSet) {
    let engine = RecordingEngine::new();
    let handle = compute::create(&engine, &tags, &key_pair(), &[security_group_id()])
        .await
        .expect("declared");

    assert_eq!(engine.exported_names(), SERVER_OUTPUTS.to_vec());
    let exported = engine
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            EngineCall::Export { value, .. } => Some(value),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        exported,
        vec![handle.public_ip, handle.public_dns, handle.subnet_id]
    );
}

#[rstest]
fn database_overrides_requested_name_tag(tags: TagSet) {
    let spec = DatabaseSpec::new(&tags.with_name("pgdatabase"), &security_group_id());

    assert_eq!(spec.tags.get(NAME_TAG), Some(DATABASE_TAG_NAME));
    assert_eq!(spec.allocated_storage, 5);
    assert_eq!(spec.engine, "postgres");
    assert_eq!(spec.db_name, "rstudio_pm");
    assert!(spec.publicly_accessible);
    assert!(spec.skip_final_snapshot);
}

#[rstest]
fn database_with_zero_storage_is_rejected(tags: TagSet) {
    let mut spec = DatabaseSpec::new(&tags, &security_group_id());
    spec.allocated_storage = 0;

    assert!(matches!(
        spec.validate(),
        Err(ValidationError::NonPositive { ref field, .. }) if field == "allocated_storage"
    ));
}

#[rstest]
#[tokio::test]
async fn database_publishes_five_outputs(tags: TagSet) {
    let engine = RecordingEngine::new();
    database::create(&engine, &tags, &security_group_id())
        .await
        .expect("declared");

    assert_eq!(engine.count(EngineOperation::Database), 1);
    assert_eq!(engine.exported_names(), DATABASE_OUTPUTS.to_vec());
}

#[rstest]
#[tokio::test]
async fn engine_failure_surfaces_as_provisioning_error(tags: TagSet) {
    let engine = RecordingEngine::new();
    engine.fail_on(EngineOperation::Database);

    let err = database::create(&engine, &tags, &security_group_id())
        .await
        .expect_err("engine failure");

    let StackError::Provisioning { resource, .. } = &err else {
        panic!("expected provisioning error, got {err}");
    };
    assert_eq!(resource.kind, ResourceKind::DatabaseInstance);
    assert!(engine.exported_names().is_empty());
}

#[rstest]
fn database_reports_every_exposure(tags: TagSet) {
    let spec = DatabaseSpec::new(&tags, &security_group_id());
    assert_eq!(
        spec.exposures(),
        vec![
            "admin password is a static literal",
            "database is publicly accessible",
            "no final snapshot is taken on destroy",
        ]
    );
}

#[rstest]
fn hardened_database_still_reports_static_password(tags: TagSet) {
    let mut spec = DatabaseSpec::new(&tags, &security_group_id());
    spec.publicly_accessible = false;
    spec.skip_final_snapshot = false;

    assert_eq!(spec.exposures(), vec!["admin password is a static literal"]);
}
