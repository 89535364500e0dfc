use claims::assert_ok;

use super::*;
use crate::id::ContractId;
use crate::region::{KeyRange, StoreKey};
use crate::version::{StateTimestamp, Version};

fn server(n: u8) -> ServerId {
    ServerId::from([n; 32])
}

fn contract() -> Contract {
    Contract {
        replicas: [server(1), server(2), server(3)].into(),
        voters: [server(1), server(2), server(3)].into(),
        temp_voters: None,
        primary: Some(Primary::new(server(1))),
        branch: BranchId::from([9; 32]),
    }
}

#[test]
fn initial_contract_votes_with_every_replica() {
    let config = ShardConfig::new([server(1), server(2)], server(2));
    let initial = Contract::initial(&config, BranchId::from([4; 32]));

    assert_eq!(initial.replicas, config.replicas);
    assert_eq!(initial.voters, config.replicas);
    assert_eq!(initial.primary, None);
    assert_eq!(initial.temp_voters, None);
    assert_ok!(initial.check_invariants());
}

#[test]
fn voters_must_be_replicas() {
    let mut c = contract();
    let _ignored = c.voters.insert(server(4));

    assert_eq!(
        c.check_invariants(),
        Err(InvariantViolation::VoterNotReplica(server(4)))
    );
}

#[test]
fn temp_voters_must_be_replicas() {
    let mut c = contract();
    c.temp_voters = Some([server(2), server(5)].into());

    assert_eq!(
        c.check_invariants(),
        Err(InvariantViolation::TempVoterNotReplica(server(5)))
    );
}

#[test]
fn primary_must_be_replica() {
    let mut c = contract();
    c.primary = Some(Primary::new(server(7)));

    assert_eq!(
        c.check_invariants(),
        Err(InvariantViolation::PrimaryNotReplica(server(7)))
    );
}

#[test]
fn hand_over_helpers() {
    let primary = Primary::new(server(1)).handing_over_to(server(2));

    assert_eq!(primary.hand_over, Some(server(2)));
    assert_eq!(primary.staying(), Primary::new(server(1)));
}

#[test]
fn contract_ids_depend_on_predecessors() {
    let region = KeyRange::universe();
    let c = contract();
    let a = ContractId::from([1; 32]);
    let b = ContractId::from([2; 32]);

    let first = ContractId::derive(&region, &c, [&a]).unwrap();
    let again = ContractId::derive(&region, &c, [&a]).unwrap();
    let other = ContractId::derive(&region, &c, [&b]).unwrap();
    let both = ContractId::derive(&region, &c, [&b, &a]).unwrap();
    let both_swapped = ContractId::derive(&region, &c, [&a, &b]).unwrap();

    assert_eq!(first, again);
    assert_ne!(first, other);
    assert_eq!(both, both_swapped);
}

#[test]
fn optional_fields_are_omitted_from_json() {
    let mut c = contract();
    c.primary = None;

    let json = serde_json::to_value(&c).unwrap();

    assert!(json.get("primary").is_none());
    assert!(json.get("temp_voters").is_none());
    assert_eq!(serde_json::from_value::<Contract>(json).unwrap(), c);
}

#[test]
fn branch_ids_differ_per_start_and_generation() {
    let version = Version::new(BranchId::from([3; 32]), StateTimestamp::new(9));
    let server = server(2);

    let first = BranchId::derive(server, &version, &StoreKey::from("a"), 1).unwrap();

    assert_eq!(first, BranchId::derive(server, &version, &StoreKey::from("a"), 1).unwrap());
    assert_ne!(first, BranchId::derive(server, &version, &StoreKey::from("b"), 1).unwrap());
    assert_ne!(first, BranchId::derive(server, &version, &StoreKey::from("a"), 2).unwrap());
    assert!(!first.is_nil());
}
