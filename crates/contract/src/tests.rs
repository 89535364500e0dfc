use std::collections::{BTreeMap, BTreeSet};

use claims::{assert_matches, assert_ok};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tableraft_lineage::BranchBirthCertificate;

use super::*;

fn server(n: u8) -> ServerId {
    ServerId::from([n; 32])
}

fn servers(ids: &[u8]) -> BTreeSet<ServerId> {
    ids.iter().copied().map(server).collect()
}

fn root() -> BranchId {
    BranchId::from([1; 32])
}

fn at(timestamp: u64) -> Version {
    Version::new(root(), StateTimestamp::new(timestamp))
}

fn history() -> BranchHistory {
    let mut history = BranchHistory::new();
    assert_ok!(history.insert(root(), BranchBirthCertificate::root(KeyRange::universe())));
    history
}

fn region() -> KeyRange {
    KeyRange::bounded("a", "m").unwrap()
}

fn config(replicas: &[u8], primary: u8) -> ShardConfig {
    ShardConfig::new(replicas.iter().copied().map(server), server(primary))
}

fn contract(replicas: &[u8], primary: Option<Primary>) -> Contract {
    Contract {
        replicas: servers(replicas),
        voters: servers(replicas),
        temp_voters: None,
        primary,
        branch: root(),
    }
}

fn acks<const N: usize>(entries: [(u8, RegionAck); N]) -> BTreeMap<ServerId, RegionAck> {
    entries.into_iter().map(|(n, ack)| (server(n), ack)).collect()
}

fn need(timestamp: u64) -> RegionAck {
    RegionAck::SecondaryNeedPrimary {
        version: at(timestamp),
    }
}

/// Hands out fresh branch ids and remembers what it was asked for.
#[derive(Debug, Default)]
struct RecordingMaker {
    calls: Vec<(ServerId, Version, KeyRange)>,
    fail: bool,
}

impl BranchMaker for RecordingMaker {
    fn make_branch(
        &mut self,
        server: ServerId,
        version: &Version,
        region: &KeyRange,
    ) -> Result<BranchId, BranchError> {
        if self.fail {
            return Err(BranchError::Registration("registrar unavailable".to_owned()));
        }

        let branch = BranchId::from([100 + u8::try_from(self.calls.len()).unwrap(); 32]);
        self.calls.push((server, *version, region.clone()));
        Ok(branch)
    }
}

fn step(
    old: &Contract,
    config: &ShardConfig,
    acks: &BTreeMap<ServerId, RegionAck>,
    maker: &mut RecordingMaker,
) -> Contract {
    calculate_contract(&region(), old, config, acks, &history(), maker).unwrap()
}

#[test]
fn elects_most_up_to_date_voter_on_new_branch() {
    let old = contract(&[1, 2, 3], None);
    let mut maker = RecordingMaker::default();

    let new = step(
        &old,
        &config(&[1, 2, 3], 1),
        &acks([(1, need(5)), (2, need(9)), (3, need(7))]),
        &mut maker,
    );

    assert_eq!(new.primary, Some(Primary::new(server(2))));
    assert_eq!(new.branch, BranchId::from([100; 32]));
    assert_eq!(new.voters, old.voters);
    assert_eq!(maker.calls, vec![(server(2), at(9), region())]);
}

#[test]
fn prefers_configured_primary_among_eligible() {
    let mut maker = RecordingMaker::default();

    let new = step(
        &contract(&[1, 2, 3], None),
        &config(&[1, 2, 3], 1),
        &acks([(1, need(8)), (2, need(9)), (3, need(5))]),
        &mut maker,
    );

    assert_eq!(new.primary_server(), Some(server(1)));
    assert_eq!(maker.calls, vec![(server(1), at(8), region())]);
}

#[test]
fn equal_progress_elects_lower_server_id() {
    let mut maker = RecordingMaker::default();

    let new = step(
        &contract(&[1, 2, 3], None),
        &config(&[1, 2, 3], 3),
        &acks([(1, need(7)), (2, need(7)), (3, need(7))]),
        &mut maker,
    );

    assert_eq!(new.primary_server(), Some(server(1)));
}

#[test]
fn minority_of_reports_elects_nobody() {
    let old = contract(&[1, 2, 3], None);
    let mut maker = RecordingMaker::default();

    let new = step(&old, &config(&[1, 2, 3], 1), &acks([(2, need(9))]), &mut maker);

    assert_eq!(new, old);
    assert!(maker.calls.is_empty());
}

#[test]
fn incomparable_versions_are_not_candidates() {
    let old = contract(&[1, 2, 3], None);
    let stray = RegionAck::SecondaryNeedPrimary {
        version: Version::new(BranchId::from([42; 32]), StateTimestamp::new(99)),
    };
    let mut maker = RecordingMaker::default();

    let new = step(
        &old,
        &config(&[1, 2, 3], 1),
        &acks([(1, stray), (2, need(3))]),
        &mut maker,
    );

    assert_eq!(new, old);
    assert!(maker.calls.is_empty());
}

#[test]
fn graceful_hand_over_to_configured_primary() {
    let config = config(&[1, 2, 3], 2);
    let mut maker = RecordingMaker::default();
    let ready = acks([
        (1, RegionAck::PrimaryReady),
        (2, RegionAck::SecondaryStreaming),
        (3, RegionAck::SecondaryStreaming),
    ]);

    let flagged = step(
        &contract(&[1, 2, 3], Some(Primary::new(server(1)))),
        &config,
        &ready,
        &mut maker,
    );
    assert_eq!(
        flagged.primary,
        Some(Primary::new(server(1)).handing_over_to(server(2)))
    );

    let stepped_down = step(&flagged, &config, &ready, &mut maker);
    assert_eq!(stepped_down.primary, None);
    assert_eq!(stepped_down.branch, root());

    let elected = step(
        &stepped_down,
        &config,
        &acks([(1, need(12)), (2, need(12)), (3, need(11))]),
        &mut maker,
    );
    assert_eq!(elected.primary_server(), Some(server(2)));
    assert_eq!(maker.calls, vec![(server(2), at(12), region())]);
}

#[test]
fn hand_over_waits_for_old_primary() {
    let config = config(&[1, 2, 3], 2);
    let mut maker = RecordingMaker::default();
    let flagged = contract(&[1, 2, 3], Some(Primary::new(server(1)).handing_over_to(server(2))));

    let new = step(
        &flagged,
        &config,
        &acks([(2, RegionAck::SecondaryStreaming)]),
        &mut maker,
    );

    assert_eq!(new, flagged);
}

#[test]
fn hand_over_is_cancelled_when_configuration_returns() {
    let mut maker = RecordingMaker::default();
    let flagged = contract(&[1, 2, 3], Some(Primary::new(server(1)).handing_over_to(server(2))));

    let new = step(
        &flagged,
        &config(&[1, 2, 3], 1),
        &acks([(1, RegionAck::PrimaryReady)]),
        &mut maker,
    );

    assert_eq!(new.primary, Some(Primary::new(server(1))));
}

#[test]
fn majority_without_primary_fails_over() {
    let old = contract(&[1, 2, 3], Some(Primary::new(server(1))));
    let mut maker = RecordingMaker::default();

    let new = step(
        &old,
        &config(&[1, 2, 3], 1),
        &acks([(2, need(4)), (3, need(6))]),
        &mut maker,
    );

    assert_eq!(new.primary, None);
    assert_eq!(new.branch, old.branch);
    assert!(maker.calls.is_empty());
}

#[test]
fn single_unreachable_voter_keeps_primary() {
    let old = contract(&[1, 2, 3], Some(Primary::new(server(1))));
    let mut maker = RecordingMaker::default();

    let new = step(
        &old,
        &config(&[1, 2, 3], 1),
        &acks([(1, RegionAck::PrimaryReady), (3, need(6))]),
        &mut maker,
    );

    assert_eq!(new, old);
}

#[test]
fn voter_change_is_proposed_once_new_set_streams() {
    let old = contract(&[1, 2, 3], Some(Primary::new(server(1))));
    let config = config(&[1, 2, 4], 1);
    let mut maker = RecordingMaker::default();

    let waiting = step(&old, &config, &acks([(1, RegionAck::PrimaryReady)]), &mut maker);
    assert_eq!(waiting.temp_voters, None);
    assert_eq!(waiting.replicas, servers(&[1, 2, 3, 4]));

    let proposed = step(
        &old,
        &config,
        &acks([
            (1, RegionAck::PrimaryReady),
            (2, RegionAck::SecondaryStreaming),
        ]),
        &mut maker,
    );
    assert_eq!(proposed.voters, servers(&[1, 2, 3]));
    assert_eq!(proposed.temp_voters, Some(servers(&[1, 2, 4])));
    assert_eq!(proposed.replicas, servers(&[1, 2, 3, 4]));
}

#[test]
fn voter_change_commits_on_primary_ready() {
    let config = config(&[1, 2, 4], 1);
    let mut maker = RecordingMaker::default();
    let proposed = Contract {
        replicas: servers(&[1, 2, 3, 4]),
        voters: servers(&[1, 2, 3]),
        temp_voters: Some(servers(&[1, 2, 4])),
        primary: Some(Primary::new(server(1))),
        branch: root(),
    };

    let pending = step(
        &proposed,
        &config,
        &acks([(2, RegionAck::SecondaryStreaming)]),
        &mut maker,
    );
    assert_eq!(pending, proposed);

    let committed = step(&proposed, &config, &acks([(1, RegionAck::PrimaryReady)]), &mut maker);
    assert_eq!(committed.voters, servers(&[1, 2, 4]));
    assert_eq!(committed.temp_voters, None);
    assert_eq!(committed.replicas, servers(&[1, 2, 3, 4]));

    let pruned = step(&committed, &config, &acks([(1, RegionAck::PrimaryReady)]), &mut maker);
    assert_eq!(pruned.replicas, servers(&[1, 2, 4]));
    assert_eq!(pruned.voters, servers(&[1, 2, 4]));
}

#[test]
fn unconfigured_primary_hands_over_before_removal() {
    let config = config(&[2, 3], 2);
    let mut maker = RecordingMaker::default();
    let old = Contract {
        replicas: servers(&[1, 2, 3]),
        voters: servers(&[2, 3]),
        temp_voters: None,
        primary: Some(Primary::new(server(1))),
        branch: root(),
    };

    let flagged = step(&old, &config, &acks([(1, RegionAck::PrimaryReady)]), &mut maker);
    assert_eq!(flagged.replicas, servers(&[1, 2, 3]));
    assert_eq!(
        flagged.primary,
        Some(Primary::new(server(1)).handing_over_to(server(2)))
    );

    let stepped_down = step(&flagged, &config, &acks([(1, RegionAck::PrimaryReady)]), &mut maker);
    assert_eq!(stepped_down.primary, None);

    let pruned = step(&stepped_down, &config, &BTreeMap::new(), &mut maker);
    assert_eq!(pruned.replicas, servers(&[2, 3]));
}

#[test]
fn primary_adopts_requested_branch() {
    let old = contract(&[1, 2, 3], Some(Primary::new(server(1))));
    let requested = BranchId::from([7; 32]);
    let mut maker = RecordingMaker::default();

    let new = step(
        &old,
        &config(&[1, 2, 3], 1),
        &acks([(1, RegionAck::PrimaryNeedBranch { branch: requested })]),
        &mut maker,
    );

    assert_eq!(new.branch, requested);
    assert_eq!(new.primary, old.primary);
    assert!(maker.calls.is_empty());
}

#[test]
fn branch_request_from_secondary_is_ignored() {
    let old = contract(&[1, 2, 3], Some(Primary::new(server(1))));
    let mut maker = RecordingMaker::default();

    let new = step(
        &old,
        &config(&[1, 2, 3], 1),
        &acks([(2, RegionAck::PrimaryNeedBranch { branch: BranchId::from([7; 32]) })]),
        &mut maker,
    );

    assert_eq!(new.branch, root());
}

#[test]
fn settled_contract_is_a_fixed_point() {
    let old = contract(&[1, 2, 3], Some(Primary::new(server(1))));
    let config = config(&[1, 2, 3], 1);
    let mut maker = RecordingMaker::default();

    let steady = acks([
        (1, RegionAck::PrimaryReady),
        (2, RegionAck::SecondaryStreaming),
        (3, RegionAck::SecondaryStreaming),
    ]);

    assert_eq!(step(&old, &config, &steady, &mut maker), old);
    assert_eq!(step(&old, &config, &BTreeMap::new(), &mut maker), old);
    assert!(maker.calls.is_empty());
}

#[test]
fn same_inputs_give_same_contract() {
    let old = contract(&[1, 2, 3], None);
    let config = config(&[1, 2, 3, 4], 4);
    let acks = acks([(1, need(3)), (2, need(8)), (4, RegionAck::SecondaryStreaming)]);

    let first = step(&old, &config, &acks, &mut RecordingMaker::default());
    let second = step(&old, &config, &acks, &mut RecordingMaker::default());

    assert_eq!(first, second);
}

#[test]
fn failed_branch_allocation_is_reported() {
    let mut maker = RecordingMaker {
        fail: true,
        ..RecordingMaker::default()
    };

    let result = calculate_contract(
        &region(),
        &contract(&[1, 2, 3], None),
        &config(&[1, 2, 3], 1),
        &acks([(1, need(5)), (2, need(5))]),
        &history(),
        &mut maker,
    );

    assert_matches!(result, Err(ContractError::Branch { .. }));
}

#[test]
fn unsafe_result_is_refused() {
    // Voter 2 is not a replica and nothing in the configuration brings it back.
    let malformed = Contract {
        replicas: servers(&[1]),
        voters: servers(&[1, 2]),
        temp_voters: None,
        primary: Some(Primary::new(server(1))),
        branch: root(),
    };

    let result = calculate_contract(
        &region(),
        &malformed,
        &config(&[1], 1),
        &BTreeMap::new(),
        &history(),
        &mut RecordingMaker::default(),
    );

    assert_matches!(
        result,
        Err(ContractError::Invariant {
            violation: InvariantViolation::VoterNotReplica(_),
            ..
        })
    );
}

#[test]
fn random_evolution_preserves_invariants() {
    let mut rng = StdRng::seed_from_u64(0x7ab1e);
    let history = history();
    let mut maker = RecordingMaker::default();
    let layouts: [&[u8]; 4] = [&[1, 2, 3], &[1, 2, 4], &[2, 3, 4, 5], &[1]];

    let mut current = contract(&[1, 2, 3], None);

    for _ in 0..300 {
        let layout = layouts[rng.gen_range(0..layouts.len())];
        let primary = layout[rng.gen_range(0..layout.len())];
        let config = config(layout, primary);

        let mut round = BTreeMap::new();
        for replica in current.replicas.iter().chain(&config.replicas) {
            let ack = match rng.gen_range(0..5) {
                0 => continue,
                1 => RegionAck::SecondaryStreaming,
                2 => RegionAck::SecondaryNeedPrimary {
                    version: Version::new(current.branch, StateTimestamp::new(rng.gen_range(0..50))),
                },
                3 => RegionAck::PrimaryReady,
                _ => need(rng.gen_range(0..50)),
            };
            let _ignored = round.insert(*replica, ack);
        }

        maker.calls.clear();
        let next = assert_ok!(calculate_contract(
            &region(),
            &current,
            &config,
            &round,
            &history,
            &mut maker,
        ));

        assert_ok!(next.check_invariants());
        assert!(config.replicas.is_subset(&next.replicas));

        // Leadership never moves between servers in one step.
        if let (Some(before), Some(after)) = (current.primary, next.primary) {
            assert_eq!(before.server, after.server);
        }

        if current.temp_voters.is_none() && next.temp_voters.is_some() {
            let following = config
                .replicas
                .iter()
                .filter(|server| match round.get(*server) {
                    Some(RegionAck::SecondaryStreaming) => true,
                    Some(_) => current.primary_server() == Some(**server),
                    None => false,
                })
                .count();
            assert!(following * 2 > config.replicas.len());
        }

        if next.voters != current.voters {
            let primary = current.primary_server().unwrap();
            assert_eq!(round.get(&primary), Some(&RegionAck::PrimaryReady));
            assert_eq!(current.temp_voters.as_ref(), Some(&next.voters));
        }
        if let Some((elected, _, _)) = maker.calls.first() {
            assert!(next.voters.contains(elected));
            assert_eq!(next.primary_server(), Some(*elected));
        }

        current = next;
    }
}
