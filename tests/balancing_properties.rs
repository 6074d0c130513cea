mod common;

use std::collections::BTreeSet;

use kafka_cluster_balancer::goals::{
    BrokerDistributionGoal, LeaderDistributionGoal, ReplicationGroupGoal,
};
use kafka_cluster_balancer::models::{BrokerId, PartitionKey};
use kafka_cluster_balancer::stats;
use kafka_cluster_balancer::*;

const SEEDS: std::ops::Range<u64> = 0..64;

fn goals() -> Vec<Box<dyn Goal>> {
    vec![
        Box::new(ReplicationGroupGoal),
        Box::new(BrokerDistributionGoal),
        Box::new(LeaderDistributionGoal),
    ]
}

fn replica_sets(topology: &ClusterTopology) -> Vec<(PartitionKey, BTreeSet<BrokerId>)> {
    topology
        .partitions()
        .map(|p| (p.key.clone(), p.replicas().iter().copied().collect()))
        .collect()
}

fn group_spread(topology: &ClusterTopology) -> Vec<Vec<usize>> {
    topology
        .partitions()
        .map(|p| stats::partition_group_counts(topology, &p.key))
        .collect()
}

/// Cross-group move that lowers the replica spread without raising the
/// replication-group score.
fn improving_spread_move(topology: &ClusterTopology) -> Option<Action> {
    let replica_cnt = stats::replica_cnt(topology);
    let score = ReplicationGroupGoal.score(topology);
    for partition in topology.partitions() {
        for &from in partition.replicas() {
            for to in topology.alive_brokers() {
                if partition.has_replica(to.id) || topology.group_of(from) == topology.group_of(to.id)
                {
                    continue;
                }
                let mut moved = topology.clone();
                moved.move_replica(&partition.key, from, to.id).unwrap();
                if stats::replica_cnt(&moved) < replica_cnt
                    && ReplicationGroupGoal.score(&moved) <= score
                {
                    return Some(Action::move_replica(&partition.key, from, to.id));
                }
            }
        }
    }
    None
}

/// Same-group move that lowers the partition-count imbalance.
fn improving_broker_move(topology: &ClusterTopology) -> Option<Action> {
    let partition_cnt = stats::partition_cnt(topology);
    for partition in topology.partitions() {
        for &from in partition.replicas() {
            for to in topology.alive_brokers() {
                if partition.has_replica(to.id) || topology.group_of(from) != topology.group_of(to.id)
                {
                    continue;
                }
                let mut moved = topology.clone();
                moved.move_replica(&partition.key, from, to.id).unwrap();
                if stats::partition_cnt(&moved) < partition_cnt {
                    return Some(Action::move_replica(&partition.key, from, to.id));
                }
            }
        }
    }
    None
}

/// Promotion of a live follower that lowers the leader-count imbalance.
fn improving_leader_change(topology: &ClusterTopology) -> Option<Action> {
    let leader_cnt = stats::leader_cnt(topology);
    for partition in topology.partitions() {
        let Some(leader) = partition.leader() else {
            continue;
        };
        for &follower in partition.followers() {
            if !topology.broker(follower).is_some_and(|b| b.is_alive) {
                continue;
            }
            let mut promoted = topology.clone();
            promoted.promote_leader(&partition.key, follower).unwrap();
            if stats::leader_cnt(&promoted) < leader_cnt {
                return Some(Action::elect_leader(&partition.key, leader, follower));
            }
        }
    }
    None
}

#[test]
fn test_invariants_hold_after_every_phase() {
    for seed in SEEDS {
        let metadata = common::random_cluster(seed);
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        topology.check_invariants().unwrap();

        for goal in goals() {
            goal.rebalance(&mut topology).unwrap();
            if let Err(err) = topology.check_invariants() {
                panic!("seed {} after {}: {}", seed, goal.name(), err);
            }
        }
    }
}

#[test]
fn test_each_phase_never_raises_its_score() {
    for seed in SEEDS {
        let metadata = common::random_cluster(seed);
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();

        for goal in goals() {
            let before = goal.score(&topology);
            goal.rebalance(&mut topology).unwrap();
            let after = goal.score(&topology);
            assert!(
                after <= before,
                "seed {}: {} went from {} to {}",
                seed,
                goal.name(),
                before,
                after
            );
        }
    }
}

#[test]
fn test_each_phase_is_idempotent() {
    for seed in SEEDS {
        let metadata = common::random_cluster(seed);
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();

        for goal in goals() {
            goal.rebalance(&mut topology).unwrap();
            let settled = topology.assignment();
            let again = goal.rebalance(&mut topology).unwrap();
            assert!(again.is_empty(), "seed {}: {} moved again", seed, goal.name());
            assert_eq!(topology.assignment(), settled);
        }
    }
}

#[test]
fn test_leader_phase_keeps_replica_sets() {
    for seed in SEEDS {
        let metadata = common::random_cluster(seed);
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        let before = replica_sets(&topology);
        let partition_cnt = stats::partition_cnt(&topology);
        let replica_cnt = stats::replica_cnt(&topology);

        let actions = LeaderDistributionGoal.rebalance(&mut topology).unwrap();
        assert!(actions.iter().all(|a| !a.is_movement()));
        assert_eq!(replica_sets(&topology), before, "seed {}", seed);
        assert_eq!(stats::partition_cnt(&topology), partition_cnt);
        assert_eq!(stats::replica_cnt(&topology), replica_cnt);
    }
}

#[test]
fn test_broker_phase_stays_within_groups() {
    for seed in SEEDS {
        let metadata = common::random_cluster(seed);
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        let before = group_spread(&topology);

        let actions = BrokerDistributionGoal.rebalance(&mut topology).unwrap();
        for action in &actions {
            if let Action::MoveReplica {
                from_broker,
                to_broker,
                ..
            } = action
            {
                assert_eq!(
                    topology.group_of(*from_broker),
                    topology.group_of(*to_broker),
                    "seed {}: {}",
                    seed,
                    action.description()
                );
            }
        }
        assert_eq!(group_spread(&topology), before, "seed {}", seed);
    }
}

#[test]
fn test_dead_brokers_never_receive_replicas() {
    for seed in SEEDS {
        let metadata = common::random_cluster(seed);
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        let report = Optimizer::from_constraints(&BalancingConstraints::default())
            .optimize(&mut topology)
            .unwrap();

        for action in report.results.iter().flat_map(|r| &r.actions) {
            for broker in action.affected_brokers().into_iter().skip(1) {
                assert!(
                    topology.broker(broker).unwrap().is_alive,
                    "seed {}: {}",
                    seed,
                    action.description()
                );
            }
        }
    }
}

#[test]
fn test_generated_plans_validate_and_fit_budget() {
    common::init_tracing();
    let constraints = BalancingConstraints {
        verify_invariants: true,
        ..BalancingConstraints::default().with_budget(3, 4)
    };
    let rebalancer = Rebalancer::new(constraints).unwrap();

    for seed in SEEDS {
        let metadata = common::random_cluster(seed);
        let plan = rebalancer.generate_plan(&metadata).unwrap();

        assert!(plan.summary.movements <= 3);
        assert!(plan.summary.leader_changes <= 4);
        assert_eq!(
            validate_plan(&metadata.assignment, &plan.assignment, &metadata.live_brokers()),
            Ok(())
        );
    }
}

#[test]
fn test_replication_group_phase_leaves_no_improving_move() {
    for seed in SEEDS {
        let metadata = common::random_cluster(seed);
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        let improvable = improving_spread_move(&topology).is_some();

        let actions = ReplicationGroupGoal.rebalance(&mut topology).unwrap();
        if improvable {
            assert!(!actions.is_empty(), "seed {}", seed);
        }
        if let Some(action) = improving_spread_move(&topology) {
            panic!("seed {}: {} would still lower the spread", seed, action.description());
        }
    }
}

#[test]
fn test_broker_phase_lowers_partition_count_when_it_can() {
    for seed in SEEDS {
        let metadata = common::random_cluster(seed);
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        let before = stats::partition_cnt(&topology);
        let improvable = improving_broker_move(&topology).is_some();

        BrokerDistributionGoal.rebalance(&mut topology).unwrap();
        if improvable {
            assert!(stats::partition_cnt(&topology) < before, "seed {}", seed);
        }
        if let Some(action) = improving_broker_move(&topology) {
            panic!("seed {}: {} would still help", seed, action.description());
        }
    }
}

#[test]
fn test_leader_phase_lowers_leader_count_when_it_can() {
    for seed in SEEDS {
        let metadata = common::random_cluster(seed);
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        let before = stats::leader_cnt(&topology);
        let improvable = improving_leader_change(&topology).is_some();

        LeaderDistributionGoal.rebalance(&mut topology).unwrap();
        if improvable {
            assert!(stats::leader_cnt(&topology) < before, "seed {}", seed);
        }
        if let Some(action) = improving_leader_change(&topology) {
            panic!("seed {}: {} would still help", seed, action.description());
        }
    }
}
