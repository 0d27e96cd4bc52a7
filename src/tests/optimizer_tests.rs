use super::fixtures::{disk, server, virtual_disk, virtual_server};
use crate::cluster::{
    has_secondary_core_capacity, matches_hardware_requirements, optimize, Inventory, Mapping,
    InventoryError, OptimizeError, OptimizeOptions, OptimizeOutcome, Optimizer, ProgressSink,
    ProgressSnapshot, RejectionKind, Role, StopReason, MAX_QUANTITY,
};
use crate::db::{DiskType, ProcessorType, VirtualDisk};
use std::cell::RefCell;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn options(max_mappings: u64) -> OptimizeOptions {
    OptimizeOptions { max_mappings, progress_interval: Duration::from_secs(60) }
}

fn first_mapping(inventory: &Inventory) -> Result<OptimizeOutcome, OptimizeError> {
    optimize(inventory, options(1), &(), CancellationToken::new(), |_, _| {})
}

fn all_mappings(inventory: &Inventory) -> Vec<Mapping> {
    let mut mappings = Vec::new();
    Optimizer::new(inventory).search(|mapping| {
        mappings.push(mapping.clone());
        ControlFlow::Continue(())
    });
    mappings
}

fn pairs(mapping: &Mapping) -> Vec<(usize, usize)> {
    mapping.placements.iter().map(|p| (p.primary, p.secondary)).collect()
}

/// Three hosts of different shapes and two virtual servers with mixed disk
/// types, small enough to enumerate by brute force.
fn mixed_inventory() -> Inventory {
    let host_a = server("host-a");
    let mut host_b = server("host-b");
    host_b.processor_type = ProcessorType::Core2;
    let mut host_c = server("host-c");
    host_c.processor_cores = 4;
    host_c.ram = 9000;
    host_c.disks = vec![disk("sda", DiskType::Sata, 40), disk("sdb", DiskType::Ssd, 100)];

    let mut vm1 = virtual_server("vm1");
    vm1.minimum_processor_type = Some(ProcessorType::XeonE5);
    vm1.disks = vec![virtual_disk("xvda", DiskType::Sata, 30, 500)];

    let mut vm2 = virtual_server("vm2");
    vm2.processor_cores = 4;
    vm2.processor_weight = 1000;
    vm2.primary_ram = 6000;
    vm2.secondary_ram = 5000;
    vm2.disks = vec![VirtualDisk {
        device: "xvda".to_string(),
        extents: 30,
        primary_disk_type: DiskType::Ssd,
        secondary_disk_type: DiskType::Sata,
        primary_weight: 400,
        secondary_weight: 400,
    }];

    Inventory::new(vec![host_a, host_b, host_c], vec![vm1, vm2]).unwrap()
}

/// Feasibility of a full assignment, computed directly from the final totals.
fn satisfies_all_constraints(inventory: &Inventory, assignment: &[(usize, usize)]) -> bool {
    let n = inventory.server_count();

    for (v, &(p, s)) in assignment.iter().enumerate() {
        let vs = inventory.virtual_server(v);
        if p == s
            || matches_hardware_requirements(vs, inventory.server(p), Role::Primary).is_err()
            || matches_hardware_requirements(vs, inventory.server(s), Role::Secondary).is_err()
            || has_secondary_core_capacity(inventory.server(s), vs).is_err()
        {
            return false;
        }
    }

    for host in 0..n {
        let server = inventory.server(host);
        let mut cpu = 0;
        let mut primary_ram = 0;
        let mut secondary_by_failure = vec![0u64; n];
        let mut extents = [0u64; DiskType::COUNT];
        let mut weight = [0u64; DiskType::COUNT];

        for (v, &(p, s)) in assignment.iter().enumerate() {
            let vs = inventory.virtual_server(v);
            if p == host {
                cpu += u64::from(vs.processor_cores) * u64::from(vs.processor_weight);
                primary_ram += vs.primary_ram;
                for d in &vs.disks {
                    extents[d.primary_disk_type.index()] += d.extents;
                    weight[d.primary_disk_type.index()] += u64::from(d.primary_weight);
                }
            }
            if s == host {
                secondary_by_failure[p] += vs.secondary_ram;
                for d in &vs.disks {
                    extents[d.secondary_disk_type.index()] += d.extents;
                    weight[d.secondary_disk_type.index()] += u64::from(d.secondary_weight);
                }
            }
        }

        let worst_failover = secondary_by_failure.iter().copied().max().unwrap_or(0);
        if cpu > u64::from(server.processor_cores) * 1000
            || primary_ram + worst_failover > server.ram
        {
            return false;
        }
        for disk_type in DiskType::ALL {
            let capacity = inventory.disk_capacity(host, disk_type);
            if extents[disk_type.index()] > capacity.extents
                || weight[disk_type.index()] > capacity.weight_limit()
            {
                return false;
            }
        }
    }
    true
}

#[test]
fn test_two_identical_servers_one_virtual_server() {
    let inventory =
        Inventory::new(vec![server("host-a"), server("host-b")], vec![virtual_server("vm1")])
            .unwrap();

    let outcome = first_mapping(&inventory).unwrap();
    let mapping = &outcome.first;
    assert_eq!(pairs(mapping), vec![(0, 1)]);
    assert_eq!(mapping.usage[0].processor_weight, 1000);
    assert_eq!(mapping.usage[1].processor_weight, 0);
    assert_eq!(mapping.usage[0].primary_ram, 4000);
    assert_eq!(mapping.usage[1].max_secondary_ram, 4000);
    for usage in &mapping.usage {
        assert_eq!(usage.disks.len(), 1);
        assert_eq!(usage.disks[0].disk_type, DiskType::Sata);
        assert_eq!(usage.disks[0].extents, 10);
        assert_eq!(usage.disks[0].weight, 500);
    }

    let resolved = mapping.resolve(&inventory);
    assert_eq!(resolved[0].virtual_server, "vm1");
    assert_eq!(resolved[0].primary_server, "host-a");
    assert_eq!(resolved[0].secondary_server, "host-b");

    // Symmetric inventory: both orders are feasible.
    let every: Vec<_> = all_mappings(&inventory).iter().map(pairs).collect();
    assert_eq!(every, vec![vec![(0, 1)], vec![(1, 0)]]);
}

#[test]
fn test_single_server_is_infeasible() {
    let inventory = Inventory::new(vec![server("host-a")], vec![virtual_server("vm1")]).unwrap();

    match first_mapping(&inventory) {
        Err(OptimizeError::NoFeasibleMapping { stats, .. }) => {
            assert_eq!(stats.mappings_found, 0);
            // The primary is tried; there is never a distinct secondary to try.
            assert_eq!(stats.candidates_tried, 1);
            assert_eq!(stats.candidates_rejected, 0);
        }
        other => panic!("expected NoFeasibleMapping, got {other:?}"),
    }
}

#[test]
fn test_oversized_ram_concentrates_tally() {
    let mut vs = virtual_server("vm1");
    vs.primary_ram = 32000;
    let inventory =
        Inventory::new(vec![server("host-a"), server("host-b"), server("host-c")], vec![vs])
            .unwrap();

    let err = first_mapping(&inventory).unwrap_err();
    let stats = err.stats().unwrap();
    assert_eq!(stats.candidates_rejected, 3);
    assert_eq!(stats.rejections.count(RejectionKind::PrimaryRamCapacityExceeded), 3);
    assert_eq!(
        stats.rejections.dominant(),
        Some((RejectionKind::PrimaryRamCapacityExceeded, 3))
    );
    assert!(err.to_string().contains("primary_ram_capacity_exceeded"));
}

#[test]
fn test_secondary_pin_is_honored_in_every_mapping() {
    let mut vs = virtual_server("vm1");
    vs.secondary_server = Some("host-c".to_string());
    let inventory =
        Inventory::new(vec![server("host-a"), server("host-b"), server("host-c")], vec![vs])
            .unwrap();

    let mappings = all_mappings(&inventory);
    assert_eq!(mappings.len(), 2);
    for mapping in &mappings {
        assert_eq!(mapping.placements[0].secondary, 2);
    }
}

#[test]
fn test_disk_weight_exhaustion_with_spare_extents() {
    let mut host_a = server("host-a");
    host_a.disks = vec![disk("sda", DiskType::Sata, 1000)];
    let mut host_b = server("host-b");
    host_b.disks = vec![disk("sda", DiskType::Sata, 1000)];

    let mut vm1 = virtual_server("vm1");
    vm1.primary_server = Some("host-a".to_string());
    vm1.secondary_server = Some("host-b".to_string());
    vm1.disks = vec![virtual_disk("xvda", DiskType::Sata, 10, 600)];

    let mut vm2 = virtual_server("vm2");
    vm2.primary_server = Some("host-b".to_string());
    vm2.secondary_server = Some("host-a".to_string());
    vm2.disks = vec![virtual_disk("xvda", DiskType::Sata, 10, 600)];

    let inventory = Inventory::new(vec![host_a, host_b], vec![vm1, vm2]).unwrap();

    let err = first_mapping(&inventory).unwrap_err();
    let stats = err.stats().unwrap();
    assert!(stats.rejections.count(RejectionKind::PrimaryDiskWeightExceeded) >= 1);
    assert_eq!(stats.rejections.count(RejectionKind::PrimaryDiskExtentsExceeded), 0);
    assert_eq!(stats.rejections.count(RejectionKind::SecondaryDiskExtentsExceeded), 0);
}

#[test]
fn test_zero_virtual_servers_is_empty_success() {
    let inventory = Inventory::new(vec![server("host-a")], vec![]).unwrap();
    let outcome = first_mapping(&inventory).unwrap();
    assert!(outcome.first.placements.is_empty());
    assert_eq!(outcome.summary.stats.mappings_found, 1);
    assert_eq!(outcome.summary.stats.candidates_tried, 0);
}

#[test]
fn test_zero_servers_is_infeasible() {
    let inventory = Inventory::new(vec![], vec![virtual_server("vm1")]).unwrap();
    match first_mapping(&inventory) {
        Err(OptimizeError::NoFeasibleMapping { stats, .. }) => {
            assert_eq!(stats.candidates_tried, 0);
        }
        other => panic!("expected NoFeasibleMapping, got {other:?}"),
    }
}

#[test]
fn test_unknown_primary_pin_rejects_every_primary() {
    let mut vs = virtual_server("vm1");
    vs.primary_server = Some("host-z".to_string());
    let inventory = Inventory::new(vec![server("host-a"), server("host-b")], vec![vs]).unwrap();

    let err = first_mapping(&inventory).unwrap_err();
    assert!(matches!(err, OptimizeError::NoFeasibleMapping { .. }));
    let stats = err.stats().unwrap();
    assert_eq!(stats.rejections.count(RejectionKind::PrimaryHardwareMismatch), 2);
}

#[test]
fn test_first_mapping_is_deterministic() {
    let inventory = mixed_inventory();
    let first = first_mapping(&inventory).unwrap();
    let second = first_mapping(&inventory).unwrap();
    assert_eq!(first.first, second.first);
    assert_eq!(first.summary.stats, second.summary.stats);
}

#[test]
fn test_enumeration_matches_brute_force() {
    let inventory = mixed_inventory();
    let n = inventory.server_count();

    let mut expected = Vec::new();
    for p1 in 0..n {
        for s1 in 0..n {
            for p2 in 0..n {
                for s2 in 0..n {
                    let assignment = [(p1, s1), (p2, s2)];
                    if satisfies_all_constraints(&inventory, &assignment) {
                        expected.push(assignment.to_vec());
                    }
                }
            }
        }
    }

    let found: Vec<_> = all_mappings(&inventory).iter().map(pairs).collect();
    assert!(!found.is_empty());
    // Same nesting order as the search, so the lists line up exactly.
    assert_eq!(found, expected);
}

#[test]
fn test_every_mapping_respects_capacity() {
    let servers = (0..3)
        .map(|i| {
            let mut host = server(&format!("host-{i}"));
            host.processor_cores = 4;
            host.ram = 10000;
            host
        })
        .collect();
    let virtual_servers = (0..3)
        .map(|i| {
            let mut vs = virtual_server(&format!("vm{i}"));
            vs.processor_weight = 1000;
            vs.secondary_ram = 3000;
            vs.disks = vec![virtual_disk("xvda", DiskType::Sata, 30, 400)];
            vs
        })
        .collect();
    let inventory = Inventory::new(servers, virtual_servers).unwrap();

    let mut mappings = Vec::new();
    let summary = Optimizer::new(&inventory).search(|mapping| {
        mappings.push(mapping.clone());
        ControlFlow::Continue(())
    });

    assert!(!mappings.is_empty());
    assert!(summary.stats.candidates_rejected > 0);
    assert_eq!(summary.stop, StopReason::Exhausted);
    assert_eq!(summary.stats.mappings_found, mappings.len() as u64);
    let tallied: u64 = summary.stats.rejections.iter().map(|(_, count)| count).sum();
    assert_eq!(tallied, summary.stats.candidates_rejected);

    for mapping in &mappings {
        assert!(satisfies_all_constraints(&inventory, &pairs(mapping)));
        for placement in &mapping.placements {
            assert_ne!(placement.primary, placement.secondary);
        }
        for usage in &mapping.usage {
            assert!(usage.processor_weight <= usage.processor_capacity);
            assert!(usage.primary_ram + usage.max_secondary_ram <= usage.ram);
            for d in &usage.disks {
                assert!(d.extents <= d.extents_capacity);
                assert!(d.weight <= d.weight_capacity);
            }
        }
    }
}

#[test]
fn test_max_mappings_limits_the_run() {
    let inventory =
        Inventory::new(vec![server("host-a"), server("host-b")], vec![virtual_server("vm1")])
            .unwrap();

    let mut ordinals = Vec::new();
    let outcome = optimize(&inventory, options(0), &(), CancellationToken::new(), |ordinal, _| {
        ordinals.push(ordinal);
    })
    .unwrap();
    assert_eq!(ordinals, vec![1, 2]);
    assert_eq!(outcome.summary.stop, StopReason::Exhausted);

    let outcome = first_mapping(&inventory).unwrap();
    assert_eq!(outcome.summary.stats.mappings_found, 1);
    assert_eq!(outcome.summary.stop, StopReason::Requested);
}

#[test]
fn test_cancelled_before_start() {
    let inventory =
        Inventory::new(vec![server("host-a"), server("host-b")], vec![virtual_server("vm1")])
            .unwrap();
    let token = CancellationToken::new();
    token.cancel();

    match optimize(&inventory, options(1), &(), token, |_, _| {}) {
        Err(OptimizeError::Cancelled { stats, .. }) => assert_eq!(stats.candidates_tried, 0),
        other => panic!("expected Cancelled, got {other:?}"),
    }
}

#[test]
fn test_cancel_after_first_mapping_keeps_it() {
    let inventory =
        Inventory::new(vec![server("host-a"), server("host-b")], vec![virtual_server("vm1")])
            .unwrap();
    let token = CancellationToken::new();
    let trigger = token.clone();

    let outcome = optimize(&inventory, options(0), &(), token, |_, _| trigger.cancel()).unwrap();
    assert_eq!(outcome.summary.stop, StopReason::Cancelled);
    assert_eq!(outcome.summary.stats.mappings_found, 1);
    assert_eq!(pairs(&outcome.first), vec![(0, 1)]);
}

#[derive(Default)]
struct RecordingSink {
    snapshots: RefCell<Vec<ProgressSnapshot>>,
}

impl ProgressSink for RecordingSink {
    fn progress(&self, snapshot: &ProgressSnapshot) {
        self.snapshots.borrow_mut().push(snapshot.clone());
    }
}

#[test]
fn test_progress_snapshots_are_emitted() {
    let servers = ["host-a", "host-b", "host-c", "host-d"].map(server).to_vec();
    let virtual_servers = ["vm1", "vm2", "vm3"].map(virtual_server).to_vec();
    let inventory = Inventory::new(servers, virtual_servers).unwrap();

    let sink = RecordingSink::default();
    let summary = Optimizer::new(&inventory)
        .with_progress(&sink, Duration::ZERO)
        .search(|_| ControlFlow::Continue(()));

    let snapshots = sink.snapshots.borrow();
    assert!(summary.stats.candidates_tried > 256);
    assert!(!snapshots.is_empty());
    for snapshot in snapshots.iter() {
        assert_eq!(snapshot.candidates_tried % 256, 0);
        assert_eq!(snapshot.virtual_servers, 3);
        assert!(snapshot.depth < 3);
        assert!(snapshot.path.len() <= snapshot.depth);
    }
}

#[test]
fn test_huge_ram_cannot_wrap_into_a_mapping() {
    let hosts = || {
        let mut host_a = server("host-a");
        host_a.ram = MAX_QUANTITY;
        let mut host_b = server("host-b");
        host_b.ram = MAX_QUANTITY;
        vec![host_a, host_b]
    };
    let guests = |huge: u64| {
        let mut vm1 = virtual_server("vm1");
        vm1.primary_server = Some("host-a".to_string());
        vm1.primary_ram = huge;
        let mut vm2 = virtual_server("vm2");
        vm2.primary_server = Some("host-a".to_string());
        vm2.primary_ram = 10;
        vec![vm1, vm2]
    };

    let err = Inventory::new(hosts(), guests(u64::MAX)).unwrap_err();
    assert!(matches!(err, InventoryError::QuantityOutOfRange { field: "primary_ram", .. }));

    // The largest accepted size fills host-a on its own.
    let inventory = Inventory::new(hosts(), guests(MAX_QUANTITY)).unwrap();
    match first_mapping(&inventory) {
        Err(OptimizeError::NoFeasibleMapping { stats, .. }) => {
            assert_eq!(stats.mappings_found, 0);
            assert!(stats.rejections.count(RejectionKind::PrimaryRamCapacityExceeded) >= 1);
        }
        other => panic!("expected NoFeasibleMapping, got {other:?}"),
    }
}
