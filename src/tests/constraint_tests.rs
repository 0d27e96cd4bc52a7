use super::fixtures::{disk, server, virtual_disk, virtual_server};
use crate::cluster::{
    check_disks, disk_usage, has_disk_capacity, has_primary_ram_capacity, has_processor_capacity,
    has_secondary_core_capacity, has_secondary_ram_capacity, matches_hardware_requirements,
    AllocationState, DiskCapacity, DiskUsage, HardwareField, Inventory, Placement, Rejection, Role,
    ServerAllocation,
};
use crate::db::{DiskType, ProcessorArchitecture, ProcessorType, VirtualDisk};

fn allocation(server_count: usize) -> ServerAllocation {
    ServerAllocation { secondary_rams: vec![0; server_count], ..ServerAllocation::default() }
}

#[test]
fn test_primary_pin_must_match() {
    let mut vs = virtual_server("vm1");
    vs.primary_server = Some("host-b".to_string());

    assert_eq!(
        matches_hardware_requirements(&vs, &server("host-a"), Role::Primary),
        Err(Rejection::PrimaryHardwareMismatch(HardwareField::Pin))
    );
    assert!(matches_hardware_requirements(&vs, &server("host-b"), Role::Primary).is_ok());
    // The primary pin says nothing about the secondary.
    assert!(matches_hardware_requirements(&vs, &server("host-a"), Role::Secondary).is_ok());
}

#[test]
fn test_processor_type_and_speed_only_bind_primary() {
    let mut vs = virtual_server("vm1");
    vs.minimum_processor_type = Some(ProcessorType::Epyc);
    vs.minimum_processor_speed = Some(3000);

    let host = server("host-a");
    assert_eq!(
        matches_hardware_requirements(&vs, &host, Role::Primary),
        Err(Rejection::PrimaryHardwareMismatch(HardwareField::ProcessorType))
    );
    assert!(matches_hardware_requirements(&vs, &host, Role::Secondary).is_ok());

    let mut fast = server("host-b");
    fast.processor_type = ProcessorType::Epyc;
    fast.processor_speed = 2900;
    assert_eq!(
        matches_hardware_requirements(&vs, &fast, Role::Primary),
        Err(Rejection::PrimaryHardwareMismatch(HardwareField::Speed))
    );
    fast.processor_speed = 3000;
    assert!(matches_hardware_requirements(&vs, &fast, Role::Primary).is_ok());
}

#[test]
fn test_architecture_binds_both_roles() {
    let mut vs = virtual_server("vm1");
    vs.processor_architecture = Some(ProcessorArchitecture::Aarch64);
    let host = server("host-a");

    assert_eq!(
        matches_hardware_requirements(&vs, &host, Role::Primary),
        Err(Rejection::PrimaryHardwareMismatch(HardwareField::Architecture))
    );
    assert_eq!(
        matches_hardware_requirements(&vs, &host, Role::Secondary),
        Err(Rejection::SecondaryHardwareMismatch(HardwareField::Architecture))
    );
}

#[test]
fn test_processor_capacity_boundary() {
    let host = server("host-a"); // 8 cores -> 8000
    let vs = virtual_server("vm1"); // 2 x 500 = 1000

    let mut alloc = allocation(1);
    alloc.processor_weight = 7000;
    assert!(has_processor_capacity(&alloc, &host, &vs).is_ok());

    alloc.processor_weight = 7001;
    assert_eq!(
        has_processor_capacity(&alloc, &host, &vs),
        Err(Rejection::PrimaryProcessorCapacityExceeded)
    );
}

#[test]
fn test_primary_ram_counts_worst_failover_reservation() {
    let host = server("host-a"); // 16000 MB
    let vs = virtual_server("vm1"); // 4000 MB primary

    let mut alloc = allocation(2);
    alloc.primary_ram = 4000;
    alloc.max_secondary_ram = 8000;
    assert!(has_primary_ram_capacity(&alloc, &host, &vs).is_ok());

    alloc.max_secondary_ram = 8001;
    assert_eq!(
        has_primary_ram_capacity(&alloc, &host, &vs),
        Err(Rejection::PrimaryRamCapacityExceeded)
    );
}

#[test]
fn test_secondary_ram_is_per_failed_primary() {
    let host = server("host-a");
    let vs = virtual_server("vm1"); // 4000 MB secondary

    let mut alloc = allocation(3);
    alloc.primary_ram = 8000;
    alloc.secondary_rams = vec![0, 4001, 0];
    alloc.max_secondary_ram = 4001;

    // Failover load from server 1 competes, load from other servers does not.
    assert_eq!(
        has_secondary_ram_capacity(&alloc, &host, &vs, 1),
        Err(Rejection::SecondaryRamCapacityExceeded)
    );
    assert!(has_secondary_ram_capacity(&alloc, &host, &vs, 0).is_ok());
    assert!(has_secondary_ram_capacity(&alloc, &host, &vs, 2).is_ok());
}

#[test]
fn test_secondary_needs_enough_cores() {
    let mut host = server("host-a");
    host.processor_cores = 1;
    let vs = virtual_server("vm1");

    assert_eq!(
        has_secondary_core_capacity(&host, &vs),
        Err(Rejection::SecondaryCoreCapacityExceeded)
    );
    host.processor_cores = 2;
    assert!(has_secondary_core_capacity(&host, &vs).is_ok());
}

#[test]
fn test_disk_capacity_checks_extents_before_weight() {
    let capacity = DiskCapacity { extents: 100, disks: 1 };
    let sata = DiskType::Sata;

    let full = DiskUsage { extents: 100, weight: 1000 };
    assert!(has_disk_capacity(capacity, sata, full, Role::Primary).is_ok());
    assert_eq!(
        has_disk_capacity(capacity, sata, DiskUsage { extents: 101, weight: 1001 }, Role::Primary),
        Err(Rejection::PrimaryDiskExtentsExceeded { disk_type: sata })
    );
    assert_eq!(
        has_disk_capacity(capacity, sata, DiskUsage { extents: 10, weight: 1001 }, Role::Secondary),
        Err(Rejection::SecondaryDiskWeightExceeded { disk_type: sata })
    );
}

#[test]
fn test_disk_capacity_with_no_disks_of_type() {
    let none = DiskCapacity::default();
    assert!(has_disk_capacity(none, DiskType::Ssd, DiskUsage::default(), Role::Primary).is_ok());
    assert_eq!(
        has_disk_capacity(none, DiskType::Ssd, DiskUsage { extents: 1, weight: 0 }, Role::Primary),
        Err(Rejection::PrimaryDiskExtentsExceeded { disk_type: DiskType::Ssd })
    );
}

#[test]
fn test_disk_usage_counts_each_copy_by_its_own_type() {
    let mut host_a = server("host-a");
    host_a.disks.push(disk("sdb", DiskType::Ssd, 50));
    let host_b = server("host-b");

    let mut vs = virtual_server("vm1");
    vs.disks = vec![VirtualDisk {
        device: "xvda".to_string(),
        extents: 20,
        primary_disk_type: DiskType::Ssd,
        secondary_disk_type: DiskType::Sata,
        primary_weight: 700,
        secondary_weight: 300,
    }];

    let inventory = Inventory::new(vec![host_a, host_b], vec![vs]).unwrap();
    let placements = [Placement { virtual_server: 0, primary: 0, secondary: 1 }];

    assert_eq!(
        disk_usage(&inventory, &placements, 0, DiskType::Ssd, None),
        DiskUsage { extents: 20, weight: 700 }
    );
    assert_eq!(disk_usage(&inventory, &placements, 0, DiskType::Sata, None), DiskUsage::default());
    assert_eq!(
        disk_usage(&inventory, &placements, 1, DiskType::Sata, None),
        DiskUsage { extents: 20, weight: 300 }
    );
    // A tentative copy is added on top of the placements.
    assert_eq!(
        disk_usage(&inventory, &placements, 1, DiskType::Ssd, Some((0, Role::Primary))),
        DiskUsage { extents: 20, weight: 700 }
    );
}

#[test]
fn test_check_disks_reports_weight_when_extents_fit() {
    let mut host_a = server("host-a");
    host_a.disks = vec![disk("sda", DiskType::Sata, 1000)];
    let host_b = server("host-b");

    let mut vm1 = virtual_server("vm1");
    vm1.disks = vec![virtual_disk("xvda", DiskType::Sata, 10, 600)];
    let mut vm2 = virtual_server("vm2");
    vm2.disks = vec![virtual_disk("xvda", DiskType::Sata, 10, 600)];

    let inventory = Inventory::new(vec![host_a, host_b], vec![vm1, vm2]).unwrap();
    let placements = [Placement { virtual_server: 0, primary: 0, secondary: 1 }];

    assert!(check_disks(&inventory, &[], 0, Some((1, Role::Primary)), Role::Primary).is_ok());
    assert_eq!(
        check_disks(&inventory, &placements, 0, Some((1, Role::Primary)), Role::Primary),
        Err(Rejection::PrimaryDiskWeightExceeded { disk_type: DiskType::Sata })
    );
}

#[test]
fn test_primary_commit_reverts_on_drop() {
    let vs = virtual_server("vm1");
    let mut state = AllocationState::new(2);
    let before = state.clone();

    {
        let committed = state.commit_primary(0, &vs);
        assert_eq!(committed.server(0).processor_weight, 1000);
        assert_eq!(committed.server(0).primary_ram, 4000);
        assert!(committed.placements().is_empty());
    }

    assert_eq!(state, before);
}

#[test]
fn test_secondary_commit_restores_maximum() {
    let vm1 = virtual_server("vm1");
    let mut vm2 = virtual_server("vm2");
    vm2.secondary_ram = 6000;

    let mut state = AllocationState::new(3);
    let before = state.clone();

    {
        let mut first = state.commit_secondary(0, &vm1, 0, 2);
        assert_eq!(first.server(2).secondary_rams, vec![4000, 0, 0]);
        assert_eq!(first.server(2).max_secondary_ram, 4000);

        let after_first = AllocationState::clone(&first);
        {
            // Same secondary, different failed primary: tracked separately.
            let second = first.commit_secondary(1, &vm2, 1, 2);
            assert_eq!(second.server(2).secondary_rams, vec![4000, 6000, 0]);
            assert_eq!(second.server(2).max_secondary_ram, 6000);
            assert_eq!(second.placements().len(), 2);
        }
        assert_eq!(*first, after_first);
    }

    assert_eq!(state, before);
}

#[test]
fn test_ram_checks_reject_sums_that_overflow() {
    let mut host = server("host-a");
    host.ram = u64::MAX;
    let mut vs = virtual_server("vm1");
    vs.primary_ram = 10;
    vs.secondary_ram = 10;

    let mut alloc = allocation(2);
    alloc.primary_ram = u64::MAX - 5;
    assert_eq!(
        has_primary_ram_capacity(&alloc, &host, &vs),
        Err(Rejection::PrimaryRamCapacityExceeded)
    );
    assert_eq!(
        has_secondary_ram_capacity(&alloc, &host, &vs, 1),
        Err(Rejection::SecondaryRamCapacityExceeded)
    );

    let mut alloc = allocation(2);
    alloc.max_secondary_ram = u64::MAX;
    alloc.secondary_rams[1] = u64::MAX;
    assert!(has_primary_ram_capacity(&alloc, &host, &vs).is_err());
    assert!(has_secondary_ram_capacity(&alloc, &host, &vs, 1).is_err());
    // Other failure scenarios are unaffected.
    assert!(has_secondary_ram_capacity(&alloc, &host, &vs, 0).is_ok());
}
