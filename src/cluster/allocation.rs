//! Run-scoped allocation counters and the guards that apply and undo them.
//!
//! Every tentative change made by the search is a guard value. Dropping the
//! guard restores the counters it touched, so backtracking is correct on every
//! exit path, including early stops and unwinding.

use crate::db::VirtualServer;
use std::ops::{Deref, DerefMut};

/// Counters for one physical server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ServerAllocation {
    /// Sum of cores × weight of the virtual servers running here as primary.
    pub processor_weight: u64,
    pub primary_ram: u64,
    /// RAM reserved here for failover, indexed by the server assumed to fail.
    pub secondary_rams: Vec<u64>,
    /// Maximum over `secondary_rams`.
    pub max_secondary_ram: u64,
}

/// Primary and secondary chosen for one virtual server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    pub virtual_server: usize,
    pub primary: usize,
    pub secondary: usize,
}

/// Allocation state of an in-progress search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AllocationState {
    servers: Vec<ServerAllocation>,
    placements: Vec<Placement>,
}

impl AllocationState {
    pub(crate) fn new(server_count: usize) -> Self {
        Self {
            servers: (0..server_count)
                .map(|_| ServerAllocation {
                    secondary_rams: vec![0; server_count],
                    ..ServerAllocation::default()
                })
                .collect(),
            placements: Vec::new(),
        }
    }

    pub(crate) fn server(&self, index: usize) -> &ServerAllocation {
        &self.servers[index]
    }

    /// Placements of the virtual servers above the current depth, in depth order.
    pub(crate) fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Run `vs` on `server` as primary until the guard is dropped.
    pub(crate) fn commit_primary(
        &mut self,
        server: usize,
        vs: &VirtualServer,
    ) -> PrimaryCommit<'_> {
        let processor_weight = vs.processor_demand();
        let ram = vs.primary_ram;

        let alloc = &mut self.servers[server];
        alloc.processor_weight += processor_weight;
        alloc.primary_ram += ram;

        PrimaryCommit { state: self, server, processor_weight, ram }
    }

    /// Reserve failover capacity for `vs` on `secondary` in case `primary`
    /// fails, and record the placement, until the guard is dropped.
    pub(crate) fn commit_secondary(
        &mut self,
        vs_index: usize,
        vs: &VirtualServer,
        primary: usize,
        secondary: usize,
    ) -> SecondaryCommit<'_> {
        let ram = vs.secondary_ram;

        let alloc = &mut self.servers[secondary];
        let previous_max = alloc.max_secondary_ram;
        alloc.secondary_rams[primary] += ram;
        alloc.max_secondary_ram = previous_max.max(alloc.secondary_rams[primary]);

        self.placements.push(Placement { virtual_server: vs_index, primary, secondary });

        SecondaryCommit {
            state: self,
            server: secondary,
            failed_primary: primary,
            ram,
            previous_max,
        }
    }
}

/// Tentative primary assignment. Reverted on drop.
#[derive(Debug)]
pub(crate) struct PrimaryCommit<'a> {
    state: &'a mut AllocationState,
    server: usize,
    processor_weight: u64,
    ram: u64,
}

impl Deref for PrimaryCommit<'_> {
    type Target = AllocationState;

    fn deref(&self) -> &AllocationState {
        self.state
    }
}

impl DerefMut for PrimaryCommit<'_> {
    fn deref_mut(&mut self) -> &mut AllocationState {
        self.state
    }
}

impl Drop for PrimaryCommit<'_> {
    fn drop(&mut self) {
        let alloc = &mut self.state.servers[self.server];
        alloc.processor_weight -= self.processor_weight;
        alloc.primary_ram -= self.ram;
    }
}

/// Tentative secondary assignment and recorded placement. Reverted on drop.
#[derive(Debug)]
pub(crate) struct SecondaryCommit<'a> {
    state: &'a mut AllocationState,
    server: usize,
    failed_primary: usize,
    ram: u64,
    previous_max: u64,
}

impl Deref for SecondaryCommit<'_> {
    type Target = AllocationState;

    fn deref(&self) -> &AllocationState {
        self.state
    }
}

impl DerefMut for SecondaryCommit<'_> {
    fn deref_mut(&mut self) -> &mut AllocationState {
        self.state
    }
}

impl Drop for SecondaryCommit<'_> {
    fn drop(&mut self) {
        self.state.placements.pop();
        let alloc = &mut self.state.servers[self.server];
        alloc.secondary_rams[self.failed_primary] -= self.ram;
        alloc.max_secondary_ram = self.previous_max;
    }
}
