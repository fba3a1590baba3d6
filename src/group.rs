//! An immutable, ordered set of global worker ids with assigned local ranks.

use std::sync::Arc;

use crate::error::TmpiError;

/// `tMPI_Group`: an ordered sequence of global worker ids with no duplicates. Rank in the
/// group is the index. Immutable once constructed, reference-counted.
#[derive(Debug, PartialEq, Eq)]
pub struct GroupInner {
    members: Vec<u32>,
}

pub type Group = Arc<GroupInner>;

impl GroupInner {
    /// Build a group from global worker ids, in the given order (becomes rank order).
    pub fn new(members: Vec<u32>) -> Group {
        debug_assert!(
            {
                let mut sorted = members.clone();
                sorted.sort_unstable();
                sorted.dedup();
                sorted.len() == members.len()
            },
            "group members must be unique"
        );
        Arc::new(GroupInner { members })
    }

    /// The empty group (`tMPI_GROUP_EMPTY`).
    pub fn empty() -> Group {
        Arc::new(GroupInner { members: Vec::new() })
    }

    /// Number of members (`tMPI_Group_size`).
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// This group's rank for a given global worker id (`tMPI_Group_rank`), or `GROUP_RANK` if
    /// the worker is not a member.
    pub fn rank_of(&self, worker: u32) -> Result<usize, TmpiError> {
        self.members
            .iter()
            .position(|&m| m == worker)
            .ok_or(TmpiError::GroupRank)
    }

    /// The global worker id at a given rank.
    pub fn worker_at(&self, rank: usize) -> Option<u32> {
        self.members.get(rank).copied()
    }

    pub fn members(&self) -> &[u32] {
        &self.members
    }

    /// Construct the subgroup named by `ranks`, in the order given (`tMPI_Group_incl`).
    pub fn incl(&self, ranks: &[usize]) -> Result<Group, TmpiError> {
        let mut members = Vec::with_capacity(ranks.len());
        for &r in ranks {
            members.push(*self.members.get(r).ok_or(TmpiError::GroupRank)?);
        }
        Ok(GroupInner::new(members))
    }
}

/// `tMPI_Group_free`: release a handle. `Group` is reference-counted, so this is just a drop
/// — kept as a named function so the public surface matches §6 exactly.
pub fn free(_group: Group) {}
