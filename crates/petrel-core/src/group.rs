//! Group-operation state machine.
//!
//! Applies membership/role/mute deltas to one owned member table per
//! group. Handlers are idempotent: the server delivers at-least-once
//! and operations may arrive twice, so replays must converge instead of
//! corrupting state. The only compound handler is owner transfer, which
//! demotes the previous owner and promotes the target in a single call
//! so no reader can observe a group with zero or two owners.
//!
//! Consumers (chat previews, tip rendering) get read-only
//! [`RosterHandle`]s; nothing outside this module mutates the table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use petrel_shared::message::{GroupOpKind, GroupOperationBody};
use petrel_shared::types::{GroupMember, MuteState, Role};

/// Mutable group metadata kept beside the member table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupInfo {
    pub group_id: String,
    pub name: String,
    pub announcement: Option<String>,
    pub join_mode: Option<String>,
    pub all_muted: bool,
    pub dismissed: bool,
}

#[derive(Debug, Default)]
struct RosterState {
    info: GroupInfo,
    members: HashMap<String, GroupMember>,
}

/// The single owned roster of one group conversation.
#[derive(Clone)]
pub struct GroupRoster {
    state: Arc<RwLock<RosterState>>,
}

impl GroupRoster {
    pub fn new(group_id: impl Into<String>) -> Self {
        let state = RosterState {
            info: GroupInfo {
                group_id: group_id.into(),
                ..GroupInfo::default()
            },
            members: HashMap::new(),
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Replace the member table wholesale, e.g. from a server fetch.
    pub fn seed(&self, members: Vec<GroupMember>) {
        let mut state = self.state.write().expect("roster lock poisoned");
        state.members = members
            .into_iter()
            .map(|member| (member.user_id.clone(), member))
            .collect();
    }

    /// Hand out a read-only view of this roster.
    pub fn handle(&self) -> RosterHandle {
        RosterHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Apply one operation. Unrecognized codes are logged and ignored so
    /// future server-side operation types cannot crash the client.
    pub fn apply(&self, op: &GroupOperationBody) {
        let kind = GroupOpKind::from_code(op.op_code);
        let mut state = self.state.write().expect("roster lock poisoned");

        match kind {
            GroupOpKind::Join => {
                for target in &op.target_ids {
                    state
                        .members
                        .entry(target.clone())
                        .or_insert_with(|| placeholder_member(target));
                }
            }
            GroupOpKind::Leave => {
                let leavers: Vec<&String> = if op.target_ids.is_empty() {
                    vec![&op.operator_id]
                } else {
                    op.target_ids.iter().collect()
                };
                for leaver in leavers {
                    state.members.remove(leaver);
                }
            }
            GroupOpKind::Kick => {
                // Kicking an absent member is a no-op, not an error.
                for target in &op.target_ids {
                    state.members.remove(target);
                }
            }
            GroupOpKind::Promote => {
                for target in &op.target_ids {
                    if let Some(member) = state.members.get_mut(target) {
                        if member.role == Role::Member {
                            member.role = Role::Admin;
                        }
                    }
                }
            }
            GroupOpKind::Demote => {
                for target in &op.target_ids {
                    if let Some(member) = state.members.get_mut(target) {
                        if member.role == Role::Admin {
                            member.role = Role::Member;
                        }
                    }
                }
            }
            GroupOpKind::SetRole => {
                let role = op
                    .value
                    .as_deref()
                    .and_then(|v| v.parse::<i32>().ok())
                    .map(Role::from_code);
                if let Some(role) = role {
                    if role == Role::Owner {
                        tracing::warn!(
                            group = %state.info.group_id,
                            "set-role cannot assign owner; use transfer-owner"
                        );
                    } else {
                        for target in &op.target_ids {
                            if let Some(member) = state.members.get_mut(target) {
                                if member.role != Role::Owner {
                                    member.role = role;
                                }
                            }
                        }
                    }
                }
            }
            GroupOpKind::TransferOwner => {
                if let Some(target) = op.target_ids.first() {
                    transfer_owner(&mut state, target);
                }
            }
            GroupOpKind::MuteMember => {
                for target in &op.target_ids {
                    if let Some(member) = state.members.get_mut(target) {
                        member.mute = MuteState::Muted;
                        member.mute_end_time = op.mute_end_time;
                    }
                }
            }
            GroupOpKind::UnmuteMember => {
                for target in &op.target_ids {
                    if let Some(member) = state.members.get_mut(target) {
                        member.mute = MuteState::None;
                        member.mute_end_time = None;
                    }
                }
            }
            GroupOpKind::MuteAll => state.info.all_muted = true,
            GroupOpKind::UnmuteAll => state.info.all_muted = false,
            GroupOpKind::SetInfo => {
                if let Some(name) = &op.value {
                    state.info.name = name.clone();
                }
            }
            GroupOpKind::SetAnnouncement => {
                state.info.announcement = op.value.clone();
            }
            GroupOpKind::SetJoinMode => {
                state.info.join_mode = op.value.clone();
            }
            GroupOpKind::Dismiss => {
                state.members.clear();
                state.info.dismissed = true;
            }
            GroupOpKind::Unrecognized(code) => {
                tracing::warn!(
                    group = %state.info.group_id,
                    op_code = code,
                    "ignoring unrecognized group operation"
                );
            }
        }
    }
}

/// Demote the previous owner and promote the target atomically. If the
/// target is already the only owner the call is a no-op.
fn transfer_owner(state: &mut RosterState, target: &str) {
    if !state.members.contains_key(target) {
        tracing::warn!(
            group = %state.info.group_id,
            target,
            "transfer-owner target is not a member; ignoring"
        );
        return;
    }

    for member in state.members.values_mut() {
        if member.role == Role::Owner && member.user_id != target {
            member.role = Role::Member;
        }
    }
    if let Some(member) = state.members.get_mut(target) {
        member.role = Role::Owner;
    }
}

/// A member whose profile has not been fetched yet; the id doubles as
/// the display name until a profile refresh fills it in.
fn placeholder_member(user_id: &str) -> GroupMember {
    GroupMember {
        user_id: user_id.to_string(),
        name: user_id.to_string(),
        avatar: None,
        role: Role::Member,
        mute: MuteState::None,
        mute_end_time: None,
        alias: None,
    }
}

/// Read-only capability over a [`GroupRoster`]. Cheap to clone.
#[derive(Clone)]
pub struct RosterHandle {
    state: Arc<RwLock<RosterState>>,
}

impl RosterHandle {
    pub fn member(&self, user_id: &str) -> Option<GroupMember> {
        self.state
            .read()
            .expect("roster lock poisoned")
            .members
            .get(user_id)
            .cloned()
    }

    /// Display name for tips: alias, profile name, or the bare id.
    pub fn display_name(&self, user_id: &str) -> String {
        match self.member(user_id) {
            Some(member) => member.display_name().to_string(),
            None => user_id.to_string(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.state.read().expect("roster lock poisoned").members.len()
    }

    pub fn owner(&self) -> Option<GroupMember> {
        self.state
            .read()
            .expect("roster lock poisoned")
            .members
            .values()
            .find(|member| member.role == Role::Owner)
            .cloned()
    }

    pub fn info(&self) -> GroupInfo {
        self.state.read().expect("roster lock poisoned").info.clone()
    }
}

/// Per-chat roster registry; rosters are created lazily on first use.
#[derive(Clone, Default)]
pub struct GroupDirectory {
    rosters: Arc<Mutex<HashMap<String, GroupRoster>>>,
}

impl GroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch (or lazily create) the roster for a group.
    pub fn roster(&self, group_id: &str) -> GroupRoster {
        let mut rosters = self.rosters.lock().expect("directory lock poisoned");
        rosters
            .entry(group_id.to_string())
            .or_insert_with(|| GroupRoster::new(group_id))
            .clone()
    }

    /// Drop a roster, e.g. after a group is dismissed or deleted.
    pub fn remove(&self, group_id: &str) {
        let mut rosters = self.rosters.lock().expect("directory lock poisoned");
        rosters.remove(group_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user_id: &str, role: Role) -> GroupMember {
        GroupMember {
            user_id: user_id.into(),
            name: format!("name-{user_id}"),
            avatar: None,
            role,
            mute: MuteState::None,
            mute_end_time: None,
            alias: None,
        }
    }

    fn op(op_code: i32, operator: &str, targets: &[&str]) -> GroupOperationBody {
        GroupOperationBody {
            op_code,
            operator_id: operator.into(),
            target_ids: targets.iter().map(|s| s.to_string()).collect(),
            value: None,
            mute_end_time: None,
        }
    }

    fn seeded() -> GroupRoster {
        let roster = GroupRoster::new("g1");
        roster.seed(vec![
            member("u1", Role::Owner),
            member("u2", Role::Admin),
            member("u3", Role::Member),
        ]);
        roster
    }

    #[test]
    fn kick_is_idempotent() {
        let roster = seeded();
        let kick = op(3, "u1", &["u3"]);

        roster.apply(&kick);
        assert_eq!(roster.handle().member_count(), 2);

        // Replaying the same event must be a no-op.
        roster.apply(&kick);
        assert_eq!(roster.handle().member_count(), 2);
        assert!(roster.handle().member("u3").is_none());
    }

    #[test]
    fn transfer_owner_keeps_exactly_one_owner() {
        let roster = seeded();
        let transfer = op(7, "u1", &["u3"]);

        roster.apply(&transfer);

        let handle = roster.handle();
        let owner = handle.owner().expect("an owner must exist");
        assert_eq!(owner.user_id, "u3");
        assert_eq!(handle.member("u1").unwrap().role, Role::Member);

        // Replay converges to the same state.
        roster.apply(&transfer);
        assert_eq!(handle.owner().unwrap().user_id, "u3");
        let owners = ["u1", "u2", "u3"]
            .iter()
            .filter(|id| handle.member(id).unwrap().role == Role::Owner)
            .count();
        assert_eq!(owners, 1);
    }

    #[test]
    fn transfer_to_non_member_is_ignored() {
        let roster = seeded();
        roster.apply(&op(7, "u1", &["ghost"]));
        assert_eq!(roster.handle().owner().unwrap().user_id, "u1");
    }

    #[test]
    fn join_twice_inserts_once() {
        let roster = seeded();
        let join = op(1, "u9", &["u9"]);

        roster.apply(&join);
        roster.apply(&join);

        assert_eq!(roster.handle().member_count(), 4);
        assert_eq!(roster.handle().member("u9").unwrap().role, Role::Member);
    }

    #[test]
    fn mute_member_sets_end_time() {
        let roster = seeded();
        let mut mute = op(8, "u1", &["u3"]);
        mute.mute_end_time = Some(1_700_000_999_000);

        roster.apply(&mute);
        let muted = roster.handle().member("u3").unwrap();
        assert_eq!(muted.mute, MuteState::Muted);
        assert_eq!(muted.mute_end_time, Some(1_700_000_999_000));

        roster.apply(&op(9, "u1", &["u3"]));
        let unmuted = roster.handle().member("u3").unwrap();
        assert_eq!(unmuted.mute, MuteState::None);
        assert_eq!(unmuted.mute_end_time, None);
    }

    #[test]
    fn mute_all_and_dismiss_touch_info() {
        let roster = seeded();
        roster.apply(&op(10, "u1", &[]));
        assert!(roster.handle().info().all_muted);

        roster.apply(&op(11, "u1", &[]));
        assert!(!roster.handle().info().all_muted);

        roster.apply(&op(15, "u1", &[]));
        assert!(roster.handle().info().dismissed);
        assert_eq!(roster.handle().member_count(), 0);
    }

    #[test]
    fn set_role_cannot_mint_an_owner() {
        let roster = seeded();
        let mut set_role = op(6, "u1", &["u3"]);
        set_role.value = Some(Role::Owner.code().to_string());

        roster.apply(&set_role);
        assert_eq!(roster.handle().member("u3").unwrap().role, Role::Member);
        assert_eq!(roster.handle().owner().unwrap().user_id, "u1");
    }

    #[test]
    fn unrecognized_op_is_ignored() {
        let roster = seeded();
        roster.apply(&op(404, "u1", &["u3"]));
        assert_eq!(roster.handle().member_count(), 3);
    }

    #[test]
    fn directory_hands_out_the_same_roster() {
        let directory = GroupDirectory::new();
        directory.roster("g1").seed(vec![member("u1", Role::Owner)]);

        assert_eq!(directory.roster("g1").handle().member_count(), 1);

        directory.remove("g1");
        assert_eq!(directory.roster("g1").handle().member_count(), 0);
    }
}
