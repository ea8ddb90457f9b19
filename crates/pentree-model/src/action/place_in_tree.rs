use crate::{
    participant::{Participant, ParticipantId, Placement, MAX_PLACEMENT_DEPTH},
    store::{ParticipantStoreExt, ParticipantStoreMut},
    Error,
};

/// Place a participant into the capped-fanout tree.
///
/// Called at most once per participant, when that participant is about to
/// complete their first qualifying purchase. Calling it again is an
/// idempotent no-op that returns the existing coordinates.
#[must_use]
pub struct PlaceInTree<S> {
    store: S,
    participant: ParticipantId,
}

/// Tree placement report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementReport {
    placement: Placement,
    already_placed: bool,
}

impl PlacementReport {
    /// Get the placement.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Get the winning parent, or `None` for the root.
    pub fn parent(&self) -> Option<ParticipantId> {
        self.placement.parent
    }

    /// Get the assigned level.
    pub fn level(&self) -> u32 {
        self.placement.level
    }

    /// Get the assigned position among siblings.
    pub fn position(&self) -> u32 {
        self.placement.position
    }

    /// Get whether the participant was already placed and the existing
    /// coordinates were returned unchanged.
    pub fn already_placed(&self) -> bool {
        self.already_placed
    }
}

impl<S: ParticipantStoreMut> PlaceInTree<S> {
    /// Create a new [`PlaceInTree`] action.
    pub fn new(store: S, participant: ParticipantId) -> Self {
        Self { store, participant }
    }

    /// Execute.
    pub fn execute(mut self) -> crate::Result<PlacementReport> {
        let participant = self.store.expect(self.participant)?;

        // Idempotent re-entry must not corrupt state, but a second call
        // signals a logic error upstream.
        if let Some(placement) = participant.placement() {
            tracing::warn!(
                participant = %participant.id(),
                "placement requested for an already-placed participant; returning existing coordinates"
            );
            return Ok(PlacementReport {
                placement,
                already_placed: true,
            });
        }

        // Seed the search from the placed referrer when there is one; an
        // absent, unresolvable or not-yet-placed referrer falls back to the
        // global root.
        let seed = match self.store.resolve_referrer(&participant)? {
            Some(referrer) if referrer.is_placed() => Some(referrer.id()),
            _ => self.store.tree_root()?,
        };

        let Some(seed) = seed else {
            // Genuinely the first placement in the system's lifetime,
            // conventionally the platform administrator. Any later
            // occurrence means the tree is corrupted.
            tracing::warn!(
                participant = %participant.id(),
                "no tree root exists; placing participant as root"
            );
            let placement = Placement {
                parent: None,
                level: 1,
                position: 0,
            };
            self.store.apply_placement(self.participant, &placement)?;
            return Ok(PlacementReport {
                placement,
                already_placed: false,
            });
        };

        let root = self.climb_to_root(seed)?;
        let parent = self.find_slot(&root)?;
        let placement = Placement {
            parent: Some(parent.id()),
            level: parent
                .tree_level()
                .checked_add(1)
                .ok_or(Error::Computation("computing child level"))?,
            position: parent.tree_children().len() as u32,
        };
        self.store.apply_placement(self.participant, &placement)?;
        Ok(PlacementReport {
            placement,
            already_placed: false,
        })
    }

    /// Follow `tree_parent` from the seed up to the root.
    fn climb_to_root(&self, seed: ParticipantId) -> crate::Result<Participant> {
        let mut node = self.store.expect(seed)?;
        let mut hops: u32 = 0;
        while let Some(parent) = node.tree_parent() {
            hops = hops
                .checked_add(1)
                .ok_or(Error::Computation("counting climb hops"))?;
            if hops > MAX_PLACEMENT_DEPTH {
                return Err(Error::PlacementDepthExceeded(MAX_PLACEMENT_DEPTH));
            }
            node = self.store.expect(parent)?;
        }
        Ok(node)
    }

    /// Breadth-first left-to-right search for the first parent with a free
    /// slot, starting at the root.
    fn find_slot(&self, root: &Participant) -> crate::Result<Participant> {
        if root.has_free_slot() {
            return Ok(root.clone());
        }
        let mut level = root.tree_level();
        for _ in 0..MAX_PLACEMENT_DEPTH {
            level = level
                .checked_add(1)
                .ok_or(Error::Computation("advancing search level"))?;
            let candidates = self.store.placed_at_level(level)?;
            if candidates.is_empty() {
                // A full level must have successors in a left-filled tree.
                return Err(Error::InvariantViolation(
                    "placement search hit an empty level below a full one",
                ));
            }
            for id in candidates {
                let candidate = self.store.expect(id)?;
                if candidate.has_free_slot() {
                    return Ok(candidate);
                }
            }
        }
        Err(Error::PlacementDepthExceeded(MAX_PLACEMENT_DEPTH))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        participant::{Participant, MAX_TREE_CHILDREN},
        store::{ParticipantStore, ParticipantStoreExt, PlatformExt},
        test::TestPlatform,
    };

    use super::*;

    #[test]
    fn first_placement_creates_the_root() -> crate::Result<()> {
        let mut platform = TestPlatform::new();
        let admin = platform.add_participant("PENT-ADMIN", None);
        let report = platform.place_in_tree(admin).execute()?;
        assert_eq!(report.parent(), None);
        assert_eq!(report.level(), 1);
        assert_eq!(report.position(), 0);
        assert_eq!(platform.tree_root()?, Some(admin));
        Ok(())
    }

    #[test]
    fn placement_is_idempotent() -> crate::Result<()> {
        let mut platform = TestPlatform::new();
        let admin = platform.add_participant("PENT-ADMIN", None);
        let first = platform.place_in_tree(admin).execute()?;
        let second = platform.place_in_tree(admin).execute()?;
        assert!(!first.already_placed());
        assert!(second.already_placed());
        assert_eq!(first.placement(), second.placement());
        Ok(())
    }

    #[test]
    fn breadth_first_left_fill_respects_the_fanout_cap() -> crate::Result<()> {
        let mut platform = TestPlatform::new();
        let admin = platform.add_participant("PENT-ADMIN", None);
        platform.place_in_tree(admin).execute()?;
        platform.participant_mut(admin).mark_first_purchase(0);

        // Five fill the root, the sixth and seventh spill to level 3 under
        // the earliest-purchasing level-2 members.
        let mut members = Vec::new();
        for index in 0..7u64 {
            let id = platform.add_participant(&format!("PENT-{index:04}"), Some("PENT-ADMIN"));
            platform.place_in_tree(id).execute()?;
            platform
                .participant_mut(id)
                .mark_first_purchase(100 + index as i64);
            members.push(id);
        }

        let admin_children = platform.expect(admin)?.tree_children().to_vec();
        assert_eq!(admin_children, &members[..MAX_TREE_CHILDREN]);

        let sixth = platform.expect(members[5])?;
        assert_eq!(sixth.tree_level(), 3);
        assert_eq!(sixth.tree_parent(), Some(members[0]));
        assert_eq!(sixth.tree_position(), 0);

        let seventh = platform.expect(members[6])?;
        assert_eq!(seventh.tree_level(), 3);
        assert_eq!(seventh.tree_parent(), Some(members[0]));
        assert_eq!(seventh.tree_position(), 1);

        // Level consistency across the whole arena.
        for id in platform.participant_ids() {
            let p = platform.expect(id)?;
            assert!(p.tree_children().len() <= MAX_TREE_CHILDREN);
            if let Some(parent) = p.tree_parent() {
                assert_eq!(p.tree_level(), platform.expect(parent)?.tree_level() + 1);
            }
        }
        Ok(())
    }

    #[test]
    fn slots_are_assigned_by_purchase_time_not_registration_time() -> crate::Result<()> {
        let mut platform = TestPlatform::new();
        let admin = platform.add_participant("PENT-ADMIN", None);
        platform.place_in_tree(admin).execute()?;
        platform.participant_mut(admin).mark_first_purchase(0);

        // `a` registers before `b`, but `b` purchases first.
        let a = platform.add_participant("PENT-A", Some("PENT-ADMIN"));
        let b = platform.add_participant("PENT-B", Some("PENT-ADMIN"));
        platform.place_in_tree(b).execute()?;
        platform.participant_mut(b).mark_first_purchase(100);
        platform.place_in_tree(a).execute()?;
        platform.participant_mut(a).mark_first_purchase(200);

        let b = platform.expect(b)?;
        let a = platform.expect(a)?;
        assert_eq!(b.tree_position(), 0);
        assert_eq!(a.tree_position(), 1);
        assert!(b.tree_position() < a.tree_position());
        Ok(())
    }

    #[test]
    fn deep_seed_chains_hit_the_depth_bound() -> crate::Result<()> {
        let mut platform = TestPlatform::new();
        // Fabricate a parent chain deeper than the bound.
        let mut parent: Option<ParticipantId> = None;
        for index in 0..(MAX_PLACEMENT_DEPTH + 2) {
            let participant = Participant::builder()
                .id(ParticipantId::new(1000 + u64::from(index)))
                .referral_code(format!("PENT-CHAIN-{index}"))
                .tree_parent(parent)
                .tree_level(index + 1)
                .first_purchase_done(true)
                .first_purchase_at(Some(i64::from(index)))
                .build();
            parent = Some(platform.insert_participant(participant));
        }
        let newcomer = platform.add_participant("PENT-NEW", Some("PENT-CHAIN-21"));
        let result = platform.place_in_tree(newcomer).execute();
        assert!(matches!(result, Err(Error::PlacementDepthExceeded(_))));
        Ok(())
    }
}
