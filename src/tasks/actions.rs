use bitflags::*;

// Capability pipelines a unit can spend once per tick. Verbs that share a
// pipeline share a bit and are mutually exclusive; verbs in different
// pipelines can run in the same tick.
//
// Work:     harvest, attack, build, repair
// Logistic: withdraw, transfer, pickup
// Upgrade:  upgrade

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct SimultaneousActionFlags: u16 {
        const UNSET = 0;

        const MOVE = 1;

        const HARVEST = 1 << 1;
        const ATTACK  = 1 << 1;
        const BUILD   = 1 << 1;
        const REPAIR  = 1 << 1;

        const WITHDRAW = 1 << 2;
        const TRANSFER = 1 << 2;
        const PICKUP   = 1 << 2;

        const UPGRADE_CONTROLLER = 1 << 3;
    }
}

impl SimultaneousActionFlags {
    /// Marks `flags` as spent. Returns false, leaving the set unchanged, if
    /// any of them was already spent this tick.
    pub fn consume(&mut self, flags: SimultaneousActionFlags) -> bool {
        if !self.intersects(flags) {
            self.insert(flags);

            true
        } else {
            false
        }
    }

    /// Returns a spend that did not result in an action.
    pub fn refund(&mut self, flags: SimultaneousActionFlags) {
        self.remove(flags);
    }
}
