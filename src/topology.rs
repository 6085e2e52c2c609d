//! Pane topology for the DAQ session.
//!
//! The layout is data, not code: [`TopologySpec`] lists split and resize
//! instructions over numbered slots plus the slot each role ends up in, and
//! [`build_topology`] is the only thing that talks to the multiplexer. The
//! DAQ layout is [`DAQ_LAYOUT`]:
//!
//! ```text
//! ┌─────────────┬─────────────┐
//! │ P0          │ P1          │
//! │ Acquisition │ Acquisition │
//! │ A           │ B           │
//! ├─────────────┼─────────────┤
//! │ P2 MonitorA │ P3          │
//! ├─────────────┤ System      │
//! │ P4 MonitorB │ monitor     │
//! └─────────────┴─────────────┘
//! ```

use std::fmt;

use tracing::{debug, info};

use crate::error::{LaunchError, LaunchResult};
use crate::tmux::{CommandPolicy, Dimension, Multiplexer, Orientation, PaneHandle};

/// What a pane is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    AcquisitionA,
    AcquisitionB,
    MonitorA,
    MonitorB,
    SystemMonitor,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::AcquisitionA,
        Role::AcquisitionB,
        Role::MonitorA,
        Role::MonitorB,
        Role::SystemMonitor,
    ];

    fn index(self) -> usize {
        match self {
            Self::AcquisitionA => 0,
            Self::AcquisitionB => 1,
            Self::MonitorA => 2,
            Self::MonitorB => 3,
            Self::SystemMonitor => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AcquisitionA => "acquisition-a",
            Self::AcquisitionB => "acquisition-b",
            Self::MonitorA => "monitor-a",
            Self::MonitorB => "monitor-b",
            Self::SystemMonitor => "system-monitor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Index into the slot table built while executing a spec. Slot 0 is the
/// session's first pane.
pub type Slot = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Split the pane in `target`; the new pane fills slot `creates`.
    Split {
        target: Slot,
        orientation: Orientation,
        creates: Slot,
    },
    Resize {
        target: Slot,
        dimension: Dimension,
        percent: u8,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct TopologySpec {
    pub steps: &'static [Step],
    pub roles: &'static [(Role, Slot)],
}

pub const DAQ_LAYOUT: TopologySpec = TopologySpec {
    steps: &[
        Step::Split {
            target: 0,
            orientation: Orientation::Horizontal,
            creates: 1,
        },
        Step::Split {
            target: 0,
            orientation: Orientation::Vertical,
            creates: 2,
        },
        Step::Split {
            target: 1,
            orientation: Orientation::Vertical,
            creates: 3,
        },
        Step::Split {
            target: 2,
            orientation: Orientation::Vertical,
            creates: 4,
        },
        Step::Resize {
            target: 0,
            dimension: Dimension::Height,
            percent: 60,
        },
        Step::Resize {
            target: 1,
            dimension: Dimension::Height,
            percent: 60,
        },
    ],
    roles: &[
        (Role::AcquisitionA, 0),
        (Role::AcquisitionB, 1),
        (Role::MonitorA, 2),
        (Role::MonitorB, 4),
        (Role::SystemMonitor, 3),
    ],
};

impl TopologySpec {
    /// Check that every step refers to an already-filled slot, every slot is
    /// filled exactly once, and roles map one-to-one onto slots.
    pub fn validate(&self) -> LaunchResult<()> {
        let mut filled = vec![0usize];
        for (i, step) in self.steps.iter().enumerate() {
            let target = match *step {
                Step::Split { target, .. } | Step::Resize { target, .. } => target,
            };
            if !filled.contains(&target) {
                return Err(invalid(format!("step {i} targets unfilled slot {target}")));
            }
            match *step {
                Step::Split { creates, .. } => {
                    if filled.contains(&creates) {
                        return Err(invalid(format!("step {i} refills slot {creates}")));
                    }
                    filled.push(creates);
                }
                Step::Resize { percent, .. } => {
                    if percent == 0 || percent > 100 {
                        return Err(invalid(format!("step {i} resizes to {percent}%")));
                    }
                }
            }
        }

        let mut seen_roles = [false; 5];
        let mut seen_slots = Vec::new();
        for &(role, slot) in self.roles {
            if !filled.contains(&slot) {
                return Err(invalid(format!("{role} assigned to unfilled slot {slot}")));
            }
            if std::mem::replace(&mut seen_roles[role.index()], true) {
                return Err(invalid(format!("{role} assigned twice")));
            }
            if seen_slots.contains(&slot) {
                return Err(invalid(format!("slot {slot} holds two roles")));
            }
            seen_slots.push(slot);
        }
        if let Some(missing) = Role::ALL.iter().find(|r| !seen_roles[r.index()]) {
            return Err(invalid(format!("{missing} has no pane")));
        }
        Ok(())
    }
}

fn invalid(detail: String) -> LaunchError {
    LaunchError::InvalidConfig(format!("pane topology: {detail}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneNode {
    pub handle: PaneHandle,
    pub role: Role,
}

/// One pane per role, fixed by construction.
#[derive(Debug, Clone)]
pub struct Topology {
    panes: [PaneNode; 5],
}

impl Topology {
    pub fn pane(&self, role: Role) -> &PaneHandle {
        &self.panes[role.index()].handle
    }

    pub fn nodes(&self) -> &[PaneNode] {
        &self.panes
    }
}

/// Create `session` and realize `spec` in it.
///
/// Splits run strictly in spec order and each captures the new pane's handle
/// before the next step, since later splits target panes made by earlier
/// ones. Creating the session is always checked; split and resize failures
/// go through `policy`.
pub fn build_topology<M: Multiplexer + ?Sized>(
    mux: &M,
    session: &str,
    spec: &TopologySpec,
    policy: CommandPolicy,
) -> LaunchResult<Topology> {
    spec.validate()?;

    let root = mux.new_session(session)?;
    debug!(session, pane = %root, "root pane");
    let mut slots: Vec<Option<PaneHandle>> = vec![Some(root)];

    for step in spec.steps {
        match *step {
            Step::Split {
                target,
                orientation,
                creates,
            } => {
                let parent = slot_handle(&slots, target)?;
                let pane = policy.settle(mux.split_pane(&parent, orientation), PaneHandle::unresolved)?;
                debug!(parent = %parent, pane = %pane, ?orientation, slot = creates, "split");
                if slots.len() <= creates {
                    slots.resize(creates + 1, None);
                }
                slots[creates] = Some(pane);
            }
            Step::Resize {
                target,
                dimension,
                percent,
            } => {
                let pane = slot_handle(&slots, target)?;
                policy.settle(mux.resize_pane(&pane, dimension, percent), || ())?;
                debug!(pane = %pane, ?dimension, percent, "resize");
            }
        }
    }

    let mut assigned: [Option<PaneNode>; 5] = Default::default();
    for &(role, slot) in spec.roles {
        assigned[role.index()] = Some(PaneNode {
            handle: slot_handle(&slots, slot)?,
            role,
        });
    }
    let [a, b, c, d, e] = assigned;
    let panes = match (a, b, c, d, e) {
        (Some(a), Some(b), Some(c), Some(d), Some(e)) => [a, b, c, d, e],
        _ => return Err(invalid("not every role received a pane".to_string())),
    };

    info!(session, panes = panes.len(), "pane topology ready");
    Ok(Topology { panes })
}

fn slot_handle(slots: &[Option<PaneHandle>], slot: Slot) -> LaunchResult<PaneHandle> {
    slots
        .get(slot)
        .and_then(|s| s.clone())
        .ok_or_else(|| invalid(format!("slot {slot} used before it was created")))
}
