//! The per-frame pass schedule as plain data.
//!
//! [`plan_frame`] decides every read and write target from the frame
//! counter and the visible shadowed-light count alone. `FogPipeline::render`
//! walks the returned plan, so ordering and aliasing can be checked without
//! a GPU.

use murk_render::PingPong;

/// A medium/radiance volume pair addressed by the injection chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeTarget {
    /// A slot of the persistent PMVolume / PMRadiance pairs.
    History(usize),
    /// A slot of the scratch pairs used between chained dispatches.
    Scratch(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionKind {
    /// Height fog, volumes, clouds and non-shadowed lights.
    Primary,
    /// One shadow-casting spot light, by index into the visible list.
    ShadowedSpot(usize),
}

/// One medium injection dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionStep {
    pub kind: InjectionKind,
    /// Accumulated result of the previous dispatch; `None` for the primary.
    pub read: Option<VolumeTarget>,
    pub write: VolumeTarget,
    /// Last frame's result, sampled when reprojecting.
    pub history: usize,
    /// Blend with `history`. Only the final dispatch of the chain does.
    pub reproject: bool,
}

/// A pass of the frame in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStep {
    RebuildBuffers,
    CascadeMatrices,
    /// `filtered` is false when log blur is off or there is no sun shadow.
    ConditionShadow { filtered: bool },
    SunRadiance,
    Injection(InjectionStep),
    /// Writes this slot of the shading pair.
    Inscatter { write: usize },
    /// `None` when spatial filtering is disabled.
    SpatialFilter { roles: Option<(usize, usize)> },
    /// Reads this slot of the shading pair.
    Compose { read: usize },
    AdvanceCounters,
}

/// Inputs that shape a frame's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanInputs {
    pub frame: u32,
    pub shadowed_spots: usize,
    pub shadow_filtered: bool,
    pub spatial_filter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    pub steps: Vec<PassStep>,
}

impl FramePlan {
    pub fn injections(&self) -> impl Iterator<Item = &InjectionStep> {
        self.steps.iter().filter_map(|step| match step {
            PassStep::Injection(injection) => Some(injection),
            _ => None,
        })
    }

    /// Shading slot the compose pass samples.
    pub fn compose_slot(&self) -> Option<usize> {
        self.steps.iter().find_map(|step| match step {
            PassStep::Compose { read } => Some(*read),
            _ => None,
        })
    }
}

/// Build the schedule for one frame.
///
/// With `N` visible shadowed spots the chain has `N + 1` dispatches writing
/// `T0..=TN`: `TN` is the current history slot and `Ti` for `i < N` is
/// scratch slot `i % 2`. Dispatch `i > 0` reads `T(i-1)`, so no dispatch
/// ever reads its own target.
pub fn plan_frame(inputs: PlanInputs) -> FramePlan {
    let current = PingPong::<()>::current_index(inputs.frame);
    let previous = PingPong::<()>::previous_index(inputs.frame);
    let n = inputs.shadowed_spots;

    let target = |i: usize| {
        if i == n {
            VolumeTarget::History(current)
        } else {
            VolumeTarget::Scratch(i % 2)
        }
    };

    let mut steps = vec![
        PassStep::RebuildBuffers,
        PassStep::CascadeMatrices,
        PassStep::ConditionShadow {
            filtered: inputs.shadow_filtered,
        },
        PassStep::SunRadiance,
    ];

    steps.push(PassStep::Injection(InjectionStep {
        kind: InjectionKind::Primary,
        read: None,
        write: target(0),
        history: previous,
        reproject: n == 0,
    }));
    for i in 1..=n {
        steps.push(PassStep::Injection(InjectionStep {
            kind: InjectionKind::ShadowedSpot(i - 1),
            read: Some(target(i - 1)),
            write: target(i),
            history: previous,
            reproject: i == n,
        }));
    }

    steps.push(PassStep::Inscatter { write: current });
    let roles = inputs
        .spatial_filter
        .then(|| murk_filter::filter_roles(inputs.frame));
    steps.push(PassStep::SpatialFilter { roles });
    steps.push(PassStep::Compose {
        read: roles.map_or(current, |(_, destination)| destination),
    });
    steps.push(PassStep::AdvanceCounters);

    FramePlan { steps }
}
