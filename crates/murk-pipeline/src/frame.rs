//! Cross-frame counters owned by the orchestrator.

use glam::Mat4;
use murk_config::TemporalFilter;

/// Counters and history that survive from one frame to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    /// Drives ping-pong parity. Starts at 0 and never returns to 0.
    pub frame: u32,
    /// Jitter phase, always below the temporal filter's period.
    pub taa_frame: u32,
    /// Camera view-projection of the last rendered frame.
    pub previous_view_projection: Option<Mat4>,
    /// Accumulated wind scroll of the cloud noise.
    pub wind_offset: [f32; 3],
}

impl Default for FrameState {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameState {
    pub fn new() -> Self {
        Self {
            frame: 0,
            taa_frame: 0,
            previous_view_projection: None,
            wind_offset: [0.0; 3],
        }
    }

    /// Step to the next frame. `u32::MAX` wraps to 1, so 0 only ever means
    /// "never rendered".
    pub fn advance(&mut self, temporal: TemporalFilter, view_projection: Mat4) {
        self.frame = if self.frame == u32::MAX {
            1
        } else {
            self.frame + 1
        };
        self.taa_frame = (self.taa_frame + 1) % temporal.period();
        self.previous_view_projection = Some(view_projection);
    }

    /// Fraction of a slice the sun radiance is jittered by this frame, in
    /// \[-0.5, 0.5).
    pub fn jitter(&self, temporal: TemporalFilter) -> f32 {
        let period = temporal.period();
        (self.taa_frame % period) as f32 / period as f32 - 0.5
    }

    /// History reprojection is only meaningful once a frame was rendered.
    pub fn has_history(&self) -> bool {
        self.previous_view_projection.is_some()
    }

    pub fn accumulate_wind(&mut self, velocity: [f32; 3], dt: f32) {
        for (offset, v) in self.wind_offset.iter_mut().zip(velocity) {
            *offset += v * dt;
        }
    }

    /// Forget history, e.g. after the volumes were reallocated.
    pub fn reset_history(&mut self) {
        self.previous_view_projection = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wraps_to_one() {
        let mut state = FrameState::new();
        state.frame = u32::MAX;
        state.advance(TemporalFilter::Weak, Mat4::IDENTITY);
        assert_eq!(state.frame, 1);
    }

    #[test]
    fn test_taa_cycles_with_period() {
        for temporal in [
            TemporalFilter::Weak,
            TemporalFilter::Average,
            TemporalFilter::Strong,
            TemporalFilter::Extreme,
        ] {
            let period = 2 + 2 * temporal.strength();
            let mut state = FrameState::new();
            let mut seen = Vec::new();
            for _ in 0..period * 3 {
                state.advance(temporal, Mat4::IDENTITY);
                assert!(state.taa_frame < period, "taa exceeded period {period}");
                seen.push(state.taa_frame);
            }
            assert_eq!(seen[0], seen[period as usize], "period of {temporal:?}");
            assert_eq!(seen[1], seen[1 + period as usize]);
        }
    }

    #[test]
    fn test_jitter_stays_within_half_slice() {
        let mut state = FrameState::new();
        for _ in 0..20 {
            let j = state.jitter(TemporalFilter::Extreme);
            assert!((-0.5..0.5).contains(&j), "jitter {j}");
            state.advance(TemporalFilter::Extreme, Mat4::IDENTITY);
        }
    }

    #[test]
    fn test_advance_records_history() {
        let mut state = FrameState::new();
        assert!(!state.has_history());
        let vp = Mat4::from_scale(glam::Vec3::splat(2.0));
        state.advance(TemporalFilter::Average, vp);
        assert_eq!(state.previous_view_projection, Some(vp));
        state.reset_history();
        assert!(!state.has_history());
    }

    #[test]
    fn test_wind_accumulates() {
        let mut state = FrameState::new();
        state.accumulate_wind([1.0, 0.0, -2.0], 0.5);
        state.accumulate_wind([1.0, 0.0, -2.0], 0.5);
        assert_eq!(state.wind_offset, [1.0, 0.0, -2.0]);
    }
}
