//! Debug statistics: visibility counts and texture memory.

use std::fmt;

/// Visible versus registered entity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub visible_lights: usize,
    pub total_lights: usize,
    pub visible_volumes: usize,
    pub total_volumes: usize,
}

impl fmt::Display for SceneStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lights {}/{}, volumes {}/{}",
            self.visible_lights, self.total_lights, self.visible_volumes, self.total_volumes
        )
    }
}

/// Per-texture GPU memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureMemoryStats {
    pub entries: Vec<(&'static str, u64)>,
}

impl TextureMemoryStats {
    pub fn push(&mut self, label: &'static str, bytes: u64) {
        self.entries.push((label, bytes));
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|(_, b)| b).sum()
    }

    pub fn total_megabytes(&self) -> f64 {
        bytes_to_megabytes(self.total_bytes())
    }
}

impl fmt::Display for TextureMemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, bytes) in &self.entries {
            writeln!(f, "{label}: {:.2} MB", bytes_to_megabytes(*bytes))?;
        }
        write!(f, "total: {:.2} MB", self.total_megabytes())
    }
}

pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let mut stats = TextureMemoryStats::default();
        stats.push("a", 1024 * 1024);
        stats.push("b", 3 * 1024 * 1024);
        assert_eq!(stats.total_bytes(), 4 * 1024 * 1024);
        assert!((stats.total_megabytes() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_display_lists_every_entry() {
        let mut stats = TextureMemoryStats::default();
        stats.push("fog-pm-volume", 2 * 1024 * 1024);
        let text = stats.to_string();
        assert!(text.contains("fog-pm-volume: 2.00 MB"));
        assert!(text.ends_with("total: 2.00 MB"));
    }

    #[test]
    fn test_scene_stats_display() {
        let stats = SceneStats {
            visible_lights: 2,
            total_lights: 5,
            visible_volumes: 0,
            total_volumes: 1,
        };
        assert_eq!(stats.to_string(), "lights 2/5, volumes 0/1");
    }
}
