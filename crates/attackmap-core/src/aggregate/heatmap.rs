//! Hour-of-day attack heatmap (UTC).

use attackmap_types::HeatmapCell;

const HOURS: usize = 24;
const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_DAY: i64 = 86_400_000;

/// Attack counts per UTC hour of day, with intensities kept current.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    attacks: [u64; HOURS],
    intensity: [f64; HOURS],
}

impl Default for Heatmap {
    fn default() -> Self {
        Self {
            attacks: [0; HOURS],
            intensity: [0.0; HOURS],
        }
    }
}

impl Heatmap {
    /// Count one event and recompute every slot's intensity.
    pub fn record(&mut self, ts_ms: i64) {
        if let Some(slot) = self.attacks.get_mut(hour_of_day(ts_ms)) {
            *slot = slot.saturating_add(1);
        }
        self.recompute();
    }

    /// The 24 slots, midnight first.
    pub fn cells(&self) -> Vec<HeatmapCell> {
        self.attacks
            .iter()
            .zip(self.intensity.iter())
            .zip(0_u8..)
            .map(|((&attacks, &intensity), hour)| HeatmapCell {
                hour,
                attacks,
                intensity,
            })
            .collect()
    }

    /// `attacks / max(attacks, 1) * 100` for every slot.
    fn recompute(&mut self) {
        let max = self.attacks.iter().copied().max().unwrap_or(0).max(1);
        let max = as_f64(max);
        for (intensity, &attacks) in self.intensity.iter_mut().zip(self.attacks.iter()) {
            *intensity = as_f64(attacks) / max * 100.0;
        }
    }
}

/// UTC hour of day for an epoch-ms timestamp.
fn hour_of_day(ts_ms: i64) -> usize {
    let hour = ts_ms
        .rem_euclid(MS_PER_DAY)
        .checked_div(MS_PER_HOUR)
        .unwrap_or(0);
    usize::try_from(hour).unwrap_or(0)
}

fn as_f64(n: u64) -> f64 {
    f64::from(u32::try_from(n).unwrap_or(u32::MAX))
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::float_cmp, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    /// 2024-01-01T00:00:00Z.
    const MIDNIGHT: i64 = 1_704_067_200_000;

    #[test]
    fn empty_heatmap_has_zero_intensity() {
        let cells = Heatmap::default().cells();
        assert_eq!(cells.len(), 24);
        assert!(cells.iter().all(|c| c.attacks == 0 && c.intensity == 0.0));
    }

    #[test]
    fn intensity_is_relative_to_busiest_hour() {
        let mut heatmap = Heatmap::default();
        for _ in 0..4 {
            heatmap.record(MIDNIGHT + 13 * MS_PER_HOUR + 5);
        }
        heatmap.record(MIDNIGHT + 2 * MS_PER_HOUR);

        let cells = heatmap.cells();
        assert_eq!(cells[13].attacks, 4);
        assert_eq!(cells[13].intensity, 100.0);
        assert_eq!(cells[2].intensity, 25.0);
        assert_eq!(cells[0].intensity, 0.0);
        assert_eq!(cells[23].hour, 23);
    }

    #[test]
    fn hours_wrap_across_days() {
        assert_eq!(hour_of_day(MIDNIGHT - 1), 23);
        assert_eq!(hour_of_day(MIDNIGHT + MS_PER_DAY + MS_PER_HOUR), 1);
    }
}
