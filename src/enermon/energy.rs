use std::time::Duration;

use chrono::{Datelike, NaiveDate};

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyWindowKind {
    Daily,
    Weekly,
    Monthly,
}

impl EnergyWindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyWindowKind::Daily => "daily",
            EnergyWindowKind::Weekly => "weekly",
            EnergyWindowKind::Monthly => "monthly",
        }
    }

    /*
    * @brief Check if two local dates fall into the same window.
    * @param a First date
    * @param b Second date
    * @return true when both dates belong to the same day, ISO week or month
    */
    pub fn same_window(&self, a: NaiveDate, b: NaiveDate) -> bool {
        match self {
            EnergyWindowKind::Daily => a == b,
            EnergyWindowKind::Weekly => a.iso_week() == b.iso_week(),
            EnergyWindowKind::Monthly => a.year() == b.year() && a.month() == b.month(),
        }
    }
}

/// Energy integrated over one calendar window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyWindow {
    pub imported_wh: f64,            // Published value, never decreases inside the window
    pub exported_wh: f64,            // Energy of negative power samples
    pub anchor: Option<NaiveDate>,   // Local date the window was opened on
    pub last_closed_wh: Option<f64>, // Imported energy of the previous window
}

impl EnergyWindow {
    fn add(&mut self, energy_wh: f64) {
        if energy_wh >= 0.0 {
            self.imported_wh += energy_wh;
        } else {
            self.exported_wh -= energy_wh;
        }
    }

    /*
    * @brief Close the window when `today` is outside of it.
    * @param kind Window length
    * @param today Current local date
    * @return true when the window was closed and reset
    * @note The first known date only anchors the window.
    */
    fn roll_over(&mut self, kind: EnergyWindowKind, today: NaiveDate) -> bool {
        match self.anchor {
            None => {
                self.anchor = Some(today);
                false
            }
            Some(anchor) if !kind.same_window(anchor, today) => {
                self.last_closed_wh = Some(self.imported_wh);
                self.imported_wh = 0.0;
                self.exported_wh = 0.0;
                self.anchor = Some(today);
                true
            }
            Some(_) => false,
        }
    }
}

/// Daily, weekly and monthly totals of a channel, each rolling over on its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyAccumulator {
    pub daily: EnergyWindow,
    pub weekly: EnergyWindow,
    pub monthly: EnergyWindow,
}

/*
* @brief Convert power over an interval into energy.
* @param power_w Power in watts
* @param elapsed Integration interval
* @return Energy in watt-hours
*/
pub fn energy_wh(power_w: f64, elapsed: Duration) -> f64 {
    power_w * elapsed.as_secs_f64() / SECONDS_PER_HOUR
}

impl EnergyAccumulator {
    pub fn integrate(&mut self, power_w: f64, elapsed: Duration) {
        if !power_w.is_finite() {
            return;
        }
        let energy = energy_wh(power_w, elapsed);
        self.daily.add(energy);
        self.weekly.add(energy);
        self.monthly.add(energy);
    }

    pub fn window(&self, kind: EnergyWindowKind) -> &EnergyWindow {
        match kind {
            EnergyWindowKind::Daily => &self.daily,
            EnergyWindowKind::Weekly => &self.weekly,
            EnergyWindowKind::Monthly => &self.monthly,
        }
    }

    /// Resets every window whose boundary was crossed and returns which ones did.
    ///
    /// Callers publish the window values before calling this.
    pub fn roll_over(&mut self, today: NaiveDate) -> Vec<EnergyWindowKind> {
        let mut closed = Vec::new();
        if self.daily.roll_over(EnergyWindowKind::Daily, today) {
            closed.push(EnergyWindowKind::Daily);
        }
        if self.weekly.roll_over(EnergyWindowKind::Weekly, today) {
            closed.push(EnergyWindowKind::Weekly);
        }
        if self.monthly.roll_over(EnergyWindowKind::Monthly, today) {
            closed.push(EnergyWindowKind::Monthly);
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_constant_power_integrates_to_p_times_t() {
        let mut acc = EnergyAccumulator::default();
        let interval = Duration::from_millis(200);

        // 1 kW for one hour in 200 ms steps
        for _ in 0..18_000 {
            acc.integrate(1000.0, interval);
        }

        assert_relative_eq!(acc.daily.imported_wh, 1000.0, max_relative = 1e-9);
        assert_relative_eq!(acc.weekly.imported_wh, 1000.0, max_relative = 1e-9);
        assert_relative_eq!(acc.monthly.imported_wh, 1000.0, max_relative = 1e-9);
    }

    #[test]
    fn test_negative_power_goes_to_exported() {
        let mut acc = EnergyAccumulator::default();
        acc.integrate(360.0, Duration::from_secs(10));
        let before = acc.daily.imported_wh;
        acc.integrate(-720.0, Duration::from_secs(10));

        assert_relative_eq!(acc.daily.imported_wh, before);
        assert_relative_eq!(acc.daily.exported_wh, 2.0);
    }

    #[test]
    fn test_first_date_anchors_without_reset() {
        let mut acc = EnergyAccumulator::default();
        acc.integrate(100.0, Duration::from_secs(3600));

        assert!(acc.roll_over(date(2024, 1, 3)).is_empty());
        assert_relative_eq!(acc.daily.imported_wh, 100.0);
        assert_eq!(acc.daily.anchor, Some(date(2024, 1, 3)));
    }

    #[test]
    fn test_day_rollover_keeps_week_and_month() {
        let mut acc = EnergyAccumulator::default();
        acc.roll_over(date(2024, 1, 3)); // Wednesday
        acc.integrate(50.0, Duration::from_secs(3600));

        let closed = acc.roll_over(date(2024, 1, 4));
        assert_eq!(closed, vec![EnergyWindowKind::Daily]);
        assert_eq!(acc.daily.imported_wh, 0.0);
        assert_eq!(acc.daily.last_closed_wh, Some(50.0));
        assert_relative_eq!(acc.weekly.imported_wh, 50.0);
        assert_relative_eq!(acc.monthly.imported_wh, 50.0);
    }

    #[test]
    fn test_week_and_month_roll_independently() {
        let mut acc = EnergyAccumulator::default();
        acc.roll_over(date(2024, 1, 28)); // Sunday, ISO week 4
        acc.integrate(10.0, Duration::from_secs(3600));

        // Monday of ISO week 5, same month
        assert_eq!(
            acc.roll_over(date(2024, 1, 29)),
            vec![EnergyWindowKind::Daily, EnergyWindowKind::Weekly]
        );
        assert_relative_eq!(acc.monthly.imported_wh, 10.0);

        acc.integrate(5.0, Duration::from_secs(3600));
        // Thursday Feb 1st, still ISO week 5
        assert_eq!(
            acc.roll_over(date(2024, 2, 1)),
            vec![EnergyWindowKind::Daily, EnergyWindowKind::Monthly]
        );
        assert_relative_eq!(acc.weekly.imported_wh, 5.0);
        assert_eq!(acc.monthly.last_closed_wh, Some(15.0));
    }

    #[test]
    fn test_same_day_next_year_is_a_new_day() {
        assert!(!EnergyWindowKind::Daily.same_window(date(2023, 3, 1), date(2024, 3, 1)));
        assert!(!EnergyWindowKind::Monthly.same_window(date(2023, 3, 1), date(2024, 3, 15)));
        // ISO week 1 of 2025 starts on 2024-12-30
        assert!(EnergyWindowKind::Weekly.same_window(date(2024, 12, 30), date(2025, 1, 2)));
    }
}
