//! Typing-rate model: base inter-keystroke delay and per-call speed.

use std::time::Duration;

use crate::error::TimingError;

/// Rate sentinel meaning "no delay at all".
pub const INSTANT_RATE: f64 = f64::INFINITY;

const DEFAULT_CPS: f64 = 10.0;

/// Per-call speed multiplier. The base delay is divided by it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speed(f64);

impl Speed {
    pub const SLOW: Speed = Speed(0.25);
    pub const NORMAL: Speed = Speed(1.0);
    pub const FAST: Speed = Speed(4.0);
    pub const INSTANT: Speed = Speed(f64::INFINITY);

    pub fn new(multiplier: f64) -> Result<Self, TimingError> {
        if multiplier.is_nan() || multiplier <= 0.0 {
            return Err(TimingError::InvalidArgument {
                name: "speed",
                value: multiplier,
            });
        }
        Ok(Self(multiplier))
    }

    pub fn multiplier(self) -> f64 {
        self.0
    }

    pub fn is_instant(self) -> bool {
        self.0.is_infinite()
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Base delay between keystrokes, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    delay_ms: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            delay_ms: 1000.0 / DEFAULT_CPS,
        }
    }
}

impl Timing {
    pub fn from_cps(cps: f64) -> Result<Self, TimingError> {
        let mut timing = Self::default();
        timing.set_cps(cps)?;
        Ok(timing)
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    /// Characters per second; infinite when there is no delay.
    pub fn cps(&self) -> f64 {
        if self.delay_ms == 0.0 {
            INSTANT_RATE
        } else {
            1000.0 / self.delay_ms
        }
    }

    /// Characters per minute; infinite when there is no delay.
    pub fn cpm(&self) -> f64 {
        if self.delay_ms == 0.0 {
            INSTANT_RATE
        } else {
            60_000.0 / self.delay_ms
        }
    }

    pub fn set_cps(&mut self, cps: f64) -> Result<(), TimingError> {
        self.delay_ms = rate_to_delay("cps", cps, 1000.0)?;
        Ok(())
    }

    pub fn set_cpm(&mut self, cpm: f64) -> Result<(), TimingError> {
        self.delay_ms = rate_to_delay("cpm", cpm, 60_000.0)?;
        Ok(())
    }

    pub fn set_delay_ms(&mut self, delay_ms: f64) -> Result<(), TimingError> {
        if !delay_ms.is_finite() || delay_ms < 0.0 || !representable(delay_ms) {
            return Err(TimingError::InvalidArgument {
                name: "delay",
                value: delay_ms,
            });
        }
        self.delay_ms = delay_ms;
        Ok(())
    }

    /// Delay applied between two keystrokes of a batch typed at `speed`.
    pub fn effective_delay(&self, speed: Option<Speed>) -> Duration {
        let speed = speed.unwrap_or_default();
        if self.delay_ms == 0.0 || speed.is_instant() {
            return Duration::ZERO;
        }
        // A tiny speed multiplier can still push a valid delay past `Duration`.
        Duration::try_from_secs_f64(self.delay_ms / speed.multiplier() / 1000.0)
            .unwrap_or(Duration::MAX)
    }
}

fn rate_to_delay(name: &'static str, rate: f64, per: f64) -> Result<f64, TimingError> {
    if rate.is_nan() || rate <= 0.0 {
        return Err(TimingError::InvalidArgument { name, value: rate });
    }
    if rate.is_infinite() {
        return Ok(0.0);
    }
    let delay_ms = per / rate;
    if !representable(delay_ms) {
        return Err(TimingError::InvalidArgument { name, value: rate });
    }
    Ok(delay_ms)
}

fn representable(delay_ms: f64) -> bool {
    Duration::try_from_secs_f64(delay_ms / 1000.0).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_ten_cps() {
        let t = Timing::default();
        assert_eq!(t.delay_ms(), 100.0);
        assert_eq!(t.effective_delay(None), Duration::from_millis(100));
    }

    #[test]
    fn cps_and_cpm_at_normal_speed() {
        for rate in [1.0, 3.0, 16.0, 250.0] {
            let mut t = Timing::default();
            t.set_cps(rate).unwrap();
            let delay = t.effective_delay(Some(Speed::NORMAL)).as_secs_f64();
            assert!((delay - 1.0 / rate).abs() < 1e-6, "cps {rate}: {delay}");

            t.set_cpm(rate).unwrap();
            let delay = t.effective_delay(Some(Speed::NORMAL)).as_secs_f64();
            assert!((delay - 60.0 / rate).abs() < 1e-6, "cpm {rate}: {delay}");
        }
    }

    #[test]
    fn instant_rate_is_zero_regardless_of_speed() {
        let mut t = Timing::default();
        t.set_cps(INSTANT_RATE).unwrap();
        assert_eq!(t.delay_ms(), 0.0);
        assert_eq!(t.cps(), f64::INFINITY);
        assert_eq!(t.cpm(), f64::INFINITY);
        for speed in [Speed::SLOW, Speed::NORMAL, Speed::FAST, Speed::INSTANT] {
            assert_eq!(t.effective_delay(Some(speed)), Duration::ZERO);
        }
    }

    #[test]
    fn instant_speed_is_zero_regardless_of_rate() {
        for cps in [0.5, 10.0, 1000.0] {
            let t = Timing::from_cps(cps).unwrap();
            assert_eq!(t.effective_delay(Some(Speed::INSTANT)), Duration::ZERO);
        }
    }

    #[test]
    fn speed_divides_delay() {
        let t = Timing::from_cps(10.0).unwrap();
        assert_eq!(t.effective_delay(Some(Speed::FAST)), Duration::from_millis(25));
        assert_eq!(t.effective_delay(Some(Speed::SLOW)), Duration::from_millis(400));
    }

    #[test]
    fn explicit_delay() {
        let mut t = Timing::default();
        t.set_delay_ms(5.0).unwrap();
        assert_eq!(t.cps(), 200.0);
        t.set_delay_ms(0.0).unwrap();
        assert_eq!(t.effective_delay(None), Duration::ZERO);
    }

    #[test]
    fn invalid_values_rejected_without_change() {
        let mut t = Timing::from_cps(4.0).unwrap();
        assert!(t.set_cps(f64::NAN).is_err());
        assert!(t.set_cps(-1.0).is_err());
        assert!(t.set_cps(0.0).is_err());
        assert!(t.set_cpm(-3.0).is_err());
        assert!(t.set_delay_ms(-0.5).is_err());
        assert!(t.set_delay_ms(f64::INFINITY).is_err());
        assert!(matches!(
            t.set_delay_ms(f64::NAN),
            Err(TimingError::InvalidArgument { name: "delay", .. })
        ));
        assert_eq!(t.delay_ms(), 250.0);
    }

    #[test]
    fn speed_rejects_non_positive() {
        assert!(Speed::new(0.0).is_err());
        assert!(Speed::new(-2.0).is_err());
        assert!(Speed::new(f64::NAN).is_err());
        assert_eq!(Speed::new(2.0).unwrap().multiplier(), 2.0);
    }

    #[test]
    fn unrepresentable_rates_rejected() {
        let mut t = Timing::default();
        assert!(matches!(
            t.set_cps(1e-300),
            Err(TimingError::InvalidArgument { name: "cps", .. })
        ));
        assert!(matches!(
            t.set_cpm(1e-300),
            Err(TimingError::InvalidArgument { name: "cpm", .. })
        ));
        assert!(matches!(
            t.set_delay_ms(1e25),
            Err(TimingError::InvalidArgument { name: "delay", .. })
        ));
        assert!(Timing::from_cps(1e-300).is_err());
        assert_eq!(t.delay_ms(), 100.0);
    }

    #[test]
    fn tiny_speed_saturates_instead_of_panicking() {
        let t = Timing::default();
        let speed = Speed::new(1e-30).unwrap();
        assert_eq!(t.effective_delay(Some(speed)), Duration::MAX);
    }
}
