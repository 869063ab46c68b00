// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Tweened interpolation.
//!
//! [`Easing`] is the Penner equation catalog, looked up by snake-case
//! name from the channel command surface; unknown names fall back to
//! linear. [`Tweened`] holds one animated value and advances it by whole
//! ticks.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
    InQuart,
    OutQuart,
    InOutQuart,
    InQuint,
    OutQuint,
    InOutQuint,
    InSine,
    OutSine,
    InOutSine,
    InExpo,
    OutExpo,
    InOutExpo,
    InCirc,
    OutCirc,
    InOutCirc,
    InBack,
    OutBack,
    InOutBack,
    InElastic,
    OutElastic,
    InOutElastic,
    InBounce,
    OutBounce,
    InOutBounce,
}

fn out_bounce(p: f64) -> f64 {
    if p < 1.0 / 2.75 {
        7.5625 * p * p
    } else if p < 2.0 / 2.75 {
        let p = p - 1.5 / 2.75;
        7.5625 * p * p + 0.75
    } else if p < 2.5 / 2.75 {
        let p = p - 2.25 / 2.75;
        7.5625 * p * p + 0.9375
    } else {
        let p = p - 2.625 / 2.75;
        7.5625 * p * p + 0.984375
    }
}

fn in_elastic(p: f64) -> f64 {
    if p == 0.0 || p == 1.0 {
        return p;
    }
    let s = 0.3 / 4.0;
    -(2.0_f64.powf(10.0 * (p - 1.0)) * ((p - 1.0 - s) * (2.0 * PI) / 0.3).sin())
}

const BACK_S: f64 = 1.70158;

impl Easing {
    /// Eased interpolation factor for progress `p` in [0,1]. Clamped at
    /// the ends; bounce/elastic/back overshoot in between by design of
    /// the equations.
    pub fn apply(self, p: f64) -> f64 {
        let p = p.clamp(0.0, 1.0);
        match self {
            Easing::Linear => p,
            Easing::InQuad => p * p,
            Easing::OutQuad => p * (2.0 - p),
            Easing::InOutQuad => in_out(p, |p| p * p, |p| p * (2.0 - p)),
            Easing::InCubic => p.powi(3),
            Easing::OutCubic => 1.0 + (p - 1.0).powi(3),
            Easing::InOutCubic => in_out(p, |p| p.powi(3), |p| 1.0 + (p - 1.0).powi(3)),
            Easing::InQuart => p.powi(4),
            Easing::OutQuart => 1.0 - (p - 1.0).powi(4),
            Easing::InOutQuart => in_out(p, |p| p.powi(4), |p| 1.0 - (p - 1.0).powi(4)),
            Easing::InQuint => p.powi(5),
            Easing::OutQuint => 1.0 + (p - 1.0).powi(5),
            Easing::InOutQuint => in_out(p, |p| p.powi(5), |p| 1.0 + (p - 1.0).powi(5)),
            Easing::InSine => 1.0 - (p * PI / 2.0).cos(),
            Easing::OutSine => (p * PI / 2.0).sin(),
            Easing::InOutSine => 0.5 * (1.0 - (p * PI).cos()),
            Easing::InExpo => {
                if p == 0.0 {
                    0.0
                } else {
                    2.0_f64.powf(10.0 * (p - 1.0))
                }
            }
            Easing::OutExpo => {
                if p == 1.0 {
                    1.0
                } else {
                    1.0 - 2.0_f64.powf(-10.0 * p)
                }
            }
            Easing::InOutExpo => in_out(
                p,
                |p| if p == 0.0 { 0.0 } else { 2.0_f64.powf(10.0 * (p - 1.0)) },
                |p| if p == 1.0 { 1.0 } else { 1.0 - 2.0_f64.powf(-10.0 * p) },
            ),
            Easing::InCirc => 1.0 - (1.0 - p * p).sqrt(),
            Easing::OutCirc => (1.0 - (p - 1.0).powi(2)).sqrt(),
            Easing::InOutCirc => in_out(
                p,
                |p| 1.0 - (1.0 - p * p).sqrt(),
                |p| (1.0 - (p - 1.0).powi(2)).sqrt(),
            ),
            Easing::InBack => p * p * ((BACK_S + 1.0) * p - BACK_S),
            Easing::OutBack => {
                let p = p - 1.0;
                p * p * ((BACK_S + 1.0) * p + BACK_S) + 1.0
            }
            Easing::InOutBack => in_out(
                p,
                |p| p * p * ((BACK_S + 1.0) * p - BACK_S),
                |p| {
                    let p = p - 1.0;
                    p * p * ((BACK_S + 1.0) * p + BACK_S) + 1.0
                },
            ),
            Easing::InElastic => in_elastic(p),
            Easing::OutElastic => 1.0 - in_elastic(1.0 - p),
            Easing::InOutElastic => {
                in_out(p, in_elastic, |p| 1.0 - in_elastic(1.0 - p))
            }
            Easing::InBounce => 1.0 - out_bounce(1.0 - p),
            Easing::OutBounce => out_bounce(p),
            Easing::InOutBounce => {
                in_out(p, |p| 1.0 - out_bounce(1.0 - p), out_bounce)
            }
        }
    }

    /// Look up an easing by its snake-case name (`"ease_in_quad"`,
    /// `"ease_out_bounce"`, ...). Case-insensitive; unknown names fall
    /// back to linear.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Easing::Linear,
            "ease_in_quad" => Easing::InQuad,
            "ease_out_quad" => Easing::OutQuad,
            "ease_in_out_quad" => Easing::InOutQuad,
            "ease_in_cubic" => Easing::InCubic,
            "ease_out_cubic" => Easing::OutCubic,
            "ease_in_out_cubic" => Easing::InOutCubic,
            "ease_in_quart" => Easing::InQuart,
            "ease_out_quart" => Easing::OutQuart,
            "ease_in_out_quart" => Easing::InOutQuart,
            "ease_in_quint" => Easing::InQuint,
            "ease_out_quint" => Easing::OutQuint,
            "ease_in_out_quint" => Easing::InOutQuint,
            "ease_in_sine" => Easing::InSine,
            "ease_out_sine" => Easing::OutSine,
            "ease_in_out_sine" => Easing::InOutSine,
            "ease_in_expo" => Easing::InExpo,
            "ease_out_expo" => Easing::OutExpo,
            "ease_in_out_expo" => Easing::InOutExpo,
            "ease_in_circ" => Easing::InCirc,
            "ease_out_circ" => Easing::OutCirc,
            "ease_in_out_circ" => Easing::InOutCirc,
            "ease_in_back" => Easing::InBack,
            "ease_out_back" => Easing::OutBack,
            "ease_in_out_back" => Easing::InOutBack,
            "ease_in_elastic" => Easing::InElastic,
            "ease_out_elastic" => Easing::OutElastic,
            "ease_in_out_elastic" => Easing::InOutElastic,
            "ease_in_bounce" => Easing::InBounce,
            "ease_out_bounce" => Easing::OutBounce,
            "ease_in_out_bounce" => Easing::InOutBounce,
            _ => Easing::Linear,
        }
    }
}

fn in_out(p: f64, f_in: impl Fn(f64) -> f64, f_out: impl Fn(f64) -> f64) -> f64 {
    if p < 0.5 {
        f_in(p * 2.0) / 2.0
    } else {
        0.5 + f_out(p * 2.0 - 1.0) / 2.0
    }
}

/// A value animated from `source` to `dest` over a whole number of
/// ticks.
#[derive(Debug, Clone)]
pub struct Tweened<T> {
    source: T,
    dest: T,
    duration: u32,
    elapsed: u32,
    easing: Easing,
}

/// Interpolation hook for tweenable values.
pub trait Tween: Sized {
    fn tween(time: f64, source: &Self, dest: &Self, duration: f64, easing: Easing) -> Self;
}

impl Tween for crate::transform::FrameTransform {
    fn tween(time: f64, source: &Self, dest: &Self, duration: f64, easing: Easing) -> Self {
        crate::transform::FrameTransform::tween(time, source, dest, duration, easing)
    }
}

impl Tween for f64 {
    fn tween(time: f64, source: &Self, dest: &Self, duration: f64, easing: Easing) -> Self {
        let a = if duration == 0.0 {
            1.0
        } else {
            easing.apply(time / duration)
        };
        source + (dest - source) * a
    }
}

impl<T: Tween + Clone + Default> Default for Tweened<T> {
    fn default() -> Self {
        Self::new(T::default(), T::default(), 0, Easing::Linear)
    }
}

impl<T: Tween + Clone> Tweened<T> {
    pub fn new(source: T, dest: T, duration: u32, easing: Easing) -> Self {
        Self {
            source,
            dest,
            duration,
            elapsed: 0,
            easing,
        }
    }

    /// Current value without advancing time.
    pub fn fetch(&self) -> T {
        if self.elapsed == self.duration {
            self.dest.clone()
        } else {
            T::tween(
                self.elapsed as f64,
                &self.source,
                &self.dest,
                self.duration as f64,
                self.easing,
            )
        }
    }

    /// Advance by `ticks` (clamped to the duration) and return the new
    /// value.
    pub fn fetch_and_tick(&mut self, ticks: u32) -> T {
        self.elapsed = (self.elapsed + ticks).min(self.duration);
        self.fetch()
    }

    /// Whether the tween has reached its destination.
    pub fn done(&self) -> bool {
        self.elapsed == self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_progression() {
        let mut t = Tweened::new(0.0f64, 10.0, 10, Easing::Linear);
        assert_eq!(t.fetch(), 0.0);
        assert_eq!(t.fetch_and_tick(1), 1.0);
        assert_eq!(t.fetch_and_tick(4), 5.0);
        assert_eq!(t.fetch_and_tick(100), 10.0);
        assert!(t.done());
    }

    #[test]
    fn test_zero_duration_is_dest() {
        let t = Tweened::new(3.0f64, 7.0, 0, Easing::Linear);
        assert_eq!(t.fetch(), 7.0);
        assert!(t.done());
    }

    #[test]
    fn test_easing_endpoints() {
        let all = [
            Easing::Linear,
            Easing::InQuad,
            Easing::OutQuad,
            Easing::InOutQuad,
            Easing::InCubic,
            Easing::OutCubic,
            Easing::InOutCubic,
            Easing::InQuart,
            Easing::OutQuart,
            Easing::InOutQuart,
            Easing::InQuint,
            Easing::OutQuint,
            Easing::InOutQuint,
            Easing::InSine,
            Easing::OutSine,
            Easing::InOutSine,
            Easing::InExpo,
            Easing::OutExpo,
            Easing::InOutExpo,
            Easing::InCirc,
            Easing::OutCirc,
            Easing::InOutCirc,
            Easing::InBack,
            Easing::OutBack,
            Easing::InOutBack,
            Easing::InElastic,
            Easing::OutElastic,
            Easing::InOutElastic,
            Easing::InBounce,
            Easing::OutBounce,
            Easing::InOutBounce,
        ];
        for e in all {
            assert!(e.apply(0.0).abs() < 1e-9, "{e:?} at 0");
            assert!((e.apply(1.0) - 1.0).abs() < 1e-9, "{e:?} at 1");
        }
    }

    #[test]
    fn test_out_bounce_shape() {
        // The first bounce segment is pure quadratic.
        let p = 0.2;
        assert!((Easing::OutBounce.apply(p) - 7.5625 * p * p).abs() < 1e-9);
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(Easing::from_name("linear"), Easing::Linear);
        assert_eq!(Easing::from_name("EASE_OUT_BOUNCE"), Easing::OutBounce);
        assert_eq!(Easing::from_name("ease_in_out_sine"), Easing::InOutSine);
        assert_eq!(Easing::from_name("no_such_easing"), Easing::Linear);
    }

    #[test]
    fn test_progress_clamped() {
        assert_eq!(Easing::InQuad.apply(-1.0), 0.0);
        assert_eq!(Easing::InQuad.apply(2.0), 1.0);
    }
}
