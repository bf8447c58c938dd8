use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use cgmath::Vector2;

use crate::config::BezierSolverConfig;

/// Easing curve through `(0, 0)`, `c0`, `c1`, `(1, 1)`. Control points come as bytes and are
/// scaled by `1 / 127`.
#[derive(Debug, Clone, PartialEq)]
pub struct BezierCurve {
    c0: Vector2<u8>,
    c1: Vector2<u8>,
    p1: Vector2<f32>,
    p2: Vector2<f32>,
    epsilon: f32,
    max_iterations: u32,
}

impl BezierCurve {
    const SCALE: f32 = 127f32;

    pub fn create(c0: Vector2<u8>, c1: Vector2<u8>, config: &BezierSolverConfig) -> Self {
        Self {
            c0,
            c1,
            p1: c0.map(|v| (v as f32 / Self::SCALE).min(1f32)),
            p2: c1.map(|v| (v as f32 / Self::SCALE).min(1f32)),
            epsilon: config.epsilon,
            max_iterations: config.max_iterations,
        }
    }

    pub fn is_linear(&self) -> bool {
        self.c0.x == self.c0.y && self.c1.x == self.c1.y
    }

    fn component(p1: f32, p2: f32, s: f32) -> f32 {
        let is = 1f32 - s;
        3f32 * is * is * s * p1 + 3f32 * is * s * s * p2 + s * s * s
    }

    fn derivative(p1: f32, p2: f32, s: f32) -> f32 {
        let is = 1f32 - s;
        3f32 * is * is * p1 + 6f32 * is * s * (p2 - p1) + 3f32 * s * s * (1f32 - p2)
    }

    /// Finds `s` with `X(s) == x`. Newton steps that leave the current bracket fall back to
    /// bisection, so the solve never diverges.
    fn solve(&self, x: f32) -> f32 {
        let (mut lo, mut hi) = (0f32, 1f32);
        let mut s = x;
        for _ in 0..self.max_iterations {
            let error = Self::component(self.p1.x, self.p2.x, s) - x;
            if error.abs() <= self.epsilon {
                break;
            }
            if error > 0f32 {
                hi = s;
            } else {
                lo = s;
            }
            let slope = Self::derivative(self.p1.x, self.p2.x, s);
            let next = if slope.abs() > f32::EPSILON {
                s - error / slope
            } else {
                f32::NAN
            };
            s = if next > lo && next < hi {
                next
            } else {
                (lo + hi) * 0.5f32
            };
        }
        s
    }

    /// Eased weight for a linear progress `value` in `[0, 1]`.
    pub fn value(&self, value: f32) -> f32 {
        let x = value.clamp(0f32, 1f32);
        if self.is_linear() || x == 0f32 || x == 1f32 {
            return x;
        }
        let s = self.solve(x);
        Self::component(self.p1.y, self.p2.y, s).clamp(0f32, 1f32)
    }

    pub fn c0(&self) -> Vector2<u8> {
        self.c0
    }

    pub fn c1(&self) -> Vector2<u8> {
        self.c1
    }
}

pub trait BezierCurveFactory {
    fn get_or_new(&self, c0: Vector2<u8>, c1: Vector2<u8>) -> Arc<BezierCurve>;
}

/// Curves shared by every track of a motion, keyed by their control points.
#[derive(Debug)]
pub struct BezierCurveCache {
    curves: Mutex<HashMap<[u8; 4], Arc<BezierCurve>>>,
    config: BezierSolverConfig,
}

impl Default for BezierCurveCache {
    fn default() -> Self {
        Self::new(BezierSolverConfig::default())
    }
}

impl Clone for BezierCurveCache {
    /// A clone starts with an empty cache.
    fn clone(&self) -> Self {
        Self::new(self.config)
    }
}

impl BezierCurveCache {
    pub fn new(config: BezierSolverConfig) -> Self {
        Self {
            curves: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &BezierSolverConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.curves.lock().map(|curves| curves.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BezierCurveFactory for BezierCurveCache {
    fn get_or_new(&self, c0: Vector2<u8>, c1: Vector2<u8>) -> Arc<BezierCurve> {
        let key = [c0.x, c0.y, c1.x, c1.y];
        match self.curves.lock() {
            Ok(mut curves) => curves
                .entry(key)
                .or_insert_with(|| Arc::new(BezierCurve::create(c0, c1, &self.config)))
                .clone(),
            Err(_) => Arc::new(BezierCurve::create(c0, c1, &self.config)),
        }
    }
}

#[test]
fn test_linear_curve_is_identity() {
    let curve = BezierCurve::create(
        Vector2::new(20, 20),
        Vector2::new(107, 107),
        &BezierSolverConfig::default(),
    );
    for i in 0..=10 {
        let x = i as f32 / 10f32;
        assert_eq!(x, curve.value(x));
    }
}

#[test]
fn test_ease_in_out_is_symmetric_and_monotonic() {
    let curve = BezierCurve::create(
        Vector2::new(64, 0),
        Vector2::new(63, 127),
        &BezierSolverConfig::default(),
    );
    let mut last = 0f32;
    for i in 1..=100 {
        let v = curve.value(i as f32 / 100f32);
        assert!(v >= last - 1e-5);
        last = v;
    }
    assert!(curve.value(0.1f32) < 0.1f32);
    assert!(curve.value(0.9f32) > 0.9f32);
    assert!((curve.value(0.5f32) - 0.5f32).abs() < 1e-2);
}

#[test]
fn test_epsilon_choice_is_stable() {
    let tight = BezierCurve::create(
        Vector2::new(10, 90),
        Vector2::new(40, 120),
        &BezierSolverConfig {
            epsilon: 1e-7,
            max_iterations: 64,
        },
    );
    let loose = BezierCurve::create(
        Vector2::new(10, 90),
        Vector2::new(40, 120),
        &BezierSolverConfig {
            epsilon: 1e-4,
            max_iterations: 8,
        },
    );
    for i in 0..=20 {
        let x = i as f32 / 20f32;
        assert!((tight.value(x) - loose.value(x)).abs() < 5e-3);
    }
}

#[test]
fn test_cache_reuses_curves() {
    let cache = BezierCurveCache::default();
    let a = cache.get_or_new(Vector2::new(1, 2), Vector2::new(3, 4));
    let b = cache.get_or_new(Vector2::new(1, 2), Vector2::new(3, 4));
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(1, cache.len());
    assert!(cache.clone().is_empty());
}
