use super::activity::ActivityFlag;
use super::direction::{EmissionPolicy, SpewDirection};
use super::tracker::VelocityTracker;
use bevy::math::Vec2;
use rand::rngs::StdRng;
use rand::Rng;

pub const MAX_POOL_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpewerSettings {
    pub particles_per_second: u32,
    pub lifetime_min_ms: f32,
    pub max_lifetime_ms: f32,
    // Full-lifetime particles drop `gravity / 2` units toward -Y.
    pub gravity: f32,
    pub angular_velocity: (f32, f32),
    pub start_scale: (f32, f32),
    pub end_scale: (f32, f32),
    pub velocity_window_ms: f64,
}

impl Default for SpewerSettings {
    fn default() -> Self {
        Self {
            particles_per_second: 20,
            lifetime_min_ms: 300.0,
            max_lifetime_ms: 1_000.0,
            gravity: 240.0,
            angular_velocity: (-3.0, 3.0),
            start_scale: (0.5, 1.0),
            end_scale: (0.0, 2.0),
            velocity_window_ms: 15.0,
        }
    }
}

impl SpewerSettings {
    pub fn pool_capacity(&self) -> usize {
        let seconds = (f64::from(self.max_lifetime_ms) / 1_000.0).ceil();
        let seconds = if seconds.is_finite() { seconds.max(1.0) as usize } else { 1 };
        (self.particles_per_second.max(1) as usize)
            .saturating_mul(seconds)
            .min(MAX_POOL_CAPACITY)
    }

    pub fn spawn_cooldown_ms(&self) -> f64 {
        1_000.0 / f64::from(self.particles_per_second.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub start_time_ms: f64,
    pub start_position: Vec2,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub start_scale: f32,
    pub end_scale: f32,
    pub duration_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleFrame {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: f32,
    pub alpha: f32,
}

impl Particle {
    fn progress_at(&self, elapsed_ms: f32) -> f32 {
        (elapsed_ms / self.duration_ms.max(f32::EPSILON)).clamp(0.0, 1.0)
    }

    pub fn frame_at(&self, now_ms: f64, gravity: f32, max_lifetime_ms: f32) -> Option<ParticleFrame> {
        let elapsed_ms = (now_ms - self.start_time_ms) as f32;
        if elapsed_ms < 0.0 {
            return None;
        }

        let progress = self.progress_at(elapsed_ms);
        let alpha = 1.0 - progress;
        if alpha <= 0.0 {
            return None;
        }

        let max_lifetime_ms = max_lifetime_ms.max(f32::EPSILON);
        let fall = Vec2::new(0.0, -gravity * self.duration_ms / max_lifetime_ms * progress);
        let position =
            self.start_position + (self.velocity + fall) * elapsed_ms / max_lifetime_ms;

        Some(ParticleFrame {
            position,
            rotation: self.angular_velocity / 1_000.0 * elapsed_ms,
            scale: self.start_scale + ((self.end_scale - self.start_scale) * progress),
            alpha,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ParticlePool {
    slots: Vec<Option<Particle>>,
    cursor: usize,
}

impl ParticlePool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn insert(&mut self, particle: Particle) -> usize {
        let slot = self.cursor;
        self.slots[slot] = Some(particle);
        self.cursor = (self.cursor + 1) % self.slots.len();
        slot
    }

    pub fn get(&self, slot: usize) -> Option<&Particle> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.slots.iter().flatten()
    }
}

#[derive(Debug, Clone)]
pub struct SpewerCore {
    settings: SpewerSettings,
    policy: EmissionPolicy,
    direction: SpewDirection,
    active: ActivityFlag,
    tracker: VelocityTracker,
    pool: ParticlePool,
    clock_ms: f64,
    last_spawn_ms: Option<f64>,
    latest_particle_ms: Option<f64>,
    rng: StdRng,
}

impl SpewerCore {
    pub fn new(settings: SpewerSettings, policy: EmissionPolicy, rng: StdRng) -> Self {
        Self {
            pool: ParticlePool::with_capacity(settings.pool_capacity()),
            tracker: VelocityTracker::new(settings.velocity_window_ms),
            settings,
            policy,
            direction: SpewDirection::None,
            active: ActivityFlag::default(),
            clock_ms: 0.0,
            last_spawn_ms: None,
            latest_particle_ms: None,
            rng,
        }
    }

    pub fn settings(&self) -> &SpewerSettings {
        &self.settings
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    // In-flight particles and the held estimate survive; refuses settings
    // that need a differently sized pool.
    pub fn retune(&mut self, settings: SpewerSettings, policy: EmissionPolicy) -> bool {
        if settings.pool_capacity() != self.pool.capacity() {
            return false;
        }
        if settings.velocity_window_ms != self.settings.velocity_window_ms {
            self.tracker.set_window_ms(settings.velocity_window_ms);
        }
        self.settings = settings;
        self.policy = policy;
        true
    }

    pub fn set_active(&mut self, active: bool) -> bool {
        if !self.active.set(active) {
            return false;
        }
        self.tracker.reset();
        self.last_spawn_ms = None;
        true
    }

    pub fn direction(&self) -> SpewDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: SpewDirection) {
        self.direction = direction;
    }

    pub fn anchor_velocity(&self) -> Vec2 {
        self.tracker.estimate()
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn advance(&mut self, elapsed_ms: f64, anchor: Vec2) -> usize {
        self.clock_ms += elapsed_ms.max(0.0);
        let spawned = self.spawn_due(anchor);
        self.tracker.update(anchor, elapsed_ms);
        spawned
    }

    fn spawn_due(&mut self, anchor: Vec2) -> usize {
        if !self.active.get() {
            return 0;
        }

        let now = self.clock_ms;
        let Some(mut last_spawn_ms) = self.last_spawn_ms else {
            self.last_spawn_ms = Some(now);
            self.spawn_particle(anchor);
            return 1;
        };

        if (now - last_spawn_ms).abs() > f64::from(self.settings.max_lifetime_ms) {
            self.last_spawn_ms = Some(now);
            self.spawn_particle(anchor);
            return 1;
        }

        let cooldown_ms = self.settings.spawn_cooldown_ms();
        let mut spawned = 0;
        while now - last_spawn_ms >= cooldown_ms {
            last_spawn_ms += cooldown_ms;
            self.spawn_particle(anchor);
            spawned += 1;
        }
        self.last_spawn_ms = Some(last_spawn_ms);
        spawned
    }

    pub fn spawn_particle(&mut self, anchor: Vec2) -> usize {
        let settings = self.settings;
        let velocity = self.policy.sample_velocity(
            self.direction,
            self.tracker.estimate(),
            &mut self.rng,
        );

        let particle = Particle {
            start_time_ms: self.clock_ms,
            start_position: anchor,
            velocity,
            angular_velocity: sample(&mut self.rng, settings.angular_velocity),
            start_scale: sample(&mut self.rng, settings.start_scale),
            end_scale: sample(&mut self.rng, settings.end_scale),
            duration_ms: sample(
                &mut self.rng,
                (settings.lifetime_min_ms, settings.max_lifetime_ms),
            ),
        };

        self.latest_particle_ms = Some(self.clock_ms);
        self.pool.insert(particle)
    }

    pub fn frame_for_slot(&self, slot: usize) -> Option<ParticleFrame> {
        self.pool.get(slot).and_then(|particle| {
            particle.frame_at(
                self.clock_ms,
                self.settings.gravity,
                self.settings.max_lifetime_ms,
            )
        })
    }

    pub fn live_particle_count(&self) -> usize {
        self.pool
            .iter()
            .filter(|particle| {
                particle
                    .frame_at(
                        self.clock_ms,
                        self.settings.gravity,
                        self.settings.max_lifetime_ms,
                    )
                    .is_some()
            })
            .count()
    }

    pub fn is_present(&self) -> bool {
        self.active.get()
            || self.latest_particle_ms.is_some_and(|spawned_ms| {
                spawned_ms + f64::from(self.settings.max_lifetime_ms) > self.clock_ms
            })
    }
}

fn sample(rng: &mut StdRng, (min, max): (f32, f32)) -> f32 {
    rng.gen_range(min..=max)
}
