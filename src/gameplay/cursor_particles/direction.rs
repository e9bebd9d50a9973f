use bevy::math::Vec2;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpewDirection {
    #[default]
    None,
    Left,
    Right,
    Both,
}

impl SpewDirection {
    pub fn from_latches(left_held: bool, right_held: bool) -> Self {
        match (left_held, right_held) {
            (true, true) => Self::Both,
            (true, false) => Self::Left,
            (false, true) => Self::Right,
            (false, false) => Self::None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Left => "left",
            Self::Right => "right",
            Self::Both => "both",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpewAction {
    LeftButton,
    RightButton,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionLatches {
    left_held: bool,
    right_held: bool,
}

impl DirectionLatches {
    pub fn on_pressed(&mut self, action: SpewAction) -> bool {
        self.apply(action, true);
        false
    }

    pub fn on_released(&mut self, action: SpewAction) {
        self.apply(action, false);
    }

    pub fn is_held(&self, action: SpewAction) -> bool {
        match action {
            SpewAction::LeftButton => self.left_held,
            SpewAction::RightButton => self.right_held,
        }
    }

    pub fn direction(&self) -> SpewDirection {
        SpewDirection::from_latches(self.left_held, self.right_held)
    }

    fn apply(&mut self, action: SpewAction, pressed: bool) {
        match action {
            SpewAction::LeftButton => self.left_held = pressed,
            SpewAction::RightButton => self.right_held = pressed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySpread {
    pub x: (f32, f32),
    pub y: (f32, f32),
}

impl VelocitySpread {
    pub const fn new(x: (f32, f32), y: (f32, f32)) -> Self {
        Self { x, y }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        Vec2::new(
            rng.gen_range(self.x.0..=self.x.1),
            rng.gen_range(self.y.0..=self.y.1),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionPolicy {
    pub left: VelocitySpread,
    pub right: VelocitySpread,
    pub both: VelocitySpread,
    pub velocity_bias_multiplier: f32,
}

impl Default for EmissionPolicy {
    fn default() -> Self {
        Self {
            left: VelocitySpread::new((-460.0, 0.0), (-40.0, 40.0)),
            right: VelocitySpread::new((0.0, 460.0), (-40.0, 40.0)),
            both: VelocitySpread::new((-460.0, 460.0), (-160.0, 160.0)),
            velocity_bias_multiplier: 40.0,
        }
    }
}

impl EmissionPolicy {
    pub fn spread(&self, direction: SpewDirection) -> Option<VelocitySpread> {
        match direction {
            SpewDirection::None => None,
            SpewDirection::Left => Some(self.left),
            SpewDirection::Right => Some(self.right),
            SpewDirection::Both => Some(self.both),
        }
    }

    pub fn sample_direction<R: Rng + ?Sized>(&self, direction: SpewDirection, rng: &mut R) -> Vec2 {
        self.spread(direction)
            .map_or(Vec2::ZERO, |spread| spread.sample(rng))
    }

    pub fn sample_velocity<R: Rng + ?Sized>(
        &self,
        direction: SpewDirection,
        anchor_velocity: Vec2,
        rng: &mut R,
    ) -> Vec2 {
        self.sample_direction(direction, rng) + anchor_velocity * self.velocity_bias_multiplier
    }
}
