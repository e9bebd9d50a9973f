use bevy::prelude::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityFlag {
    value: bool,
}

impl ActivityFlag {
    pub fn get(self) -> bool {
        self.value
    }

    pub fn set(&mut self, value: bool) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }
}

#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakTimeSignal {
    pub is_break_time: bool,
}

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Playfield;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitObjectKind {
    Circle,
    Slider { tracking: bool },
    Spinner { spinning: bool },
}

impl HitObjectKind {
    pub fn is_engaged(self) -> bool {
        match self {
            Self::Circle => false,
            Self::Slider { tracking } => tracking,
            Self::Spinner { spinning } => spinning,
        }
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedHitObject {
    pub alive: bool,
    pub kiai: bool,
    pub kind: HitObjectKind,
}

impl TrackedHitObject {
    pub fn is_kiai_engaged(&self) -> bool {
        self.alive && self.kiai && self.kind.is_engaged()
    }
}

pub fn any_kiai_engaged<'a>(objects: impl IntoIterator<Item = &'a TrackedHitObject>) -> bool {
    objects.into_iter().any(TrackedHitObject::is_kiai_engaged)
}
