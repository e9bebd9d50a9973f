pub mod cursor_particles;
pub mod playfield;

use bevy::prelude::*;
use cursor_particles::CursorParticlesPlugin;
use playfield::PlayfieldPlugin;

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(PlayfieldPlugin)
            .add_plugins(CursorParticlesPlugin);
    }
}
