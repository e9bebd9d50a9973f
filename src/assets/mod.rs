use crate::config::{GameConfig, SpriteAssetConfig};
use bevy::prelude::*;
use std::collections::HashMap;
use std::path::Path;

const ASSET_ROOT_DIR: &str = "assets";

pub struct AssetRegistryPlugin;

impl Plugin for AssetRegistryPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            sync_asset_registry.run_if(resource_exists::<GameConfig>),
        );
    }
}

fn sync_asset_registry(
    mut commands: Commands,
    config: Res<GameConfig>,
    asset_server: Res<AssetServer>,
    registry: Option<ResMut<AssetRegistry>>,
) {
    if registry.is_some() && !config.is_changed() {
        return;
    }

    let new_registry =
        AssetRegistry::from_config(&config, &asset_server, Path::new(ASSET_ROOT_DIR));

    match registry {
        Some(mut existing_registry) => {
            *existing_registry = new_registry;
            log_asset_registry_summary("Updated", &existing_registry);
        }
        None => {
            log_asset_registry_summary("Initialized", &new_registry);
            commands.insert_resource(new_registry);
        }
    }
}

fn log_asset_registry_summary(prefix: &str, registry: &AssetRegistry) {
    info!(
        "{prefix} asset registry: sprites {}/{}.",
        registry.available_sprite_count(),
        registry.sprites.len(),
    );

    for (id, entry) in &registry.sprites {
        if !entry.exists_on_disk {
            warn!(
                "Sprite `{id}` is missing at `{ASSET_ROOT_DIR}/{}`; particles fall back to tinted quads.",
                entry.path
            );
        }
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct AssetRegistry {
    pub sprites: HashMap<String, SpriteAssetEntry>,
}

impl AssetRegistry {
    pub fn from_config(config: &GameConfig, asset_server: &AssetServer, asset_root: &Path) -> Self {
        let sprites = config
            .assets
            .sprites
            .iter()
            .map(|entry| {
                let sprite = SpriteAssetEntry::from_config(entry, asset_server, asset_root);
                (entry.id.clone(), sprite)
            })
            .collect();

        Self { sprites }
    }

    pub fn sprite(&self, id: &str) -> Option<Handle<Image>> {
        self.sprites
            .get(id)
            .and_then(|entry| entry.handle.clone())
    }

    pub fn pending_handles(&self) -> impl Iterator<Item = &Handle<Image>> {
        self.sprites
            .values()
            .filter_map(|entry| entry.handle.as_ref())
    }

    fn available_sprite_count(&self) -> usize {
        self.sprites
            .values()
            .filter(|entry| entry.exists_on_disk)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct SpriteAssetEntry {
    pub path: String,
    pub exists_on_disk: bool,
    pub handle: Option<Handle<Image>>,
}

impl SpriteAssetEntry {
    fn from_config(
        config: &SpriteAssetConfig,
        asset_server: &AssetServer,
        asset_root: &Path,
    ) -> Self {
        let exists_on_disk = asset_exists(asset_root, &config.path);
        let handle = exists_on_disk.then(|| asset_server.load(config.path.clone()));

        Self {
            path: config.path.clone(),
            exists_on_disk,
            handle,
        }
    }
}

fn asset_exists(asset_root: &Path, path: &str) -> bool {
    let file_path = path.split('#').next().unwrap_or(path);
    asset_root.join(file_path).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_exists_ignores_label_suffix() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join(ASSET_ROOT_DIR);
        assert!(asset_exists(&root, "sprites/star2.png"));
        assert!(asset_exists(&root, "sprites/star2.png#Image0"));
        assert!(!asset_exists(&root, "sprites/nope.png"));
    }

    #[test]
    fn unknown_or_missing_sprites_resolve_to_none() {
        let mut registry = AssetRegistry::default();
        registry.sprites.insert(
            "ghost".to_string(),
            SpriteAssetEntry {
                path: "sprites/ghost.png".to_string(),
                exists_on_disk: false,
                handle: None,
            },
        );

        assert!(registry.sprite("ghost").is_none());
        assert!(registry.sprite("star2").is_none());
        assert_eq!(registry.available_sprite_count(), 0);
    }
}
