//! The concrete project type edited by this host.

use std::collections::BTreeMap;

use anyhow::Context;
use flicksy_bundle::DecodedBundle;
use flicksy_history::HistoryManager;
use flicksy_resources::{ResourceId, Rgba, Surface};
use serde::{Deserialize, Serialize};

/// Side length of a scene's skybox texture.
pub const SKYBOX_SIZE: u32 = 128;

const FLOOR: Rgba = [16, 16, 16, 255];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: u32,
    pub texture: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flicksy3Project {
    pub scenes: Vec<Scene>,
}

impl Flicksy3Project {
    pub fn scene(&self, id: u32) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn scene_mut(&mut self, id: u32) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.id == id)
    }
}

pub type ProjectManifest = fn(&Flicksy3Project) -> Vec<ResourceId>;

pub type ProjectHistory = HistoryManager<Flicksy3Project, ProjectManifest>;

/// Every texture the project's scenes point at.
pub fn manifest(project: &Flicksy3Project) -> Vec<ResourceId> {
    project.scenes.iter().map(|scene| scene.texture).collect()
}

pub fn new_history() -> ProjectHistory {
    HistoryManager::new(manifest as ProjectManifest)
}

/// Record an undo step, then fill a rectangle of a scene's texture.
///
/// The texture is forked first so the checkpoint keeps the original pixels.
/// Returns the id of the new texture.
pub fn paint_scene(
    history: &mut ProjectHistory,
    scene: u32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    color: Rgba,
) -> anyhow::Result<ResourceId> {
    let texture = history
        .present()
        .and_then(|project| project.scene(scene))
        .map(|s| s.texture)
        .with_context(|| format!("project has no scene {scene}"))?;
    history.make_checkpoint()?;

    let (present, resources) = history.edit_parts().context("no project loaded")?;
    let fork = resources.fork(texture)?;
    fork.instance.fill_rect(x, y, width, height, color);
    let forked = fork.id;
    if let Some(target) = present.scene_mut(scene) {
        target.texture = forked;
    }
    history.changed();
    tracing::debug!(scene, from = %texture, to = %forked, "scene texture painted");
    Ok(forked)
}

/// One scene with a banded skybox over a dark floor.
pub fn blank_bundle() -> DecodedBundle<Flicksy3Project> {
    let texture = ResourceId(1);
    let mut resources = BTreeMap::new();
    resources.insert(texture, blank_skybox());
    DecodedBundle {
        project: Flicksy3Project {
            scenes: vec![Scene { id: 1, texture }],
        },
        resources,
    }
}

fn blank_skybox() -> Surface {
    let mut skybox = Surface::new(SKYBOX_SIZE, SKYBOX_SIZE);
    for y in 0..SKYBOX_SIZE {
        for x in 0..SKYBOX_SIZE {
            skybox.set_pixel(x, y, band_color(x, y));
        }
    }
    let half = SKYBOX_SIZE / 2;
    skybox.fill_rect(0, half, SKYBOX_SIZE, half, FLOOR);
    skybox
}

/// Diagonal bands. The band position is scaled onto a
/// packed `0xAABBGGRR` word, truncated to 32 bits, with alpha forced opaque.
fn band_color(x: u32, y: u32) -> Rgba {
    let band = (f64::from(x) / 31.0 + f64::from(y) / 17.0) % 16.0;
    let packed = (f64::from(0x1111_1111u32) * band) as u64 as u32 | 0xFF00_0000;
    packed.to_le_bytes()
}

/// Parse `#rrggbb`, `#rrggbbaa`, or the same without `#`.
pub fn parse_color(text: &str) -> anyhow::Result<Rgba> {
    let hex = text.strip_prefix('#').unwrap_or(text);
    if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("invalid color {text:?}: expected #rrggbb or #rrggbbaa");
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16);
    let alpha = if hex.len() == 8 { channel(3)? } else { 255 };
    Ok([channel(0)?, channel(1)?, channel(2)?, alpha])
}

#[cfg(test)]
mod tests {
    use super::*;
    use flicksy_bundle::{from_portable, to_portable};
    use flicksy_resources::CodecRegistry;

    #[test]
    fn blank_bundle_shape() {
        let bundle = blank_bundle();
        assert_eq!(bundle.project.scenes.len(), 1);
        assert_eq!(manifest(&bundle.project), vec![ResourceId(1)]);

        let skybox = &bundle.resources[&ResourceId(1)];
        assert_eq!((skybox.width(), skybox.height()), (128, 128));
        assert_eq!(skybox.pixel(5, 100), Some(FLOOR));
        assert_eq!(skybox.pixel(127, 127), Some(FLOOR));
        for y in [0, 30, 63] {
            assert_eq!(skybox.pixel(40, y).unwrap()[3], 255);
            assert_ne!(skybox.pixel(40, y), Some(FLOOR));
        }
    }

    #[test]
    fn band_origin_is_opaque_black() {
        assert_eq!(band_color(0, 0), [0, 0, 0, 255]);
        assert_ne!(band_color(100, 40), band_color(0, 0));
    }

    #[test]
    fn blank_bundle_survives_portable_roundtrip() {
        let codecs = CodecRegistry::new();
        let bundle = blank_bundle();
        let portable = to_portable(&bundle, &codecs).unwrap();
        let json = serde_json::to_value(&portable).unwrap();
        assert_eq!(json["project"]["scenes"][0]["texture"], "1");
        assert_eq!(json["resources"]["1"]["type"], "canvas-datauri");
        assert_eq!(from_portable(portable, &codecs).unwrap(), bundle);
    }

    #[test]
    fn colors() {
        assert_eq!(parse_color("#ff8000").unwrap(), [255, 128, 0, 255]);
        assert_eq!(parse_color("00000080").unwrap(), [0, 0, 0, 128]);
        assert!(parse_color("#fff").is_err());
        assert!(parse_color("#gg0000").is_err());
    }

    #[test]
    fn paint_forks_and_undo_restores() {
        let mut history = new_history();
        history.load_bundle(blank_bundle()).unwrap();
        let before = history.resources().get(ResourceId(1)).unwrap().clone();

        let red = [255, 0, 0, 255];
        let forked = paint_scene(&mut history, 1, 0, 0, 8, 8, red).unwrap();
        assert_ne!(forked, ResourceId(1));
        assert_eq!(history.resources().get(forked).unwrap().pixel(7, 7), Some(red));
        assert_eq!(history.resources().get(ResourceId(1)).unwrap(), &before);

        assert!(history.undo());
        assert_eq!(history.present().unwrap().scenes[0].texture, ResourceId(1));
    }

    #[test]
    fn painting_a_missing_scene_records_nothing() {
        let mut history = new_history();
        history.load_bundle(blank_bundle()).unwrap();
        assert!(paint_scene(&mut history, 4, 0, 0, 1, 1, FLOOR).is_err());
        assert!(!history.can_undo());
    }

    #[test]
    fn scene_lookup() {
        let mut project = blank_bundle().project;
        assert!(project.scene(2).is_none());
        project.scene_mut(1).unwrap().texture = ResourceId(9);
        assert_eq!(project.scene(1).unwrap().texture, ResourceId(9));
    }
}
