use bevy::prelude::*;
use bevy::render::render_resource::TextureFormat;
use thiserror::Error;

// Constants for the emoji atlas
const ATLAS_SIZE: UVec2 = UVec2::new(8192, 8192);
const EMOJI_SIZE: UVec2 = UVec2::new(128, 128);
const ATLAS_PATH: &str = "EmojiAtlas.png";

/// Shared emoji artwork source: loads the atlas and exposes sprite builders.
pub struct EmojiPlugin;

impl Plugin for EmojiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AtlasStatus>()
            .add_systems(Startup, load_emoji_atlas)
            .add_systems(Update, prepare_emoji_atlas);
    }
}

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("atlas dimensions mismatch - expected {expected:?}, got {actual:?}")]
    DimensionMismatch { expected: UVec2, actual: UVec2 },

    #[error("no usable emoji cells found in atlas")]
    NoValidCells,

    #[error("unsupported texture format: {0:?}")]
    InvalidFormat(TextureFormat),
}

#[derive(Resource)]
pub struct EmojiAtlas {
    texture: Handle<Image>,
    layout: Handle<TextureAtlasLayout>,
    valid_indices: Vec<usize>,
}

/// Readiness of the atlas; flips once the texture is loaded and scanned.
#[derive(Resource, Default)]
pub struct AtlasStatus {
    ready: bool,
    total: usize,
}

#[derive(Component)]
pub struct EmojiSprite;

fn load_emoji_atlas(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut layouts: ResMut<Assets<TextureAtlasLayout>>,
) {
    let cols = ATLAS_SIZE.x / EMOJI_SIZE.x;
    let rows = ATLAS_SIZE.y / EMOJI_SIZE.y;
    let layout = layouts.add(TextureAtlasLayout::from_grid(
        EMOJI_SIZE, cols, rows, None, None,
    ));

    commands.insert_resource(EmojiAtlas {
        texture: asset_server.load(ATLAS_PATH),
        layout,
        valid_indices: Vec::new(),
    });
}

/// Scans the atlas once its pixel data is available and records which cells
/// hold actual artwork. Runs until it succeeds, then becomes a no-op.
fn prepare_emoji_atlas(
    mut atlas: ResMut<EmojiAtlas>,
    mut status: ResMut<AtlasStatus>,
    images: Res<Assets<Image>>,
) {
    if status.ready {
        return;
    }

    let Some(texture) = images.get(&atlas.texture) else {
        return;
    };

    match scan_atlas(texture) {
        Ok(valid_indices) => {
            status.total = valid_indices.len();
            status.ready = true;
            atlas.valid_indices = valid_indices;
            info!("emoji atlas ready: {} usable cells", status.total);
        }
        Err(err) => {
            error!("emoji atlas unusable: {err}");
        }
    }
}

fn scan_atlas(texture: &Image) -> Result<Vec<usize>, AtlasError> {
    let actual = UVec2::new(texture.width(), texture.height());
    if actual != ATLAS_SIZE {
        return Err(AtlasError::DimensionMismatch {
            expected: ATLAS_SIZE,
            actual,
        });
    }

    let bytes_per_pixel = match texture.texture_descriptor.format {
        TextureFormat::Rgba8UnormSrgb
        | TextureFormat::Rgba8Unorm
        | TextureFormat::Bgra8UnormSrgb => 4u32,
        format => return Err(AtlasError::InvalidFormat(format)),
    };

    let cols = ATLAS_SIZE.x / EMOJI_SIZE.x;
    let rows = ATLAS_SIZE.y / EMOJI_SIZE.y;

    let cell_has_artwork = |cell_x: u32, cell_y: u32| -> bool {
        for y in 0..EMOJI_SIZE.y {
            for x in 0..EMOJI_SIZE.x {
                let pixel_x = cell_x * EMOJI_SIZE.x + x;
                let pixel_y = cell_y * EMOJI_SIZE.y + y;
                let idx = ((pixel_y * texture.width() + pixel_x) * bytes_per_pixel) as usize;

                if let Some(&[r, g, b, a]) = texture
                    .data
                    .get(idx..idx + 4)
                    .and_then(|window| <&[u8; 4]>::try_from(window).ok())
                {
                    if a > 0 || r > 0 || g > 0 || b > 0 {
                        return true;
                    }
                }
            }
        }
        false
    };

    let mut valid_indices = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if cell_has_artwork(col, row) {
                valid_indices.push((row * cols + col) as usize);
            }
        }
    }

    if valid_indices.is_empty() {
        return Err(AtlasError::NoValidCells);
    }
    Ok(valid_indices)
}

/// Builds a sprite for the given emoji cell without spawning it.
/// Returns `None` while the atlas is not ready or for an unknown cell.
pub fn emoji_sprite(
    atlas: &EmojiAtlas,
    status: &AtlasStatus,
    index: usize,
    custom_size: Option<Vec2>,
) -> Option<Sprite> {
    if !status.ready || !atlas.valid_indices.contains(&index) {
        return None;
    }

    Some(Sprite {
        image: atlas.texture.clone(),
        texture_atlas: Some(TextureAtlas {
            layout: atlas.layout.clone(),
            index,
        }),
        custom_size,
        ..default()
    })
}

/// Creates a new emoji sprite entity at the specified position.
pub fn spawn_emoji(
    commands: &mut Commands,
    atlas: &EmojiAtlas,
    status: &AtlasStatus,
    index: usize,
    position: Vec2,
    size: Vec2,
) -> Option<Entity> {
    let sprite = emoji_sprite(atlas, status, index, Some(size))?;

    Some(
        commands
            .spawn((
                sprite,
                Transform::from_xyz(position.x, position.y, 0.0),
                Visibility::Visible,
                EmojiSprite,
            ))
            .id(),
    )
}

/// Picks `count` distinct emoji cells at random.
pub fn random_emojis(atlas: &EmojiAtlas, status: &AtlasStatus, count: usize) -> Vec<usize> {
    if !status.ready {
        return Vec::new();
    }

    fastrand::choose_multiple(atlas.valid_indices.iter().copied(), count)
}

/// Returns whether the emoji artwork source is ready for use.
#[must_use]
pub fn is_ready(status: &AtlasStatus) -> bool {
    status.ready
}

/// Total number of usable emoji cells.
#[must_use]
pub fn emoji_count(status: &AtlasStatus) -> usize {
    status.total
}
