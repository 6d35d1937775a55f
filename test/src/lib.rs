pub mod helpers;
pub mod test_scene;

pub use helpers::*;
pub use test_protocol::{
    protocol, Badge, BadgeSync, Motion, Position, PositionSync, SmoothMotion, BALL_PREFAB,
    BADGE_PREFAB, PLAYER_PREFAB,
};
pub use test_scene::{TestScene, LEVEL_ROOT};
