//! Event payloads pushed by the station.

use crate::error::{ProtocolError, Result};
use crate::item::ItemHandle;
use crate::types::Pose;
use crate::wire::codec::{self, ByteSource};
use serde::Serialize;

/// Point picked in the 3D view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection3d {
    /// Absolute pose of the selected item.
    pub pose_abs: Pose,
    /// Picked point, relative to the item.
    pub point: [f64; 3],
    /// Surface normal at the picked point.
    pub normal: [f64; 3],
    pub feature_type: i32,
    pub feature_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyEvent {
    /// `true` on press, `false` on release.
    pub pressed: bool,
    pub key: i32,
    pub modifiers: i32,
}

/// One decoded event.
///
/// `item` is `None` when the station sent the null handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    SelectionTreeChanged { item: Option<ItemHandle> },
    ItemMoved { item: Option<ItemHandle> },
    ReferencePicked { item: Option<ItemHandle> },
    ReferenceReleased { item: Option<ItemHandle> },
    ToolModified { item: Option<ItemHandle> },
    IsoCubeCreated { item: Option<ItemHandle> },
    Selection3dChanged { item: Option<ItemHandle>, selection: Selection3d },
    View3dMoved { item: Option<ItemHandle> },
    RobotMoved { item: Option<ItemHandle> },
    Key { item: Option<ItemHandle>, key: KeyEvent },
    ItemMovedPose { item: Option<ItemHandle>, pose: Pose },
    CollisionMapReset { item: Option<ItemHandle> },
    CollisionMapTooLarge { item: Option<ItemHandle> },
    CalibMeasurement { item: Option<ItemHandle> },
    Selection3dClick { item: Option<ItemHandle>, selection: Selection3d },
    ItemChanged { item: Option<ItemHandle> },
    ItemRenamed { item: Option<ItemHandle> },
    ItemVisibility { item: Option<ItemHandle> },
    StationChanged { item: Option<ItemHandle> },
    ProgSliderChanged { item: Option<ItemHandle>, position: i32 },
    ProgSliderSet { item: Option<ItemHandle>, position: i32 },
    /// An event type this client does not know. Carries no payload.
    Unknown { code: i32, item: Option<ItemHandle> },
}

/// Values in a 3D selection payload: 16 pose, 3 point, 3 normal.
const SELECTION_VALUES: usize = 22;

impl Event {
    /// Decode one event: type int, item, then the type-specific payload.
    pub async fn decode<S: ByteSource + ?Sized>(src: &mut S) -> Result<Self> {
        let code = codec::read_int(src).await?;
        let item = codec::read_item(src).await?.into_option();

        Ok(match code {
            1 => Event::SelectionTreeChanged { item },
            2 => Event::ItemMoved { item },
            3 => Event::ReferencePicked { item },
            4 => Event::ReferenceReleased { item },
            5 => Event::ToolModified { item },
            6 => Event::IsoCubeCreated { item },
            7 => Event::Selection3dChanged {
                item,
                selection: read_selection(src).await?,
            },
            8 => Event::View3dMoved { item },
            9 => Event::RobotMoved { item },
            10 => Event::Key {
                item,
                key: KeyEvent {
                    pressed: codec::read_int(src).await? > 0,
                    key: codec::read_int(src).await?,
                    modifiers: codec::read_int(src).await?,
                },
            },
            11 => Event::ItemMovedPose {
                item,
                pose: read_moved_pose(src).await?,
            },
            12 => Event::CollisionMapReset { item },
            13 => Event::CollisionMapTooLarge { item },
            14 => Event::CalibMeasurement { item },
            15 => Event::Selection3dClick {
                item,
                selection: read_selection(src).await?,
            },
            16 => Event::ItemChanged { item },
            17 => Event::ItemRenamed { item },
            18 => Event::ItemVisibility { item },
            19 => Event::StationChanged { item },
            20 => Event::ProgSliderChanged {
                item,
                position: codec::read_int(src).await?,
            },
            21 => Event::ProgSliderSet {
                item,
                position: codec::read_int(src).await?,
            },
            code => Event::Unknown { code, item },
        })
    }

    /// The wire event type.
    pub fn code(&self) -> i32 {
        match self {
            Event::SelectionTreeChanged { .. } => 1,
            Event::ItemMoved { .. } => 2,
            Event::ReferencePicked { .. } => 3,
            Event::ReferenceReleased { .. } => 4,
            Event::ToolModified { .. } => 5,
            Event::IsoCubeCreated { .. } => 6,
            Event::Selection3dChanged { .. } => 7,
            Event::View3dMoved { .. } => 8,
            Event::RobotMoved { .. } => 9,
            Event::Key { .. } => 10,
            Event::ItemMovedPose { .. } => 11,
            Event::CollisionMapReset { .. } => 12,
            Event::CollisionMapTooLarge { .. } => 13,
            Event::CalibMeasurement { .. } => 14,
            Event::Selection3dClick { .. } => 15,
            Event::ItemChanged { .. } => 16,
            Event::ItemRenamed { .. } => 17,
            Event::ItemVisibility { .. } => 18,
            Event::StationChanged { .. } => 19,
            Event::ProgSliderChanged { .. } => 20,
            Event::ProgSliderSet { .. } => 21,
            Event::Unknown { code, .. } => *code,
        }
    }

    /// The item the event refers to.
    pub fn item(&self) -> Option<&ItemHandle> {
        match self {
            Event::SelectionTreeChanged { item }
            | Event::ItemMoved { item }
            | Event::ReferencePicked { item }
            | Event::ReferenceReleased { item }
            | Event::ToolModified { item }
            | Event::IsoCubeCreated { item }
            | Event::Selection3dChanged { item, .. }
            | Event::View3dMoved { item }
            | Event::RobotMoved { item }
            | Event::Key { item, .. }
            | Event::ItemMovedPose { item, .. }
            | Event::CollisionMapReset { item }
            | Event::CollisionMapTooLarge { item }
            | Event::CalibMeasurement { item }
            | Event::Selection3dClick { item, .. }
            | Event::ItemChanged { item }
            | Event::ItemRenamed { item }
            | Event::ItemVisibility { item }
            | Event::StationChanged { item }
            | Event::ProgSliderChanged { item, .. }
            | Event::ProgSliderSet { item, .. }
            | Event::Unknown { item, .. } => item.as_ref(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Event::Unknown { .. })
    }
}

async fn read_selection<S: ByteSource + ?Sized>(src: &mut S) -> Result<Selection3d> {
    let values = codec::read_array(src).await?;
    let feature_type = codec::read_int(src).await?;
    let feature_id = codec::read_int(src).await?;

    if values.len() < SELECTION_VALUES {
        return Err(ProtocolError::FramingMismatch {
            context: "selection event",
            detail: format!(
                "expected {} values, got {}",
                SELECTION_VALUES,
                values.len()
            ),
        }
        .into());
    }
    Ok(Selection3d {
        pose_abs: codec::pose_from_slice(&values)?,
        point: [values[16], values[17], values[18]],
        normal: [values[19], values[20], values[21]],
        feature_type,
        feature_id,
    })
}

/// Value count, then a pose. Values beyond the pose are skipped.
async fn read_moved_pose<S: ByteSource + ?Sized>(src: &mut S) -> Result<Pose> {
    let count = codec::read_count(src, "moved pose event").await?;
    if count < codec::POSE_VALUES {
        return Err(ProtocolError::FramingMismatch {
            context: "moved pose event",
            detail: format!(
                "{} values cannot hold a {}-value pose",
                count,
                codec::POSE_VALUES
            ),
        }
        .into());
    }
    let pose = codec::read_pose(src).await?;
    let extra = count.saturating_sub(codec::POSE_VALUES);
    if extra > 0 {
        src.recv_exact(extra * codec::DOUBLE_SIZE).await?;
    }
    Ok(pose)
}
