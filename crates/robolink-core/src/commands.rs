//! Typed station commands.
//!
//! Each method is a single fixed-schema frame on top of [`Link::call`].
//! Item arguments take `Option<&ItemHandle>` where the station accepts the
//! null item, and item results come back as `Option<ItemHandle>`.

use crate::config::ProtocolConfig;
use crate::dispatch::{CommandFrame, Link};
use crate::error::Result;
use crate::item::{ItemHandle, ItemType};
use crate::types::{Matrix2D, Pose};
use crate::wire::{WireType, WireValue};
use std::path::Path;
use std::time::Duration;

impl Link {
    /// Look up an item by name, optionally restricted to one type.
    pub async fn item(&self, name: &str, item_type: Option<ItemType>) -> Result<Option<ItemHandle>> {
        let frame = match item_type {
            None => CommandFrame::new("G_Item").arg(WireValue::line(name)),
            Some(ty) => CommandFrame::new("G_Item2")
                .arg(WireValue::line(name))
                .arg(WireValue::Int(ty.code())),
        };
        self.call(frame.returns(WireType::Item)).await?.next_item()
    }

    /// Names of all items in the station, optionally of one type.
    pub async fn item_names(&self, item_type: Option<ItemType>) -> Result<Vec<String>> {
        let frame = match item_type {
            None => CommandFrame::new("G_List_Items"),
            Some(ty) => CommandFrame::new("G_List_Items_Type").arg(WireValue::Int(ty.code())),
        };
        self.call(frame.returns(WireType::Lines)).await?.next_lines()
    }

    /// All items in the station, optionally of one type.
    pub async fn items(&self, item_type: Option<ItemType>) -> Result<Vec<ItemHandle>> {
        let frame = match item_type {
            None => CommandFrame::new("G_List_Items_ptr"),
            Some(ty) => {
                CommandFrame::new("G_List_Items_Type_ptr").arg(WireValue::Int(ty.code()))
            }
        };
        self.call(frame.returns(WireType::Items)).await?.next_items()
    }

    pub async fn item_name(&self, item: &ItemHandle) -> Result<String> {
        let frame = CommandFrame::new("G_Name")
            .arg(WireValue::item(Some(item)))
            .returns(WireType::Line);
        self.call(frame).await?.next_line()
    }

    pub async fn set_item_name(&self, item: &ItemHandle, name: &str) -> Result<()> {
        let frame = CommandFrame::new("S_Name")
            .arg(WireValue::item(Some(item)))
            .arg(WireValue::line(name));
        self.call(frame).await.map(drop)
    }

    /// Ask the station for the item's current type.
    pub async fn item_type(&self, item: &ItemHandle) -> Result<ItemType> {
        let frame = CommandFrame::new("G_Item_Type")
            .arg(WireValue::item(Some(item)))
            .returns(WireType::Int);
        Ok(ItemType::from_code(self.call(frame).await?.next_int()?))
    }

    /// Pose relative to the item's parent.
    pub async fn pose(&self, item: &ItemHandle) -> Result<Pose> {
        let frame = CommandFrame::new("G_Hlocal")
            .arg(WireValue::item(Some(item)))
            .returns(WireType::Pose);
        self.call(frame).await?.next_pose()
    }

    pub async fn set_pose(&self, item: &ItemHandle, pose: &Pose) -> Result<()> {
        let frame = CommandFrame::new("S_Hlocal")
            .arg(WireValue::item(Some(item)))
            .arg(WireValue::Pose(*pose));
        self.call(frame).await.map(drop)
    }

    /// Pose relative to the station root.
    pub async fn pose_abs(&self, item: &ItemHandle) -> Result<Pose> {
        let frame = CommandFrame::new("G_Hlocal_Abs")
            .arg(WireValue::item(Some(item)))
            .returns(WireType::Pose);
        self.call(frame).await?.next_pose()
    }

    /// Current joint values of a robot. Empty if the item has no joints.
    pub async fn joints(&self, robot: &ItemHandle) -> Result<Vec<f64>> {
        let frame = CommandFrame::new("G_Thetas")
            .arg(WireValue::item(Some(robot)))
            .returns(WireType::Array);
        self.call(frame).await?.next_array()
    }

    pub async fn set_joints(&self, robot: &ItemHandle, joints: &[f64]) -> Result<()> {
        let frame = CommandFrame::new("S_Thetas")
            .arg(WireValue::Array(joints.to_vec()))
            .arg(WireValue::item(Some(robot)));
        self.call(frame).await.map(drop)
    }

    /// Every inverse kinematics solution for `pose`, one per column.
    pub async fn solve_ik_all(&self, robot: &ItemHandle, pose: &Pose) -> Result<Matrix2D> {
        let frame = CommandFrame::new("G_IK_cmpl")
            .arg(WireValue::Pose(*pose))
            .arg(WireValue::item(Some(robot)))
            .returns(WireType::Matrix);
        self.call(frame).await?.next_matrix()
    }

    /// Remove an item from the station.
    pub async fn delete(&self, item: &ItemHandle) -> Result<()> {
        let frame = CommandFrame::new("Remove").arg(WireValue::item(Some(item)));
        self.call(frame).await.map(drop)
    }

    /// Load a file into the station, under `parent` or the station root.
    pub async fn add_file(
        &self,
        path: impl AsRef<Path>,
        parent: Option<&ItemHandle>,
    ) -> Result<Option<ItemHandle>> {
        let frame = CommandFrame::new("Add")
            .arg(WireValue::line(path.as_ref().to_string_lossy()))
            .arg(WireValue::item(parent))
            .returns(WireType::Item)
            .extended(None);
        self.call(frame).await?.next_item()
    }

    /// Block until the robot finishes its current motion.
    ///
    /// `timeout` overrides the configured extended timeout for this call.
    pub async fn wait_move(&self, robot: &ItemHandle, timeout: Option<Duration>) -> Result<()> {
        let frame = CommandFrame::new("WaitMove")
            .arg(WireValue::item(Some(robot)))
            .extended(timeout);
        self.call(frame).await.map(drop)
    }

    /// Instruction table of a program and its error count.
    pub async fn program_instructions(&self, program: &ItemHandle) -> Result<(Matrix2D, i32)> {
        let frame = CommandFrame::new("G_ProgInsList")
            .arg(WireValue::item(Some(program)))
            .returns(WireType::Matrix)
            .returns(WireType::Int);
        let mut reply = self.call(frame).await?;
        Ok((reply.next_matrix()?, reply.next_int()?))
    }

    /// Send a special station command and return its textual answer.
    pub async fn command(&self, name: &str, value: &str) -> Result<String> {
        let frame = CommandFrame::new("SCMD")
            .arg(WireValue::line(name))
            .arg(WireValue::line(value))
            .returns(WireType::Line);
        self.call(frame).await?.next_line()
    }

    /// Read a station parameter.
    pub async fn param(&self, name: &str) -> Result<String> {
        let frame = CommandFrame::new("G_Gparam")
            .arg(WireValue::line(name))
            .returns(WireType::Line);
        self.call(frame).await?.next_line()
    }

    pub async fn set_param(&self, name: &str, value: &str) -> Result<()> {
        let frame = CommandFrame::new("S_Gparam")
            .arg(WireValue::line(name))
            .arg(WireValue::line(value));
        self.call(frame).await.map(drop)
    }

    /// Turn automatic rendering on or off.
    pub async fn render(&self, auto_render: bool) -> Result<()> {
        let frame = CommandFrame::new("Render").arg(WireValue::Int(i32::from(auto_render)));
        self.call(frame).await.map(drop)
    }

    /// Replace the station's selection.
    pub async fn set_selection(&self, items: &[ItemHandle]) -> Result<()> {
        self.ensure_connected().await?;
        self.require_build(ProtocolConfig::MIN_BUILD_SELECTION).await?;
        let frame = CommandFrame::new("S_Selection").arg(WireValue::Items(items.to_vec()));
        self.call(frame).await.map(drop)
    }

    /// Items currently selected in the station.
    pub async fn selection(&self) -> Result<Vec<ItemHandle>> {
        let frame = CommandFrame::new("G_Selection").returns(WireType::Items);
        self.call(frame).await?.next_items()
    }
}
