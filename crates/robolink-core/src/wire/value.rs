//! Tagged wire values.
//!
//! Every argument and result travels as one of a closed set of variants, so a
//! command schema is just a list of [`WireType`]s and encoding is an
//! exhaustive match.

use super::codec::{self, ByteSource};
use crate::error::{ProtocolError, Result};
use crate::item::ItemHandle;
use crate::types::{Matrix2D, Pose};
use bytes::BytesMut;

/// The kinds of value the protocol can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Int,
    Double,
    Line,
    Item,
    Array,
    Pose,
    Matrix,
    Lines,
    Items,
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Int(i32),
    Double(f64),
    Line(String),
    /// May hold the null handle.
    Item(ItemHandle),
    Array(Vec<f64>),
    Pose(Pose),
    Matrix(Matrix2D),
    Lines(Vec<String>),
    Items(Vec<ItemHandle>),
}

impl WireValue {
    /// An item argument, sending id 0 for `None`.
    pub fn item(item: Option<&ItemHandle>) -> Self {
        WireValue::Item(item.copied().unwrap_or_else(ItemHandle::null))
    }

    pub fn line(text: impl Into<String>) -> Self {
        WireValue::Line(text.into())
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            WireValue::Int(_) => WireType::Int,
            WireValue::Double(_) => WireType::Double,
            WireValue::Line(_) => WireType::Line,
            WireValue::Item(_) => WireType::Item,
            WireValue::Array(_) => WireType::Array,
            WireValue::Pose(_) => WireType::Pose,
            WireValue::Matrix(_) => WireType::Matrix,
            WireValue::Lines(_) => WireType::Lines,
            WireValue::Items(_) => WireType::Items,
        }
    }

    /// Append this value's wire form.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            WireValue::Int(v) => codec::put_int(buf, *v),
            WireValue::Double(v) => codec::put_double(buf, *v),
            WireValue::Line(s) => codec::put_line(buf, s),
            WireValue::Item(item) => codec::put_item(buf, Some(item)),
            WireValue::Array(values) => codec::put_array(buf, values),
            WireValue::Pose(pose) => codec::put_pose(buf, pose),
            WireValue::Matrix(matrix) => codec::put_matrix(buf, matrix),
            WireValue::Lines(lines) => codec::put_lines(buf, lines),
            WireValue::Items(items) => codec::put_items(buf, items),
        }
    }

    /// Decode one value of the given type.
    pub async fn decode<S: ByteSource + ?Sized>(src: &mut S, ty: WireType) -> Result<Self> {
        Ok(match ty {
            WireType::Int => WireValue::Int(codec::read_int(src).await?),
            WireType::Double => WireValue::Double(codec::read_double(src).await?),
            WireType::Line => WireValue::Line(codec::read_line(src).await?),
            WireType::Item => WireValue::Item(codec::read_item(src).await?),
            WireType::Array => WireValue::Array(codec::read_array(src).await?),
            WireType::Pose => WireValue::Pose(codec::read_pose(src).await?),
            WireType::Matrix => WireValue::Matrix(codec::read_matrix(src).await?),
            WireType::Lines => WireValue::Lines(codec::read_lines(src).await?),
            WireType::Items => WireValue::Items(codec::read_items(src).await?),
        })
    }

    fn mismatch(&self, expected: WireType) -> ProtocolError {
        ProtocolError::FramingMismatch {
            context: "result",
            detail: format!("expected {:?}, decoded {:?}", expected, self.wire_type()),
        }
    }

    pub fn into_int(self) -> Result<i32> {
        match self {
            WireValue::Int(v) => Ok(v),
            other => Err(other.mismatch(WireType::Int).into()),
        }
    }

    pub fn into_double(self) -> Result<f64> {
        match self {
            WireValue::Double(v) => Ok(v),
            other => Err(other.mismatch(WireType::Double).into()),
        }
    }

    pub fn into_line(self) -> Result<String> {
        match self {
            WireValue::Line(v) => Ok(v),
            other => Err(other.mismatch(WireType::Line).into()),
        }
    }

    pub fn into_item(self) -> Result<ItemHandle> {
        match self {
            WireValue::Item(v) => Ok(v),
            other => Err(other.mismatch(WireType::Item).into()),
        }
    }

    pub fn into_array(self) -> Result<Vec<f64>> {
        match self {
            WireValue::Array(v) => Ok(v),
            other => Err(other.mismatch(WireType::Array).into()),
        }
    }

    pub fn into_pose(self) -> Result<Pose> {
        match self {
            WireValue::Pose(v) => Ok(v),
            other => Err(other.mismatch(WireType::Pose).into()),
        }
    }

    pub fn into_matrix(self) -> Result<Matrix2D> {
        match self {
            WireValue::Matrix(v) => Ok(v),
            other => Err(other.mismatch(WireType::Matrix).into()),
        }
    }

    pub fn into_lines(self) -> Result<Vec<String>> {
        match self {
            WireValue::Lines(v) => Ok(v),
            other => Err(other.mismatch(WireType::Lines).into()),
        }
    }

    pub fn into_items(self) -> Result<Vec<ItemHandle>> {
        match self {
            WireValue::Items(v) => Ok(v),
            other => Err(other.mismatch(WireType::Items).into()),
        }
    }
}
