//! Command requests and their decoded replies.

use crate::error::{ProtocolError, Result};
use crate::item::ItemHandle;
use crate::types::{Matrix2D, Pose};
use crate::wire::{codec, WireType, WireValue};
use bytes::BytesMut;
use std::collections::VecDeque;
use std::time::Duration;

/// Which timeout governs a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallTimeout {
    /// The session's default timeout.
    #[default]
    Default,
    /// A long-running call. `None` uses the configured extended timeout.
    Extended(Option<Duration>),
}

/// One command: name, arguments, expected result types, timeout class.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFrame {
    name: String,
    args: Vec<WireValue>,
    results: Vec<WireType>,
    timeout: CallTimeout,
}

impl CommandFrame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            results: Vec::new(),
            timeout: CallTimeout::Default,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, value: WireValue) -> Self {
        self.args.push(value);
        self
    }

    /// Append an expected result.
    pub fn returns(mut self, ty: WireType) -> Self {
        self.results.push(ty);
        self
    }

    /// Run under the extended timeout, or `timeout` when given.
    pub fn extended(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = CallTimeout::Extended(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[WireValue] {
        &self.args
    }

    pub fn results(&self) -> &[WireType] {
        &self.results
    }

    pub fn timeout(&self) -> CallTimeout {
        self.timeout
    }

    /// The full request: name line followed by each argument.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(64);
        codec::put_line(&mut buf, &self.name);
        for arg in &self.args {
            arg.encode(&mut buf);
        }
        buf
    }
}

/// Decoded results of a successful call, consumed in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    values: VecDeque<WireValue>,
    warning: Option<String>,
}

impl Reply {
    pub(crate) fn new(values: VecDeque<WireValue>, warning: Option<String>) -> Self {
        Self { values, warning }
    }

    /// Warning text when the station answered with a warning status.
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take the next value of any type.
    pub fn next_value(&mut self) -> Result<WireValue> {
        self.values.pop_front().ok_or_else(|| {
            ProtocolError::FramingMismatch {
                context: "result",
                detail: "no more results in reply".to_string(),
            }
            .into()
        })
    }

    pub fn next_int(&mut self) -> Result<i32> {
        self.next_value()?.into_int()
    }

    pub fn next_double(&mut self) -> Result<f64> {
        self.next_value()?.into_double()
    }

    pub fn next_line(&mut self) -> Result<String> {
        self.next_value()?.into_line()
    }

    /// Next item, `None` for the null handle.
    pub fn next_item(&mut self) -> Result<Option<ItemHandle>> {
        Ok(self.next_value()?.into_item()?.into_option())
    }

    pub fn next_array(&mut self) -> Result<Vec<f64>> {
        self.next_value()?.into_array()
    }

    pub fn next_pose(&mut self) -> Result<Pose> {
        self.next_value()?.into_pose()
    }

    pub fn next_matrix(&mut self) -> Result<Matrix2D> {
        self.next_value()?.into_matrix()
    }

    pub fn next_lines(&mut self) -> Result<Vec<String>> {
        self.next_value()?.into_lines()
    }

    pub fn next_items(&mut self) -> Result<Vec<ItemHandle>> {
        self.next_value()?.into_items()
    }
}
