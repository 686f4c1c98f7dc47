//! Remote object references.
//!
//! An [`ItemHandle`] is a foreign key into the station: a 64-bit id plus the
//! type tag the station reported when the handle was decoded. Handles are only
//! produced by decoding responses. The zero id means "no item" on the wire and
//! is surfaced as `Option<ItemHandle>` at the API boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Type tag of a station item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Any,
    Station,
    Robot,
    Frame,
    Tool,
    Object,
    Target,
    Curve,
    Program,
    Instruction,
    PythonScript,
    Machining,
    BallbarValidation,
    CalibProject,
    ValidProject,
    Folder,
    RobotArm,
    Camera,
    Generic,
    RobotAxes,
    Notes,
    /// A tag this client does not know about.
    Unknown(i32),
}

impl ItemType {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => ItemType::Any,
            1 => ItemType::Station,
            2 => ItemType::Robot,
            3 => ItemType::Frame,
            4 => ItemType::Tool,
            5 => ItemType::Object,
            6 => ItemType::Target,
            7 => ItemType::Curve,
            8 => ItemType::Program,
            9 => ItemType::Instruction,
            10 => ItemType::PythonScript,
            11 => ItemType::Machining,
            12 => ItemType::BallbarValidation,
            13 => ItemType::CalibProject,
            14 => ItemType::ValidProject,
            17 => ItemType::Folder,
            18 => ItemType::RobotArm,
            19 => ItemType::Camera,
            20 => ItemType::Generic,
            21 => ItemType::RobotAxes,
            22 => ItemType::Notes,
            other => ItemType::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ItemType::Any => -1,
            ItemType::Station => 1,
            ItemType::Robot => 2,
            ItemType::Frame => 3,
            ItemType::Tool => 4,
            ItemType::Object => 5,
            ItemType::Target => 6,
            ItemType::Curve => 7,
            ItemType::Program => 8,
            ItemType::Instruction => 9,
            ItemType::PythonScript => 10,
            ItemType::Machining => 11,
            ItemType::BallbarValidation => 12,
            ItemType::CalibProject => 13,
            ItemType::ValidProject => 14,
            ItemType::Folder => 17,
            ItemType::RobotArm => 18,
            ItemType::Camera => 19,
            ItemType::Generic => 20,
            ItemType::RobotAxes => 21,
            ItemType::Notes => 22,
            ItemType::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Unknown(code) => write!(f, "unknown({})", code),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Opaque handle to a station item.
///
/// Equality and hashing use the id only; the type tag is advisory. Handles
/// are serializable for output but never deserialized: only the station
/// mints them.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ItemHandle {
    id: u64,
    item_type: ItemType,
}

impl ItemHandle {
    /// Wire id of the absent item.
    pub const NULL_ID: u64 = 0;

    /// Rebuild a handle from its decoded wire parts.
    pub(crate) fn from_wire(id: u64, type_code: i32) -> Self {
        Self {
            id,
            item_type: ItemType::from_code(type_code),
        }
    }

    /// The explicit "no item" sentinel.
    pub fn null() -> Self {
        Self {
            id: Self::NULL_ID,
            item_type: ItemType::Any,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Type tag cached when the handle was decoded.
    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn is_valid(&self) -> bool {
        self.id != Self::NULL_ID
    }

    /// `None` for the null handle.
    pub fn into_option(self) -> Option<ItemHandle> {
        self.is_valid().then_some(self)
    }

    /// Wire id for an optional handle: absent items travel as id 0.
    pub fn wire_id(item: Option<&ItemHandle>) -> u64 {
        item.map(|i| i.id).unwrap_or(Self::NULL_ID)
    }
}

impl PartialEq for ItemHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ItemHandle {}

impl Hash for ItemHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:x}", self.item_type, self.id)
    }
}
