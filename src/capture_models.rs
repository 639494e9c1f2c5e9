// src/capture_models.rs

pub const DEFAULT_NAME: &str = "UNKNOWN";
pub const DEFAULT_REFDES_PREFIX: &str = "U";

/// One component as read from a Capture XML `<Package>`.
///
/// Built once per conversion by the importer and never mutated afterwards;
/// every ordering the encoders rely on is fixed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDefinition {
    pub name: String,
    pub pcb_footprint: String,
    pub refdes_prefix: String,
    pub user_props: Vec<UserProp>,
    pub symbol_bbox: BBox,
    pub lines: Vec<LineSegment>,
    pub pins: Vec<Pin>,
    pub pin_numbers: Vec<PinNumber>,
}

impl Default for ComponentDefinition {
    fn default() -> Self {
        ComponentDefinition {
            name: DEFAULT_NAME.to_string(),
            pcb_footprint: String::new(),
            refdes_prefix: DEFAULT_REFDES_PREFIX.to_string(),
            user_props: Vec::new(),
            symbol_bbox: BBox::default(),
            lines: Vec::new(),
            pins: Vec::new(),
            pin_numbers: Vec::new(),
        }
    }
}

impl ComponentDefinition {
    /// Looks up a user property by key.
    pub fn user_prop(&self, key: &str) -> Option<&str> {
        self.user_props
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProp {
    pub key: String,
    pub value: String,
}

/// Symbol outline bounding box (x1, y1) - (x2, y2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Default for BBox {
    fn default() -> Self {
        BBox {
            x1: 0,
            y1: 0,
            x2: 100,
            y2: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// A logical symbol pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    pub name: String,
    pub position: u32,
    pub hotpt_x: i32, // electrical connection point
    pub hotpt_y: i32,
    pub start_x: i32, // visual stub start
    pub start_y: i32,
    pub pin_type: u32,
    pub visible: bool,
    pub is_clock: bool,
    pub is_dot: bool,
    pub is_long: bool,
}

impl Default for Pin {
    fn default() -> Self {
        Pin {
            name: String::new(),
            position: 0,
            hotpt_x: 0,
            hotpt_y: 0,
            start_x: 0,
            start_y: 0,
            pin_type: 0,
            visible: true,
            is_clock: false,
            is_dot: false,
            is_long: false,
        }
    }
}

/// A physical pad, linked to a symbol pin through `position`.
/// Several pads may share one position (ganged grounds).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PinNumber {
    pub number: String,
    pub position: u32,
}
