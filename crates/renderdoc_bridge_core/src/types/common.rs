use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque handle of a buffer, texture or shader, stable within one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ResourceId(pub u64);

impl ResourceId {
    pub const NULL: ResourceId = ResourceId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId::{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = String;

    /// Accepts `ResourceId::123` as well as a bare `123`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("ResourceId::").unwrap_or(trimmed);
        digits
            .trim()
            .parse::<u64>()
            .map(ResourceId)
            .map_err(|_| format!("invalid resource id '{s}'"))
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResourceIdVisitor;

        impl Visitor<'_> for ResourceIdVisitor {
            type Value = ResourceId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a resource id such as \"ResourceId::12\", \"12\" or 12")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ResourceId, E> {
                Ok(ResourceId(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ResourceId, E> {
                u64::try_from(v)
                    .map(ResourceId)
                    .map_err(|_| E::custom(format!("negative resource id {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ResourceId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ResourceIdVisitor)
    }
}

impl JsonSchema for ResourceId {
    fn schema_name() -> Cow<'static, str> {
        "ResourceId".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": ["string", "integer"],
            "minimum": 0,
            "description": "Resource id, e.g. \"ResourceId::12345\", \"12345\" or 12345"
        })
    }
}

/// A resource id with the debug name the capture supplied, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceRef {
    pub resource_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ResourceRef {
    pub fn new(resource_id: ResourceId, name: Option<String>) -> Self {
        Self { resource_id, name }
    }

    /// The debug name, or the printed id when the capture has none.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.resource_id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    #[serde(alias = "fragment")]
    Pixel,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
        ShaderStage::Compute,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Hull => "hull",
            Self::Domain => "domain",
            Self::Geometry => "geometry",
            Self::Pixel => "pixel",
            Self::Compute => "compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShaderStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vertex" => Ok(Self::Vertex),
            "hull" => Ok(Self::Hull),
            "domain" => Ok(Self::Domain),
            "geometry" => Ok(Self::Geometry),
            "pixel" | "fragment" => Ok(Self::Pixel),
            "compute" => Ok(Self::Compute),
            other => Err(format!("unknown shader stage '{other}'")),
        }
    }
}

bitflags! {
    /// What an event does, mirroring the debugger's action flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActionFlags: u32 {
        const CLEAR = 1 << 0;
        const DRAWCALL = 1 << 1;
        const DISPATCH = 1 << 2;
        const MESH_DISPATCH = 1 << 3;
        const CMD_LIST = 1 << 4;
        const SET_MARKER = 1 << 5;
        const PUSH_MARKER = 1 << 6;
        const POP_MARKER = 1 << 7;
        const PRESENT = 1 << 8;
        const MULTI_ACTION = 1 << 9;
        const COPY = 1 << 10;
        const RESOLVE = 1 << 11;
        const GEN_MIPS = 1 << 12;
        const PASS_BOUNDARY = 1 << 13;
        const INDEXED = 1 << 14;
        const INSTANCED = 1 << 15;
        const BEGIN_PASS = 1 << 16;
        const END_PASS = 1 << 17;
    }
}

const FLAG_LABELS: &[(&str, ActionFlags)] = &[
    ("Clear", ActionFlags::CLEAR),
    ("Drawcall", ActionFlags::DRAWCALL),
    ("Dispatch", ActionFlags::DISPATCH),
    ("MeshDispatch", ActionFlags::MESH_DISPATCH),
    ("CmdList", ActionFlags::CMD_LIST),
    ("SetMarker", ActionFlags::SET_MARKER),
    ("PushMarker", ActionFlags::PUSH_MARKER),
    ("PopMarker", ActionFlags::POP_MARKER),
    ("Present", ActionFlags::PRESENT),
    ("MultiAction", ActionFlags::MULTI_ACTION),
    ("Copy", ActionFlags::COPY),
    ("Resolve", ActionFlags::RESOLVE),
    ("GenMips", ActionFlags::GEN_MIPS),
    ("PassBoundary", ActionFlags::PASS_BOUNDARY),
    ("Indexed", ActionFlags::INDEXED),
    ("Instanced", ActionFlags::INSTANCED),
    ("BeginPass", ActionFlags::BEGIN_PASS),
    ("EndPass", ActionFlags::END_PASS),
];

impl ActionFlags {
    pub const MARKERS: Self = Self::SET_MARKER
        .union(Self::PUSH_MARKER)
        .union(Self::POP_MARKER);

    /// Flags that make an event a draw for reverse lookups.
    pub const DRAW_LIKE: Self = Self::DRAWCALL
        .union(Self::DISPATCH)
        .union(Self::MESH_DISPATCH);

    /// Wire labels of the set flags, in declaration order.
    pub fn names(self) -> Vec<&'static str> {
        FLAG_LABELS
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(label, _)| *label)
            .collect()
    }

    /// Parses one wire label, ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        FLAG_LABELS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(label))
            .map(|(_, flag)| *flag)
    }

    pub fn from_labels<I, S>(labels: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels.into_iter().try_fold(Self::empty(), |acc, label| {
            let label = label.as_ref();
            Self::from_label(label)
                .map(|flag| acc | flag)
                .ok_or_else(|| format!("unknown action flag '{label}'"))
        })
    }

    pub fn is_marker(self) -> bool {
        self.intersects(Self::MARKERS)
    }

    pub fn is_draw_like(self) -> bool {
        self.intersects(Self::DRAW_LIKE)
    }

    pub fn label_list() -> Vec<&'static str> {
        FLAG_LABELS.iter().map(|(label, _)| *label).collect()
    }
}

impl Serialize for ActionFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}

impl<'de> Deserialize<'de> for ActionFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FlagsVisitor;

        impl<'de> Visitor<'de> for FlagsVisitor {
            type Value = ActionFlags;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of action flag names")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ActionFlags, A::Error> {
                let mut flags = ActionFlags::empty();
                while let Some(label) = seq.next_element::<String>()? {
                    flags |= ActionFlags::from_label(&label).ok_or_else(|| {
                        de::Error::custom(format!("unknown action flag '{label}'"))
                    })?;
                }
                Ok(flags)
            }
        }

        deserializer.deserialize_seq(FlagsVisitor)
    }
}

impl JsonSchema for ActionFlags {
    fn schema_name() -> Cow<'static, str> {
        "ActionFlags".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "array",
            "items": { "type": "string", "enum": ActionFlags::label_list() }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum TextureDimension {
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMS,
    Texture2DMSArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

impl TextureDimension {
    pub fn is_3d(self) -> bool {
        matches!(self, Self::Texture3D)
    }

    pub fn is_cube(self) -> bool {
        matches!(self, Self::TextureCube | Self::TextureCubeArray)
    }
}

/// Cube faces in array-slice order.
pub const CUBE_FACES: [&str; 6] = ["X+", "X-", "Y+", "Y-", "Z+", "Z-"];
