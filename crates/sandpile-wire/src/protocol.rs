//! Wire protocol for the sandpile simulator
//!
//! Every exchange is one command line from the client followed by exactly
//! one reply line from the server, both newline-terminated text.
//!
//! ## Grammar
//!
//! - Scalar lists are comma-joined: `3,0,-2`
//! - Tuple lists are space-joined groups of comma-joined fields:
//!   two edges `(0,1,5)` and `(1,0,2)` are `0,1,5 1,0,2`
//! - An empty reply line is an empty collection, never an error
//! - Mutating commands answer with the literal `done`; anything else is a
//!   server-side failure carried verbatim

use std::fmt;

use sandpile_core::{Position, Sand, VertexIndex, WeightedEdge};

use crate::error::{WireError, WireResult};

/// Default TCP port the simulator listens on
pub const DEFAULT_PORT: u16 = 7236;

/// Default host
pub const DEFAULT_HOST: &str = "localhost";

/// Acknowledgement literal for mutating commands
pub const ACK: &str = "done";

/// A server-computed distinguished configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialConfig {
    MaxStable,
    Identity,
    Burning,
    Dual,
}

impl SpecialConfig {
    pub const ALL: [SpecialConfig; 4] = [
        SpecialConfig::MaxStable,
        SpecialConfig::Identity,
        SpecialConfig::Burning,
        SpecialConfig::Dual,
    ];

    fn wire_name(&self) -> &'static str {
        match self {
            SpecialConfig::MaxStable => "max_stable",
            SpecialConfig::Identity => "identity",
            SpecialConfig::Burning => "burning",
            SpecialConfig::Dual => "dual",
        }
    }
}

impl fmt::Display for SpecialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Name of a configuration stored in the simulator's config manager
///
/// Must be non-empty and free of whitespace so it occupies exactly one
/// argument on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigName(String);

impl ConfigName {
    pub fn new(name: impl Into<String>) -> WireResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(WireError::InvalidArgument(
                "configuration name is empty".to_string(),
            ));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(WireError::InvalidArgument(format!(
                "configuration name {:?} contains whitespace",
                name
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every command the simulator understands
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Repaint,
    Update,
    Stabilize,
    DeleteGraph,
    ClearSand,

    GetVertices,
    GetVertex(VertexIndex),
    AddVertex(Position),
    AddVertices(Vec<Position>),

    GetEdges,
    AddEdge(WeightedEdge),
    AddEdges(Vec<WeightedEdge>),

    GetConfig,
    SetConfig(Vec<Sand>),
    AddConfig(Vec<Sand>),
    GetConfigNamed(ConfigName),

    GetSand(VertexIndex),
    SetSand(VertexIndex, Sand),
    AddSand(VertexIndex, Sand),
    AddRandomSand(Sand),

    GetUnstables,
    GetNumUnstables,
    GetSinks,
    GetNonsinks,
    GetSelected,
    IsSink(VertexIndex),

    SetTo(SpecialConfig),
    AddSpecial(SpecialConfig),
    GetSpecial(SpecialConfig),
}

impl Command {
    /// The command word as it appears on the wire
    pub fn name(&self) -> String {
        let name = match self {
            Command::Repaint => "repaint",
            Command::Update => "update",
            Command::Stabilize => "stabilize",
            Command::DeleteGraph => "delete_graph",
            Command::ClearSand => "clear_sand",
            Command::GetVertices => "get_vertices",
            Command::GetVertex(_) => "get_vertex",
            Command::AddVertex(_) => "add_vertex",
            Command::AddVertices(_) => "add_vertices",
            Command::GetEdges => "get_edges",
            Command::AddEdge(_) => "add_edge",
            Command::AddEdges(_) => "add_edges",
            Command::GetConfig | Command::GetConfigNamed(_) => "get_config",
            Command::SetConfig(_) => "set_config",
            Command::AddConfig(_) => "add_config",
            Command::GetSand(_) => "get_sand",
            Command::SetSand(..) => "set_sand",
            Command::AddSand(..) => "add_sand",
            Command::AddRandomSand(_) => "add_random_sand",
            Command::GetUnstables => "get_unstables",
            Command::GetNumUnstables => "get_num_unstables",
            Command::GetSinks => "get_sinks",
            Command::GetNonsinks => "get_nonsinks",
            Command::GetSelected => "get_selected",
            Command::IsSink(_) => "is_sink",
            Command::SetTo(kind) => return format!("set_to_{}", kind),
            Command::AddSpecial(kind) => return format!("add_to_{}", kind),
            Command::GetSpecial(kind) => return format!("get_{}", kind),
        };
        name.to_string()
    }

    /// Whether the server answers with the `done` acknowledgement
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Command::GetVertices
                | Command::GetVertex(_)
                | Command::GetEdges
                | Command::GetConfig
                | Command::GetConfigNamed(_)
                | Command::GetSand(_)
                | Command::GetUnstables
                | Command::GetNumUnstables
                | Command::GetSinks
                | Command::GetNonsinks
                | Command::GetSelected
                | Command::IsSink(_)
                | Command::GetSpecial(_)
        )
    }

    /// Serialize to a single command line, without the terminator
    pub fn encode(&self) -> String {
        let name = self.name();
        match self {
            Command::GetVertex(index) | Command::GetSand(index) | Command::IsSink(index) => {
                format!("{} {}", name, index)
            }
            Command::AddVertex(position) => format!("{} {} {}", name, position.x, position.y),
            Command::AddVertices(positions) => format!("{} {}", name, join_groups(positions)),
            Command::AddEdge(edge) => {
                format!("{} {} {} {}", name, edge.source, edge.target, edge.weight)
            }
            Command::AddEdges(edges) => format!("{} {}", name, join_groups(edges)),
            Command::SetConfig(config) | Command::AddConfig(config) => {
                format!("{} {}", name, join_scalars(config))
            }
            Command::GetConfigNamed(config_name) => format!("{} {}", name, config_name),
            Command::SetSand(index, amount) | Command::AddSand(index, amount) => {
                format!("{} {} {}", name, index, amount)
            }
            Command::AddRandomSand(amount) => format!("{} {}", name, amount),
            _ => name,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn join_scalars<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn join_groups<T: fmt::Display>(groups: &[T]) -> String {
    groups
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Reply grammar
// ============================================================================

/// Check a mutating command's reply
pub fn parse_ack(reply: &str) -> WireResult<()> {
    if reply == ACK {
        Ok(())
    } else {
        Err(WireError::Command(reply.to_string()))
    }
}

fn groups(reply: &str) -> impl Iterator<Item = &str> {
    reply.split(' ').filter(|group| !group.is_empty())
}

fn scalars(reply: &str) -> impl Iterator<Item = &str> {
    reply.split(',').map(str::trim).filter(|field| !field.is_empty())
}

fn fields<const N: usize>(group: &str) -> Option<[&str; N]> {
    let parts: Vec<&str> = group.split(',').collect();
    parts.try_into().ok()
}

/// `x,y`
pub fn parse_position(reply: &str) -> Option<Position> {
    let [x, y] = fields::<2>(reply.trim())?;
    Some(Position::new(x.parse().ok()?, y.parse().ok()?))
}

/// `x1,y1 x2,y2 ...`
pub fn parse_positions(reply: &str) -> Option<Vec<Position>> {
    groups(reply).map(parse_position).collect()
}

/// `s,d,w`
pub fn parse_edge(group: &str) -> Option<WeightedEdge> {
    let [source, target, weight] = fields::<3>(group)?;
    Some(WeightedEdge::new(
        source.parse().ok()?,
        target.parse().ok()?,
        weight.parse().ok()?,
    ))
}

/// `s1,d1,w1 s2,d2,w2 ...`
pub fn parse_edges(reply: &str) -> Option<Vec<WeightedEdge>> {
    groups(reply).map(parse_edge).collect()
}

/// `v1,v2,...` as sand amounts
pub fn parse_sand_vector(reply: &str) -> Option<Vec<Sand>> {
    scalars(reply).map(|field| field.parse().ok()).collect()
}

/// `i1,i2,...` as vertex indices
pub fn parse_indices(reply: &str) -> Option<Vec<VertexIndex>> {
    scalars(reply).map(|field| field.parse().ok()).collect()
}

/// A single integer
pub fn parse_int(reply: &str) -> Option<Sand> {
    reply.trim().parse().ok()
}

/// A single count
pub fn parse_count(reply: &str) -> Option<usize> {
    reply.trim().parse().ok()
}

/// `true` / `false`
pub fn parse_bool(reply: &str) -> Option<bool> {
    match reply.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
