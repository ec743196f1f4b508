use serde::{Deserialize, Serialize};

/// Ping value of a record that has not been measured yet.
pub const PING_UNMEASURED: u32 = 0;

/// Ping value of a server that did not answer the probe.
///
/// Deliberately large so offline servers sort after every reachable one.
/// The master list API reports offline servers with the same value.
pub const PING_OFFLINE: u32 = 99999;

/// A mod required by a server, identified by its Steam Workshop id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModEntry {
    pub workshop_id: u64,
    pub name: String,
}

impl ModEntry {
    pub fn new(workshop_id: u64, name: impl Into<String>) -> Self {
        Self {
            workshop_id,
            name: name.into(),
        }
    }
}

/// A game server known to the launcher.
///
/// `addr` is the query address (`host:port`) and the identity of the record.
/// `game_port` is the port players connect to, which is usually different
/// from the query port embedded in `addr`.
///
/// The serialized layout matches the favorites blob written by earlier
/// launcher versions, so existing favorites keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub addr: String,
    pub name: String,
    #[serde(default)]
    pub game_port: u16,
    #[serde(default)]
    pub ping: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_list: Option<Vec<ModEntry>>,
}

impl ServerRecord {
    pub fn new(addr: impl Into<String>, name: impl Into<String>, game_port: u16) -> Self {
        Self {
            addr: addr.into(),
            name: name.into(),
            game_port,
            ping: PING_UNMEASURED,
            mod_list: None,
        }
    }

    pub fn with_ping(mut self, ping: u32) -> Self {
        self.ping = ping;
        self
    }

    pub fn with_mods(mut self, mods: Vec<ModEntry>) -> Self {
        self.mod_list = Some(mods);
        self
    }

    /// Records are the same server when their addresses match.
    pub fn same_server(&self, other: &ServerRecord) -> bool {
        self.addr == other.addr
    }

    pub fn is_ping_measured(&self) -> bool {
        self.ping != PING_UNMEASURED
    }

    pub fn is_offline(&self) -> bool {
        self.ping == PING_OFFLINE
    }

    pub fn has_mod_requirements(&self) -> bool {
        self.mod_list.as_ref().is_some_and(|mods| !mods.is_empty())
    }

    /// Workshop ids of every required mod, in mod list order.
    pub fn required_workshop_ids(&self) -> Vec<u64> {
        self.mod_list
            .iter()
            .flatten()
            .map(|m| m.workshop_id)
            .collect()
    }

    /// Display name of a required mod, if the server lists it.
    pub fn mod_name(&self, workshop_id: u64) -> Option<&str> {
        self.mod_list
            .iter()
            .flatten()
            .find(|m| m.workshop_id == workshop_id)
            .map(|m| m.name.as_str())
    }

    /// Host part of `addr` (everything before the last `:`).
    pub fn host(&self) -> &str {
        match self.addr.rsplit_once(':') {
            Some((host, _)) => host,
            None => &self.addr,
        }
    }

    /// Address players connect to: the query host with the game port.
    pub fn connect_address(&self) -> String {
        format!("{}:{}", self.host(), self.game_port)
    }
}

/// Latency bucket used to color a measured ping.
///
/// Every bucket includes its upper bound, so 25 is `Excellent` and 50 is
/// `Good`. Offline and unmeasured pings are not classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LatencyClass {
    Excellent,
    Good,
    Fair,
    Mediocre,
    Poor,
    Bad,
    VeryBad,
}

impl LatencyClass {
    pub fn from_ping(ping: u32) -> Option<Self> {
        let class = match ping {
            PING_UNMEASURED | PING_OFFLINE => return None,
            1..=25 => Self::Excellent,
            26..=50 => Self::Good,
            51..=100 => Self::Fair,
            101..=150 => Self::Mediocre,
            151..=200 => Self::Poor,
            201..=250 => Self::Bad,
            _ => Self::VeryBad,
        };
        Some(class)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Mediocre => "mediocre",
            Self::Poor => "poor",
            Self::Bad => "bad",
            Self::VeryBad => "very bad",
        }
    }
}
