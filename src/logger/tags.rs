/// Log tags, one per cache subsystem

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Cache,
    Store,
    Remote,
    Live,
}

impl LogTag {
    /// Suffix used by `--debug-<key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Cache => "cache",
            LogTag::Store => "store",
            LogTag::Remote => "remote",
            LogTag::Live => "live",
        }
        .to_string()
    }

    /// Uncolored label for file output
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Cache => "CACHE",
            LogTag::Store => "STORE",
            LogTag::Remote => "REMOTE",
            LogTag::Live => "LIVE",
        }
    }
}
