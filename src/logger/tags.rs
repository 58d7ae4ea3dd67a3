/// Log tags identifying the subsystem a message comes from
///
/// Each tag maps to a `--debug <module>` command-line flag so diagnostics can
/// be enabled per subsystem without flooding the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Classifier,
    Ledger,
    Chain,
    Detector,
    Batch,
    Realtime,
    Rpc,
    Database,
    Websocket,
}

impl LogTag {
    /// Plain uppercase tag name for console and file output
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Classifier => "CLASSIFY",
            LogTag::Ledger => "LEDGER",
            LogTag::Chain => "CHAIN",
            LogTag::Detector => "DETECTOR",
            LogTag::Batch => "BATCH",
            LogTag::Realtime => "REALTIME",
            LogTag::Rpc => "RPC",
            LogTag::Database => "DATABASE",
            LogTag::Websocket => "WEBSOCKET",
        }
    }

    /// Key used for `--debug <module>` flag matching
    pub fn to_debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Classifier => "classifier",
            LogTag::Ledger => "ledger",
            LogTag::Chain => "chain",
            LogTag::Detector => "detector",
            LogTag::Batch => "batch",
            LogTag::Realtime => "realtime",
            LogTag::Rpc => "rpc",
            LogTag::Database => "database",
            LogTag::Websocket => "websocket",
        }
    }
}
