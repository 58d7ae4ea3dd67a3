/// Log levels ordered by severity
///
/// Lower values are more severe. Filtering compares against the configured
/// minimum level; Error always passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
    Verbose = 4,
}
