use crate::cache::AnalysisParams;

#[derive(Debug)]
pub enum AppCommand {
    /// Serve an analysis for a thread, from the cache when possible.
    Analyze(AnalysisParams),
}
