use deltagen::models::confirmation::DispatchResult;
use deltagen::models::status::Summary;

/// Receives what a send or render run reports, already translated for display.
pub trait ProgressSink {
    fn progress(&mut self, percent: u8);
    fn status(&mut self, status: &str);
    /// Remaining render time as `HH:MM:SS`, refreshed every poll tick of a render run.
    fn eta(&mut self, remaining: &str) {
        self.status(&format!("ETA {remaining}"));
    }
    /// Per variant confirmation, to colour the matching tree item.
    fn highlight(&mut self, result: &DispatchResult);
    fn finished(&mut self, summary: &Summary, message: &str);
}
