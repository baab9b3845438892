use isles_protocol::UiUpdate;

/// Rendering and blocking dialogs supplied by whatever hosts the screens.
///
/// Dialog calls are synchronous: a command stops until the user answers.
pub trait Presenter {
    fn render(&mut self, update: UiUpdate);

    fn redirect(&mut self, path: &str);

    fn alert(&mut self, message: &str);

    fn confirm(&mut self, message: &str) -> bool;

    /// `None` when the user dismisses the prompt.
    fn prompt(&mut self, message: &str, default: &str) -> Option<String>;
}
