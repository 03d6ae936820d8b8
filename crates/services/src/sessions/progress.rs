/// How far a quiz run has come, in view-ready numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    /// Questions in the session.
    pub total: usize,
    /// Questions confirmed so far.
    pub answered: usize,
    /// Questions not yet passed.
    pub remaining: usize,
    pub is_complete: bool,
}
