/// How the per-frame extraction loop is executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Processor {
    /// Frames are extracted one after another on the calling thread.
    #[default]
    CPU,
    /// Frames are extracted on a rayon pool. `threads == 0` uses the global
    /// pool, any other value builds a dedicated pool of that size.
    Parallel { threads: usize },
}
