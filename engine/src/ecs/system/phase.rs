/// Execution phase for a periodic (column) system (§4.5, §6).
///
/// `Manual` systems are never walked by the scheduler; they only run when a
/// caller explicitly asks the world to run them on demand (the spec's
/// `on_demand` phase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    OnLoad,
    PostLoad,
    PreUpdate,
    OnUpdate,
    OnValidate,
    PostUpdate,
    PreStore,
    OnStore,
    Manual,
}

impl Phase {
    /// All phases the scheduler walks each frame, in order. `Manual` is
    /// deliberately excluded.
    pub const ORDER: [Phase; 8] = [
        Phase::OnLoad,
        Phase::PostLoad,
        Phase::PreUpdate,
        Phase::OnUpdate,
        Phase::OnValidate,
        Phase::PostUpdate,
        Phase::PreStore,
        Phase::OnStore,
    ];
}

/// The reactive trigger a row system fires on (§4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    OnAdd,
    OnRemove,
    OnSet,
}
