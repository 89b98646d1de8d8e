use std::fmt;

/// 分发器状态机
///
/// `Idle → Launching → AwaitingContentLoad → Rendering → Finalizing → {Done | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchState {
    Idle,
    Launching,
    AwaitingContentLoad,
    Rendering,
    Finalizing,
    Done,
    Failed,
}

impl DispatchState {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Done | DispatchState::Failed)
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Idle => "Idle",
            DispatchState::Launching => "Launching",
            DispatchState::AwaitingContentLoad => "AwaitingContentLoad",
            DispatchState::Rendering => "Rendering",
            DispatchState::Finalizing => "Finalizing",
            DispatchState::Done => "Done",
            DispatchState::Failed => "Failed",
        };
        f.write_str(name)
    }
}
