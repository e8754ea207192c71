//! # 流水线状态机
//!
//! ```text
//! Idle → Validating → CapturingInput（仅图生图）→ Requesting → Decoding → Materializing → Done
//! ```
//!
//! 终态只有 `Done(Success | Failed | Cancelled)` 三种；取消只可能发生在 `Idle`。
//! `Materializing` 之前的状态都不写宿主文档。

/// 终态结局。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminal {
    Success,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    Validating,
    CapturingInput,
    Requesting,
    Decoding,
    Materializing,
    Done(Terminal),
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::CapturingInput => "capturing_input",
            Self::Requesting => "requesting",
            Self::Decoding => "decoding",
            Self::Materializing => "materializing",
            Self::Done(Terminal::Success) => "done(success)",
            Self::Done(Terminal::Failed) => "done(failed)",
            Self::Done(Terminal::Cancelled) => "done(cancelled)",
        }
    }

    /// 合法迁移表。
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;

        match (self, next) {
            (Idle, Validating) | (Idle, Done(Terminal::Cancelled)) => true,
            (Validating, CapturingInput) | (Validating, Requesting) => true,
            (CapturingInput, Requesting) => true,
            (Requesting, Decoding) => true,
            (Decoding, Materializing) => true,
            (Materializing, Done(Terminal::Success)) => true,
            (Validating | CapturingInput | Requesting | Decoding | Materializing, Done(Terminal::Failed)) => {
                true
            }
            _ => false,
        }
    }
}
