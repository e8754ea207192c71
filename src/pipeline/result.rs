//! 流水线结果与面向宿主的状态码。

use super::{ErrorKind, PipelineError};
use crate::host::LayerId;

/// 单次调用的终态结果。失败消息已脱敏。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult {
    Success(LayerId),
    Cancelled,
    Failed(ErrorKind, String),
}

impl PipelineResult {
    pub fn failed(error: &PipelineError) -> Self {
        Self::Failed(error.kind(), error.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn layer(&self) -> Option<LayerId> {
        match self {
            Self::Success(layer) => Some(*layer),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed(kind, _) => Some(*kind),
            _ => None,
        }
    }
}

/// 宿主过程调用的三种返回状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStatus {
    Success,
    Cancelled,
    ExecutionError(String),
}

impl From<PipelineResult> for HostStatus {
    fn from(result: PipelineResult) -> Self {
        match result {
            PipelineResult::Success(_) => Self::Success,
            PipelineResult::Cancelled => Self::Cancelled,
            PipelineResult::Failed(_, message) => Self::ExecutionError(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_maps_to_execution_error() {
        let error = PipelineError::EmptyResult("响应中没有图片数据".to_string());
        let result = PipelineResult::failed(&error);

        assert_eq!(result.error_kind(), Some(ErrorKind::EmptyResult));
        assert_eq!(
            HostStatus::from(result),
            HostStatus::ExecutionError(error.to_string())
        );
        assert_eq!(HostStatus::from(PipelineResult::Cancelled), HostStatus::Cancelled);
        assert_eq!(
            HostStatus::from(PipelineResult::Success(LayerId(3))),
            HostStatus::Success
        );
    }
}
