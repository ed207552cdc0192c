//! UseCase 層のエラー型

use thiserror::Error;

/// 接続処理のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// 外部で検証済みのユーザー ID が付与されていない
    #[error("Authentication required")]
    MissingIdentity,
}
