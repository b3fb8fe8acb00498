// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 图片不存在
    #[error("Image not found: {0}")]
    NotFound(String),
    /// 存储错误
    #[error("Storage error: {0}")]
    Other(String),
}

/// 图片存储特质
///
/// 商品图、参考图和生成结果都按键存取原始字节
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// 使用指定键保存图片
    async fn put_image(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// 根据键读取图片
    async fn get_image(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// 读取图片，不存在时返回 [`StorageError::NotFound`]
    async fn load_image(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get_image(key)
            .await?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
