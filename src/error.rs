//! 网格编解码与分割相关的错误类型

use std::io;

use thiserror::Error;

/// 网格读写过程中可能出现的错误
#[derive(Debug, Error)]
pub enum GridError {
    /// 头部或记录结构无效，或无法判定字节序
    #[error("格式错误: {message}")]
    Format {
        /// 错误描述
        message: String,
    },

    /// 输入字节数少于记录声明的长度
    #[error("输入被截断: 读取 {record} 记录时数据不足")]
    Truncated {
        /// 正在读取的记录名称
        record: &'static str,
    },

    /// 调用方提供的网格违反数据模型约束
    #[error("网格数据不一致: {message}")]
    Consistency {
        /// 错误描述
        message: String,
    },

    /// 打开、读取或写入文件失败
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),
}

impl GridError {
    pub fn format(message: impl Into<String>) -> Self {
        GridError::Format {
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        GridError::Consistency {
            message: message.into(),
        }
    }

    /// 将读取记录时的 I/O 错误归类：数据不足视为截断，其余保持为 I/O 错误
    pub(crate) fn reading(record: &'static str) -> impl Fn(io::Error) -> GridError {
        move |err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                GridError::Truncated { record }
            } else {
                GridError::Io(err)
            }
        }
    }
}

/// 网格操作的 Result 别名
pub type Result<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_maps_eof_to_truncated() {
        let err = GridError::reading("size")(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, GridError::Truncated { record: "size" }));

        let err = GridError::reading("size")(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, GridError::Io(_)));
    }

    #[test]
    fn test_error_display() {
        let err = GridError::format("svType 无效");
        assert!(err.to_string().contains("svType 无效"));

        let err = GridError::Truncated { record: "payload" };
        assert!(err.to_string().contains("payload"));
    }
}
