//! 私有权限文件操作（目录 0700 / 文件 0600，仅 Unix 生效）

use std::path::Path;

use tokio::fs;

use crate::error::Result;

pub const PRIVATE_DIR_MODE: u32 = 0o700;
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// 确保目录存在；`private` 时收紧权限
pub async fn ensure_dir(path: &Path, private: bool) -> Result<()> {
    fs::create_dir_all(path).await?;
    if private {
        set_permissions(path, PRIVATE_DIR_MODE).await?;
    }
    Ok(())
}

/// 单次写入整个文件
pub async fn write_file(path: &Path, bytes: &[u8], private: bool) -> Result<()> {
    fs::write(path, bytes).await?;
    if private {
        set_permissions(path, PRIVATE_FILE_MODE).await?;
    }
    Ok(())
}

pub async fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}
