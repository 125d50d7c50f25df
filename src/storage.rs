//! 持久化存储模块 - 按类别独立序列化的 JSON blob
//!
//! 存储位置：`~/.config/car-notify-mirror/`，每个类别一个文件。
//! 损坏或缺失的 blob 在加载时重置为空并告警，绝不让启动失败；
//! 写入走临时文件 + 原子重命名，并在目标文件上持有排他锁，
//! 避免并发进程交错出半截文件。

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// blob 文件名
pub mod blobs {
    pub const HISTORY: &str = "history.json";
    pub const ICONS: &str = "icons.json";
    pub const MIRROR_ENABLED: &str = "mirror_enabled.json";
    pub const FILTERS: &str = "filters.json";
    pub const DISABLED: &str = "disabled.json";
    pub const SETTINGS: &str = "settings.json";
}

/// 所有类别文件名（reset 用）
const ALL_BLOBS: [&str; 6] = [
    blobs::HISTORY,
    blobs::ICONS,
    blobs::MIRROR_ENABLED,
    blobs::FILTERS,
    blobs::DISABLED,
    blobs::SETTINGS,
];

/// 镜像配置与历史的键值存储
pub struct MirrorStorage {
    /// 数据目录
    base_dir: PathBuf,
    /// 写入串行化锁
    write_lock: Mutex<()>,
}

impl MirrorStorage {
    /// 默认存储位置
    pub fn new() -> Self {
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("car-notify-mirror");
        Self::with_base_dir(base_dir)
    }

    /// 指定存储目录（测试用）
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// 加载一个类别；缺失或损坏时重置为默认值
    pub fn load<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.blob_path(name);
        if !path.exists() {
            return T::default();
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(blob = %name, error = %e, "Failed to read storage blob, resetting to empty");
                return T::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!(blob = %name, error = %e, "Corrupt storage blob, resetting to empty");
                T::default()
            }
        }
    }

    /// 保存一个类别（排他锁 + 临时文件 + 原子重命名）
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        use fs2::FileExt;

        let _guard = self.write_lock.lock().unwrap();

        fs::create_dir_all(&self.base_dir)?;
        let path = self.blob_path(name);

        // 在目标文件上持锁，挡住其他进程的并发写
        let lock_file = OpenOptions::new().create(true).write(true).open(&path)?;
        lock_file.lock_exclusive()?;

        let content = serde_json::to_string_pretty(value)?;
        let temp_path = path.with_extension("json.tmp");
        {
            let mut temp_file = fs::File::create(&temp_path)?;
            temp_file.write_all(content.as_bytes())?;
        }
        fs::rename(&temp_path, &path)?;

        lock_file.unlock()?;
        debug!(blob = %name, bytes = content.len(), "Storage blob written");
        Ok(())
    }

    /// 清空全部持久化状态
    pub fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        for name in ALL_BLOBS {
            let path = self.blob_path(name);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

impl Default for MirrorStorage {
    fn default() -> Self {
        Self::new()
    }
}
