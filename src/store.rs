//! 记录存储模块 - 分区化通知历史与按应用配置
//!
//! 进程级单例，宿主回调线程和 UI 线程并发读写：每张表一把锁，
//! 每次变更后同步持久化。持久化失败只告警，内存状态照常前进，
//! 下一次变更自然重试。

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::filter::FilterPattern;
use crate::profile::{partition_key, ProfileKind};
use crate::record::NotificationRecord;
use crate::storage::{blobs, MirrorStorage};

/// 每个分区默认保留的历史条数
const DEFAULT_MAX_RECORDS: usize = 20;

/// 一个分区的过滤规则（包含 / 排除）
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FilterLists {
    #[serde(default)]
    pub include: Vec<FilterPattern>,
    #[serde(default)]
    pub exclude: Vec<FilterPattern>,
}

/// 全局设置
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Settings {
    /// 只在连上车机时镜像
    pub connected_only: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { connected_only: true }
    }
}

/// 组装出来的按应用配置；缺失配置等价于全部默认值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppProfileConfig {
    pub mirror_enabled: bool,
    pub include: Vec<FilterPattern>,
    pub exclude: Vec<FilterPattern>,
    pub disabled: bool,
}

/// `list_apps` 返回的一个分区
#[derive(Debug, Clone, serde::Serialize)]
pub struct AppPartition {
    pub package: String,
    pub profile: ProfileKind,
    pub label: String,
    pub mirror_enabled: bool,
    pub disabled: bool,
    pub records: Vec<NotificationRecord>,
}

/// 通知记录存储
pub struct RecordStore {
    storage: MirrorStorage,
    max_records: usize,
    history: Mutex<HashMap<String, Vec<NotificationRecord>>>,
    icons: Mutex<HashMap<String, String>>,
    mirror_enabled: Mutex<HashSet<String>>,
    filters: Mutex<HashMap<String, FilterLists>>,
    disabled: Mutex<HashSet<String>>,
    settings: Mutex<Settings>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::with_storage(MirrorStorage::new())
    }

    /// 从指定存储加载全部类别
    pub fn with_storage(storage: MirrorStorage) -> Self {
        let history = storage.load(blobs::HISTORY);
        let icons = storage.load(blobs::ICONS);
        let mirror_enabled = storage.load(blobs::MIRROR_ENABLED);
        let filters = storage.load(blobs::FILTERS);
        let disabled = storage.load(blobs::DISABLED);
        let settings = storage.load(blobs::SETTINGS);
        Self {
            storage,
            max_records: DEFAULT_MAX_RECORDS,
            history: Mutex::new(history),
            icons: Mutex::new(icons),
            mirror_enabled: Mutex::new(mirror_enabled),
            filters: Mutex::new(filters),
            disabled: Mutex::new(disabled),
            settings: Mutex::new(settings),
        }
    }

    /// 创建用于测试的存储
    pub fn new_for_test(dir: PathBuf) -> Self {
        Self::with_storage(MirrorStorage::with_base_dir(dir))
    }

    /// 设置分区历史上限（链式调用）
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    // ==================== 历史记录 ====================

    /// 添加一条记录：校验、去重、头插、截断、持久化
    ///
    /// 同分区里键相同或标题正文都相同的旧记录会被顶掉，
    /// 吸收复用键的应用和换键重发相同内容的应用。
    pub fn add(&self, record: NotificationRecord) -> bool {
        if !record.is_valid() {
            debug!(key = %record.key, posted_at = record.posted_at, "Rejected invalid record");
            return false;
        }

        let pk = record.partition_key();
        {
            let mut history = self.history.lock().unwrap();
            let partition = history.entry(pk).or_default();
            partition.retain(|r| r.key != record.key && !r.same_content(&record));
            partition.insert(0, record);
            partition.truncate(self.max_records);
        }
        self.persist_history();
        true
    }

    /// 某分区的记录（最新在前）
    pub fn records(&self, package: &str, profile: ProfileKind) -> Vec<NotificationRecord> {
        let history = self.history.lock().unwrap();
        history
            .get(&partition_key(package, profile))
            .cloned()
            .unwrap_or_default()
    }

    /// 列出全部分区：镜像开启的在前，其余按应用名排序
    pub fn list_apps(&self, include_disabled: bool) -> Vec<AppPartition> {
        let history = self.history.lock().unwrap().clone();
        let enabled = self.mirror_enabled.lock().unwrap().clone();
        let disabled = self.disabled.lock().unwrap().clone();

        let mut partitions: Vec<AppPartition> = history
            .into_iter()
            .filter_map(|(pk, records)| {
                let first = records.first()?;
                Some(AppPartition {
                    package: first.package.clone(),
                    profile: first.profile,
                    label: first.app_label.clone(),
                    mirror_enabled: enabled.contains(&pk),
                    disabled: disabled.contains(&pk),
                    records,
                })
            })
            .filter(|p| include_disabled || !p.disabled)
            .collect();

        partitions.sort_by(|a, b| {
            b.mirror_enabled
                .cmp(&a.mirror_enabled)
                .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
        });
        partitions
    }

    /// 删除一条记录；分区清空时整个分区移除
    pub fn remove(&self, package: &str, profile: ProfileKind, key: &str) -> bool {
        let pk = partition_key(package, profile);
        let removed = {
            let mut history = self.history.lock().unwrap();
            match history.get_mut(&pk) {
                Some(partition) => {
                    let before = partition.len();
                    partition.retain(|r| r.key != key);
                    let removed = partition.len() < before;
                    if partition.is_empty() {
                        history.remove(&pk);
                    }
                    removed
                }
                None => false,
            }
        };
        if removed {
            self.persist_history();
        }
        removed
    }

    /// 移除整个分区及其图标缓存
    pub fn remove_app(&self, package: &str, profile: ProfileKind) {
        let pk = partition_key(package, profile);
        self.history.lock().unwrap().remove(&pk);
        self.icons.lock().unwrap().remove(&pk);
        self.persist_history();
        self.persist_icons();
    }

    // ==================== 配置 ====================

    /// 读取组装好的配置；不存在即全默认（惰性 get-or-create）
    pub fn config(&self, package: &str, profile: ProfileKind) -> AppProfileConfig {
        let pk = partition_key(package, profile);
        let filters = self
            .filters
            .lock()
            .unwrap()
            .get(&pk)
            .cloned()
            .unwrap_or_default();
        AppProfileConfig {
            mirror_enabled: self.mirror_enabled.lock().unwrap().contains(&pk),
            include: filters.include,
            exclude: filters.exclude,
            disabled: self.disabled.lock().unwrap().contains(&pk),
        }
    }

    pub fn set_mirror_enabled(&self, package: &str, profile: ProfileKind, enabled: bool) {
        let pk = partition_key(package, profile);
        {
            let mut set = self.mirror_enabled.lock().unwrap();
            if enabled {
                set.insert(pk);
            } else {
                set.remove(&pk);
            }
        }
        self.persist_mirror_enabled();
    }

    pub fn set_disabled(&self, package: &str, profile: ProfileKind) {
        let pk = partition_key(package, profile);
        self.disabled.lock().unwrap().insert(pk);
        self.persist_disabled();
    }

    pub fn set_enabled(&self, package: &str, profile: ProfileKind) {
        let pk = partition_key(package, profile);
        self.disabled.lock().unwrap().remove(&pk);
        self.persist_disabled();
    }

    pub fn set_filters(
        &self,
        package: &str,
        profile: ProfileKind,
        include: Vec<FilterPattern>,
        exclude: Vec<FilterPattern>,
    ) {
        let pk = partition_key(package, profile);
        self.filters
            .lock()
            .unwrap()
            .insert(pk, FilterLists { include, exclude });
        self.persist_filters();
    }

    // ==================== 图标缓存 ====================

    pub fn icon(&self, package: &str, profile: ProfileKind) -> Option<String> {
        self.icons
            .lock()
            .unwrap()
            .get(&partition_key(package, profile))
            .cloned()
    }

    pub fn set_icon(&self, package: &str, profile: ProfileKind, icon: impl Into<String>) {
        self.icons
            .lock()
            .unwrap()
            .insert(partition_key(package, profile), icon.into());
        self.persist_icons();
    }

    // ==================== 全局设置 ====================

    pub fn settings(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    pub fn set_connected_only(&self, connected_only: bool) {
        self.settings.lock().unwrap().connected_only = connected_only;
        self.persist_settings();
    }

    /// 清空全部状态（内存 + 磁盘）
    pub fn reset(&self) {
        self.history.lock().unwrap().clear();
        self.icons.lock().unwrap().clear();
        self.mirror_enabled.lock().unwrap().clear();
        self.filters.lock().unwrap().clear();
        self.disabled.lock().unwrap().clear();
        *self.settings.lock().unwrap() = Settings::default();
        if let Err(e) = self.storage.reset() {
            warn!(error = %e, "Failed to reset storage");
        }
    }

    // ==================== 持久化 ====================

    fn persist_history(&self) {
        let snapshot = self.history.lock().unwrap().clone();
        if let Err(e) = self.storage.save(blobs::HISTORY, &snapshot) {
            warn!(error = %e, "Failed to persist history, keeping in-memory state");
        }
    }

    fn persist_icons(&self) {
        let snapshot = self.icons.lock().unwrap().clone();
        if let Err(e) = self.storage.save(blobs::ICONS, &snapshot) {
            warn!(error = %e, "Failed to persist icon cache, keeping in-memory state");
        }
    }

    fn persist_mirror_enabled(&self) {
        let snapshot = self.mirror_enabled.lock().unwrap().clone();
        if let Err(e) = self.storage.save(blobs::MIRROR_ENABLED, &snapshot) {
            warn!(error = %e, "Failed to persist mirror-enabled set, keeping in-memory state");
        }
    }

    fn persist_filters(&self) {
        let snapshot = self.filters.lock().unwrap().clone();
        if let Err(e) = self.storage.save(blobs::FILTERS, &snapshot) {
            warn!(error = %e, "Failed to persist filters, keeping in-memory state");
        }
    }

    fn persist_disabled(&self) {
        let snapshot = self.disabled.lock().unwrap().clone();
        if let Err(e) = self.storage.save(blobs::DISABLED, &snapshot) {
            warn!(error = %e, "Failed to persist disabled set, keeping in-memory state");
        }
    }

    fn persist_settings(&self) {
        let snapshot = self.settings.lock().unwrap().clone();
        if let Err(e) = self.storage.save(blobs::SETTINGS, &snapshot) {
            warn!(error = %e, "Failed to persist settings, keeping in-memory state");
        }
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
