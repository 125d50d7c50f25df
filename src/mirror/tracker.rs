//! 镜像关系追踪器 - 原始通知与合成镜像之间的活动映射
//!
//! 进程生命周期内的纯内存状态，不落盘。宿主的活动通知集合才是最终事实，
//! 重连时通过 `prune_stale` 对账自愈。
//!
//! ## 映射不变量
//! 1. `key_to_mirror` 中的每个键必须出现在对应 `mirror_to_keys` 集合里
//! 2. 镜像 id 只在仍有原始键或手动注册指向它时保留
//! 3. 指纹条目随其镜像 id 一起清除
//!
//! ## 折叠规则
//! - 线程化内容（源应用在一条通知里累积多条消息）按内容指纹折叠，
//!   多个原始键共享一个镜像
//! - 单条式内容每个原始键独立成镜，内容相同也绝不合并
//!
//! 所有变更在一把锁内完成，check-and-create 原子化；追踪器从不直接调用
//! 宿主，取消/发布指令通过返回值交给调度器执行。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

use super::action::ActionTarget;
use super::fingerprint::content_fingerprint;
use crate::profile::{partition_key, ProfileKind};

/// 镜像 id 起始值，避开宿主分配的小数值通知 id
pub const MIRROR_ID_BASE: i32 = 1_000_000;

/// 追踪器内部状态（整体在一把锁下）
#[derive(Debug, Default)]
struct TrackerState {
    /// 原始键 -> 镜像 id
    key_to_mirror: HashMap<String, i32>,
    /// 镜像 id -> 折叠进来的原始键集合
    mirror_to_keys: HashMap<i32, HashSet<String>>,
    /// 内容指纹 -> 镜像 id（仅线程化内容）
    fingerprint_to_mirror: HashMap<String, i32>,
    /// (应用|profile) -> 手动镜像 id
    manual_by_app_profile: HashMap<String, i32>,
    /// 镜像 id -> 原始动作目标列表（按声明顺序）
    mirror_actions: HashMap<i32, Vec<ActionTarget>>,
}

impl TrackerState {
    /// 清除一个镜像 id 在所有映射中的痕迹
    fn purge_mirror(&mut self, mirror_id: i32) {
        if let Some(keys) = self.mirror_to_keys.remove(&mirror_id) {
            for key in keys {
                self.key_to_mirror.remove(&key);
            }
        }
        self.fingerprint_to_mirror.retain(|_, id| *id != mirror_id);
        self.manual_by_app_profile.retain(|_, id| *id != mirror_id);
        self.mirror_actions.remove(&mirror_id);
    }

    /// 释放某个原始键之前指向的镜像；返回因此成为孤儿而需取消的镜像 id
    fn release_key(&mut self, key: &str, keep: Option<i32>) -> Option<i32> {
        let old = *self.key_to_mirror.get(key)?;
        if Some(old) == keep {
            return None;
        }
        self.key_to_mirror.remove(key);
        let now_empty = match self.mirror_to_keys.get_mut(&old) {
            Some(set) => {
                set.remove(key);
                set.is_empty()
            }
            None => false,
        };
        if now_empty && !self.is_manual(old) {
            self.purge_mirror(old);
            Some(old)
        } else {
            None
        }
    }

    fn is_manual(&self, mirror_id: i32) -> bool {
        self.manual_by_app_profile.values().any(|id| *id == mirror_id)
    }
}

/// 事件驱动镜像的解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// 解析到的镜像 id
    pub mirror_id: i32,
    /// 是否新建（折叠到已有镜像时为 false，调度器不重复发布）
    pub created: bool,
    /// 因键复用被顶替、需要取消的旧镜像
    pub displaced: Option<i32>,
}

/// 手动镜像的解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct ManualResolution {
    pub mirror_id: i32,
    /// 被替换、需要取消的上一个手动镜像
    pub replaced: Option<i32>,
}

/// 镜像关系追踪器
pub struct MirrorTracker {
    state: Mutex<TrackerState>,
    next_id: AtomicI32,
}

impl MirrorTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            next_id: AtomicI32::new(MIRROR_ID_BASE),
        }
    }

    fn allocate_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 核心操作：为到来的通知解析出镜像 id（原子的 check-and-create）
    ///
    /// 线程化内容先查指纹表，命中则把新键折叠到已有镜像；否则分配新 id。
    /// 注册键关系之前先释放该键之前指向的镜像，防止键被复用后状态错乱。
    pub fn resolve_or_create(
        &self,
        package: &str,
        profile: ProfileKind,
        title: Option<&str>,
        text: Option<&str>,
        key: &str,
        threaded: bool,
    ) -> Resolution {
        let fp = threaded.then(|| content_fingerprint(package, profile, title, text));
        let mut state = self.state.lock().unwrap();

        if let Some(fp) = &fp {
            if let Some(&existing) = state.fingerprint_to_mirror.get(fp) {
                let displaced = state.release_key(key, Some(existing));
                state.key_to_mirror.insert(key.to_string(), existing);
                state
                    .mirror_to_keys
                    .entry(existing)
                    .or_default()
                    .insert(key.to_string());
                debug!(key = %key, mirror_id = existing, "Folded threaded notification onto existing mirror");
                return Resolution {
                    mirror_id: existing,
                    created: false,
                    displaced,
                };
            }
        }

        let mirror_id = self.allocate_id();
        let displaced = state.release_key(key, None);
        state.key_to_mirror.insert(key.to_string(), mirror_id);
        state
            .mirror_to_keys
            .entry(mirror_id)
            .or_default()
            .insert(key.to_string());
        if let Some(fp) = fp {
            state.fingerprint_to_mirror.insert(fp, mirror_id);
        }
        debug!(key = %key, mirror_id, threaded, "Created mirror registration");
        Resolution {
            mirror_id,
            created: true,
            displaced,
        }
    }

    /// 手动镜像：同一 (应用, profile) 只保留一个，总是替换，从不折叠
    pub fn resolve_or_create_manual(&self, package: &str, profile: ProfileKind) -> ManualResolution {
        let pk = partition_key(package, profile);
        let mut state = self.state.lock().unwrap();

        let replaced = state.manual_by_app_profile.remove(&pk);
        if let Some(old) = replaced {
            state.purge_mirror(old);
        }

        let mirror_id = self.allocate_id();
        state.manual_by_app_profile.insert(pk, mirror_id);
        state.mirror_to_keys.entry(mirror_id).or_default();
        info!(package = %package, profile = %profile, mirror_id, "Registered manual mirror");
        ManualResolution { mirror_id, replaced }
    }

    /// 记录镜像对应的原始动作目标（覆盖旧列表）
    pub fn register_actions(&self, mirror_id: i32, actions: Vec<ActionTarget>) {
        let mut state = self.state.lock().unwrap();
        if state.mirror_to_keys.contains_key(&mirror_id) {
            state.mirror_actions.insert(mirror_id, actions);
        }
    }

    /// 按序号取出某个镜像的原始动作目标
    pub fn action(&self, mirror_id: i32, index: usize) -> Option<ActionTarget> {
        let state = self.state.lock().unwrap();
        state.mirror_actions.get(&mirror_id)?.get(index).cloned()
    }

    /// 原始通知被移除：摘掉这个键；镜像失去最后一个键时返回它以便取消
    ///
    /// 对未知键安全无副作用（宿主可能乱序或重复投递移除事件）。
    pub fn on_original_removed(&self, key: &str) -> Option<i32> {
        let mut state = self.state.lock().unwrap();
        let mirror_id = state.key_to_mirror.remove(key)?;
        let now_empty = match state.mirror_to_keys.get_mut(&mirror_id) {
            Some(set) => {
                set.remove(key);
                set.is_empty()
            }
            None => false,
        };
        if now_empty && !state.is_manual(mirror_id) {
            state.purge_mirror(mirror_id);
            debug!(key = %key, mirror_id, "Last original removed, mirror orphaned");
            Some(mirror_id)
        } else {
            None
        }
    }

    /// 用户关掉了镜像：返回仍注册在它名下的全部原始键用于级联取消，
    /// 并清除该镜像的所有条目
    pub fn on_mirror_dismissed(&self, mirror_id: i32) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        let mut keys: Vec<String> = state
            .mirror_to_keys
            .get(&mirror_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        state.purge_mirror(mirror_id);
        keys
    }

    /// 释放一个镜像的所有条目但不级联（合成失败回滚 / 桥接后清理）
    pub fn release_mirror(&self, mirror_id: i32) {
        let mut state = self.state.lock().unwrap();
        state.purge_mirror(mirror_id);
    }

    /// 对账清扫：删除引用了宿主活动集合之外的键或镜像 id 的全部条目
    ///
    /// 监听器 (重)连接时调用，进程崩溃或系统重启后自愈。
    pub fn prune_stale(&self, live_keys: &HashSet<String>, live_mirrors: &HashSet<i32>) {
        let mut state = self.state.lock().unwrap();

        let dead_keys: Vec<String> = state
            .key_to_mirror
            .keys()
            .filter(|k| !live_keys.contains(*k))
            .cloned()
            .collect();
        for key in &dead_keys {
            if let Some(mirror_id) = state.key_to_mirror.remove(key) {
                let now_empty = match state.mirror_to_keys.get_mut(&mirror_id) {
                    Some(set) => {
                        set.remove(key);
                        set.is_empty()
                    }
                    None => false,
                };
                if now_empty && !state.is_manual(mirror_id) {
                    state.purge_mirror(mirror_id);
                }
            }
        }

        let dead_mirrors: Vec<i32> = state
            .mirror_to_keys
            .keys()
            .filter(|id| !live_mirrors.contains(*id))
            .copied()
            .collect();
        for mirror_id in &dead_mirrors {
            state.purge_mirror(*mirror_id);
        }

        if !dead_keys.is_empty() || !dead_mirrors.is_empty() {
            info!(
                dead_keys = dead_keys.len(),
                dead_mirrors = dead_mirrors.len(),
                "Pruned stale tracker entries on reconnect"
            );
        }
    }

    /// 查询某 (应用, profile) 当前的手动镜像
    pub fn manual_mirror(&self, package: &str, profile: ProfileKind) -> Option<i32> {
        let state = self.state.lock().unwrap();
        state.manual_by_app_profile.get(&partition_key(package, profile)).copied()
    }

    /// 某个键当前映射到的镜像
    pub fn mirror_for_key(&self, key: &str) -> Option<i32> {
        let state = self.state.lock().unwrap();
        state.key_to_mirror.get(key).copied()
    }

    /// 当前追踪的镜像数量
    pub fn mirror_count(&self) -> usize {
        self.state.lock().unwrap().mirror_to_keys.len()
    }

    /// 当前追踪的原始键数量
    pub fn tracked_key_count(&self) -> usize {
        self.state.lock().unwrap().key_to_mirror.len()
    }

    /// 追踪器是否完全为空（所有映射都已清空）
    pub fn is_empty(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.key_to_mirror.is_empty()
            && state.mirror_to_keys.is_empty()
            && state.fingerprint_to_mirror.is_empty()
            && state.manual_by_app_profile.is_empty()
            && state.mirror_actions.is_empty()
    }
}

impl Default for MirrorTracker {
    fn default() -> Self {
        Self::new()
    }
}
